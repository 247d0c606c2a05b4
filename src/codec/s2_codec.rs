use s2::cellid::CellID;
use s2::latlng::LatLng;

use super::{CellCodec, CellScheme};
use crate::error::{GeoQueryError, Result};
use crate::primitives::Point;

/// Average cell edge length in kilometers per S2 level (0-30), from S2's
/// published per-level cell size table.
const EDGE_LENGTH_KM: [f64; 31] = [
    7842.0,
    4152.840383,
    2199.194497,
    1164.614093,
    616.737622,
    326.602002,
    172.956642,
    91.591600,
    48.503608,
    25.685762,
    13.602253,
    7.203263,
    3.814588,
    2.020068,
    1.069755,
    0.566504,
    0.3,
    0.158869,
    0.084131,
    0.044553,
    0.023594,
    0.012494,
    0.006617,
    0.003504,
    0.001856,
    0.000983,
    0.000520,
    0.000276,
    0.000146,
    0.000077,
    0.000041,
];

fn edge_length_km_table(level: u8) -> Option<f64> {
    EDGE_LENGTH_KM.get(level as usize).copied()
}

/// Google's S2 spherical quad-tree index, level 0 (coarsest) to 30
/// (finest). Cell ids are rendered as fixed-width 16-hex strings.
pub struct S2Codec;

fn parse_cell(id: &str) -> Result<CellID> {
    let raw = u64::from_str_radix(id, 16)
        .map_err(|_| GeoQueryError::invalid_input(format!("invalid s2 cell id: {id}")))?;
    let cell = CellID(raw);
    if !cell.is_valid() {
        return Err(GeoQueryError::invalid_input(format!("invalid s2 cell id: {id}")));
    }
    Ok(cell)
}

impl CellCodec for S2Codec {
    fn scheme(&self) -> CellScheme {
        CellScheme::S2
    }

    fn precision_range(&self) -> (u8, u8) {
        (0, 30)
    }

    fn edge_length_km(&self, precision: u8) -> Option<f64> {
        edge_length_km_table(precision)
    }

    fn encode(&self, point: &Point, precision: u8) -> Result<String> {
        let (lo, hi) = self.precision_range();
        if precision < lo || precision > hi {
            return Err(GeoQueryError::invalid_input(format!(
                "s2 level {precision} out of range {lo}-{hi}"
            )));
        }
        let latlng = LatLng::from_degrees(point.lat, point.lon);
        let leaf = CellID::from(latlng);
        let cell = leaf.parent(precision);
        Ok(format!("{:016x}", cell.0))
    }

    fn decode(&self, id: &str) -> Result<Point> {
        let cell = parse_cell(id)?;
        let latlng = LatLng::from(cell);
        Ok(Point::new(latlng.lat.deg(), latlng.lng.deg()))
    }

    fn neighbors(&self, id: &str) -> Result<Vec<String>> {
        let cell = parse_cell(id)?;
        let level = cell.level();
        let mut seen = std::collections::HashSet::new();
        seen.insert(cell.0);
        let mut out = Vec::with_capacity(8);
        for n in cell.edge_neighbors() {
            if seen.insert(n.0) {
                out.push(n);
            }
        }
        for n in cell.vertex_neighbors(level) {
            if seen.insert(n.0) {
                out.push(n);
            }
        }
        Ok(out.into_iter().map(|n| format!("{:016x}", n.0)).collect())
    }

    fn parent(&self, id: &str, target_precision: u8) -> Result<Option<String>> {
        let cell = parse_cell(id)?;
        if target_precision >= cell.level() {
            return Ok(None);
        }
        Ok(Some(format!("{:016x}", cell.parent(target_precision).0)))
    }

    fn precision_of(&self, id: &str) -> Result<u8> {
        Ok(parse_cell(id)?.level())
    }
}
