use h3o::{CellIndex, LatLng, Resolution};

use super::{CellCodec, CellScheme};
use crate::error::{GeoQueryError, Result};
use crate::primitives::Point;

/// Average hexagon edge length in kilometers per H3 resolution (0-15),
/// from H3's published precision table.
const EDGE_LENGTH_KM: [f64; 16] = [
    1107.712591,
    418.676006,
    158.244656,
    59.810858,
    22.606379,
    8.544408,
    3.229483,
    1.220630,
    0.461355,
    0.174376,
    0.065908,
    0.024911,
    0.009416,
    0.003560,
    0.001349,
    0.000510,
];

/// Uber's H3 hexagonal hierarchical index, resolution 0 (coarsest) to 15
/// (finest). No cross-resolution prefix relation in the rendered string;
/// containment is queried via [`CellIndex::parent`] instead.
pub struct H3Codec;

fn parse_resolution(precision: u8) -> Result<Resolution> {
    Resolution::try_from(precision)
        .map_err(|_| GeoQueryError::invalid_input(format!("h3 resolution {precision} out of range 0-15")))
}

fn parse_cell(id: &str) -> Result<CellIndex> {
    let raw = u64::from_str_radix(id, 16)
        .map_err(|_| GeoQueryError::invalid_input(format!("invalid h3 cell id: {id}")))?;
    CellIndex::try_from(raw).map_err(|_| GeoQueryError::invalid_input(format!("invalid h3 cell id: {id}")))
}

impl CellCodec for H3Codec {
    fn scheme(&self) -> CellScheme {
        CellScheme::H3
    }

    fn precision_range(&self) -> (u8, u8) {
        (0, 15)
    }

    fn edge_length_km(&self, precision: u8) -> Option<f64> {
        EDGE_LENGTH_KM.get(precision as usize).copied()
    }

    fn encode(&self, point: &Point, precision: u8) -> Result<String> {
        let resolution = parse_resolution(precision)?;
        let latlng = LatLng::new(point.lat, point.lon)
            .map_err(|e| GeoQueryError::invalid_input(format!("invalid h3 lat/lng: {e}")))?;
        let cell = latlng.to_cell(resolution);
        Ok(format!("{cell:x}"))
    }

    fn decode(&self, id: &str) -> Result<Point> {
        let cell = parse_cell(id)?;
        let latlng = LatLng::from(cell);
        Ok(Point::new(latlng.lat(), latlng.lng()))
    }

    fn neighbors(&self, id: &str) -> Result<Vec<String>> {
        let cell = parse_cell(id)?;
        let ring: Vec<CellIndex> = cell.grid_disk(1);
        Ok(ring
            .into_iter()
            .filter(|n| *n != cell)
            .map(|n| format!("{n:x}"))
            .collect())
    }

    fn parent(&self, id: &str, target_precision: u8) -> Result<Option<String>> {
        let cell = parse_cell(id)?;
        if target_precision >= cell.resolution() as u8 {
            return Ok(None);
        }
        let resolution = parse_resolution(target_precision)?;
        Ok(cell.parent(resolution).map(|p| format!("{p:x}")))
    }

    fn precision_of(&self, id: &str) -> Result<u8> {
        Ok(parse_cell(id)?.resolution() as u8)
    }
}
