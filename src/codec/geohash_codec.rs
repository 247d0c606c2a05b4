use geohash::{decode, encode, neighbor, Coord, Direction};

use super::{CellCodec, CellScheme};
use crate::error::{GeoQueryError, Result};
use crate::primitives::Point;

/// Approximate edge length in kilometers per GeoHash precision (base-32
/// character count), from the scheme's well-known precision table.
const EDGE_LENGTH_KM: [f64; 12] = [
    2500.0, 630.0, 78.0, 20.0, 2.4, 0.61, 0.076, 0.019, 0.0024, 0.00060, 0.000074, 0.000019,
];

const DIRECTIONS: [Direction; 8] = [
    Direction::N,
    Direction::NE,
    Direction::E,
    Direction::SE,
    Direction::S,
    Direction::SW,
    Direction::W,
    Direction::NW,
];

/// Base-32 text GeoHash, precision (string length) 1-12. The `n`-char
/// prefix of a length-`m` hash is the enclosing cell at precision `n`.
pub struct GeoHashCodec;

impl CellCodec for GeoHashCodec {
    fn scheme(&self) -> CellScheme {
        CellScheme::GeoHash
    }

    fn precision_range(&self) -> (u8, u8) {
        (1, 12)
    }

    fn edge_length_km(&self, precision: u8) -> Option<f64> {
        EDGE_LENGTH_KM.get(precision.checked_sub(1)? as usize).copied()
    }

    fn encode(&self, point: &Point, precision: u8) -> Result<String> {
        let (lo, hi) = self.precision_range();
        if precision < lo || precision > hi {
            return Err(GeoQueryError::invalid_input(format!(
                "geohash precision {precision} out of range {lo}-{hi}"
            )));
        }
        encode(
            Coord {
                x: point.lon,
                y: point.lat,
            },
            precision as usize,
        )
        .map_err(|e| GeoQueryError::invalid_input(format!("geohash encode failed: {e}")))
    }

    fn decode(&self, id: &str) -> Result<Point> {
        let (coord, _lat_err, _lon_err) =
            decode(id).map_err(|e| GeoQueryError::invalid_input(format!("invalid geohash: {e}")))?;
        Ok(Point::new(coord.y, coord.x))
    }

    fn neighbors(&self, id: &str) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(8);
        for direction in DIRECTIONS {
            if let Ok(n) = neighbor(id, direction) {
                out.push(n);
            }
        }
        Ok(out)
    }

    fn parent(&self, id: &str, target_precision: u8) -> Result<Option<String>> {
        let current = id.len() as u8;
        if target_precision >= current {
            return Ok(None);
        }
        if target_precision == 0 {
            return Err(GeoQueryError::invalid_input(
                "geohash precision must be at least 1",
            ));
        }
        Ok(Some(id[..target_precision as usize].to_string()))
    }

    fn precision_of(&self, id: &str) -> Result<u8> {
        Ok(id.len() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_scenario_precision_seven() {
        let codec = GeoHashCodec;
        let p = Point::new(37.7749, -122.4194);
        let hash = codec.encode(&p, 7).unwrap();
        assert_eq!(hash.len(), 7);
        let back = codec.decode(&hash).unwrap();
        assert!((back.lat - p.lat).abs() < 0.01);
        assert!((back.lon - p.lon).abs() < 0.01);
    }

    #[test]
    fn prefix_relation_holds_for_increasing_precision() {
        let codec = GeoHashCodec;
        let p = Point::new(51.5074, -0.1278);
        let short = codec.encode(&p, 4).unwrap();
        let long = codec.encode(&p, 9).unwrap();
        assert!(long.starts_with(&short));
    }

    #[test]
    fn parent_truncates_prefix() {
        let codec = GeoHashCodec;
        let parent = codec.parent("gcpvj0du", 4).unwrap().unwrap();
        assert_eq!(parent, "gcpv");
    }

    #[test]
    fn rejects_out_of_range_precision() {
        let codec = GeoHashCodec;
        let p = Point::new(0.0, 0.0);
        assert!(codec.encode(&p, 0).is_err());
        assert!(codec.encode(&p, 13).is_err());
    }

    #[test]
    fn neighbors_returns_up_to_eight() {
        let codec = GeoHashCodec;
        let hash = codec.encode(&Point::new(0.0, 0.0), 5).unwrap();
        let neighbors = codec.neighbors(&hash).unwrap();
        assert!(!neighbors.is_empty());
        assert!(neighbors.len() <= 8);
    }
}
