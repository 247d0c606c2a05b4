//! Cap / bbox -> ordered set of cells with a cell-count cap.
//!
//! Enumeration is a breadth-first ring expansion over [`CellCodec`]'s
//! `neighbors` capability, grounded in the same neighbor-widening BFS the
//! teacher repo's geohash-prefix index uses to grow a candidate set
//! outward until it stops finding anything new.

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::codec::CellCodec;
use crate::error::{GeoQueryError, Result};
use crate::primitives::{BoundingBox, Point};

/// Result of a covering call: the ordered, deduplicated cell ids plus
/// whether the natural covering was truncated to fit `max_cells`.
#[derive(Debug, Clone, PartialEq)]
pub struct Covering {
    /// Ordered, deduplicated cell ids. Ascending distance from the query
    /// reference point, lexicographic cell-id tie-break.
    pub cells: Vec<String>,
    /// Whether the natural covering exceeded `max_cells` and was
    /// truncated to the nearest `max_cells` cells.
    pub truncated: bool,
}

struct Candidate {
    id: String,
    center: Point,
    distance_km: f64,
}

/// Breadth-first ring enumeration shared by `cover_cap` and `cover_bbox`.
///
/// `accept` decides whether a visited cell belongs in the final set;
/// `still_in_region` decides whether ring expansion should keep going
/// past a cell that didn't pass `accept` (the search frontier is padded
/// past the query region by one cell's edge length so that cells whose
/// *center* sits just outside the strict region, but whose extent may
/// still overlap it, aren't missed. The caller-side post-filter is what
/// ultimately enforces exactness on individual points).
fn enumerate(
    codec: &dyn CellCodec,
    seed: &str,
    reference: &Point,
    earth_radius_km: f64,
    max_cells: usize,
    accept: impl Fn(&Point) -> bool,
    still_in_region: impl Fn(&Point) -> bool,
) -> Result<Vec<Candidate>> {
    // Hard safety valve independent of the region test: `max_cells` bounds
    // the *reported* covering, but a pathologically large radius/bbox
    // could otherwise keep finding in-region cells for a long time before
    // truncation kicks in. Cap total enumeration effort in proportion to
    // the cap the caller actually asked for.
    let visit_budget = max_cells.saturating_mul(20).max(2000);

    let mut visited: FxHashSet<String> = FxHashSet::default();
    visited.insert(seed.to_string());
    let mut frontier = vec![seed.to_string()];
    let mut candidates = Vec::new();
    let mut rings = 0usize;

    loop {
        if frontier.is_empty() || visited.len() >= visit_budget {
            break;
        }
        let mut next_frontier = Vec::new();
        let mut any_in_region = rings == 0;

        for cell in &frontier {
            let center = codec.decode(cell)?;
            if still_in_region(&center) {
                any_in_region = true;
                if accept(&center) {
                    candidates.push(Candidate {
                        id: cell.clone(),
                        distance_km: reference.distance_km(&center, earth_radius_km),
                        center,
                    });
                }
            }
            for neighbor in codec.neighbors(cell)? {
                if visited.insert(neighbor.clone()) {
                    next_frontier.push(neighbor);
                }
            }
        }

        rings += 1;
        if !any_in_region {
            break;
        }
        frontier = next_frontier;
    }

    debug!(rings, visited = visited.len(), "covering enumeration complete");
    Ok(candidates)
}

fn finalize(
    mut candidates: Vec<Candidate>,
    max_cells: usize,
    allow_truncation: bool,
) -> Result<Covering> {
    candidates.sort_by(|a, b| {
        a.distance_km
            .partial_cmp(&b.distance_km)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    let truncated = candidates.len() > max_cells;
    if truncated && !allow_truncation {
        return Err(GeoQueryError::TooManyCells {
            limit: max_cells,
            found: candidates.len(),
        });
    }
    if truncated {
        candidates.truncate(max_cells);
    }

    Ok(Covering {
        cells: candidates.into_iter().map(|c| c.id).collect(),
        truncated,
    })
}

/// Compute the minimal set of cells covering a spherical cap.
pub fn cover_cap(
    codec: &dyn CellCodec,
    center: &Point,
    radius_km: f64,
    precision: u8,
    max_cells: usize,
    allow_truncation: bool,
    earth_radius_km: f64,
) -> Result<Covering> {
    if radius_km <= 0.0 {
        return Err(GeoQueryError::invalid_input("radius_km must be positive"));
    }
    let edge = codec
        .edge_length_km(precision)
        .ok_or_else(|| GeoQueryError::invalid_input(format!("precision {precision} out of range")))?;

    let seed = codec.encode(center, precision)?;
    let padded_radius = radius_km + edge;

    let candidates = enumerate(
        codec,
        &seed,
        center,
        earth_radius_km,
        max_cells,
        |cell_center| center.distance_km(cell_center, earth_radius_km) <= padded_radius,
        |cell_center| center.distance_km(cell_center, earth_radius_km) <= padded_radius,
    )?;

    finalize(candidates, max_cells, allow_truncation)
}

/// Compute the minimal set of cells covering a (possibly
/// longitude-wrapping) bounding box.
pub fn cover_bbox(
    codec: &dyn CellCodec,
    bbox: &BoundingBox,
    precision: u8,
    max_cells: usize,
    allow_truncation: bool,
    earth_radius_km: f64,
) -> Result<Covering> {
    let edge = codec
        .edge_length_km(precision)
        .ok_or_else(|| GeoQueryError::invalid_input(format!("precision {precision} out of range")))?;

    let reference = bbox.center();
    let seed = codec.encode(&reference, precision)?;
    let padded = bbox.expanded_by_km(edge);

    let candidates = enumerate(
        codec,
        &seed,
        &reference,
        earth_radius_km,
        max_cells,
        |cell_center| bbox.contains(cell_center),
        |cell_center| padded.contains(cell_center),
    )?;

    finalize(candidates, max_cells, allow_truncation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{codec_for, CellScheme};

    #[test]
    fn covering_contains_no_duplicates() {
        let codec = codec_for(CellScheme::GeoHash);
        let covering = cover_cap(
            codec.as_ref(),
            &Point::new(37.7749, -122.4194),
            5.0,
            6,
            500,
            false,
            6371.0088,
        )
        .unwrap();
        let mut seen = FxHashSet::default();
        for id in &covering.cells {
            assert!(seen.insert(id.clone()), "duplicate cell id {id}");
        }
        assert!(!covering.cells.is_empty());
    }

    #[test]
    fn cap_covering_includes_center_cell() {
        let codec = codec_for(CellScheme::H3);
        let center = Point::new(0.0, -179.0);
        let covering = cover_cap(codec.as_ref(), &center, 200.0, 9, 500, false, 6371.0088).unwrap();
        let center_cell = codec.encode(&center, 9).unwrap();
        assert!(covering.cells.contains(&center_cell));
    }

    #[test]
    fn too_many_cells_without_truncation_errors() {
        let codec = codec_for(CellScheme::GeoHash);
        let center = Point::new(37.7749, -122.4194);
        let result = cover_cap(codec.as_ref(), &center, 50.0, 7, 3, false, 6371.0088);
        assert!(matches!(result, Err(GeoQueryError::TooManyCells { .. })));
    }

    #[test]
    fn truncation_reports_flag_instead_of_erroring() {
        let codec = codec_for(CellScheme::GeoHash);
        let center = Point::new(37.7749, -122.4194);
        let covering = cover_cap(codec.as_ref(), &center, 50.0, 7, 3, true, 6371.0088).unwrap();
        assert!(covering.truncated);
        assert_eq!(covering.cells.len(), 3);
    }

    #[test]
    fn bbox_covering_respects_wrap() {
        let codec = codec_for(CellScheme::GeoHash);
        let bbox = BoundingBox::new(Point::new(-1.0, 178.0), Point::new(1.0, -178.0));
        let covering = cover_bbox(codec.as_ref(), &bbox, 4, 500, false, 6371.0088).unwrap();
        assert!(!covering.cells.is_empty());
    }

    #[test]
    fn rejects_non_positive_radius() {
        let codec = codec_for(CellScheme::GeoHash);
        let result = cover_cap(
            codec.as_ref(),
            &Point::new(0.0, 0.0),
            0.0,
            6,
            500,
            false,
            6371.0088,
        );
        assert!(result.is_err());
    }
}
