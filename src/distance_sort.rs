//! Stable ordering by ascending distance to a reference point.

use crate::primitives::Point;

/// Stable sort of `items` by ascending distance from `reference`, with a
/// caller-supplied deterministic tie-break so that paginated and
/// non-paginated orderings agree when distances are equal.
pub fn sort_by_distance<T, K: Ord>(
    items: &mut [T],
    extract_point: impl Fn(&T) -> Point,
    tie_break: impl Fn(&T) -> K,
    reference: &Point,
    earth_radius_km: f64,
) {
    items.sort_by(|a, b| {
        let da = extract_point(a).distance_km(reference, earth_radius_km);
        let db = extract_point(b).distance_km(reference, earth_radius_km);
        da.partial_cmp(&db)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| tie_break(a).cmp(&tie_break(b)))
    });
}
