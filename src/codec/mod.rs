//! Cell coding: point &lt;-&gt; cell-id at a precision, across the three
//! supported schemes.
//!
//! The query core depends only on the [`CellCodec`] capability set; H3,
//! S2, and GeoHash are otherwise interchangeable from its perspective.
//! A scheme is chosen once, at query construction time, and never swapped
//! mid-query, see [`CellScheme`].

mod geohash_codec;
mod h3_codec;
mod s2_codec;

pub use geohash_codec::GeoHashCodec;
pub use h3_codec::H3Codec;
pub use s2_codec::S2Codec;

use crate::error::Result;
use crate::primitives::{BoundingBox, Point};

/// Which coding scheme a query uses. Chosen once at query start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellScheme {
    /// Uber's H3 hexagonal hierarchical index.
    H3,
    /// Google's S2 spherical quad-tree index.
    S2,
    /// Base-32 text GeoHash.
    GeoHash,
}

/// Capability set shared by every coding scheme. The covering and
/// executor components interact with cells only through this trait.
pub trait CellCodec: Send + Sync {
    /// Which scheme this codec implements.
    fn scheme(&self) -> CellScheme;

    /// Valid precision range for this scheme, inclusive on both ends.
    fn precision_range(&self) -> (u8, u8);

    /// Approximate cell edge length in kilometers at `precision`, used by
    /// [`crate::covering::CellCovering`] to bound ring expansion. Returns
    /// `None` for a precision outside [`CellCodec::precision_range`].
    fn edge_length_km(&self, precision: u8) -> Option<f64>;

    /// Project `point` onto a cell id at `precision`. Total: points
    /// outside the valid domain are clamped by [`Point::new`] before
    /// encoding, so this never fails on a well-formed `Point`.
    fn encode(&self, point: &Point, precision: u8) -> Result<String>;

    /// The cell's canonical center. Must satisfy
    /// `encode(decode(id), precision_of(id)) == id`.
    fn decode(&self, id: &str) -> Result<Point>;

    /// The immediate neighbor ring: 6 for H3, up to 8 for S2/GeoHash,
    /// fewer at face or pole discontinuities.
    fn neighbors(&self, id: &str) -> Result<Vec<String>>;

    /// The ancestor cell id at `target_precision`, for schemes that
    /// support a containment hierarchy. `None` if the scheme doesn't
    /// support this (none of the three do at present) or if
    /// `target_precision` is not coarser than `id`'s own precision.
    fn parent(&self, id: &str, target_precision: u8) -> Result<Option<String>>;

    /// Precision of an already-encoded cell id, inferred from its shape.
    fn precision_of(&self, id: &str) -> Result<u8>;
}

/// Construct the codec for a given scheme.
pub fn codec_for(scheme: CellScheme) -> Box<dyn CellCodec> {
    match scheme {
        CellScheme::H3 => Box::new(H3Codec),
        CellScheme::S2 => Box::new(S2Codec),
        CellScheme::GeoHash => Box::new(GeoHashCodec),
    }
}

/// Compute the bounding box for a candidate shape, used by
/// [`crate::covering::CellCovering`] before any cell enumeration starts.
pub(crate) fn cap_bbox(center: &Point, radius_km: f64) -> BoundingBox {
    BoundingBox::from_center_radius(center, radius_km)
}
