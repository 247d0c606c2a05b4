//! Chooses planner mode (paginated vs fanout) and normalizes inputs.
//!
//! `GeoQuery` is a method-chaining builder modeled on the teacher's own
//! `DBBuilder`: options accumulate on the builder, and `.build()`
//! validates everything once, up front, before any I/O, the same
//! "validate at build time" discipline the teacher applies to AOF paths
//! and config.

use std::sync::Arc;

use crate::codec::{codec_for, CellCodec, CellScheme};
use crate::error::{GeoQueryError, Result};
use crate::primitives::{BoundingBox, Point};
use crate::store::PerCellQueryBuilder;
use crate::token::QueryShape;

/// The search region of a query: exactly one of cap or bbox.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchArea {
    /// Spherical cap: center + radius in kilometers.
    Cap {
        /// Cap center.
        center: Point,
        /// Cap radius in kilometers.
        radius_km: f64,
    },
    /// Longitude-wrapping bounding box.
    BBox(BoundingBox),
}

impl SearchArea {
    pub(crate) fn to_token_shape(&self) -> QueryShape {
        match self {
            SearchArea::Cap { center, radius_km } => QueryShape::Cap {
                center: *center,
                radius_km: *radius_km,
            },
            SearchArea::BBox(bbox) => QueryShape::BBox(*bbox),
        }
    }

    /// The center used as the distance-sort reference. For a bbox this
    /// is its approximate geometric center.
    pub(crate) fn reference_point(&self) -> Point {
        match self {
            SearchArea::Cap { center, .. } => *center,
            SearchArea::BBox(bbox) => bbox.center(),
        }
    }
}

/// A fully validated, normalized query plan: the output of
/// `GeoQuery::build`. Immutable once constructed.
pub struct QueryPlan<Q> {
    pub(crate) codec: Box<dyn CellCodec>,
    pub(crate) scheme: CellScheme,
    pub(crate) precision: u8,
    pub(crate) area: SearchArea,
    pub(crate) per_cell_query_builder: Arc<dyn PerCellQueryBuilder<Q>>,
    pub(crate) page_size: Option<usize>,
    pub(crate) continuation_token: Option<String>,
    pub(crate) max_cells: usize,
    pub(crate) allow_truncation: bool,
    pub(crate) earth_radius_km: f64,
}

impl<Q> QueryPlan<Q> {
    /// The coding scheme this plan was built with.
    pub fn scheme(&self) -> CellScheme {
        self.scheme
    }

    /// The cell precision this plan was built with.
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// The search region this plan was built with.
    pub fn area(&self) -> &SearchArea {
        &self.area
    }

    /// `Some(n)` for paginated mode, `None` for fanout mode.
    pub fn page_size(&self) -> Option<usize> {
        self.page_size
    }

    /// The cell-count cap this plan was built with.
    pub fn max_cells(&self) -> usize {
        self.max_cells
    }
}

/// Builder for a [`QueryPlan`]. See module docs for validation discipline.
pub struct GeoQuery<Q> {
    scheme: Option<CellScheme>,
    precision: Option<u8>,
    area: Option<SearchArea>,
    per_cell_query_builder: Option<Arc<dyn PerCellQueryBuilder<Q>>>,
    page_size: Option<usize>,
    continuation_token: Option<String>,
    max_cells: Option<usize>,
    allow_truncation: bool,
    earth_radius_km: Option<f64>,
}

impl<Q> Default for GeoQuery<Q> {
    fn default() -> Self {
        Self {
            scheme: None,
            precision: None,
            area: None,
            per_cell_query_builder: None,
            page_size: None,
            continuation_token: None,
            max_cells: None,
            allow_truncation: false,
            earth_radius_km: None,
        }
    }
}

impl<Q> GeoQuery<Q> {
    /// Start building a query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the coding scheme.
    pub fn scheme(mut self, scheme: CellScheme) -> Self {
        self.scheme = Some(scheme);
        self
    }

    /// Set the cell precision (resolution/level/geohash length,
    /// validated against the chosen scheme at `.build()`).
    pub fn precision(mut self, precision: u8) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Search a spherical cap.
    pub fn cap(mut self, center: Point, radius_km: f64) -> Self {
        self.area = Some(SearchArea::Cap { center, radius_km });
        self
    }

    /// Search a bounding box.
    pub fn bbox(mut self, bbox: BoundingBox) -> Self {
        self.area = Some(SearchArea::BBox(bbox));
        self
    }

    /// Supply the per-cell query builder that binds a cell id into the
    /// caller's store query.
    pub fn per_cell_query_builder(mut self, builder: Arc<dyn PerCellQueryBuilder<Q>>) -> Self {
        self.per_cell_query_builder = Some(builder);
        self
    }

    /// Select paginated mode with the given page size. Omit to use
    /// fanout mode.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Resume from a previously issued continuation token. Only valid
    /// together with `page_size`.
    pub fn continuation_token(mut self, token: impl Into<String>) -> Self {
        self.continuation_token = Some(token.into());
        self
    }

    /// Override the covering's cell-count cap (default from
    /// [`crate::config::QueryConfig::max_cells`]).
    pub fn max_cells(mut self, max_cells: usize) -> Self {
        self.max_cells = Some(max_cells);
        self
    }

    /// Allow the covering to truncate rather than error when it exceeds
    /// `max_cells`.
    pub fn allow_truncation(mut self, allow: bool) -> Self {
        self.allow_truncation = allow;
        self
    }

    /// Override the earth radius used for distance math (default from
    /// [`crate::config::QueryConfig::earth_radius_km`]).
    pub fn earth_radius_km(mut self, radius_km: f64) -> Self {
        self.earth_radius_km = Some(radius_km);
        self
    }

    /// Normalize and validate every input, returning a [`QueryPlan`] or
    /// an [`GeoQueryError::InvalidInput`]. No I/O happens here or as a
    /// result of calling this.
    pub fn build_with_config(self, config: &crate::config::QueryConfig) -> Result<QueryPlan<Q>> {
        let scheme = self
            .scheme
            .ok_or_else(|| GeoQueryError::invalid_input("scheme is required"))?;
        let codec = codec_for(scheme);

        let precision = self
            .precision
            .ok_or_else(|| GeoQueryError::invalid_input("precision is required"))?;
        let (lo, hi) = codec.precision_range();
        if precision < lo || precision > hi {
            return Err(GeoQueryError::invalid_input(format!(
                "precision {precision} out of range {lo}-{hi} for {scheme:?}"
            )));
        }

        let area = self
            .area
            .ok_or_else(|| GeoQueryError::invalid_input("exactly one of cap or bbox is required"))?;
        if let SearchArea::Cap { radius_km, .. } = &area {
            if !radius_km.is_finite() || *radius_km <= 0.0 {
                return Err(GeoQueryError::invalid_input("radius_km must be positive"));
            }
        }

        let per_cell_query_builder = self
            .per_cell_query_builder
            .ok_or_else(|| GeoQueryError::invalid_input("per_cell_query_builder is required"))?;

        if self.continuation_token.is_some() && self.page_size.is_none() {
            return Err(GeoQueryError::invalid_input(
                "continuation_token is only valid together with page_size",
            ));
        }

        let max_cells = self.max_cells.unwrap_or(config.max_cells);
        if max_cells == 0 {
            return Err(GeoQueryError::invalid_input("max_cells must be positive"));
        }

        let earth_radius_km = self.earth_radius_km.unwrap_or(config.earth_radius_km);
        if !earth_radius_km.is_finite() || earth_radius_km <= 0.0 {
            return Err(GeoQueryError::invalid_input(
                "earth_radius_km must be finite and positive",
            ));
        }

        Ok(QueryPlan {
            codec,
            scheme,
            precision,
            area,
            per_cell_query_builder,
            page_size: self.page_size,
            continuation_token: self.continuation_token,
            max_cells,
            allow_truncation: self.allow_truncation || config.allow_truncation,
            earth_radius_km,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryConfig;

    struct DummyBuilder;
    impl PerCellQueryBuilder<String> for DummyBuilder {
        fn build(&self, cell: &str, _cursor: Option<&[u8]>) -> String {
            cell.to_string()
        }
    }

    #[test]
    fn rejects_missing_area() {
        let result = GeoQuery::<String>::new()
            .scheme(CellScheme::GeoHash)
            .precision(6)
            .per_cell_query_builder(Arc::new(DummyBuilder))
            .build_with_config(&QueryConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn rejects_token_without_page_size() {
        let result = GeoQuery::<String>::new()
            .scheme(CellScheme::GeoHash)
            .precision(6)
            .cap(Point::new(0.0, 0.0), 5.0)
            .per_cell_query_builder(Arc::new(DummyBuilder))
            .continuation_token("abc")
            .build_with_config(&QueryConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn rejects_non_positive_radius() {
        let result = GeoQuery::<String>::new()
            .scheme(CellScheme::GeoHash)
            .precision(6)
            .cap(Point::new(0.0, 0.0), 0.0)
            .per_cell_query_builder(Arc::new(DummyBuilder))
            .build_with_config(&QueryConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn rejects_precision_outside_scheme_range() {
        let result = GeoQuery::<String>::new()
            .scheme(CellScheme::GeoHash)
            .precision(20)
            .cap(Point::new(0.0, 0.0), 5.0)
            .per_cell_query_builder(Arc::new(DummyBuilder))
            .build_with_config(&QueryConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn accepts_well_formed_fanout_query() {
        let plan = GeoQuery::<String>::new()
            .scheme(CellScheme::H3)
            .precision(9)
            .cap(Point::new(37.7749, -122.4194), 5.0)
            .per_cell_query_builder(Arc::new(DummyBuilder))
            .build_with_config(&QueryConfig::default())
            .unwrap();
        assert_eq!(plan.precision, 9);
        assert!(plan.page_size.is_none());
    }
}
