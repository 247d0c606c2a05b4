//! # geoquery-core: geospatial cell coding and fanout query planning
//!
//! `geoquery-core` turns a center-and-radius or a bounding box into an
//! ordered set of partition-key cells (H3, S2, or GeoHash), fans out
//! per-cell lookups against a caller-supplied key-value store, and
//! returns deduplicated, distance-sorted results, either all at once
//! or one page at a time behind a resumable continuation token.
//!
//! This crate owns none of the store, the wire protocol, or the entity
//! schema. It consumes them through three narrow traits:
//! [`StoreDriver`], [`PerCellQueryBuilder`], [`EntityLocation`], and
//! hands back plain data.
//!
//! ## Quick start
//!
//! ```rust
//! use geoquery_core::{CellScheme, GeoQuery, Point, QueryConfig};
//! use std::sync::Arc;
//!
//! # struct DummyBuilder;
//! # impl geoquery_core::PerCellQueryBuilder<String> for DummyBuilder {
//! #     fn build(&self, cell: &str, _cursor: Option<&[u8]>) -> String {
//! #         cell.to_string()
//! #     }
//! # }
//! # fn main() -> Result<(), geoquery_core::GeoQueryError> {
//! let plan = GeoQuery::<String>::new()
//!     .scheme(CellScheme::H3)
//!     .precision(8)
//!     .cap(Point::new(37.7749, -122.4194), 5.0)
//!     .per_cell_query_builder(Arc::new(DummyBuilder))
//!     .build_with_config(&QueryConfig::default())?;
//! assert_eq!(plan.precision(), 8);
//! # Ok(())
//! # }
//! ```
//!
//! ## Paginated queries
//!
//! Supplying `.page_size(n)` switches a query from fanout mode (every
//! cell queried concurrently, all results returned at once) to
//! paginated mode (cells drained in order, one page returned per call,
//! resumable via [`QueryResult::continuation_token`]).

pub mod codec;
pub mod config;
pub mod covering;
pub mod distance_sort;
pub mod error;
pub mod executor;
pub mod plan;
pub mod primitives;
pub mod store;
pub mod token;

// Error handling
pub use error::{GeoQueryError, Result};

// Configuration
pub use config::{QueryConfig, RetryConfig};

// Geospatial primitives
pub use primitives::{BoundingBox, Point};

// Cell coding
pub use codec::{codec_for, CellCodec, CellScheme};

// Covering
pub use covering::{cover_bbox, cover_cap, Covering};

// Distance ordering
pub use distance_sort::sort_by_distance;

// Continuation tokens
pub use token::{ContinuationToken, QueryShape};

// External collaborator interfaces
pub use store::{EntityLocation, PerCellQueryBuilder, StoreDriver, StorePage};

// Query planning
pub use plan::{GeoQuery, QueryPlan, SearchArea};

// Execution
pub use executor::{FanoutExecutor, QueryResult};

/// Crate version, as reported by Cargo.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports for building and running a query.
pub mod prelude {
    pub use crate::{
        CellScheme, EntityLocation, FanoutExecutor, GeoQuery, GeoQueryError, PerCellQueryBuilder,
        Point, QueryConfig, QueryResult, Result, StoreDriver, StorePage,
    };
}
