//! External collaborator interfaces.
//!
//! The query core never owns a key-value store client, an attribute
//! codec, or entity-to-record mapping. It consumes them through these
//! narrow seams, mirroring the teacher repo's own `StorageBackend` trait
//! shape but narrowed down to the read-only `query` capability this
//! crate actually needs.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::primitives::Point;

/// A single page of results from one `StoreDriver::query` call.
#[derive(Debug, Clone)]
pub struct StorePage<I> {
    /// Items returned by this page.
    pub items: Vec<I>,
    /// Store-native resume cursor, if the store indicates more results
    /// remain for this query.
    pub cursor: Option<Bytes>,
}

/// The narrow, read-only seam into the caller's key-value store.
///
/// `Q` is the opaque per-cell query value produced by
/// [`PerCellQueryBuilder`]; the core never interprets it beyond
/// threading `cursor` back into a follow-up call. `I` is the caller's
/// entity type.
#[async_trait]
pub trait StoreDriver<Q, I>: Send + Sync {
    /// Execute a keyed lookup and return one page of results.
    ///
    /// Errors should be surfaced via [`crate::error::GeoQueryError::StoreError`],
    /// with `retryable` set for throttling/timeout conditions and unset
    /// for anything the executor should treat as fatal.
    async fn query(&self, store_query: Q) -> Result<StorePage<I>>;
}

/// Binds a cell id (and, for store-native multi-page per-cell results, a
/// resume cursor) into the partition-key predicate of the caller's
/// underlying store query.
pub trait PerCellQueryBuilder<Q>: Send + Sync {
    /// Build the opaque store query for `cell`, optionally resuming from
    /// `cursor` within that cell's own store-native pagination.
    fn build(&self, cell: &str, cursor: Option<&[u8]>) -> Q;
}

/// The narrow seam into the caller's entity codec: just enough to
/// extract a location and a dedup/tie-break key, never full
/// attribute-value (de)serialization.
pub trait EntityLocation<T> {
    /// The entity's primary key, used for fanout dedup and as the
    /// distance tie-break.
    fn primary_key(entity: &T) -> String;

    /// The entity's location, or `None` only when the underlying field
    /// is genuinely nullable and absent. A non-nullable field's
    /// implementation must never return `None`.
    fn location(entity: &T) -> Option<Point>;
}
