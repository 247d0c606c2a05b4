//! Concurrent per-cell lookups against the store; dedup, filter, order,
//! page.
//!
//! The executor is cooperatively concurrent: it owns no worker pool, it
//! spawns per-cell lookups onto the caller's Tokio runtime via
//! [`tokio::task::JoinSet`] and awaits them, bounded by a
//! [`tokio::sync::Semaphore`], the same concurrency idiom the grounding
//! repo's beast client uses for its own bounded fan-out.

use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, instrument, warn};

use crate::config::QueryConfig;
use crate::covering::{self, Covering};
use crate::distance_sort;
use crate::error::{GeoQueryError, Result};
use crate::plan::{QueryPlan, SearchArea};
use crate::store::{EntityLocation, PerCellQueryBuilder, StoreDriver};
use crate::token::{self, ContinuationToken};

/// `{ items, continuationToken?, totalCellsQueried, totalItemsScanned }`.
#[derive(Debug, Clone)]
pub struct QueryResult<I> {
    /// Matching entities, ordered by ascending distance when a center
    /// was supplied.
    pub items: Vec<I>,
    /// Opaque resume cursor; `None` when the query is exhausted (or ran
    /// in fanout mode, which never pages).
    pub continuation_token: Option<String>,
    /// Number of distinct cells queried so far.
    pub total_cells_queried: u64,
    /// Number of raw items the store returned, before dedup/filtering.
    pub total_items_scanned: u64,
    /// Whether the covering exceeded `max_cells` and was truncated to the
    /// nearest cells. A truncated query still succeeds; this flag is the
    /// caller's signal that the result may be incomplete.
    pub truncated: bool,
}

fn compute_covering<Q>(plan: &QueryPlan<Q>) -> Result<Covering> {
    match &plan.area {
        SearchArea::Cap { center, radius_km } => covering::cover_cap(
            plan.codec.as_ref(),
            center,
            *radius_km,
            plan.precision,
            plan.max_cells,
            plan.allow_truncation,
            plan.earth_radius_km,
        ),
        SearchArea::BBox(bbox) => covering::cover_bbox(
            plan.codec.as_ref(),
            bbox,
            plan.precision,
            plan.max_cells,
            plan.allow_truncation,
            plan.earth_radius_km,
        ),
    }
}

/// Runs `call` with exponential backoff and full jitter (base
/// `config.retry.base_delay_ms`, factor 2) up to `config.retry.max_attempts`
/// retries, retrying only errors for which [`GeoQueryError::is_retryable`]
/// holds.
async fn retry_with_backoff<T, F, Fut>(config: &QueryConfig, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < config.retry.max_attempts => {
                let exp = config.retry.base_delay_ms.saturating_mul(1u64 << attempt);
                let jittered_ms = rand::rng().random_range(0..=exp.max(1));
                warn!(attempt, delay_ms = jittered_ms, "retrying after store error");
                tokio::time::sleep(std::time::Duration::from_millis(jittered_ms)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Drains one cell's store-native pagination to completion, applying the
/// retry/backoff policy to each page and returning every item along with
/// how many raw items were scanned.
async fn drain_cell<Q, I, S>(
    cell: &str,
    builder: &dyn PerCellQueryBuilder<Q>,
    store: &S,
    config: &QueryConfig,
    start_cursor: Option<Vec<u8>>,
) -> Result<(Vec<I>, u64)>
where
    S: StoreDriver<Q, I>,
{
    let mut items = Vec::new();
    let mut scanned = 0u64;
    let mut cursor = start_cursor;

    loop {
        let page = retry_with_backoff(config, || async {
            let query = builder.build(cell, cursor.as_deref());
            store.query(query).await
        })
        .await?;

        scanned += page.items.len() as u64;
        items.extend(page.items);
        match page.cursor {
            Some(next) if !next.is_empty() => cursor = Some(next.to_vec()),
            _ => break,
        }
    }

    Ok((items, scanned))
}

/// Filters and orders a batch of items for one result.
///
/// A cap query always sorts by distance to `center`: that's the ordering
/// spec.md asks for in both modes, and it doubles as the fanout mode's
/// determinism guarantee since concurrent per-cell tasks complete in
/// arbitrary order. A bbox query has no center, so there's no distance to
/// sort by; store-native order is preserved unless `force_order` is set,
/// in which case items are ordered by primary key instead, the same
/// determinism guarantee without inventing a distance metric.
fn post_filter_and_sort<I, L: EntityLocation<I>>(
    mut items: Vec<I>,
    plan_area: &SearchArea,
    earth_radius_km: f64,
    force_order: bool,
) -> Vec<I> {
    match plan_area {
        SearchArea::Cap { center, radius_km } => {
            items.retain(|item| match L::location(item) {
                Some(point) => point.distance_km(center, earth_radius_km) <= *radius_km,
                None => false,
            });
            let reference = plan_area.reference_point();
            distance_sort::sort_by_distance(
                &mut items,
                |item| L::location(item).unwrap_or(reference),
                L::primary_key,
                &reference,
                earth_radius_km,
            );
        }
        SearchArea::BBox(_) if force_order => {
            items.sort_by(|a, b| L::primary_key(a).cmp(&L::primary_key(b)));
        }
        SearchArea::BBox(_) => {}
    }
    items
}

fn dedup_by_primary_key<I, L: EntityLocation<I>>(items: Vec<I>) -> Vec<I> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(L::primary_key(item)))
        .collect()
}

/// Executes a [`QueryPlan`] against `store`, choosing fanout or
/// paginated mode from `plan.page_size`.
pub struct FanoutExecutor;

impl FanoutExecutor {
    /// Run the plan to completion (fanout mode) or one page (paginated
    /// mode), depending on whether `plan.page_size` is set.
    ///
    /// `store` is taken by `Arc` because fanout mode spawns one task per
    /// cell onto the caller's runtime; paginated mode never actually
    /// needs the extra clone, but the same signature keeps the two modes
    /// interchangeable for callers.
    #[instrument(skip_all, fields(scheme = ?plan.scheme, precision = plan.precision))]
    pub async fn execute<Q, I, S, L>(
        plan: &QueryPlan<Q>,
        store: Arc<S>,
        config: &QueryConfig,
    ) -> Result<QueryResult<I>>
    where
        Q: Send + 'static,
        I: Send + 'static,
        S: StoreDriver<Q, I> + Send + Sync + 'static,
        L: EntityLocation<I>,
    {
        let covering = compute_covering(plan)?;
        debug!(
            cells = covering.cells.len(),
            truncated = covering.truncated,
            "covering computed"
        );

        match plan.page_size {
            None => Self::execute_fanout::<Q, I, S, L>(plan, &covering, store, config).await,
            Some(page_size) => {
                Self::execute_paginated::<Q, I, S, L>(plan, &covering, store.as_ref(), config, page_size)
                    .await
            }
        }
    }

    async fn execute_fanout<Q, I, S, L>(
        plan: &QueryPlan<Q>,
        covering: &Covering,
        store: Arc<S>,
        config: &QueryConfig,
    ) -> Result<QueryResult<I>>
    where
        Q: Send + 'static,
        I: Send + 'static,
        S: StoreDriver<Q, I> + Send + Sync + 'static,
        L: EntityLocation<I>,
    {
        let semaphore = Arc::new(Semaphore::new(config.concurrency));
        let mut join_set: JoinSet<Result<(Vec<I>, u64)>> = JoinSet::new();

        for cell in covering.cells.clone() {
            let permit = semaphore.clone();
            let builder = plan.per_cell_query_builder.clone();
            let store = store.clone();
            let cfg = config.clone();
            join_set.spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore closed");
                debug!(%cell, "dispatching per-cell query");
                drain_cell(&cell, builder.as_ref(), store.as_ref(), &cfg, None).await
            });
        }

        let mut all_items = Vec::new();
        let mut total_scanned = 0u64;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok((items, scanned))) => {
                    total_scanned += scanned;
                    all_items.extend(items);
                }
                Ok(Err(err)) => {
                    error!(error = %err, "per-cell query failed, cancelling remaining tasks");
                    join_set.abort_all();
                    return Err(err);
                }
                Err(join_err) => {
                    if join_err.is_cancelled() {
                        continue;
                    }
                    join_set.abort_all();
                    return Err(GeoQueryError::fatal_store_error(std::io::Error::other(
                        join_err.to_string(),
                    )));
                }
            }
        }

        let all_items = dedup_by_primary_key::<I, L>(all_items);
        let all_items = post_filter_and_sort::<I, L>(all_items, &plan.area, plan.earth_radius_km, true);

        Ok(QueryResult {
            items: all_items,
            continuation_token: None,
            total_cells_queried: covering.cells.len() as u64,
            total_items_scanned: total_scanned,
            truncated: covering.truncated,
        })
    }

    async fn execute_paginated<Q, I, S, L>(
        plan: &QueryPlan<Q>,
        covering: &Covering,
        store: &S,
        config: &QueryConfig,
        page_size: usize,
    ) -> Result<QueryResult<I>>
    where
        S: StoreDriver<Q, I>,
        L: EntityLocation<I>,
    {
        let fingerprint = token::fingerprint(
            &plan.area.to_token_shape(),
            plan.precision,
            plan.scheme,
            Some(page_size),
        );

        let mut state = match &plan.continuation_token {
            Some(encoded) => token::decode(encoded, fingerprint, covering.cells.len())?,
            None => ContinuationToken {
                cell_idx: 0,
                store_cursor: Vec::new(),
                scanned: 0,
            },
        };

        let mut collected = Vec::new();
        let mut cells_touched = 0u64;

        loop {
            if state.cell_idx as usize >= covering.cells.len() {
                return Ok(QueryResult {
                    items: post_filter_and_sort::<I, L>(collected, &plan.area, plan.earth_radius_km, false),
                    continuation_token: None,
                    total_cells_queried: cells_touched,
                    total_items_scanned: state.scanned,
                    truncated: covering.truncated,
                });
            }

            let cell = covering.cells[state.cell_idx as usize].clone();
            let cursor = if state.store_cursor.is_empty() {
                None
            } else {
                Some(state.store_cursor.clone())
            };

            let page = retry_with_backoff(config, || async {
                let query = plan.per_cell_query_builder.build(&cell, cursor.as_deref());
                store.query(query).await
            })
            .await?;

            cells_touched += 1;
            state.scanned += page.items.len() as u64;
            let page_exhausted = page.cursor.as_ref().map(|c| c.is_empty()).unwrap_or(true);
            collected.extend(page.items);

            let surviving = post_filter_and_sort::<I, L>(
                dedup_by_primary_key::<I, L>(std::mem::take(&mut collected)),
                &plan.area,
                plan.earth_radius_km,
                false,
            );

            if surviving.len() >= page_size || (page_exhausted && state.cell_idx as usize + 1 >= covering.cells.len()) {
                let next_idx = if page_exhausted {
                    state.cell_idx + 1
                } else {
                    state.cell_idx
                };
                let resume_cursor = if page_exhausted {
                    Vec::new()
                } else {
                    page.cursor.map(|c| c.to_vec()).unwrap_or_default()
                };
                let resume_state = ContinuationToken {
                    cell_idx: next_idx,
                    store_cursor: resume_cursor,
                    scanned: state.scanned,
                };
                let encoded = if (next_idx as usize) < covering.cells.len() {
                    Some(token::encode(&resume_state, fingerprint)?)
                } else {
                    None
                };
                return Ok(QueryResult {
                    items: surviving,
                    continuation_token: encoded,
                    total_cells_queried: cells_touched,
                    total_items_scanned: state.scanned,
                    truncated: covering.truncated,
                });
            }

            collected = surviving;
            if page_exhausted {
                state.cell_idx += 1;
                state.store_cursor = Vec::new();
            } else {
                state.store_cursor = page.cursor.map(|c| c.to_vec()).unwrap_or_default();
            }
        }
    }
}
