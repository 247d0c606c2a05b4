//! End-to-end scenarios driven against an in-memory fake `StoreDriver`,
//! exercising `GeoQuery` and `FanoutExecutor` the way a real caller would.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use geoquery_core::{
    codec_for, CellScheme, EntityLocation, FanoutExecutor, GeoQuery, PerCellQueryBuilder, Point,
    QueryConfig, Result as GeoResult, StoreDriver, StorePage,
};

const STORE_PAGE_SIZE: usize = 2;

#[derive(Debug, Clone, PartialEq)]
struct Entity {
    id: String,
    point: Point,
}

fn entity(id: &str, lat: f64, lon: f64) -> Entity {
    Entity {
        id: id.to_string(),
        point: Point::new(lat, lon),
    }
}

struct EntityLoc;

impl EntityLocation<Entity> for EntityLoc {
    fn primary_key(entity: &Entity) -> String {
        entity.id.clone()
    }

    fn location(entity: &Entity) -> Option<Point> {
        Some(entity.point)
    }
}

struct CellQuery {
    cell: String,
    offset: usize,
}

struct CellQueryBuilder;

impl PerCellQueryBuilder<CellQuery> for CellQueryBuilder {
    fn build(&self, cell: &str, cursor: Option<&[u8]>) -> CellQuery {
        let offset = cursor
            .and_then(|bytes| bytes.get(0..4))
            .map(|bytes| u32::from_be_bytes(bytes.try_into().unwrap()) as usize)
            .unwrap_or(0);
        CellQuery {
            cell: cell.to_string(),
            offset,
        }
    }
}

/// An in-memory store, partitioned by cell the same way a real
/// partition-keyed table would be, with its own store-native pagination
/// (`STORE_PAGE_SIZE` items per call) independent of the query's page
/// size.
struct FakeStore {
    by_cell: HashMap<String, Vec<Entity>>,
}

impl FakeStore {
    fn new(codec: &dyn geoquery_core::CellCodec, precision: u8, entities: Vec<Entity>) -> Self {
        let mut by_cell: HashMap<String, Vec<Entity>> = HashMap::new();
        for entity in entities {
            let cell = codec.encode(&entity.point, precision).unwrap();
            by_cell.entry(cell).or_default().push(entity);
        }
        Self { by_cell }
    }
}

#[async_trait]
impl StoreDriver<CellQuery, Entity> for FakeStore {
    async fn query(&self, store_query: CellQuery) -> GeoResult<StorePage<Entity>> {
        let all = self
            .by_cell
            .get(&store_query.cell)
            .cloned()
            .unwrap_or_default();
        let end = (store_query.offset + STORE_PAGE_SIZE).min(all.len());
        let items = all
            .get(store_query.offset..end)
            .map(|slice| slice.to_vec())
            .unwrap_or_default();
        let cursor = if end < all.len() {
            Some(Bytes::copy_from_slice(&(end as u32).to_be_bytes()))
        } else {
            None
        };
        Ok(StorePage { items, cursor })
    }
}

fn sorted_ids(entities: &[Entity]) -> Vec<String> {
    let mut ids: Vec<_> = entities.iter().map(|e| e.id.clone()).collect();
    ids.sort();
    ids
}

#[test]
fn encode_precision_matches_geohash_length() {
    let codec = codec_for(CellScheme::GeoHash);
    let point = Point::new(37.7749, -122.4194);
    let id = codec.encode(&point, 7).unwrap();
    assert_eq!(id.len(), 7);
    let back = codec.decode(&id).unwrap();
    assert!(back.approx_eq(&point, 0.01));
}

#[tokio::test]
async fn date_line_cap_excludes_points_beyond_radius() {
    let scheme = CellScheme::H3;
    let precision = 9;
    let codec = codec_for(scheme);

    let included = vec![
        entity("a", 0.0, 179.5),
        entity("b", 0.5, 179.8),
        entity("c", -0.5, 179.7),
        entity("d", 0.0, -179.5),
        entity("e", 0.5, -179.8),
        entity("f", -0.5, -179.7),
        entity("g", 0.0, -179.0),
    ];
    let excluded = vec![entity("h", 0.0, 175.0), entity("i", 0.0, -175.0)];

    let mut all = included.clone();
    all.extend(excluded);

    let store = Arc::new(FakeStore::new(codec.as_ref(), precision, all));
    let config = QueryConfig::default();
    let plan = GeoQuery::<CellQuery>::new()
        .scheme(scheme)
        .precision(precision)
        .cap(Point::new(0.0, -179.0), 200.0)
        .per_cell_query_builder(Arc::new(CellQueryBuilder))
        .max_cells(2_000_000)
        .build_with_config(&config)
        .unwrap();

    let result = FanoutExecutor::execute::<CellQuery, Entity, FakeStore, EntityLoc>(&plan, store, &config)
        .await
        .unwrap();

    assert_eq!(sorted_ids(&result.items), sorted_ids(&included));
    assert!(!result.truncated);
}

#[tokio::test]
async fn polar_cap_includes_every_longitude_near_the_pole() {
    let scheme = CellScheme::H3;
    let precision = 9;
    let codec = codec_for(scheme);

    let included = vec![
        entity("north0", -89.5, 0.0),
        entity("east90", -89.5, 90.0),
        entity("south180", -89.5, 180.0),
        entity("west-90", -89.5, -90.0),
    ];
    let excluded = vec![entity("too-far", -88.5, 0.0)];

    let mut all = included.clone();
    all.extend(excluded);

    let store = Arc::new(FakeStore::new(codec.as_ref(), precision, all));
    let config = QueryConfig::default();
    let plan = GeoQuery::<CellQuery>::new()
        .scheme(scheme)
        .precision(precision)
        .cap(Point::new(-89.5, 0.0), 100.0)
        .per_cell_query_builder(Arc::new(CellQueryBuilder))
        .max_cells(2_000_000)
        .build_with_config(&config)
        .unwrap();

    let result = FanoutExecutor::execute::<CellQuery, Entity, FakeStore, EntityLoc>(&plan, store, &config)
        .await
        .unwrap();

    assert_eq!(sorted_ids(&result.items), sorted_ids(&included));
}

#[tokio::test]
async fn wrapping_bbox_matches_only_points_inside_it() {
    use geoquery_core::BoundingBox;

    let scheme = CellScheme::GeoHash;
    let precision = 3;
    let codec = codec_for(scheme);

    let included = vec![entity("inside-east", 0.0, 179.0), entity("inside-west", 0.0, -179.0)];
    let excluded = vec![
        entity("too-far-east", 0.0, 170.0),
        entity("too-far-west", 0.0, -170.0),
        entity("wrong-lat", 2.0, 179.0),
    ];

    let mut all = included.clone();
    all.extend(excluded);

    let store = Arc::new(FakeStore::new(codec.as_ref(), precision, all));
    let config = QueryConfig::default();
    let bbox = BoundingBox::new(Point::new(-1.0, 178.0), Point::new(1.0, -178.0));
    let plan = GeoQuery::<CellQuery>::new()
        .scheme(scheme)
        .precision(precision)
        .bbox(bbox)
        .per_cell_query_builder(Arc::new(CellQueryBuilder))
        .build_with_config(&config)
        .unwrap();

    let result = FanoutExecutor::execute::<CellQuery, Entity, FakeStore, EntityLoc>(&plan, store, &config)
        .await
        .unwrap();

    assert_eq!(sorted_ids(&result.items), sorted_ids(&included));
}

#[tokio::test]
async fn paginated_and_fanout_modes_agree_on_result_set() {
    let scheme = CellScheme::GeoHash;
    let precision = 6;
    let codec = codec_for(scheme);
    let base = Point::new(37.7749, -122.4194);

    let mut grid = Vec::new();
    for row in 0..5 {
        for col in 0..4 {
            let id = format!("p{row}_{col}");
            let point = Point::new(base.lat + row as f64 * 0.01, base.lon + col as f64 * 0.01);
            grid.push(Entity { id, point });
        }
    }

    let store = Arc::new(FakeStore::new(codec.as_ref(), precision, grid));
    let config = QueryConfig::default();

    let fanout_plan = GeoQuery::<CellQuery>::new()
        .scheme(scheme)
        .precision(precision)
        .cap(base, 20.0)
        .per_cell_query_builder(Arc::new(CellQueryBuilder))
        .build_with_config(&config)
        .unwrap();
    let fanout_result = FanoutExecutor::execute::<CellQuery, Entity, FakeStore, EntityLoc>(&fanout_plan, store.clone(), &config)
        .await
        .unwrap();

    let mut paginated_ids = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let mut builder = GeoQuery::<CellQuery>::new()
            .scheme(scheme)
            .precision(precision)
            .cap(base, 20.0)
            .per_cell_query_builder(Arc::new(CellQueryBuilder))
            .page_size(5);
        if let Some(t) = &token {
            builder = builder.continuation_token(t.clone());
        }
        let plan = builder.build_with_config(&config).unwrap();
        let page = FanoutExecutor::execute::<CellQuery, Entity, FakeStore, EntityLoc>(&plan, store.clone(), &config)
            .await
            .unwrap();
        paginated_ids.extend(page.items.iter().map(|e| e.id.clone()));
        token = page.continuation_token;
        if token.is_none() {
            break;
        }
    }
    paginated_ids.sort();

    assert_eq!(paginated_ids, sorted_ids(&fanout_result.items));
}

#[tokio::test]
async fn oversized_covering_truncates_instead_of_failing() {
    let scheme = CellScheme::GeoHash;
    let precision = 5;
    let codec = codec_for(scheme);
    let center = Point::new(37.7749, -122.4194);

    let entities = vec![
        entity("nearby-a", center.lat + 0.01, center.lon),
        entity("nearby-b", center.lat, center.lon + 0.01),
        entity("nearby-c", center.lat - 0.01, center.lon - 0.01),
    ];

    let store = Arc::new(FakeStore::new(codec.as_ref(), precision, entities));
    let config = QueryConfig::default();
    let plan = GeoQuery::<CellQuery>::new()
        .scheme(scheme)
        .precision(precision)
        .cap(center, 50.0)
        .per_cell_query_builder(Arc::new(CellQueryBuilder))
        .max_cells(50)
        .allow_truncation(true)
        .build_with_config(&config)
        .unwrap();

    let result = FanoutExecutor::execute::<CellQuery, Entity, FakeStore, EntityLoc>(&plan, store, &config)
        .await
        .unwrap();

    assert!(result.truncated);
}
