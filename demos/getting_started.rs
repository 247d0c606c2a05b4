use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use geoquery_core::{
    CellScheme, EntityLocation, FanoutExecutor, GeoQuery, PerCellQueryBuilder, Point, QueryConfig,
    Result, StoreDriver, StorePage,
};

/// A city record, as a caller's store might return it. `geoquery-core`
/// never sees this type directly; it only sees it through `EntityLocation`.
#[derive(Debug, Clone)]
struct City {
    name: String,
    point: Point,
}

struct CityLocation;

impl EntityLocation<City> for CityLocation {
    fn primary_key(city: &City) -> String {
        city.name.clone()
    }

    fn location(city: &City) -> Option<Point> {
        Some(city.point)
    }
}

/// The opaque per-cell query this demo's store understands: just a cell id.
struct CityQuery {
    cell: String,
}

struct CityQueryBuilder;

impl PerCellQueryBuilder<CityQuery> for CityQueryBuilder {
    fn build(&self, cell: &str, _cursor: Option<&[u8]>) -> CityQuery {
        CityQuery {
            cell: cell.to_string(),
        }
    }
}

/// A toy store keyed by GeoHash prefix, standing in for a real
/// partition-keyed table (DynamoDB, Bigtable, etc).
struct CityStore {
    by_cell: HashMap<String, Vec<City>>,
}

#[async_trait]
impl StoreDriver<CityQuery, City> for CityStore {
    async fn query(&self, store_query: CityQuery) -> Result<StorePage<City>> {
        let items = self.by_cell.get(&store_query.cell).cloned().unwrap_or_default();
        Ok(StorePage { items, cursor: None })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("geoquery-core - Getting Started");
    println!("================================");

    let precision = 5;
    let cities = vec![
        City {
            name: "New York".into(),
            point: Point::new(40.7128, -74.0060),
        },
        City {
            name: "Brooklyn".into(),
            point: Point::new(40.6782, -73.9442),
        },
        City {
            name: "Newark".into(),
            point: Point::new(40.7357, -74.1724),
        },
        City {
            name: "London".into(),
            point: Point::new(51.5074, -0.1278),
        },
        City {
            name: "Tokyo".into(),
            point: Point::new(35.6762, 139.6503),
        },
    ];

    let codec = geoquery_core::codec_for(CellScheme::GeoHash);
    let mut by_cell: HashMap<String, Vec<City>> = HashMap::new();
    for city in cities {
        let cell = codec.encode(&city.point, precision)?;
        by_cell.entry(cell).or_default().push(city);
    }
    let store = Arc::new(CityStore { by_cell });
    println!("✓ Indexed cities into a GeoHash-partitioned store");

    let config = QueryConfig::default();
    let plan = GeoQuery::<CityQuery>::new()
        .scheme(CellScheme::GeoHash)
        .precision(precision)
        .cap(Point::new(40.7128, -74.0060), 100.0)
        .per_cell_query_builder(Arc::new(CityQueryBuilder))
        .build_with_config(&config)?;

    let result = FanoutExecutor::execute::<CityQuery, City, CityStore, CityLocation>(
        &plan, store, &config,
    )
    .await?;

    println!(
        "✓ Found {} cities within 100km of New York ({} cells queried)",
        result.items.len(),
        result.total_cells_queried
    );
    for city in &result.items {
        println!("  - {} at ({:.4}, {:.4})", city.name, city.point.lat, city.point.lon);
    }

    Ok(())
}
