//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::rc::Rc;

use memo_optimizer::catalog::{
    Catalog, ColumnStatistics, Histogram, InMemoryCatalog, IndexDef, TableDef,
};
use memo_optimizer::expr::ScalarValue;
use memo_optimizer::operator::PhysicalOperator;
use memo_optimizer::options::QueryOptions;
use memo_optimizer::plan::Plan;
use memo_optimizer::planner::Planner;
use serde::Deserialize;

/// Scale factor 0.1 of the TPC-H schema, reduced to the columns the tests join and filter on.
const TPCH_STATS: &str = r#"
{
  "tables": [
    {
      "name": "region", "rows": 5,
      "columns": [ { "name": "r_regionkey", "distinct": 5 }, { "name": "r_name", "distinct": 5 } ]
    },
    {
      "name": "nation", "rows": 25,
      "columns": [
        { "name": "n_nationkey", "distinct": 25 },
        { "name": "n_regionkey", "distinct": 5 },
        { "name": "n_name", "distinct": 25 }
      ]
    },
    {
      "name": "supplier", "rows": 1000,
      "columns": [
        { "name": "s_suppkey", "distinct": 1000 },
        { "name": "s_nationkey", "distinct": 25 },
        { "name": "s_acctbal", "distinct": 1000, "histogram": [-1000, 0, 2500, 5000, 7500, 10000] }
      ],
      "indexes": [ { "name": "supplier_pk", "columns": ["s_suppkey"], "unique": true } ]
    },
    {
      "name": "customer", "rows": 15000,
      "columns": [
        { "name": "c_custkey", "distinct": 15000 },
        { "name": "c_nationkey", "distinct": 25 },
        { "name": "c_mktsegment", "distinct": 5 }
      ],
      "indexes": [ { "name": "customer_pk", "columns": ["c_custkey"], "unique": true } ]
    },
    {
      "name": "orders", "rows": 150000,
      "columns": [
        { "name": "o_orderkey", "distinct": 150000 },
        { "name": "o_custkey", "distinct": 10000 },
        { "name": "o_totalprice", "distinct": 140000, "histogram": [0, 50000, 100000, 200000, 400000, 600000] },
        { "name": "o_orderstatus", "distinct": 3, "null_fraction": 0.0 }
      ],
      "indexes": [ { "name": "orders_pk", "columns": ["o_orderkey"], "unique": true } ]
    },
    {
      "name": "lineitem", "rows": 600000,
      "columns": [
        { "name": "l_orderkey", "distinct": 150000 },
        { "name": "l_partkey", "distinct": 20000 },
        { "name": "l_suppkey", "distinct": 1000 },
        { "name": "l_quantity", "distinct": 50, "histogram": [1, 10, 20, 30, 40, 50] }
      ]
    },
    {
      "name": "part", "rows": 20000,
      "columns": [ { "name": "p_partkey", "distinct": 20000 }, { "name": "p_brand", "distinct": 25 } ]
    },
    {
      "name": "partsupp", "rows": 80000,
      "columns": [ { "name": "ps_partkey", "distinct": 20000 }, { "name": "ps_suppkey", "distinct": 1000 } ]
    }
  ]
}
"#;

#[derive(Deserialize)]
struct CatalogFixture {
    tables: Vec<TableFixture>,
}

#[derive(Deserialize)]
struct TableFixture {
    name: String,
    rows: f64,
    columns: Vec<ColumnFixture>,
    #[serde(default)]
    indexes: Vec<IndexFixture>,
}

#[derive(Deserialize)]
struct ColumnFixture {
    name: String,
    distinct: u64,
    #[serde(default)]
    null_fraction: f64,
    #[serde(default)]
    histogram: Option<Vec<f64>>,
}

#[derive(Deserialize)]
struct IndexFixture {
    name: String,
    columns: Vec<String>,
    #[serde(default)]
    unique: bool,
}

fn load_catalog(json: &str) -> InMemoryCatalog {
    let fixture: CatalogFixture = serde_json::from_str(json).unwrap();
    let mut catalog = InMemoryCatalog::new();
    for table in fixture.tables {
        catalog.add_table(
            TableDef::new(&table.name, table.columns.iter().map(|c| c.name.clone())),
            table.rows,
        );
        for index in table.indexes {
            catalog.add_index(
                &table.name,
                IndexDef::new(index.name, index.columns, index.unique),
            );
        }
        for column in table.columns {
            let mut stats = ColumnStatistics::new(column.distinct, column.null_fraction);
            if let Some(bounds) = column.histogram {
                stats = stats.with_histogram(Histogram::new(
                    bounds.into_iter().map(ScalarValue::from).collect(),
                ));
            }
            catalog.add_column_stats(&table.name, &column.name, stats);
        }
    }
    catalog
}

pub fn tpch_catalog() -> Rc<dyn Catalog> {
    Rc::new(load_catalog(TPCH_STATS))
}

pub fn planner(options: QueryOptions) -> Planner {
    Planner::new(tpch_catalog(), options).unwrap()
}

/// Names of the physical operators in the main tree of `plan`, in breadth first order.
pub fn physical_operators(plan: &Plan) -> Vec<&'static str> {
    plan.bfs_iterator()
        .filter_map(|n| n.operator().as_physical().map(PhysicalOperator::name))
        .collect()
}

pub fn contains_operator(plan: &Plan, name: &str) -> bool {
    physical_operators(plan).contains(&name)
}
