//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use graft::api::cypher;
use graft::catalog::GraphOid;
use graft::core::value::{Value, ValueMap};
use graft::query::executor::ResultSet;
use graft::storage::GraphStore;
use std::collections::BTreeMap;

pub const GRAPH: &str = "test_graph";

pub fn setup() -> (GraphStore, GraphOid) {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = GraphStore::default();
    let graph = store.create_graph(GRAPH);
    (store, graph)
}

pub fn run(store: &GraphStore, query: &str) -> ResultSet {
    cypher(store, GRAPH, query, &ValueMap::new())
        .unwrap_or_else(|e| panic!("query failed: {}\n  {}", query, e))
}

pub fn run_err(store: &GraphStore, query: &str) -> graft::core::error::GraphError {
    match cypher(store, GRAPH, query, &ValueMap::new()) {
        Ok(_) => panic!("query unexpectedly succeeded: {}", query),
        Err(e) => e,
    }
}

pub fn props(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Single-column result as a value list.
pub fn column(result: &ResultSet) -> Vec<Value> {
    result.rows.iter().map(|r| r[0].clone()).collect()
}

pub fn ints(result: &ResultSet) -> Vec<i64> {
    result
        .rows
        .iter()
        .map(|r| match &r[0] {
            Value::Int(i) => *i,
            other => panic!("expected integer, got {:?}", other),
        })
        .collect()
}
