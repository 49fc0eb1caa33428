//! Query entry point
//!
//! `cypher(store, graph, text, params)` runs the whole pipeline: parse
//! (through an LRU statement cache keyed by source text), transform, and
//! execute. Parameters are referenced as `$name` in the query text.

use crate::core::error::{GraphResult, ParseError};
use crate::core::value::ValueMap;
use crate::query::executor::{run_query, ExecCtx, ResultSet};
use crate::query::parser::ast::Statement;
use crate::query::parser::parse;
use crate::query::transform::transform_statement;
use crate::storage::GraphStore;
use log::debug;
use lru::LruCache;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};

static STATEMENT_CACHE: OnceLock<Mutex<LruCache<String, Arc<Statement>>>> = OnceLock::new();

fn parse_cached(store: &GraphStore, text: &str) -> Result<Arc<Statement>, ParseError> {
    let cache = STATEMENT_CACHE
        .get_or_init(|| Mutex::new(LruCache::new(store.statement_cache_capacity())));
    if let Some(stmt) = cache.lock().get(text) {
        debug!("statement cache hit");
        return Ok(stmt.clone());
    }
    let stmt = Arc::new(parse(text)?);
    cache.lock().put(text.to_string(), stmt.clone());
    Ok(stmt)
}

/// Parse, transform, and execute one Cypher statement against a graph.
pub fn cypher(
    store: &GraphStore,
    graph_name: &str,
    query_text: &str,
    params: &ValueMap,
) -> GraphResult<ResultSet> {
    let graph = store.graph_oid(graph_name)?;
    let stmt = parse_cached(store, query_text)?;
    let query = transform_statement(store, graph, &stmt)?;
    let ctx = ExecCtx { store, graph, params };
    run_query(&ctx, &query, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::Value;

    #[test]
    fn unknown_graph_is_reported() {
        let store = GraphStore::default();
        let err = cypher(&store, "nope", "RETURN 1", &ValueMap::new()).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn constant_return_round_trips() {
        let store = GraphStore::default();
        store.create_graph("g");
        let result = cypher(&store, "g", "RETURN 1 + 2 AS three", &ValueMap::new()).unwrap();
        assert_eq!(result.columns, vec!["three"]);
        assert_eq!(result.rows, vec![vec![Value::Int(3)]]);
    }

    #[test]
    fn parameters_substitute() {
        let store = GraphStore::default();
        store.create_graph("g");
        let mut params = ValueMap::new();
        params.insert("x".to_string(), Value::Int(41));
        let result = cypher(&store, "g", "RETURN $x + 1 AS y", &params).unwrap();
        assert_eq!(result.rows, vec![vec![Value::Int(42)]]);
    }

    #[test]
    fn missing_parameter_is_an_execution_error() {
        let store = GraphStore::default();
        store.create_graph("g");
        let err = cypher(&store, "g", "RETURN $absent", &ValueMap::new()).unwrap_err();
        assert!(err.to_string().contains("missing parameter"));
    }

    #[test]
    fn cache_serves_repeat_statements() {
        let store = GraphStore::default();
        store.create_graph("g");
        for _ in 0..3 {
            let result = cypher(&store, "g", "RETURN 5 AS five", &ValueMap::new()).unwrap();
            assert_eq!(result.rows.len(), 1);
        }
    }
}
