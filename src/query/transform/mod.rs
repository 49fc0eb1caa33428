//! AST-to-relational transformer
//!
//! Walks the clause list in program order and emits one nested subquery per
//! clause, so the final `Query` mirrors a chain of
//! `previous-clause → current-clause` joins. Pattern lowering, expression
//! lowering, set operations, and writer packing each live in their own
//! module.

pub mod clause;
pub mod expr;
pub mod pattern;
pub mod scope;
pub mod union_plan;
pub mod writer;

use crate::catalog::GraphOid;
use crate::core::error::GraphResult;
use crate::query::parser::ast::{QueryNode, Statement};
use crate::query::plan::Query;
use crate::storage::GraphStore;
use log::debug;
use scope::Scope;

/// Shared transform state: the catalog handle and the generated-name
/// counter. Anonymous entities and clause subqueries draw from the same
/// monotonically increasing sequence, so no two generated names in one
/// query can collide.
pub struct TransformCtx<'s> {
    pub store: &'s GraphStore,
    pub graph: GraphOid,
    counter: u32,
}

impl<'s> TransformCtx<'s> {
    pub fn new(store: &'s GraphStore, graph: GraphOid) -> Self {
        Self { store, graph, counter: 0 }
    }

    /// Deterministic generated name for anonymous entities and internal
    /// subquery aliases.
    pub fn next_default_alias(&mut self) -> String {
        let name = format!("_default_{}", self.counter);
        self.counter += 1;
        name
    }
}

/// Transform one parsed statement into the relational query tree.
pub fn transform_statement(
    store: &GraphStore,
    graph: GraphOid,
    stmt: &Statement,
) -> GraphResult<Query> {
    let mut ctx = TransformCtx::new(store, graph);
    let query = match &stmt.root {
        QueryNode::Single(clauses) => {
            let mut scope = Scope::new();
            clause::transform_clause_list(&mut ctx, &mut scope, clauses)?
        }
        union @ QueryNode::Union { .. } => union_plan::transform_union(&mut ctx, union)?,
    };
    debug!(
        "transformed statement: {} range table entries, {} targets",
        query.range_table.len(),
        query.targets.len()
    );
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::PlanError;
    use crate::query::parser::parse;
    use crate::storage::GraphStore;

    fn plan(input: &str) -> GraphResult<Query> {
        let store = GraphStore::default();
        let graph = store.create_graph("g");
        let stmt = parse(input).map_err(crate::core::error::GraphError::from)?;
        transform_statement(&store, graph, &stmt)
    }

    #[test]
    fn generated_names_are_unique() {
        let store = GraphStore::default();
        let graph = store.create_graph("g");
        let mut ctx = TransformCtx::new(&store, graph);
        let a = ctx.next_default_alias();
        let b = ctx.next_default_alias();
        assert_ne!(a, b);
        assert!(a.starts_with("_default_"));
    }

    #[test]
    fn call_yield_is_not_supported() {
        let err = plan("CALL db.labels() YIELD label RETURN label").unwrap_err();
        assert!(matches!(
            err,
            crate::core::error::GraphError::Plan(PlanError::NotSupported { .. })
        ));
    }

    #[test]
    fn query_must_end_with_projection_or_writer() {
        assert!(plan("MATCH (a)").is_err());
        assert!(plan("MATCH (a) RETURN a").is_ok());
        assert!(plan("CREATE (a)").is_ok());
    }

    #[test]
    fn with_star_is_not_supported() {
        let err = plan("MATCH (a) WITH * RETURN 1").unwrap_err();
        assert!(matches!(
            err,
            crate::core::error::GraphError::Plan(PlanError::NotSupported { .. })
        ));
    }
}
