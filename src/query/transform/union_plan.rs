//! UNION planning
//!
//! The set-operation tree is normalized recursively: every leaf single
//! query becomes a subquery in the outer range table, column types are
//! unified position by position, and the trailing `ORDER BY`/`SKIP`/
//! `LIMIT` of the final branch attach to the outer query, where they may
//! reference output column names only. A leaf that carries its own
//! ordering keeps it and terminates the recursion as an opaque subquery.

use crate::core::error::PlanError;
use crate::core::value::Value;
use crate::query::parser::ast::{self, Clause, QueryNode, SortItem};
use crate::query::plan::expr::{BinOp, Builtin, CastTarget, Expr};
use crate::query::plan::{
    Query, RangeTblEntry, SetExpr, SetOpKind, SortKey, TargetEntry,
};
use crate::query::transform::scope::Scope;
use crate::query::transform::{clause, TransformCtx};

/// Inferred static type of a target expression. `Unknown` unifies with
/// anything; the host engine coerces what the front-end cannot see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeTag {
    Unknown,
    Bool,
    Int,
    Float,
    Numeric,
    String,
    List,
    Map,
    Vertex,
    Edge,
    Traversal,
    VariableEdge,
}

pub fn transform_union(
    ctx: &mut TransformCtx<'_>,
    root: &QueryNode,
) -> Result<Query, PlanError> {
    // Pull the trailing modifiers off the rightmost branch before
    // transforming; they belong to the outer query.
    let mut tree = root.clone();
    let trailing = take_trailing_modifiers(&mut tree);

    let mut outer = Query::default();
    let set_op = walk(ctx, &mut outer, &tree)?;

    // Unify column counts and types across the leaves.
    let columns = unify_leaf_columns(&mut outer, &tree)?;
    outer.targets = columns
        .iter()
        .map(|name| TargetEntry::new(Expr::unqualified(name.clone()), name.clone()))
        .collect();
    outer.set_op = Some(set_op);

    if let Some((order_by, skip, limit, span)) = trailing {
        for item in &order_by {
            let ast::Expr::Variable(name, name_span) = &item.expr else {
                return Err(PlanError::type_error(
                    "ORDER BY over a UNION may only reference output column names",
                    item.expr.span(),
                ));
            };
            if !columns.contains(name) {
                return Err(PlanError::type_error(
                    format!("ORDER BY column \"{}\" is not an output of the UNION", name),
                    *name_span,
                ));
            }
            outer.sort.push(SortKey {
                expr: Expr::unqualified(name.clone()),
                ascending: item.ascending,
            });
        }
        let scope = Scope::new();
        outer.skip = clause::transform_limit(ctx, &scope, skip.as_ref(), "SKIP")?;
        outer.limit = clause::transform_limit(ctx, &scope, limit.as_ref(), "LIMIT")?;
        let _ = span;
    }

    Ok(outer)
}

/// Detach ORDER BY/SKIP/LIMIT from the rightmost leaf's RETURN. A deeper
/// leaf that carries its own ordering is left alone.
#[allow(clippy::type_complexity)]
fn take_trailing_modifiers(
    node: &mut QueryNode,
) -> Option<(Vec<SortItem>, Option<ast::Expr>, Option<ast::Expr>, crate::core::span::Span)> {
    match node {
        QueryNode::Union { right, .. } => take_trailing_modifiers(right),
        QueryNode::Single(clauses) => match clauses.last_mut() {
            Some(Clause::Return { order_by, skip, limit, span, .. })
                if !order_by.is_empty() || skip.is_some() || limit.is_some() =>
            {
                Some((
                    std::mem::take(order_by),
                    skip.take(),
                    limit.take(),
                    *span,
                ))
            }
            _ => None,
        },
    }
}

fn walk(
    ctx: &mut TransformCtx<'_>,
    outer: &mut Query,
    node: &QueryNode,
) -> Result<SetExpr, PlanError> {
    match node {
        QueryNode::Single(clauses) => {
            if !matches!(clauses.last(), Some(Clause::Return { .. })) {
                return Err(PlanError::semantic(
                    "every branch of a UNION must end with RETURN",
                    clauses.last().map(|c| c.span()).unwrap_or_default(),
                ));
            }
            let mut scope = Scope::new();
            let leaf = clause::transform_clause_list(ctx, &mut scope, clauses)?;
            let alias = ctx.next_default_alias();
            let idx = outer.add_rte(RangeTblEntry::Subquery {
                query: Box::new(leaf),
                alias,
                lateral: false,
            });
            Ok(SetExpr::Rte(idx))
        }
        QueryNode::Union { all, left, right, .. } => {
            let l = walk(ctx, outer, left)?;
            let r = walk(ctx, outer, right)?;
            Ok(SetExpr::Op {
                kind: SetOpKind::Union,
                all: *all,
                left: Box::new(l),
                right: Box::new(r),
            })
        }
    }
}

/// Check column counts, compute the per-position common type, and coerce
/// UNKNOWN-typed constants by wrapping them in casts. Returns the output
/// column names (taken from the first leaf).
fn unify_leaf_columns(
    outer: &mut Query,
    tree: &QueryNode,
) -> Result<Vec<String>, PlanError> {
    let span = tree_span(tree);
    let mut leaves: Vec<&mut Query> = outer
        .range_table
        .iter_mut()
        .map(|rte| match rte {
            RangeTblEntry::Subquery { query, .. } => query.as_mut(),
            _ => unreachable!("union range table holds only subqueries"),
        })
        .collect();

    let arity = leaves[0].targets.len();
    for leaf in leaves.iter() {
        if leaf.targets.len() != arity {
            return Err(PlanError::type_error(
                "each UNION branch must have the same number of columns",
                span,
            ));
        }
    }

    let columns: Vec<String> = leaves[0].column_names();
    for position in 0..arity {
        let mut common = TypeTag::Unknown;
        for leaf in leaves.iter() {
            let tag = infer_type(&leaf.targets[position].expr);
            common = merge_types(common, tag, &columns[position], span)?;
        }
        if common == TypeTag::Unknown {
            continue;
        }
        for leaf in leaves.iter_mut() {
            let target = &mut leaf.targets[position];
            let tag = infer_type(&target.expr);
            if tag == TypeTag::Unknown && target.expr.is_const() {
                if let Some(cast) = cast_for(common) {
                    target.expr = Expr::Cast {
                        target: cast,
                        arg: Box::new(target.expr.clone()),
                    };
                }
            }
        }
    }
    Ok(columns)
}

fn tree_span(node: &QueryNode) -> crate::core::span::Span {
    match node {
        QueryNode::Union { span, .. } => *span,
        QueryNode::Single(clauses) => {
            clauses.first().map(|c| c.span()).unwrap_or_default()
        }
    }
}

fn infer_type(expr: &Expr) -> TypeTag {
    match expr {
        Expr::Const(v) => match v {
            Value::Null => TypeTag::Unknown,
            Value::Bool(_) => TypeTag::Bool,
            Value::Int(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::String(_) => TypeTag::String,
            Value::List(_) => TypeTag::List,
            Value::Map(_) => TypeTag::Map,
            Value::Vertex(_) => TypeTag::Vertex,
            Value::Edge(_) => TypeTag::Edge,
            Value::Path(_) => TypeTag::Traversal,
            Value::EdgeSet(_) => TypeTag::VariableEdge,
        },
        Expr::Cast { target, .. } => match target {
            CastTarget::Integer => TypeTag::Int,
            CastTarget::Float => TypeTag::Float,
            CastTarget::Numeric => TypeTag::Numeric,
            CastTarget::String => TypeTag::String,
            CastTarget::Boolean => TypeTag::Bool,
            CastTarget::Vertex => TypeTag::Vertex,
            CastTarget::Edge => TypeTag::Edge,
            CastTarget::Traversal => TypeTag::Traversal,
            CastTarget::VariableEdge => TypeTag::VariableEdge,
        },
        Expr::And(_) | Expr::Or(_) | Expr::Not(_) | Expr::IsNull { .. } => TypeTag::Bool,
        Expr::Op { op, .. } => match op {
            BinOp::Eq
            | BinOp::Ne
            | BinOp::Lt
            | BinOp::Le
            | BinOp::Gt
            | BinOp::Ge
            | BinOp::StartsWith
            | BinOp::EndsWith
            | BinOp::ContainsStr
            | BinOp::MapContains
            | BinOp::In => TypeTag::Bool,
            _ => TypeTag::Unknown,
        },
        Expr::ListCtor(_) => TypeTag::List,
        Expr::MapCtor(_) => TypeTag::Map,
        Expr::Func { func, .. } => match func {
            Builtin::Id | Builtin::StartId | Builtin::EndId | Builtin::Length | Builtin::Size => {
                TypeTag::Int
            }
            Builtin::Label | Builtin::Type | Builtin::ToString => TypeTag::String,
            Builtin::BuildVertex | Builtin::StartNode | Builtin::EndNode => TypeTag::Vertex,
            Builtin::BuildEdge => TypeTag::Edge,
            Builtin::BuildTraversal => TypeTag::Traversal,
            Builtin::Nodes | Builtin::Relationships | Builtin::Keys | Builtin::Range
            | Builtin::Split => TypeTag::List,
            Builtin::Properties => TypeTag::Map,
            Builtin::RegexMatch => TypeTag::Bool,
            _ => TypeTag::Unknown,
        },
        _ => TypeTag::Unknown,
    }
}

fn merge_types(
    a: TypeTag,
    b: TypeTag,
    column: &str,
    span: crate::core::span::Span,
) -> Result<TypeTag, PlanError> {
    use TypeTag::*;
    let merged = match (a, b) {
        (Unknown, x) | (x, Unknown) => x,
        (x, y) if x == y => x,
        (Int, Float) | (Float, Int) => Float,
        (Int, Numeric) | (Numeric, Int) => Numeric,
        (Float, Numeric) | (Numeric, Float) => Numeric,
        (x, y) => {
            return Err(PlanError::type_error(
                format!(
                    "UNION column \"{}\" mixes incompatible types {:?} and {:?}",
                    column, x, y
                ),
                span,
            ));
        }
    };
    Ok(merged)
}

fn cast_for(tag: TypeTag) -> Option<CastTarget> {
    match tag {
        TypeTag::Int => Some(CastTarget::Integer),
        TypeTag::Float => Some(CastTarget::Float),
        TypeTag::Numeric => Some(CastTarget::Numeric),
        TypeTag::String => Some(CastTarget::String),
        TypeTag::Bool => Some(CastTarget::Boolean),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::GraphError;
    use crate::query::parser::parse;
    use crate::query::transform::transform_statement;
    use crate::storage::GraphStore;

    fn plan(input: &str) -> Result<Query, GraphError> {
        let store = GraphStore::default();
        let graph = store.create_graph("g");
        let stmt = parse(input).map_err(GraphError::from)?;
        transform_statement(&store, graph, &stmt)
    }

    #[test]
    fn union_collects_leaves_into_the_outer_range_table() {
        let q = plan("RETURN 1 AS x UNION RETURN 2 AS x UNION ALL RETURN 3 AS x").unwrap();
        assert_eq!(q.range_table.len(), 3);
        match q.set_op {
            Some(SetExpr::Op { all: true, ref left, .. }) => {
                assert!(matches!(**left, SetExpr::Op { all: false, .. }));
            }
            ref other => panic!("expected set-op tree, got {:?}", other),
        }
        assert_eq!(q.column_names(), vec!["x"]);
    }

    #[test]
    fn column_count_mismatch_is_a_type_error() {
        let err = plan("RETURN 1 AS x UNION RETURN 1 AS x, 2 AS y").unwrap_err();
        assert!(err.to_string().contains("same number of columns"));
    }

    #[test]
    fn incompatible_column_types_are_rejected() {
        let err = plan("RETURN 1 AS x UNION RETURN \"s\" AS x").unwrap_err();
        assert!(err.to_string().contains("incompatible types"));
    }

    #[test]
    fn numeric_columns_widen() {
        assert!(plan("RETURN 1 AS x UNION RETURN 2.5 AS x").is_ok());
    }

    #[test]
    fn null_constants_coerce_to_the_common_type() {
        let q = plan("RETURN NULL AS x UNION RETURN 1 AS x").unwrap();
        let leaf = match &q.range_table[0] {
            RangeTblEntry::Subquery { query, .. } => query,
            other => panic!("expected subquery, got {:?}", other),
        };
        assert!(matches!(
            leaf.targets[0].expr,
            Expr::Cast { target: CastTarget::Integer, .. }
        ));
    }

    #[test]
    fn trailing_order_by_attaches_to_the_outer_query() {
        let q = plan("RETURN 2 AS x UNION RETURN 1 AS x ORDER BY x LIMIT 1").unwrap();
        assert_eq!(q.sort.len(), 1);
        assert!(q.limit.is_some());
        // The leaves themselves carry no ordering.
        for rte in &q.range_table {
            if let RangeTblEntry::Subquery { query, .. } = rte {
                assert!(query.sort.is_empty());
            }
        }
    }

    #[test]
    fn order_by_over_union_must_name_an_output_column() {
        let err = plan("RETURN 1 AS x UNION RETURN 2 AS x ORDER BY x + 1").unwrap_err();
        assert!(err.to_string().contains("output column names"));
        let err = plan("RETURN 1 AS x UNION RETURN 2 AS x ORDER BY y").unwrap_err();
        assert!(err.to_string().contains("not an output"));
    }
}
