//! Clause pipeline
//!
//! Clauses are stitched left to right: each one wraps its predecessor as a
//! subquery range-table entry, so the final tree is a chain of nested
//! `previous → current` joins. `OPTIONAL MATCH` joins its predecessor with
//! a lateral LEFT JOIN; projections define a fresh namespace; writer
//! clauses pack directives and pass the previous columns through.

use crate::core::error::PlanError;
use crate::core::span::Span;
use crate::query::parser::ast::{self, Clause, ReturnItems, SortItem};
use crate::query::plan::expr::{Builtin, Expr};
use crate::query::plan::{FromItem, JoinKind, Query, RangeTblEntry, SortKey, TargetEntry};
use crate::query::transform::expr::transform_expr;
use crate::query::transform::scope::{BindingKind, Scope};
use crate::query::transform::{pattern, writer, TransformCtx};
use log::debug;

pub fn transform_clause_list(
    ctx: &mut TransformCtx<'_>,
    scope: &mut Scope,
    clauses: &[Clause],
) -> Result<Query, PlanError> {
    validate_clause_order(clauses)?;

    let mut prev: Option<Query> = None;
    let last = clauses.len() - 1;
    for (i, clause) in clauses.iter().enumerate() {
        scope.advance();
        let terminal = i == last;
        debug!("transforming clause {}/{}", i + 1, clauses.len());
        let query = match clause {
            Clause::Match { optional, pattern, where_clause, span } => {
                if *optional && prev.is_some() {
                    transform_optional_match(
                        ctx,
                        scope,
                        prev.take().unwrap(),
                        pattern,
                        where_clause,
                        *span,
                    )?
                } else {
                    transform_match(ctx, scope, prev.take(), pattern, where_clause)?
                }
            }
            Clause::Unwind { expr, alias, span } => {
                transform_unwind(ctx, scope, prev.take(), expr, alias, *span)?
            }
            Clause::With {
                distinct,
                items,
                order_by,
                skip,
                limit,
                where_clause,
                span,
            } => transform_with(
                ctx,
                scope,
                prev.take(),
                items,
                *distinct,
                order_by,
                skip.as_ref(),
                limit.as_ref(),
                where_clause.as_ref(),
                *span,
            )?,
            Clause::Return { distinct, items, order_by, skip, limit, span } => {
                transform_project(
                    ctx,
                    scope,
                    prev.take(),
                    items,
                    *distinct,
                    order_by,
                    skip.as_ref(),
                    limit.as_ref(),
                    false,
                    *span,
                )?
            }
            Clause::Create { pattern, span } => {
                writer::transform_create(ctx, scope, prev.take(), pattern, terminal, *span)?
            }
            Clause::Merge { path, actions, span } => {
                writer::transform_merge(ctx, scope, prev.take(), path, actions, terminal, *span)?
            }
            Clause::Set { items, is_remove, span } => {
                writer::transform_set(ctx, scope, prev.take(), items, *is_remove, terminal, *span)?
            }
            Clause::Delete { detach, exprs, span } => {
                writer::transform_delete(ctx, scope, prev.take(), exprs, *detach, terminal, *span)?
            }
            Clause::CallYield { span, .. } => {
                return Err(PlanError::not_supported(
                    "CALL ... YIELD is not supported",
                    *span,
                ));
            }
        };
        prev = Some(query);
    }
    Ok(prev.expect("clause list is never empty"))
}

fn validate_clause_order(clauses: &[Clause]) -> Result<(), PlanError> {
    let mut updating_seen = false;
    let last = clauses.len() - 1;
    for (i, clause) in clauses.iter().enumerate() {
        match clause {
            Clause::Return { span, .. } if i != last => {
                return Err(PlanError::semantic(
                    "RETURN can only appear at the end of a query",
                    *span,
                ));
            }
            Clause::Match { span, .. } | Clause::Unwind { span, .. } if updating_seen => {
                return Err(PlanError::semantic(
                    "reading clauses cannot follow an update clause without WITH",
                    *span,
                ));
            }
            Clause::With { .. } => updating_seen = false,
            c if c.is_updating() => updating_seen = true,
            _ => {}
        }
    }
    let ender = &clauses[last];
    if !(matches!(ender, Clause::Return { .. }) || ender.is_updating()) {
        return Err(PlanError::semantic(
            "query must end with RETURN or an update clause",
            ender.span(),
        ));
    }
    Ok(())
}

/// Wrap the previous clause's query as this query's first range-table
/// entry and repoint the scope at its columns. With `passthrough`, the
/// previous output columns are re-projected under their own names.
pub(crate) fn wrap_prev(
    ctx: &mut TransformCtx<'_>,
    scope: &mut Scope,
    query: &mut Query,
    prev: Query,
    passthrough: bool,
) -> String {
    let alias = ctx.next_default_alias();
    let cols = prev.column_names();
    let idx = query.add_rte(RangeTblEntry::Subquery {
        query: Box::new(prev),
        alias: alias.clone(),
        lateral: false,
    });
    query.from.push(FromItem::Rte(idx));
    if passthrough {
        for name in &cols {
            query
                .targets
                .push(TargetEntry::new(Expr::column(&alias, name), name.clone()));
        }
    }
    scope.rebind_all(&alias);
    alias
}

fn transform_match(
    ctx: &mut TransformCtx<'_>,
    scope: &mut Scope,
    prev: Option<Query>,
    paths: &[ast::PathPattern],
    where_clause: &Option<ast::Expr>,
) -> Result<Query, PlanError> {
    let mut query = Query::default();
    if let Some(p) = prev {
        wrap_prev(ctx, scope, &mut query, p, true);
    }
    pattern::transform_match_pattern(ctx, scope, &mut query, paths, false)?;
    if let Some(w) = where_clause {
        let lowered = transform_expr(ctx, scope, w)?;
        query.add_qual(lowered);
    }
    Ok(query)
}

/// `OPTIONAL MATCH` after another clause: a lateral LEFT JOIN whose right
/// side is the match transformed on its own. Left columns take precedence
/// in the merged output; new right columns are appended.
fn transform_optional_match(
    ctx: &mut TransformCtx<'_>,
    scope: &mut Scope,
    prev: Query,
    paths: &[ast::PathPattern],
    where_clause: &Option<ast::Expr>,
    span: Span,
) -> Result<Query, PlanError> {
    let mut query = Query::default();

    let left_alias = ctx.next_default_alias();
    let left_cols = prev.column_names();
    let left_idx = query.add_rte(RangeTblEntry::Subquery {
        query: Box::new(prev),
        alias: left_alias.clone(),
        lateral: false,
    });

    let mut right_scope = pattern::sub_scope(scope);
    let mut right = Query::default();
    pattern::transform_match_pattern(ctx, &mut right_scope, &mut right, paths, false)?;
    if let Some(w) = where_clause {
        let lowered = transform_expr(ctx, &right_scope, w)?;
        right.add_qual(lowered);
    }
    let right_cols = right.column_names();
    let right_alias = ctx.next_default_alias();
    let right_idx = query.add_rte(RangeTblEntry::Subquery {
        query: Box::new(right),
        alias: right_alias.clone(),
        lateral: true,
    });

    query.from.push(FromItem::Join {
        kind: JoinKind::LeftLateral,
        left: Box::new(FromItem::Rte(left_idx)),
        right: Box::new(FromItem::Rte(right_idx)),
        qual: None,
    });

    for name in &left_cols {
        query
            .targets
            .push(TargetEntry::new(Expr::column(&left_alias, name), name.clone()));
    }
    for name in &right_cols {
        if !left_cols.contains(name) {
            query
                .targets
                .push(TargetEntry::new(Expr::column(&right_alias, name), name.clone()));
        }
    }

    scope.rebind_all(&left_alias);
    for binding in right_scope.iter().cloned().collect::<Vec<_>>() {
        if !scope.contains(&binding.name) && right_cols.contains(&binding.name) {
            scope.declare(
                &binding.name,
                binding.kind,
                Expr::column(&right_alias, binding.name.clone()),
                span,
            )?;
        }
    }

    Ok(query)
}

fn transform_unwind(
    ctx: &mut TransformCtx<'_>,
    scope: &mut Scope,
    prev: Option<Query>,
    expr: &ast::Expr,
    alias: &str,
    span: Span,
) -> Result<Query, PlanError> {
    let mut query = Query::default();
    if let Some(p) = prev {
        wrap_prev(ctx, scope, &mut query, p, true);
    }
    let lowered = transform_expr(ctx, scope, expr)?;
    if query.targets.iter().any(|t| t.name == alias) || scope.contains(alias) {
        return Err(PlanError::binding(
            format!("duplicate alias \"{}\"", alias),
            span,
        ));
    }
    query.targets.push(TargetEntry::new(
        Expr::func(Builtin::Unnest, vec![lowered]),
        alias,
    ));
    scope.declare(alias, BindingKind::Scalar, Expr::unqualified(alias), span)?;
    Ok(query)
}

#[allow(clippy::too_many_arguments)]
fn transform_with(
    ctx: &mut TransformCtx<'_>,
    scope: &mut Scope,
    prev: Option<Query>,
    items: &ReturnItems,
    distinct: bool,
    order_by: &[SortItem],
    skip: Option<&ast::Expr>,
    limit: Option<&ast::Expr>,
    where_clause: Option<&ast::Expr>,
    span: Span,
) -> Result<Query, PlanError> {
    let projection = transform_project(
        ctx, scope, prev, items, distinct, order_by, skip, limit, true, span,
    )?;
    match where_clause {
        None => Ok(projection),
        Some(w) => {
            // The filter applies downstream of the projection, over its
            // output columns.
            let mut outer = Query::default();
            wrap_prev(ctx, scope, &mut outer, projection, true);
            let lowered = transform_expr(ctx, scope, w)?;
            outer.add_qual(lowered);
            Ok(outer)
        }
    }
}

/// Shared shape of `RETURN` and `WITH`.
#[allow(clippy::too_many_arguments)]
fn transform_project(
    ctx: &mut TransformCtx<'_>,
    scope: &mut Scope,
    prev: Option<Query>,
    items: &ReturnItems,
    distinct: bool,
    order_by: &[SortItem],
    skip: Option<&ast::Expr>,
    limit: Option<&ast::Expr>,
    is_with: bool,
    span: Span,
) -> Result<Query, PlanError> {
    if items.star {
        return Err(PlanError::not_supported(
            format!("{} * is not supported", if is_with { "WITH" } else { "RETURN" }),
            span,
        ));
    }

    let mut query = Query::default();
    if let Some(p) = prev {
        wrap_prev(ctx, scope, &mut query, p, false);
    }

    let mut outputs: Vec<(String, BindingKind)> = Vec::new();
    for item in &items.items {
        let name = match &item.alias {
            Some(alias) => alias.clone(),
            None => match &item.expr {
                ast::Expr::Variable(v, _) => v.clone(),
                _ if is_with => {
                    return Err(PlanError::semantic(
                        "expression in WITH must be aliased",
                        item.span,
                    ));
                }
                other => other.to_string(),
            },
        };
        if outputs.iter().any(|(n, _)| *n == name) {
            return Err(PlanError::binding(
                format!("duplicate alias \"{}\"", name),
                item.span,
            ));
        }
        let kind = match &item.expr {
            ast::Expr::Variable(v, _) => scope
                .lookup(v)
                .map(|b| b.kind)
                .unwrap_or(BindingKind::Scalar),
            _ => BindingKind::Scalar,
        };
        let lowered = transform_expr(ctx, scope, &item.expr)?;
        query.targets.push(TargetEntry::new(lowered, name.clone()));
        outputs.push((name, kind));
    }

    // ORDER BY may reference both the projection's aliases and the
    // pre-projection variables.
    let mut order_scope = scope.clone();
    for (name, kind) in &outputs {
        if !order_scope.contains(name) {
            order_scope.declare(name, *kind, Expr::unqualified(name.clone()), span)?;
        }
    }
    for item in order_by {
        let lowered = transform_expr(ctx, &order_scope, &item.expr)?;
        query.sort.push(SortKey { expr: lowered, ascending: item.ascending });
    }

    query.skip = transform_limit(ctx, scope, skip, "SKIP")?;
    query.limit = transform_limit(ctx, scope, limit, "LIMIT")?;
    query.distinct = distinct;

    scope.clear();
    for (name, kind) in outputs {
        scope.declare(&name, kind, Expr::unqualified(name.clone()), span)?;
    }
    scope.advance();
    Ok(query)
}

/// SKIP/LIMIT accept only parameters and constants; any variable
/// reference is a type error.
pub(crate) fn transform_limit(
    ctx: &mut TransformCtx<'_>,
    scope: &Scope,
    expr: Option<&ast::Expr>,
    what: &str,
) -> Result<Option<Expr>, PlanError> {
    match expr {
        None => Ok(None),
        Some(e) => {
            let lowered = transform_expr(ctx, scope, e)?;
            if lowered.references_columns() {
                return Err(PlanError::type_error(
                    format!("{} must not reference variables", what),
                    e.span(),
                ));
            }
            Ok(Some(lowered))
        }
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
    fn clauses_nest_as_subqueries() {
        let q = plan("MATCH (a) MATCH (b) RETURN a, b").unwrap();
        // RETURN wraps the second MATCH, which wraps the first.
        assert_eq!(q.range_table.len(), 1);
        match &q.range_table[0] {
            RangeTblEntry::Subquery { query: inner, .. } => {
                assert!(inner
                    .range_table
                    .iter()
                    .any(|rte| matches!(rte, RangeTblEntry::Subquery { .. })));
            }
            other => panic!("expected subquery, got {:?}", other),
        }
    }

    #[test]
    fn optional_match_becomes_lateral_left_join() {
        let q = plan("MATCH (a) OPTIONAL MATCH (a)-[r]->(b) RETURN a, b").unwrap();
        let inner = match &q.range_table[0] {
            RangeTblEntry::Subquery { query, .. } => query,
            other => panic!("expected subquery, got {:?}", other),
        };
        assert!(matches!(
            inner.from[0],
            FromItem::Join { kind: JoinKind::LeftLateral, .. }
        ));
        // Left columns precede new right columns.
        let cols = inner.column_names();
        assert_eq!(cols[0], "a");
        assert!(cols.contains(&"r".to_string()) && cols.contains(&"b".to_string()));
    }

    #[test]
    fn with_alias_is_required_for_expressions() {
        let err = plan("MATCH (a) WITH a.x RETURN 1").unwrap_err();
        assert!(err.to_string().contains("must be aliased"));
        assert!(plan("MATCH (a) WITH a.x AS x RETURN x").is_ok());
    }

    #[test]
    fn limit_rejects_variables() {
        let err = plan("MATCH (a) WITH a.x AS x RETURN x LIMIT x").unwrap_err();
        assert!(matches!(
            err,
            GraphError::Plan(PlanError::Type { .. })
        ));
        assert!(plan("MATCH (a) RETURN a LIMIT $n").is_ok());
        assert!(plan("MATCH (a) RETURN a SKIP 1 LIMIT 2").is_ok());
    }

    #[test]
    fn unwind_emits_an_unnest_target() {
        let q = plan("UNWIND [1, 2, 3] AS i RETURN i").unwrap();
        let inner = match &q.range_table[0] {
            RangeTblEntry::Subquery { query, .. } => query,
            other => panic!("expected subquery, got {:?}", other),
        };
        assert!(matches!(
            inner.targets[0].expr,
            Expr::Func { func: Builtin::Unnest, .. }
        ));
        assert_eq!(inner.targets[0].name, "i");
    }

    #[test]
    fn duplicate_unwind_alias_is_rejected() {
        let err = plan("MATCH (i) UNWIND [1] AS i RETURN i").unwrap_err();
        assert!(err.to_string().contains("duplicate alias"));
    }

    #[test]
    fn reading_after_update_requires_with() {
        assert!(plan("CREATE (a) MATCH (b) RETURN b").is_err());
        assert!(plan("CREATE (a) WITH a MATCH (b) RETURN b").is_ok());
    }

    #[test]
    fn return_expression_columns_use_canonical_text() {
        let q = plan("MATCH (a) RETURN a.x + 1").unwrap();
        assert_eq!(q.targets[0].name, "a.x + 1");
    }
}
