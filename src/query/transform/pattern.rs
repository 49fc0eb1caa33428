//! Pattern-to-join lowering
//!
//! Each path becomes range-table entries plus join predicates. A node is
//! materialized (gets its own label scan) only when something can observe
//! it: a variable name, a label, properties, a path variable over the whole
//! path, or a following variable-length edge that needs its id as the
//! traversal start. Invisible nodes leave no scan behind; the predicate
//! that would have referenced them is attached to the adjacent edge
//! columns instead. Edge uniqueness is collected across every path of the
//! clause and emitted as one predicate.

use crate::catalog::{LabelKind, DEFAULT_EDGE_LABEL, DEFAULT_VERTEX_LABEL};
use crate::core::error::PlanError;
use crate::core::span::Span;
use crate::core::value::Value;
use crate::query::parser::ast::{
    NodePattern, PathElement, PathPattern, RelDirection, RelPattern,
};
use crate::query::plan::expr::{BinOp, Builtin, Expr};
use crate::query::plan::{
    EdgeDirection, Query, RangeTblEntry, TargetEntry, VleArgs,
};
use crate::query::transform::expr::{const_map, transform_expr, transform_props};
use crate::query::transform::scope::{BindingKind, Scope};
use crate::query::transform::TransformCtx;
use log::trace;

/// Per-clause pattern state: edge expressions collected for the
/// uniqueness predicate spanning all paths of one MATCH.
#[derive(Default)]
pub struct PatternScratch {
    edge_exprs: Vec<Expr>,
}

impl PatternScratch {
    /// Emit `enforce_edge_uniqueness(...)` when the clause binds more than
    /// one edge (a VLE handle counts as a set of edge ids).
    pub fn finish(self, query: &mut Query) {
        if self.edge_exprs.len() > 1 {
            query.add_qual(Expr::func(Builtin::EnforceEdgeUniqueness, self.edge_exprs));
        }
    }
}

struct NodeInfo {
    /// Id expression; `None` when the node is not materialized.
    id_expr: Option<Expr>,
    value_expr: Option<Expr>,
}

struct RelInfo {
    undirected: bool,
    /// Expressions equal to the previous node's id (two for undirected).
    prev_side: Vec<Expr>,
    /// Expressions equal to the next node's id.
    next_side: Vec<Expr>,
    value_expr: Expr,
}

/// Lower every path of a MATCH (or merge/sub-pattern) into `query`.
pub fn transform_match_pattern(
    ctx: &mut TransformCtx<'_>,
    scope: &mut Scope,
    query: &mut Query,
    paths: &[PathPattern],
    force_include_all: bool,
) -> Result<(), PlanError> {
    let mut scratch = PatternScratch::default();
    for path in paths {
        transform_match_path(ctx, scope, query, &mut scratch, path, force_include_all)?;
    }
    scratch.finish(query);
    Ok(())
}

fn transform_match_path(
    ctx: &mut TransformCtx<'_>,
    scope: &mut Scope,
    query: &mut Query,
    scratch: &mut PatternScratch,
    path: &PathPattern,
    force_include_all: bool,
) -> Result<(), PlanError> {
    let force_all = force_include_all || path.var_name.is_some();

    // A node right before a variable-length edge must be materialized: the
    // lateral VLE call reads its id as the traversal start.
    let elements = &path.elements;
    let followed_by_vle: Vec<bool> = elements
        .iter()
        .enumerate()
        .map(|(i, _)| match elements.get(i + 1) {
            Some(PathElement::Rel(rel)) => rel.is_varlen(),
            _ => false,
        })
        .collect();

    let mut nodes: Vec<NodeInfo> = Vec::new();
    let mut rels: Vec<RelInfo> = Vec::new();

    for (i, element) in elements.iter().enumerate() {
        match element {
            PathElement::Node(node) => {
                let force = force_all || followed_by_vle[i];
                nodes.push(transform_node(ctx, scope, query, node, force, path.span)?);
            }
            PathElement::Rel(rel) => {
                let info = if rel.is_varlen() {
                    let start = nodes
                        .last()
                        .and_then(|n| n.id_expr.clone())
                        .expect("node before a VLE edge is always materialized");
                    // The far end is only passed to the engine when it is
                    // already bound; otherwise the join predicate on
                    // end_of() constrains it.
                    let end = next_node_bound_id(scope, elements, i);
                    transform_vle_rel(ctx, scope, query, rel, start, end)?
                } else {
                    transform_rel(ctx, scope, query, rel)?
                };
                // Fixed edges contribute their id; a VLE edge contributes
                // its whole handle, treated as a set of ids.
                scratch.edge_exprs.push(if rel.is_varlen() {
                    info.value_expr.clone()
                } else {
                    Expr::func(Builtin::Id, vec![info.value_expr.clone()])
                });
                rels.push(info);
            }
        }
    }

    emit_join_quals(query, &nodes, &rels);

    if let Some(var_name) = &path.var_name {
        let entries: Vec<Expr> = {
            let mut out = Vec::with_capacity(elements.len());
            let (mut ni, mut ri) = (0usize, 0usize);
            for element in elements {
                match element {
                    PathElement::Node(_) => {
                        out.push(
                            nodes[ni]
                                .value_expr
                                .clone()
                                .expect("path-variable nodes are always materialized"),
                        );
                        ni += 1;
                    }
                    PathElement::Rel(_) => {
                        out.push(rels[ri].value_expr.clone());
                        ri += 1;
                    }
                }
            }
            out
        };
        let traversal = Expr::func(Builtin::BuildTraversal, entries);
        scope.declare(var_name, BindingKind::Scalar, traversal.clone(), path.span)?;
        query.targets.push(TargetEntry::new(traversal, var_name.clone()));
    }

    trace!(
        "lowered path: {} nodes, {} relationships",
        nodes.len(),
        rels.len()
    );
    Ok(())
}

/// Id expression of the node following relationship `i`, when that node
/// names an already-bound vertex.
fn next_node_bound_id(scope: &Scope, elements: &[PathElement], i: usize) -> Option<Expr> {
    match elements.get(i + 1) {
        Some(PathElement::Node(node)) => {
            let name = node.name.as_ref()?;
            let binding = scope.lookup(name)?;
            if binding.kind == BindingKind::Vertex {
                Some(binding.id_expr())
            } else {
                None
            }
        }
        _ => None,
    }
}

fn transform_node(
    ctx: &mut TransformCtx<'_>,
    scope: &mut Scope,
    query: &mut Query,
    node: &NodePattern,
    force_include: bool,
    span: Span,
) -> Result<NodeInfo, PlanError> {
    // Reuse of a variable bound by an earlier clause or earlier in this
    // pattern: no new scan, but labels and properties still constrain it.
    if let Some(name) = &node.name {
        if let Some(binding) = scope.lookup(name) {
            if binding.kind != BindingKind::Vertex {
                return Err(PlanError::binding(
                    format!(
                        "variable \"{}\" already exists as a {}, expected a vertex",
                        name, binding.kind
                    ),
                    node.span,
                ));
            }
            let value = binding.expr.clone();
            let id_expr = binding.id_expr();
            if let Some(label) = &node.label {
                query.add_qual(label_id_filter(ctx, &id_expr, label, LabelKind::Vertex, node.span)?);
            }
            if let Some(props) = &node.props {
                let template = transform_props(ctx, scope, props)?;
                query.add_qual(Expr::op(
                    BinOp::MapContains,
                    Expr::func(Builtin::Properties, vec![value.clone()]),
                    template,
                ));
            }
            return Ok(NodeInfo { id_expr: Some(id_expr), value_expr: Some(value) });
        }
    }

    let include = force_include
        || node.name.is_some()
        || node.label.is_some()
        || node.props.is_some();
    if !include {
        return Ok(NodeInfo { id_expr: None, value_expr: None });
    }

    let name = match &node.name {
        Some(n) => n.clone(),
        None => ctx.next_default_alias(),
    };
    let label = node.label.clone().unwrap_or_else(|| DEFAULT_VERTEX_LABEL.to_string());
    query.add_rte(RangeTblEntry::LabelScan {
        graph: ctx.graph.0,
        label,
        is_edge: false,
        alias: name.clone(),
    });
    query.from.push(crate::query::plan::FromItem::Rte(query.range_table.len() - 1));

    let id_expr = Expr::column(&name, "id");
    let value = Expr::func(
        Builtin::BuildVertex,
        vec![id_expr.clone(), Expr::column(&name, "properties")],
    );
    scope.declare(&name, BindingKind::Vertex, value.clone(), span)?;
    query.targets.push(TargetEntry::new(value.clone(), name.clone()));

    if let Some(props) = &node.props {
        let template = transform_props(ctx, scope, props)?;
        query.add_qual(Expr::op(
            BinOp::MapContains,
            Expr::column(&name, "properties"),
            template,
        ));
    }

    Ok(NodeInfo { id_expr: Some(id_expr), value_expr: Some(value) })
}

fn transform_rel(
    ctx: &mut TransformCtx<'_>,
    scope: &mut Scope,
    query: &mut Query,
    rel: &RelPattern,
) -> Result<RelInfo, PlanError> {
    // Edge variable reuse across clauses keeps the old binding and adds
    // filters on it instead of a second scan.
    if let Some(name) = &rel.name {
        if let Some(binding) = scope.lookup(name) {
            if binding.kind != BindingKind::Edge {
                return Err(PlanError::binding(
                    format!(
                        "variable \"{}\" already exists as a {}, expected an edge",
                        name, binding.kind
                    ),
                    rel.span,
                ));
            }
            let value = binding.expr.clone();
            let id_expr = binding.id_expr();
            if let Some(label) = &rel.label {
                query.add_qual(label_id_filter(ctx, &id_expr, label, LabelKind::Edge, rel.span)?);
            }
            if let Some(props) = &rel.props {
                let template = transform_props(ctx, scope, props)?;
                query.add_qual(Expr::op(
                    BinOp::MapContains,
                    Expr::func(Builtin::Properties, vec![value.clone()]),
                    template,
                ));
            }
            let start = Expr::func(Builtin::StartId, vec![value.clone()]);
            let end = Expr::func(Builtin::EndId, vec![value.clone()]);
            return Ok(rel_info(rel.direction, start, end, value));
        }
    }

    let name = match &rel.name {
        Some(n) => n.clone(),
        None => ctx.next_default_alias(),
    };
    let label = rel.label.clone().unwrap_or_else(|| DEFAULT_EDGE_LABEL.to_string());
    query.add_rte(RangeTblEntry::LabelScan {
        graph: ctx.graph.0,
        label,
        is_edge: true,
        alias: name.clone(),
    });
    query.from.push(crate::query::plan::FromItem::Rte(query.range_table.len() - 1));

    let value = Expr::func(
        Builtin::BuildEdge,
        vec![
            Expr::column(&name, "id"),
            Expr::column(&name, "start_id"),
            Expr::column(&name, "end_id"),
            Expr::column(&name, "properties"),
        ],
    );
    scope.declare(&name, BindingKind::Edge, value.clone(), rel.span)?;
    query.targets.push(TargetEntry::new(value.clone(), name.clone()));

    if let Some(props) = &rel.props {
        let template = transform_props(ctx, scope, props)?;
        query.add_qual(Expr::op(
            BinOp::MapContains,
            Expr::column(&name, "properties"),
            template,
        ));
    }

    let start = Expr::column(&name, "start_id");
    let end = Expr::column(&name, "end_id");
    Ok(rel_info(rel.direction, start, end, value))
}

fn rel_info(direction: RelDirection, start: Expr, end: Expr, value: Expr) -> RelInfo {
    match direction {
        RelDirection::Right => RelInfo {
            undirected: false,
            prev_side: vec![start],
            next_side: vec![end],
            value_expr: value,
        },
        RelDirection::Left => RelInfo {
            undirected: false,
            prev_side: vec![end],
            next_side: vec![start],
            value_expr: value,
        },
        RelDirection::Undirected => RelInfo {
            undirected: true,
            prev_side: vec![start.clone(), end.clone()],
            next_side: vec![start, end],
            value_expr: value,
        },
    }
}

fn transform_vle_rel(
    ctx: &mut TransformCtx<'_>,
    scope: &mut Scope,
    query: &mut Query,
    rel: &RelPattern,
    start: Expr,
    end: Option<Expr>,
) -> Result<RelInfo, PlanError> {
    if let Some(name) = &rel.name {
        if scope.contains(name) {
            return Err(PlanError::binding(
                format!("duplicate variable \"{}\"", name),
                rel.span,
            ));
        }
    }
    let name = match &rel.name {
        Some(n) => n.clone(),
        None => ctx.next_default_alias(),
    };
    let varlen = rel.varlen.expect("caller checked is_varlen");

    let props = match &rel.props {
        Some(p) => {
            let lowered = transform_expr(ctx, scope, p)?;
            // Fold literal templates so the engine sees a plain map value.
            Some(const_map(&lowered).map(Expr::Const).unwrap_or(lowered))
        }
        None => None,
    };

    let args = VleArgs {
        graph: ctx.graph.0,
        start,
        end,
        label: rel.label.clone(),
        props,
        lo: varlen.lo,
        hi: varlen.hi,
        direction: match rel.direction {
            RelDirection::Right => EdgeDirection::Right,
            RelDirection::Left => EdgeDirection::Left,
            RelDirection::Undirected => EdgeDirection::Undirected,
        },
    };

    query.add_rte(RangeTblEntry::VleFunction { args, alias: name.clone() });
    query.from.push(crate::query::plan::FromItem::Rte(query.range_table.len() - 1));

    let value = Expr::column(&name, "edges");
    scope.declare(&name, BindingKind::VleEdge, value.clone(), rel.span)?;
    query.targets.push(TargetEntry::new(value.clone(), name.clone()));

    let start_of = Expr::func(Builtin::StartOf, vec![value.clone()]);
    let end_of = Expr::func(Builtin::EndOf, vec![value.clone()]);
    Ok(RelInfo {
        undirected: false,
        prev_side: vec![start_of],
        next_side: vec![end_of],
        value_expr: value,
    })
}

/// Scalar filter for a label constraint on an entity that has no scan of
/// its own: `extract_label_id(id) = <label id>`. An unknown label can
/// match nothing.
fn label_id_filter(
    ctx: &mut TransformCtx<'_>,
    id_expr: &Expr,
    label: &str,
    kind: LabelKind,
    span: Span,
) -> Result<Expr, PlanError> {
    let record = ctx.store.with_catalog(|cat| cat.label(ctx.graph, label).cloned());
    match record {
        Some(rec) if rec.kind == kind => Ok(Expr::op(
            BinOp::Eq,
            Expr::func(Builtin::ExtractLabelId, vec![id_expr.clone()]),
            Expr::Const(Value::Int(rec.id.0 as i64)),
        )),
        Some(rec) => Err(PlanError::binding(
            format!(
                "label \"{}\" is a {} label",
                label,
                match rec.kind {
                    LabelKind::Vertex => "vertex",
                    LabelKind::Edge => "edge",
                }
            ),
            span,
        )),
        None => Ok(Expr::Const(Value::Bool(false))),
    }
}

/// Join predicates driven by each relationship, with the attachment rule
/// for invisible interior nodes.
fn emit_join_quals(query: &mut Query, nodes: &[NodeInfo], rels: &[RelInfo]) {
    for (i, rel) in rels.iter().enumerate() {
        let p = &nodes[i];
        let q = &nodes[i + 1];
        let mut q_handled = false;

        match (&p.id_expr, &q.id_expr) {
            (Some(pid), Some(qid)) if rel.undirected => {
                // Both endpoints known: the disjunction of the two
                // directed forms keeps the endpoints paired.
                let start = rel.prev_side[0].clone();
                let end = rel.prev_side[1].clone();
                let forward = Expr::op(BinOp::Eq, pid.clone(), start.clone())
                    .and(Expr::op(BinOp::Eq, qid.clone(), end.clone()));
                let backward = Expr::op(BinOp::Eq, pid.clone(), end)
                    .and(Expr::op(BinOp::Eq, qid.clone(), start));
                query.add_qual(forward.or(backward));
                q_handled = true;
            }
            (Some(pid), _) => {
                query.add_qual(any_eq(pid, &rel.prev_side));
            }
            (None, _) if i > 0 => {
                // Invisible interior node: connect this edge directly to
                // the previous one.
                let prev = &rels[i - 1];
                let mut pairs: Option<Expr> = None;
                for a in &prev.next_side {
                    for b in &rel.prev_side {
                        let eq = Expr::op(BinOp::Eq, a.clone(), b.clone());
                        pairs = Some(match pairs {
                            None => eq,
                            Some(acc) => acc.or(eq),
                        });
                    }
                }
                if let Some(qual) = pairs {
                    query.add_qual(qual);
                }
            }
            // Invisible exterior start: unconstrained.
            (None, _) => {}
        }

        if !q_handled {
            if let Some(qid) = &q.id_expr {
                query.add_qual(any_eq(qid, &rel.next_side));
            }
            // Invisible next node: the following relationship's attachment
            // case connects through it.
        }
    }
}

fn any_eq(id: &Expr, sides: &[Expr]) -> Expr {
    let mut out: Option<Expr> = None;
    for side in sides {
        let eq = Expr::op(BinOp::Eq, id.clone(), side.clone());
        out = Some(match out {
            None => eq,
            Some(acc) => acc.or(eq),
        });
    }
    out.expect("relationship always has at least one side expression")
}

/// `EXISTS { pattern }`: the same lowering, wrapped in its own query whose
/// only output is a constant. Outer bindings stay visible by name.
pub fn transform_sub_pattern(
    ctx: &mut TransformCtx<'_>,
    outer_scope: &Scope,
    paths: &[PathPattern],
) -> Result<Query, PlanError> {
    let mut scope = sub_scope(outer_scope);
    let mut query = Query::default();
    transform_match_pattern(ctx, &mut scope, &mut query, paths, false)?;
    query.targets = vec![TargetEntry::new(Expr::Const(Value::Int(1)), "exists")];
    Ok(query)
}

/// Clone a scope for a nested transform: everything now belongs to an
/// earlier clause and resolves by bare output-column name, which the
/// executor looks up laterally.
pub fn sub_scope(outer: &Scope) -> Scope {
    let mut scope = outer.clone();
    scope.advance();
    scope.rebind_unqualified();
    scope
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::lexer::Lexer;
    use crate::query::parser::Parser;
    use crate::storage::GraphStore;

    fn lower_pattern(input: &str) -> (Query, Scope) {
        let store = GraphStore::default();
        let graph = store.create_graph("g");
        let mut ctx = TransformCtx::new(&store, graph);
        let mut scope = Scope::new();
        let mut query = Query::default();
        let tokens = Lexer::new(input).tokenize().unwrap();
        let paths = Parser::new(tokens).parse_pattern_list().unwrap();
        transform_match_pattern(&mut ctx, &mut scope, &mut query, &paths, false).unwrap();
        (query, scope)
    }

    fn count_uniqueness(query: &Query) -> usize {
        fn walk(e: &Expr, n: &mut usize) {
            match e {
                Expr::Func { func: Builtin::EnforceEdgeUniqueness, .. } => *n += 1,
                Expr::And(args) | Expr::Or(args) => args.iter().for_each(|a| walk(a, n)),
                _ => {}
            }
        }
        let mut n = 0;
        if let Some(q) = &query.quals {
            walk(q, &mut n);
        }
        n
    }

    #[test]
    fn single_edge_produces_three_scans_and_two_quals() {
        let (query, scope) = lower_pattern("(a)-[r]->(b)");
        assert_eq!(query.range_table.len(), 3);
        assert!(scope.contains("a") && scope.contains("r") && scope.contains("b"));
        // One edge: no uniqueness predicate.
        assert_eq!(count_uniqueness(&query), 0);
        let quals = format!("{:?}", query.quals);
        assert!(quals.contains("start_id"));
        assert!(quals.contains("end_id"));
    }

    #[test]
    fn two_edges_get_a_uniqueness_predicate() {
        let (query, _) = lower_pattern("(a)-[r]->(b)-[s]->(c)");
        assert_eq!(count_uniqueness(&query), 1);
    }

    #[test]
    fn uniqueness_spans_comma_separated_paths() {
        let (query, _) = lower_pattern("(a)-[r]->(b), (c)-[s]->(d)");
        assert_eq!(count_uniqueness(&query), 1);
    }

    #[test]
    fn anonymous_unconstrained_interior_node_is_invisible() {
        let (query, _) = lower_pattern("(a)-[r]->()-[s]->(b)");
        // a, r, s, b materialize; the interior node does not.
        assert_eq!(query.range_table.len(), 4);
    }

    #[test]
    fn labeled_anonymous_node_is_materialized() {
        let (query, _) = lower_pattern("(a)-[r]->(:person)");
        assert_eq!(query.range_table.len(), 3);
        assert!(query
            .range_table
            .iter()
            .any(|rte| matches!(rte, RangeTblEntry::LabelScan { label, .. } if label == "person")));
    }

    #[test]
    fn path_variable_materializes_every_node() {
        let (query, scope) = lower_pattern("p = (a)-[r]->()");
        assert!(scope.contains("p"));
        // Anonymous end node forced by the path variable.
        assert_eq!(query.range_table.len(), 3);
        assert!(query.targets.iter().any(|t| t.name == "p"));
    }

    #[test]
    fn vle_becomes_a_lateral_function_entry() {
        let (query, scope) = lower_pattern("(a)-[*2..4]->(b)");
        assert!(scope.contains("a") && scope.contains("b"));
        let vle = query
            .range_table
            .iter()
            .find_map(|rte| match rte {
                RangeTblEntry::VleFunction { args, .. } => Some(args),
                _ => None,
            })
            .expect("vle entry");
        assert_eq!(vle.lo, 2);
        assert_eq!(vle.hi, Some(4));
        // end was not previously bound, so it travels through the join
        // predicate instead of the engine arguments.
        assert!(vle.end.is_none());
        let quals = format!("{:?}", query.quals);
        assert!(quals.contains("StartOf"));
        assert!(quals.contains("EndOf"));
    }

    #[test]
    fn vle_counts_toward_uniqueness() {
        let (query, _) = lower_pattern("(a)-[e]->(b)-[*]->(c)");
        assert_eq!(count_uniqueness(&query), 1);
    }
}
