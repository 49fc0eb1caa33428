//! Writer directive application
//!
//! The projection loop hands each input row here when the target list
//! carries a writer call. The directive is decoded from its opaque bytes
//! and applied against the store: entities are created, updated, or
//! removed, and placeholder output slots are filled so downstream clauses
//! observe the results.

use crate::core::error::{ExecError, GraphResult};
use crate::core::value::{Value, ValueMap};
use crate::core::vertex_edge_path::{Path, PathEntry};
use crate::query::executor::{eval::eval, Env, ExecCtx, Frame};
use crate::query::plan::expr::{Expr, WriterKind};
use crate::query::plan::{EdgeDirection, FromItem, Query};
use crate::query::transform::writer::{
    CreatePath, DeleteDirective, EntityKind, MergeDirective, TargetNode, UpdateDirective,
    WriterDirective,
};
use log::debug;

/// Whether this query is a MERGE with no previous clause, which must
/// create its pattern even when the match produced no rows at all.
pub fn is_standalone_merge(query: &Query) -> bool {
    let has_merge = query
        .targets
        .iter()
        .any(|t| matches!(&t.expr, Expr::Writer { kind: WriterKind::Merge, .. }));
    let plain_from = query
        .from
        .iter()
        .all(|item| matches!(item, FromItem::Rte(_)));
    has_merge && plain_from
}

/// Apply every writer target of the query to one row.
pub fn apply_writer_targets(
    ctx: &ExecCtx<'_>,
    query: &Query,
    frame: &Frame,
    outer: Option<&Env<'_>>,
    out_row: &mut Vec<Value>,
) -> GraphResult<()> {
    let names = query.column_names();
    for target in &query.targets {
        if let Expr::Writer { directive, .. } = &target.expr {
            let directive = WriterDirective::decode(directive)?;
            match directive {
                WriterDirective::Create(create) => {
                    for path in &create.paths {
                        apply_create_path(ctx, path, &names, frame, outer, out_row)?;
                    }
                }
                WriterDirective::Update(update) => {
                    apply_update(ctx, &update, &names, frame, outer, out_row)?;
                }
                WriterDirective::Delete(delete) => apply_delete(ctx, &delete, out_row)?,
                WriterDirective::Merge(merge) => {
                    apply_merge(ctx, &merge, &names, frame, outer, out_row)?;
                }
            }
        }
    }
    Ok(())
}

/// Evaluation environment for directive expressions: the already-filled
/// output slots first (so an edge's properties can reference a vertex
/// created moments ago), then the input frame.
fn directive_env_frame(names: &[String], out_row: &[Value], frame: &Frame) -> Frame {
    let mut merged = Frame::default();
    for (name, value) in names.iter().zip(out_row.iter()) {
        if !value.is_null() {
            merged.push("", name, value.clone());
        }
    }
    for (rel, name, value) in &frame.cols {
        merged.push(rel, name, value.clone());
    }
    merged
}

fn eval_props(
    ctx: &ExecCtx<'_>,
    expr: Option<&Expr>,
    names: &[String],
    out_row: &[Value],
    frame: &Frame,
    outer: Option<&Env<'_>>,
) -> GraphResult<ValueMap> {
    let Some(expr) = expr else {
        return Ok(ValueMap::new());
    };
    let merged = directive_env_frame(names, out_row, frame);
    let env = Env { frame: &merged, outer };
    match eval(ctx, &env, expr)? {
        Value::Map(map) => Ok(map),
        Value::Null => Ok(ValueMap::new()),
        other => Err(ExecError::runtime(format!(
            "properties must be a map, got {}",
            other.type_name()
        ))
        .into()),
    }
}

fn apply_create_path(
    ctx: &ExecCtx<'_>,
    path: &CreatePath,
    names: &[String],
    frame: &Frame,
    outer: Option<&Env<'_>>,
    out_row: &mut Vec<Value>,
) -> GraphResult<()> {
    create_entities(ctx, &path.nodes, names, frame, outer, out_row)?;
    if let Some(position) = path.path_position {
        out_row[position] = build_path_value(&path.nodes, out_row)?;
    }
    Ok(())
}

/// Vertices first, then edges, so every endpoint exists when its edge is
/// written.
fn create_entities(
    ctx: &ExecCtx<'_>,
    nodes: &[TargetNode],
    names: &[String],
    frame: &Frame,
    outer: Option<&Env<'_>>,
    out_row: &mut Vec<Value>,
) -> GraphResult<()> {
    for node in nodes.iter().filter(|n| n.kind == EntityKind::Vertex) {
        if node.from_previous_clause() {
            continue;
        }
        if !out_row[node.tuple_position].is_null() {
            // Filled by the match side (MERGE) or an earlier mention.
            continue;
        }
        let props = eval_props(ctx, node.prop_expr.as_ref(), names, out_row, frame, outer)?;
        let vertex = ctx.store.create_vertex(ctx.graph, &node.label, props);
        debug!("created vertex {} ({})", vertex.id, node.label);
        out_row[node.tuple_position] = Value::Vertex(vertex);
    }

    for (idx, node) in nodes.iter().enumerate() {
        if node.kind != EntityKind::Edge {
            continue;
        }
        let prev = &nodes[idx - 1];
        let next = &nodes[idx + 1];
        let endpoint = |n: &TargetNode| -> GraphResult<crate::core::gid::GraphId> {
            match &out_row[n.tuple_position] {
                Value::Vertex(v) => Ok(v.id),
                Value::Null => Err(ExecError::runtime(format!(
                    "cannot create an edge with a NULL endpoint (\"{}\")",
                    n.variable_name
                ))
                .into()),
                other => Err(ExecError::runtime(format!(
                    "edge endpoint \"{}\" is a {}, expected a vertex",
                    n.variable_name,
                    other.type_name()
                ))
                .into()),
            }
        };
        let (start, end) = match node.direction {
            Some(EdgeDirection::Left) => (endpoint(next)?, endpoint(prev)?),
            _ => (endpoint(prev)?, endpoint(next)?),
        };
        let props = eval_props(ctx, node.prop_expr.as_ref(), names, out_row, frame, outer)?;
        let edge = ctx.store.create_edge(ctx.graph, &node.label, start, end, props);
        debug!("created edge {} ({})", edge.id, node.label);
        out_row[node.tuple_position] = Value::Edge(edge);
    }
    Ok(())
}

fn build_path_value(nodes: &[TargetNode], out_row: &[Value]) -> GraphResult<Value> {
    let mut entries = Vec::with_capacity(nodes.len());
    for node in nodes {
        match &out_row[node.tuple_position] {
            Value::Vertex(v) => entries.push(PathEntry::Vertex(v.clone())),
            Value::Edge(e) => entries.push(PathEntry::Edge(e.clone())),
            other => {
                return Err(ExecError::runtime(format!(
                    "cannot place a {} in a path variable",
                    other.type_name()
                ))
                .into());
            }
        }
    }
    Ok(Value::Path(Path::new(entries)))
}

fn apply_update(
    ctx: &ExecCtx<'_>,
    update: &UpdateDirective,
    names: &[String],
    frame: &Frame,
    outer: Option<&Env<'_>>,
    out_row: &mut Vec<Value>,
) -> GraphResult<()> {
    for item in &update.items {
        let entity = out_row[item.entity_position].clone();
        let new_value = match (&item.value, item.remove) {
            (Some(expr), false) => {
                let merged = directive_env_frame(names, out_row, frame);
                let env = Env { frame: &merged, outer };
                eval(ctx, &env, expr)?
            }
            _ => Value::Null,
        };
        match entity {
            // OPTIONAL MATCH can leave the entity NULL; the item is a
            // no-op for that row.
            Value::Null => continue,
            Value::Vertex(mut v) => {
                set_or_remove(&mut v.properties, &item.prop_name, new_value);
                ctx.store.update_properties(ctx.graph, v.id, v.properties.clone())?;
                out_row[item.entity_position] = Value::Vertex(v);
            }
            Value::Edge(mut e) => {
                set_or_remove(&mut e.properties, &item.prop_name, new_value);
                ctx.store.update_properties(ctx.graph, e.id, e.properties.clone())?;
                out_row[item.entity_position] = Value::Edge(e);
            }
            other => {
                return Err(ExecError::runtime(format!(
                    "cannot update properties of a {}",
                    other.type_name()
                ))
                .into());
            }
        }
    }
    Ok(())
}

/// Assigning NULL removes the key, which also covers REMOVE.
fn set_or_remove(props: &mut ValueMap, key: &str, value: Value) {
    if value.is_null() {
        props.remove(key);
    } else {
        props.insert(key.to_string(), value);
    }
}

fn apply_delete(
    ctx: &ExecCtx<'_>,
    delete: &DeleteDirective,
    out_row: &mut [Value],
) -> GraphResult<()> {
    for item in &delete.items {
        match out_row[item.entity_position].clone() {
            Value::Null => continue,
            Value::Edge(e) => {
                ctx.store.remove_edge(ctx.graph, e.id);
                debug!("deleted edge {}", e.id);
            }
            Value::Vertex(v) => {
                let touching = ctx.store.edges_touching(ctx.graph, v.id);
                if !touching.is_empty() {
                    if !delete.detach {
                        return Err(ExecError::runtime(format!(
                            "cannot delete vertex \"{}\" because it still has relationships; use DETACH DELETE",
                            item.var_name
                        ))
                        .into());
                    }
                    for edge in touching {
                        ctx.store.remove_edge(ctx.graph, edge.id);
                    }
                }
                ctx.store.remove_vertex(ctx.graph, v.id);
                debug!("deleted vertex {}", v.id);
            }
            other => {
                return Err(ExecError::runtime(format!(
                    "cannot delete a {}",
                    other.type_name()
                ))
                .into());
            }
        }
    }
    Ok(())
}

/// MERGE: when the match side produced no entities for this row, create
/// the whole pattern; otherwise the row passes through untouched.
fn apply_merge(
    ctx: &ExecCtx<'_>,
    merge: &MergeDirective,
    names: &[String],
    frame: &Frame,
    outer: Option<&Env<'_>>,
    out_row: &mut Vec<Value>,
) -> GraphResult<()> {
    let matched = merge
        .path
        .nodes
        .iter()
        .filter(|n| !n.from_previous_clause())
        .any(|n| !out_row[n.tuple_position].is_null());
    if matched {
        return Ok(());
    }
    create_entities(ctx, &merge.path.nodes, names, frame, outer, out_row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::plan::TargetEntry;
    use crate::query::transform::writer::{CreateDirective, WriterDirective};

    #[test]
    fn standalone_merge_detection() {
        let mut q = Query::default();
        let merge = WriterDirective::Merge(MergeDirective {
            path: CreatePath { var_name: None, path_position: None, nodes: vec![] },
            flags: 0,
        });
        q.targets.push(TargetEntry::new(
            Expr::Writer { kind: WriterKind::Merge, directive: merge.encode() },
            "_merge_clause",
        ));
        assert!(is_standalone_merge(&q));

        let create = WriterDirective::Create(CreateDirective { paths: vec![], flags: 0 });
        let mut q2 = Query::default();
        q2.targets.push(TargetEntry::new(
            Expr::Writer { kind: WriterKind::Create, directive: create.encode() },
            "_create_clause",
        ));
        assert!(!is_standalone_merge(&q2));
    }
}
