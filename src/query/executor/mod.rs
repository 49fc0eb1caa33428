//! Tree-walking executor
//!
//! Interprets the relational query tree: nested-loop evaluation of the
//! range table and join tree (lateral items see the columns accumulated to
//! their left), qual filtering, projection with set-returning expansion,
//! DISTINCT, sort, skip/limit, and set operations. Writer target entries
//! are applied per input row. The executor is deliberately small: it
//! implements exactly what the emitted plans need.

pub mod eval;
pub mod vle;
pub mod write;

use crate::catalog::GraphOid;
use crate::core::error::{ExecError, GraphResult};
use crate::core::gid::GraphId;
use crate::core::value::{Value, ValueMap};
use crate::query::plan::expr::Expr;
use crate::query::plan::{
    FromItem, JoinKind, Query, RangeTblEntry, SetExpr, VleArgs,
};
use eval::{eval, eval_filter};
use log::trace;
use vle::VlePathSearch;

/// Rows out of the entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Execution context shared by one statement.
pub struct ExecCtx<'a> {
    pub store: &'a crate::storage::GraphStore,
    pub graph: GraphOid,
    pub params: &'a ValueMap,
}

/// One row under construction: qualified columns in range-table order.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    cols: Vec<(String, String, Value)>,
}

impl Frame {
    pub fn push(&mut self, rel: &str, name: &str, value: Value) {
        self.cols.push((rel.to_string(), name.to_string(), value));
    }

    /// Unqualified lookup matches the first column with the name,
    /// mirroring binding resolution order.
    pub fn get(&self, rel: Option<&str>, name: &str) -> Option<&Value> {
        self.cols
            .iter()
            .find(|(r, n, _)| n == name && rel.map_or(true, |rel| rel == r))
            .map(|(_, _, v)| v)
    }
}

/// Evaluation environment: the current frame plus the lateral/correlated
/// outer chain.
pub struct Env<'a> {
    pub frame: &'a Frame,
    pub outer: Option<&'a Env<'a>>,
}

impl<'a> Env<'a> {
    pub fn lookup(&self, rel: Option<&str>, name: &str) -> Option<&Value> {
        match self.frame.get(rel, name) {
            Some(v) => Some(v),
            None => self.outer.and_then(|o| o.lookup(rel, name)),
        }
    }
}

/// Execute a query against the store.
pub fn run_query(
    ctx: &ExecCtx<'_>,
    query: &Query,
    outer: Option<&Env<'_>>,
) -> GraphResult<ResultSet> {
    if query.set_op.is_some() {
        return run_set_op(ctx, query, outer);
    }

    let frames = scan_from_items(ctx, query, outer)?;
    trace!("query produced {} candidate rows", frames.len());

    let mut rows: Vec<(Frame, Vec<Value>)> = Vec::new();
    for frame in frames {
        let env = Env { frame: &frame, outer };
        if let Some(quals) = &query.quals {
            if !eval_filter(ctx, &env, quals)? {
                continue;
            }
        }
        for out_row in project_rows(ctx, query, &frame, outer)? {
            rows.push((frame.clone(), out_row));
        }
    }

    // A MERGE with no previous clause and no matching rows still creates
    // its pattern once.
    if rows.is_empty() && write::is_standalone_merge(query) {
        let frame = Frame::default();
        let mut out_row = vec![Value::Null; query.targets.len()];
        write::apply_writer_targets(ctx, query, &frame, outer, &mut out_row)?;
        rows.push((frame, out_row));
    }

    finish_rows(ctx, query, rows, outer)
}

fn finish_rows(
    ctx: &ExecCtx<'_>,
    query: &Query,
    mut rows: Vec<(Frame, Vec<Value>)>,
    outer: Option<&Env<'_>>,
) -> GraphResult<ResultSet> {
    let columns = query.column_names();

    if query.distinct {
        let mut seen: Vec<Vec<Value>> = Vec::new();
        rows.retain(|(_, row)| {
            if seen.contains(row) {
                false
            } else {
                seen.push(row.clone());
                true
            }
        });
    }

    if !query.sort.is_empty() {
        let mut keyed: Vec<(Vec<Value>, Frame, Vec<Value>)> = Vec::with_capacity(rows.len());
        for (frame, row) in rows {
            // Sort keys see the output columns first, then the
            // pre-projection columns.
            let mut sort_frame = Frame::default();
            for (name, value) in columns.iter().zip(row.iter()) {
                sort_frame.push("", name, value.clone());
            }
            for (rel, name, value) in &frame.cols {
                sort_frame.push(rel, name, value.clone());
            }
            let env = Env { frame: &sort_frame, outer };
            let mut keys = Vec::with_capacity(query.sort.len());
            for key in &query.sort {
                keys.push(eval(ctx, &env, &key.expr)?);
            }
            keyed.push((keys, frame, row));
        }
        keyed.sort_by(|(a, _, _), (b, _, _)| {
            for ((x, y), key) in a.iter().zip(b.iter()).zip(query.sort.iter()) {
                let ord = x.cmp_ordered(y);
                let ord = if key.ascending { ord } else { ord.reverse() };
                if ord != std::cmp::Ordering::Equal {
                    return ord;
                }
            }
            std::cmp::Ordering::Equal
        });
        rows = keyed.into_iter().map(|(_, f, r)| (f, r)).collect();
    }

    let skip = eval_offset(ctx, query.skip.as_ref(), "SKIP")?.unwrap_or(0);
    let limit = eval_offset(ctx, query.limit.as_ref(), "LIMIT")?;
    let mut out: Vec<Vec<Value>> = rows.into_iter().map(|(_, r)| r).collect();
    if skip > 0 {
        out = out.into_iter().skip(skip as usize).collect();
    }
    if let Some(limit) = limit {
        out.truncate(limit as usize);
    }

    Ok(ResultSet { columns, rows: out })
}

fn eval_offset(
    ctx: &ExecCtx<'_>,
    expr: Option<&Expr>,
    what: &str,
) -> GraphResult<Option<i64>> {
    let Some(expr) = expr else {
        return Ok(None);
    };
    let frame = Frame::default();
    let env = Env { frame: &frame, outer: None };
    match eval(ctx, &env, expr)? {
        Value::Int(i) => Ok(Some(i.max(0))),
        Value::Null => Ok(None),
        other => Err(ExecError::runtime(format!(
            "{} must evaluate to an integer, got {}",
            what,
            other.type_name()
        ))
        .into()),
    }
}

/// Cross-join the top-level from items left to right; each item sees the
/// columns accumulated so far (lateral visibility).
fn scan_from_items(
    ctx: &ExecCtx<'_>,
    query: &Query,
    outer: Option<&Env<'_>>,
) -> GraphResult<Vec<Frame>> {
    let mut frames = vec![Frame::default()];
    for item in &query.from {
        let mut next = Vec::new();
        for frame in &frames {
            next.extend(scan_item(ctx, query, item, frame, outer)?);
        }
        frames = next;
    }
    Ok(frames)
}

fn scan_item(
    ctx: &ExecCtx<'_>,
    query: &Query,
    item: &FromItem,
    input: &Frame,
    outer: Option<&Env<'_>>,
) -> GraphResult<Vec<Frame>> {
    match item {
        FromItem::Rte(idx) => scan_rte(ctx, &query.range_table[*idx], input, outer),
        FromItem::Join { kind, left, right, qual } => {
            let mut out = Vec::new();
            for left_frame in scan_item(ctx, query, left, input, outer)? {
                let rights = scan_item(ctx, query, right, &left_frame, outer)?;
                let mut matched = Vec::new();
                for right_frame in rights {
                    let keep = match qual {
                        None => true,
                        Some(q) => {
                            let env = Env { frame: &right_frame, outer };
                            eval_filter(ctx, &env, q)?
                        }
                    };
                    if keep {
                        matched.push(right_frame);
                    }
                }
                if matched.is_empty() && *kind == JoinKind::LeftLateral {
                    // Null-extend the right side's columns.
                    let mut frame = left_frame.clone();
                    for (rel, name) in item_columns(query, right) {
                        frame.push(&rel, &name, Value::Null);
                    }
                    out.push(frame);
                } else {
                    out.extend(matched);
                }
            }
            Ok(out)
        }
    }
}

fn scan_rte(
    ctx: &ExecCtx<'_>,
    rte: &RangeTblEntry,
    input: &Frame,
    outer: Option<&Env<'_>>,
) -> GraphResult<Vec<Frame>> {
    match rte {
        RangeTblEntry::LabelScan { graph, label, is_edge, alias } => {
            let graph = GraphOid(*graph);
            let mut out = Vec::new();
            if *is_edge {
                for edge in ctx.store.scan_edges(graph, label) {
                    let mut frame = input.clone();
                    frame.push(alias, "id", Value::Int(edge.id.as_i64()));
                    frame.push(alias, "start_id", Value::Int(edge.start_id.as_i64()));
                    frame.push(alias, "end_id", Value::Int(edge.end_id.as_i64()));
                    frame.push(alias, "properties", Value::Map(edge.properties));
                    out.push(frame);
                }
            } else {
                for vertex in ctx.store.scan_vertices(graph, label) {
                    let mut frame = input.clone();
                    frame.push(alias, "id", Value::Int(vertex.id.as_i64()));
                    frame.push(alias, "properties", Value::Map(vertex.properties));
                    out.push(frame);
                }
            }
            Ok(out)
        }
        RangeTblEntry::Subquery { query, alias, lateral } => {
            let input_env = Env { frame: input, outer };
            let result = if *lateral {
                run_query(ctx, query, Some(&input_env))?
            } else {
                run_query(ctx, query, outer)?
            };
            let mut out = Vec::new();
            for row in result.rows {
                let mut frame = input.clone();
                for (name, value) in result.columns.iter().zip(row) {
                    frame.push(alias, name, value);
                }
                out.push(frame);
            }
            Ok(out)
        }
        RangeTblEntry::VleFunction { args, alias } => {
            scan_vle(ctx, args, alias, input, outer)
        }
    }
}

/// The lateral set-returning VLE call: one frame per traversal.
fn scan_vle(
    ctx: &ExecCtx<'_>,
    args: &VleArgs,
    alias: &str,
    input: &Frame,
    outer: Option<&Env<'_>>,
) -> GraphResult<Vec<Frame>> {
    let env = Env { frame: input, outer };

    let start = match eval(ctx, &env, &args.start)? {
        Value::Int(id) => GraphId::from_i64(id),
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(ExecError::runtime(format!(
                "variable-length start must be a vertex id, got {}",
                other.type_name()
            ))
            .into());
        }
    };
    let end = match &args.end {
        None => None,
        Some(expr) => match eval(ctx, &env, expr)? {
            Value::Int(id) => Some(GraphId::from_i64(id)),
            Value::Null => return Ok(Vec::new()),
            other => {
                return Err(ExecError::runtime(format!(
                    "variable-length end must be a vertex id, got {}",
                    other.type_name()
                ))
                .into());
            }
        },
    };
    let props = match &args.props {
        None => None,
        Some(expr) => match eval(ctx, &env, expr)? {
            Value::Null => None,
            template => Some(template),
        },
    };

    let graph = GraphOid(args.graph);
    let (label_id, label_missing) = match &args.label {
        None => (None, false),
        Some(name) => match ctx.store.with_catalog(|c| c.label(graph, name).map(|l| l.id)) {
            Some(id) => (Some(id), false),
            None => (None, true),
        },
    };

    let graph_ctx = ctx.store.graph_context(graph);
    let mut search = VlePathSearch::new(
        graph_ctx,
        start,
        end,
        args.lo,
        args.hi,
        args.direction,
        label_id,
        label_missing,
        props,
        ctx.store.config().vle_max_depth,
    )?;

    let mut out = Vec::new();
    while let Some(edge_set) = search.next_path() {
        let mut frame = input.clone();
        frame.push(alias, "edges", Value::EdgeSet(edge_set));
        out.push(frame);
    }
    Ok(out)
}

/// Output columns contributed by a from item, for null extension.
fn item_columns(query: &Query, item: &FromItem) -> Vec<(String, String)> {
    match item {
        FromItem::Rte(idx) => rte_columns(&query.range_table[*idx]),
        FromItem::Join { left, right, .. } => {
            let mut cols = item_columns(query, left);
            cols.extend(item_columns(query, right));
            cols
        }
    }
}

fn rte_columns(rte: &RangeTblEntry) -> Vec<(String, String)> {
    match rte {
        RangeTblEntry::LabelScan { alias, is_edge, .. } => {
            let mut cols = vec![(alias.clone(), "id".to_string())];
            if *is_edge {
                cols.push((alias.clone(), "start_id".to_string()));
                cols.push((alias.clone(), "end_id".to_string()));
            }
            cols.push((alias.clone(), "properties".to_string()));
            cols
        }
        RangeTblEntry::Subquery { query, alias, .. } => query
            .column_names()
            .into_iter()
            .map(|name| (alias.clone(), name))
            .collect(),
        RangeTblEntry::VleFunction { alias, .. } => {
            vec![(alias.clone(), "edges".to_string())]
        }
    }
}

/// Evaluate the target list for one input frame. Set-returning targets
/// (`unnest`) expand into multiple rows; writer targets are applied after
/// the other targets so they can fill placeholder slots.
fn project_rows(
    ctx: &ExecCtx<'_>,
    query: &Query,
    frame: &Frame,
    outer: Option<&Env<'_>>,
) -> GraphResult<Vec<Vec<Value>>> {
    let env = Env { frame, outer };
    let mut out_row = vec![Value::Null; query.targets.len()];
    let mut unnest: Option<(usize, Value)> = None;
    let mut has_writer = false;

    for (i, target) in query.targets.iter().enumerate() {
        match &target.expr {
            Expr::Func { func: crate::query::plan::expr::Builtin::Unnest, args } => {
                let value = eval(ctx, &env, &args[0])?;
                unnest = Some((i, value));
            }
            Expr::Writer { .. } => has_writer = true,
            expr => out_row[i] = eval(ctx, &env, expr)?,
        }
    }

    if has_writer {
        write::apply_writer_targets(ctx, query, frame, outer, &mut out_row)?;
    }

    match unnest {
        None => Ok(vec![out_row]),
        Some((i, Value::Null)) => {
            let _ = i;
            Ok(Vec::new())
        }
        Some((i, Value::List(items))) => Ok(items
            .into_iter()
            .map(|item| {
                let mut row = out_row.clone();
                row[i] = item;
                row
            })
            .collect()),
        Some((i, scalar)) => {
            let mut row = out_row;
            row[i] = scalar;
            Ok(vec![row])
        }
    }
}

fn run_set_op(
    ctx: &ExecCtx<'_>,
    query: &Query,
    outer: Option<&Env<'_>>,
) -> GraphResult<ResultSet> {
    let set_op = query.set_op.as_ref().expect("caller checked");
    let rows = eval_set_expr(ctx, query, set_op, outer)?;
    let keyed: Vec<(Frame, Vec<Value>)> = rows
        .into_iter()
        .map(|row| (Frame::default(), row))
        .collect();
    finish_rows(ctx, query, keyed, outer)
}

fn eval_set_expr(
    ctx: &ExecCtx<'_>,
    query: &Query,
    set_expr: &SetExpr,
    outer: Option<&Env<'_>>,
) -> GraphResult<Vec<Vec<Value>>> {
    match set_expr {
        SetExpr::Rte(idx) => match &query.range_table[*idx] {
            RangeTblEntry::Subquery { query: leaf, .. } => {
                Ok(run_query(ctx, leaf, outer)?.rows)
            }
            other => Err(ExecError::runtime(format!(
                "set operation over a non-subquery entry: {:?}",
                other
            ))
            .into()),
        },
        SetExpr::Op { all, left, right, .. } => {
            let mut rows = eval_set_expr(ctx, query, left, outer)?;
            rows.extend(eval_set_expr(ctx, query, right, outer)?);
            if !*all {
                let mut seen: Vec<Vec<Value>> = Vec::new();
                rows.retain(|row| {
                    if seen.contains(row) {
                        false
                    } else {
                        seen.push(row.clone());
                        true
                    }
                });
            }
            Ok(rows)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::Value;
    use crate::query::plan::expr::Expr;
    use crate::query::plan::TargetEntry;
    use crate::storage::GraphStore;

    #[test]
    fn projection_without_from_yields_one_row() {
        let store = GraphStore::default();
        let graph = store.create_graph("g");
        let params = ValueMap::new();
        let ctx = ExecCtx { store: &store, graph, params: &params };

        let mut query = Query::default();
        query.targets.push(TargetEntry::new(Expr::Const(Value::Int(7)), "x"));
        let result = run_query(&ctx, &query, None).unwrap();
        assert_eq!(result.columns, vec!["x"]);
        assert_eq!(result.rows, vec![vec![Value::Int(7)]]);
    }

    #[test]
    fn frame_lookup_prefers_first_match() {
        let mut frame = Frame::default();
        frame.push("a", "x", Value::Int(1));
        frame.push("b", "x", Value::Int(2));
        assert_eq!(frame.get(None, "x"), Some(&Value::Int(1)));
        assert_eq!(frame.get(Some("b"), "x"), Some(&Value::Int(2)));
        assert_eq!(frame.get(Some("c"), "x"), None);
    }

    #[test]
    fn env_falls_back_to_outer() {
        let mut inner = Frame::default();
        inner.push("i", "x", Value::Int(1));
        let mut outer_frame = Frame::default();
        outer_frame.push("o", "y", Value::Int(2));
        let outer_env = Env { frame: &outer_frame, outer: None };
        let env = Env { frame: &inner, outer: Some(&outer_env) };
        assert_eq!(env.lookup(None, "y"), Some(&Value::Int(2)));
        assert_eq!(env.lookup(None, "x"), Some(&Value::Int(1)));
    }
}
