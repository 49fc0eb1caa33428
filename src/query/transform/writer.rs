//! Writer directives
//!
//! Each updating clause packs its work order into a typed directive that
//! the executor interprets per input row. Directives are plain serializable
//! values; the plan embeds them as opaque bincode blobs inside a
//! function-call target entry, so they survive plan serialization intact.

use crate::catalog::{LabelKind, DEFAULT_VERTEX_LABEL};
use crate::core::error::{ExecError, GraphResult, PlanError};
use crate::core::span::Span;
use crate::core::value::Value as CoreValue;
use crate::query::parser::ast::{self, MergeAction, PathElement, PathPattern, RelDirection, SetItem};
use crate::query::plan::expr::{Expr, WriterKind};
use crate::query::plan::{EdgeDirection, FromItem, JoinKind, Query, RangeTblEntry, TargetEntry};
use crate::query::transform::clause::wrap_prev;
use crate::query::transform::expr::transform_expr;
use crate::query::transform::scope::{BindingKind, Scope};
use crate::query::transform::{pattern, TransformCtx};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

pub const FLAG_TERMINAL: u32 = 1 << 0;
pub const FLAG_PREVIOUS_CLAUSE: u32 = 1 << 1;
pub const FLAG_IN_PATH_VAR: u32 = 1 << 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum EntityKind {
    Vertex,
    Edge,
}

/// One entity to be produced (or passed through) by CREATE or MERGE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct TargetNode {
    pub kind: EntityKind,
    pub label: String,
    /// Label id of the backing table; labels are created on demand during
    /// transform, so this is always resolved.
    pub label_id: i32,
    pub variable_name: String,
    /// Property constructor, evaluated per row at create time.
    pub prop_expr: Option<Expr>,
    /// Index of this entity's column in the clause's output row.
    pub tuple_position: usize,
    pub flags: u32,
    /// Written direction for edges; `None` for vertices.
    pub direction: Option<EdgeDirection>,
}

impl TargetNode {
    pub fn from_previous_clause(&self) -> bool {
        self.flags & FLAG_PREVIOUS_CLAUSE != 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct CreatePath {
    pub var_name: Option<String>,
    /// Output position of the path variable, when one was declared.
    pub path_position: Option<usize>,
    /// Entities in path order: vertex, edge, vertex, ...
    pub nodes: Vec<TargetNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct CreateDirective {
    pub paths: Vec<CreatePath>,
    pub flags: u32,
}

/// One `SET`/`REMOVE` item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct UpdateItem {
    pub var_name: String,
    pub entity_position: usize,
    pub prop_name: String,
    pub remove: bool,
    /// `None` for REMOVE; SET with a NULL value also removes the key.
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct UpdateDirective {
    pub items: Vec<UpdateItem>,
    pub flags: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct DeleteItem {
    pub var_name: String,
    pub entity_position: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct DeleteDirective {
    pub items: Vec<DeleteItem>,
    pub detach: bool,
    pub flags: u32,
}

/// MERGE: the create shape plus the knowledge that the match side already
/// populated the tuple positions when a row matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct MergeDirective {
    pub path: CreatePath,
    pub flags: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub enum WriterDirective {
    Create(CreateDirective),
    Update(UpdateDirective),
    Delete(DeleteDirective),
    Merge(MergeDirective),
}

impl WriterDirective {
    pub fn encode(&self) -> Vec<u8> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .expect("directive encoding cannot fail")
    }

    pub fn decode(bytes: &[u8]) -> GraphResult<WriterDirective> {
        let (directive, _) = bincode::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ExecError::runtime(format!("malformed writer directive: {}", e)))?;
        Ok(directive)
    }
}

/// `CREATE`: pack one directive covering every path of the pattern, with a
/// placeholder output column per created entity for the executor to fill.
pub fn transform_create(
    ctx: &mut TransformCtx<'_>,
    scope: &mut Scope,
    prev: Option<Query>,
    paths: &[PathPattern],
    terminal: bool,
    _span: Span,
) -> Result<Query, PlanError> {
    let mut query = Query::default();
    if let Some(p) = prev {
        wrap_prev(ctx, scope, &mut query, p, true);
    }

    let mut out_paths = Vec::new();
    for path in paths {
        out_paths.push(transform_create_path(ctx, scope, &mut query, path)?);
    }

    let directive = WriterDirective::Create(CreateDirective {
        paths: out_paths,
        flags: if terminal { FLAG_TERMINAL } else { 0 },
    });
    query.targets.push(TargetEntry::new(
        Expr::Writer { kind: WriterKind::Create, directive: directive.encode() },
        WriterKind::Create.column_name(),
    ));
    Ok(query)
}

fn transform_create_path(
    ctx: &mut TransformCtx<'_>,
    scope: &mut Scope,
    query: &mut Query,
    path: &PathPattern,
) -> Result<CreatePath, PlanError> {
    let in_path = path.var_name.is_some();
    let mut nodes = Vec::new();

    for element in &path.elements {
        match element {
            PathElement::Node(node) => {
                nodes.push(transform_create_node(ctx, scope, query, node, in_path)?);
            }
            PathElement::Rel(rel) => {
                nodes.push(transform_create_edge(ctx, scope, query, rel, in_path)?);
            }
        }
    }

    let (var_name, path_position) = match &path.var_name {
        Some(name) => {
            if scope.contains(name) {
                return Err(PlanError::binding(
                    format!("duplicate variable \"{}\"", name),
                    path.span,
                ));
            }
            let position = query.targets.len();
            query
                .targets
                .push(TargetEntry::new(Expr::Const(CoreValue::Null), name.clone()));
            scope.declare(name, BindingKind::Scalar, Expr::unqualified(name.clone()), path.span)?;
            (Some(name.clone()), Some(position))
        }
        None => (None, None),
    };

    Ok(CreatePath { var_name, path_position, nodes })
}

fn transform_create_node(
    ctx: &mut TransformCtx<'_>,
    scope: &mut Scope,
    query: &mut Query,
    node: &ast::NodePattern,
    in_path: bool,
) -> Result<TargetNode, PlanError> {
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
            if node.label.is_some() || node.props.is_some() {
                return Err(PlanError::semantic(
                    format!(
                        "variable \"{}\" already exists; labels and properties cannot be added in CREATE",
                        name
                    ),
                    node.span,
                ));
            }
            let position = query
                .targets
                .iter()
                .position(|t| t.name == *name)
                .expect("bound variable always has a pass-through column");
            return Ok(TargetNode {
                kind: EntityKind::Vertex,
                label: String::new(),
                label_id: 0,
                variable_name: name.clone(),
                prop_expr: None,
                tuple_position: position,
                flags: FLAG_PREVIOUS_CLAUSE | if in_path { FLAG_IN_PATH_VAR } else { 0 },
                direction: None,
            });
        }
    }

    let name = match &node.name {
        Some(n) => n.clone(),
        None => ctx.next_default_alias(),
    };
    let label = node.label.clone().unwrap_or_else(|| DEFAULT_VERTEX_LABEL.to_string());
    let record = ctx.store.label_or_create(ctx.graph, &label, LabelKind::Vertex);
    let prop_expr = transform_create_props(ctx, scope, node.props.as_ref(), node.span)?;

    let position = query.targets.len();
    query
        .targets
        .push(TargetEntry::new(Expr::Const(CoreValue::Null), name.clone()));
    scope.declare(&name, BindingKind::Vertex, Expr::unqualified(name.clone()), node.span)?;

    Ok(TargetNode {
        kind: EntityKind::Vertex,
        label,
        label_id: record.id.0,
        variable_name: name,
        prop_expr,
        tuple_position: position,
        flags: if in_path { FLAG_IN_PATH_VAR } else { 0 },
        direction: None,
    })
}

fn transform_create_edge(
    ctx: &mut TransformCtx<'_>,
    scope: &mut Scope,
    query: &mut Query,
    rel: &ast::RelPattern,
    in_path: bool,
) -> Result<TargetNode, PlanError> {
    if rel.is_varlen() {
        return Err(PlanError::semantic(
            "variable-length relationships are not allowed in CREATE",
            rel.span,
        ));
    }
    if rel.direction == RelDirection::Undirected {
        return Err(PlanError::semantic(
            "only directed relationships are allowed in CREATE",
            rel.span,
        ));
    }
    let Some(label) = rel.label.clone() else {
        return Err(PlanError::semantic(
            "relationships must be specified with a label in CREATE",
            rel.span,
        ));
    };
    if let Some(name) = &rel.name {
        if scope.contains(name) {
            return Err(PlanError::binding(
                format!("variable \"{}\" already exists", name),
                rel.span,
            ));
        }
    }

    let name = match &rel.name {
        Some(n) => n.clone(),
        None => ctx.next_default_alias(),
    };
    let record = ctx.store.label_or_create(ctx.graph, &label, LabelKind::Edge);
    let prop_expr = transform_create_props(ctx, scope, rel.props.as_ref(), rel.span)?;

    let position = query.targets.len();
    query
        .targets
        .push(TargetEntry::new(Expr::Const(CoreValue::Null), name.clone()));
    scope.declare(&name, BindingKind::Edge, Expr::unqualified(name.clone()), rel.span)?;

    Ok(TargetNode {
        kind: EntityKind::Edge,
        label,
        label_id: record.id.0,
        variable_name: name,
        prop_expr,
        tuple_position: position,
        flags: if in_path { FLAG_IN_PATH_VAR } else { 0 },
        direction: Some(match rel.direction {
            RelDirection::Right => crate::query::plan::EdgeDirection::Right,
            RelDirection::Left => crate::query::plan::EdgeDirection::Left,
            RelDirection::Undirected => unreachable!("rejected above"),
        }),
    })
}

fn transform_create_props(
    ctx: &mut TransformCtx<'_>,
    scope: &Scope,
    props: Option<&ast::Expr>,
    span: Span,
) -> Result<Option<Expr>, PlanError> {
    match props {
        None => Ok(None),
        Some(ast::Expr::Param(_, _)) => Err(PlanError::semantic(
            "properties in a CREATE pattern cannot be a parameter",
            span,
        )),
        Some(expr) => Ok(Some(transform_expr(ctx, scope, expr)?)),
    }
}

/// `SET`/`REMOVE`: every item must target `variable.property_name` on a
/// vertex or edge bound by an earlier clause.
pub fn transform_set(
    ctx: &mut TransformCtx<'_>,
    scope: &mut Scope,
    prev: Option<Query>,
    items: &[SetItem],
    is_remove: bool,
    terminal: bool,
    span: Span,
) -> Result<Query, PlanError> {
    let clause_name = if is_remove { "REMOVE" } else { "SET" };
    let Some(prev) = prev else {
        return Err(PlanError::semantic(
            format!("{} must follow a clause that binds variables", clause_name),
            span,
        ));
    };
    let mut query = Query::default();
    wrap_prev(ctx, scope, &mut query, prev, true);

    let mut out_items = Vec::new();
    for item in items {
        let ast::Expr::Property { base, key, .. } = &item.target else {
            return Err(PlanError::semantic(
                format!("{} target must have the form variable.property_name", clause_name),
                item.span,
            ));
        };
        let ast::Expr::Variable(var_name, var_span) = base.as_ref() else {
            return Err(PlanError::semantic(
                format!("{} target must have the form variable.property_name", clause_name),
                item.span,
            ));
        };
        let Some(binding) = scope.lookup(var_name) else {
            return Err(PlanError::binding(
                format!("variable \"{}\" does not exist", var_name),
                *var_span,
            ));
        };
        if !matches!(binding.kind, BindingKind::Vertex | BindingKind::Edge) {
            return Err(PlanError::semantic(
                format!("only vertex and edge properties can be updated, \"{}\" is a {}", var_name, binding.kind),
                *var_span,
            ));
        }
        let entity_position = query
            .targets
            .iter()
            .position(|t| t.name == *var_name)
            .expect("bound variable always has a pass-through column");
        let value = match &item.value {
            Some(v) => Some(transform_expr(ctx, scope, v)?),
            None => None,
        };
        out_items.push(UpdateItem {
            var_name: var_name.clone(),
            entity_position,
            prop_name: key.clone(),
            remove: is_remove,
            value,
        });
    }

    let directive = WriterDirective::Update(UpdateDirective {
        items: out_items,
        flags: if terminal { FLAG_TERMINAL } else { 0 },
    });
    query.targets.push(TargetEntry::new(
        Expr::Writer { kind: WriterKind::Set, directive: directive.encode() },
        WriterKind::Set.column_name(),
    ));
    Ok(query)
}

/// `DELETE`: targets must be declared variables of entity kind.
pub fn transform_delete(
    ctx: &mut TransformCtx<'_>,
    scope: &mut Scope,
    prev: Option<Query>,
    exprs: &[ast::Expr],
    detach: bool,
    terminal: bool,
    span: Span,
) -> Result<Query, PlanError> {
    let Some(prev) = prev else {
        return Err(PlanError::semantic(
            "DELETE must follow a clause that binds variables",
            span,
        ));
    };
    let mut query = Query::default();
    wrap_prev(ctx, scope, &mut query, prev, true);

    let mut items = Vec::new();
    for expr in exprs {
        let ast::Expr::Variable(name, var_span) = expr else {
            return Err(PlanError::semantic(
                "DELETE expects a variable",
                expr.span(),
            ));
        };
        let Some(binding) = scope.lookup(name) else {
            return Err(PlanError::binding(
                format!("variable \"{}\" does not exist", name),
                *var_span,
            ));
        };
        if !matches!(binding.kind, BindingKind::Vertex | BindingKind::Edge) {
            return Err(PlanError::semantic(
                format!("DELETE cannot remove a {}", binding.kind),
                *var_span,
            ));
        }
        let entity_position = query
            .targets
            .iter()
            .position(|t| t.name == *name)
            .expect("bound variable always has a pass-through column");
        items.push(DeleteItem { var_name: name.clone(), entity_position });
    }

    let directive = WriterDirective::Delete(DeleteDirective {
        items,
        detach,
        flags: if terminal { FLAG_TERMINAL } else { 0 },
    });
    query.targets.push(TargetEntry::new(
        Expr::Writer { kind: WriterKind::Delete, directive: directive.encode() },
        WriterKind::Delete.column_name(),
    ));
    Ok(query)
}

/// `MERGE`: the path is rewritten into a MATCH-shape subquery joined
/// laterally to the previous clause; the directive carries the create
/// shape so the executor can produce the entities when no row matched.
pub fn transform_merge(
    ctx: &mut TransformCtx<'_>,
    scope: &mut Scope,
    prev: Option<Query>,
    path: &PathPattern,
    actions: &[MergeAction],
    terminal: bool,
    span: Span,
) -> Result<Query, PlanError> {
    if let Some(action) = actions.first() {
        return Err(PlanError::not_supported(
            "ON CREATE and ON MATCH are not supported in MERGE",
            action.span,
        ));
    }
    if path.var_name.is_some() {
        return Err(PlanError::not_supported(
            "path variables are not supported in MERGE",
            span,
        ));
    }
    for rel in path.rels() {
        if rel.is_varlen() {
            return Err(PlanError::semantic(
                "variable-length relationships are not allowed in MERGE",
                rel.span,
            ));
        }
        if rel.direction == RelDirection::Undirected {
            return Err(PlanError::semantic(
                "only directed relationships are allowed in MERGE",
                rel.span,
            ));
        }
        if rel.label.is_none() {
            return Err(PlanError::semantic(
                "relationships must be specified with a label in MERGE",
                rel.span,
            ));
        }
        if let Some(name) = &rel.name {
            if scope.contains(name) {
                return Err(PlanError::semantic(
                    format!("edge variable \"{}\" declared in a prior clause cannot be used in MERGE", name),
                    rel.span,
                ));
            }
        }
    }

    // Assign names to anonymous entities up front so the match columns,
    // the new bindings, and the directive all agree.
    let mut named_path = path.clone();
    for element in named_path.elements.iter_mut() {
        match element {
            PathElement::Node(n) if n.name.is_none() => n.name = Some(ctx.next_default_alias()),
            PathElement::Rel(r) if r.name.is_none() => r.name = Some(ctx.next_default_alias()),
            _ => {}
        }
    }

    // The MATCH shape of the merge path, transformed on its own.
    let mut match_scope = pattern::sub_scope(scope);
    let mut match_query = Query::default();
    pattern::transform_match_pattern(ctx, &mut match_scope, &mut match_query, &[named_path.clone()], false)?;
    let match_cols = match_query.column_names();

    let mut query = Query::default();
    let new_alias;
    if let Some(prev) = prev {
        let left_alias = ctx.next_default_alias();
        let left_cols = prev.column_names();
        let left_idx = query.add_rte(RangeTblEntry::Subquery {
            query: Box::new(prev),
            alias: left_alias.clone(),
            lateral: false,
        });
        let right_alias = ctx.next_default_alias();
        let right_idx = query.add_rte(RangeTblEntry::Subquery {
            query: Box::new(match_query),
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
        for name in &match_cols {
            if !left_cols.contains(name) {
                query
                    .targets
                    .push(TargetEntry::new(Expr::column(&right_alias, name), name.clone()));
            }
        }
        scope.rebind_all(&left_alias);
        new_alias = right_alias;
    } else {
        new_alias = wrap_prev(ctx, scope, &mut query, match_query, true);
    }

    // Declare the merge path's new bindings in the outer scope.
    for binding in match_scope.iter().cloned().collect::<Vec<_>>() {
        if !scope.contains(&binding.name) && match_cols.contains(&binding.name) {
            scope.declare(
                &binding.name,
                binding.kind,
                Expr::column(&new_alias, binding.name.clone()),
                span,
            )?;
        }
    }

    // The create shape: reused entities pass through; new ones carry
    // their label and property constructors.
    let props_scope = pattern::sub_scope(scope);
    let mut nodes = Vec::new();
    for element in &named_path.elements {
        let node = match element {
            PathElement::Node(n) => {
                let name = n.name.clone().expect("named above");
                let reused = !match_cols.contains(&name);
                if reused {
                    merge_passthrough_node(&query, &name, EntityKind::Vertex)
                } else {
                    let label = n.label.clone().unwrap_or_else(|| DEFAULT_VERTEX_LABEL.to_string());
                    let record = ctx.store.label_or_create(ctx.graph, &label, LabelKind::Vertex);
                    let prop_expr = match &n.props {
                        Some(p) => Some(transform_expr(ctx, &props_scope, p)?),
                        None => None,
                    };
                    TargetNode {
                        kind: EntityKind::Vertex,
                        label,
                        label_id: record.id.0,
                        variable_name: name.clone(),
                        prop_expr,
                        tuple_position: target_position(&query, &name),
                        flags: 0,
                        direction: None,
                    }
                }
            }
            PathElement::Rel(r) => {
                let name = r.name.clone().expect("named above");
                let label = r.label.clone().expect("validated above");
                let record = ctx.store.label_or_create(ctx.graph, &label, LabelKind::Edge);
                let prop_expr = match &r.props {
                    Some(p) => Some(transform_expr(ctx, &props_scope, p)?),
                    None => None,
                };
                TargetNode {
                    kind: EntityKind::Edge,
                    label,
                    label_id: record.id.0,
                    variable_name: name.clone(),
                    prop_expr,
                    tuple_position: target_position(&query, &name),
                    flags: 0,
                    direction: Some(match r.direction {
                        RelDirection::Right => crate::query::plan::EdgeDirection::Right,
                        RelDirection::Left => crate::query::plan::EdgeDirection::Left,
                        RelDirection::Undirected => unreachable!("rejected above"),
                    }),
                }
            }
        };
        nodes.push(node);
    }

    let directive = WriterDirective::Merge(MergeDirective {
        path: CreatePath { var_name: None, path_position: None, nodes },
        flags: if terminal { FLAG_TERMINAL } else { 0 },
    });
    query.targets.push(TargetEntry::new(
        Expr::Writer { kind: WriterKind::Merge, directive: directive.encode() },
        WriterKind::Merge.column_name(),
    ));
    Ok(query)
}

fn merge_passthrough_node(query: &Query, name: &str, kind: EntityKind) -> TargetNode {
    TargetNode {
        kind,
        label: String::new(),
        label_id: 0,
        variable_name: name.to_string(),
        prop_expr: None,
        tuple_position: target_position(query, name),
        flags: FLAG_PREVIOUS_CLAUSE,
        direction: None,
    }
}

fn target_position(query: &Query, name: &str) -> usize {
    query
        .targets
        .iter()
        .position(|t| t.name == name)
        .expect("merge entity always has an output column")
}
