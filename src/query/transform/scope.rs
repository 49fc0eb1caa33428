//! Name resolution
//!
//! An ordered list of bindings, one per visible variable. Lookup returns
//! the first binding by insertion order. At each clause boundary
//! `advance()` clears the `declared_in_current_clause` marks; when the
//! previous clause is wrapped as a subquery, `rebind_all` repoints every
//! binding at that subquery's pass-through columns.

use crate::core::error::PlanError;
use crate::core::span::Span;
use crate::query::plan::expr::{Builtin, Expr};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Vertex,
    Edge,
    VleEdge,
    Scalar,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BindingKind::Vertex => "vertex",
            BindingKind::Edge => "edge",
            BindingKind::VleEdge => "variable-length edge",
            BindingKind::Scalar => "value",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub kind: BindingKind,
    pub declared_in_current_clause: bool,
    /// Expression producing the binding's value inside the query currently
    /// under construction.
    pub expr: Expr,
}

impl Binding {
    /// Expression producing the binding's property map.
    pub fn props_expr(&self) -> Expr {
        Expr::func(Builtin::Properties, vec![self.expr.clone()])
    }

    /// Expression producing the binding's id.
    pub fn id_expr(&self) -> Expr {
        Expr::func(Builtin::Id, vec![self.expr.clone()])
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: Vec<Binding>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Declare a new binding. Duplicate names are refused; a name that
    /// exists with another kind gets the kind-conflict message.
    pub fn declare(
        &mut self,
        name: &str,
        kind: BindingKind,
        expr: Expr,
        span: Span,
    ) -> Result<(), PlanError> {
        if let Some(existing) = self.lookup(name) {
            if existing.kind != kind {
                return Err(PlanError::binding(
                    format!(
                        "variable \"{}\" already exists as a {}",
                        name, existing.kind
                    ),
                    span,
                ));
            }
            return Err(PlanError::binding(
                format!("duplicate variable \"{}\"", name),
                span,
            ));
        }
        self.bindings.push(Binding {
            name: name.to_string(),
            kind,
            declared_in_current_clause: true,
            expr,
        });
        Ok(())
    }

    /// Clause boundary: everything already declared belongs to an earlier
    /// clause from now on.
    pub fn advance(&mut self) {
        for binding in &mut self.bindings {
            binding.declared_in_current_clause = false;
        }
    }

    /// Repoint every binding at the pass-through columns of the subquery
    /// aliased `alias`. Column names equal binding names by construction.
    pub fn rebind_all(&mut self, alias: &str) {
        for binding in &mut self.bindings {
            binding.expr = Expr::column(alias, binding.name.clone());
        }
    }

    /// Repoint every binding at a bare output-column reference. Nested
    /// transforms (EXISTS sub-patterns, lateral right sides) use this so
    /// the executor can resolve outer variables by name.
    pub fn rebind_unqualified(&mut self) {
        for binding in &mut self.bindings {
            binding.expr = Expr::unqualified(binding.name.clone());
        }
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::default()
    }

    #[test]
    fn lookup_follows_insertion_order() {
        let mut scope = Scope::new();
        scope
            .declare("a", BindingKind::Vertex, Expr::unqualified("a"), span())
            .unwrap();
        scope
            .declare("b", BindingKind::Edge, Expr::unqualified("b"), span())
            .unwrap();
        assert_eq!(scope.lookup("a").unwrap().kind, BindingKind::Vertex);
        assert!(scope.lookup("c").is_none());
    }

    #[test]
    fn kind_conflict_is_reported() {
        let mut scope = Scope::new();
        scope
            .declare("x", BindingKind::Vertex, Expr::unqualified("x"), span())
            .unwrap();
        let err = scope
            .declare("x", BindingKind::Edge, Expr::unqualified("x"), span())
            .unwrap_err();
        assert!(err.to_string().contains("already exists as a vertex"));
    }

    #[test]
    fn advance_clears_current_clause_marks() {
        let mut scope = Scope::new();
        scope
            .declare("a", BindingKind::Vertex, Expr::unqualified("a"), span())
            .unwrap();
        assert!(scope.lookup("a").unwrap().declared_in_current_clause);
        scope.advance();
        assert!(!scope.lookup("a").unwrap().declared_in_current_clause);
    }

    #[test]
    fn rebind_points_at_subquery_columns() {
        let mut scope = Scope::new();
        scope
            .declare("a", BindingKind::Vertex, Expr::column("v0", "id"), span())
            .unwrap();
        scope.rebind_all("_default_7");
        assert_eq!(
            scope.lookup("a").unwrap().expr,
            Expr::column("_default_7", "a")
        );
    }
}
