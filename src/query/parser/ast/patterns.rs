//! Path pattern AST
//!
//! A path alternates node and relationship patterns; the parser guarantees
//! odd length with nodes at even positions. Anonymous entities keep
//! `name = None` here and receive generated names during transform.

use crate::core::span::Span;
use crate::query::parser::ast::expressions::Expr;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelDirection {
    /// `-[]->`
    Right,
    /// `<-[]-`
    Left,
    /// `-[]-`
    Undirected,
}

/// `*lo..hi` on a relationship; `hi = None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarLen {
    pub lo: i64,
    pub hi: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodePattern {
    pub name: Option<String>,
    pub label: Option<String>,
    pub props: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelPattern {
    pub name: Option<String>,
    pub label: Option<String>,
    pub direction: RelDirection,
    pub props: Option<Expr>,
    pub varlen: Option<VarLen>,
    pub span: Span,
}

impl RelPattern {
    pub fn is_varlen(&self) -> bool {
        self.varlen.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathElement {
    Node(NodePattern),
    Rel(RelPattern),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathPattern {
    /// `p = (a)-[]->(b)` aliases the whole path.
    pub var_name: Option<String>,
    pub elements: Vec<PathElement>,
    pub span: Span,
}

impl PathPattern {
    pub fn nodes(&self) -> impl Iterator<Item = &NodePattern> {
        self.elements.iter().filter_map(|e| match e {
            PathElement::Node(n) => Some(n),
            PathElement::Rel(_) => None,
        })
    }

    pub fn rels(&self) -> impl Iterator<Item = &RelPattern> {
        self.elements.iter().filter_map(|e| match e {
            PathElement::Rel(r) => Some(r),
            PathElement::Node(_) => None,
        })
    }

    pub fn rel_count(&self) -> usize {
        self.rels().count()
    }
}

impl fmt::Display for NodePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        if let Some(name) = &self.name {
            write!(f, "{}", name)?;
        }
        if let Some(label) = &self.label {
            write!(f, ":{}", label)?;
        }
        if let Some(props) = &self.props {
            write!(f, " {}", props)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for RelPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.direction == RelDirection::Left {
            write!(f, "<")?;
        }
        write!(f, "-[")?;
        if let Some(name) = &self.name {
            write!(f, "{}", name)?;
        }
        if let Some(label) = &self.label {
            write!(f, ":{}", label)?;
        }
        if let Some(v) = &self.varlen {
            write!(f, "*{}..", v.lo)?;
            if let Some(hi) = v.hi {
                write!(f, "{}", hi)?;
            }
        }
        if let Some(props) = &self.props {
            write!(f, " {}", props)?;
        }
        write!(f, "]-")?;
        if self.direction == RelDirection::Right {
            write!(f, ">")?;
        }
        Ok(())
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(var) = &self.var_name {
            write!(f, "{} = ", var)?;
        }
        for element in &self.elements {
            match element {
                PathElement::Node(n) => write!(f, "{}", n)?,
                PathElement::Rel(r) => write!(f, "{}", r)?,
            }
        }
        Ok(())
    }
}
