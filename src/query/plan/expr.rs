//! The lowered expression tree
//!
//! This is what the transformer emits in target lists and quals. Boolean
//! trees are n-ary and maximally flattened. Function calls dispatch over a
//! closed enum of builtins, so the executor matches exhaustively instead of
//! resolving names at runtime.

use crate::core::value::Value;
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Recognized `::` cast targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum CastTarget {
    Integer,
    Float,
    Numeric,
    String,
    Boolean,
    Vertex,
    Edge,
    Traversal,
    VariableEdge,
}

impl CastTarget {
    pub fn from_name(name: &str) -> Option<CastTarget> {
        let target = match name.to_ascii_lowercase().as_str() {
            "integer" => CastTarget::Integer,
            "float" => CastTarget::Float,
            "numeric" => CastTarget::Numeric,
            "string" => CastTarget::String,
            "boolean" => CastTarget::Boolean,
            "vertex" => CastTarget::Vertex,
            "edge" => CastTarget::Edge,
            "traversal" => CastTarget::Traversal,
            "variable_edge" => CastTarget::VariableEdge,
            _ => return None,
        };
        Some(target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// String prefix/suffix/infix matches, distinct from equality.
    StartsWith,
    EndsWith,
    ContainsStr,
    /// Property containment `a ⊇ b` on maps.
    MapContains,
    /// NULL-propagating membership.
    In,
}

/// Closed builtin registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum Builtin {
    Id,
    StartId,
    EndId,
    Label,
    Type,
    Properties,
    StartNode,
    EndNode,
    Nodes,
    Relationships,
    Length,
    Size,
    Head,
    Last,
    Keys,
    Range,
    Coalesce,
    ToString,
    Abs,
    Ceil,
    Floor,
    Round,
    Sqrt,
    Sign,
    ToLower,
    ToUpper,
    Trim,
    Reverse,
    Substring,
    Split,
    RegexMatch,
    /// `unnest(list)`: set-returning, one output row per element.
    Unnest,
    /// `extract_label_id(id)`: label filter without a label-table join.
    ExtractLabelId,
    /// `start_of(vle)` / `end_of(vle)`: endpoints of a VLE edge set.
    StartOf,
    EndOf,
    /// Pattern-wide no-repeated-edge predicate.
    EnforceEdgeUniqueness,
    /// Entity constructors used in target lists.
    BuildVertex,
    BuildEdge,
    BuildTraversal,
}

impl Builtin {
    /// Resolve a user-facing function name. Aggregates are recognized but
    /// have no builtin: the transformer reports them as unsupported.
    pub fn from_name(name: &str) -> Option<Builtin> {
        let builtin = match name.to_ascii_lowercase().as_str() {
            "id" => Builtin::Id,
            "start_id" => Builtin::StartId,
            "end_id" => Builtin::EndId,
            "label" => Builtin::Label,
            "type" => Builtin::Type,
            "properties" => Builtin::Properties,
            "startnode" => Builtin::StartNode,
            "endnode" => Builtin::EndNode,
            "nodes" => Builtin::Nodes,
            "relationships" => Builtin::Relationships,
            "length" => Builtin::Length,
            "size" => Builtin::Size,
            "head" => Builtin::Head,
            "last" => Builtin::Last,
            "keys" => Builtin::Keys,
            "range" => Builtin::Range,
            "coalesce" => Builtin::Coalesce,
            "tostring" => Builtin::ToString,
            "abs" => Builtin::Abs,
            "ceil" => Builtin::Ceil,
            "floor" => Builtin::Floor,
            "round" => Builtin::Round,
            "sqrt" => Builtin::Sqrt,
            "sign" => Builtin::Sign,
            "tolower" => Builtin::ToLower,
            "toupper" => Builtin::ToUpper,
            "trim" => Builtin::Trim,
            "reverse" => Builtin::Reverse,
            "substring" => Builtin::Substring,
            "split" => Builtin::Split,
            "regex_match" => Builtin::RegexMatch,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn is_aggregate_name(name: &str) -> bool {
        matches!(
            name.to_ascii_lowercase().as_str(),
            "count" | "sum" | "avg" | "min" | "max" | "collect" | "stdev" | "percentilecont"
        )
    }
}

/// The writer-directive call kinds; the enum value doubles as the target
/// entry's conventional column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum WriterKind {
    Create,
    Set,
    Delete,
    Merge,
}

impl WriterKind {
    pub fn column_name(self) -> &'static str {
        match self {
            WriterKind::Create => "_create_clause",
            WriterKind::Set => "_set_clause",
            WriterKind::Delete => "_delete_clause",
            WriterKind::Merge => "_merge_clause",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub enum Expr {
    /// Reference to a range-table column. `rel = None` resolves to the
    /// first visible column with that name, in range-table order.
    Column {
        rel: Option<String>,
        name: String,
    },
    Const(Value),
    Param(String),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Op {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Func {
        func: Builtin,
        args: Vec<Expr>,
    },
    Case {
        operand: Option<Box<Expr>>,
        arms: Vec<(Expr, Expr)>,
        default: Option<Box<Expr>>,
    },
    Cast {
        target: CastTarget,
        arg: Box<Expr>,
    },
    IsNull {
        arg: Box<Expr>,
        negated: bool,
    },
    /// Correlated EXISTS over a sub-pattern's query.
    Exists(Box<super::Query>),
    /// Map/entity field access on a scalar expression.
    Field {
        arg: Box<Expr>,
        key: String,
    },
    Index {
        arg: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        arg: Box<Expr>,
        lo: Option<Box<Expr>>,
        hi: Option<Box<Expr>>,
    },
    /// List and map constructors.
    ListCtor(Vec<Expr>),
    MapCtor(Vec<(String, Expr)>),
    /// An opaque writer directive embedded as serialized bytes; evaluates
    /// to the null sentinel after the executor applies it.
    Writer {
        kind: WriterKind,
        directive: Vec<u8>,
    },
}

impl Expr {
    pub fn column(rel: impl Into<String>, name: impl Into<String>) -> Expr {
        Expr::Column { rel: Some(rel.into()), name: name.into() }
    }

    pub fn unqualified(name: impl Into<String>) -> Expr {
        Expr::Column { rel: None, name: name.into() }
    }

    pub fn op(op: BinOp, left: Expr, right: Expr) -> Expr {
        Expr::Op { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn func(func: Builtin, args: Vec<Expr>) -> Expr {
        Expr::Func { func, args }
    }

    /// AND with flattening, so no `And` node ever has an `And` child.
    pub fn and(self, other: Expr) -> Expr {
        match (self, other) {
            (Expr::And(mut a), Expr::And(b)) => {
                a.extend(b);
                Expr::And(a)
            }
            (Expr::And(mut a), b) => {
                a.push(b);
                Expr::And(a)
            }
            (a, Expr::And(mut b)) => {
                b.insert(0, a);
                Expr::And(b)
            }
            (a, b) => Expr::And(vec![a, b]),
        }
    }

    /// OR with the same flattening rule.
    pub fn or(self, other: Expr) -> Expr {
        match (self, other) {
            (Expr::Or(mut a), Expr::Or(b)) => {
                a.extend(b);
                Expr::Or(a)
            }
            (Expr::Or(mut a), b) => {
                a.push(b);
                Expr::Or(a)
            }
            (a, Expr::Or(mut b)) => {
                b.insert(0, a);
                Expr::Or(b)
            }
            (a, b) => Expr::Or(vec![a, b]),
        }
    }

    /// Whether any column reference occurs under this expression. LIMIT and
    /// SKIP use this to reject variable references.
    pub fn references_columns(&self) -> bool {
        match self {
            Expr::Column { .. } => true,
            Expr::Const(_) | Expr::Param(_) | Expr::Writer { .. } => false,
            Expr::And(args) | Expr::Or(args) => args.iter().any(Expr::references_columns),
            Expr::Not(a) => a.references_columns(),
            Expr::Op { left, right, .. } => {
                left.references_columns() || right.references_columns()
            }
            Expr::Func { args, .. } => args.iter().any(Expr::references_columns),
            Expr::Case { operand, arms, default } => {
                operand.as_deref().map_or(false, Expr::references_columns)
                    || arms
                        .iter()
                        .any(|(w, t)| w.references_columns() || t.references_columns())
                    || default.as_deref().map_or(false, Expr::references_columns)
            }
            Expr::Cast { arg, .. } | Expr::IsNull { arg, .. } | Expr::Field { arg, .. } => {
                arg.references_columns()
            }
            Expr::Index { arg, index } => arg.references_columns() || index.references_columns(),
            Expr::Slice { arg, lo, hi } => {
                arg.references_columns()
                    || lo.as_deref().map_or(false, Expr::references_columns)
                    || hi.as_deref().map_or(false, Expr::references_columns)
            }
            Expr::ListCtor(items) => items.iter().any(Expr::references_columns),
            Expr::MapCtor(entries) => entries.iter().any(|(_, v)| v.references_columns()),
            Expr::Exists(_) => true,
        }
    }

    /// Whether the expression is a constant (literals composed with pure
    /// constructors). UNION coercion only rewrites constants.
    pub fn is_const(&self) -> bool {
        match self {
            Expr::Const(_) => true,
            Expr::ListCtor(items) => items.iter().all(Expr::is_const),
            Expr::MapCtor(entries) => entries.iter().all(|(_, v)| v.is_const()),
            Expr::Cast { arg, .. } => arg.is_const(),
            _ => false,
        }
    }
}
