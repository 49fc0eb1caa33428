//! Expression AST
//!
//! Boolean connectives are n-ary and kept maximally flattened: appending to
//! an `And` whose root is already `And` extends the operand list. Chained
//! comparisons accumulate into a single `ChainCmp` node and are lowered to a
//! conjunction once, at transform time.

use crate::core::span::Span;
use crate::query::parser::ast::patterns::PathPattern;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    In,
    StartsWith,
    EndsWith,
    Contains,
    Regex,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::In => "IN",
            BinaryOp::StartsWith => "STARTS WITH",
            BinaryOp::EndsWith => "ENDS WITH",
            BinaryOp::Contains => "CONTAINS",
            BinaryOp::Regex => "=~",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseArm {
    pub when: Expr,
    pub then: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal, Span),
    Param(String, Span),
    Variable(String, Span),
    And(Vec<Expr>, Span),
    Or(Vec<Expr>, Span),
    Not(Box<Expr>, Span),
    Neg(Box<Expr>, Span),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    /// `a < b <= c` as one node; lowered to `(a<b) AND (b<=c)`.
    ChainCmp {
        terms: Vec<Expr>,
        ops: Vec<CmpOp>,
        span: Span,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
        span: Span,
    },
    Property {
        base: Box<Expr>,
        key: String,
        span: Span,
    },
    Subscript {
        base: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Slice {
        base: Box<Expr>,
        lo: Option<Box<Expr>>,
        hi: Option<Box<Expr>>,
        span: Span,
    },
    FuncCall {
        name: String,
        args: Vec<Expr>,
        span: Span,
    },
    Case {
        operand: Option<Box<Expr>>,
        arms: Vec<CaseArm>,
        default: Option<Box<Expr>>,
        span: Span,
    },
    List(Vec<Expr>, Span),
    Map(Vec<(String, Expr)>, Span),
    Cast {
        expr: Box<Expr>,
        target: String,
        span: Span,
    },
    /// `EXISTS { pattern }` sub-pattern.
    ExistsPattern {
        pattern: Vec<PathPattern>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, s)
            | Expr::Param(_, s)
            | Expr::Variable(_, s)
            | Expr::And(_, s)
            | Expr::Or(_, s)
            | Expr::Not(_, s)
            | Expr::Neg(_, s)
            | Expr::List(_, s)
            | Expr::Map(_, s) => *s,
            Expr::Binary { span, .. }
            | Expr::ChainCmp { span, .. }
            | Expr::IsNull { span, .. }
            | Expr::Property { span, .. }
            | Expr::Subscript { span, .. }
            | Expr::Slice { span, .. }
            | Expr::FuncCall { span, .. }
            | Expr::Case { span, .. }
            | Expr::Cast { span, .. }
            | Expr::ExistsPattern { span, .. } => *span,
        }
    }

    /// Append a conjunct, extending an existing `And` root instead of
    /// nesting. Used by the parser so emitted trees are always flat.
    pub fn and(self, other: Expr, span: Span) -> Expr {
        match self {
            Expr::And(mut args, _) => {
                args.push(other);
                Expr::And(args, span)
            }
            first => Expr::And(vec![first, other], span),
        }
    }

    /// Same flattening rule for `Or`.
    pub fn or(self, other: Expr, span: Span) -> Expr {
        match self {
            Expr::Or(mut args, _) => {
                args.push(other);
                Expr::Or(args, span)
            }
            first => Expr::Or(vec![first, other], span),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Or(..) => 1,
            Expr::And(..) => 2,
            Expr::Not(..) => 3,
            Expr::ChainCmp { .. } => 4,
            Expr::Binary { op, .. } => match op {
                BinaryOp::Add | BinaryOp::Sub => 5,
                BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 6,
                BinaryOp::Pow => 7,
                BinaryOp::In => 8,
                BinaryOp::StartsWith
                | BinaryOp::EndsWith
                | BinaryOp::Contains
                | BinaryOp::Regex => 10,
            },
            Expr::IsNull { .. } => 8,
            Expr::Neg(..) => 9,
            _ => 12,
        }
    }

    fn fmt_child(&self, child: &Expr, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if child.precedence() < self.precedence() {
            write!(f, "({})", child)
        } else {
            write!(f, "{}", child)
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "NULL"),
            Literal::Bool(true) => write!(f, "true"),
            Literal::Bool(false) => write!(f, "false"),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Literal::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit, _) => write!(f, "{}", lit),
            Expr::Param(name, _) => write!(f, "${}", name),
            Expr::Variable(name, _) => write!(f, "{}", name),
            Expr::And(args, _) => {
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    self.fmt_child(a, f)?;
                }
                Ok(())
            }
            Expr::Or(args, _) => {
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, " OR ")?;
                    }
                    self.fmt_child(a, f)?;
                }
                Ok(())
            }
            Expr::Not(inner, _) => {
                write!(f, "NOT ")?;
                self.fmt_child(inner, f)
            }
            Expr::Neg(inner, _) => {
                write!(f, "-")?;
                self.fmt_child(inner, f)
            }
            Expr::Binary { op, left, right, .. } => {
                self.fmt_child(left, f)?;
                write!(f, " {} ", op.symbol())?;
                self.fmt_child(right, f)
            }
            Expr::ChainCmp { terms, ops, .. } => {
                self.fmt_child(&terms[0], f)?;
                for (op, term) in ops.iter().zip(terms.iter().skip(1)) {
                    write!(f, " {} ", op.symbol())?;
                    self.fmt_child(term, f)?;
                }
                Ok(())
            }
            Expr::IsNull { expr, negated, .. } => {
                self.fmt_child(expr, f)?;
                write!(f, " IS {}NULL", if *negated { "NOT " } else { "" })
            }
            Expr::Property { base, key, .. } => {
                self.fmt_child(base, f)?;
                write!(f, ".{}", key)
            }
            Expr::Subscript { base, index, .. } => {
                self.fmt_child(base, f)?;
                write!(f, "[{}]", index)
            }
            Expr::Slice { base, lo, hi, .. } => {
                self.fmt_child(base, f)?;
                write!(f, "[")?;
                if let Some(lo) = lo {
                    write!(f, "{}", lo)?;
                }
                write!(f, "..")?;
                if let Some(hi) = hi {
                    write!(f, "{}", hi)?;
                }
                write!(f, "]")
            }
            Expr::FuncCall { name, args, .. } => {
                write!(f, "{}(", name)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
            Expr::Case { operand, arms, default, .. } => {
                write!(f, "CASE")?;
                if let Some(op) = operand {
                    write!(f, " {}", op)?;
                }
                for arm in arms {
                    write!(f, " WHEN {} THEN {}", arm.when, arm.then)?;
                }
                if let Some(d) = default {
                    write!(f, " ELSE {}", d)?;
                }
                write!(f, " END")
            }
            Expr::List(items, _) => {
                write!(f, "[")?;
                for (i, e) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "]")
            }
            Expr::Map(entries, _) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Expr::Cast { expr, target, .. } => {
                self.fmt_child(expr, f)?;
                write!(f, "::{}", target)
            }
            Expr::ExistsPattern { pattern, .. } => {
                write!(f, "EXISTS {{ ")?;
                for (i, p) in pattern.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, " }}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s() -> Span {
        Span::default()
    }

    #[test]
    fn and_append_extends_flat_list() {
        let a = Expr::Variable("a".into(), s());
        let b = Expr::Variable("b".into(), s());
        let c = Expr::Variable("c".into(), s());
        let tree = a.and(b, s()).and(c, s());
        match tree {
            Expr::And(args, _) => assert_eq!(args.len(), 3),
            other => panic!("expected flat And, got {:?}", other),
        }
    }

    #[test]
    fn chain_prints_in_source_order() {
        let chain = Expr::ChainCmp {
            terms: vec![
                Expr::Variable("a".into(), s()),
                Expr::Literal(Literal::Integer(1), s()),
                Expr::Variable("b".into(), s()),
            ],
            ops: vec![CmpOp::Lt, CmpOp::Le],
            span: s(),
        };
        assert_eq!(chain.to_string(), "a < 1 <= b");
    }

    #[test]
    fn printer_parenthesizes_lower_precedence_children() {
        let or = Expr::Variable("a".into(), s()).or(Expr::Variable("b".into(), s()), s());
        let and = or.clone().and(Expr::Variable("c".into(), s()), s());
        assert_eq!(and.to_string(), "(a OR b) AND c");
    }
}
