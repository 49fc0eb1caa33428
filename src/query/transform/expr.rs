//! Expression lowering
//!
//! Turns AST expressions into the plan's expression tree. Comparison
//! chains lower to flattened conjunctions here, property access picks the
//! binding's `properties` column when the base names a graph entity, and
//! `EXISTS { pattern }` runs the pattern transformer to build a correlated
//! subquery.

use crate::core::error::PlanError;
use crate::core::value::{Value, ValueMap};
use crate::query::parser::ast::{self, BinaryOp, Literal};
use crate::query::plan::expr::{BinOp, Builtin, CastTarget, Expr};
use crate::query::transform::scope::{BindingKind, Scope};
use crate::query::transform::{pattern, TransformCtx};

pub fn transform_expr(
    ctx: &mut TransformCtx<'_>,
    scope: &Scope,
    expr: &ast::Expr,
) -> Result<Expr, PlanError> {
    match expr {
        ast::Expr::Literal(lit, _) => Ok(Expr::Const(literal_value(lit))),
        ast::Expr::Param(name, _) => Ok(Expr::Param(name.clone())),
        ast::Expr::Variable(name, span) => match scope.lookup(name) {
            Some(binding) => Ok(binding.expr.clone()),
            None => Err(PlanError::binding(
                format!("variable \"{}\" does not exist", name),
                *span,
            )),
        },
        ast::Expr::And(args, _) => {
            let mut lowered = transform_expr(ctx, scope, &args[0])?;
            for arg in &args[1..] {
                lowered = lowered.and(transform_expr(ctx, scope, arg)?);
            }
            Ok(lowered)
        }
        ast::Expr::Or(args, _) => {
            let mut lowered = transform_expr(ctx, scope, &args[0])?;
            for arg in &args[1..] {
                lowered = lowered.or(transform_expr(ctx, scope, arg)?);
            }
            Ok(lowered)
        }
        ast::Expr::Not(inner, _) => Ok(Expr::Not(Box::new(transform_expr(ctx, scope, inner)?))),
        ast::Expr::Neg(inner, _) => Ok(Expr::op(
            BinOp::Sub,
            Expr::Const(Value::Int(0)),
            transform_expr(ctx, scope, inner)?,
        )),
        ast::Expr::Binary { op, left, right, .. } => {
            let l = transform_expr(ctx, scope, left)?;
            let r = transform_expr(ctx, scope, right)?;
            Ok(match op {
                BinaryOp::Add => Expr::op(BinOp::Add, l, r),
                BinaryOp::Sub => Expr::op(BinOp::Sub, l, r),
                BinaryOp::Mul => Expr::op(BinOp::Mul, l, r),
                BinaryOp::Div => Expr::op(BinOp::Div, l, r),
                BinaryOp::Mod => Expr::op(BinOp::Mod, l, r),
                BinaryOp::Pow => Expr::op(BinOp::Pow, l, r),
                BinaryOp::In => Expr::op(BinOp::In, l, r),
                BinaryOp::StartsWith => Expr::op(BinOp::StartsWith, l, r),
                BinaryOp::EndsWith => Expr::op(BinOp::EndsWith, l, r),
                BinaryOp::Contains => Expr::op(BinOp::ContainsStr, l, r),
                BinaryOp::Regex => Expr::func(Builtin::RegexMatch, vec![l, r]),
            })
        }
        ast::Expr::ChainCmp { terms, ops, .. } => {
            // `a < b < c` lowers to `(a<b) AND (b<c)` in one pass. The
            // shared terms are lowered once and cloned into both pairs.
            let lowered_terms: Vec<Expr> = terms
                .iter()
                .map(|t| transform_expr(ctx, scope, t))
                .collect::<Result<_, _>>()?;
            let mut conjunction: Option<Expr> = None;
            for (i, op) in ops.iter().enumerate() {
                let pair = Expr::op(
                    cmp_op(*op),
                    lowered_terms[i].clone(),
                    lowered_terms[i + 1].clone(),
                );
                conjunction = Some(match conjunction {
                    None => pair,
                    Some(acc) => acc.and(pair),
                });
            }
            Ok(conjunction.expect("parser guarantees at least one comparison"))
        }
        ast::Expr::IsNull { expr, negated, .. } => Ok(Expr::IsNull {
            arg: Box::new(transform_expr(ctx, scope, expr)?),
            negated: *negated,
        }),
        ast::Expr::Property { base, key, .. } => {
            // Entity property access reads the binding's properties map;
            // anything else is a plain map-field access.
            if let ast::Expr::Variable(name, _) = base.as_ref() {
                if let Some(binding) = scope.lookup(name) {
                    if matches!(
                        binding.kind,
                        BindingKind::Vertex | BindingKind::Edge | BindingKind::VleEdge
                    ) {
                        return Ok(Expr::Field {
                            arg: Box::new(binding.props_expr()),
                            key: key.clone(),
                        });
                    }
                }
            }
            Ok(Expr::Field {
                arg: Box::new(transform_expr(ctx, scope, base)?),
                key: key.clone(),
            })
        }
        ast::Expr::Subscript { base, index, .. } => Ok(Expr::Index {
            arg: Box::new(transform_expr(ctx, scope, base)?),
            index: Box::new(transform_expr(ctx, scope, index)?),
        }),
        ast::Expr::Slice { base, lo, hi, .. } => Ok(Expr::Slice {
            arg: Box::new(transform_expr(ctx, scope, base)?),
            lo: match lo {
                Some(e) => Some(Box::new(transform_expr(ctx, scope, e)?)),
                None => None,
            },
            hi: match hi {
                Some(e) => Some(Box::new(transform_expr(ctx, scope, e)?)),
                None => None,
            },
        }),
        ast::Expr::FuncCall { name, args, span } => {
            if Builtin::is_aggregate_name(name) {
                return Err(PlanError::not_supported(
                    format!("aggregate function {}() is delegated to the host engine", name),
                    *span,
                ));
            }
            let Some(builtin) = Builtin::from_name(name) else {
                return Err(PlanError::semantic(
                    format!("unknown function {}()", name),
                    *span,
                ));
            };
            let lowered = args
                .iter()
                .map(|a| transform_expr(ctx, scope, a))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::func(builtin, lowered))
        }
        ast::Expr::Case { operand, arms, default, .. } => Ok(Expr::Case {
            operand: match operand {
                Some(e) => Some(Box::new(transform_expr(ctx, scope, e)?)),
                None => None,
            },
            arms: arms
                .iter()
                .map(|arm| {
                    Ok((
                        transform_expr(ctx, scope, &arm.when)?,
                        transform_expr(ctx, scope, &arm.then)?,
                    ))
                })
                .collect::<Result<Vec<_>, PlanError>>()?,
            default: match default {
                Some(e) => Some(Box::new(transform_expr(ctx, scope, e)?)),
                None => None,
            },
        }),
        ast::Expr::List(items, _) => Ok(Expr::ListCtor(
            items
                .iter()
                .map(|e| transform_expr(ctx, scope, e))
                .collect::<Result<_, _>>()?,
        )),
        ast::Expr::Map(entries, _) => Ok(Expr::MapCtor(
            entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), transform_expr(ctx, scope, v)?)))
                .collect::<Result<Vec<_>, PlanError>>()?,
        )),
        ast::Expr::Cast { expr, target, span } => {
            let Some(cast) = CastTarget::from_name(target) else {
                return Err(PlanError::semantic(
                    format!("unrecognized typecast target \"{}\"", target),
                    *span,
                ));
            };
            Ok(Expr::Cast {
                target: cast,
                arg: Box::new(transform_expr(ctx, scope, expr)?),
            })
        }
        ast::Expr::ExistsPattern { pattern: paths, .. } => {
            let subquery = pattern::transform_sub_pattern(ctx, scope, paths)?;
            Ok(Expr::Exists(Box::new(subquery)))
        }
    }
}

/// Lower a property-constraint expression (a map literal or parameter) for
/// containment predicates and create-time constructors.
pub fn transform_props(
    ctx: &mut TransformCtx<'_>,
    scope: &Scope,
    props: &ast::Expr,
) -> Result<Expr, PlanError> {
    transform_expr(ctx, scope, props)
}

pub fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Integer(i) => Value::Int(*i),
        Literal::Float(x) => Value::Float(*x),
        Literal::String(s) => Value::String(s.clone()),
    }
}

/// Evaluate a constant map expression at transform time, when possible.
/// Used for VLE property templates, which the engine needs as a value.
pub fn const_map(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Const(v @ Value::Map(_)) => Some(v.clone()),
        Expr::MapCtor(entries) => {
            let mut map = ValueMap::new();
            for (k, v) in entries {
                match v {
                    Expr::Const(value) => {
                        map.insert(k.clone(), value.clone());
                    }
                    _ => return None,
                }
            }
            Some(Value::Map(map))
        }
        _ => None,
    }
}

fn cmp_op(op: ast::CmpOp) -> BinOp {
    match op {
        ast::CmpOp::Eq => BinOp::Eq,
        ast::CmpOp::Ne => BinOp::Ne,
        ast::CmpOp::Lt => BinOp::Lt,
        ast::CmpOp::Le => BinOp::Le,
        ast::CmpOp::Gt => BinOp::Gt,
        ast::CmpOp::Ge => BinOp::Ge,
    }
}
