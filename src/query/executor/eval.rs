//! Expression evaluation
//!
//! Walks the lowered expression tree over a row frame. Boolean connectives
//! use three-valued logic; arithmetic and comparisons propagate NULL;
//! subscript and slice follow half-open semantics with NULL (never an
//! error) for out-of-range access.

use crate::core::error::{ExecError, GraphResult};
use crate::core::gid::GraphId;
use crate::core::value::{Value, ValueMap};
use crate::core::vertex_edge_path::{Path, PathEntry};
use crate::query::executor::{run_query, Env, ExecCtx};
use crate::query::plan::expr::{BinOp, Builtin, CastTarget, Expr};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Three-valued boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    fn from_value(v: &Value) -> Truth {
        match v {
            Value::Bool(true) => Truth::True,
            Value::Bool(false) => Truth::False,
            _ => Truth::Unknown,
        }
    }

    fn to_value(self) -> Value {
        match self {
            Truth::True => Value::Bool(true),
            Truth::False => Value::Bool(false),
            Truth::Unknown => Value::Null,
        }
    }
}

/// Evaluate a predicate; only a definite `true` passes a row.
pub fn eval_filter(ctx: &ExecCtx<'_>, env: &Env<'_>, expr: &Expr) -> GraphResult<bool> {
    Ok(eval_truth(ctx, env, expr)? == Truth::True)
}

fn eval_truth(ctx: &ExecCtx<'_>, env: &Env<'_>, expr: &Expr) -> GraphResult<Truth> {
    Ok(Truth::from_value(&eval(ctx, env, expr)?))
}

pub fn eval(ctx: &ExecCtx<'_>, env: &Env<'_>, expr: &Expr) -> GraphResult<Value> {
    match expr {
        Expr::Column { rel, name } => match env.lookup(rel.as_deref(), name) {
            Some(v) => Ok(v.clone()),
            None => Err(ExecError::runtime(format!(
                "column \"{}\" is not in scope",
                name
            ))
            .into()),
        },
        Expr::Const(v) => Ok(v.clone()),
        Expr::Param(name) => match ctx.params.get(name) {
            Some(v) => Ok(v.clone()),
            None => Err(ExecError::MissingParameter(name.clone()).into()),
        },
        Expr::And(args) => {
            let mut result = Truth::True;
            for arg in args {
                match eval_truth(ctx, env, arg)? {
                    Truth::False => return Ok(Value::Bool(false)),
                    Truth::Unknown => result = Truth::Unknown,
                    Truth::True => {}
                }
            }
            Ok(result.to_value())
        }
        Expr::Or(args) => {
            let mut result = Truth::False;
            for arg in args {
                match eval_truth(ctx, env, arg)? {
                    Truth::True => return Ok(Value::Bool(true)),
                    Truth::Unknown => result = Truth::Unknown,
                    Truth::False => {}
                }
            }
            Ok(result.to_value())
        }
        Expr::Not(arg) => Ok(match eval_truth(ctx, env, arg)? {
            Truth::True => Value::Bool(false),
            Truth::False => Value::Bool(true),
            Truth::Unknown => Value::Null,
        }),
        Expr::Op { op, left, right } => {
            let l = eval(ctx, env, left)?;
            let r = eval(ctx, env, right)?;
            eval_binop(*op, l, r)
        }
        Expr::Func { func, args } => eval_builtin(ctx, env, *func, args),
        Expr::Case { operand, arms, default } => {
            let operand = match operand {
                Some(e) => Some(eval(ctx, env, e)?),
                None => None,
            };
            for (when, then) in arms {
                let hit = match &operand {
                    Some(op_value) => {
                        let when_value = eval(ctx, env, when)?;
                        !op_value.is_null() && !when_value.is_null() && *op_value == when_value
                    }
                    None => eval_truth(ctx, env, when)? == Truth::True,
                };
                if hit {
                    return eval(ctx, env, then);
                }
            }
            match default {
                Some(e) => eval(ctx, env, e),
                None => Ok(Value::Null),
            }
        }
        Expr::Cast { target, arg } => {
            let v = eval(ctx, env, arg)?;
            eval_cast(*target, v)
        }
        Expr::IsNull { arg, negated } => {
            let v = eval(ctx, env, arg)?;
            Ok(Value::Bool(v.is_null() != *negated))
        }
        Expr::Exists(query) => {
            let rows = run_query(ctx, query, Some(env))?;
            Ok(Value::Bool(!rows.rows.is_empty()))
        }
        Expr::Field { arg, key } => {
            let v = eval(ctx, env, arg)?;
            Ok(field_access(&v, key))
        }
        Expr::Index { arg, index } => {
            let base = eval(ctx, env, arg)?;
            let index = eval(ctx, env, index)?;
            Ok(index_access(&base, &index))
        }
        Expr::Slice { arg, lo, hi } => {
            let base = eval(ctx, env, arg)?;
            let lo = match lo {
                Some(e) => Some(eval(ctx, env, e)?),
                None => None,
            };
            let hi = match hi {
                Some(e) => Some(eval(ctx, env, e)?),
                None => None,
            };
            Ok(slice_access(&base, lo.as_ref(), hi.as_ref()))
        }
        Expr::ListCtor(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval(ctx, env, item)?);
            }
            Ok(Value::List(out))
        }
        Expr::MapCtor(entries) => {
            let mut map = ValueMap::new();
            for (key, value) in entries {
                map.insert(key.clone(), eval(ctx, env, value)?);
            }
            Ok(Value::Map(map))
        }
        // Writer calls are applied by the projection loop; as a plain
        // expression the call is the null sentinel.
        Expr::Writer { .. } => Ok(Value::Null),
    }
}

fn eval_binop(op: BinOp, l: Value, r: Value) -> GraphResult<Value> {
    use BinOp::*;
    match op {
        Add | Sub | Mul | Div | Mod | Pow => eval_arithmetic(op, l, r),
        Eq | Ne | Lt | Le | Gt | Ge => {
            let Some(ord) = l.try_cmp(&r) else {
                // Incomparable or NULL operands: equality can still be
                // decided for same-shape values, everything else is NULL.
                if l.is_null() || r.is_null() {
                    return Ok(Value::Null);
                }
                return Ok(match op {
                    Eq => Value::Bool(l == r),
                    Ne => Value::Bool(l != r),
                    _ => Value::Null,
                });
            };
            let pass = match op {
                Eq => ord == Ordering::Equal,
                Ne => ord != Ordering::Equal,
                Lt => ord == Ordering::Less,
                Le => ord != Ordering::Greater,
                Gt => ord == Ordering::Greater,
                Ge => ord != Ordering::Less,
                _ => unreachable!(),
            };
            Ok(Value::Bool(pass))
        }
        StartsWith | EndsWith | ContainsStr => match (&l, &r) {
            (Value::String(a), Value::String(b)) => Ok(Value::Bool(match op {
                StartsWith => a.starts_with(b.as_str()),
                EndsWith => a.ends_with(b.as_str()),
                ContainsStr => a.contains(b.as_str()),
                _ => unreachable!(),
            })),
            _ => Ok(Value::Null),
        },
        MapContains => {
            if l.is_null() || r.is_null() {
                return Ok(Value::Null);
            }
            Ok(Value::Bool(l.deep_contains(&r)))
        }
        In => {
            if l.is_null() || r.is_null() {
                return Ok(Value::Null);
            }
            let Value::List(items) = &r else {
                return Ok(Value::Null);
            };
            let mut saw_null = false;
            for item in items {
                if item.is_null() {
                    saw_null = true;
                } else if *item == l {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(if saw_null { Value::Null } else { Value::Bool(false) })
        }
    }
}

fn eval_arithmetic(op: BinOp, l: Value, r: Value) -> GraphResult<Value> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    // String and list concatenation ride on `+`.
    if op == BinOp::Add {
        match (&l, &r) {
            (Value::String(a), Value::String(b)) => {
                return Ok(Value::String(format!("{}{}", a, b)));
            }
            (Value::List(a), Value::List(b)) => {
                let mut out = a.clone();
                out.extend(b.clone());
                return Ok(Value::List(out));
            }
            (Value::List(a), b) => {
                let mut out = a.clone();
                out.push(b.clone());
                return Ok(Value::List(out));
            }
            _ => {}
        }
    }

    match (&l, &r) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            Ok(match op {
                BinOp::Add => Value::Int(a.wrapping_add(b)),
                BinOp::Sub => Value::Int(a.wrapping_sub(b)),
                BinOp::Mul => Value::Int(a.wrapping_mul(b)),
                BinOp::Div => {
                    if b == 0 {
                        return Err(ExecError::runtime("division by zero").into());
                    }
                    Value::Int(a / b)
                }
                BinOp::Mod => {
                    if b == 0 {
                        return Err(ExecError::runtime("division by zero").into());
                    }
                    Value::Int(a % b)
                }
                BinOp::Pow => {
                    if (0..=i32::MAX as i64).contains(&b) {
                        Value::Float((a as f64).powi(b as i32))
                    } else {
                        Value::Float((a as f64).powf(b as f64))
                    }
                }
                _ => unreachable!(),
            })
        }
        _ => {
            let (Some(a), Some(b)) = (l.as_float(), r.as_float()) else {
                return Err(ExecError::runtime(format!(
                    "cannot apply arithmetic to {} and {}",
                    l.type_name(),
                    r.type_name()
                ))
                .into());
            };
            Ok(match op {
                BinOp::Add => Value::Float(a + b),
                BinOp::Sub => Value::Float(a - b),
                BinOp::Mul => Value::Float(a * b),
                BinOp::Div => {
                    if b == 0.0 {
                        return Err(ExecError::runtime("division by zero").into());
                    }
                    Value::Float(a / b)
                }
                BinOp::Mod => Value::Float(a % b),
                BinOp::Pow => Value::Float(a.powf(b)),
                _ => unreachable!(),
            })
        }
    }
}

fn field_access(value: &Value, key: &str) -> Value {
    match value {
        Value::Map(map) => map.get(key).cloned().unwrap_or(Value::Null),
        Value::Vertex(v) => v.properties.get(key).cloned().unwrap_or(Value::Null),
        Value::Edge(e) => e.properties.get(key).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn index_access(base: &Value, index: &Value) -> Value {
    match (base, index) {
        (Value::List(items), Value::Int(i)) => {
            let len = items.len() as i64;
            let idx = if *i < 0 { len + *i } else { *i };
            if idx < 0 || idx >= len {
                Value::Null
            } else {
                items[idx as usize].clone()
            }
        }
        (Value::Map(map), Value::String(key)) => map.get(key).cloned().unwrap_or(Value::Null),
        (Value::Vertex(_), Value::String(key)) | (Value::Edge(_), Value::String(key)) => {
            field_access(base, key)
        }
        _ => Value::Null,
    }
}

/// Half-open slice with negative indexing and clamping.
fn slice_access(base: &Value, lo: Option<&Value>, hi: Option<&Value>) -> Value {
    let Value::List(items) = base else {
        return Value::Null;
    };
    let len = items.len() as i64;
    let resolve = |bound: Option<&Value>, default: i64| -> Option<i64> {
        match bound {
            None => Some(default),
            Some(Value::Int(i)) => Some(if *i < 0 { len + *i } else { *i }),
            Some(Value::Null) | Some(_) => None,
        }
    };
    let (Some(lo), Some(hi)) = (resolve(lo, 0), resolve(hi, len)) else {
        return Value::Null;
    };
    let lo = lo.clamp(0, len);
    let hi = hi.clamp(0, len);
    if lo >= hi {
        return Value::List(Vec::new());
    }
    Value::List(items[lo as usize..hi as usize].to_vec())
}

fn eval_cast(target: CastTarget, v: Value) -> GraphResult<Value> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    let fail = |v: &Value| {
        GraphResult::<Value>::Err(
            ExecError::runtime(format!("cannot cast {} to the requested type", v.type_name()))
                .into(),
        )
    };
    match target {
        CastTarget::Integer => match &v {
            Value::Int(_) => Ok(v),
            Value::Float(x) => Ok(Value::Int(*x as i64)),
            Value::String(s) => match s.trim().parse::<i64>() {
                Ok(i) => Ok(Value::Int(i)),
                Err(_) => fail(&v),
            },
            Value::Bool(b) => Ok(Value::Int(if *b { 1 } else { 0 })),
            _ => fail(&v),
        },
        CastTarget::Float | CastTarget::Numeric => match &v {
            Value::Float(_) => Ok(v),
            Value::Int(i) => Ok(Value::Float(*i as f64)),
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(x) => Ok(Value::Float(x)),
                Err(_) => fail(&v),
            },
            _ => fail(&v),
        },
        CastTarget::String => Ok(Value::String(to_string_value(&v))),
        CastTarget::Boolean => match &v {
            Value::Bool(_) => Ok(v),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => fail(&v),
            },
            _ => fail(&v),
        },
        CastTarget::Vertex => match &v {
            Value::Vertex(_) => Ok(v),
            _ => fail(&v),
        },
        CastTarget::Edge => match &v {
            Value::Edge(_) => Ok(v),
            _ => fail(&v),
        },
        CastTarget::Traversal => match &v {
            Value::Path(_) => Ok(v),
            _ => fail(&v),
        },
        CastTarget::VariableEdge => match &v {
            Value::EdgeSet(_) => Ok(v),
            _ => fail(&v),
        },
    }
}

fn to_string_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn eval_builtin(
    ctx: &ExecCtx<'_>,
    env: &Env<'_>,
    func: Builtin,
    args: &[Expr],
) -> GraphResult<Value> {
    // Coalesce short-circuits, so it evaluates its own arguments.
    if func == Builtin::Coalesce {
        for arg in args {
            let v = eval(ctx, env, arg)?;
            if !v.is_null() {
                return Ok(v);
            }
        }
        return Ok(Value::Null);
    }

    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval(ctx, env, arg)?);
    }

    let arg0 = || values.first().cloned().unwrap_or(Value::Null);

    match func {
        Builtin::Id => Ok(match arg0() {
            Value::Vertex(v) => Value::Int(v.id.as_i64()),
            Value::Edge(e) => Value::Int(e.id.as_i64()),
            Value::Int(i) => Value::Int(i),
            _ => Value::Null,
        }),
        Builtin::StartId => Ok(match arg0() {
            Value::Edge(e) => Value::Int(e.start_id.as_i64()),
            _ => Value::Null,
        }),
        Builtin::EndId => Ok(match arg0() {
            Value::Edge(e) => Value::Int(e.end_id.as_i64()),
            _ => Value::Null,
        }),
        Builtin::Label => Ok(match arg0() {
            Value::Vertex(v) => Value::String(v.label),
            Value::Edge(e) => Value::String(e.label),
            _ => Value::Null,
        }),
        Builtin::Type => Ok(match arg0() {
            Value::Edge(e) => Value::String(e.label),
            _ => Value::Null,
        }),
        Builtin::Properties => Ok(match arg0() {
            Value::Vertex(v) => Value::Map(v.properties),
            Value::Edge(e) => Value::Map(e.properties),
            m @ Value::Map(_) => m,
            _ => Value::Null,
        }),
        Builtin::StartNode | Builtin::EndNode => {
            let Value::Edge(e) = arg0() else {
                return Ok(Value::Null);
            };
            let id = if func == Builtin::StartNode { e.start_id } else { e.end_id };
            Ok(ctx
                .store
                .vertex_by_id(ctx.graph, id)
                .map(Value::Vertex)
                .unwrap_or(Value::Null))
        }
        Builtin::Nodes => Ok(match arg0() {
            Value::Path(p) => Value::List(p.vertices().into_iter().map(Value::Vertex).collect()),
            _ => Value::Null,
        }),
        Builtin::Relationships => Ok(match arg0() {
            Value::Path(p) => {
                Value::List(p.relationships().into_iter().map(Value::Edge).collect())
            }
            Value::EdgeSet(es) => {
                Value::List(es.edges.into_iter().map(Value::Edge).collect())
            }
            _ => Value::Null,
        }),
        Builtin::Length => Ok(match arg0() {
            Value::Path(p) => Value::Int(p.len() as i64),
            Value::EdgeSet(es) => Value::Int(es.len() as i64),
            Value::List(items) => Value::Int(items.len() as i64),
            Value::String(s) => Value::Int(s.chars().count() as i64),
            _ => Value::Null,
        }),
        Builtin::Size => Ok(match arg0() {
            Value::List(items) => Value::Int(items.len() as i64),
            Value::Map(m) => Value::Int(m.len() as i64),
            Value::String(s) => Value::Int(s.chars().count() as i64),
            _ => Value::Null,
        }),
        Builtin::Head => Ok(match arg0() {
            Value::List(items) => items.into_iter().next().unwrap_or(Value::Null),
            _ => Value::Null,
        }),
        Builtin::Last => Ok(match arg0() {
            Value::List(items) => items.into_iter().last().unwrap_or(Value::Null),
            _ => Value::Null,
        }),
        Builtin::Keys => Ok(match arg0() {
            Value::Map(m) => {
                Value::List(m.keys().map(|k| Value::String(k.clone())).collect())
            }
            Value::Vertex(v) => {
                Value::List(v.properties.keys().map(|k| Value::String(k.clone())).collect())
            }
            Value::Edge(e) => {
                Value::List(e.properties.keys().map(|k| Value::String(k.clone())).collect())
            }
            _ => Value::Null,
        }),
        Builtin::Range => {
            let (Some(Value::Int(from)), Some(Value::Int(to))) =
                (values.first(), values.get(1))
            else {
                return Ok(Value::Null);
            };
            let step = match values.get(2) {
                Some(Value::Int(s)) if *s != 0 => *s,
                Some(_) => return Err(ExecError::runtime("range() step must not be zero").into()),
                None => 1,
            };
            let mut out = Vec::new();
            let mut i = *from;
            while (step > 0 && i <= *to) || (step < 0 && i >= *to) {
                out.push(Value::Int(i));
                i += step;
            }
            Ok(Value::List(out))
        }
        Builtin::Coalesce => unreachable!("handled above"),
        Builtin::ToString => Ok(match arg0() {
            Value::Null => Value::Null,
            other => Value::String(to_string_value(&other)),
        }),
        Builtin::Abs => numeric_unary(arg0(), |i| Value::Int(i.abs()), |f| Value::Float(f.abs())),
        Builtin::Ceil => numeric_unary(arg0(), Value::Int, |f| Value::Float(f.ceil())),
        Builtin::Floor => numeric_unary(arg0(), Value::Int, |f| Value::Float(f.floor())),
        Builtin::Round => numeric_unary(arg0(), Value::Int, |f| Value::Float(f.round())),
        Builtin::Sqrt => match arg0().as_float() {
            Some(f) => Ok(Value::Float(f.sqrt())),
            None => Ok(Value::Null),
        },
        Builtin::Sign => match arg0() {
            Value::Int(i) => Ok(Value::Int(i.signum())),
            Value::Float(f) => Ok(Value::Int(if f > 0.0 {
                1
            } else if f < 0.0 {
                -1
            } else {
                0
            })),
            _ => Ok(Value::Null),
        },
        Builtin::ToLower => string_unary(arg0(), |s| s.to_lowercase()),
        Builtin::ToUpper => string_unary(arg0(), |s| s.to_uppercase()),
        Builtin::Trim => string_unary(arg0(), |s| s.trim().to_string()),
        Builtin::Reverse => Ok(match arg0() {
            Value::String(s) => Value::String(s.chars().rev().collect()),
            Value::List(mut items) => {
                items.reverse();
                Value::List(items)
            }
            _ => Value::Null,
        }),
        Builtin::Substring => {
            let Value::String(s) = arg0() else {
                return Ok(Value::Null);
            };
            let Some(Value::Int(start)) = values.get(1) else {
                return Ok(Value::Null);
            };
            let chars: Vec<char> = s.chars().collect();
            let start = (*start).clamp(0, chars.len() as i64) as usize;
            let len = match values.get(2) {
                Some(Value::Int(l)) => (*l).max(0) as usize,
                _ => chars.len() - start,
            };
            Ok(Value::String(chars[start..(start + len).min(chars.len())].iter().collect()))
        }
        Builtin::Split => {
            let (Value::String(s), Some(Value::String(sep))) = (arg0(), values.get(1)) else {
                return Ok(Value::Null);
            };
            Ok(Value::List(
                s.split(sep.as_str())
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            ))
        }
        Builtin::RegexMatch => {
            let (Value::String(s), Some(Value::String(pattern))) = (arg0(), values.get(1)) else {
                return Ok(Value::Null);
            };
            // `=~` matches the whole string, so anchor the pattern.
            let regex = Regex::new(&format!("^(?:{})$", pattern))
                .map_err(|e| ExecError::runtime(format!("invalid regular expression: {}", e)))?;
            Ok(Value::Bool(regex.is_match(&s)))
        }
        Builtin::Unnest => Ok(arg0()),
        Builtin::ExtractLabelId => Ok(match arg0() {
            Value::Int(id) => Value::Int(GraphId::from_i64(id).label_id().0 as i64),
            _ => Value::Null,
        }),
        Builtin::StartOf => Ok(match arg0() {
            Value::EdgeSet(es) => Value::Int(es.start_id.as_i64()),
            _ => Value::Null,
        }),
        Builtin::EndOf => Ok(match arg0() {
            Value::EdgeSet(es) => Value::Int(es.end_id.as_i64()),
            _ => Value::Null,
        }),
        Builtin::EnforceEdgeUniqueness => {
            let mut seen: HashSet<i64> = HashSet::new();
            for value in &values {
                let unique = match value {
                    Value::Int(id) => seen.insert(*id),
                    Value::Edge(e) => seen.insert(e.id.as_i64()),
                    Value::EdgeSet(es) => {
                        let mut ok = true;
                        for id in es.edge_ids() {
                            if !seen.insert(id.as_i64()) {
                                ok = false;
                                break;
                            }
                        }
                        ok
                    }
                    Value::Null => true,
                    _ => true,
                };
                if !unique {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        Builtin::BuildVertex => {
            let (id, props) = (arg0(), values.get(1).cloned().unwrap_or(Value::Null));
            let Value::Int(raw) = id else {
                return Ok(Value::Null);
            };
            let gid = GraphId::from_i64(raw);
            let label = ctx
                .store
                .with_catalog(|c| c.label_name_by_id(ctx.graph, gid.label_id()).map(String::from))
                .unwrap_or_default();
            let properties = match props {
                Value::Map(m) => m,
                _ => ValueMap::new(),
            };
            Ok(Value::Vertex(crate::core::vertex_edge_path::Vertex::new(
                gid, label, properties,
            )))
        }
        Builtin::BuildEdge => {
            let Value::Int(raw) = arg0() else {
                return Ok(Value::Null);
            };
            let (Some(Value::Int(start)), Some(Value::Int(end))) =
                (values.get(1), values.get(2))
            else {
                return Ok(Value::Null);
            };
            let gid = GraphId::from_i64(raw);
            let label = ctx
                .store
                .with_catalog(|c| c.label_name_by_id(ctx.graph, gid.label_id()).map(String::from))
                .unwrap_or_default();
            let properties = match values.get(3) {
                Some(Value::Map(m)) => m.clone(),
                _ => ValueMap::new(),
            };
            Ok(Value::Edge(crate::core::vertex_edge_path::Edge::new(
                gid,
                label,
                GraphId::from_i64(*start),
                GraphId::from_i64(*end),
                properties,
            )))
        }
        Builtin::BuildTraversal => {
            let mut entries = Vec::with_capacity(values.len());
            for value in values {
                let entry = match value {
                    Value::Vertex(v) => PathEntry::Vertex(v),
                    Value::Edge(e) => PathEntry::Edge(e),
                    Value::EdgeSet(es) => PathEntry::Edges(es),
                    Value::Null => return Ok(Value::Null),
                    other => {
                        return Err(ExecError::runtime(format!(
                            "cannot build a traversal from a {}",
                            other.type_name()
                        ))
                        .into());
                    }
                };
                entries.push(entry);
            }
            Ok(Value::Path(Path::new(entries)))
        }
    }
}

fn numeric_unary(
    v: Value,
    int_case: impl FnOnce(i64) -> Value,
    float_case: impl FnOnce(f64) -> Value,
) -> GraphResult<Value> {
    Ok(match v {
        Value::Int(i) => int_case(i),
        Value::Float(f) => float_case(f),
        _ => Value::Null,
    })
}

fn string_unary(v: Value, f: impl FnOnce(&str) -> String) -> GraphResult<Value> {
    Ok(match v {
        Value::String(s) => Value::String(f(&s)),
        _ => Value::Null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::Value;
    use crate::query::executor::Frame;
    use crate::storage::GraphStore;

    fn with_env<R>(f: impl FnOnce(&ExecCtx<'_>, &Env<'_>) -> R) -> R {
        let store = GraphStore::default();
        let graph = store.create_graph("g");
        let params = ValueMap::new();
        let ctx = ExecCtx { store: &store, graph, params: &params };
        let frame = Frame::default();
        let env = Env { frame: &frame, outer: None };
        f(&ctx, &env)
    }

    fn c(v: Value) -> Expr {
        Expr::Const(v)
    }

    #[test]
    fn three_valued_and_or() {
        with_env(|ctx, env| {
            let null = c(Value::Null);
            let t = c(Value::Bool(true));
            let f = c(Value::Bool(false));
            assert_eq!(
                eval(ctx, env, &f.clone().and(null.clone())).unwrap(),
                Value::Bool(false)
            );
            assert_eq!(eval(ctx, env, &t.clone().and(null.clone())).unwrap(), Value::Null);
            assert_eq!(
                eval(ctx, env, &t.clone().or(null.clone())).unwrap(),
                Value::Bool(true)
            );
            assert_eq!(eval(ctx, env, &f.or(null)).unwrap(), Value::Null);
        });
    }

    #[test]
    fn in_propagates_null() {
        with_env(|ctx, env| {
            let membership = Expr::op(
                BinOp::In,
                c(Value::Int(9)),
                c(Value::List(vec![Value::Int(1), Value::Null])),
            );
            assert_eq!(eval(ctx, env, &membership).unwrap(), Value::Null);
            let hit = Expr::op(
                BinOp::In,
                c(Value::Int(1)),
                c(Value::List(vec![Value::Int(1), Value::Null])),
            );
            assert_eq!(eval(ctx, env, &hit).unwrap(), Value::Bool(true));
        });
    }

    #[test]
    fn subscript_out_of_range_is_null() {
        with_env(|ctx, env| {
            let list = c(Value::List(vec![Value::Int(1), Value::Int(2)]));
            let get = |i: i64| Expr::Index {
                arg: Box::new(list.clone()),
                index: Box::new(c(Value::Int(i))),
            };
            assert_eq!(eval(ctx, env, &get(0)).unwrap(), Value::Int(1));
            assert_eq!(eval(ctx, env, &get(-1)).unwrap(), Value::Int(2));
            assert_eq!(eval(ctx, env, &get(5)).unwrap(), Value::Null);
        });
    }

    #[test]
    fn slice_is_half_open_and_clamped() {
        with_env(|ctx, env| {
            let list = c(Value::List(vec![
                Value::Int(1),
                Value::Int(2),
                Value::Int(3),
            ]));
            let slice = Expr::Slice {
                arg: Box::new(list.clone()),
                lo: Some(Box::new(c(Value::Int(1)))),
                hi: Some(Box::new(c(Value::Int(99)))),
            };
            assert_eq!(
                eval(ctx, env, &slice).unwrap(),
                Value::List(vec![Value::Int(2), Value::Int(3)])
            );
        });
    }

    #[test]
    fn regex_is_anchored() {
        with_env(|ctx, env| {
            let matches = |s: &str, p: &str| {
                eval(
                    ctx,
                    env,
                    &Expr::func(
                        Builtin::RegexMatch,
                        vec![c(Value::from(s)), c(Value::from(p))],
                    ),
                )
                .unwrap()
            };
            assert_eq!(matches("abc", "a.*"), Value::Bool(true));
            assert_eq!(matches("abc", "b"), Value::Bool(false));
        });
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        with_env(|ctx, env| {
            let div = Expr::op(BinOp::Div, c(Value::Int(1)), c(Value::Int(0)));
            assert!(eval(ctx, env, &div).is_err());
        });
    }

    #[test]
    fn edge_uniqueness_sees_through_edge_sets() {
        use crate::core::gid::{GraphId, LabelId};
        use crate::core::vertex_edge_path::{Edge, EdgeSet};
        use std::collections::BTreeMap;
        with_env(|ctx, env| {
            let eid = |n| GraphId::new(LabelId(2), n);
            let vid = |n| GraphId::new(LabelId(1), n);
            let edge = |n: i64| Edge::new(eid(n), "e", vid(1), vid(2), BTreeMap::new());
            let set = EdgeSet {
                edges: vec![edge(1), edge(2)],
                start_id: vid(1),
                end_id: vid(2),
            };
            let distinct = Expr::func(
                Builtin::EnforceEdgeUniqueness,
                vec![c(Value::Int(eid(3).as_i64())), c(Value::EdgeSet(set.clone()))],
            );
            assert_eq!(eval(ctx, env, &distinct).unwrap(), Value::Bool(true));
            let clashing = Expr::func(
                Builtin::EnforceEdgeUniqueness,
                vec![c(Value::Int(eid(2).as_i64())), c(Value::EdgeSet(set))],
            );
            assert_eq!(eval(ctx, env, &clashing).unwrap(), Value::Bool(false));
        });
    }

    #[test]
    fn case_with_elided_else_defaults_to_null() {
        with_env(|ctx, env| {
            let case = Expr::Case {
                operand: None,
                arms: vec![(c(Value::Bool(false)), c(Value::Int(1)))],
                default: None,
            };
            assert_eq!(eval(ctx, env, &case).unwrap(), Value::Null);
        });
    }
}
