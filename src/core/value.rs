//! The property value algebra
//!
//! `Value` is the variant-tagged value type flowing through expression
//! evaluation, property maps, and query results. The graph-shaped variants
//! (vertex, edge, path, edge set) wrap the types from
//! [`crate::core::vertex_edge_path`].
//!
//! Comparison follows three-valued logic at the operator layer; this module
//! only provides the raw orderings and the deep-containment routine used by
//! property predicates.

use crate::core::vertex_edge_path::{Edge, EdgeSet, Path, Vertex};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Property maps keep their keys sorted so printing and equality are stable.
pub type ValueMap = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(ValueMap),
    Vertex(Vertex),
    Edge(Edge),
    Path(Path),
    EdgeSet(EdgeSet),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The name used in error messages and `toString`-style output.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Vertex(_) => "vertex",
            Value::Edge(_) => "edge",
            Value::Path(_) => "traversal",
            Value::EdgeSet(_) => "variable_edge",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view used by arithmetic and cross-type comparison.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Deep containment: `self ⊇ template`.
    ///
    /// Maps contain a template map when every template key is present with
    /// a matching value: member values of different kinds never match, so
    /// scalars compare by equality and only container-against-container
    /// recurses. Lists contain a template list when every template element
    /// is present: scalar elements by exact element search, container
    /// elements by recursive containment. Scalars contain by equality.
    /// One routine over the variant algebra covers arbitrary nesting.
    pub fn deep_contains(&self, template: &Value) -> bool {
        match (self, template) {
            (Value::Map(have), Value::Map(want)) => want
                .iter()
                .all(|(k, v)| have.get(k).map_or(false, |hv| hv.member_contains(v))),
            (Value::List(have), Value::List(want)) => {
                want.iter().all(|w| Value::list_has(have, w))
            }
            (Value::List(have), scalar) => Value::list_has(have, scalar),
            (a, b) => a == b,
        }
    }

    /// Containment for one object member or list element: kinds must
    /// agree, scalars match by equality, containers recurse.
    fn member_contains(&self, template: &Value) -> bool {
        match (self, template) {
            (Value::Map(_), Value::Map(_)) | (Value::List(_), Value::List(_)) => {
                self.deep_contains(template)
            }
            (a, b) => a == b,
        }
    }

    fn list_has(have: &[Value], want: &Value) -> bool {
        match want {
            // A scalar element must be present as-is; no descent into
            // nested containers.
            Value::Map(_) | Value::List(_) => have.iter().any(|h| h.member_contains(want)),
            scalar => have.contains(scalar),
        }
    }

    /// Total order across all variants, used by ORDER BY and DISTINCT.
    /// Values of different shapes order by a fixed type rank; NULL sorts
    /// after everything.
    pub fn cmp_ordered(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Bool(_) => 0,
                Value::Int(_) | Value::Float(_) => 1,
                Value::String(_) => 2,
                Value::List(_) => 3,
                Value::Map(_) => 4,
                Value::Vertex(_) => 5,
                Value::Edge(_) => 6,
                Value::Path(_) => 7,
                Value::EdgeSet(_) => 8,
                Value::Null => 9,
            }
        }
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (a, b) if rank(a) == 1 && rank(b) == 1 => {
                let (x, y) = (a.as_float().unwrap(), b.as_float().unwrap());
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.cmp_ordered(y) {
                        Ordering::Equal => continue,
                        ord => return ord,
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Map(a), Value::Map(b)) => {
                let mut ai = a.iter();
                let mut bi = b.iter();
                loop {
                    match (ai.next(), bi.next()) {
                        (None, None) => return Ordering::Equal,
                        (None, Some(_)) => return Ordering::Less,
                        (Some(_), None) => return Ordering::Greater,
                        (Some((ka, va)), Some((kb, vb))) => match ka.cmp(kb) {
                            Ordering::Equal => match va.cmp_ordered(vb) {
                                Ordering::Equal => continue,
                                ord => return ord,
                            },
                            ord => return ord,
                        },
                    }
                }
            }
            (Value::Vertex(a), Value::Vertex(b)) => a.id.cmp(&b.id),
            (Value::Edge(a), Value::Edge(b)) => a.id.cmp(&b.id),
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }

    /// Scalar comparison for the comparison operators. `None` means the
    /// operands are incomparable (or either is NULL) and the operator
    /// evaluates to NULL.
    pub fn try_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => {
                    if a == b {
                        Some(Ordering::Equal)
                    } else {
                        None
                    }
                }
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Vertex(v) => write!(f, "{}", v),
            Value::Edge(e) => write!(f, "{}", e),
            Value::Path(p) => write!(f, "{}", p),
            Value::EdgeSet(es) => write!(f, "{}", es),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, Value)]) -> Value {
        Value::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn scalar_containment_is_equality() {
        assert!(Value::Int(1).deep_contains(&Value::Int(1)));
        assert!(!Value::Int(1).deep_contains(&Value::Int(2)));
    }

    #[test]
    fn map_containment_checks_every_template_pair() {
        let have = map(&[("a", Value::Int(1)), ("b", Value::from("x"))]);
        assert!(have.deep_contains(&map(&[("a", Value::Int(1))])));
        assert!(have.deep_contains(&map(&[])));
        assert!(!have.deep_contains(&map(&[("a", Value::Int(2))])));
        assert!(!have.deep_contains(&map(&[("c", Value::Int(1))])));
    }

    #[test]
    fn nested_containment_recurses() {
        let have = map(&[(
            "tags",
            Value::List(vec![Value::from("x"), Value::from("y")]),
        )]);
        let want = map(&[("tags", Value::List(vec![Value::from("y")]))]);
        assert!(have.deep_contains(&want));
    }

    #[test]
    fn member_values_of_different_kinds_never_match() {
        // A list-valued member does not contain a scalar template value;
        // the kinds must agree.
        let have = map(&[(
            "tags",
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        )]);
        assert!(!have.deep_contains(&map(&[("tags", Value::Int(1))])));
        assert!(have.deep_contains(&map(&[("tags", Value::List(vec![Value::Int(1)]))])));
    }

    #[test]
    fn list_matches_scalar_elements_exactly() {
        let have = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert!(have.deep_contains(&Value::Int(1)));
        assert!(!have.deep_contains(&Value::Int(3)));
        // No descent into nested containers for a scalar template.
        let nested = Value::List(vec![Value::List(vec![Value::Int(1)]), Value::Int(2)]);
        assert!(!nested.deep_contains(&Value::Int(1)));
        assert!(nested.deep_contains(&Value::List(vec![Value::Int(2)])));
        assert!(nested.deep_contains(&Value::List(vec![Value::List(vec![Value::Int(1)])])));
    }

    #[test]
    fn cross_type_numeric_comparison() {
        assert_eq!(
            Value::Int(2).try_cmp(&Value::Float(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Null.try_cmp(&Value::Int(1)), None);
    }

    #[test]
    fn null_sorts_last() {
        let mut vals = vec![Value::Null, Value::Int(3), Value::Int(1)];
        vals.sort_by(|a, b| a.cmp_ordered(b));
        assert_eq!(vals, vec![Value::Int(1), Value::Int(3), Value::Null]);
    }
}
