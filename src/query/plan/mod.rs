//! Relational query tree
//!
//! The transformer's output: a `Query` holds a range table, a join tree
//! whose quals came from pattern lowering, a target list, and the
//! projection modifiers. `OPTIONAL MATCH` and `MERGE` appear as lateral
//! left joins; `UNION` appears as a set-operation tree whose leaves are
//! range-table subqueries. The whole tree is serializable so writer
//! directives can embed expression fragments.

pub mod expr;

use crate::catalog::GraphOid;
use bincode::{Decode, Encode};
use expr::Expr;
use serde::{Deserialize, Serialize};

/// Direction of a relationship pattern, as seen by the VLE engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum EdgeDirection {
    Right,
    Left,
    Undirected,
}

/// Arguments of the lateral set-returning VLE call:
/// `vle(start_id, end_id, edge_constraint, lo, hi, direction)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct VleArgs {
    pub graph: u32,
    /// Expression producing the start vertex id.
    pub start: Expr,
    /// Expression producing the end vertex id; `None` leaves the far end
    /// unconstrained.
    pub end: Option<Expr>,
    /// Edge label constraint by name.
    pub label: Option<String>,
    /// Property containment template for every traversed edge.
    pub props: Option<Expr>,
    pub lo: i64,
    /// `None` means unbounded.
    pub hi: Option<i64>,
    pub direction: EdgeDirection,
}

/// One relational source. Output columns:
/// vertex scans expose `id, properties`; edge scans expose
/// `id, start_id, end_id, properties`; subqueries expose their target
/// names; the VLE function exposes a single `edges` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub enum RangeTblEntry {
    LabelScan {
        graph: u32,
        label: String,
        is_edge: bool,
        alias: String,
    },
    Subquery {
        query: Box<Query>,
        alias: String,
        lateral: bool,
    },
    VleFunction {
        args: VleArgs,
        alias: String,
    },
}

impl RangeTblEntry {
    pub fn alias(&self) -> &str {
        match self {
            RangeTblEntry::LabelScan { alias, .. }
            | RangeTblEntry::Subquery { alias, .. }
            | RangeTblEntry::VleFunction { alias, .. } => alias,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum JoinKind {
    Inner,
    /// Lateral left join: the right side sees the left side's columns and
    /// contributes NULLs when it produces no row.
    LeftLateral,
}

/// Join-tree node over range-table indexes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub enum FromItem {
    Rte(usize),
    Join {
        kind: JoinKind,
        left: Box<FromItem>,
        right: Box<FromItem>,
        qual: Option<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct TargetEntry {
    pub expr: Expr,
    pub name: String,
}

impl TargetEntry {
    pub fn new(expr: Expr, name: impl Into<String>) -> Self {
        Self { expr, name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct SortKey {
    pub expr: Expr,
    pub ascending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum SetOpKind {
    Union,
}

/// Set-operation tree; leaves index into the owning query's range table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub enum SetExpr {
    Rte(usize),
    Op {
        kind: SetOpKind,
        all: bool,
        left: Box<SetExpr>,
        right: Box<SetExpr>,
    },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Encode, Decode)]
pub struct Query {
    pub range_table: Vec<RangeTblEntry>,
    pub from: Vec<FromItem>,
    /// WHERE: join predicates, containment predicates, edge uniqueness,
    /// and the user's filter, conjoined.
    pub quals: Option<Expr>,
    pub targets: Vec<TargetEntry>,
    pub distinct: bool,
    pub sort: Vec<SortKey>,
    pub skip: Option<Expr>,
    pub limit: Option<Expr>,
    /// Present when this query is the root of a UNION tree.
    pub set_op: Option<SetExpr>,
}

impl Query {
    /// Output column names, in target order.
    pub fn column_names(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.name.clone()).collect()
    }

    pub fn add_rte(&mut self, rte: RangeTblEntry) -> usize {
        self.range_table.push(rte);
        self.range_table.len() - 1
    }

    /// AND a predicate onto the WHERE clause, flattening.
    pub fn add_qual(&mut self, qual: Expr) {
        self.quals = Some(match self.quals.take() {
            None => qual,
            Some(existing) => existing.and(qual),
        });
    }
}

/// Convenience for graph oids inside the serializable plan.
pub fn graph_key(graph: GraphOid) -> u32 {
    graph.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::Value;

    #[test]
    fn add_qual_conjoins_flat() {
        let mut q = Query::default();
        q.add_qual(Expr::Const(Value::Bool(true)));
        q.add_qual(Expr::Const(Value::Bool(false)));
        q.add_qual(Expr::Const(Value::Null));
        match q.quals {
            Some(Expr::And(args)) => assert_eq!(args.len(), 3),
            other => panic!("expected flat And, got {:?}", other),
        }
    }

    #[test]
    fn plan_round_trips_through_bincode() {
        let mut q = Query::default();
        q.add_rte(RangeTblEntry::LabelScan {
            graph: 1,
            label: "person".into(),
            is_edge: false,
            alias: "a".into(),
        });
        q.targets.push(TargetEntry::new(
            Expr::column("a", "id"),
            "a",
        ));
        let bytes = bincode::encode_to_vec(&q, bincode::config::standard()).unwrap();
        let (decoded, _): (Query, usize) =
            bincode::decode_from_slice(&bytes, bincode::config::standard()).unwrap();
        assert_eq!(decoded, q);
    }
}
