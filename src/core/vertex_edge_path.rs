//! Graph-shaped values: vertices, edges, traversals, and the edge sets
//! produced by variable-length expansion.

use crate::core::gid::GraphId;
use crate::core::value::{Value, ValueMap};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Vertex {
    pub id: GraphId,
    pub label: String,
    pub properties: ValueMap,
}

impl Vertex {
    pub fn new(id: GraphId, label: impl Into<String>, properties: ValueMap) -> Self {
        Self { id, label: label.into(), properties }
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}:{} {})", self.id, self.label, Value::Map(self.properties.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Edge {
    pub id: GraphId,
    pub label: String,
    pub start_id: GraphId,
    pub end_id: GraphId,
    pub properties: ValueMap,
}

impl Edge {
    pub fn new(
        id: GraphId,
        label: impl Into<String>,
        start_id: GraphId,
        end_id: GraphId,
        properties: ValueMap,
    ) -> Self {
        Self { id, label: label.into(), start_id, end_id, properties }
    }

    /// The endpoint that is not `from`. Used when walking an edge against
    /// its stored direction.
    pub fn other_end(&self, from: GraphId) -> GraphId {
        if self.start_id == from {
            self.end_id
        } else {
            self.start_id
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.start_id == self.end_id
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}:{} {}->{} {}]",
            self.id,
            self.label,
            self.start_id,
            self.end_id,
            Value::Map(self.properties.clone())
        )
    }
}

/// An ordered run of edges produced by one variable-length expansion,
/// together with the traversal endpoints. The endpoints are recorded
/// explicitly because with undirected expansion they cannot be recovered
/// from the first and last edge alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct EdgeSet {
    pub edges: Vec<Edge>,
    pub start_id: GraphId,
    pub end_id: GraphId,
}

impl EdgeSet {
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = GraphId> + '_ {
        self.edges.iter().map(|e| e.id)
    }
}

impl fmt::Display for EdgeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, e) in self.edges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", e)?;
        }
        write!(f, "]")
    }
}

/// One element of a traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub enum PathEntry {
    Vertex(Vertex),
    Edge(Edge),
    Edges(EdgeSet),
}

/// A traversal: vertices at even positions, relationships at odd positions.
/// A variable-length segment occupies a single odd position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Path {
    pub entries: Vec<PathEntry>,
}

impl Path {
    pub fn new(entries: Vec<PathEntry>) -> Self {
        debug_assert!(entries.len() % 2 == 1, "traversal must alternate vertex/edge");
        Self { entries }
    }

    /// All vertices, in traversal order.
    pub fn vertices(&self) -> Vec<Vertex> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                PathEntry::Vertex(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    /// All relationships, in traversal order, with variable-length
    /// segments flattened into their component edges.
    pub fn relationships(&self) -> Vec<Edge> {
        let mut out = Vec::new();
        for entry in &self.entries {
            match entry {
                PathEntry::Edge(e) => out.push(e.clone()),
                PathEntry::Edges(es) => out.extend(es.edges.iter().cloned()),
                PathEntry::Vertex(_) => {}
            }
        }
        out
    }

    /// Length in relationships.
    pub fn len(&self) -> usize {
        self.relationships().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            match entry {
                PathEntry::Vertex(v) => write!(f, "{}", v)?,
                PathEntry::Edge(e) => write!(f, "{}", e)?,
                PathEntry::Edges(es) => write!(f, "{}", es)?,
            }
        }
        Ok(())
    }
}
