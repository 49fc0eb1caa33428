//! Graph and label catalog
//!
//! Mirrors the three catalog relations the transformer reads: the graph
//! table `(oid, name, namespace)`, the label table
//! `(graph_oid, name, id, kind, relation_oid)`, and the per-label fact
//! tables owned by [`crate::storage`]. Labels are created on demand by the
//! writer clauses; every graph starts with the two default labels.

use crate::core::gid::LabelId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Name of the default vertex label. Vertices created without a label land
/// in its fact table, and a scan of this label covers every vertex label.
pub const DEFAULT_VERTEX_LABEL: &str = "_vertex";

/// Name of the default edge label, with the same scan-all behavior.
pub const DEFAULT_EDGE_LABEL: &str = "_edge";

pub const DEFAULT_VERTEX_LABEL_ID: LabelId = LabelId(1);
pub const DEFAULT_EDGE_LABEL_ID: LabelId = LabelId(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphOid(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelOid(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelKind {
    Vertex,
    Edge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRecord {
    pub oid: GraphOid,
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelRecord {
    pub graph: GraphOid,
    pub name: String,
    pub id: LabelId,
    pub kind: LabelKind,
    pub relation: RelOid,
}

impl LabelRecord {
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_VERTEX_LABEL || self.name == DEFAULT_EDGE_LABEL
    }
}

/// In-memory catalog. Lookup is by name within a graph; label ids are
/// assigned monotonically per graph so they can be packed into graph ids.
#[derive(Debug, Default)]
pub struct Catalog {
    graphs: HashMap<String, GraphRecord>,
    labels: HashMap<(GraphOid, String), LabelRecord>,
    labels_by_id: HashMap<(GraphOid, LabelId), String>,
    next_graph_oid: u32,
    next_rel_oid: u32,
    next_label_id: HashMap<GraphOid, i32>,
}

impl Catalog {
    pub fn new() -> Self {
        Self { next_graph_oid: 1, next_rel_oid: 1, ..Default::default() }
    }

    pub fn create_graph(&mut self, name: &str) -> GraphOid {
        if let Some(g) = self.graphs.get(name) {
            return g.oid;
        }
        let oid = GraphOid(self.next_graph_oid);
        self.next_graph_oid += 1;
        self.graphs.insert(
            name.to_string(),
            GraphRecord {
                oid,
                name: name.to_string(),
                namespace: format!("graph_{}", name),
            },
        );
        self.next_label_id.insert(oid, 3);
        self.insert_label(oid, DEFAULT_VERTEX_LABEL, DEFAULT_VERTEX_LABEL_ID, LabelKind::Vertex);
        self.insert_label(oid, DEFAULT_EDGE_LABEL, DEFAULT_EDGE_LABEL_ID, LabelKind::Edge);
        oid
    }

    fn insert_label(&mut self, graph: GraphOid, name: &str, id: LabelId, kind: LabelKind) -> LabelRecord {
        let rec = LabelRecord {
            graph,
            name: name.to_string(),
            id,
            kind,
            relation: RelOid(self.alloc_rel_oid()),
        };
        self.labels.insert((graph, name.to_string()), rec.clone());
        self.labels_by_id.insert((graph, id), name.to_string());
        rec
    }

    fn alloc_rel_oid(&mut self) -> u32 {
        let oid = self.next_rel_oid;
        self.next_rel_oid += 1;
        oid
    }

    pub fn graph(&self, name: &str) -> Option<&GraphRecord> {
        self.graphs.get(name)
    }

    pub fn label(&self, graph: GraphOid, name: &str) -> Option<&LabelRecord> {
        self.labels.get(&(graph, name.to_string()))
    }

    pub fn label_name_by_id(&self, graph: GraphOid, id: LabelId) -> Option<&str> {
        self.labels_by_id.get(&(graph, id)).map(|s| s.as_str())
    }

    /// Get or create a label. Writer clauses use this to create labels on
    /// demand; the kind of an existing label must match.
    pub fn label_or_create(&mut self, graph: GraphOid, name: &str, kind: LabelKind) -> LabelRecord {
        if let Some(rec) = self.labels.get(&(graph, name.to_string())) {
            return rec.clone();
        }
        let next = self.next_label_id.entry(graph).or_insert(3);
        let id = LabelId(*next);
        *next += 1;
        self.insert_label(graph, name, id, kind)
    }

    /// All labels of one kind in a graph, default label included.
    pub fn labels_of_kind(&self, graph: GraphOid, kind: LabelKind) -> Vec<LabelRecord> {
        let mut out: Vec<LabelRecord> = self
            .labels
            .values()
            .filter(|l| l.graph == graph && l.kind == kind)
            .cloned()
            .collect();
        out.sort_by_key(|l| l.id);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_graph_carries_default_labels() {
        let mut cat = Catalog::new();
        let g = cat.create_graph("g");
        assert_eq!(cat.label(g, DEFAULT_VERTEX_LABEL).unwrap().id, DEFAULT_VERTEX_LABEL_ID);
        assert_eq!(cat.label(g, DEFAULT_EDGE_LABEL).unwrap().id, DEFAULT_EDGE_LABEL_ID);
    }

    #[test]
    fn labels_created_on_demand_get_fresh_ids() {
        let mut cat = Catalog::new();
        let g = cat.create_graph("g");
        let a = cat.label_or_create(g, "person", LabelKind::Vertex);
        let b = cat.label_or_create(g, "knows", LabelKind::Edge);
        assert_ne!(a.id, b.id);
        let again = cat.label_or_create(g, "person", LabelKind::Vertex);
        assert_eq!(a.id, again.id);
    }

    #[test]
    fn create_graph_is_idempotent() {
        let mut cat = Catalog::new();
        let a = cat.create_graph("g");
        let b = cat.create_graph("g");
        assert_eq!(a, b);
    }
}
