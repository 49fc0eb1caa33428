//! Per-graph adjacency context
//!
//! A read-only snapshot of one graph's vertices and edges, organized for
//! traversal: each vertex keeps three adjacency lists (`out`, `inc`,
//! `self_loop`). Self-loop edges appear only in `self_loop`, so directional
//! scans never see them twice. The context is immutable once built; the
//! store rebuilds it after any write.

use crate::catalog::{GraphOid, DEFAULT_EDGE_LABEL, DEFAULT_VERTEX_LABEL};
use crate::core::gid::GraphId;
use crate::core::value::ValueMap;
use crate::core::vertex_edge_path::Edge;
use crate::storage::GraphStore;
use log::debug;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct VertexEntry {
    pub out: Vec<GraphId>,
    pub inc: Vec<GraphId>,
    pub self_loop: Vec<GraphId>,
    pub properties: ValueMap,
    pub label: String,
}

#[derive(Debug)]
pub struct EdgeEntry {
    pub start_id: GraphId,
    pub end_id: GraphId,
    pub label: String,
    pub properties: ValueMap,
}

impl EdgeEntry {
    pub fn to_edge(&self, id: GraphId) -> Edge {
        Edge::new(id, self.label.clone(), self.start_id, self.end_id, self.properties.clone())
    }
}

#[derive(Debug, Default)]
pub struct GraphContext {
    vertices: HashMap<GraphId, VertexEntry>,
    edges: HashMap<GraphId, EdgeEntry>,
}

impl GraphContext {
    pub fn build(store: &GraphStore, graph: GraphOid) -> Self {
        let mut ctx = GraphContext::default();
        for v in store.scan_vertices(graph, DEFAULT_VERTEX_LABEL) {
            ctx.vertices.insert(
                v.id,
                VertexEntry { properties: v.properties, label: v.label, ..Default::default() },
            );
        }
        let mut edge_count = 0usize;
        for e in store.scan_edges(graph, DEFAULT_EDGE_LABEL) {
            edge_count += 1;
            if e.is_self_loop() {
                if let Some(entry) = ctx.vertices.get_mut(&e.start_id) {
                    entry.self_loop.push(e.id);
                }
            } else {
                if let Some(entry) = ctx.vertices.get_mut(&e.start_id) {
                    entry.out.push(e.id);
                }
                if let Some(entry) = ctx.vertices.get_mut(&e.end_id) {
                    entry.inc.push(e.id);
                }
            }
            ctx.edges.insert(
                e.id,
                EdgeEntry {
                    start_id: e.start_id,
                    end_id: e.end_id,
                    label: e.label,
                    properties: e.properties,
                },
            );
        }
        debug!(
            "built adjacency context for graph {:?}: {} vertices, {} edges",
            graph,
            ctx.vertices.len(),
            edge_count
        );
        ctx
    }

    pub fn vertex(&self, id: GraphId) -> Option<&VertexEntry> {
        self.vertices.get(&id)
    }

    pub fn edge(&self, id: GraphId) -> Option<&EdgeEntry> {
        self.edges.get(&id)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }
}
