//! In-memory graph store
//!
//! Holds the catalog plus the per-label fact tables the transformer's range
//! table entries scan: vertex tables `(id, properties)` and edge tables
//! `(id, start_id, end_id, properties)`. The store is shared behind a
//! `parking_lot::RwLock`; the adjacency contexts consumed by the
//! variable-length engine live in a [`graph_context`] registry and are
//! invalidated whenever a writer clause mutates the graph.

pub mod graph_context;

use crate::catalog::{
    Catalog, GraphOid, LabelKind, LabelRecord, RelOid, DEFAULT_EDGE_LABEL, DEFAULT_VERTEX_LABEL,
};
use crate::core::error::{ExecError, GraphResult};
use crate::core::gid::GraphId;
use crate::core::value::ValueMap;
use crate::core::vertex_edge_path::{Edge, Vertex};
use dashmap::DashMap;
use graph_context::GraphContext;
use log::debug;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Tuning knobs for a store instance.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Capacity of the parsed-statement cache in the entry point.
    pub statement_cache_capacity: usize,
    /// Hard ceiling on variable-length expansion depth, applied when a
    /// pattern requests an unbounded upper range.
    pub vle_max_depth: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { statement_cache_capacity: 128, vle_max_depth: 1 << 20 }
    }
}

#[derive(Debug, Clone)]
pub struct VertexRow {
    pub id: GraphId,
    pub properties: ValueMap,
}

#[derive(Debug, Clone)]
pub struct EdgeRow {
    pub id: GraphId,
    pub start_id: GraphId,
    pub end_id: GraphId,
    pub properties: ValueMap,
}

#[derive(Debug)]
enum LabelTable {
    Vertices(Vec<VertexRow>),
    Edges(Vec<EdgeRow>),
}

#[derive(Default)]
struct StoreInner {
    catalog: Catalog,
    tables: HashMap<RelOid, LabelTable>,
    next_entry: HashMap<(GraphOid, crate::core::gid::LabelId), i64>,
}

/// The shared store. Reads during a query take the read lock; writer
/// directives take the write lock and drop the graph's adjacency context.
pub struct GraphStore {
    inner: RwLock<StoreInner>,
    contexts: DashMap<GraphOid, Arc<GraphContext>>,
    config: StoreConfig,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl GraphStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            inner: RwLock::new(StoreInner { catalog: Catalog::new(), ..Default::default() }),
            contexts: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn create_graph(&self, name: &str) -> GraphOid {
        let mut inner = self.inner.write();
        let oid = inner.catalog.create_graph(name);
        for label in [DEFAULT_VERTEX_LABEL, DEFAULT_EDGE_LABEL] {
            let rec = inner.catalog.label(oid, label).expect("default label").clone();
            inner.ensure_table(&rec);
        }
        oid
    }

    pub fn graph_oid(&self, name: &str) -> GraphResult<GraphOid> {
        self.inner
            .read()
            .catalog
            .graph(name)
            .map(|g| g.oid)
            .ok_or_else(|| ExecError::UnknownGraph(name.to_string()).into())
    }

    /// Run `f` with read access to the catalog.
    pub fn with_catalog<R>(&self, f: impl FnOnce(&Catalog) -> R) -> R {
        f(&self.inner.read().catalog)
    }

    /// Get or create a label, creating its fact table alongside.
    pub fn label_or_create(&self, graph: GraphOid, name: &str, kind: LabelKind) -> LabelRecord {
        let mut inner = self.inner.write();
        let rec = inner.catalog.label_or_create(graph, name, kind);
        inner.ensure_table(&rec);
        rec
    }

    pub fn create_vertex(&self, graph: GraphOid, label: &str, properties: ValueMap) -> Vertex {
        let mut inner = self.inner.write();
        let rec = inner.catalog.label_or_create(graph, label, LabelKind::Vertex);
        inner.ensure_table(&rec);
        let id = inner.alloc_id(graph, rec.id);
        match inner.tables.get_mut(&rec.relation) {
            Some(LabelTable::Vertices(rows)) => {
                rows.push(VertexRow { id, properties: properties.clone() })
            }
            _ => unreachable!("vertex label backed by edge table"),
        }
        drop(inner);
        self.invalidate(graph);
        Vertex::new(id, label, properties)
    }

    pub fn create_edge(
        &self,
        graph: GraphOid,
        label: &str,
        start_id: GraphId,
        end_id: GraphId,
        properties: ValueMap,
    ) -> Edge {
        let mut inner = self.inner.write();
        let rec = inner.catalog.label_or_create(graph, label, LabelKind::Edge);
        inner.ensure_table(&rec);
        let id = inner.alloc_id(graph, rec.id);
        match inner.tables.get_mut(&rec.relation) {
            Some(LabelTable::Edges(rows)) => rows.push(EdgeRow {
                id,
                start_id,
                end_id,
                properties: properties.clone(),
            }),
            _ => unreachable!("edge label backed by vertex table"),
        }
        drop(inner);
        self.invalidate(graph);
        Edge::new(id, label, start_id, end_id, properties)
    }

    /// Scan a vertex label. The default label covers every vertex label in
    /// the graph, the way a parent table scan covers its children.
    pub fn scan_vertices(&self, graph: GraphOid, label: &str) -> Vec<Vertex> {
        let inner = self.inner.read();
        let records = if label == DEFAULT_VERTEX_LABEL {
            inner.catalog.labels_of_kind(graph, LabelKind::Vertex)
        } else {
            inner.catalog.label(graph, label).cloned().into_iter().collect()
        };
        let mut out = Vec::new();
        for rec in records {
            if let Some(LabelTable::Vertices(rows)) = inner.tables.get(&rec.relation) {
                out.extend(
                    rows.iter()
                        .map(|r| Vertex::new(r.id, rec.name.clone(), r.properties.clone())),
                );
            }
        }
        out
    }

    /// Scan an edge label, with the same default-label-covers-all rule.
    pub fn scan_edges(&self, graph: GraphOid, label: &str) -> Vec<Edge> {
        let inner = self.inner.read();
        let records = if label == DEFAULT_EDGE_LABEL {
            inner.catalog.labels_of_kind(graph, LabelKind::Edge)
        } else {
            inner.catalog.label(graph, label).cloned().into_iter().collect()
        };
        let mut out = Vec::new();
        for rec in records {
            if let Some(LabelTable::Edges(rows)) = inner.tables.get(&rec.relation) {
                out.extend(rows.iter().map(|r| {
                    Edge::new(r.id, rec.name.clone(), r.start_id, r.end_id, r.properties.clone())
                }));
            }
        }
        out
    }

    pub fn vertex_by_id(&self, graph: GraphOid, id: GraphId) -> Option<Vertex> {
        self.scan_vertices_by_label_id(graph, id)
    }

    fn scan_vertices_by_label_id(&self, graph: GraphOid, id: GraphId) -> Option<Vertex> {
        let inner = self.inner.read();
        let name = inner.catalog.label_name_by_id(graph, id.label_id())?.to_string();
        let rec = inner.catalog.label(graph, &name)?;
        if let Some(LabelTable::Vertices(rows)) = inner.tables.get(&rec.relation) {
            rows.iter()
                .find(|r| r.id == id)
                .map(|r| Vertex::new(r.id, name.clone(), r.properties.clone()))
        } else {
            None
        }
    }

    pub fn edge_by_id(&self, graph: GraphOid, id: GraphId) -> Option<Edge> {
        let inner = self.inner.read();
        let name = inner.catalog.label_name_by_id(graph, id.label_id())?.to_string();
        let rec = inner.catalog.label(graph, &name)?;
        if let Some(LabelTable::Edges(rows)) = inner.tables.get(&rec.relation) {
            rows.iter().find(|r| r.id == id).map(|r| {
                Edge::new(r.id, name.clone(), r.start_id, r.end_id, r.properties.clone())
            })
        } else {
            None
        }
    }

    /// All edges that touch a vertex, in either direction.
    pub fn edges_touching(&self, graph: GraphOid, vertex_id: GraphId) -> Vec<Edge> {
        self.scan_edges(graph, DEFAULT_EDGE_LABEL)
            .into_iter()
            .filter(|e| e.start_id == vertex_id || e.end_id == vertex_id)
            .collect()
    }

    /// Replace an entity's property map in place.
    pub fn update_properties(
        &self,
        graph: GraphOid,
        id: GraphId,
        properties: ValueMap,
    ) -> GraphResult<()> {
        let mut inner = self.inner.write();
        let name = inner
            .catalog
            .label_name_by_id(graph, id.label_id())
            .ok_or_else(|| ExecError::runtime(format!("unknown label for id {}", id)))?
            .to_string();
        let rel = inner.catalog.label(graph, &name).map(|l| l.relation);
        let Some(rel) = rel else {
            return Err(ExecError::runtime(format!("no table for label {}", name)).into());
        };
        match inner.tables.get_mut(&rel) {
            Some(LabelTable::Vertices(rows)) => {
                if let Some(row) = rows.iter_mut().find(|r| r.id == id) {
                    row.properties = properties;
                }
            }
            Some(LabelTable::Edges(rows)) => {
                if let Some(row) = rows.iter_mut().find(|r| r.id == id) {
                    row.properties = properties;
                }
            }
            None => {}
        }
        drop(inner);
        self.invalidate(graph);
        Ok(())
    }

    pub fn remove_vertex(&self, graph: GraphOid, id: GraphId) {
        let mut inner = self.inner.write();
        for table in inner.tables.values_mut() {
            if let LabelTable::Vertices(rows) = table {
                rows.retain(|r| r.id != id);
            }
        }
        drop(inner);
        self.invalidate(graph);
    }

    pub fn remove_edge(&self, graph: GraphOid, id: GraphId) {
        let mut inner = self.inner.write();
        for table in inner.tables.values_mut() {
            if let LabelTable::Edges(rows) = table {
                rows.retain(|r| r.id != id);
            }
        }
        drop(inner);
        self.invalidate(graph);
    }

    /// The adjacency context for a graph, built on first use and reused
    /// until the next write invalidates it.
    pub fn graph_context(&self, graph: GraphOid) -> Arc<GraphContext> {
        if let Some(ctx) = self.contexts.get(&graph) {
            return ctx.clone();
        }
        let ctx = Arc::new(GraphContext::build(self, graph));
        self.contexts.insert(graph, ctx.clone());
        ctx
    }

    fn invalidate(&self, graph: GraphOid) {
        if self.contexts.remove(&graph).is_some() {
            debug!("invalidated adjacency context for graph {:?}", graph);
        }
    }

    pub fn statement_cache_capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.config.statement_cache_capacity.max(1)).unwrap()
    }
}

impl StoreInner {
    fn ensure_table(&mut self, rec: &LabelRecord) {
        self.tables.entry(rec.relation).or_insert_with(|| match rec.kind {
            LabelKind::Vertex => LabelTable::Vertices(Vec::new()),
            LabelKind::Edge => LabelTable::Edges(Vec::new()),
        });
    }

    fn alloc_id(&mut self, graph: GraphOid, label: crate::core::gid::LabelId) -> GraphId {
        let next = self.next_entry.entry((graph, label)).or_insert(1);
        let id = GraphId::new(label, *next);
        *next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn default_label_scan_covers_all_labels() {
        let store = GraphStore::default();
        let g = store.create_graph("g");
        store.create_vertex(g, "person", BTreeMap::new());
        store.create_vertex(g, DEFAULT_VERTEX_LABEL, BTreeMap::new());
        assert_eq!(store.scan_vertices(g, DEFAULT_VERTEX_LABEL).len(), 2);
        assert_eq!(store.scan_vertices(g, "person").len(), 1);
    }

    #[test]
    fn created_entities_resolve_by_id() {
        let store = GraphStore::default();
        let g = store.create_graph("g");
        let a = store.create_vertex(g, "person", BTreeMap::new());
        let b = store.create_vertex(g, "person", BTreeMap::new());
        let e = store.create_edge(g, "knows", a.id, b.id, BTreeMap::new());
        assert_eq!(store.vertex_by_id(g, a.id).unwrap().id, a.id);
        assert_eq!(store.edge_by_id(g, e.id).unwrap().start_id, a.id);
        assert_eq!(store.edges_touching(g, b.id).len(), 1);
    }

    #[test]
    fn writes_invalidate_adjacency_context() {
        let store = GraphStore::default();
        let g = store.create_graph("g");
        let a = store.create_vertex(g, "x", BTreeMap::new());
        let ctx1 = store.graph_context(g);
        store.create_vertex(g, "x", BTreeMap::new());
        let ctx2 = store.graph_context(g);
        assert!(!Arc::ptr_eq(&ctx1, &ctx2));
        assert!(ctx2.vertex(a.id).is_some());
    }
}
