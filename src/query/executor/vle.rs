//! Variable-length edge traversal
//!
//! A restartable depth-first search over the adjacency context. Each call
//! to `next()` yields one path (as an edge set with its endpoints) whose
//! length lies within the requested bounds, with no edge repeated. State
//! is three stacks plus the visited-edge map; nothing is shared between
//! call sites, and dropping the search releases everything.
//!
//! The backtracking discipline: the top of `edge_stack` is only popped
//! when it is revisited. If the revisited edge is also the top of
//! `path_stack` we are unwinding and it leaves the path; otherwise it was
//! an already-used edge reached again (a loop) and it is discarded. The
//! vertex stack parallels the edge stack only for undirected traversal,
//! where an edge alone cannot tell which endpoint we came from.

use crate::core::error::{ExecError, GraphResult};
use crate::core::gid::{GraphId, LabelId};
use crate::core::value::Value;
use crate::core::vertex_edge_path::EdgeSet;
use crate::query::plan::EdgeDirection;
use crate::storage::graph_context::{EdgeEntry, GraphContext};
use log::trace;
use std::collections::HashMap;
use std::sync::Arc;

pub struct VlePathSearch {
    ctx: Arc<GraphContext>,
    vsid: GraphId,
    veid: Option<GraphId>,
    lo: i64,
    hi: i64,
    hi_infinite: bool,
    direction: EdgeDirection,
    label_id: Option<LabelId>,
    /// Containment template applied to every traversed edge.
    props: Option<Value>,
    /// `true` when the label constraint names a label that does not
    /// exist; nothing can match.
    impossible: bool,
    vertex_stack: Vec<GraphId>,
    edge_stack: Vec<GraphId>,
    path_stack: Vec<GraphId>,
    visited_edges: HashMap<GraphId, bool>,
    started: bool,
    cancelled: bool,
}

impl VlePathSearch {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ctx: Arc<GraphContext>,
        vsid: GraphId,
        veid: Option<GraphId>,
        lo: i64,
        hi: Option<i64>,
        direction: EdgeDirection,
        label_id: Option<LabelId>,
        label_missing: bool,
        props: Option<Value>,
        max_depth: i64,
    ) -> GraphResult<Self> {
        if let Some(hi) = hi {
            if lo > hi {
                return Err(ExecError::InvalidRange { lo, hi }.into());
            }
        }
        let hi_infinite = hi.is_none();
        Ok(Self {
            ctx,
            vsid,
            veid,
            lo,
            // The no-repeat-edge rule already bounds the search; the hard
            // depth limit only caps pathological graphs.
            hi: hi.unwrap_or(max_depth),
            hi_infinite,
            direction,
            label_id,
            props,
            impossible: label_missing,
            vertex_stack: Vec::new(),
            edge_stack: Vec::new(),
            path_stack: Vec::new(),
            visited_edges: HashMap::new(),
            started: false,
            cancelled: false,
        })
    }

    /// Drop all traversal state; the next call reports exhaustion.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.vertex_stack.clear();
        self.edge_stack.clear();
        self.path_stack.clear();
        self.visited_edges.clear();
    }

    /// Yield the next path, or `None` when the search is exhausted.
    pub fn next_path(&mut self) -> Option<EdgeSet> {
        if self.cancelled || self.impossible {
            return None;
        }
        if !self.started {
            self.started = true;
            if !self.endpoints_exist() {
                return None;
            }
            self.add_edges(self.vsid);
        }
        self.dfs_find_a_path()
    }

    fn endpoints_exist(&self) -> bool {
        if self.ctx.vertex(self.vsid).is_none() {
            return false;
        }
        match self.veid {
            Some(veid) => self.ctx.vertex(veid).is_some(),
            None => true,
        }
    }

    fn matches_end(&self, vertex: GraphId) -> bool {
        self.veid.map_or(true, |veid| veid == vertex)
    }

    fn dfs_find_a_path(&mut self) -> Option<EdgeSet> {
        while let Some(&edge_id) = self.edge_stack.last() {
            let visited = *self.visited_edges.get(&edge_id).unwrap_or(&false);
            if visited {
                // Backing up if this edge ends the current path; a loop
                // otherwise. Either way it leaves the edge stack, and the
                // undirected vertex stack stays in step.
                if self.path_stack.last() == Some(&edge_id) {
                    self.path_stack.pop();
                    self.visited_edges.insert(edge_id, false);
                }
                self.edge_stack.pop();
                if self.direction == EdgeDirection::Undirected {
                    self.vertex_stack.pop();
                }
                continue;
            }

            self.visited_edges.insert(edge_id, true);
            self.path_stack.push(edge_id);

            let entry = self.ctx.edge(edge_id).expect("edge stack holds known edges");
            let next_vertex = self.next_vertex(entry);

            let len = self.path_stack.len() as i64;
            let found = self.matches_end(next_vertex)
                && len >= self.lo
                && (self.hi_infinite || len <= self.hi);

            // Reached the end vertex past the upper bound: back up without
            // expanding.
            if self.matches_end(next_vertex) && !self.hi_infinite && len > self.hi {
                continue;
            }

            if self.hi_infinite || len < self.hi {
                self.add_edges(next_vertex);
            }

            if found {
                trace!("vle path found: {} edges ending at {}", len, next_vertex);
                return Some(self.build_edge_set(next_vertex));
            }
        }
        None
    }

    /// The vertex this edge leads to, given the traversal direction. For
    /// undirected traversal the parent vertex on the stack decides which
    /// endpoint is ahead.
    fn next_vertex(&self, entry: &EdgeEntry) -> GraphId {
        match self.direction {
            EdgeDirection::Right => entry.end_id,
            EdgeDirection::Left => entry.start_id,
            EdgeDirection::Undirected => {
                let parent = *self
                    .vertex_stack
                    .last()
                    .expect("undirected traversal tracks parent vertices");
                if entry.start_id == parent {
                    entry.end_id
                } else {
                    entry.start_id
                }
            }
        }
    }

    fn check_edge_constraints(&self, entry: &EdgeEntry, edge_id: GraphId) -> bool {
        if let Some(label_id) = self.label_id {
            if edge_id.label_id() != label_id {
                return false;
            }
        }
        if let Some(template) = &self.props {
            let have = Value::Map(entry.properties.clone());
            if !have.deep_contains(template) {
                return false;
            }
        }
        true
    }

    /// Push every constraint-satisfying unvisited edge of `vertex`, in
    /// `out`, `in`, then self-loop list order. Directional traversal skips
    /// the list that goes the wrong way; self loops are always candidates.
    fn add_edges(&mut self, vertex: GraphId) {
        let Some(entry) = self.ctx.vertex(vertex) else {
            return;
        };
        let mut candidates: Vec<GraphId> = Vec::new();
        if self.direction != EdgeDirection::Left {
            candidates.extend(&entry.out);
        }
        if self.direction != EdgeDirection::Right {
            candidates.extend(&entry.inc);
        }
        candidates.extend(&entry.self_loop);

        for edge_id in candidates {
            if *self.visited_edges.get(&edge_id).unwrap_or(&false) {
                continue;
            }
            let edge = self.ctx.edge(edge_id).expect("adjacency lists are consistent");
            if !self.check_edge_constraints(edge, edge_id) {
                continue;
            }
            if self.direction == EdgeDirection::Undirected {
                self.vertex_stack.push(vertex);
            }
            self.edge_stack.push(edge_id);
        }
    }

    fn build_edge_set(&self, end: GraphId) -> EdgeSet {
        let edges = self
            .path_stack
            .iter()
            .map(|id| self.ctx.edge(*id).expect("path holds known edges").to_edge(*id))
            .collect();
        EdgeSet { edges, start_id: self.vsid, end_id: end }
    }
}
