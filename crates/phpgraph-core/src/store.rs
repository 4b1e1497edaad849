//! PropertyStore: generic labeled-graph storage.
//!
//! Nodes are keyed by string [`NodeId`]s and carry a flat [`PropertyMap`].
//! Edges are keyed by the `(from, to, kind)` triple and carry their own map.
//! The store knows nothing about ASTs; the query, mutation and conversion
//! layers give the properties meaning.
//!
//! Storage is a petgraph `StableGraph` (an arena whose indices survive
//! removals) plus an `id -> NodeIndex` lookup table. Every edge is stamped
//! with a creation sequence number, so listings come back in creation order
//! even after petgraph has reused freed edge slots.

use std::collections::HashMap;

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};

use crate::edge::{EdgeId, EdgeKind};
use crate::error::CoreError;
use crate::id::NodeId;
use crate::value::PropertyMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeRecord {
    id: NodeId,
    properties: PropertyMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EdgeRecord {
    kind: EdgeKind,
    properties: PropertyMap,
    seq: u64,
}

/// A borrowed view of one stored edge.
#[derive(Debug, Clone)]
pub struct StoredEdge<'s> {
    pub id: EdgeId,
    pub properties: &'s PropertyMap,
    /// Creation sequence number, unique and increasing within a store.
    pub seq: u64,
}

/// Labeled property graph storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyStore {
    graph: StableGraph<NodeRecord, EdgeRecord, Directed, u32>,
    index: HashMap<NodeId, NodeIndex<u32>>,
    next_edge_seq: u64,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    /// Creates a node with an empty property map.
    pub fn add_node(&mut self, id: NodeId) -> Result<(), CoreError> {
        if self.index.contains_key(&id) {
            return Err(CoreError::DuplicateNode { id });
        }
        let idx = self.graph.add_node(NodeRecord {
            id: id.clone(),
            properties: PropertyMap::new(),
        });
        self.index.insert(id, idx);
        Ok(())
    }

    /// Deletes a node together with every edge it is source or target of.
    ///
    /// Returns the node's final property map.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<PropertyMap, CoreError> {
        let idx = self
            .index
            .remove(id)
            .ok_or_else(|| CoreError::NodeNotFound { id: id.clone() })?;
        match self.graph.remove_node(idx) {
            Some(record) => Ok(record.properties),
            None => Err(CoreError::CorruptGraph {
                reason: format!("index entry for {id} points at a vacant slot"),
            }),
        }
    }

    /// Merges `props` into the node's map, overwriting existing keys.
    pub fn set_node_properties(
        &mut self,
        id: &NodeId,
        props: PropertyMap,
    ) -> Result<(), CoreError> {
        let record = self.node_record_mut(id)?;
        record.properties.extend(props);
        Ok(())
    }

    /// Removes one key from a node's map, returning its previous value.
    pub fn remove_node_property(
        &mut self,
        id: &NodeId,
        key: &str,
    ) -> Result<Option<serde_json::Value>, CoreError> {
        let record = self.node_record_mut(id)?;
        Ok(record.properties.shift_remove(key))
    }

    pub fn node_properties(&self, id: &NodeId) -> Option<&PropertyMap> {
        let idx = self.index.get(id)?;
        self.graph.node_weight(*idx).map(|r| &r.properties)
    }

    pub(crate) fn node_entry(&self, id: &NodeId) -> Option<(&NodeId, &PropertyMap)> {
        let idx = self.index.get(id)?;
        self.graph
            .node_weight(*idx)
            .map(|r| (&r.id, &r.properties))
    }

    pub(crate) fn node_entries(&self) -> impl Iterator<Item = (&NodeId, &PropertyMap)> + '_ {
        self.graph
            .node_indices()
            .map(move |i| (&self.graph[i].id, &self.graph[i].properties))
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.index.contains_key(id)
    }

    /// All node IDs, in no particular order.
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> + '_ {
        self.graph.node_indices().map(move |i| &self.graph[i].id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    // -----------------------------------------------------------------------
    // Edges
    // -----------------------------------------------------------------------

    /// Creates an edge with an empty property map.
    ///
    /// Both endpoints must exist and the exact triple must be new.
    pub fn add_edge(
        &mut self,
        from: &NodeId,
        to: &NodeId,
        kind: EdgeKind,
    ) -> Result<EdgeId, CoreError> {
        let from_idx = self.node_index(from)?;
        let to_idx = self.node_index(to)?;

        let id = EdgeId::new(from.clone(), to.clone(), kind);
        if self.find_edge(from_idx, to_idx, &id.kind).is_some() {
            return Err(CoreError::DuplicateEdge { id });
        }

        let seq = self.next_edge_seq;
        self.next_edge_seq += 1;
        self.graph.add_edge(
            from_idx,
            to_idx,
            EdgeRecord {
                kind: id.kind.clone(),
                properties: PropertyMap::new(),
                seq,
            },
        );
        Ok(id)
    }

    /// Deletes an edge, returning its final property map.
    pub fn remove_edge(&mut self, id: &EdgeId) -> Result<PropertyMap, CoreError> {
        let eidx = self.edge_index(id)?;
        self.graph
            .remove_edge(eidx)
            .map(|r| r.properties)
            .ok_or_else(|| CoreError::EdgeNotFound { id: id.clone() })
    }

    /// Merges `props` into the edge's map, overwriting existing keys.
    pub fn set_edge_properties(
        &mut self,
        id: &EdgeId,
        props: PropertyMap,
    ) -> Result<(), CoreError> {
        let eidx = self.edge_index(id)?;
        let record = self
            .graph
            .edge_weight_mut(eidx)
            .ok_or_else(|| CoreError::EdgeNotFound { id: id.clone() })?;
        record.properties.extend(props);
        Ok(())
    }

    pub fn edge_properties(&self, id: &EdgeId) -> Option<&PropertyMap> {
        let eidx = self.edge_index(id).ok()?;
        self.graph.edge_weight(eidx).map(|r| &r.properties)
    }

    pub fn contains_edge(&self, id: &EdgeId) -> bool {
        self.edge_index(id).is_ok()
    }

    /// All edge triples, in no particular order.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.graph.edge_references().map(move |e| {
            EdgeId::new(
                self.graph[e.source()].id.clone(),
                self.graph[e.target()].id.clone(),
                e.weight().kind.clone(),
            )
        })
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Edges leaving `id`, in creation order.
    pub fn outgoing(&self, id: &NodeId) -> Result<Vec<StoredEdge<'_>>, CoreError> {
        self.edges_directed(id, Direction::Outgoing)
    }

    /// Edges entering `id`, in creation order.
    pub fn incoming(&self, id: &NodeId) -> Result<Vec<StoredEdge<'_>>, CoreError> {
        self.edges_directed(id, Direction::Incoming)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn edges_directed(
        &self,
        id: &NodeId,
        direction: Direction,
    ) -> Result<Vec<StoredEdge<'_>>, CoreError> {
        let idx = self.node_index(id)?;
        let mut edges: Vec<StoredEdge<'_>> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| StoredEdge {
                id: EdgeId::new(
                    self.graph[e.source()].id.clone(),
                    self.graph[e.target()].id.clone(),
                    e.weight().kind.clone(),
                ),
                properties: &e.weight().properties,
                seq: e.weight().seq,
            })
            .collect();
        edges.sort_by_key(|e| e.seq);
        Ok(edges)
    }

    fn node_index(&self, id: &NodeId) -> Result<NodeIndex<u32>, CoreError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| CoreError::NodeNotFound { id: id.clone() })
    }

    fn node_record_mut(&mut self, id: &NodeId) -> Result<&mut NodeRecord, CoreError> {
        let idx = self.node_index(id)?;
        self.graph
            .node_weight_mut(idx)
            .ok_or_else(|| CoreError::NodeNotFound { id: id.clone() })
    }

    fn find_edge(
        &self,
        from: NodeIndex<u32>,
        to: NodeIndex<u32>,
        kind: &EdgeKind,
    ) -> Option<EdgeIndex<u32>> {
        self.graph
            .edges_connecting(from, to)
            .find(|e| &e.weight().kind == kind)
            .map(|e| e.id())
    }

    fn edge_index(&self, id: &EdgeId) -> Result<EdgeIndex<u32>, CoreError> {
        let not_found = || CoreError::EdgeNotFound { id: id.clone() };
        let from = self.index.get(&id.from).ok_or_else(not_found)?;
        let to = self.index.get(&id.to).ok_or_else(not_found)?;
        self.find_edge(*from, *to, &id.kind).ok_or_else(not_found)
    }
}
