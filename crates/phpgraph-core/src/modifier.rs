//! Modifier: the mutation layer.
//!
//! Every write to an [`AstGraph`] outside the conversion algorithms goes
//! through a [`Modifier`]. Each operation validates fully before touching the
//! store, so a rejected call leaves the graph exactly as it was.

use serde_json::Value;

use crate::edge::{EdgeId, EdgeKind, StructuralEdge, MAX_INDEX};
use crate::error::CoreError;
use crate::graph::AstGraph;
use crate::id::NodeId;
use crate::node::{EdgeRef, NodeRef};
use crate::value::{PropertyMap, NODE_TYPE_KEY};

/// Mutable handle over an [`AstGraph`].
pub struct Modifier<'g> {
    graph: &'g mut AstGraph,
}

impl<'g> Modifier<'g> {
    pub fn new(graph: &'g mut AstGraph) -> Self {
        Modifier { graph }
    }

    /// Read access to the graph being modified.
    pub fn graph(&self) -> &AstGraph {
        self.graph
    }

    /// Creates a node with its type tag and initial properties in one step.
    ///
    /// A `nodeType` key inside `extra` is ignored in favour of `node_type`.
    pub fn add_node(
        &mut self,
        id: NodeId,
        node_type: &str,
        extra: PropertyMap,
    ) -> Result<NodeRef<'_>, CoreError> {
        let mut properties = PropertyMap::with_capacity(extra.len() + 1);
        properties.insert(NODE_TYPE_KEY.to_string(), Value::from(node_type));
        properties.extend(extra.into_iter().filter(|(k, _)| k != NODE_TYPE_KEY));

        let store = self.graph.store_mut();
        store.add_node(id.clone())?;
        store.set_node_properties(&id, properties)?;
        self.graph.node(&id)
    }

    /// Deletes a node and every edge it participates in. Its children stay in
    /// the graph as new roots.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<PropertyMap, CoreError> {
        self.graph.store_mut().remove_node(id)
    }

    /// Attaches `to` under `from` in the parent slot `field`.
    ///
    /// `index` is `Some` for array fields and `None` for single-value fields.
    pub fn add_edge(
        &mut self,
        from: &NodeId,
        to: &NodeId,
        field: &str,
        index: Option<usize>,
    ) -> Result<EdgeRef<'_>, CoreError> {
        if field.is_empty() {
            return Err(CoreError::InvalidEdge {
                reason: format!("edge {from} -> {to} has an empty field name"),
            });
        }
        if let Some(index) = index.filter(|&i| i > MAX_INDEX) {
            return Err(CoreError::InvalidEdge {
                reason: format!("index {index} of field {field} on {from} exceeds {MAX_INDEX}"),
            });
        }
        self.validate_edge(from, to, field, index)?;

        let id = EdgeId::structural(from.clone(), to.clone());
        let store = self.graph.store_mut();
        store.add_edge(from, to, EdgeKind::parent_of())?;
        store.set_edge_properties(&id, StructuralEdge::new(field, index).to_properties())?;
        self.graph.edge(&id)
    }

    /// Detaches `to` from `from`. The child becomes a root.
    pub fn remove_edge(&mut self, from: &NodeId, to: &NodeId) -> Result<PropertyMap, CoreError> {
        self.graph
            .store_mut()
            .remove_edge(&EdgeId::structural(from.clone(), to.clone()))
    }

    /// Merges `props` into the node. The type tag cannot be changed here.
    pub fn set_properties(&mut self, id: &NodeId, props: PropertyMap) -> Result<(), CoreError> {
        self.graph.node(id)?;
        if props.contains_key(NODE_TYPE_KEY) {
            return Err(CoreError::ImmutableType { id: id.clone() });
        }
        self.graph.store_mut().set_node_properties(id, props)
    }

    /// Removes one property, returning its previous value.
    pub fn remove_property(&mut self, id: &NodeId, key: &str) -> Result<Option<Value>, CoreError> {
        self.graph.node(id)?;
        if key == NODE_TYPE_KEY {
            return Err(CoreError::ImmutableType { id: id.clone() });
        }
        self.graph.store_mut().remove_node_property(id, key)
    }

    fn validate_edge(
        &self,
        from: &NodeId,
        to: &NodeId,
        field: &str,
        index: Option<usize>,
    ) -> Result<(), CoreError> {
        let graph = &*self.graph;
        graph.node(from)?;
        graph.node(to)?;

        let id = EdgeId::structural(from.clone(), to.clone());
        if graph.store().contains_edge(&id) {
            return Err(CoreError::DuplicateEdge { id });
        }
        if from == to {
            return Err(CoreError::InvalidEdge {
                reason: format!("node {from} cannot be its own child"),
            });
        }
        if let Some(parent) = graph.parent_edge(to)? {
            return Err(CoreError::InvalidEdge {
                reason: format!("node {to} already has parent {}", parent.from()),
            });
        }
        for ancestor in graph.ancestors(from) {
            if ancestor?.id() == to {
                return Err(CoreError::InvalidEdge {
                    reason: format!("attaching {to} under {from} would create a cycle"),
                });
            }
        }

        for sibling in graph.child_edges(from)? {
            if sibling.field() != Some(field) {
                continue;
            }
            match (sibling.index(), index) {
                (Some(_), None) | (None, Some(_)) => {
                    return Err(CoreError::InvalidEdge {
                        reason: format!(
                            "field {field} of {from} mixes indexed and non-indexed children"
                        ),
                    });
                }
                (Some(a), Some(b)) if a == b => {
                    return Err(CoreError::InvalidEdge {
                        reason: format!("index {b} of field {field} on {from} is already taken"),
                    });
                }
                (None, None) => {
                    return Err(CoreError::InvalidEdge {
                        reason: format!("single-value field {field} of {from} is already set"),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}
