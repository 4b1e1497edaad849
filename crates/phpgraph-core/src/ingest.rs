//! Ingestion: nested tree documents -> graph nodes and structural edges.
//!
//! A tree document is the parser's JSON dump of one AST node: an object with
//! a string `nodeType`, scalar fields, child fields holding further node
//! objects (alone or in arrays) and an `attributes` object of metadata.
//!
//! Each call runs in two phases. The planning phase walks the documents with
//! an explicit stack, allocates IDs in depth-first pre-order and checks them
//! against the graph. The commit phase writes the plan. A call that fails
//! leaves the graph and the ID counter untouched.

use serde_json::{Map, Value};

use crate::edge::{EdgeId, EdgeKind, StructuralEdge, MAX_INDEX};
use crate::error::CoreError;
use crate::graph::AstGraph;
use crate::id::{NodeId, EPHEMERAL_PREFIX};
use crate::value::{is_node_document, PropertyMap, ATTRIBUTES_KEY, NODE_TYPE_KEY};

/// How ingested nodes are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdScheme {
    /// `node_{n}`, for code parsed without a file.
    Ephemeral,
    /// `{fingerprint}_{n}`, for nodes belonging to a file.
    File(String),
}

impl IdScheme {
    fn prefix(&self) -> &str {
        match self {
            IdScheme::Ephemeral => EPHEMERAL_PREFIX,
            IdScheme::File(fingerprint) => fingerprint,
        }
    }
}

/// Where a planned node hangs.
#[derive(Debug)]
enum Link {
    /// Top-level document of the call, attached to nothing.
    Root,
    /// Top-level document attached under an existing graph node.
    Existing { parent: NodeId, edge: StructuralEdge },
    /// Child of an earlier planned node.
    Planned { parent: usize, edge: StructuralEdge },
}

#[derive(Debug)]
struct PlannedNode {
    id: NodeId,
    properties: PropertyMap,
    link: Link,
}

/// Turns tree documents into nodes of one graph under one ID scheme.
///
/// The sequence counter starts at 1 and keeps running across calls, so
/// several batches ingested through the same `Ingestor` never collide.
pub struct Ingestor<'g> {
    graph: &'g mut AstGraph,
    scheme: IdScheme,
    next_seq: u64,
}

impl<'g> Ingestor<'g> {
    pub fn new(graph: &'g mut AstGraph, scheme: IdScheme) -> Self {
        Ingestor {
            graph,
            scheme,
            next_seq: 1,
        }
    }

    pub fn scheme(&self) -> &IdScheme {
        &self.scheme
    }

    /// Ingests one document as a root. Returns `None` if `doc` is not a node
    /// object, in which case nothing is created.
    pub fn ingest(&mut self, doc: &Value) -> Result<Option<NodeId>, CoreError> {
        let mut ids = self.run(std::slice::from_ref(doc), |_| Link::Root)?;
        Ok(ids.pop())
    }

    /// Ingests each document as a root, skipping non-node values.
    pub fn ingest_all(&mut self, docs: &[Value]) -> Result<Vec<NodeId>, CoreError> {
        self.run(docs, |_| Link::Root)
    }

    /// Ingests `docs` as the array field `field` of the existing node
    /// `parent`, element `i` getting index `i`. Non-node elements leave gaps.
    ///
    /// The parent must not already have children under `field`.
    pub fn ingest_under(
        &mut self,
        parent: &NodeId,
        field: &str,
        docs: &[Value],
    ) -> Result<Vec<NodeId>, CoreError> {
        self.graph.node(parent)?;
        if field.is_empty() {
            return Err(CoreError::InvalidEdge {
                reason: format!("edge under {parent} has an empty field name"),
            });
        }
        let occupied = self
            .graph
            .child_edges(parent)?
            .iter()
            .any(|e| e.field() == Some(field));
        if occupied {
            return Err(CoreError::InvalidEdge {
                reason: format!("field {field} of {parent} already has children"),
            });
        }
        self.run(docs, |index| Link::Existing {
            parent: parent.clone(),
            edge: StructuralEdge::new(field, Some(index)),
        })
    }

    fn run<F>(&mut self, docs: &[Value], top_link: F) -> Result<Vec<NodeId>, CoreError>
    where
        F: Fn(usize) -> Link,
    {
        let (plan, top) = self.plan(docs, top_link)?;
        self.commit(&plan)?;
        self.next_seq += plan.len() as u64;
        tracing::debug!(
            "ingested {} node(s) from {} document(s) under {:?}",
            plan.len(),
            top.len(),
            self.scheme
        );
        Ok(top.into_iter().map(|i| plan[i].id.clone()).collect())
    }

    /// Walks every document and allocates IDs without touching the graph.
    /// Returns the plan (pre-order) and the positions of top-level nodes.
    fn plan<'d, F>(
        &self,
        docs: &'d [Value],
        top_link: F,
    ) -> Result<(Vec<PlannedNode>, Vec<usize>), CoreError>
    where
        F: Fn(usize) -> Link,
    {
        let mut plan: Vec<PlannedNode> = Vec::new();
        let mut top = Vec::new();
        let mut stack: Vec<(&'d Map<String, Value>, Link)> = Vec::new();

        for (position, doc) in docs.iter().enumerate() {
            let Some(obj) = node_object(doc) else {
                continue;
            };
            top.push(plan.len());
            stack.push((obj, top_link(position)));

            while let Some((obj, link)) = stack.pop() {
                let slot = plan.len();
                let id = NodeId::scoped(self.scheme.prefix(), self.next_seq + slot as u64);
                if self.graph.contains_node(&id) {
                    return Err(CoreError::DuplicateNode { id });
                }

                let (properties, children) = partition(obj);
                if let Some((_, edge)) = children
                    .iter()
                    .find(|(_, edge)| edge.index.map_or(false, |i| i > MAX_INDEX))
                {
                    return Err(CoreError::InvalidEdge {
                        reason: format!(
                            "field {} of {id} has more than {MAX_INDEX} elements",
                            edge.field
                        ),
                    });
                }
                plan.push(PlannedNode {
                    id,
                    properties,
                    link,
                });
                for (child, edge) in children.into_iter().rev() {
                    stack.push((child, Link::Planned { parent: slot, edge }));
                }
            }
        }
        Ok((plan, top))
    }

    fn commit(&mut self, plan: &[PlannedNode]) -> Result<(), CoreError> {
        let mut created = Vec::with_capacity(plan.len());
        let result = self.write_plan(plan, &mut created);
        if result.is_err() {
            for id in created.into_iter().rev() {
                let _ = self.graph.store_mut().remove_node(id);
            }
        }
        result
    }

    fn write_plan<'p>(
        &mut self,
        plan: &'p [PlannedNode],
        created: &mut Vec<&'p NodeId>,
    ) -> Result<(), CoreError> {
        let store = self.graph.store_mut();
        for node in plan {
            store.add_node(node.id.clone())?;
            created.push(&node.id);
            store.set_node_properties(&node.id, node.properties.clone())?;

            let (parent, edge) = match &node.link {
                Link::Root => continue,
                Link::Existing { parent, edge } => (parent, edge),
                Link::Planned { parent, edge } => (&plan[*parent].id, edge),
            };
            store.add_edge(parent, &node.id, EdgeKind::parent_of())?;
            store.set_edge_properties(
                &EdgeId::structural(parent.clone(), node.id.clone()),
                edge.to_properties(),
            )?;
        }
        Ok(())
    }
}

fn node_object(doc: &Value) -> Option<&Map<String, Value>> {
    if is_node_document(doc) {
        doc.as_object()
    } else {
        None
    }
}

type ChildDocs<'d> = Vec<(&'d Map<String, Value>, StructuralEdge)>;

/// Splits a node object into its immediate properties and its child
/// documents (in field order, array elements in index order).
fn partition(obj: &Map<String, Value>) -> (PropertyMap, ChildDocs<'_>) {
    let mut properties = PropertyMap::with_capacity(obj.len());
    let mut children = Vec::new();

    if let Some(node_type) = obj.get(NODE_TYPE_KEY) {
        properties.insert(NODE_TYPE_KEY.to_string(), node_type.clone());
    }

    for (key, value) in obj {
        if key == NODE_TYPE_KEY {
            continue;
        }
        if key == ATTRIBUTES_KEY {
            if let Value::Object(attributes) = value {
                for (k, v) in attributes {
                    properties.insert(k.clone(), v.clone());
                }
                continue;
            }
        }
        if let Some(child) = node_object(value) {
            children.push((child, StructuralEdge::new(key.as_str(), None)));
        } else if let Some(items) = child_array(value) {
            for (index, item) in items.iter().enumerate() {
                if let Some(child) = node_object(item) {
                    children.push((child, StructuralEdge::new(key.as_str(), Some(index))));
                }
            }
        } else {
            properties.insert(key.clone(), value.clone());
        }
    }
    (properties, children)
}

/// A non-empty array of node objects and nulls, with at least one node.
fn child_array(value: &Value) -> Option<&Vec<Value>> {
    let items = value.as_array()?;
    let children = items.iter().all(|v| v.is_null() || is_node_document(v))
        && items.iter().any(is_node_document);
    children.then_some(items)
}
