//! AstGraph: the read-only query layer over a [`PropertyStore`].
//!
//! [`AstGraph`] is the single entry point for inspecting a parsed program.
//! It owns its store privately; writes go through
//! [`Modifier`](crate::modifier::Modifier) (obtained with
//! [`AstGraph::modifier`]) and the ingestion/reconstruction algorithms.
//!
//! # Layout
//!
//! A graph built from files has a fixed skeleton:
//!
//! ```text
//! project (Project) --files[i]--> <fingerprint> (File) --stmts[j]--> <fingerprint>_<n> ...
//! ```
//!
//! A graph built from a code string has no skeleton; its top-level statements
//! are simply the roots.
//!
//! # Concurrency
//!
//! Single writer. Readers may share `&AstGraph` freely; mutation needs
//! `&mut`, so reads cannot overlap a write.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::edge::EdgeId;
use crate::error::CoreError;
use crate::id::NodeId;
use crate::modifier::Modifier;
use crate::node::{EdgeRef, NodeRef};
use crate::store::PropertyStore;

/// Type tag of the project container node.
pub const PROJECT_TYPE: &str = "Project";

/// Type tag of file container nodes.
pub const FILE_TYPE: &str = "File";

/// Project -> file edge field.
pub const FILES_FIELD: &str = "files";

/// File -> statement edge field.
pub const STMTS_FIELD: &str = "stmts";

/// A PHP abstract syntax tree stored as a property graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AstGraph {
    store: PropertyStore,
}

impl AstGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an already populated store.
    pub fn from_store(store: PropertyStore) -> Self {
        AstGraph { store }
    }

    /// Read-only access to the underlying store.
    pub fn store(&self) -> &PropertyStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut PropertyStore {
        &mut self.store
    }

    /// The mutation layer for this graph.
    pub fn modifier(&mut self) -> Modifier<'_> {
        Modifier::new(self)
    }

    pub fn node_count(&self) -> usize {
        self.store.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.store.edge_count()
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.store.contains_node(id)
    }

    /// `true` if the graph carries the project/file skeleton.
    pub fn is_project(&self) -> bool {
        self.store.contains_node(&NodeId::project())
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn node(&self, id: &NodeId) -> Result<NodeRef<'_>, CoreError> {
        self.store
            .node_entry(id)
            .map(|(id, props)| NodeRef::new(id, props))
            .ok_or_else(|| CoreError::NodeNotFound { id: id.clone() })
    }

    pub fn edge(&self, id: &EdgeId) -> Result<EdgeRef<'_>, CoreError> {
        self.store
            .edge_properties(id)
            .map(|props| EdgeRef::new(id.clone(), props))
            .ok_or_else(|| CoreError::EdgeNotFound { id: id.clone() })
    }

    /// Every node, in natural ID order.
    pub fn nodes(&self) -> Vec<NodeRef<'_>> {
        let mut nodes: Vec<NodeRef<'_>> = self
            .store
            .node_entries()
            .map(|(id, props)| NodeRef::new(id, props))
            .collect();
        nodes.sort_by(|a, b| a.id().cmp(b.id()));
        nodes
    }

    // -----------------------------------------------------------------------
    // Structural navigation
    // -----------------------------------------------------------------------

    /// Outgoing structural edges of `id`, grouped by field (fields in the
    /// order their first edge was created), then by index. Edges without an
    /// index sort after indexed ones; edges without a field come last.
    pub fn child_edges(&self, id: &NodeId) -> Result<Vec<EdgeRef<'_>>, CoreError> {
        let mut groups: IndexMap<Option<&str>, Vec<EdgeRef<'_>>> = IndexMap::new();
        for edge in self.store.outgoing(id)? {
            if !edge.id.kind.is_structural() {
                continue;
            }
            let edge = EdgeRef::new(edge.id, edge.properties);
            groups.entry(edge.field()).or_default().push(edge);
        }
        if let Some(unnamed) = groups.shift_remove(&None) {
            groups.insert(None, unnamed);
        }

        let mut ordered = Vec::new();
        for (_, mut edges) in groups {
            edges.sort_by_key(|e| e.index().unwrap_or(usize::MAX));
            ordered.extend(edges);
        }
        Ok(ordered)
    }

    /// Children of `id` in field-then-index order.
    pub fn successors(&self, id: &NodeId) -> Result<Vec<NodeRef<'_>>, CoreError> {
        self.child_edges(id)?
            .iter()
            .map(|edge| self.node(edge.to()))
            .collect()
    }

    /// The single incoming structural edge of `id`, if any.
    ///
    /// More than one parent means the tree invariant is broken.
    pub fn parent_edge(&self, id: &NodeId) -> Result<Option<EdgeRef<'_>>, CoreError> {
        let mut parents = self
            .store
            .incoming(id)?
            .into_iter()
            .filter(|e| e.id.kind.is_structural());
        let first = parents.next();
        if parents.next().is_some() {
            return Err(CoreError::CorruptGraph {
                reason: format!("node {id} has more than one parent"),
            });
        }
        Ok(first.map(|e| EdgeRef::new(e.id, e.properties)))
    }

    pub fn parent(&self, id: &NodeId) -> Result<Option<NodeRef<'_>>, CoreError> {
        match self.parent_edge(id)? {
            Some(edge) => self.node(edge.from()).map(Some),
            None => Ok(None),
        }
    }

    /// Sources of every incoming edge of `id`, any kind, in creation order.
    pub fn predecessors(&self, id: &NodeId) -> Result<Vec<NodeRef<'_>>, CoreError> {
        self.store
            .incoming(id)?
            .iter()
            .map(|edge| self.node(&edge.id.from))
            .collect()
    }

    /// Walks parents transitively, nearest first, up to a root.
    pub fn ancestors(&self, id: &NodeId) -> Ancestors<'_> {
        Ancestors {
            graph: self,
            current: Some(id.clone()),
            seen: HashSet::from([id.clone()]),
        }
    }

    /// Depth-first pre-order walk below `id` (excluding `id` itself).
    pub fn descendants(&self, id: &NodeId) -> Descendants<'_> {
        Descendants {
            graph: self,
            stack: vec![Pending::Expand(id.clone())],
            seen: HashSet::from([id.clone()]),
            failed: false,
        }
    }

    /// Nodes with no incoming structural edge, minus the project sentinel,
    /// in natural ID order.
    pub fn find_root_ids(&self) -> Vec<NodeId> {
        let children: HashSet<NodeId> = self
            .store
            .edge_ids()
            .filter(|e| e.kind.is_structural())
            .map(|e| e.to)
            .collect();
        let mut roots: Vec<NodeId> = self
            .store
            .node_ids()
            .filter(|id| !id.is_project() && !children.contains(*id))
            .cloned()
            .collect();
        roots.sort();
        roots
    }

    /// First node, in pre-order from every traversal root, that satisfies
    /// `pred`.
    pub fn first_matching<'g, P>(&'g self, mut pred: P) -> Result<Option<NodeRef<'g>>, CoreError>
    where
        P: FnMut(&NodeRef<'g>) -> bool,
    {
        for root in self.traversal_roots() {
            let node = self.node(&root)?;
            if pred(&node) {
                return Ok(Some(node));
            }
            for node in self.descendants(&root) {
                let node = node?;
                if pred(&node) {
                    return Ok(Some(node));
                }
            }
        }
        Ok(None)
    }

    /// Every node, in pre-order from every traversal root, that satisfies
    /// `pred`.
    pub fn all_matching<'g, P>(&'g self, mut pred: P) -> Result<Vec<NodeRef<'g>>, CoreError>
    where
        P: FnMut(&NodeRef<'g>) -> bool,
    {
        let mut matches = Vec::new();
        for root in self.traversal_roots() {
            let node = self.node(&root)?;
            if pred(&node) {
                matches.push(node);
            }
            for node in self.descendants(&root) {
                let node = node?;
                if pred(&node) {
                    matches.push(node);
                }
            }
        }
        Ok(matches)
    }

    /// The project sentinel (when present) followed by [`find_root_ids`].
    ///
    /// [`find_root_ids`]: Self::find_root_ids
    fn traversal_roots(&self) -> Vec<NodeId> {
        let mut roots = Vec::new();
        if self.is_project() {
            roots.push(NodeId::project());
        }
        roots.extend(self.find_root_ids());
        roots
    }

    // -----------------------------------------------------------------------
    // Project / file skeleton
    // -----------------------------------------------------------------------

    /// File node IDs: the project's `files` children in index order, or every
    /// `File` node in natural ID order when there is no project node.
    pub fn file_ids(&self) -> Result<Vec<NodeId>, CoreError> {
        let project = NodeId::project();
        if self.store.contains_node(&project) {
            return Ok(self
                .child_edges(&project)?
                .into_iter()
                .filter(|e| e.field() == Some(FILES_FIELD))
                .map(|e| e.to().clone())
                .collect());
        }
        Ok(self
            .nodes()
            .into_iter()
            .filter(|n| n.is_type(FILE_TYPE))
            .map(|n| n.id().clone())
            .collect())
    }

    /// The file's top-level statements, by `stmts` index. Sibling structural
    /// fields are not included.
    pub fn file_statement_ids(&self, file: &NodeId) -> Result<Vec<NodeId>, CoreError> {
        Ok(self
            .child_edges(file)?
            .into_iter()
            .filter(|e| e.field() == Some(STMTS_FIELD))
            .map(|e| e.to().clone())
            .collect())
    }

    /// The nearest `File` node at or above `id`.
    pub fn file_of(&self, id: &NodeId) -> Result<NodeRef<'_>, CoreError> {
        let node = self.node(id)?;
        if node.is_type(FILE_TYPE) {
            return Ok(node);
        }
        for ancestor in self.ancestors(id) {
            let ancestor = ancestor?;
            if ancestor.is_type(FILE_TYPE) {
                return Ok(ancestor);
            }
        }
        Err(CoreError::NodeNotInFile { id: id.clone() })
    }
}

/// Iterator returned by [`AstGraph::ancestors`].
///
/// Yields `Err(CorruptGraph)` once and stops if a node repeats.
pub struct Ancestors<'g> {
    graph: &'g AstGraph,
    current: Option<NodeId>,
    seen: HashSet<NodeId>,
}

impl<'g> Iterator for Ancestors<'g> {
    type Item = Result<NodeRef<'g>, CoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.take()?;
        let parent = match self.graph.parent_edge(&current) {
            Ok(Some(edge)) => edge.from().clone(),
            Ok(None) => return None,
            Err(e) => return Some(Err(e)),
        };
        if !self.seen.insert(parent.clone()) {
            return Some(Err(CoreError::CorruptGraph {
                reason: format!("cycle detected while walking ancestors at {parent}"),
            }));
        }
        let node = self.graph.node(&parent);
        self.current = Some(parent);
        Some(node)
    }
}

enum Pending {
    Expand(NodeId),
    Yield(NodeId),
}

/// Iterator returned by [`AstGraph::descendants`].
pub struct Descendants<'g> {
    graph: &'g AstGraph,
    stack: Vec<Pending>,
    seen: HashSet<NodeId>,
    failed: bool,
}

impl<'g> Iterator for Descendants<'g> {
    type Item = Result<NodeRef<'g>, CoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while let Some(pending) = self.stack.pop() {
            match pending {
                Pending::Yield(id) => {
                    self.stack.push(Pending::Expand(id.clone()));
                    return Some(self.graph.node(&id));
                }
                Pending::Expand(id) => {
                    let children = match self.graph.child_edges(&id) {
                        Ok(children) => children,
                        Err(e) => {
                            self.failed = true;
                            return Some(Err(e));
                        }
                    };
                    for edge in children.iter().rev() {
                        if !self.seen.insert(edge.to().clone()) {
                            self.failed = true;
                            return Some(Err(CoreError::CorruptGraph {
                                reason: format!("node {} reached twice below {id}", edge.to()),
                            }));
                        }
                        self.stack.push(Pending::Yield(edge.to().clone()));
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::props;
    use serde_json::json;

    fn n(id: &str) -> NodeId {
        NodeId::from(id)
    }

    /// root(Stmt_Echo) with exprs[1] = b, exprs[0] = a (added out of order),
    /// plus cond = c added in between.
    fn sample() -> AstGraph {
        let mut graph = AstGraph::new();
        let mut m = graph.modifier();
        m.add_node(n("root"), "Stmt_Echo", props::<&str, serde_json::Value, _>([]))
            .unwrap();
        for id in ["a", "b", "c", "d"] {
            m.add_node(n(id), "Scalar_String", props([("value", json!(id))]))
                .unwrap();
        }
        m.add_edge(&n("root"), &n("b"), "exprs", Some(1)).unwrap();
        m.add_edge(&n("root"), &n("c"), "cond", None).unwrap();
        m.add_edge(&n("root"), &n("a"), "exprs", Some(0)).unwrap();
        m.add_edge(&n("a"), &n("d"), "inner", None).unwrap();
        graph
    }

    fn ids(nodes: &[NodeRef<'_>]) -> Vec<String> {
        nodes.iter().map(|n| n.id().to_string()).collect()
    }

    #[test]
    fn node_lookup_miss_is_not_found() {
        let graph = AstGraph::new();
        assert!(matches!(
            graph.node(&n("nope")),
            Err(CoreError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn edge_lookup() {
        let graph = sample();
        let edge = graph.edge(&EdgeId::structural(n("root"), n("b"))).unwrap();
        assert_eq!(edge.field(), Some("exprs"));
        assert_eq!(edge.index(), Some(1));
        assert!(matches!(
            graph.edge(&EdgeId::structural(n("b"), n("root"))),
            Err(CoreError::EdgeNotFound { .. })
        ));
    }

    #[test]
    fn successors_are_grouped_by_field_then_index() {
        let graph = sample();
        let children = graph.successors(&n("root")).unwrap();
        assert_eq!(ids(&children), vec!["a", "b", "c"]);
    }

    #[test]
    fn ancestors_are_nearest_first() {
        let graph = sample();
        let chain: Vec<String> = graph
            .ancestors(&n("d"))
            .map(|r| r.unwrap().id().to_string())
            .collect();
        assert_eq!(chain, vec!["a", "root"]);
        assert_eq!(graph.ancestors(&n("root")).count(), 0);
    }

    #[test]
    fn ancestors_report_cycles() {
        let mut graph = AstGraph::new();
        for id in ["x", "y"] {
            graph.store_mut().add_node(n(id)).unwrap();
        }
        let kind = crate::edge::EdgeKind::parent_of();
        graph.store_mut().add_edge(&n("x"), &n("y"), kind.clone()).unwrap();
        graph.store_mut().add_edge(&n("y"), &n("x"), kind).unwrap();

        let results: Vec<_> = graph.ancestors(&n("x")).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(CoreError::CorruptGraph { .. })));
    }

    #[test]
    fn descendants_are_preorder() {
        let graph = sample();
        let below: Vec<String> = graph
            .descendants(&n("root"))
            .map(|r| r.unwrap().id().to_string())
            .collect();
        assert_eq!(below, vec!["a", "d", "b", "c"]);
    }

    #[test]
    fn roots_exclude_children_and_sentinel() {
        let mut graph = sample();
        let mut m = graph.modifier();
        m.add_node(NodeId::project(), PROJECT_TYPE, props::<&str, serde_json::Value, _>([]))
            .unwrap();
        m.add_node(n("root2"), "Stmt_Nop", props::<&str, serde_json::Value, _>([]))
            .unwrap();
        assert_eq!(graph.find_root_ids(), vec![n("root"), n("root2")]);
    }

    #[test]
    fn matching_walks_preorder() {
        let graph = sample();
        let strings = graph
            .all_matching(|n| n.is_type("Scalar_String"))
            .unwrap();
        assert_eq!(ids(&strings), vec!["a", "d", "b", "c"]);

        let first = graph
            .first_matching(|n| n.get_str("value") == Some("b"))
            .unwrap()
            .unwrap();
        assert_eq!(first.id().as_str(), "b");

        assert!(graph
            .first_matching(|n| n.is_type("Stmt_Class"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn parent_and_predecessors() {
        let graph = sample();
        assert_eq!(graph.parent(&n("d")).unwrap().unwrap().id().as_str(), "a");
        assert!(graph.parent(&n("root")).unwrap().is_none());
        assert_eq!(ids(&graph.predecessors(&n("b")).unwrap()), vec!["root"]);
    }

    #[test]
    fn file_of_finds_enclosing_file() {
        let mut graph = AstGraph::new();
        let mut m = graph.modifier();
        let empty = || props::<&str, serde_json::Value, _>([]);
        m.add_node(NodeId::project(), PROJECT_TYPE, empty()).unwrap();
        m.add_node(n("f1"), FILE_TYPE, empty()).unwrap();
        m.add_node(n("f1_1"), "Stmt_Echo", empty()).unwrap();
        m.add_node(n("f1_2"), "Scalar_String", empty()).unwrap();
        m.add_node(n("loose"), "Stmt_Nop", empty()).unwrap();
        m.add_edge(&NodeId::project(), &n("f1"), FILES_FIELD, Some(0)).unwrap();
        m.add_edge(&n("f1"), &n("f1_1"), STMTS_FIELD, Some(0)).unwrap();
        m.add_edge(&n("f1_1"), &n("f1_2"), "exprs", Some(0)).unwrap();

        assert_eq!(graph.file_of(&n("f1_2")).unwrap().id().as_str(), "f1");
        assert_eq!(graph.file_of(&n("f1")).unwrap().id().as_str(), "f1");
        assert!(matches!(
            graph.file_of(&n("loose")),
            Err(CoreError::NodeNotInFile { .. })
        ));
        assert_eq!(graph.file_ids().unwrap(), vec![n("f1")]);
        assert_eq!(graph.file_statement_ids(&n("f1")).unwrap(), vec![n("f1_1")]);
    }

    #[test]
    fn serde_roundtrip() {
        let graph = sample();
        let json = serde_json::to_string(&graph).unwrap();
        let back: AstGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back.node_count(), graph.node_count());
        assert_eq!(back.edge_count(), graph.edge_count());
        assert_eq!(ids(&back.successors(&n("root")).unwrap()), vec!["a", "b", "c"]);
    }
}
