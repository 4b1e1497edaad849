//! Reconstruction: graph -> ordered list of tree documents.
//!
//! The inverse of [ingestion](crate::ingest). Each node becomes an object
//! starting with `nodeType`, followed by its plain properties, its child
//! fields (in the order the fields were first attached), any default-filled
//! fields, and finally an `attributes` object gathering the metadata keys.
//!
//! Array fields come back dense: a field whose highest index is `n` becomes
//! an array of `n + 1` elements with `null` in every unfilled slot.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::edge::MAX_INDEX;
use crate::error::CoreError;
use crate::graph::AstGraph;
use crate::id::NodeId;
use crate::value::{ATTRIBUTES_KEY, NODE_TYPE_KEY};

/// Properties that belong in a node's `attributes` object.
pub const DEFAULT_ATTRIBUTE_KEYS: [&str; 8] = [
    "startLine",
    "endLine",
    "startFilePos",
    "endFilePos",
    "startTokenPos",
    "endTokenPos",
    "kind",
    "comments",
];

/// Node types whose `attrGroups` field the printer requires even when empty.
pub const ATTR_GROUP_TYPES: [&str; 12] = [
    "Stmt_Function",
    "Stmt_ClassMethod",
    "Stmt_Class",
    "Stmt_Interface",
    "Stmt_Trait",
    "Stmt_Enum",
    "Stmt_EnumCase",
    "Stmt_ClassConst",
    "Stmt_Property",
    "Expr_Closure",
    "Expr_ArrowFunction",
    "Param",
];

/// A field synthesized on output when a node of one of `node_types` lacks it.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultFill {
    pub field: String,
    pub value: Value,
    pub node_types: HashSet<String>,
}

impl DefaultFill {
    pub fn new<I, S>(field: impl Into<String>, value: Value, node_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DefaultFill {
            field: field.into(),
            value,
            node_types: node_types.into_iter().map(Into::into).collect(),
        }
    }

    /// `attrGroups: []` on declarations that can carry PHP attributes.
    pub fn attr_groups() -> Self {
        DefaultFill::new("attrGroups", Value::Array(Vec::new()), ATTR_GROUP_TYPES)
    }
}

/// Output shaping knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructOptions {
    pub attribute_keys: HashSet<String>,
    pub defaults: Vec<DefaultFill>,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        ReconstructOptions {
            attribute_keys: DEFAULT_ATTRIBUTE_KEYS.iter().map(|k| k.to_string()).collect(),
            defaults: vec![DefaultFill::attr_groups()],
        }
    }
}

impl ReconstructOptions {
    /// No attribute grouping and no default fills: every property comes back
    /// as a top-level key exactly as stored.
    pub fn raw() -> Self {
        ReconstructOptions {
            attribute_keys: HashSet::new(),
            defaults: Vec::new(),
        }
    }
}

/// One child slot collected while entering a node.
struct ChildSlot {
    id: NodeId,
    field: String,
    index: Option<usize>,
}

enum Frame {
    Enter(NodeId),
    Exit { id: NodeId, children: Vec<ChildSlot> },
}

/// Rebuilds tree documents from an [`AstGraph`].
pub struct Reconstructor<'g> {
    graph: &'g AstGraph,
    options: &'g ReconstructOptions,
}

impl<'g> Reconstructor<'g> {
    pub fn new(graph: &'g AstGraph, options: &'g ReconstructOptions) -> Self {
        Reconstructor { graph, options }
    }

    /// Rebuilds the subtree rooted at `id`.
    pub fn reconstruct(&self, id: &NodeId) -> Result<Value, CoreError> {
        let mut visited = HashSet::new();
        self.build(id, &mut visited)
    }

    /// Rebuilds several subtrees, in order. A node reachable from two of the
    /// roots is reported as corruption.
    pub fn reconstruct_many(&self, ids: &[NodeId]) -> Result<Vec<Value>, CoreError> {
        let mut visited = HashSet::new();
        let documents = ids
            .iter()
            .map(|id| self.build(id, &mut visited))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(
            "reconstructed {} document(s) from {} node(s)",
            documents.len(),
            visited.len()
        );
        Ok(documents)
    }

    fn build(&self, root: &NodeId, visited: &mut HashSet<NodeId>) -> Result<Value, CoreError> {
        let mut built: HashMap<NodeId, Value> = HashMap::new();
        let mut stack = vec![Frame::Enter(root.clone())];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(id) => {
                    if !visited.insert(id.clone()) {
                        return Err(CoreError::CorruptGraph {
                            reason: format!("node {id} is reachable more than once"),
                        });
                    }
                    let children: Vec<ChildSlot> = self
                        .graph
                        .child_edges(&id)?
                        .into_iter()
                        .filter_map(|edge| {
                            Some(ChildSlot {
                                field: edge.field()?.to_string(),
                                index: edge.index(),
                                id: edge.to().clone(),
                            })
                        })
                        .collect();
                    let enter: Vec<NodeId> = children.iter().rev().map(|c| c.id.clone()).collect();
                    stack.push(Frame::Exit { id, children });
                    stack.extend(enter.into_iter().map(Frame::Enter));
                }
                Frame::Exit { id, children } => {
                    let object = self.assemble(&id, children, &mut built)?;
                    built.insert(id, object);
                }
            }
        }

        built.remove(root).ok_or_else(|| CoreError::CorruptGraph {
            reason: format!("node {root} produced no document"),
        })
    }

    fn assemble(
        &self,
        id: &NodeId,
        children: Vec<ChildSlot>,
        built: &mut HashMap<NodeId, Value>,
    ) -> Result<Value, CoreError> {
        let node = self.graph.node(id)?;
        let node_type = match node.get(NODE_TYPE_KEY) {
            Some(Value::String(t)) => t.clone(),
            Some(other) => {
                return Err(CoreError::CorruptGraph {
                    reason: format!("node {id} has a non-string type tag: {other}"),
                })
            }
            None => {
                return Err(CoreError::CorruptGraph {
                    reason: format!("node {id} has no type tag"),
                })
            }
        };

        let mut object = Map::new();
        let mut attributes = Map::new();
        object.insert(NODE_TYPE_KEY.to_string(), Value::String(node_type.clone()));
        for (key, value) in node.properties() {
            if key == NODE_TYPE_KEY {
                continue;
            }
            if self.options.attribute_keys.contains(key) {
                attributes.insert(key.clone(), value.clone());
            } else {
                object.insert(key.clone(), value.clone());
            }
        }

        let mut fields: IndexMap<String, Vec<(Option<usize>, Value)>> = IndexMap::new();
        for slot in children {
            let value = built.remove(&slot.id).ok_or_else(|| CoreError::CorruptGraph {
                reason: format!("child {} of {id} was not rebuilt", slot.id),
            })?;
            fields.entry(slot.field).or_default().push((slot.index, value));
        }
        for (field, entries) in fields {
            let value = field_value(id, &field, entries)?;
            object.insert(field, value);
        }

        for fill in &self.options.defaults {
            if fill.node_types.contains(&node_type) && !object.contains_key(&fill.field) {
                object.insert(fill.field.clone(), fill.value.clone());
            }
        }

        if !attributes.is_empty() {
            object.insert(ATTRIBUTES_KEY.to_string(), Value::Object(attributes));
        }
        Ok(Value::Object(object))
    }
}

/// Collapses one field's children into its output value. Entries arrive
/// sorted by index with unindexed ones last.
fn field_value(
    owner: &NodeId,
    field: &str,
    entries: Vec<(Option<usize>, Value)>,
) -> Result<Value, CoreError> {
    let max_index = entries.iter().filter_map(|(i, _)| *i).max();
    let value = match max_index {
        None if entries.len() == 1 => entries
            .into_iter()
            .map(|(_, v)| v)
            .next()
            .unwrap_or_default(),
        None => Value::Array(entries.into_iter().map(|(_, v)| v).collect()),
        Some(max) => {
            let len = max
                .checked_add(1)
                .filter(|_| max <= MAX_INDEX)
                .ok_or_else(|| CoreError::CorruptGraph {
                    reason: format!("index {max} of field {field} on {owner} is out of range"),
                })?;
            let mut items = vec![Value::Null; len];
            for (index, value) in entries {
                match index {
                    Some(i) => items[i] = value,
                    None => items.push(value),
                }
            }
            Value::Array(items)
        }
    };
    Ok(value)
}

impl AstGraph {
    /// Every top-level document, with default options.
    ///
    /// On a project graph that is each file's statements, files in order;
    /// otherwise the roots in natural ID order.
    pub fn documents(&self) -> Result<Vec<Value>, CoreError> {
        self.documents_with(&ReconstructOptions::default())
    }

    pub fn documents_with(&self, options: &ReconstructOptions) -> Result<Vec<Value>, CoreError> {
        let ids = if self.is_project() {
            let mut ids = Vec::new();
            for file in self.file_ids()? {
                ids.extend(self.file_statement_ids(&file)?);
            }
            ids
        } else {
            self.find_root_ids()
        };
        Reconstructor::new(self, options).reconstruct_many(&ids)
    }

    /// The statements of one file, by index. Other fields of the file node
    /// are not included.
    pub fn file_documents(&self, file: &NodeId) -> Result<Vec<Value>, CoreError> {
        self.file_documents_with(file, &ReconstructOptions::default())
    }

    pub fn file_documents_with(
        &self,
        file: &NodeId,
        options: &ReconstructOptions,
    ) -> Result<Vec<Value>, CoreError> {
        let ids = self.file_statement_ids(file)?;
        Reconstructor::new(self, options).reconstruct_many(&ids)
    }

    /// Rebuilds the subtree rooted at `id`.
    pub fn reconstruct_node(&self, id: &NodeId) -> Result<Value, CoreError> {
        let options = ReconstructOptions::default();
        Reconstructor::new(self, &options).reconstruct(id)
    }

    /// [`documents`](Self::documents) serialized as a JSON array.
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(&self.documents()?)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(&self.documents()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{IdScheme, Ingestor};
    use crate::store::PropertyStore;
    use crate::value::{props, PropertyMap};
    use serde_json::json;

    fn n(id: &str) -> NodeId {
        NodeId::from(id)
    }

    fn ingest(docs: &[Value]) -> AstGraph {
        let mut graph = AstGraph::new();
        Ingestor::new(&mut graph, IdScheme::Ephemeral)
            .ingest_all(docs)
            .unwrap();
        graph
    }

    #[test]
    fn echo_statement_round_trips() {
        let doc = json!({
            "nodeType": "Stmt_Echo",
            "exprs": [{
                "nodeType": "Scalar_String",
                "value": "hello",
                "attributes": {"startLine": 1, "endLine": 1, "kind": 2, "rawValue": "'hello'"}
            }],
            "attributes": {"startLine": 1, "endLine": 1}
        });
        let graph = ingest(std::slice::from_ref(&doc));
        let docs = graph.documents().unwrap();
        // rawValue is not a reserved key so it surfaces at the top level.
        let expected = json!({
            "nodeType": "Stmt_Echo",
            "exprs": [{
                "nodeType": "Scalar_String",
                "value": "hello",
                "rawValue": "'hello'",
                "attributes": {"startLine": 1, "endLine": 1, "kind": 2}
            }],
            "attributes": {"startLine": 1, "endLine": 1}
        });
        assert_eq!(docs, vec![expected]);
    }

    #[test]
    fn expression_statement_has_single_expr_edge() {
        let doc = json!({
            "nodeType": "Stmt_Expression",
            "expr": {"nodeType": "Expr_Variable", "name": "x"}
        });
        let graph = ingest(std::slice::from_ref(&doc));
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.documents().unwrap(), vec![doc]);
    }

    #[test]
    fn output_key_order() {
        let doc = json!({
            "nodeType": "Stmt_Function",
            "attributes": {"startLine": 3},
            "byRef": false,
            "name": {"nodeType": "Identifier", "name": "f"},
            "params": [],
            "attrGroups": []
        });
        let graph = ingest(&[doc]);
        let out = graph.documents().unwrap().remove(0);
        let keys: Vec<&str> = out.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["nodeType", "byRef", "params", "attrGroups", "name", "attributes"]);
    }

    #[test]
    fn index_gap_becomes_null() {
        let mut graph = AstGraph::new();
        let mut m = graph.modifier();
        m.add_node(n("arr"), "Expr_Array", PropertyMap::new()).unwrap();
        m.add_node(n("x"), "ArrayItem", props([("byRef", json!(false))])).unwrap();
        m.add_node(n("y"), "ArrayItem", props([("byRef", json!(true))])).unwrap();
        m.add_edge(&n("arr"), &n("y"), "items", Some(2)).unwrap();
        m.add_edge(&n("arr"), &n("x"), "items", Some(0)).unwrap();

        let out = graph.reconstruct_node(&n("arr")).unwrap();
        assert_eq!(
            out,
            json!({
                "nodeType": "Expr_Array",
                "items": [
                    {"nodeType": "ArrayItem", "byRef": false},
                    null,
                    {"nodeType": "ArrayItem", "byRef": true}
                ]
            })
        );
    }

    #[test]
    fn null_elements_survive_round_trip() {
        let doc = json!({
            "nodeType": "Expr_List",
            "items": [null, {"nodeType": "ArrayItem", "byRef": false}]
        });
        let graph = ingest(std::slice::from_ref(&doc));
        assert_eq!(graph.documents().unwrap(), vec![doc]);
    }

    #[test]
    fn attr_groups_is_default_filled() {
        let mut graph = AstGraph::new();
        graph
            .modifier()
            .add_node(n("m"), "Stmt_ClassMethod", props([("flags", json!(1))]))
            .unwrap();
        let out = graph.reconstruct_node(&n("m")).unwrap();
        assert_eq!(out["attrGroups"], json!([]));

        let raw = Reconstructor::new(&graph, &ReconstructOptions::raw())
            .reconstruct(&n("m"))
            .unwrap();
        assert!(raw.get("attrGroups").is_none());
    }

    #[test]
    fn attr_groups_is_not_added_to_other_types() {
        let graph = ingest(&[json!({"nodeType": "Stmt_Nop"})]);
        assert_eq!(graph.documents().unwrap(), vec![json!({"nodeType": "Stmt_Nop"})]);
    }

    #[test]
    fn custom_attribute_keys() {
        let graph = ingest(&[json!({
            "nodeType": "Stmt_Nop",
            "attributes": {"startLine": 4, "docLabel": "x"}
        })]);
        let mut options = ReconstructOptions::default();
        options.attribute_keys.insert("docLabel".to_string());
        let out = graph.documents_with(&options).unwrap().remove(0);
        assert_eq!(out["attributes"], json!({"startLine": 4, "docLabel": "x"}));
    }

    #[test]
    fn roots_in_natural_order() {
        let docs: Vec<Value> = (0..12)
            .map(|i| {
                json!({
                    "nodeType": "Stmt_Echo",
                    "exprs": [{"nodeType": "Scalar_Int", "value": i}]
                })
            })
            .collect();
        let graph = ingest(&docs);
        assert_eq!(graph.documents().unwrap(), docs);
    }

    #[test]
    fn file_documents_only_include_statements() {
        let mut graph = AstGraph::new();
        let mut m = graph.modifier();
        m.add_node(NodeId::project(), "Project", PropertyMap::new()).unwrap();
        m.add_node(n("f"), "File", PropertyMap::new()).unwrap();
        m.add_node(n("doc"), "Comment_Doc", PropertyMap::new()).unwrap();
        m.add_edge(&NodeId::project(), &n("f"), "files", Some(0)).unwrap();
        m.add_edge(&n("f"), &n("doc"), "header", None).unwrap();
        let expected = vec![
            json!({"nodeType": "Stmt_Nop"}),
            json!({"nodeType": "Stmt_Echo", "exprs": []}),
        ];
        Ingestor::new(&mut graph, IdScheme::File("f".into()))
            .ingest_under(&n("f"), "stmts", &expected)
            .unwrap();

        assert_eq!(graph.file_documents(&n("f")).unwrap(), expected);
        assert_eq!(graph.documents().unwrap(), expected);
        assert_eq!(
            graph.to_json().unwrap(),
            r#"[{"nodeType":"Stmt_Nop"},{"nodeType":"Stmt_Echo","exprs":[]}]"#
        );
    }

    #[test]
    fn shared_child_is_corruption() {
        let mut store = PropertyStore::new();
        for id in ["a", "b", "c"] {
            store.add_node(n(id)).unwrap();
            store
                .set_node_properties(&n(id), props([("nodeType", json!("Stmt_Nop"))]))
                .unwrap();
        }
        for parent in ["a", "b"] {
            let edge = store
                .add_edge(&n(parent), &n("c"), crate::edge::EdgeKind::parent_of())
                .unwrap();
            store
                .set_edge_properties(&edge, props([("field", json!("stmts")), ("index", json!(0))]))
                .unwrap();
        }
        let graph = AstGraph::from_store(store);
        let options = ReconstructOptions::default();
        let result = Reconstructor::new(&graph, &options).reconstruct_many(&[n("a"), n("b")]);
        assert!(matches!(result, Err(CoreError::CorruptGraph { .. })));
    }

    #[test]
    fn out_of_range_index_is_corruption() {
        let mut store = PropertyStore::new();
        for id in ["arr", "x"] {
            store.add_node(n(id)).unwrap();
            store
                .set_node_properties(&n(id), props([("nodeType", json!("Expr_Array"))]))
                .unwrap();
        }
        let edge = store
            .add_edge(&n("arr"), &n("x"), crate::edge::EdgeKind::parent_of())
            .unwrap();
        store
            .set_edge_properties(
                &edge,
                props([("field", json!("items")), ("index", json!(u64::MAX))]),
            )
            .unwrap();
        let graph = AstGraph::from_store(store);
        assert!(matches!(
            graph.reconstruct_node(&n("arr")),
            Err(CoreError::CorruptGraph { .. })
        ));
    }

    #[test]
    fn non_string_type_is_corruption() {
        let mut store = PropertyStore::new();
        store.add_node(n("a")).unwrap();
        store
            .set_node_properties(&n("a"), props([("nodeType", json!(12))]))
            .unwrap();
        let graph = AstGraph::from_store(store);
        assert!(matches!(
            graph.reconstruct_node(&n("a")),
            Err(CoreError::CorruptGraph { .. })
        ));
    }

    #[test]
    fn missing_node_is_not_found() {
        let graph = AstGraph::new();
        assert!(matches!(
            graph.reconstruct_node(&n("nope")),
            Err(CoreError::NodeNotFound { .. })
        ));
    }
}
