//! Read-only accessor views over stored nodes and edges.
//!
//! [`NodeRef`] and [`EdgeRef`] borrow straight from the property store; they
//! hold no data of their own. Every PHP-Parser field, subnode scalar or
//! metadata attribute, is reached through the same dynamic `get`.

use serde_json::Value;

use crate::edge::{EdgeId, EdgeKind, StructuralEdge, FIELD_KEY, INDEX_KEY};
use crate::id::NodeId;
use crate::value::{PropertyMap, NODE_TYPE_KEY};

/// View of a single AST node.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'g> {
    id: &'g NodeId,
    properties: &'g PropertyMap,
}

impl<'g> NodeRef<'g> {
    pub(crate) fn new(id: &'g NodeId, properties: &'g PropertyMap) -> Self {
        NodeRef { id, properties }
    }

    pub fn id(&self) -> &'g NodeId {
        self.id
    }

    /// The PHP-Parser class tag, e.g. `Stmt_Function` or `Expr_Variable`.
    pub fn node_type(&self) -> Option<&'g str> {
        self.properties.get(NODE_TYPE_KEY).and_then(Value::as_str)
    }

    pub fn is_type(&self, node_type: &str) -> bool {
        self.node_type() == Some(node_type)
    }

    pub fn properties(&self) -> &'g PropertyMap {
        self.properties
    }

    pub fn get(&self, key: &str) -> Option<&'g Value> {
        self.properties.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&'g str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn start_line(&self) -> Option<i64> {
        self.int("startLine")
    }

    pub fn end_line(&self) -> Option<i64> {
        self.int("endLine")
    }

    pub fn start_file_pos(&self) -> Option<i64> {
        self.int("startFilePos")
    }

    pub fn end_file_pos(&self) -> Option<i64> {
        self.int("endFilePos")
    }

    pub fn start_token_pos(&self) -> Option<i64> {
        self.int("startTokenPos")
    }

    pub fn end_token_pos(&self) -> Option<i64> {
        self.int("endTokenPos")
    }

    /// Comment objects attached to this node by the parser.
    pub fn comments(&self) -> Option<&'g Vec<Value>> {
        self.get("comments").and_then(Value::as_array)
    }

    fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// View of a single edge.
#[derive(Debug, Clone)]
pub struct EdgeRef<'g> {
    id: EdgeId,
    properties: &'g PropertyMap,
}

impl<'g> EdgeRef<'g> {
    pub(crate) fn new(id: EdgeId, properties: &'g PropertyMap) -> Self {
        EdgeRef { id, properties }
    }

    pub fn id(&self) -> &EdgeId {
        &self.id
    }

    pub fn from(&self) -> &NodeId {
        &self.id.from
    }

    pub fn to(&self) -> &NodeId {
        &self.id.to
    }

    pub fn kind(&self) -> &EdgeKind {
        &self.id.kind
    }

    /// Parent slot name.
    pub fn field(&self) -> Option<&'g str> {
        self.properties.get(FIELD_KEY).and_then(Value::as_str)
    }

    /// Position inside an array field; `None` for single-value fields.
    pub fn index(&self) -> Option<usize> {
        self.properties
            .get(INDEX_KEY)
            .and_then(Value::as_u64)
            .map(|i| i as usize)
    }

    pub fn structural(&self) -> Option<StructuralEdge> {
        StructuralEdge::from_properties(self.properties)
    }

    pub fn properties(&self) -> &'g PropertyMap {
        self.properties
    }

    pub fn get(&self, key: &str) -> Option<&'g Value> {
        self.properties.get(key)
    }
}
