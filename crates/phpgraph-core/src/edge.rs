//! Edge identity and the structural edge payload.
//!
//! Every edge is keyed by the `(from, to, kind)` triple. The only kind the
//! AST mapping produces is [`EdgeKind::PARENT_OF`]; its property map carries
//! the parent's `field` name and, for array fields, the child's `index`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::NodeId;
use crate::value::PropertyMap;

/// Edge property naming the parent slot a child occupies.
pub const FIELD_KEY: &str = "field";

/// Edge property giving the child's position inside an array field.
pub const INDEX_KEY: &str = "index";

/// Largest index an array field may use. Reconstruction allocates a dense
/// array up to the highest index, so this also caps that allocation.
pub const MAX_INDEX: usize = 1 << 24;

/// Edge type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeKind(String);

impl EdgeKind {
    /// Structural containment, parent -> child.
    pub const PARENT_OF: &'static str = "PARENT_OF";

    pub fn new(kind: impl Into<String>) -> Self {
        EdgeKind(kind.into())
    }

    pub fn parent_of() -> Self {
        EdgeKind(Self::PARENT_OF.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_structural(&self) -> bool {
        self.0 == Self::PARENT_OF
    }
}

impl Default for EdgeKind {
    fn default() -> Self {
        Self::parent_of()
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Edge identity: the `(from, to, kind)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
}

impl EdgeId {
    pub fn new(from: NodeId, to: NodeId, kind: EdgeKind) -> Self {
        EdgeId { from, to, kind }
    }

    pub fn structural(from: NodeId, to: NodeId) -> Self {
        EdgeId::new(from, to, EdgeKind::parent_of())
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} -> {}, {})", self.from, self.to, self.kind)
    }
}

/// Decoded payload of a structural edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralEdge {
    pub field: String,
    /// `Some` for array fields, `None` for single-value fields.
    pub index: Option<usize>,
}

impl StructuralEdge {
    pub fn new(field: impl Into<String>, index: Option<usize>) -> Self {
        StructuralEdge {
            field: field.into(),
            index,
        }
    }

    /// Reads `field` / `index` out of an edge property map.
    ///
    /// Returns `None` when the map has no string `field`. A non-integer
    /// `index` is treated as absent.
    pub fn from_properties(props: &PropertyMap) -> Option<Self> {
        let field = props.get(FIELD_KEY)?.as_str()?.to_string();
        let index = props
            .get(INDEX_KEY)
            .and_then(Value::as_u64)
            .map(|i| i as usize);
        Some(StructuralEdge { field, index })
    }

    pub fn to_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert(FIELD_KEY.to_string(), Value::from(self.field.clone()));
        if let Some(index) = self.index {
            props.insert(INDEX_KEY.to_string(), Value::from(index));
        }
        props
    }
}
