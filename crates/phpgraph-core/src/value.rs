//! Property values.
//!
//! Node and edge properties are schema-free: an insertion-ordered map from
//! key to JSON value. Scalars, scalar arrays and metadata payloads (such as
//! comment lists) all live in the same map.

use indexmap::IndexMap;
use serde_json::Value;

/// A single property value.
pub type PropertyValue = Value;

/// Ordered key -> value map stored on every node and edge.
pub type PropertyMap = IndexMap<String, PropertyValue>;

/// Reserved property key holding a node's type tag.
pub const NODE_TYPE_KEY: &str = "nodeType";

/// Key of the nested metadata sub-object in a tree document.
pub const ATTRIBUTES_KEY: &str = "attributes";

/// Returns `true` if `value` is an object carrying a string type tag, i.e.
/// something ingestion turns into a node.
pub fn is_node_document(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|obj| obj.get(NODE_TYPE_KEY))
        .map_or(false, Value::is_string)
}

/// Builds a property map from `(key, value)` pairs.
pub fn props<K, V, I>(pairs: I) -> PropertyMap
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
