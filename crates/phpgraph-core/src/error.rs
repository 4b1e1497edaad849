//! Core error types for phpgraph-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering every
//! failure mode of the property store, the query and mutation layers, and
//! the two conversion algorithms.

use thiserror::Error;

use crate::edge::EdgeId;
use crate::id::NodeId;

/// Core errors produced by the phpgraph-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A node ID was not found in the graph.
    #[error("node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// An edge triple was not found in the graph.
    #[error("edge not found: {id}")]
    EdgeNotFound { id: EdgeId },

    /// A node with this ID already exists.
    #[error("node already exists: {id}")]
    DuplicateNode { id: NodeId },

    /// An edge with this exact triple already exists.
    #[error("edge already exists: {id}")]
    DuplicateEdge { id: EdgeId },

    /// An edge violates the structural contract (missing field name, second
    /// parent, mixed indexed and non-indexed children in one field).
    #[error("invalid edge: {reason}")]
    InvalidEdge { reason: String },

    /// Attempt to overwrite a node's type tag after creation.
    #[error("node type is immutable: {id}")]
    ImmutableType { id: NodeId },

    /// The node has no `File` ancestor.
    #[error("node is not contained in a file: {id}")]
    NodeNotInFile { id: NodeId },

    /// The graph is no longer a tree, or a node carries a malformed type tag.
    #[error("corrupt graph: {reason}")]
    CorruptGraph { reason: String },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
