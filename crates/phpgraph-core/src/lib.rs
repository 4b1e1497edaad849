pub mod id;
pub mod value;
pub mod edge;
pub mod error;
pub mod store;
pub mod node;
pub mod graph;
pub mod modifier;
pub mod ingest;
pub mod reconstruct;

// Re-export commonly used types
pub use id::{natural_cmp, NodeId, EPHEMERAL_PREFIX, PROJECT_ID};
pub use value::{
    is_node_document, props, PropertyMap, PropertyValue, ATTRIBUTES_KEY, NODE_TYPE_KEY,
};
pub use edge::{EdgeId, EdgeKind, StructuralEdge, MAX_INDEX};
pub use error::CoreError;
pub use store::{PropertyStore, StoredEdge};
pub use node::{EdgeRef, NodeRef};
pub use graph::{
    Ancestors, AstGraph, Descendants, FILES_FIELD, FILE_TYPE, PROJECT_TYPE, STMTS_FIELD,
};
pub use modifier::Modifier;
pub use ingest::{IdScheme, Ingestor};
pub use reconstruct::{DefaultFill, ReconstructOptions, Reconstructor};
