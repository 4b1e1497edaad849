//! Pretty-printer facade: [`AstGraph`] -> PHP source.

use serde_json::Value;

use phpgraph_core::{AstGraph, NodeId, ReconstructOptions};

use crate::config::EngineConfig;
use crate::engine::SourceEngine;
use crate::error::EngineError;
use crate::provision::Provisioner;
use crate::runner::PhpRunner;

/// Reconstructs tree documents from a graph and renders them as source.
pub struct PrettyPrinter<E = PhpRunner> {
    engine: E,
    options: ReconstructOptions,
}

impl PrettyPrinter<PhpRunner> {
    /// A printer backed by the real PHP-Parser.
    pub fn from_config(
        config: &EngineConfig,
        provisioner: &Provisioner,
    ) -> Result<Self, EngineError> {
        Ok(PrettyPrinter::new(PhpRunner::from_config(config, provisioner)?))
    }
}

impl<E: SourceEngine> PrettyPrinter<E> {
    pub fn new(engine: E) -> Self {
        PrettyPrinter {
            engine,
            options: ReconstructOptions::default(),
        }
    }

    /// Replaces the reconstruction options (attribute keys, default fills).
    pub fn with_options(mut self, options: ReconstructOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ReconstructOptions {
        &self.options
    }

    /// Prints every top-level statement of the graph. For a project graph
    /// the files are concatenated in order into one listing.
    pub fn print(&self, graph: &AstGraph) -> Result<String, EngineError> {
        let documents = graph.documents_with(&self.options)?;
        self.print_documents(&documents)
    }

    /// Prints the statements of a single file node.
    pub fn print_file(&self, graph: &AstGraph, file: &NodeId) -> Result<String, EngineError> {
        let documents = graph.file_documents_with(file, &self.options)?;
        self.print_documents(&documents)
    }

    pub fn print_documents(&self, documents: &[Value]) -> Result<String, EngineError> {
        tracing::debug!("pretty-printing {} statement(s)", documents.len());
        self.engine.print(documents)
    }
}
