//! The seam between the graph facades and whatever turns PHP source into
//! tree documents and back.

use std::sync::Arc;

use serde_json::Value;

use crate::error::EngineError;
use crate::runner::PhpRunner;

/// Source <-> tree document conversion.
pub trait SourceEngine {
    /// Parses PHP source into its top-level statement documents.
    fn parse(&self, code: &str) -> Result<Vec<Value>, EngineError>;

    /// Renders statement documents back to PHP source.
    fn print(&self, documents: &[Value]) -> Result<String, EngineError>;
}

impl SourceEngine for PhpRunner {
    fn parse(&self, code: &str) -> Result<Vec<Value>, EngineError> {
        PhpRunner::parse(self, code)
    }

    fn print(&self, documents: &[Value]) -> Result<String, EngineError> {
        let json = serde_json::to_string(documents)?;
        PhpRunner::print(self, &json)
    }
}

impl<E: SourceEngine + ?Sized> SourceEngine for &E {
    fn parse(&self, code: &str) -> Result<Vec<Value>, EngineError> {
        (**self).parse(code)
    }

    fn print(&self, documents: &[Value]) -> Result<String, EngineError> {
        (**self).print(documents)
    }
}

impl<E: SourceEngine + ?Sized> SourceEngine for Arc<E> {
    fn parse(&self, code: &str) -> Result<Vec<Value>, EngineError> {
        (**self).parse(code)
    }

    fn print(&self, documents: &[Value]) -> Result<String, EngineError> {
        (**self).print(documents)
    }
}
