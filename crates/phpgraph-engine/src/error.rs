//! Engine error types covering parsing, printing and provisioning failures.

use phpgraph_core::CoreError;

/// Errors raised at the boundary with the external PHP engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// PHP-Parser rejected the source. `message` is the parser's first
    /// error, prefixed with the file path when parsing a file or project.
    #[error("syntax error: {message}")]
    Syntax { message: String, line: Option<u64> },

    /// The PHP process could not run, exited nonzero or produced output that
    /// could not be decoded.
    #[error("PHP execution failed: {message}")]
    Execution {
        message: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    /// The bundled parser asset could not be located or unpacked.
    #[error("provisioning failed: {0}")]
    Provision(String),

    /// Filesystem I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Graph construction or reconstruction failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl EngineError {
    pub(crate) fn execution(message: impl Into<String>) -> Self {
        EngineError::Execution {
            message: message.into(),
            stderr: String::new(),
            exit_code: None,
        }
    }
}
