//! Boundary between the PHP AST graph and the outside world.
//!
//! The graph itself lives in `phpgraph-core` and never does I/O. This crate
//! supplies what turns PHP source into tree documents and back, and the
//! facades that wire those conversions to ingestion and reconstruction.
//!
//! # Modules
//!
//! - [`config`] -- Interpreter and archive locations
//! - [`provision`] -- One-time unpacking of the bundled PHP-Parser archive
//! - [`runner`] -- `php` subprocess running PHP-Parser
//! - [`engine`] -- The [`SourceEngine`] seam the facades are generic over
//! - [`parser`] -- Source, file and project parsing into an [`AstGraph`]
//! - [`printer`] -- Graph back to PHP source
//!
//! [`AstGraph`]: phpgraph_core::AstGraph

pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod parser;
pub mod printer;
pub mod provision;
pub mod runner;

pub use config::EngineConfig;
pub use engine::SourceEngine;
pub use error::EngineError;
pub use fingerprint::{file_digest, path_fingerprint, FINGERPRINT_LEN};
pub use parser::{build_project, common_root, discover, ParsedCode, Parser, SourceFile};
pub use printer::PrettyPrinter;
pub use provision::Provisioner;
pub use runner::{locate_php, PhpRunner};
