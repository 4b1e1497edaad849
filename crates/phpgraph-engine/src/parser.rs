//! Parser facade: PHP source -> [`AstGraph`].
//!
//! Three shapes of graph come out of here:
//!
//! - [`Parser::parse_code`]: bare statements with `node_{n}` IDs, no
//!   project or file nodes.
//! - [`Parser::parse_file`] / [`Parser::parse_source`]: a project node
//!   holding one `File` node.
//! - [`Parser::parse_project`]: a project node holding one `File` node per
//!   input, in input order.
//!
//! File node IDs are the path fingerprint; their statements are named
//! `{fingerprint}_{n}` with `n` restarting at 1 for every file.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use walkdir::WalkDir;

use phpgraph_core::{
    props, AstGraph, IdScheme, Ingestor, NodeId, FILES_FIELD, FILE_TYPE, PROJECT_TYPE,
    STMTS_FIELD,
};

use crate::config::EngineConfig;
use crate::engine::SourceEngine;
use crate::error::EngineError;
use crate::fingerprint::path_fingerprint;
use crate::provision::Provisioner;
use crate::runner::PhpRunner;

/// Result of [`Parser::parse_code`].
#[derive(Debug)]
pub struct ParsedCode {
    pub graph: AstGraph,
    /// Top-level statement IDs, in source order.
    pub roots: Vec<NodeId>,
}

/// One parsed input of a project.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Absolute path.
    pub path: PathBuf,
    pub documents: Vec<Value>,
}

/// Builds graphs from PHP source using a [`SourceEngine`].
pub struct Parser<E = PhpRunner> {
    engine: E,
}

impl Parser<PhpRunner> {
    /// A parser backed by the real PHP-Parser.
    pub fn from_config(
        config: &EngineConfig,
        provisioner: &Provisioner,
    ) -> Result<Self, EngineError> {
        Ok(Parser::new(PhpRunner::from_config(config, provisioner)?))
    }
}

impl<E: SourceEngine> Parser<E> {
    pub fn new(engine: E) -> Self {
        Parser { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Parses a code string into bare statements.
    pub fn parse_code(&self, code: &str) -> Result<ParsedCode, EngineError> {
        let documents = self.engine.parse(code)?;
        let mut graph = AstGraph::new();
        let roots = Ingestor::new(&mut graph, IdScheme::Ephemeral).ingest_all(&documents)?;
        Ok(ParsedCode { graph, roots })
    }

    /// Parses one file into a project graph rooted at the file's directory.
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<AstGraph, EngineError> {
        self.parse_project(&[path.as_ref()], None)
    }

    /// Parses a code string as if it were the file at `path`. Nothing is
    /// read from disk.
    pub fn parse_source(
        &self,
        code: &str,
        path: impl AsRef<Path>,
    ) -> Result<AstGraph, EngineError> {
        let path = absolute(path.as_ref())?;
        let documents = self.parse_at(code, &path)?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.clone());
        build_project(&root, &[SourceFile { path, documents }])
    }

    /// Parses several files into one project graph.
    ///
    /// Paths are canonicalized and duplicates dropped (first occurrence
    /// wins). `project_root` defaults to the deepest directory containing
    /// every input. Every file is parsed before the graph is built, so a
    /// syntax error in any of them yields no graph; the error names the file.
    pub fn parse_project<P: AsRef<Path>>(
        &self,
        paths: &[P],
        project_root: Option<&Path>,
    ) -> Result<AstGraph, EngineError> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let absolute = fs::canonicalize(path).map_err(|e| {
                io::Error::new(e.kind(), format!("{}: {}", path.display(), e))
            })?;
            if seen.insert(absolute.clone()) {
                resolved.push(absolute);
            }
        }

        let root = match project_root {
            Some(root) => fs::canonicalize(root)?,
            None => match common_root(&resolved) {
                Some(root) => root,
                None => std::env::current_dir()?,
            },
        };

        let mut files = Vec::with_capacity(resolved.len());
        for path in resolved {
            let code = fs::read_to_string(&path)?;
            let documents = self.parse_at(&code, &path)?;
            files.push(SourceFile { path, documents });
        }
        build_project(&root, &files)
    }

    /// Parses `code`, tagging a syntax error with `path`.
    fn parse_at(&self, code: &str, path: &Path) -> Result<Vec<Value>, EngineError> {
        self.engine.parse(code).map_err(|e| match e {
            EngineError::Syntax { message, line } => EngineError::Syntax {
                message: format!("{}: {}", path.display(), message),
                line,
            },
            other => other,
        })
    }
}

/// Assembles the project -> files -> statements skeleton from already parsed
/// inputs.
pub fn build_project(root: &Path, files: &[SourceFile]) -> Result<AstGraph, EngineError> {
    let mut graph = AstGraph::new();
    let project = NodeId::project();
    graph.modifier().add_node(
        project.clone(),
        PROJECT_TYPE,
        props([
            ("label", Value::from(PROJECT_TYPE)),
            ("path", Value::from(root.display().to_string())),
        ]),
    )?;

    for (position, file) in files.iter().enumerate() {
        let fingerprint = path_fingerprint(&file.path);
        let file_id = NodeId::new(fingerprint.clone());
        let relative = match file.path.strip_prefix(root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => PathBuf::from(file.path.file_name().unwrap_or_default()),
        };

        let mut m = graph.modifier();
        m.add_node(
            file_id.clone(),
            FILE_TYPE,
            props([
                ("label", Value::from(FILE_TYPE)),
                ("filePath", Value::from(file.path.display().to_string())),
                ("path", Value::from(relative.display().to_string())),
            ]),
        )?;
        m.add_edge(&project, &file_id, FILES_FIELD, Some(position))?;

        Ingestor::new(&mut graph, IdScheme::File(fingerprint))
            .ingest_under(&file_id, STMTS_FIELD, &file.documents)?;
    }

    tracing::debug!(
        "built project graph for {} file(s) under {}: {} node(s)",
        files.len(),
        root.display(),
        graph.node_count()
    );
    Ok(graph)
}

/// Deepest directory containing every path, or `None` for no input.
pub fn common_root(paths: &[PathBuf]) -> Option<PathBuf> {
    let mut dirs = paths.iter().map(|p| p.parent().unwrap_or(p.as_path()));
    let mut root = dirs.next()?.to_path_buf();
    for dir in dirs {
        while !dir.starts_with(&root) {
            root = root.parent()?.to_path_buf();
        }
    }
    Some(root)
}

/// `.php` files under `dir` accepted by `filter`, sorted by path. Hidden
/// directories are skipped.
pub fn discover<F>(dir: &Path, mut filter: F) -> Result<Vec<PathBuf>, EngineError>
where
    F: FnMut(&Path) -> bool,
{
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        });

    let mut found = Vec::new();
    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        let path = entry.path();
        let is_php = path.extension().map_or(false, |ext| ext == "php");
        if entry.file_type().is_file() && is_php && filter(path) {
            found.push(path.to_path_buf());
        }
    }
    Ok(found)
}

fn absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
