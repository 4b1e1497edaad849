//! PHP AST graph CLI.
//!
//! Provides the `phpgraph` binary: parse PHP into a property graph, print a
//! stored graph back to PHP, round-trip files through the graph, query nodes
//! by type and unpack the bundled PHP-Parser archive.
//!
//! Exit codes: 0 = success, 1 = PHP syntax error, 2 = engine or graph error,
//! 3 = I/O error.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser as ClapParser, Subcommand};

use phpgraph_core::{AstGraph, NodeId};
use phpgraph_engine::{discover, EngineConfig, EngineError, Parser, PrettyPrinter, Provisioner};

/// PHP AST property graph tools.
#[derive(ClapParser)]
#[command(name = "phpgraph", about = "PHP AST property graph tools")]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the `PHPGRAPH_*` environment variables.
#[derive(Args)]
struct EngineArgs {
    /// PHP interpreter to run PHP-Parser with.
    #[arg(long, global = true)]
    php: Option<PathBuf>,

    /// Directory holding php-parser.phar.gz.
    #[arg(long, global = true)]
    resources_dir: Option<PathBuf>,

    /// Directory the archive is unpacked into.
    #[arg(long, global = true)]
    vendor_dir: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Parse PHP files or directories into a graph and write it as JSON.
    Parse {
        /// Files, or directories searched for `.php` files.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Project root (default: deepest directory containing every input).
        #[arg(long)]
        root: Option<PathBuf>,

        /// Output file (default: stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Indent the JSON output.
        #[arg(long)]
        pretty: bool,
    },

    /// Print a graph written by `parse` back to PHP source.
    Print {
        /// Graph JSON file.
        graph: PathBuf,

        /// Print only this file node.
        #[arg(long)]
        file: Option<String>,
    },

    /// Parse a file and print it straight back.
    Roundtrip {
        /// PHP file.
        path: PathBuf,

        /// Emit the reconstructed statement documents instead of source.
        #[arg(long)]
        json: bool,
    },

    /// List nodes of a given type.
    Query {
        /// Files or directories to parse.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// PHP-Parser node type, e.g. `Stmt_Function`.
        #[arg(short = 't', long = "type")]
        node_type: String,

        /// Print each match's subtree as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Unpack the bundled PHP-Parser archive if needed.
    Provision,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = engine_config(&cli.engine);

    let exit_code = match cli.command {
        Commands::Parse {
            paths,
            root,
            output,
            pretty,
        } => run_parse(&config, &paths, root.as_deref(), output.as_deref(), pretty),
        Commands::Print { graph, file } => run_print(&config, &graph, file),
        Commands::Roundtrip { path, json } => run_roundtrip(&config, &path, json),
        Commands::Query {
            paths,
            node_type,
            json,
        } => run_query(&config, &paths, &node_type, json),
        Commands::Provision => run_provision(&config),
    };
    process::exit(exit_code);
}

fn engine_config(args: &EngineArgs) -> EngineConfig {
    let mut config = EngineConfig::from_env();
    if let Some(php) = &args.php {
        config = config.with_php_binary(php);
    }
    if let Some(dir) = &args.resources_dir {
        config = config.with_resources_dir(dir);
    }
    if let Some(dir) = &args.vendor_dir {
        config = config.with_vendor_dir(dir);
    }
    config
}

/// Execute the parse subcommand.
fn run_parse(
    config: &EngineConfig,
    paths: &[PathBuf],
    root: Option<&Path>,
    output: Option<&Path>,
    pretty: bool,
) -> i32 {
    let graph = match parse_paths(config, paths, root) {
        Ok(g) => g,
        Err(e) => return report(&e),
    };

    let json = if pretty {
        serde_json::to_string_pretty(&graph)
    } else {
        serde_json::to_string(&graph)
    };
    let json = match json {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Error: failed to serialize graph: {}", e);
            return 2;
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = fs::write(path, json) {
                eprintln!("Error: failed to write '{}': {}", path.display(), e);
                return 3;
            }
            eprintln!(
                "Wrote {} node(s), {} edge(s) to {}",
                graph.node_count(),
                graph.edge_count(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    0
}

/// Execute the print subcommand.
fn run_print(config: &EngineConfig, graph_path: &Path, file: Option<String>) -> i32 {
    let contents = match fs::read_to_string(graph_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {}", graph_path.display(), e);
            return 3;
        }
    };
    let graph: AstGraph = match serde_json::from_str(&contents) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error: '{}' is not a graph file: {}", graph_path.display(), e);
            return 2;
        }
    };

    let provisioner = Provisioner::from_config(config);
    let printed =
        PrettyPrinter::from_config(config, &provisioner).and_then(|printer| match &file {
            Some(id) => printer.print_file(&graph, &NodeId::new(id.as_str())),
            None => printer.print(&graph),
        });
    match printed {
        Ok(source) => {
            print!("{}", source);
            0
        }
        Err(e) => report(&e),
    }
}

/// Execute the roundtrip subcommand.
fn run_roundtrip(config: &EngineConfig, path: &Path, json: bool) -> i32 {
    let provisioner = Provisioner::from_config(config);
    let result = Parser::from_config(config, &provisioner).and_then(|parser| {
        let graph = parser.parse_file(path)?;
        tracing::info!(
            "{} parsed into {} node(s)",
            path.display(),
            graph.node_count()
        );
        if json {
            Ok(graph.to_json_pretty()?)
        } else {
            PrettyPrinter::new(parser.engine()).print(&graph)
        }
    });

    match result {
        Ok(out) => {
            if json {
                println!("{}", out);
            } else {
                print!("{}", out);
            }
            0
        }
        Err(e) => report(&e),
    }
}

/// Execute the query subcommand.
fn run_query(config: &EngineConfig, paths: &[PathBuf], node_type: &str, json: bool) -> i32 {
    let graph = match parse_paths(config, paths, None) {
        Ok(g) => g,
        Err(e) => return report(&e),
    };

    let matches = match graph.all_matching(|n| n.is_type(node_type)) {
        Ok(m) => m,
        Err(e) => return report(&EngineError::from(e)),
    };

    for node in &matches {
        let location = graph
            .file_of(node.id())
            .ok()
            .and_then(|f| f.get_str("path").map(str::to_string))
            .unwrap_or_default();
        let line = node
            .start_line()
            .map_or_else(|| "?".to_string(), |l| l.to_string());
        if json {
            match graph.reconstruct_node(node.id()) {
                Ok(doc) => println!("{}", doc),
                Err(e) => return report(&EngineError::from(e)),
            }
        } else {
            println!("{}\t{}:{}", node.id(), location, line);
        }
    }
    eprintln!("{} match(es)", matches.len());
    0
}

/// Execute the provision subcommand.
fn run_provision(config: &EngineConfig) -> i32 {
    let provisioner = Provisioner::from_config(config);
    match provisioner.ensure() {
        Ok(phar) => {
            println!("{}", phar.display());
            0
        }
        Err(e) => report(&e),
    }
}

/// Parses the given files and directories as one project.
fn parse_paths(
    config: &EngineConfig,
    paths: &[PathBuf],
    root: Option<&Path>,
) -> Result<AstGraph, EngineError> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(discover(path, |_| true)?);
        } else {
            files.push(path.clone());
        }
    }
    if files.is_empty() {
        return Err(EngineError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no .php files found",
        )));
    }

    let provisioner = Provisioner::from_config(config);
    let parser = Parser::from_config(config, &provisioner)?;
    parser.parse_project(&files, root)
}

/// Prints the error and maps it to an exit code.
fn report(error: &EngineError) -> i32 {
    eprintln!("Error: {}", error);
    match error {
        EngineError::Syntax { .. } => 1,
        EngineError::Io(_) => 3,
        EngineError::Execution { stderr, .. } => {
            if !stderr.trim().is_empty() {
                eprintln!("{}", stderr.trim());
            }
            2
        }
        _ => 2,
    }
}
