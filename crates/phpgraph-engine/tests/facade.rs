//! Integration tests for the parser and printer facades.
//!
//! `JsonEngine` stands in for PHP: the "source" it parses is the JSON array
//! of statement documents itself, and printing emits that JSON back. Source
//! starting with `SYNTAX` is rejected the way PHP-Parser rejects bad code.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use phpgraph_core::{AstGraph, NodeId, FILE_TYPE, PROJECT_TYPE};
use phpgraph_engine::{
    discover, path_fingerprint, EngineConfig, EngineError, Parser, PrettyPrinter, Provisioner,
    SourceEngine,
};

struct JsonEngine;

impl SourceEngine for JsonEngine {
    fn parse(&self, code: &str) -> Result<Vec<Value>, EngineError> {
        if code.starts_with("SYNTAX") {
            return Err(EngineError::Syntax {
                message: "Syntax error, unexpected EOF on line 1".into(),
                line: Some(1),
            });
        }
        Ok(serde_json::from_str(code)?)
    }

    fn print(&self, documents: &[Value]) -> Result<String, EngineError> {
        Ok(serde_json::to_string(documents)?)
    }
}

fn echo_stmts() -> Vec<Value> {
    vec![
        json!({
            "nodeType": "Stmt_Echo",
            "exprs": [{"nodeType": "Scalar_String", "value": "hi", "attributes": {"kind": 1}}],
            "attributes": {"startLine": 1, "endLine": 1}
        }),
        json!({"nodeType": "Stmt_Nop"}),
    ]
}

fn write_php(dir: &Path, name: &str, stmts: &[Value]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, serde_json::to_string(stmts).unwrap()).unwrap();
    path
}

fn str_prop<'g>(graph: &'g AstGraph, id: &NodeId, key: &str) -> &'g str {
    graph.node(id).unwrap().get_str(key).unwrap()
}

#[test]
fn parse_code_numbers_nodes_in_pre_order() {
    let parser = Parser::new(JsonEngine);
    let code = serde_json::to_string(&echo_stmts()).unwrap();
    let parsed = parser.parse_code(&code).unwrap();

    assert_eq!(
        parsed.roots,
        vec![NodeId::new("node_1"), NodeId::new("node_3")]
    );
    assert_eq!(parsed.graph.node_count(), 3);
    assert!(!parsed.graph.is_project());
    assert_eq!(
        str_prop(&parsed.graph, &NodeId::new("node_2"), "nodeType"),
        "Scalar_String"
    );
    assert_eq!(parsed.graph.documents().unwrap(), echo_stmts());
}

#[test]
fn parse_code_does_not_leak_between_calls() {
    let parser = Parser::new(JsonEngine);
    assert!(parser.parse_code("SYNTAX <?php echo").is_err());
    let parsed = parser.parse_code(r#"[{"nodeType":"Stmt_Nop"}]"#).unwrap();
    assert_eq!(parsed.roots, vec![NodeId::new("node_1")]);
}

#[test]
fn parse_file_builds_project_and_file_nodes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_php(dir.path(), "index.php", &echo_stmts());
    let canonical = fs::canonicalize(&path).unwrap();
    let fp = path_fingerprint(&canonical);

    let graph = Parser::new(JsonEngine).parse_file(&path).unwrap();
    assert!(graph.is_project());

    let project = NodeId::project();
    assert_eq!(str_prop(&graph, &project, "nodeType"), PROJECT_TYPE);
    assert_eq!(
        str_prop(&graph, &project, "path"),
        canonical.parent().unwrap().display().to_string()
    );

    let files = graph.file_ids().unwrap();
    assert_eq!(files, vec![NodeId::new(fp.clone())]);
    assert_eq!(str_prop(&graph, &files[0], "nodeType"), FILE_TYPE);
    assert_eq!(str_prop(&graph, &files[0], "label"), FILE_TYPE);
    assert_eq!(str_prop(&graph, &files[0], "path"), "index.php");
    assert_eq!(
        str_prop(&graph, &files[0], "filePath"),
        canonical.display().to_string()
    );

    assert_eq!(
        graph.file_statement_ids(&files[0]).unwrap(),
        vec![NodeId::new(format!("{fp}_1")), NodeId::new(format!("{fp}_3"))]
    );
    assert_eq!(graph.file_of(&NodeId::new(format!("{fp}_2"))).unwrap().id(), &files[0]);
    assert_eq!(graph.file_documents(&files[0]).unwrap(), echo_stmts());
}

#[test]
fn parse_project_orders_and_dedupes_files() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_php(dir.path(), "src/a.php", &[json!({"nodeType": "Stmt_Nop"})]);
    let b = write_php(dir.path(), "lib/b.php", &echo_stmts());

    let graph = Parser::new(JsonEngine)
        .parse_project(&[b.clone(), a.clone(), b.clone()], None)
        .unwrap();

    let files = graph.file_ids().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(str_prop(&graph, &files[0], "path"), "lib/b.php");
    assert_eq!(str_prop(&graph, &files[1], "path"), "src/a.php");
    assert_eq!(
        str_prop(&graph, &NodeId::project(), "path"),
        fs::canonicalize(dir.path()).unwrap().display().to_string()
    );

    // Statement numbering restarts per file.
    let fp_a = path_fingerprint(&fs::canonicalize(&a).unwrap());
    assert_eq!(
        graph.file_statement_ids(&files[1]).unwrap(),
        vec![NodeId::new(format!("{fp_a}_1"))]
    );

    let mut expected = echo_stmts();
    expected.push(json!({"nodeType": "Stmt_Nop"}));
    assert_eq!(graph.documents().unwrap(), expected);
}

#[test]
fn parse_project_with_explicit_root() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_php(dir.path(), "app/src/a.php", &[json!({"nodeType": "Stmt_Nop"})]);

    let graph = Parser::new(JsonEngine)
        .parse_project(&[a], Some(dir.path()))
        .unwrap();
    let files = graph.file_ids().unwrap();
    assert_eq!(str_prop(&graph, &files[0], "path"), "app/src/a.php");
}

#[test]
fn syntax_error_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_php(dir.path(), "good.php", &echo_stmts());
    let bad = dir.path().join("bad.php");
    fs::write(&bad, "SYNTAX <?php function (").unwrap();

    match Parser::new(JsonEngine).parse_project(&[good, bad], None) {
        Err(EngineError::Syntax { message, line }) => {
            assert!(message.contains("bad.php"), "{message}");
            assert!(message.contains("Syntax error"), "{message}");
            assert_eq!(line, Some(1));
        }
        other => panic!("expected Syntax, got {other:?}"),
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Parser::new(JsonEngine).parse_file(dir.path().join("nope.php"));
    assert!(matches!(result, Err(EngineError::Io(_))));
}

#[test]
fn parse_source_reads_nothing_from_disk() {
    let code = serde_json::to_string(&echo_stmts()).unwrap();
    let graph = Parser::new(JsonEngine)
        .parse_source(&code, "/virtual/app/main.php")
        .unwrap();

    let files = graph.file_ids().unwrap();
    assert_eq!(
        files,
        vec![NodeId::new(path_fingerprint(Path::new("/virtual/app/main.php")))]
    );
    assert_eq!(str_prop(&graph, &files[0], "path"), "main.php");
    assert_eq!(str_prop(&graph, &NodeId::project(), "path"), "/virtual/app");
}

#[test]
fn discover_finds_php_files_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    for name in ["b.php", "a.php", "sub/c.php", ".hidden/d.php", "notes.txt", "sub/skip.php"] {
        write_php(root, name, &[]);
    }

    let found = discover(root, |p| !p.ends_with("skip.php")).unwrap();
    let names: Vec<_> = found
        .iter()
        .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
        .collect();
    assert_eq!(
        names,
        vec![
            PathBuf::from("a.php"),
            PathBuf::from("b.php"),
            PathBuf::from("sub/c.php")
        ]
    );
}

#[test]
fn printer_round_trips_a_parsed_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_php(dir.path(), "index.php", &echo_stmts());

    let graph = Parser::new(JsonEngine).parse_file(&path).unwrap();
    let printer = PrettyPrinter::new(JsonEngine);
    let printed = printer.print(&graph).unwrap();
    assert_eq!(
        serde_json::from_str::<Vec<Value>>(&printed).unwrap(),
        echo_stmts()
    );

    let file = &graph.file_ids().unwrap()[0];
    assert_eq!(printer.print_file(&graph, file).unwrap(), printed);
}

#[test]
fn default_fill_reaches_the_printer() {
    let code = r#"[{"nodeType":"Stmt_Function",
        "name":{"nodeType":"Identifier","name":"f"},"stmts":[]}]"#;
    let parsed = Parser::new(JsonEngine).parse_code(code).unwrap();
    let printed = PrettyPrinter::new(JsonEngine).print(&parsed.graph).unwrap();
    let docs: Vec<Value> = serde_json::from_str(&printed).unwrap();
    assert_eq!(docs[0]["attrGroups"], json!([]));
    assert_eq!(docs[0]["name"]["name"], json!("f"));
}

/// Needs a PHP interpreter and the bundled archive (see `EngineConfig`).
#[test]
#[ignore]
fn real_php_round_trip() {
    let config = EngineConfig::from_env();
    let provisioner = Provisioner::from_config(&config);
    let parser = Parser::from_config(&config, &provisioner).unwrap();
    let printer = PrettyPrinter::from_config(&config, &provisioner).unwrap();

    let parsed = parser.parse_code("<?php\necho 'hi';\n").unwrap();
    assert_eq!(
        str_prop(&parsed.graph, &parsed.roots[0], "nodeType"),
        "Stmt_Echo"
    );
    let printed = printer.print(&parsed.graph).unwrap();
    assert!(printed.contains("echo 'hi';"), "{printed}");

    assert!(matches!(
        parser.parse_code("<?php function ("),
        Err(EngineError::Syntax { .. })
    ));
}
