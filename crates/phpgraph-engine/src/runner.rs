//! PHP subprocess runner.
//!
//! Each call spawns `php -r <script>` with the payload on stdin and reads the
//! result from stdout. The parse script emits PHP-Parser's JSON dump of the
//! statement list; the print script decodes such a dump and pretty-prints it.
//! Both report failures as a JSON object (`{"errors": [...]}` for syntax
//! errors, `{"error": "..."}` for anything else) and exit with status 1.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use serde_json::Value;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::provision::Provisioner;

/// Runs PHP-Parser through a PHP interpreter.
#[derive(Debug, Clone)]
pub struct PhpRunner {
    php_binary: PathBuf,
    phar_path: PathBuf,
}

impl PhpRunner {
    pub fn new(php_binary: impl Into<PathBuf>, phar_path: impl Into<PathBuf>) -> Self {
        PhpRunner {
            php_binary: php_binary.into(),
            phar_path: phar_path.into(),
        }
    }

    /// Provisions the parser archive and locates the interpreter.
    pub fn from_config(
        config: &EngineConfig,
        provisioner: &Provisioner,
    ) -> Result<Self, EngineError> {
        let phar_path = provisioner.ensure()?;
        let php_binary = locate_php(config.php_binary.as_deref())?;
        Ok(Self::new(php_binary, phar_path))
    }

    pub fn php_binary(&self) -> &Path {
        &self.php_binary
    }

    /// Parses PHP source into a list of top-level statement documents.
    pub fn parse(&self, code: &str) -> Result<Vec<Value>, EngineError> {
        let output = self.execute(&self.parse_script(), code)?;
        decode_parse_output(
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
            output.status.code(),
        )
    }

    /// Pretty-prints a JSON array of statement documents as PHP source.
    pub fn print(&self, ast_json: &str) -> Result<String, EngineError> {
        let output = self.execute(&self.print_script(), ast_json)?;
        decode_print_output(
            String::from_utf8_lossy(&output.stdout).into_owned(),
            &String::from_utf8_lossy(&output.stderr),
            output.status.code(),
        )
    }

    /// Runs `php -r script`, feeding `stdin`. Returns the raw output
    /// regardless of exit status.
    pub fn execute(&self, script: &str, stdin: &str) -> Result<Output, EngineError> {
        let mut child = Command::new(&self.php_binary)
            .arg("-r")
            .arg(script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::Execution {
                message: format!("failed to start {}: {}", self.php_binary.display(), e),
                stderr: e.to_string(),
                exit_code: None,
            })?;

        // Feed stdin from a separate thread so a large payload cannot
        // deadlock against a full stdout pipe.
        let writer = child.stdin.take().map(|mut pipe| {
            let input = stdin.to_owned();
            std::thread::spawn(move || pipe.write_all(input.as_bytes()))
        });
        let output = child.wait_with_output()?;
        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                // The script may exit before reading everything; its own
                // output decides success.
                Ok(Err(e)) => tracing::warn!("PHP stdin write ended early: {}", e),
                Err(_) => return Err(EngineError::execution("stdin writer thread panicked")),
            }
        }
        Ok(output)
    }

    fn parse_script(&self) -> String {
        format!(
            r#"
error_reporting(E_ALL & ~E_DEPRECATED);
require_once 'phar://{phar}/vendor/autoload.php';

use PhpParser\ParserFactory;
use PhpParser\ErrorHandler\Collecting;

$code = file_get_contents('php://stdin');
$errorHandler = new Collecting();
$parser = (new ParserFactory())->createForNewestSupportedVersion();

try {{
    $stmts = $parser->parse($code, $errorHandler);
    if ($errorHandler->hasErrors()) {{
        $errors = array_map(fn($e) => [
            'message' => $e->getMessage(),
            'line' => $e->getStartLine()
        ], $errorHandler->getErrors());
        echo json_encode(['errors' => $errors]);
        exit(1);
    }}
    echo json_encode($stmts);
}} catch (Throwable $e) {{
    echo json_encode(['error' => $e->getMessage()]);
    exit(1);
}}
"#,
            phar = self.phar_path.display()
        )
    }

    fn print_script(&self) -> String {
        format!(
            r#"
error_reporting(E_ALL & ~E_DEPRECATED);
require_once 'phar://{phar}/vendor/autoload.php';

use PhpParser\JsonDecoder;
use PhpParser\PrettyPrinter\Standard;

$json = file_get_contents('php://stdin');

try {{
    $stmts = (new JsonDecoder())->decode($json);
    echo (new Standard())->prettyPrintFile($stmts);
}} catch (Throwable $e) {{
    echo json_encode(['error' => $e->getMessage()]);
    exit(1);
}}
"#,
            phar = self.phar_path.display()
        )
    }
}

/// Resolves the PHP interpreter: the configured path if given, else the
/// first `php` on `PATH`.
pub fn locate_php(configured: Option<&Path>) -> Result<PathBuf, EngineError> {
    if let Some(path) = configured {
        // A bare name such as `php8.3` is looked up on PATH like the default.
        if path.components().count() == 1 && !path.is_file() {
            return search_path(&path.to_string_lossy());
        }
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(EngineError::execution(format!(
            "PHP binary not found at {}",
            path.display()
        )));
    }
    search_path("php")
}

fn search_path(name: &str) -> Result<PathBuf, EngineError> {
    let candidates: Vec<String> = if cfg!(windows) {
        vec![format!("{name}.exe"), name.to_string()]
    } else {
        vec![name.to_string()]
    };
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    std::env::split_paths(&path_var)
        .flat_map(|dir| candidates.iter().map(move |c| dir.join(c)))
        .find(|p| p.is_file())
        .ok_or_else(|| {
            EngineError::execution(format!(
                "PHP binary '{name}' not found in PATH. Please install PHP."
            ))
        })
}

/// Interprets the parse script's output.
///
/// A JSON array is the statement list; a lone node object is wrapped in a
/// one-element list.
pub(crate) fn decode_parse_output(
    stdout: &str,
    stderr: &str,
    exit_code: Option<i32>,
) -> Result<Vec<Value>, EngineError> {
    let decoded = serde_json::from_str::<Value>(stdout.trim());

    if let Ok(Value::Object(obj)) = &decoded {
        if let Some(Value::Array(errors)) = obj.get("errors").filter(|e| {
            e.as_array().map_or(false, |errors| !errors.is_empty())
        }) {
            let first = errors.first();
            let message = first
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown parse error")
                .to_string();
            let line = first.and_then(|e| e.get("line")).and_then(Value::as_u64);
            return Err(EngineError::Syntax { message, line });
        }
        if let Some(error) = obj.get("error") {
            return Err(EngineError::Execution {
                message: error.as_str().map_or_else(|| error.to_string(), str::to_string),
                stderr: stderr.to_string(),
                exit_code,
            });
        }
    }

    if exit_code != Some(0) {
        tracing::error!("PHP exited with {:?}: {}", exit_code, stderr.trim());
        return Err(EngineError::Execution {
            message: format!("PHP exited with status {exit_code:?}"),
            stderr: stderr.to_string(),
            exit_code,
        });
    }

    match decoded {
        Ok(Value::Array(stmts)) => Ok(stmts),
        Ok(obj @ Value::Object(_)) => Ok(vec![obj]),
        Ok(other) => Err(EngineError::Execution {
            message: format!("unexpected parser output: {other}"),
            stderr: stderr.to_string(),
            exit_code,
        }),
        Err(e) => Err(EngineError::Execution {
            message: format!("failed to decode PHP-Parser JSON output: {e}"),
            stderr: stderr.to_string(),
            exit_code,
        }),
    }
}

/// Interprets the print script's output.
pub(crate) fn decode_print_output(
    stdout: String,
    stderr: &str,
    exit_code: Option<i32>,
) -> Result<String, EngineError> {
    if exit_code == Some(0) {
        return Ok(stdout);
    }
    let message = match serde_json::from_str::<Value>(stdout.trim()) {
        Ok(Value::Object(obj)) => obj
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
    .unwrap_or_else(|| format!("PHP exited with status {exit_code:?}"));
    tracing::error!("pretty-printing failed: {}", message);
    Err(EngineError::Execution {
        message,
        stderr: stderr.to_string(),
        exit_code,
    })
}
