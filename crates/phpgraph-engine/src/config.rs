//! Engine configuration.
//!
//! Values come from defaults, then environment variables:
//! - `PHPGRAPH_PHP_BINARY`: PHP interpreter (default: `php` looked up on `PATH`)
//! - `PHPGRAPH_RESOURCES_DIR`: directory holding `php-parser.phar.gz`
//!   (default: `resources/` next to this crate)
//! - `PHPGRAPH_VENDOR_DIR`: directory the archive is unpacked into
//!   (default: `vendor/` next to this crate)
//!
//! Callers such as the CLI apply their own overrides on top with the
//! `with_*` builders.

use std::path::{Path, PathBuf};

pub const PHP_BINARY_ENV: &str = "PHPGRAPH_PHP_BINARY";
pub const RESOURCES_DIR_ENV: &str = "PHPGRAPH_RESOURCES_DIR";
pub const VENDOR_DIR_ENV: &str = "PHPGRAPH_VENDOR_DIR";

/// Where to find PHP and the PHP-Parser archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Explicit interpreter path; `None` searches `PATH`.
    pub php_binary: Option<PathBuf>,
    pub resources_dir: PathBuf,
    pub vendor_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let base = Path::new(env!("CARGO_MANIFEST_DIR"));
        EngineConfig {
            php_binary: None,
            resources_dir: base.join("resources"),
            vendor_dir: base.join("vendor"),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by any `PHPGRAPH_*` variables that are set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key).map(PathBuf::from))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<PathBuf>) -> Self {
        let mut config = EngineConfig::default();
        if let Some(php) = lookup(PHP_BINARY_ENV) {
            config.php_binary = Some(php);
        }
        if let Some(dir) = lookup(RESOURCES_DIR_ENV) {
            config.resources_dir = dir;
        }
        if let Some(dir) = lookup(VENDOR_DIR_ENV) {
            config.vendor_dir = dir;
        }
        config
    }

    pub fn with_php_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.php_binary = Some(path.into());
        self
    }

    pub fn with_resources_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resources_dir = dir.into();
        self
    }

    pub fn with_vendor_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.vendor_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (PHP_BINARY_ENV, "/opt/php/bin/php"),
            (VENDOR_DIR_ENV, "/tmp/vendor"),
        ]);
        let config = EngineConfig::from_lookup(|k| vars.get(k).map(PathBuf::from));

        assert_eq!(config.php_binary, Some(PathBuf::from("/opt/php/bin/php")));
        assert_eq!(config.vendor_dir, PathBuf::from("/tmp/vendor"));
        assert_eq!(config.resources_dir, EngineConfig::default().resources_dir);
    }

    #[test]
    fn builders_override() {
        let config = EngineConfig::default()
            .with_php_binary("php8.3")
            .with_resources_dir("res")
            .with_vendor_dir("out");
        assert_eq!(config.php_binary, Some(PathBuf::from("php8.3")));
        assert_eq!(config.resources_dir, PathBuf::from("res"));
        assert_eq!(config.vendor_dir, PathBuf::from("out"));
    }
}
