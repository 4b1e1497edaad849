//! Provisioning of the bundled PHP-Parser archive.
//!
//! The parser ships as `php-parser.phar.gz` in the resources directory. On
//! first use it is gunzipped into the vendor directory and a `.extracted`
//! marker recording the archive's blake3 digest is written next to it. Later
//! runs compare the marker with the archive and skip extraction when they
//! match.
//!
//! Extraction is serialized twice: a mutex inside the [`Provisioner`] for
//! threads of one process, and an exclusive `fs2` lock on `vendor/.lock` for
//! concurrent processes sharing the vendor directory.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use flate2::read::GzDecoder;
use fs2::FileExt;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::fingerprint::file_digest;

/// Archive name inside the resources directory.
pub const ASSET_NAME: &str = "php-parser.phar.gz";

/// Unpacked archive name inside the vendor directory.
pub const PHAR_NAME: &str = "php-parser.phar";

/// Marker holding the digest of the archive last extracted.
pub const MARKER_NAME: &str = ".extracted";

const LOCK_NAME: &str = ".lock";

/// Ensures the parser archive is unpacked, once per process.
///
/// Construct one at startup and share it (by reference or `Arc`).
#[derive(Debug)]
pub struct Provisioner {
    resources_dir: PathBuf,
    vendor_dir: PathBuf,
    /// Set once extraction is confirmed; holds the phar path.
    ready: Mutex<Option<PathBuf>>,
}

impl Provisioner {
    pub fn new(resources_dir: impl Into<PathBuf>, vendor_dir: impl Into<PathBuf>) -> Self {
        Provisioner {
            resources_dir: resources_dir.into(),
            vendor_dir: vendor_dir.into(),
            ready: Mutex::new(None),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.resources_dir.clone(), config.vendor_dir.clone())
    }

    pub fn asset_path(&self) -> PathBuf {
        self.resources_dir.join(ASSET_NAME)
    }

    pub fn phar_path(&self) -> PathBuf {
        self.vendor_dir.join(PHAR_NAME)
    }

    fn marker_path(&self) -> PathBuf {
        self.vendor_dir.join(MARKER_NAME)
    }

    /// `true` if the vendor directory holds an extraction of the current
    /// archive.
    pub fn is_provisioned(&self) -> Result<bool, EngineError> {
        let digest = self.asset_digest()?;
        Ok(self.marker_matches(&digest))
    }

    /// Unpacks the archive if needed and returns the phar path.
    ///
    /// Idempotent; after the first success in this process the call returns
    /// without touching the filesystem.
    pub fn ensure(&self) -> Result<PathBuf, EngineError> {
        let mut ready = self
            .ready
            .lock()
            .map_err(|_| EngineError::Provision("provisioning state lock poisoned".into()))?;
        if let Some(path) = ready.as_ref() {
            return Ok(path.clone());
        }

        let digest = self.asset_digest()?;
        if !self.marker_matches(&digest) {
            self.extract_locked(&digest)?;
        }

        let phar = self.phar_path();
        *ready = Some(phar.clone());
        Ok(phar)
    }

    fn asset_digest(&self) -> Result<String, EngineError> {
        let asset = self.asset_path();
        if !asset.is_file() {
            return Err(EngineError::Provision(format!(
                "bundled parser archive not found at {}",
                asset.display()
            )));
        }
        Ok(file_digest(&asset)?)
    }

    fn marker_matches(&self, digest: &str) -> bool {
        match fs::read_to_string(self.marker_path()) {
            Ok(stored) => stored.trim() == digest && self.phar_path().is_file(),
            Err(_) => false,
        }
    }

    fn extract_locked(&self, digest: &str) -> Result<(), EngineError> {
        fs::create_dir_all(&self.vendor_dir)?;
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.vendor_dir.join(LOCK_NAME))?;
        lock.lock_exclusive()?;

        // Another process may have finished while we waited.
        let result = if self.marker_matches(digest) {
            Ok(())
        } else {
            self.extract(digest)
        };
        FileExt::unlock(&lock)?;
        result
    }

    fn extract(&self, digest: &str) -> Result<(), EngineError> {
        let asset = self.asset_path();
        tracing::info!(
            "extracting {} into {}",
            asset.display(),
            self.vendor_dir.display()
        );

        let partial = self.vendor_dir.join(format!("{PHAR_NAME}.partial"));
        let unpacked =
            gunzip(&asset, &partial).and_then(|_| fs::rename(&partial, self.phar_path()));
        if let Err(e) = unpacked {
            let _ = fs::remove_file(&partial);
            return Err(EngineError::Provision(format!(
                "failed to extract {}: {}",
                asset.display(),
                e
            )));
        }

        fs::write(self.marker_path(), digest)?;
        Ok(())
    }
}

fn gunzip(source: &Path, target: &Path) -> io::Result<u64> {
    let mut decoder = GzDecoder::new(File::open(source)?);
    let mut out = File::create(target)?;
    io::copy(&mut decoder, &mut out)
}
