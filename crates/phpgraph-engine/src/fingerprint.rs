//! blake3 digests used for node-ID prefixes and asset change detection.

use std::fs::File;
use std::io;
use std::path::Path;

/// Hex digits kept from a path digest.
pub const FINGERPRINT_LEN: usize = 8;

/// Short, stable fingerprint of a file path: the first 8 hex characters of
/// the blake3 digest of the path string.
///
/// The caller is expected to pass an absolute path so the same file always
/// maps to the same fingerprint.
pub fn path_fingerprint(path: &Path) -> String {
    let digest = blake3::hash(path.to_string_lossy().as_bytes());
    digest.to_hex()[..FINGERPRINT_LEN].to_string()
}

/// Full blake3 hex digest of a file's contents.
pub fn file_digest(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}
