//! File content fingerprints for change detection
//!
//! Two modes are supported, selected by configuration:
//!
//! - `Hash`: SHA-256 over the file contents. Stable across no-op touches and
//!   immune to clock skew; costs one full read per file.
//! - `Metadata`: size plus modification time. Cheap, but a `touch` without an
//!   edit re-triggers processing and fast successive saves within the mtime
//!   granularity can be missed.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Which signature to compute per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintMode {
    /// SHA-256 content hash (default)
    #[default]
    Hash,

    /// File size + modification time
    Metadata,
}

/// Opaque, comparable signature of a file's content state.
///
/// Fingerprints are only meaningfully compared within the same role and
/// meeting identity, and only when both were produced in the same mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fingerprint {
    Sha256(String),
    Metadata { size: u64, modified_ms: u64 },
}

/// Compute the fingerprint for a file in the given mode.
pub fn fingerprint(path: &Path, mode: FingerprintMode) -> Result<Fingerprint> {
    match mode {
        FingerprintMode::Hash => hash_file(path),
        FingerprintMode::Metadata => metadata_fingerprint(path),
    }
}

fn hash_file(path: &Path) -> Result<Fingerprint> {
    let mut file = File::open(path)
        .map_err(|e| Error::Io(std::io::Error::new(e.kind(), format!("{}: {e}", path.display()))))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Fingerprint::Sha256(format!("{:x}", hasher.finalize())))
}

fn metadata_fingerprint(path: &Path) -> Result<Fingerprint> {
    let meta = std::fs::metadata(path)?;
    let modified_ms = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::Internal(format!("mtime before epoch for {}: {e}", path.display())))?
        .as_millis() as u64;
    Ok(Fingerprint::Metadata {
        size: meta.len(),
        modified_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_stable_for_unchanged_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"summary text").unwrap();

        let first = fingerprint(&path, FingerprintMode::Hash).unwrap();
        let second = fingerprint(&path, FingerprintMode::Hash).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_hash_changes_with_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"v1").unwrap();
        let first = fingerprint(&path, FingerprintMode::Hash).unwrap();

        std::fs::write(&path, b"v2").unwrap();
        let second = fingerprint(&path, FingerprintMode::Hash).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_hash_survives_touch_without_edit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"same").unwrap();
        let first = fingerprint(&path, FingerprintMode::Hash).unwrap();

        // Rewrite identical bytes (bumps mtime, keeps content).
        std::fs::write(&path, b"same").unwrap();
        let second = fingerprint(&path, FingerprintMode::Hash).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_metadata_tracks_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"123").unwrap();

        match fingerprint(&path, FingerprintMode::Metadata).unwrap() {
            Fingerprint::Metadata { size, .. } => assert_eq!(size, 3),
            other => panic!("expected metadata fingerprint, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = fingerprint(&dir.path().join("gone.pdf"), FingerprintMode::Hash).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
