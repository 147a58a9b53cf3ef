//! Writing generated artifacts to disk under timestamped names

use chrono::{DateTime, Utc};
use rigsmith_core::{ContentHash, Result};
use std::path::{Path, PathBuf};

/// A PSD written to disk
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedDocument {
    pub path: PathBuf,
    pub content_hash: ContentHash,
    /// Soft failures noticed while assembling (e.g. a part keyed to nothing)
    pub warnings: Vec<String>,
}

/// `<prefix>_<UTC timestamp>.<extension>`
pub fn timestamped_name(prefix: &str, extension: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}.{}", prefix, at.format("%Y%m%dT%H%M%S%3fZ"), extension)
}

/// Write `bytes` into `dir` under a fresh timestamped name, creating the
/// directory. Never overwrites an existing file.
pub fn write_timestamped(bytes: &[u8], dir: &Path, prefix: &str, extension: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let base = timestamped_name(prefix, extension, Utc::now());
    let mut path = dir.join(&base);
    let mut n = 1;
    while path.exists() {
        let stem = base.trim_end_matches(&format!(".{}", extension));
        path = dir.join(format!("{}-{}.{}", stem, n, extension));
        n += 1;
    }

    std::fs::write(&path, bytes)?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "wrote {}", extension);
    Ok(path)
}

/// Write a serialized PSD as `<prefix>_<timestamp>.psd`
pub fn write_document(bytes: &[u8], dir: &Path, prefix: &str) -> Result<ExportedDocument> {
    let path = write_timestamped(bytes, dir, prefix, "psd")?;
    Ok(ExportedDocument {
        path,
        content_hash: ContentHash::from_bytes(bytes),
        warnings: Vec::new(),
    })
}
