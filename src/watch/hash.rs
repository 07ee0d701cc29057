// src/watch/hash.rs

//! Content hashing for file artifacts.
//!
//! Staleness of file-backed results is decided by content, never by
//! modification time, so a `touch` or a clock-skewed checkout does not cause
//! a rebuild.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::trace;

use crate::fs::FileSystem;

/// Compute the blake3 hash of a single file, as lowercase hex.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("reading file for hashing: {:?}", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let hash = hasher.finalize().to_hex().to_string();
    trace!(?path, hash = %hash, "hashed file");
    Ok(hash)
}

/// Hash an in-memory string (used for call signatures).
pub fn hash_str(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}
