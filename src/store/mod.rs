// src/store/mod.rs

//! Cache store: call signature → cached result, dependencies and staleness.
//!
//! The store is loaded once per process (load-or-empty), shared with the
//! engine by `Arc`, and persisted with [`CacheStore::finalize`] at the end of
//! every build run. Entries are only ever added or overwritten; there is no
//! per-entry deletion.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::CallKey;
use crate::errors::{HashmakeError, Result};
use crate::fs::FileSystem;
use crate::types::Artifact;

/// One cached task result.
///
/// `stale` is never persisted; it is derived on load from `volatile` and
/// set by the invalidation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Artifact,
    #[serde(default)]
    pub volatile: bool,
    /// Calls made while producing `value`, in call order.
    #[serde(default)]
    pub dependencies: Vec<CallKey>,
    #[serde(skip)]
    pub stale: bool,
}

impl CacheEntry {
    /// A fresh entry as written right after an execution.
    pub fn new(value: Artifact, dependencies: Vec<CallKey>, volatile: bool) -> Self {
        Self {
            value,
            volatile,
            dependencies,
            stale: false,
        }
    }
}

/// On-disk layout: an ordered sequence of `(signature, entry)` pairs.
type Document = Vec<(String, CacheEntry)>;

#[derive(Debug)]
pub struct CacheStore {
    fs: Arc<dyn FileSystem>,
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, CacheEntry>>,
}

impl CacheStore {
    /// Load the store backed by the document at `path`.
    ///
    /// A missing or unparsable document yields an empty store. Volatile
    /// entries start stale so they are re-verified once in this process.
    pub fn open(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load_document(fs.as_ref(), &path);
        Self {
            fs,
            path: Some(path),
            entries: Mutex::new(entries),
        }
    }

    /// A store without a backing document; `finalize` is a no-op.
    pub fn in_memory(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            path: None,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn has(&self, key: &CallKey) -> bool {
        self.lock().contains_key(&key.signature())
    }

    pub fn get(&self, key: &CallKey) -> Option<CacheEntry> {
        self.lock().get(&key.signature()).cloned()
    }

    /// Insert or overwrite the entry for `key`.
    pub fn set(&self, key: &CallKey, entry: CacheEntry) {
        self.lock().insert(key.signature(), entry);
    }

    /// Mark the entry for `key` stale, keeping its value and dependencies.
    pub fn invalidate(&self, key: &CallKey) -> bool {
        self.invalidate_signature(&key.signature())
    }

    pub fn invalidate_signature(&self, signature: &str) -> bool {
        match self.lock().get_mut(signature) {
            Some(entry) => {
                entry.stale = true;
                true
            }
            None => false,
        }
    }

    /// Snapshot of all `(signature, entry)` pairs.
    pub fn entries(&self) -> Vec<(String, CacheEntry)> {
        self.lock()
            .iter()
            .map(|(signature, entry)| (signature.clone(), entry.clone()))
            .collect()
    }

    /// Paths of every file artifact currently recorded.
    pub fn file_artifacts(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .lock()
            .values()
            .filter_map(|entry| entry.value.path().map(Path::to_path_buf))
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stale_count(&self) -> usize {
        self.lock().values().filter(|entry| entry.stale).count()
    }

    /// Persist the store atomically (temp file + rename).
    pub fn finalize(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let document: Document = self
            .lock()
            .iter()
            .map(|(signature, entry)| (signature.clone(), entry.clone()))
            .collect();
        let persistence = |message: String| HashmakeError::Persistence {
            path: path.clone(),
            message,
        };

        let json = serde_json::to_vec(&document).map_err(|e| persistence(e.to_string()))?;
        let tmp = temp_path(path);
        self.fs
            .write(&tmp, &json)
            .map_err(|e| persistence(format!("{e:#}")))?;
        self.fs
            .rename(&tmp, path)
            .map_err(|e| persistence(format!("{e:#}")))?;

        debug!(?path, entries = document.len(), "persisted cache store");
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "cache".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn load_document(fs: &dyn FileSystem, path: &Path) -> BTreeMap<String, CacheEntry> {
    if !fs.exists(path) {
        info!(?path, "no cache store found; starting empty");
        return BTreeMap::new();
    }

    let parsed = fs
        .read_to_string(path)
        .and_then(|text| Ok(serde_json::from_str::<Document>(&text)?));

    match parsed {
        Ok(document) => {
            let entries: BTreeMap<String, CacheEntry> = document
                .into_iter()
                .map(|(signature, mut entry)| {
                    entry.stale = entry.volatile;
                    (signature, entry)
                })
                .collect();
            info!(?path, entries = entries.len(), "loaded cache store");
            entries
        }
        Err(err) => {
            warn!(?path, error = %err, "unreadable cache store; starting empty");
            BTreeMap::new()
        }
    }
}
