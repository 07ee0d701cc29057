// src/watch/invalidate.rs

//! Pre-run pass that marks file artifacts stale when their content changed.

use tracing::{debug, info, warn};

use crate::store::CacheStore;
use crate::types::Artifact;
use crate::watch::hash::compute_file_hash;

/// Re-hash every file artifact in `store` and invalidate the entries whose
/// content no longer matches. Unreadable files count as changed.
///
/// Entries that are not file artifacts are left alone; they become stale
/// only through their dependencies. Returns the number of invalidated
/// entries.
pub fn invalidate_changed_files(store: &CacheStore) -> usize {
    let fs = store.fs().as_ref();
    let mut invalidated = 0;

    for (signature, entry) in store.entries() {
        let Artifact::File { path, hash } = &entry.value else {
            continue;
        };

        match compute_file_hash(fs, path) {
            Ok(current) if current == *hash => {
                debug!(?path, "file artifact unchanged");
            }
            Ok(current) => {
                info!(?path, stored = %hash, computed = %current, "file artifact changed; invalidating");
                store.invalidate_signature(&signature);
                invalidated += 1;
            }
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(?path, error = %reason, "cannot hash file artifact; invalidating");
                store.invalidate_signature(&signature);
                invalidated += 1;
            }
        }
    }

    invalidated
}
