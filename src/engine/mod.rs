// src/engine/mod.rs

//! Incremental build engine.
//!
//! - [`key`] defines call keys and their structural signatures.
//! - [`guard`] deduplicates concurrent executions of the same key.
//! - [`context`] is the recorder tasks use to request other tasks.
//! - `run` holds the verify / execute / early-cutoff algorithm for a single
//!   top-level build.
//!
//! [`Engine`] ties these to a [`CacheStore`] and a [`TaskRegistry`].

pub mod context;
pub mod guard;
pub mod key;
mod run;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

pub use context::Context;
pub use guard::{ExecutionGuard, Operation};
pub use key::CallKey;

use crate::errors::Result;
use crate::registry::TaskRegistry;
use crate::store::CacheStore;
use crate::types::Artifact;
use crate::watch::invalidate::invalidate_changed_files;

use self::run::Run;

/// What a completed top-level build did.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Up-to-date value of the requested target.
    pub value: Artifact,
    /// Keys whose task bodies ran, in completion order.
    pub executed: Vec<CallKey>,
    /// File artifacts found changed by the pre-run invalidation pass.
    pub invalidated: usize,
    pub elapsed: Duration,
}

/// The build engine: a task registry plus a cache store.
///
/// Cloning is cheap; clones share the store and registry. One build runs at
/// a time.
#[derive(Debug, Clone)]
pub struct Engine {
    store: Arc<CacheStore>,
    registry: Arc<TaskRegistry>,
}

impl Engine {
    pub fn new(registry: TaskRegistry, store: CacheStore) -> Self {
        Self {
            store: Arc::new(store),
            registry: Arc::new(registry),
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Bring `target` up to date.
    ///
    /// Runs the file invalidation pass, then the recursive verify/execute
    /// algorithm, then persists the store. The store is persisted whether or
    /// not the build succeeded; a build failure takes precedence over a
    /// persistence failure in the returned error.
    pub async fn build(&self, target: &CallKey) -> Result<BuildReport> {
        let started = Instant::now();
        let invalidated = invalidate_changed_files(&self.store);

        let run = Arc::new(Run::new(
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
        ));
        let outcome = run.build(target.clone(), Arc::new(Vec::new())).await;
        let persisted = self.store.finalize();

        let value = match (outcome, persisted) {
            (Ok(value), Ok(())) => value,
            (Err(err), Err(persist_err)) => {
                warn!(error = %persist_err, "failed to persist cache after failed build");
                return Err(err);
            }
            (Err(err), Ok(())) | (Ok(_), Err(err)) => return Err(err),
        };

        let report = BuildReport {
            value,
            executed: run.executed(),
            invalidated,
            elapsed: started.elapsed(),
        };
        info!(
            target = %target,
            executed = report.executed.len(),
            invalidated,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "build finished"
        );
        Ok(report)
    }
}
