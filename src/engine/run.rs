// src/engine/run.rs

//! One top-level build run: verify, execute, early cutoff.
//!
//! Per key the engine knows three states: absent (execute unconditionally),
//! cached-stale (re-execute) and cached-fresh (verify the recorded
//! dependencies, re-execute only if one of them reports a change). A node
//! reports a change only when its re-executed value differs from the cached
//! one, which stops propagation at nodes that recompute the same value.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tracing::{debug, error, info, trace};

use crate::engine::guard::{ExecutionGuard, Operation};
use crate::engine::{CallKey, Context};
use crate::errors::{HashmakeError, Result};
use crate::fs::FileSystem;
use crate::registry::TaskRegistry;
use crate::store::{CacheEntry, CacheStore};
use crate::types::Artifact;

type Chain = Arc<Vec<String>>;

/// Outcome of verifying a cached node.
#[derive(Debug, Clone)]
pub(crate) struct Verdict {
    pub changed: bool,
    pub value: Artifact,
}

pub(crate) struct Run {
    store: Arc<CacheStore>,
    registry: Arc<TaskRegistry>,
    executions: ExecutionGuard<Artifact>,
    verifications: ExecutionGuard<Verdict>,
    /// Settled verdicts by signature. The first verdict for a key wins, so a
    /// change seen once in this run is seen by every later dependent.
    verdicts: Mutex<HashMap<String, Verdict>>,
    executed: Mutex<Vec<CallKey>>,
}

impl Run {
    pub(crate) fn new(store: Arc<CacheStore>, registry: Arc<TaskRegistry>) -> Self {
        Self {
            store,
            registry,
            executions: ExecutionGuard::new(),
            verifications: ExecutionGuard::new(),
            verdicts: Mutex::new(HashMap::new()),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fs(&self) -> &Arc<dyn FileSystem> {
        self.store.fs()
    }

    /// Keys whose task bodies ran during this run, in completion order.
    pub(crate) fn executed(&self) -> Vec<CallKey> {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Return the up-to-date value of `key`.
    pub(crate) fn build(self: &Arc<Self>, key: CallKey, chain: Chain) -> BoxFuture<'static, Result<Artifact>> {
        let run = Arc::clone(self);
        async move {
            if !run.store.has(&key) {
                let value = run.execute_once(key.clone(), chain).await?;
                let verdict = run.settle(
                    &key,
                    Verdict {
                        changed: true,
                        value,
                    },
                );
                return Ok(verdict.value);
            }
            Ok(run.verify_once(key, chain).await?.value)
        }
        .boxed()
    }

    fn verify_once(self: &Arc<Self>, key: CallKey, chain: Chain) -> BoxFuture<'static, Result<Verdict>> {
        let run = Arc::clone(self);
        async move {
            if let Some(verdict) = run.settled(&key) {
                return Ok(verdict);
            }
            let guarded = key.clone();
            let verdict = run
                .verifications
                .guard(&guarded, Operation::Verify, || run.verify(key, chain))
                .await?;
            Ok(run.settle(&guarded, verdict))
        }
        .boxed()
    }

    fn settled(&self, key: &CallKey) -> Option<Verdict> {
        self.verdicts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key.signature())
            .cloned()
    }

    /// Record `verdict` unless `key` already settled earlier in this run, and
    /// return the verdict that stands.
    fn settle(&self, key: &CallKey, verdict: Verdict) -> Verdict {
        self.verdicts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.signature())
            .or_insert(verdict)
            .clone()
    }

    fn verify(self: &Arc<Self>, key: CallKey, chain: Chain) -> BoxFuture<'static, Result<Verdict>> {
        let run = Arc::clone(self);
        async move {
            let signature = key.signature();
            if chain.contains(&signature) {
                return Err(HashmakeError::DependencyCycle(format!(
                    "{key} is recorded as its own dependency"
                )));
            }

            let Some(cached) = run.store.get(&key) else {
                let value = run.execute_once(key, chain).await?;
                return Ok(Verdict { changed: true, value });
            };

            if cached.stale {
                debug!(key = %key, "stale entry; re-executing");
            } else {
                let mut below = chain.as_ref().clone();
                below.push(signature);
                let below: Chain = Arc::new(below);

                // Join every sibling before looking at failures: nothing
                // that already started is ever dropped half-way.
                let checks = join_all(
                    cached
                        .dependencies
                        .iter()
                        .cloned()
                        .map(|dep| run.verify_once(dep, Arc::clone(&below))),
                )
                .await;

                let mut dirty = false;
                for check in checks {
                    dirty |= check?.changed;
                }
                if !dirty {
                    trace!(key = %key, "dependencies unchanged; fresh");
                    return Ok(Verdict {
                        changed: false,
                        value: cached.value,
                    });
                }
                debug!(key = %key, "a dependency changed; re-executing");
            }

            let value = run.execute_once(key.clone(), chain).await?;
            let changed = value != cached.value;
            if !changed {
                debug!(key = %key, "re-executed to an identical value; cutting off");
            }
            Ok(Verdict { changed, value })
        }
        .boxed()
    }

    fn execute_once(self: &Arc<Self>, key: CallKey, chain: Chain) -> BoxFuture<'static, Result<Artifact>> {
        let run = Arc::clone(self);
        async move {
            let guarded = key.clone();
            run.executions
                .guard(&guarded, Operation::Execute, || run.execute(key, chain))
                .await
        }
        .boxed()
    }

    fn execute(self: &Arc<Self>, key: CallKey, chain: Chain) -> BoxFuture<'static, Result<Artifact>> {
        let run = Arc::clone(self);
        async move {
            let task = run.registry.resolve(&key.task)?;
            info!(key = %key, "building");

            let ctx = Context::new(Arc::clone(&run), key.clone(), &chain);
            let produced = match task(ctx.clone(), key.args.clone()).await {
                Ok(produced) => produced,
                Err(err) => {
                    let err = HashmakeError::from_task(&key, err);
                    match &err {
                        HashmakeError::TaskFailed { key: origin, .. } if *origin == key.to_string() => {
                            error!(key = %key, error = %err, "task failed");
                        }
                        _ => debug!(key = %key, error = %err, "aborted by failing dependency"),
                    }
                    run.discard(&key);
                    return Err(err);
                }
            };

            let (value, volatile) = match produced.resolve(run.fs().as_ref()) {
                Ok(resolved) => resolved,
                Err(err) => {
                    run.discard(&key);
                    return Err(HashmakeError::from_task(&key, err));
                }
            };

            let dependencies = ctx.take_dependencies();
            debug!(key = %key, dependencies = dependencies.len(), volatile, "storing result");
            run.store
                .set(&key, CacheEntry::new(value.clone(), dependencies, volatile));
            run.executed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(key);
            Ok(value)
        }
        .boxed()
    }

    /// A failed key keeps its previous entry, marked stale so the next build
    /// runs it again instead of trusting a value its dependencies outdated.
    fn discard(&self, key: &CallKey) {
        if self.store.invalidate(key) {
            debug!(key = %key, "previous entry marked stale after failure");
        }
    }
}
