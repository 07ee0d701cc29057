// src/engine/context.rs

//! The recorder handed to every task body.

use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::engine::CallKey;
use crate::engine::run::Run;
use crate::errors::{HashmakeError, Result};
use crate::fs::FileSystem;
use crate::types::Artifact;

/// Per-execution handle through which a task requests other tasks.
///
/// Every call goes through the engine (so it is memoized and verified) and
/// is appended to the dependency list of the executing task. Clones share
/// that list, so a task may fan out by cloning its context.
#[derive(Clone)]
pub struct Context {
    run: Arc<Run>,
    key: CallKey,
    /// Signatures on the call chain leading here, including `key`.
    chain: Arc<Vec<String>>,
    dependencies: Arc<Mutex<Vec<CallKey>>>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub(crate) fn new(run: Arc<Run>, key: CallKey, parents: &[String]) -> Self {
        let mut chain = parents.to_vec();
        chain.push(key.signature());
        Self {
            run,
            key,
            chain: Arc::new(chain),
            dependencies: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The call this context is executing.
    pub fn key(&self) -> &CallKey {
        &self.key
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        self.run.fs()
    }

    /// Request `task(args...)` and record it as a dependency.
    pub async fn call(&self, task: &str, args: Vec<Value>) -> Result<Artifact> {
        self.call_key(CallKey::new(task, args)).await
    }

    pub async fn call_key(&self, key: CallKey) -> Result<Artifact> {
        if self.chain.contains(&key.signature()) {
            return Err(HashmakeError::DependencyCycle(format!(
                "{} requested {} which is already on its call chain",
                self.key, key
            )));
        }
        self.dependencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key.clone());
        self.run.build(key, Arc::clone(&self.chain)).await
    }

    /// Request a task and decode its value artifact into `T`.
    pub async fn value<T: DeserializeOwned>(&self, task: &str, args: Vec<Value>) -> anyhow::Result<T> {
        self.call(task, args).await?.decode()
    }

    /// Depend on a source file through the built-in `file` task.
    pub async fn depends_on_file(&self, path: impl AsRef<std::path::Path>) -> Result<Artifact> {
        let path = path.as_ref().to_string_lossy().into_owned();
        self.call("file", vec![Value::String(path)]).await
    }

    pub(crate) fn take_dependencies(&self) -> Vec<CallKey> {
        std::mem::take(
            &mut *self
                .dependencies
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}
