// src/registry/mod.rs

//! Task registry: the only way to add nodes to the build graph.
//!
//! Tasks are async closures taking a [`Context`] and their argument list.
//! Inside a task, other tasks are requested through the context so every
//! call is memoized and recorded as a dependency.
//!
//! - [`builtin`] provides `file`, `dir`, `glob` and `option`.
//! - [`command`] turns `[task.<name>]` config sections into shell tasks.

pub mod builtin;
pub mod command;
pub mod glob;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::engine::Context;
use crate::errors::{HashmakeError, Result};
use crate::types::TaskOutput;

pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<TaskOutput>> + Send>>;
pub type TaskFn = Arc<dyn Fn(Context, Vec<Value>) -> TaskFuture + Send + Sync>;

/// Names reserved by [`TaskRegistry::with_builtins`].
pub const BUILTIN_TASKS: [&str; 4] = ["file", "dir", "glob", "option"];

#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<String, TaskFn>,
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.tasks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`, replacing any task previously registered under it.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, task: F) -> &mut Self
    where
        F: Fn(Context, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<TaskOutput>> + Send + 'static,
    {
        let erased: TaskFn = Arc::new(move |ctx: Context, args: Vec<Value>| {
            Box::pin(task(ctx, args)) as TaskFuture
        });
        self.tasks.insert(name.into(), erased);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Look up a task; unregistered names fail immediately.
    pub fn resolve(&self, name: &str) -> Result<TaskFn> {
        self.tasks
            .get(name)
            .cloned()
            .ok_or_else(|| HashmakeError::UnknownTask(name.to_string()))
    }
}
