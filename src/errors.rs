// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! `HashmakeError` is `Clone` because a single guarded execution hands its
//! result to every caller that was waiting on it.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::engine::CallKey;

#[derive(Error, Debug, Clone)]
pub enum HashmakeError {
    #[error("task {key} failed: {cause:#}")]
    TaskFailed {
        key: String,
        cause: Arc<anyhow::Error>,
    },

    #[error("unknown task `{0}`")]
    UnknownTask(String),

    #[error("dependency cycle detected: {0}")]
    DependencyCycle(String),

    #[error("cache store error at {path:?}: {message}")]
    Persistence { path: PathBuf, message: String },

    #[error("watch error: {0}")]
    Watch(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(String),

    #[error("IO error: {0}")]
    IoError(Arc<std::io::Error>),
}

impl HashmakeError {
    /// Wrap a failure raised while executing `key`.
    ///
    /// Engine errors that travelled through a task body via `?` are unwrapped
    /// again, so a nested `UnknownTask` or `TaskFailed` reaches the top-level
    /// caller with its original kind.
    pub fn from_task(key: &CallKey, err: anyhow::Error) -> Self {
        match err.downcast::<HashmakeError>() {
            Ok(inner) => inner,
            Err(err) => HashmakeError::TaskFailed {
                key: key.to_string(),
                cause: Arc::new(err),
            },
        }
    }
}

impl From<std::io::Error> for HashmakeError {
    fn from(err: std::io::Error) -> Self {
        HashmakeError::IoError(Arc::new(err))
    }
}

impl From<toml::de::Error> for HashmakeError {
    fn from(err: toml::de::Error) -> Self {
        HashmakeError::TomlError(err.to_string())
    }
}

impl From<notify::Error> for HashmakeError {
    fn from(err: notify::Error) -> Self {
        HashmakeError::Watch(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HashmakeError>;
