// src/types.rs

//! Values produced by tasks and the form they are cached in.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fs::FileSystem;
use crate::watch::hash::compute_file_hash;

/// What a task body returns.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    /// A plain value, compared structurally for early cutoff.
    Value(Value),
    /// A value that is re-verified once per process run regardless of its
    /// dependencies (configuration, directory scans, ...).
    Volatile(Value),
    /// A file artifact. The engine hashes it right after the task returns.
    File(PathBuf),
    /// A directory whose sorted entry names are cached as a volatile value.
    Dir(PathBuf),
}

impl TaskOutput {
    /// Serialize any value into [`TaskOutput::Value`].
    pub fn value<T: Serialize>(value: T) -> Result<Self> {
        Ok(TaskOutput::Value(serde_json::to_value(value)?))
    }

    /// Serialize any value into [`TaskOutput::Volatile`].
    pub fn volatile<T: Serialize>(value: T) -> Result<Self> {
        Ok(TaskOutput::Volatile(serde_json::to_value(value)?))
    }

    /// Turn the produced output into its cached form.
    ///
    /// Returns the artifact and whether the entry is volatile.
    pub fn resolve(self, fs: &dyn FileSystem) -> Result<(Artifact, bool)> {
        match self {
            TaskOutput::Value(value) => Ok((Artifact::Value { value }, false)),
            TaskOutput::Volatile(value) => Ok((Artifact::Value { value }, true)),
            TaskOutput::File(path) => {
                let hash = compute_file_hash(fs, &path)
                    .with_context(|| format!("hashing produced file {:?}", path))?;
                Ok((Artifact::File { path, hash }, false))
            }
            TaskOutput::Dir(path) => {
                let mut names: Vec<String> = fs
                    .read_dir(&path)?
                    .iter()
                    .filter_map(|entry| entry.file_name())
                    .map(|name| name.to_string_lossy().into_owned())
                    .collect();
                names.sort();
                Ok((Artifact::Value { value: names.into() }, true))
            }
        }
    }
}

impl From<Value> for TaskOutput {
    fn from(value: Value) -> Self {
        TaskOutput::Value(value)
    }
}

/// Cached result of a task, as handed back to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    Value { value: Value },
    /// A file together with its content hash at production time.
    File { path: PathBuf, hash: String },
}

impl Artifact {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Artifact::Value { value } => Some(value),
            Artifact::File { .. } => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Artifact::File { path, .. } => Some(path),
            Artifact::Value { .. } => None,
        }
    }

    /// Deserialize a value artifact into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            Artifact::Value { value } => Ok(serde_json::from_value(value.clone())?),
            Artifact::File { path, .. } => {
                bail!("expected a value but the task produced file {:?}", path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use serde_json::json;

    #[test]
    fn volatile_output_is_unwrapped_and_flagged() {
        let fs = MockFileSystem::new();
        let (artifact, volatile) = TaskOutput::Volatile(json!([1, 2]))
            .resolve(&fs)
            .unwrap();
        assert_eq!(artifact, Artifact::Value { value: json!([1, 2]) });
        assert!(volatile);
    }

    #[test]
    fn file_output_records_content_hash() {
        let fs = MockFileSystem::new();
        fs.add_file("out/page.html", "<h1>hi</h1>");

        let (artifact, volatile) = TaskOutput::File("out/page.html".into())
            .resolve(&fs)
            .unwrap();
        assert!(!volatile);
        match artifact {
            Artifact::File { path, hash } => {
                assert_eq!(path, PathBuf::from("out/page.html"));
                assert_eq!(hash, crate::watch::hash::hash_str("<h1>hi</h1>"));
            }
            other => panic!("expected file artifact, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_output_is_an_error() {
        let fs = MockFileSystem::new();
        assert!(TaskOutput::File("missing.png".into()).resolve(&fs).is_err());
    }

    #[test]
    fn dir_output_lists_sorted_names_as_volatile() {
        let fs = MockFileSystem::new();
        fs.add_file("assets/b.css", "");
        fs.add_file("assets/a.js", "");

        let (artifact, volatile) = TaskOutput::Dir("assets".into()).resolve(&fs).unwrap();
        assert!(volatile);
        assert_eq!(artifact.decode::<Vec<String>>().unwrap(), vec!["a.js", "b.css"]);
    }

    #[test]
    fn artifacts_serialize_with_a_type_tag() {
        let file = Artifact::File {
            path: "a.txt".into(),
            hash: "abc".into(),
        };
        assert_eq!(
            serde_json::to_value(&file).unwrap(),
            json!({ "type": "file", "path": "a.txt", "hash": "abc" })
        );
        assert!(file.decode::<String>().is_err());
    }
}
