// src/registry/builtin.rs

//! Built-in leaf tasks.
//!
//! | task             | result                                   |
//! |------------------|------------------------------------------|
//! | `file(path)`     | file artifact, invalidated by content    |
//! | `dir(path)`      | volatile sorted listing of entry names   |
//! | `glob(pattern)`  | volatile sorted list of matching files   |
//! | `option(name)`   | volatile configuration value (or null)   |

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result, anyhow};
use serde_json::Value;

use crate::engine::Context;
use crate::registry::TaskRegistry;
use crate::registry::glob::{build_globset, collect_matching_files};
use crate::types::TaskOutput;

/// Read argument `index` of `task` as a string.
pub fn string_arg(task: &str, args: &[Value], index: usize) -> Result<String> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(anyhow!(
            "{task}: argument {index} must be a string, got {other}"
        )),
        None => Err(anyhow!("{task}: missing argument {index}")),
    }
}

async fn file_task(args: Vec<Value>) -> Result<TaskOutput> {
    Ok(TaskOutput::File(PathBuf::from(string_arg("file", &args, 0)?)))
}

async fn dir_task(args: Vec<Value>) -> Result<TaskOutput> {
    Ok(TaskOutput::Dir(PathBuf::from(string_arg("dir", &args, 0)?)))
}

async fn glob_task(ctx: Context, root: Arc<PathBuf>, args: Vec<Value>) -> Result<TaskOutput> {
    let pattern = string_arg("glob", &args, 0)?;
    let set = build_globset(std::slice::from_ref(&pattern))?;
    let files = collect_matching_files(ctx.fs().as_ref(), &root, &set)
        .with_context(|| format!("expanding glob {pattern} under {:?}", root))?;
    let files: Vec<String> = files
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    TaskOutput::volatile(files)
}

async fn option_task(options: Arc<BTreeMap<String, Value>>, args: Vec<Value>) -> Result<TaskOutput> {
    let name = string_arg("option", &args, 0)?;
    Ok(TaskOutput::Volatile(
        options.get(&name).cloned().unwrap_or(Value::Null),
    ))
}

/// Register `file` and `dir`.
pub fn register_file_tasks(registry: &mut TaskRegistry) {
    registry
        .register("file", |_ctx, args| file_task(args))
        .register("dir", |_ctx, args| dir_task(args));
}

/// Register `glob`, resolving patterns against `root`.
pub fn register_glob(registry: &mut TaskRegistry, root: impl Into<PathBuf>) {
    let root = Arc::new(root.into());
    registry.register("glob", move |ctx, args| glob_task(ctx, Arc::clone(&root), args));
}

/// Register `option`, serving values from `options`.
pub fn register_options(registry: &mut TaskRegistry, options: BTreeMap<String, Value>) {
    let options = Arc::new(options);
    registry.register("option", move |_ctx, args| option_task(Arc::clone(&options), args));
}

impl TaskRegistry {
    /// A registry holding every built-in task.
    pub fn with_builtins(root: impl Into<PathBuf>, options: BTreeMap<String, Value>) -> Self {
        let mut registry = TaskRegistry::new();
        register_file_tasks(&mut registry);
        register_glob(&mut registry, root);
        register_options(&mut registry, options);
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_arg_reports_bad_arguments() {
        let args = vec![json!("a.txt"), json!(3)];
        assert_eq!(string_arg("file", &args, 0).unwrap(), "a.txt");
        assert!(string_arg("file", &args, 1).unwrap_err().to_string().contains("must be a string"));
        assert!(string_arg("file", &args, 2).unwrap_err().to_string().contains("missing"));
    }

    #[test]
    fn builtins_cover_reserved_names() {
        let registry = TaskRegistry::with_builtins(".", BTreeMap::new());
        for name in crate::registry::BUILTIN_TASKS {
            assert!(registry.contains(name), "missing builtin {name}");
        }
    }
}
