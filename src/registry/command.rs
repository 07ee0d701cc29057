// src/registry/command.rs

//! Shell command tasks declared in `[task.<name>]` config sections.
//!
//! A command task first requests everything it needs (the tasks named in
//! `needs` and one `file` task per path matched by `inputs`), then runs its
//! command in the project root. A declared `output` file becomes the task's
//! artifact; otherwise the trimmed stdout is the value.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use futures::future::join_all;
use serde_json::{Value, json};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::{ConfigFile, TaskConfig};
use crate::engine::Context;
use crate::registry::TaskRegistry;
use crate::types::TaskOutput;

/// Register one task per `[task.<name>]` section of `cfg`.
pub fn register_command_tasks(registry: &mut TaskRegistry, cfg: &ConfigFile, root: &Path) {
    let root = Arc::new(root.to_path_buf());
    for (name, task) in cfg.tasks() {
        let task_name = Arc::new(name.clone());
        let task = Arc::new(task.clone());
        let root = Arc::clone(&root);
        registry.register(name.clone(), move |ctx, _args| {
            run_command_task(
                ctx,
                Arc::clone(&task_name),
                Arc::clone(&task),
                Arc::clone(&root),
            )
        });
    }
}

impl TaskRegistry {
    /// The built-in tasks plus every command task declared in `cfg`.
    pub fn from_config(cfg: &ConfigFile, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut registry = TaskRegistry::with_builtins(root.clone(), cfg.json_options());
        register_command_tasks(&mut registry, cfg, &root);
        registry
    }
}

async fn run_command_task(
    ctx: Context,
    name: Arc<String>,
    task: Arc<TaskConfig>,
    root: Arc<PathBuf>,
) -> Result<TaskOutput> {
    request_needs(&ctx, &task.needs).await?;
    let inputs = request_inputs(&ctx, &task.inputs).await?;
    debug!(task = %name, inputs, "dependencies ready");

    let stdout = run_shell(&name, &task.cmd, &root).await?;

    match &task.output {
        Some(output) => Ok(TaskOutput::File(root.join(output))),
        None => Ok(TaskOutput::Value(json!({ "stdout": stdout }))),
    }
}

/// Build every task in `needs` concurrently. All requests run to completion;
/// the first failure is reported.
async fn request_needs(ctx: &Context, needs: &[String]) -> Result<()> {
    let results = join_all(needs.iter().map(|need| ctx.call(need, Vec::new()))).await;
    for result in results {
        result?;
    }
    Ok(())
}

/// Expand each input pattern through `glob` and depend on every match.
/// Returns the number of input files.
async fn request_inputs(ctx: &Context, patterns: &[String]) -> Result<usize> {
    let mut files = Vec::new();
    for pattern in patterns {
        let matched: Vec<String> = ctx
            .value("glob", vec![Value::String(pattern.clone())])
            .await?;
        files.extend(matched);
    }

    let results = join_all(
        files
            .iter()
            .map(|path| ctx.call("file", vec![Value::String(path.clone())])),
    )
    .await;
    for result in results {
        result?;
    }
    Ok(files.len())
}

/// Run `cmd` through the platform shell in `root` and return its trimmed
/// stdout. A non-zero exit status is an error carrying the stderr text.
async fn run_shell(name: &str, cmd: &str, root: &Path) -> Result<String> {
    info!(task = %name, cmd = %cmd, "starting task process");

    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = command
        .output()
        .await
        .with_context(|| format!("spawning process for task '{name}'"))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stderr.lines() {
        debug!(task = %name, "stderr: {}", line);
    }

    let code = output.status.code().unwrap_or(-1);
    info!(
        task = %name,
        exit_code = code,
        success = output.status.success(),
        "task process exited"
    );

    if !output.status.success() {
        bail!(
            "command `{cmd}` exited with status {code}: {}",
            stderr.trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
