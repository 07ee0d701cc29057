// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{HashmakeError, Result};

/// Configuration exactly as read from a `Hashmake.toml` file.
///
/// ```toml
/// [config]
/// target = "site"
/// cache = ".hashmake/cache.json"
/// settle_ms = 50
///
/// [options]
/// width = 990
///
/// [task.site]
/// cmd = "cat build/header.html build/body.html > build/index.html"
/// needs = ["body"]
/// inputs = ["templates/*.html"]
/// output = "build/index.html"
/// ```
///
/// All sections are optional at this level; validation happens when
/// converting into [`ConfigFile`].
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// Values served to tasks by the built-in `option` task.
    #[serde(default)]
    pub options: BTreeMap<String, toml::Value>,

    /// All tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Task built when `--target` is not given.
    #[serde(default)]
    pub target: Option<String>,

    /// Cache document path, relative to the config file's directory.
    #[serde(default = "default_cache")]
    pub cache: String,

    /// Delay between a file change and the rebuild it triggers.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_cache() -> String {
    ".hashmake/cache.json".to_string()
}

fn default_settle_ms() -> u64 {
    50
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            target: None,
            cache: default_cache(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl ConfigSection {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// `[task.<name>]` section: a shell command run as a build task.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TaskConfig {
    /// The command to execute, through `sh -c` (`cmd /C` on Windows).
    pub cmd: String,

    /// Tasks requested before the command runs.
    #[serde(default)]
    pub needs: Vec<String>,

    /// Glob patterns of source files the command reads.
    #[serde(default)]
    pub inputs: Vec<String>,

    /// File the command produces. Without it the task's value is the
    /// command's stdout.
    #[serde(default)]
    pub output: Option<String>,
}

/// Validated configuration. Build one with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    options: BTreeMap<String, toml::Value>,
    task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        options: BTreeMap<String, toml::Value>,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self {
            config,
            options,
            task,
        }
    }

    pub fn config_section(&self) -> &ConfigSection {
        &self.config
    }

    pub fn options(&self) -> &BTreeMap<String, toml::Value> {
        &self.options
    }

    /// Options converted to JSON values for the `option` task.
    pub fn json_options(&self) -> BTreeMap<String, serde_json::Value> {
        self.options
            .iter()
            .filter_map(|(name, value)| {
                serde_json::to_value(value)
                    .ok()
                    .map(|value| (name.clone(), value))
            })
            .collect()
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.task.get(name)
    }

    /// The configured default target, or the only task if there is one.
    pub fn default_target(&self) -> Option<&str> {
        match &self.config.target {
            Some(target) => Some(target.as_str()),
            None if self.task.len() == 1 => self.task.keys().next().map(String::as_str),
            None => None,
        }
    }

    /// Pick the task to build: `cli_target` if given, then
    /// [`default_target`](Self::default_target). A target that names no
    /// configured task is rejected like an unknown `[config].target`.
    pub fn resolve_target(&self, cli_target: Option<&str>) -> Result<String> {
        match cli_target {
            Some(target) if self.task.contains_key(target) => Ok(target.to_string()),
            Some(target) => Err(HashmakeError::ConfigError(format!(
                "--target refers to unknown task '{target}' (tasks: {})",
                self.task_names()
            ))),
            None => self.default_target().map(str::to_string).ok_or_else(|| {
                HashmakeError::ConfigError(format!(
                    "no target selected: pass --target or set [config].target (tasks: {})",
                    self.task_names()
                ))
            }),
        }
    }

    fn task_names(&self) -> String {
        self.task.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
