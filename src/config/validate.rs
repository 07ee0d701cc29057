// src/config/validate.rs

use std::collections::BTreeMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile, TaskConfig};
use crate::errors::{HashmakeError, Result};
use crate::registry::BUILTIN_TASKS;
use crate::registry::glob::build_globset;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::HashmakeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.options, raw.task))
    }
}

/// Run every semantic check on a freshly parsed config.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_target(cfg)?;
    validate_task_names(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_inputs(cfg)?;
    task_order(&cfg.task)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(HashmakeError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_target(cfg: &RawConfigFile) -> Result<()> {
    if let Some(target) = &cfg.config.target
        && !cfg.task.contains_key(target)
    {
        return Err(HashmakeError::ConfigError(format!(
            "[config].target refers to unknown task '{target}'"
        )));
    }
    if cfg.config.cache.trim().is_empty() {
        return Err(HashmakeError::ConfigError(
            "[config].cache must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_task_names(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if BUILTIN_TASKS.contains(&name.as_str()) {
            return Err(HashmakeError::ConfigError(format!(
                "task '{name}' shadows a built-in task"
            )));
        }
        if task.cmd.trim().is_empty() {
            return Err(HashmakeError::ConfigError(format!(
                "task '{name}' has an empty `cmd`"
            )));
        }
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.needs.iter() {
            if dep == name {
                return Err(HashmakeError::ConfigError(format!(
                    "task '{name}' cannot depend on itself in `needs`"
                )));
            }
            if !cfg.task.contains_key(dep) && !BUILTIN_TASKS.contains(&dep.as_str()) {
                return Err(HashmakeError::ConfigError(format!(
                    "task '{name}' has unknown dependency '{dep}' in `needs`"
                )));
            }
            if BUILTIN_TASKS.contains(&dep.as_str()) {
                return Err(HashmakeError::ConfigError(format!(
                    "task '{name}' lists built-in '{dep}' in `needs`; use `inputs` for files"
                )));
            }
        }
    }
    Ok(())
}

fn validate_inputs(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        build_globset(&task.inputs).map_err(|err| {
            HashmakeError::ConfigError(format!("task '{name}' has invalid `inputs`: {err:#}"))
        })?;
    }
    Ok(())
}

/// Order tasks so every task comes after the tasks it needs.
///
/// Edge direction is need -> task: for `[task.B] needs = ["A"]` the graph
/// holds `A -> B`. Fails with [`HashmakeError::DagCycle`] on a cycle.
pub fn task_order(tasks: &BTreeMap<String, TaskConfig>) -> Result<Vec<String>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in tasks.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in tasks.iter() {
        for dep in task.needs.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(HashmakeError::DagCycle(format!(
            "cycle detected in task graph involving task '{}'",
            cycle.node_id()
        ))),
    }
}
