// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod registry;
pub mod store;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::config::task_order;
use crate::engine::{BuildReport, CallKey, Engine};
use crate::fs::{FileSystem, RealFileSystem};
use crate::registry::TaskRegistry;
use crate::store::CacheStore;
use crate::watch::{BuildEvent, WatchRebuilder};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - cache store + task registry + engine
/// - a single build (`--once`) or the watch-mode rebuild loop
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    let root = config_root_dir(&config_path);
    let cache_path = match &args.cache {
        Some(path) => PathBuf::from(path),
        None => root.join(&cfg.config_section().cache),
    };

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let store = CacheStore::open(fs, &cache_path);

    if args.dry_run {
        print_dry_run(&cfg, &store)?;
        return Ok(());
    }

    info!(
        cache = ?cache_path,
        entries = store.len(),
        stale = store.stale_count(),
        "cache store opened"
    );

    let registry = TaskRegistry::from_config(&cfg, &root);
    let engine = Engine::new(registry, store);
    let target = CallKey::task(cfg.resolve_target(args.target.as_deref())?);

    if args.once {
        let report = engine.build(&target).await?;
        print_report(&report);
        return Ok(());
    }

    let rebuilder = WatchRebuilder::new(engine, target)
        .with_settle_delay(cfg.config_section().settle_delay());
    let mut events = rebuilder.subscribe();

    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(BuildEvent::BuildComplete(report)) => print_report(&report),
                Ok(BuildEvent::Error(err)) => error!(error = %err, "build failed"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed build events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let outcome: Result<()> = tokio::select! {
        res = rebuilder.run() => res.map_err(Into::into),
        res = tokio::signal::ctrl_c() => {
            info!("interrupted; stopping watch mode");
            res.map_err(Into::into)
        }
    };

    // The rebuilder is gone, so the channel closes once drained.
    if let Err(err) = printer.await {
        warn!(error = %err, "event printer stopped abnormally");
    }
    outcome
}

/// Figure out the project root.
///
/// - If the config path has a non-empty parent (e.g. "site/Hashmake.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Hashmake.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn print_report(report: &BuildReport) {
    match report.value.path() {
        Some(path) => println!("built {}", path.display()),
        None => match report.value.as_value() {
            Some(value) => println!("built {value}"),
            None => println!("built"),
        },
    }
    println!(
        "  {} task(s) executed, {} file(s) changed, {} ms",
        report.executed.len(),
        report.invalidated,
        report.elapsed.as_millis()
    );
}

/// Dry-run output: print cache statistics and tasks in dependency order.
fn print_dry_run(cfg: &ConfigFile, store: &CacheStore) -> Result<()> {
    let section = cfg.config_section();
    println!("hashmake dry-run");
    println!("  config.target = {:?}", cfg.default_target());
    println!("  config.cache = {}", section.cache);
    println!("  config.settle_ms = {}", section.settle_ms);
    println!(
        "  cache: {} entries ({} stale, {} file artifacts)",
        store.len(),
        store.stale_count(),
        store.file_artifacts().len()
    );
    if !cfg.options().is_empty() {
        println!("  options: {:?}", cfg.options().keys().collect::<Vec<_>>());
    }
    println!();

    let order = task_order(cfg.tasks())?;
    println!("tasks ({}):", order.len());
    for name in order {
        let Some(task) = cfg.task(&name) else {
            continue;
        };
        println!("  - {name}");
        println!("      cmd: {}", task.cmd);
        if !task.needs.is_empty() {
            println!("      needs: {:?}", task.needs);
        }
        if !task.inputs.is_empty() {
            println!("      inputs: {:?}", task.inputs);
        }
        if let Some(ref output) = task.output {
            println!("      output: {output}");
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
