// src/watch/rebuilder.rs

//! Watch mode: rebuild a target whenever one of its source files changes.

use std::path::PathBuf;
use std::time::Duration;

use notify::event::{AccessKind, AccessMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::engine::{BuildReport, CallKey, Engine};
use crate::errors::{HashmakeError, Result};

/// Default delay between a change notification and the rebuild.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Emitted once per build cycle.
#[derive(Debug, Clone)]
pub enum BuildEvent {
    BuildComplete(BuildReport),
    Error(HashmakeError),
}

/// Rebuilds `target` in a loop, watching the file artifacts recorded in the
/// store after each build.
///
/// Watches are installed before the cycle's event is emitted, so a
/// subscriber that edits a file in response to an event always triggers the
/// next rebuild.
#[derive(Debug)]
pub struct WatchRebuilder {
    engine: Engine,
    target: CallKey,
    settle: Duration,
    events: broadcast::Sender<BuildEvent>,
}

impl WatchRebuilder {
    pub fn new(engine: Engine, target: CallKey) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            engine,
            target,
            settle: DEFAULT_SETTLE_DELAY,
            events,
        }
    }

    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Receive an event after every build cycle.
    pub fn subscribe(&self) -> broadcast::Receiver<BuildEvent> {
        self.events.subscribe()
    }

    /// Build, watch, wait for a change, repeat.
    ///
    /// Build failures are reported as [`BuildEvent::Error`] and do not stop
    /// the loop while there are files to watch. Once a build leaves no file
    /// artifacts recorded the loop ends: `Ok(())` after a successful build,
    /// the build error after a failed one. A [`HashmakeError::Watch`] is
    /// returned if none of the recorded files can be watched.
    pub async fn run(self) -> Result<()> {
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<Event>();

        loop {
            let event = match self.engine.build(&self.target).await {
                Ok(report) => BuildEvent::BuildComplete(report),
                Err(err) => BuildEvent::Error(err),
            };

            let paths = self.engine.store().file_artifacts();
            if paths.is_empty() {
                info!(target = %self.target, "no file artifacts recorded; nothing to watch");
                let outcome = match &event {
                    BuildEvent::BuildComplete(_) => Ok(()),
                    BuildEvent::Error(err) => Err(err.clone()),
                };
                self.emit(event);
                return outcome;
            }

            let watcher = install_watcher(&paths, notify_tx.clone())?;
            self.emit(event);

            wait_for_change(&mut notify_rx).await?;
            drop(watcher);

            tokio::time::sleep(self.settle).await;
            while notify_rx.try_recv().is_ok() {}
            debug!(target = %self.target, "rebuilding after file change");
        }
    }

    fn emit(&self, event: BuildEvent) {
        // Sending fails only when nobody is subscribed.
        let _ = self.events.send(event);
    }
}

/// Watch every path non-recursively. Paths that cannot be watched are
/// skipped with a warning; it is an error only if none can be.
fn install_watcher(
    paths: &[PathBuf],
    notify_tx: mpsc::UnboundedSender<Event>,
) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                // The receiver lives as long as the rebuild loop.
                let _ = notify_tx.send(event);
            }
            Err(err) => {
                warn!(error = %err, "file watch error");
            }
        },
        Config::default(),
    )?;

    let mut watched = 0;
    for path in paths {
        match watcher.watch(path, RecursiveMode::NonRecursive) {
            Ok(()) => watched += 1,
            Err(err) => warn!(?path, error = %err, "cannot watch file; skipping"),
        }
    }

    if watched == 0 {
        return Err(HashmakeError::Watch(format!(
            "none of the {} recorded file(s) could be watched",
            paths.len()
        )));
    }

    info!(files = watched, "watching file artifacts");
    Ok(watcher)
}

async fn wait_for_change(notify_rx: &mut mpsc::UnboundedReceiver<Event>) -> Result<()> {
    while let Some(event) = notify_rx.recv().await {
        if is_relevant(&event.kind) {
            debug!(paths = ?event.paths, kind = ?event.kind, "file change detected");
            return Ok(());
        }
    }
    Err(HashmakeError::Watch(
        "file watcher channel closed".to_string(),
    ))
}

/// Content changes only: reads and metadata-only access are ignored.
fn is_relevant(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => true,
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        _ => false,
    }
}
