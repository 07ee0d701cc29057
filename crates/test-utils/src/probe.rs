//! Execution counters for tasks registered in tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Counts how often each task body ran. Clones share the counters, so a
/// clone can be moved into every registered task closure.
#[derive(Debug, Clone, Default)]
pub struct TaskProbe {
    counts: Arc<Mutex<BTreeMap<String, usize>>>,
}

impl TaskProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one execution of `task`.
    pub fn record(&self, task: &str) {
        *self
            .counts
            .lock()
            .unwrap()
            .entry(task.to_string())
            .or_default() += 1;
    }

    pub fn count(&self, task: &str) -> usize {
        self.counts.lock().unwrap().get(task).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.lock().unwrap().values().sum()
    }

    pub fn reset(&self) {
        self.counts.lock().unwrap().clear();
    }
}
