// src/engine/guard.rs

//! At-most-one concurrent execution per `(key, operation)`.
//!
//! The graph is discovered while it runs, so the same node is routinely
//! requested by several parents within one build. The first caller runs the
//! thunk; every caller arriving while it is pending awaits the same result.
//! Once the thunk settles the slot is evicted and a later call runs again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OnceCell;

use crate::engine::CallKey;
use crate::errors::Result;

/// Which engine step is being guarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Execute,
    Verify,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Operation::Execute => "execute",
            Operation::Verify => "verify",
        }
    }
}

type Slot<T> = Arc<OnceCell<Result<T>>>;

#[derive(Debug)]
pub struct ExecutionGuard<T> {
    in_flight: Mutex<HashMap<String, Slot<T>>>,
}

impl<T> Default for ExecutionGuard<T> {
    fn default() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> ExecutionGuard<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot<T>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of signatures currently pending.
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    /// Run `thunk` unless an identical operation is already pending, in which
    /// case wait for and return that operation's result.
    pub async fn guard<F, Fut>(&self, key: &CallKey, operation: Operation, thunk: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let signature = format!("{}:{}", key.signature(), operation.as_str());
        let slot = {
            let mut in_flight = self.lock();
            Arc::clone(
                in_flight
                    .entry(signature.clone())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        let result = slot.get_or_init(thunk).await.clone();

        let mut in_flight = self.lock();
        if in_flight
            .get(&signature)
            .is_some_and(|current| Arc::ptr_eq(current, &slot))
        {
            in_flight.remove(&signature);
        }
        result
    }
}
