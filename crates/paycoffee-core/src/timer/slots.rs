//! Single-occupancy handles for timers and spawned requests.
//!
//! A slot holds at most one outstanding sleep or task. Arming a slot tears
//! down whatever it held before, so a component can never accumulate timers.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, Interval, Sleep};

/// One-shot delay that can be re-armed or cancelled.
#[derive(Debug, Default)]
pub struct DelaySlot {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl DelaySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the slot, dropping any pending delay.
    pub fn arm(&mut self, delay: Duration) {
        self.sleep = Some(Box::pin(sleep(delay)));
    }

    /// Returns `true` if a pending delay was dropped.
    pub fn cancel(&mut self) -> bool {
        self.sleep.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    /// Resolves when the armed delay elapses, then disarms.
    /// Never resolves while disarmed.
    pub async fn fired(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => {
                sleep.await;
                self.sleep = None;
            }
            None => pending().await,
        }
    }
}

/// Spawned task whose completion the owner awaits.
#[derive(Debug)]
pub struct TaskSlot<T> {
    handle: Option<JoinHandle<T>>,
}

impl<T> Default for TaskSlot<T> {
    fn default() -> Self {
        Self { handle: None }
    }
}

impl<T: Send + 'static> TaskSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new task, aborting the previous one.
    pub fn replace(&mut self, handle: JoinHandle<T>) -> bool {
        let superseded = self.cancel();
        self.handle = Some(handle);
        superseded
    }

    /// Abort the outstanding task. Returns `true` if one was running.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.handle.is_some()
    }

    /// Resolves with the task's output once it finishes.
    ///
    /// Yields `None` if the task panicked or was aborted from elsewhere.
    /// Never resolves while empty.
    pub async fn join(&mut self) -> Option<T> {
        match self.handle.as_mut() {
            Some(handle) => {
                let result = handle.await;
                self.handle = None;
                result.ok()
            }
            None => pending().await,
        }
    }
}

impl<T> Drop for TaskSlot<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Await the next tick of an optional interval; never resolves when `None`.
pub async fn next_tick(interval: &mut Option<Interval>) {
    match interval.as_mut() {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}
