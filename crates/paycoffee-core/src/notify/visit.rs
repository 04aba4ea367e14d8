//! Fire-once visit notification.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Scheduled -> Dispatching -> Delivered | Failed
//! Scheduled | Dispatching -> Cancelled   (teardown)
//! ```
//!
//! Every state except `Idle` is terminal for the current load, so repeated
//! evaluation fires at most once. The [`NotificationToken`] outlives the load:
//! a new notifier built from a token that is still unsent may try again.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::NotificationError;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1500);

/// Per-load delivery record, handed from one session to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationToken {
    pub sent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitPhase {
    Idle,
    Scheduled,
    Dispatching,
    Delivered,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct VisitNotifier {
    token: NotificationToken,
    settle_delay: Duration,
    phase: VisitPhase,
}

impl VisitNotifier {
    pub fn new(token: NotificationToken, settle_delay: Duration) -> Self {
        Self {
            token,
            settle_delay,
            phase: VisitPhase::Idle,
        }
    }

    pub fn token(&self) -> NotificationToken {
        self.token
    }

    pub fn phase(&self) -> VisitPhase {
        self.phase
    }

    /// Decide whether to schedule the send. Returns the settle delay the
    /// caller must wait before calling [`settle_elapsed`](Self::settle_elapsed).
    pub fn evaluate(&mut self, config_valid: bool) -> Option<Duration> {
        if self.phase != VisitPhase::Idle || self.token.sent || !config_valid {
            return None;
        }
        self.phase = VisitPhase::Scheduled;
        Some(self.settle_delay)
    }

    /// Settle delay over. Returns `true` if the caller should dispatch now.
    pub fn settle_elapsed(&mut self) -> bool {
        if self.phase != VisitPhase::Scheduled {
            return false;
        }
        self.phase = VisitPhase::Dispatching;
        true
    }

    /// Record the dispatch outcome. Ignored unless a dispatch is pending.
    pub fn record(&mut self, result: &Result<(), NotificationError>) {
        if self.phase != VisitPhase::Dispatching {
            return;
        }
        match result {
            Ok(()) => {
                self.token.sent = true;
                self.phase = VisitPhase::Delivered;
            }
            Err(_) => self.phase = VisitPhase::Failed,
        }
    }

    /// Cancel a scheduled or in-flight send. Returns `true` if one was pending.
    pub fn teardown(&mut self) -> bool {
        match self.phase {
            VisitPhase::Scheduled | VisitPhase::Dispatching => {
                self.phase = VisitPhase::Cancelled;
                true
            }
            _ => false,
        }
    }
}
