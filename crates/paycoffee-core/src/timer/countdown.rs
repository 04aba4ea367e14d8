//! Countdown timer.
//!
//! The countdown is a pure state machine. It does not own a clock: the
//! session loop feeds it one `tick()` per elapsed second.
//!
//! ## State Transitions
//!
//! ```text
//! Running -> Expired
//! ```
//!
//! `Expired` is terminal for a given countdown. Only `restart()` with a new
//! initial duration produces a fresh `Running` state.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::events::Event;

/// Duration used when the configured input cannot be parsed (2:53).
pub const DEFAULT_DURATION_SECS: u64 = 173;

/// Display value once the countdown has run out.
pub const EXPIRED_DISPLAY: &str = "Expired";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountdownStatus {
    Running,
    Expired,
}

/// Remaining time plus status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub remaining_secs: u64,
    pub status: CountdownStatus,
}

impl TimerState {
    pub fn running(remaining_secs: u64) -> Self {
        if remaining_secs == 0 {
            return Self::expired();
        }
        Self {
            remaining_secs,
            status: CountdownStatus::Running,
        }
    }

    pub fn expired() -> Self {
        Self {
            remaining_secs: 0,
            status: CountdownStatus::Expired,
        }
    }

    /// Apply one elapsed second.
    ///
    /// Returns the next state and whether this step crossed into `Expired`.
    /// An expired state steps to itself and never reports the crossing again.
    pub fn step(self) -> (TimerState, bool) {
        match self.status {
            CountdownStatus::Expired => (self, false),
            CountdownStatus::Running => {
                let remaining = self.remaining_secs.saturating_sub(1);
                if remaining == 0 {
                    (TimerState::expired(), true)
                } else {
                    (TimerState::running(remaining), false)
                }
            }
        }
    }

    pub fn display(&self) -> String {
        match self.status {
            CountdownStatus::Expired => EXPIRED_DISPLAY.to_string(),
            CountdownStatus::Running => format_mm_ss(self.remaining_secs),
        }
    }
}

/// Parse `MM:SS` or a raw second count.
///
/// Either part may be negative. A total at or below zero clamps to 0, which
/// starts the countdown already expired.
pub fn parse_duration(input: &str) -> Result<u64, ParseError> {
    let trimmed = input.trim();
    let err = |reason| ParseError {
        input: input.to_string(),
        reason,
    };

    let parts: Vec<&str> = trimmed.split(':').collect();
    let total = match parts.as_slice() {
        [secs] => secs.parse::<i64>().map_err(|_| err("not an integer second count"))?,
        [mins, secs] => {
            let mins = mins.parse::<i64>().map_err(|_| err("minutes are not an integer"))?;
            let secs = secs.parse::<i64>().map_err(|_| err("seconds are not an integer"))?;
            mins.checked_mul(60)
                .and_then(|m| m.checked_add(secs))
                .ok_or_else(|| err("duration overflows"))?
        }
        _ => return Err(err("expected MM:SS")),
    };
    Ok(u64::try_from(total).unwrap_or(0))
}

/// Parse, falling back to [`DEFAULT_DURATION_SECS`] with a warning.
pub fn duration_or_default(input: &str) -> u64 {
    parse_duration(input).unwrap_or_else(|e| {
        tracing::warn!(
            error = %e,
            default_secs = DEFAULT_DURATION_SECS,
            "falling back to default countdown duration"
        );
        DEFAULT_DURATION_SECS
    })
}

pub fn format_mm_ss(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Countdown bound to the input it was started with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountdownTimer {
    input: String,
    initial_secs: u64,
    state: TimerState,
}

impl CountdownTimer {
    pub fn new(input: &str) -> Self {
        let initial_secs = duration_or_default(input);
        Self {
            input: input.to_string(),
            initial_secs,
            state: TimerState::running(initial_secs),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn remaining_secs(&self) -> u64 {
        self.state.remaining_secs
    }

    pub fn initial_secs(&self) -> u64 {
        self.initial_secs
    }

    pub fn is_expired(&self) -> bool {
        self.state.status == CountdownStatus::Expired
    }

    pub fn display(&self) -> String {
        self.state.display()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Event announcing the countdown at mount.
    ///
    /// A zero initial duration expires on start, so the expiry event is
    /// returned here instead of from a later `tick()`.
    pub fn start_event(&self) -> Event {
        if self.is_expired() {
            Event::TimerExpired { at: Utc::now() }
        } else {
            Event::TimerStarted {
                duration_secs: self.initial_secs,
                at: Utc::now(),
            }
        }
    }

    /// Call once per elapsed second. Returns `Some(Event::TimerExpired)`
    /// exactly once, on the tick that reaches zero.
    pub fn tick(&mut self) -> Option<Event> {
        let (next, crossed) = self.state.step();
        self.state = next;
        crossed.then(|| Event::TimerExpired { at: Utc::now() })
    }

    /// Begin a fresh countdown from a new input, clearing `Expired`.
    ///
    /// The caller owns the clock and must re-arm it; any tick already
    /// scheduled for the old countdown is the caller's to drop.
    pub fn restart(&mut self, input: &str) -> Event {
        *self = Self::new(input);
        self.start_event()
    }

    pub fn input(&self) -> &str {
        &self.input
    }
}
