use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FeedErrorKind;
use crate::payment::{BlockReason, PaymentData};

/// Every state change in a session produces an Event.
/// The presentation layer renders from snapshots; hosts log or forward events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    /// Countdown reached zero. Emitted once per countdown.
    TimerExpired {
        at: DateTime<Utc>,
    },
    ConnectivityChanged {
        online: bool,
        at: DateTime<Utc>,
    },
    /// A fetch was issued; `superseded` is true when an older one was aborted.
    FeedRequested {
        generation: u64,
        superseded: bool,
        at: DateTime<Utc>,
    },
    FeedUpdated {
        generation: u64,
        supporters: usize,
        dropped: usize,
        at: DateTime<Utc>,
    },
    FeedFailed {
        generation: u64,
        error: FeedErrorKind,
        at: DateTime<Utc>,
    },
    PaymentStarted {
        button_id: String,
        at: DateTime<Utc>,
    },
    PaymentRejected {
        button_id: String,
        reason: BlockReason,
        at: DateTime<Utc>,
    },
    PaymentSucceeded {
        payment: PaymentData,
        at: DateTime<Utc>,
    },
    /// Payment dropped without acknowledgement (connectivity lost or countdown expired).
    PaymentAbandoned {
        button_id: String,
        reason: BlockReason,
        at: DateTime<Utc>,
    },
    AcknowledgementCleared {
        at: DateTime<Utc>,
    },
    VisitNotificationScheduled {
        delay_ms: u64,
        at: DateTime<Utc>,
    },
    VisitNotificationSent {
        at: DateTime<Utc>,
    },
    VisitNotificationFailed {
        error: String,
        at: DateTime<Utc>,
    },
    SessionEnded {
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::TimerStarted { .. } => "timer_started",
            Event::TimerExpired { .. } => "timer_expired",
            Event::ConnectivityChanged { .. } => "connectivity_changed",
            Event::FeedRequested { .. } => "feed_requested",
            Event::FeedUpdated { .. } => "feed_updated",
            Event::FeedFailed { .. } => "feed_failed",
            Event::PaymentStarted { .. } => "payment_started",
            Event::PaymentRejected { .. } => "payment_rejected",
            Event::PaymentSucceeded { .. } => "payment_succeeded",
            Event::PaymentAbandoned { .. } => "payment_abandoned",
            Event::AcknowledgementCleared { .. } => "acknowledgement_cleared",
            Event::VisitNotificationScheduled { .. } => "visit_notification_scheduled",
            Event::VisitNotificationSent { .. } => "visit_notification_sent",
            Event::VisitNotificationFailed { .. } => "visit_notification_failed",
            Event::SessionEnded { .. } => "session_ended",
        }
    }
}
