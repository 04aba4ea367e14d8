use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::feed::FeedState;
use crate::notify::VisitPhase;
use crate::payment::PaymentSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Default,
    Expired,
}

impl Theme {
    pub fn for_expiry(is_expired: bool) -> Self {
        if is_expired {
            Theme::Expired
        } else {
            Theme::Default
        }
    }
}

/// Everything the presentation layer renders, published after every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub recipient_name: String,
    pub is_expired: bool,
    pub is_online: bool,
    pub theme: Theme,
    /// `MM:SS`, or `Expired`.
    pub remaining_time_display: String,
    pub feed: FeedState,
    /// Replaces the supporter list when present.
    pub feed_message: Option<String>,
    pub payment: PaymentSession,
    pub visit: VisitPhase,
    pub at: DateTime<Utc>,
}
