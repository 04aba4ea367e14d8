use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FeedErrorKind;

pub const LOADING_MESSAGE: &str = "Loading supporters...";
pub const EMPTY_MESSAGE: &str = "No donations yet. Be the first!";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supporter {
    pub name: String,
    pub amount: f64,
}

impl Supporter {
    /// Validate one raw feed record.
    ///
    /// `name` must be a string and `amount` a finite, non-negative number.
    pub fn from_value(value: &Value) -> Option<Self> {
        let name = value.get("name")?.as_str()?;
        let amount = value.get("amount")?.as_f64()?;
        if !amount.is_finite() || amount < 0.0 {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            amount,
        })
    }

    pub fn formatted_amount(&self) -> String {
        format!("${:.2}", self.amount)
    }
}

/// Result of normalising a feed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub supporters: Vec<Supporter>,
    pub dropped: usize,
}

/// Filter invalid records and sort by amount, highest first.
///
/// The sort is stable, so equal amounts keep their feed order.
pub fn normalize(payload: &Value) -> Result<Normalized, FeedErrorKind> {
    let records = payload.as_array().ok_or(FeedErrorKind::FormatError)?;

    let mut supporters: Vec<Supporter> = Vec::with_capacity(records.len());
    let mut dropped = 0;
    for record in records {
        match Supporter::from_value(record) {
            Some(supporter) => supporters.push(supporter),
            None => {
                tracing::warn!(record = %record, "skipping invalid supporter record");
                dropped += 1;
            }
        }
    }
    supporters.sort_by(|a, b| b.amount.total_cmp(&a.amount));

    Ok(Normalized {
        supporters,
        dropped,
    })
}

/// Snapshot of the supporter feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedState {
    pub supporters: Vec<Supporter>,
    pub loading: bool,
    pub error: Option<FeedErrorKind>,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            supporters: Vec::new(),
            loading: true,
            error: None,
        }
    }
}

impl FeedState {
    pub fn published(supporters: Vec<Supporter>) -> Self {
        Self {
            supporters,
            loading: false,
            error: None,
        }
    }

    pub fn failed(error: FeedErrorKind) -> Self {
        Self {
            supporters: Vec::new(),
            loading: false,
            error: Some(error),
        }
    }

    /// Text shown instead of the list, or `None` when there is a list to show.
    pub fn message(&self) -> Option<&'static str> {
        if self.loading {
            return Some(LOADING_MESSAGE);
        }
        if !self.supporters.is_empty() {
            return None;
        }
        Some(self.error.map_or(EMPTY_MESSAGE, FeedErrorKind::user_message))
    }
}
