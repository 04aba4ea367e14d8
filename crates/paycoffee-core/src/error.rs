//! Core error types for paycoffee-core.
//!
//! Nothing in here is fatal to a session: every failure has a degraded
//! fallback (default timer, empty supporter list, skipped notification).
//! These types exist so the fallback can be chosen, logged, and tested.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::payment::BlockReason;

/// Core error type for configuration and I/O around a session.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Config directory could not be resolved or created
    #[error("Failed to prepare configuration directory {path}: {message}")]
    DirUnavailable { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// Unknown dotted key in get/set
    #[error("unknown config key: {0}")]
    UnknownKey(String),
}

/// Malformed countdown input. Recovered by falling back to the default duration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("could not parse duration '{input}': {reason}")]
pub struct ParseError {
    pub input: String,
    pub reason: &'static str,
}

/// Transport-level outcome of a single feed fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Server answered with a non-2xx status
    #[error("feed endpoint returned HTTP {0}")]
    Status(u16),

    /// Request never produced a response
    #[error("feed request failed: {0}")]
    Transport(String),

    /// Body was not valid JSON
    #[error("feed body could not be decoded: {0}")]
    Decode(String),
}

/// Error classification stored in the feed state and shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedErrorKind {
    NotFound,
    ServerError,
    NetworkError,
    FormatError,
}

impl FeedErrorKind {
    /// Message presented in place of the supporter list.
    pub fn user_message(self) -> &'static str {
        match self {
            FeedErrorKind::FormatError => "Invalid data format",
            FeedErrorKind::NotFound
            | FeedErrorKind::ServerError
            | FeedErrorKind::NetworkError => "Failed to load supporters",
        }
    }
}

impl From<&FetchError> for FeedErrorKind {
    fn from(err: &FetchError) -> Self {
        match err {
            FetchError::Status(404) => FeedErrorKind::NotFound,
            FetchError::Status(_) => FeedErrorKind::ServerError,
            FetchError::Transport(_) => FeedErrorKind::NetworkError,
            FetchError::Decode(_) => FeedErrorKind::FormatError,
        }
    }
}

/// Notification dispatch failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// Bot token or chat id missing
    #[error("notification channel is not configured")]
    NotConfigured,

    /// Channel answered with a non-2xx status
    #[error("notification channel error (HTTP {status}): {body}")]
    Http { status: u16, body: String },

    /// Request never produced a response
    #[error("notification request failed: {0}")]
    Transport(String),

    /// Dispatch task ended without a result
    #[error("notification task aborted")]
    Aborted,
}

/// A payment action refused by the gate.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[error("payment blocked: {reason}")]
pub struct PaymentRejected {
    pub reason: BlockReason,
}

/// Lifecycle violations on the payment session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// Confirmation arrived with no payment in flight
    #[error("no payment in flight")]
    NotInFlight,
}

/// Failures of commands sent through a [`crate::session::SessionHandle`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error(transparent)]
    Rejected(#[from] PaymentRejected),

    /// Session loop has already shut down
    #[error("session is closed")]
    SessionClosed,
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
