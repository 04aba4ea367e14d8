//! # PayCoffee Core Library
//!
//! This library provides the client-side session logic for the PayCoffee
//! donation page: a countdown that gates payment actions, a periodically
//! refreshed supporter feed, and fire-once visit notifications. The CLI
//! binary hosts a session from a terminal; any other front end renders the
//! same snapshots.
//!
//! ## Architecture
//!
//! - **Session**: A single-task event loop that owns every component and
//!   publishes a [`SessionSnapshot`] after each update
//! - **Timer**: A pure countdown reducer plus single-occupancy delay and task slots
//! - **Feed**: Cancellation-safe polling with generation-tagged completions
//! - **Payment**: A gate whose `disabled` flag is derived, never stored
//! - **Notify**: Telegram delivery and the per-load notification token
//! - **Storage**: TOML-based configuration
//!
//! ## Key Components
//!
//! - [`SessionOrchestrator`]: Session event loop
//! - [`SessionHandle`]: Commands and snapshot reads from outside the loop
//! - [`Config`]: Application configuration management
//! - [`FeedSource`] / [`Notifier`]: Seams for the network collaborators

pub mod connectivity;
pub mod error;
pub mod events;
pub mod feed;
pub mod notify;
pub mod payment;
pub mod session;
pub mod storage;
pub mod timer;

pub use connectivity::ConnectivityMonitor;
pub use error::{CommandError, ConfigError, CoreError, FeedErrorKind, NotificationError};
pub use events::Event;
pub use feed::{DonationFeedPoller, FeedSource, FeedState, HttpFeedSource, Supporter};
pub use notify::{NotificationToken, Notifier, TelegramNotifier, VisitInfo, VisitNotifier};
pub use payment::{ConfirmationPolicy, PaymentData, PaymentGate};
pub use session::{
    SessionDeps, SessionHandle, SessionOrchestrator, SessionReport, SessionSettings,
    SessionSnapshot, Theme,
};
pub use storage::Config;
pub use timer::{CountdownTimer, TimerState};
