use async_trait::async_trait;

use crate::error::NotificationError;

/// An outbound text channel for visit and payment alerts.
/// Senders are stateless between calls; credentials are fixed at construction.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Unique identifier (e.g. "telegram").
    fn name(&self) -> &str;

    /// Whether credentials are present. `send` fails with
    /// [`NotificationError::NotConfigured`] when this is false.
    fn is_configured(&self) -> bool;

    /// Deliver one message. Only success or failure matters to callers.
    async fn send(&self, text: &str) -> Result<(), NotificationError>;
}
