//! Outbound alerts: the channel trait, the Telegram adapter, message
//! rendering, and the fire-once visit notifier.

mod device;
mod message;
mod telegram;
mod traits;
mod visit;

pub use device::{DeviceInfo, ScreenInfo};
pub use message::{payment_message, visit_message, VisitInfo};
pub use telegram::{TelegramNotifier, DEFAULT_API_URL};
pub use traits::Notifier;
pub use visit::{NotificationToken, VisitNotifier, VisitPhase, DEFAULT_SETTLE_DELAY};
