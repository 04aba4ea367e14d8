//! Notification texts (Telegram HTML parse mode).

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use super::device::{DeviceInfo, ScreenInfo};
use crate::payment::PaymentData;

/// What the page knows about the visit at load time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitInfo {
    pub url: String,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub screen: Option<ScreenInfo>,
}

impl VisitInfo {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_screen(mut self, screen: ScreenInfo) -> Self {
        self.screen = Some(screen);
        self
    }

    pub fn referrer_or_direct(&self) -> &str {
        self.referrer
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or("Direct visit")
    }
}

fn local_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Minimal escaping for Telegram's HTML mode.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn visit_message(visit: &VisitInfo, at: DateTime<Utc>) -> String {
    let device = DeviceInfo::from_user_agent(visit.user_agent.as_deref());
    let screen = visit
        .screen
        .map(|s| format!("{} ({})", s.resolution(), s.class()))
        .unwrap_or_else(|| "Unknown".to_string());

    format!(
        "🌐 <b>Website Visit Alert</b>\n\
         \n\
         📅 <b>Time:</b> {time}\n\
         🔗 <b>URL:</b> {url}\n\
         📱 <b>Device:</b> {device}\n\
         💻 <b>Browser:</b> {browser}\n\
         📺 <b>Screen:</b> {screen}\n\
         🔄 <b>Referrer:</b> {referrer}\n\
         🌍 <b>Platform:</b> {platform}\n\
         \n\
         👤 <b>User opened the donation website!</b>",
        time = local_timestamp(at),
        url = escape_html(&visit.url),
        device = escape_html(&device.device_name),
        browser = escape_html(&device.browser),
        screen = screen,
        referrer = escape_html(visit.referrer_or_direct()),
        platform = escape_html(&device.platform),
    )
}

pub fn payment_message(payment: &PaymentData, at: DateTime<Utc>) -> String {
    format!(
        "💰 <b>Payment Alert</b>\n\
         \n\
         📅 <b>Time:</b> {time}\n\
         💳 <b>Method:</b> {method}\n\
         💵 <b>Amount:</b> ${amount:.2}\n\
         \n\
         ✅ <b>Payment successful!</b>",
        time = local_timestamp(at),
        method = escape_html(&payment.button_id),
        amount = payment.amount,
    )
}
