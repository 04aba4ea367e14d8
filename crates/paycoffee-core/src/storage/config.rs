//! TOML-based application configuration.
//!
//! Stores:
//! - Recipient and countdown defaults
//! - Payment provider links and confirmation mode
//! - Supporter feed location
//! - Telegram credentials and notification switches
//!
//! Configuration is stored at `~/.config/paycoffee/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::data_dir;
use crate::error::{ConfigError, Result};
use crate::feed::DEFAULT_REFRESH_INTERVAL;

/// Page-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_recipient_name")]
    pub recipient_name: String,
    /// `MM:SS` or whole seconds; malformed values fall back at session start.
    #[serde(default = "default_timer")]
    pub default_timer: String,
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationMode {
    #[default]
    Simulated,
    External,
}

/// Payment provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentConfig {
    #[serde(default)]
    pub aba_url: String,
    #[serde(default)]
    pub acleda_url: String,
    #[serde(default)]
    pub acleda_payment_data: String,
    #[serde(default = "default_acleda_key")]
    pub acleda_key: String,
    #[serde(default)]
    pub confirmation: ConfirmationMode,
    #[serde(default = "default_confirmation_delay_ms")]
    pub confirmation_delay_ms: u64,
    #[serde(default = "default_thank_you_ms")]
    pub thank_you_ms: u64,
}

/// Supporter feed location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_donations_endpoint")]
    pub donations_endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
}

impl TelegramConfig {
    pub fn is_configured(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}

/// Notification switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub visit: bool,
    #[serde(default = "default_true")]
    pub payments: bool,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/paycoffee/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub payment: PaymentConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

// Default functions
fn default_recipient_name() -> String {
    "Ozo. Designer".into()
}
fn default_timer() -> String {
    "10:53".into()
}
fn default_refresh_interval_ms() -> u64 {
    30_000
}
fn default_acleda_key() -> String {
    "khqr".into()
}
fn default_confirmation_delay_ms() -> u64 {
    2_000
}
fn default_thank_you_ms() -> u64 {
    5_000
}
fn default_base_url() -> String {
    "https://0zodesigner.github.io".into()
}
fn default_donations_endpoint() -> String {
    "/donate/supporters.json".into()
}
fn default_telegram_api_url() -> String {
    crate::notify::DEFAULT_API_URL.into()
}
fn default_true() -> bool {
    true
}
fn default_settle_delay_ms() -> u64 {
    1_500
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            recipient_name: default_recipient_name(),
            default_timer: default_timer(),
            refresh_interval_ms: default_refresh_interval_ms(),
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            aba_url: String::new(),
            acleda_url: String::new(),
            acleda_payment_data: String::new(),
            acleda_key: default_acleda_key(),
            confirmation: ConfirmationMode::default(),
            confirmation_delay_ms: default_confirmation_delay_ms(),
            thank_you_ms: default_thank_you_ms(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            donations_endpoint: default_donations_endpoint(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_url: default_telegram_api_url(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            visit: true,
            payments: true,
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> std::result::Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => value
                    .parse::<bool>()
                    .map(serde_json::Value::Bool)
                    .map_err(|e| invalid(e.to_string()))?,
                serde_json::Value::Number(_) => value
                    .parse::<u64>()
                    .map(|n| serde_json::Value::Number(n.into()))
                    .map_err(|_| invalid(format!("cannot parse '{value}' as a whole number")))?,
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    return Err(unknown());
                }
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "config unavailable, using defaults");
            Self::default()
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match Self::get_json_value_by_path(&json, key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a leaf value by dot-separated key. The caller persists with [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or names a section, or if the
    /// value does not fit the field's type.
    pub fn set(&mut self, key: &str, value: &str) -> std::result::Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Every dotted leaf key with its current value, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    // ── Validation ───────────────────────────────────────────────────

    /// All problems that make the page unusable. Empty means valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let required = [
            ("payment.aba_url", &self.payment.aba_url),
            ("payment.acleda_url", &self.payment.acleda_url),
            ("payment.acleda_payment_data", &self.payment.acleda_payment_data),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                errors.push(ConfigError::MissingKey(key.to_string()));
            }
        }

        for (key, value) in [
            ("payment.aba_url", &self.payment.aba_url),
            ("payment.acleda_url", &self.payment.acleda_url),
        ] {
            if !value.trim().is_empty() {
                if let Err(e) = Url::parse(value) {
                    errors.push(ConfigError::InvalidValue {
                        key: key.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if self.app.refresh_interval_ms == 0 {
            errors.push(ConfigError::InvalidValue {
                key: "app.refresh_interval_ms".into(),
                message: "must be greater than zero".into(),
            });
        }
        errors
    }

    /// The configuration-valid signal that gates the visit notification.
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    // ── Derived values ───────────────────────────────────────────────

    /// `base_url + donations_endpoint` for a rooted endpoint, else the endpoint as given.
    pub fn feed_url(&self) -> std::result::Result<Url, ConfigError> {
        let endpoint = self.api.donations_endpoint.trim();
        let (key, raw) = if endpoint.starts_with('/') {
            (
                "api.base_url",
                format!("{}{}", self.api.base_url.trim_end_matches('/'), endpoint),
            )
        } else {
            ("api.donations_endpoint", endpoint.to_string())
        };
        Url::parse(&raw).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// ACLEDA deep link with the payment data and key as query parameters.
    pub fn acleda_full_url(&self) -> std::result::Result<Url, ConfigError> {
        if self.payment.acleda_url.is_empty() {
            return Err(ConfigError::MissingKey("payment.acleda_url".into()));
        }
        Url::parse_with_params(
            &self.payment.acleda_url,
            &[
                ("payment_data", self.payment.acleda_payment_data.as_str()),
                ("key", self.payment.acleda_key.as_str()),
            ],
        )
        .map_err(|e| ConfigError::InvalidValue {
            key: "payment.acleda_url".into(),
            message: e.to_string(),
        })
    }

    /// Feed refresh period. Zero falls back to [`DEFAULT_REFRESH_INTERVAL`].
    pub fn refresh_interval(&self) -> Duration {
        match self.app.refresh_interval_ms {
            0 => DEFAULT_REFRESH_INTERVAL,
            ms => Duration::from_millis(ms),
        }
    }
}
