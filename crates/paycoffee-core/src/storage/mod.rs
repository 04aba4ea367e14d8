mod config;

pub use config::{
    ApiConfig, AppConfig, Config, ConfirmationMode, NotificationsConfig, PaymentConfig,
    TelegramConfig,
};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/paycoffee[-dev]/` based on PAYCOFFEE_ENV.
///
/// Set PAYCOFFEE_ENV=dev to use the development directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("PAYCOFFEE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("paycoffee-dev")
    } else {
        base_dir.join("paycoffee")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DirUnavailable {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}
