//! Configuration loading and validation for the spread monitor.
//!
//! Uses serde_yaml to load YAML configuration files with support for
//! environment variable overrides for Telegram credentials.

mod app;
mod duration;
mod error;
mod monitor;
mod notification;
mod storage;
mod venues;

pub use app::AppConfig;
pub use error::ConfigError;
pub use monitor::MonitorConfig;
pub use notification::{NotificationConfig, TelegramConfig};
pub use storage::StorageConfig;
pub use venues::{BinanceVenueConfig, JupiterVenueConfig, VenuesConfig};

use serde::Deserialize;
use std::collections::HashSet;
use std::{env, fs};

/// Root configuration structure for the spread monitor.
///
/// Required sections: app.
/// Optional sections: monitor, symbols, venues, notification, storage.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Application-level settings like name and environment.
    pub app: AppConfig,
    /// Threshold, trade size and fee rates.
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Base assets to monitor (e.g., "SOL"). Empty means discover from venue A.
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Venue adapter settings.
    #[serde(default)]
    pub venues: VenuesConfig,
    /// Alert channels like Telegram (optional).
    pub notification: Option<NotificationConfig>,
    /// Opportunity persistence (optional).
    pub storage: Option<StorageConfig>,
}

impl Config {
    /// Load configuration from a YAML file at the given path.
    ///
    /// First loads environment variables from `.env` file (if exists),
    /// then loads YAML config and credentials from environment variables:
    /// `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`, `TELEGRAM_ERROR_CHAT_ID`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore error if not found)
        dotenvy::dotenv().ok();

        let content = fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;

        config.normalize_symbols();
        config.load_credentials_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Telegram settings, if the section is present.
    pub fn telegram(&self) -> Option<&TelegramConfig> {
        self.notification.as_ref().and_then(|n| n.telegram.as_ref())
    }

    /// Uppercases symbols and drops blanks and duplicates, keeping order.
    fn normalize_symbols(&mut self) {
        let mut seen = HashSet::new();
        self.symbols = self
            .symbols
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();
    }

    /// Load credentials from environment variables.
    fn load_credentials_from_env(&mut self) {
        if let Some(ref mut notification) = self.notification {
            if let Some(ref mut telegram) = notification.telegram {
                if telegram.enabled {
                    telegram.bot_token = env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default();
                    telegram.chat_id = env::var("TELEGRAM_CHAT_ID").unwrap_or_default();
                    telegram.error_chat_id = env::var("TELEGRAM_ERROR_CHAT_ID").unwrap_or_default();
                }
            }
        }
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.app.name.is_empty() {
            return Err(ConfigError::Validation("app.name is required".into()));
        }

        self.monitor.evaluator()?;

        for symbol in &self.symbols {
            if !self.venues.jupiter.supports(symbol) {
                return Err(ConfigError::Validation(format!(
                    "symbol {}: no token mint in venues.jupiter.tokens",
                    symbol
                )));
            }
        }

        for (symbol, token) in &self.venues.jupiter.tokens {
            if token.mint.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "venues.jupiter.tokens.{}: mint is required",
                    symbol
                )));
            }
        }

        if let Some(telegram) = self.telegram() {
            let is_production = self.app.env != "development";
            if telegram.enabled
                && is_production
                && (telegram.bot_token.is_empty() || telegram.chat_id.is_empty())
            {
                return Err(ConfigError::Validation(
                    "telegram: credentials not found (set TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID env vars)"
                        .into(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
