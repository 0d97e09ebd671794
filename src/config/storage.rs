//! Storage configuration.

use serde::Deserialize;
use std::time::Duration;

use super::duration;

/// Opportunity log settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Whether emitted opportunities are persisted.
    #[serde(default)]
    pub enabled: bool,
    /// Path to the SQLite database file (default: "data/opportunities.db").
    pub path: Option<String>,
    /// Window in which repeats of the same opportunity are dropped (default: 5m).
    #[serde(default, with = "duration")]
    pub dedup_window: Duration,
}
