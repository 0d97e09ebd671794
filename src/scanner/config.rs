//! Scanner configuration.

use crate::config::Config;

/// Scanner configuration options.
pub struct ScannerConfig {
    /// Application configuration.
    pub app_config: Config,
    /// Application version.
    pub version: String,
}
