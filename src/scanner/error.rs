//! Scanner error types.

use crate::config::ConfigError;
use crate::feeds::FeedError;
use crate::storage::StorageError;

/// Scanner error type.
#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    #[error("scanner is already running")]
    AlreadyRunning,
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("no symbols to monitor")]
    NoSymbols,
    #[error("monitoring failed to start for every symbol")]
    NothingStarted,
}
