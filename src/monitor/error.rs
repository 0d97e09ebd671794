//! Monitor error types.

use thiserror::Error;

use crate::domain::Venue;
use crate::feeds::FeedError;

/// Errors from starting a symbol coordinator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MonitorError {
    /// A venue adapter could not set up its feed. Not retried here.
    #[error("subscription to {venue} for {symbol} failed: {source}")]
    SubscriptionFailed {
        symbol: String,
        venue: Venue,
        #[source]
        source: FeedError,
    },

    /// A stop was issued while the start was in progress.
    #[error("start of {symbol} was cancelled by stop")]
    Cancelled { symbol: String },
}
