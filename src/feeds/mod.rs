//! Price feed adapters for the two venues.
//!
//! An adapter turns a venue's native data source into a stream of
//! [`PriceSample`](crate::domain::PriceSample)s for one symbol. The monitor only
//! talks to the [`FeedAdapter`] trait, so either side can be swapped out.

mod binance;
mod jupiter;
mod subscription;

pub use binance::{BinanceClient, BinanceFeedConfig, BinanceTickerFeed};
pub use jupiter::{JupiterFeedConfig, JupiterQuoteFeed};
pub use subscription::{FeedEvent, FeedSink, SubscriptionHandle};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Venue;

/// Feed errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// The venue has no market for this symbol.
    #[error("symbol {0} is not supported")]
    UnsupportedSymbol(String),

    /// Connection could not be established.
    #[error("connection error: {0}")]
    Connection(String),

    /// HTTP request failed.
    #[error("request error: {0}")]
    Request(String),

    /// Venue response could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Stream was closed by the venue.
    #[error("stream closed: {0}")]
    Closed(String),
}

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;

/// FeedAdapter opens per-symbol price subscriptions on one venue.
#[async_trait]
pub trait FeedAdapter: Send + Sync {
    /// Venue every sample from this adapter is tagged with.
    fn venue(&self) -> Venue;

    /// Short adapter name used in logs (e.g., "binance").
    fn name(&self) -> &str;

    /// Subscribe starts delivering samples for `symbol` into `sink`.
    ///
    /// Returns once the subscription is set up; it does not wait for the first
    /// price. Delivery problems after setup are reported through the sink.
    async fn subscribe(&self, symbol: &str, sink: FeedSink) -> Result<SubscriptionHandle>;

    /// Unsubscribe releases a subscription. Releasing an already released
    /// handle is a no-op.
    async fn unsubscribe(&self, handle: &mut SubscriptionHandle) {
        handle.release().await;
    }
}
