//! Subscription plumbing shared by all adapters.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::{PriceSample, Venue};

/// How long a release waits for the adapter task before aborting it.
const RELEASE_TIMEOUT: Duration = Duration::from_secs(5);

/// FeedEvent is what an adapter pushes to its subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A fresh price.
    Sample(PriceSample),
    /// The adapter failed to deliver; the venue's last price can no longer be trusted.
    Error { venue: Venue, message: String },
}

/// FeedSink is the delivery callback handed to an adapter on subscribe.
///
/// Every sample it produces is tagged with the sink's venue and symbol, so an
/// adapter cannot deliver prices for the wrong side.
#[derive(Debug, Clone)]
pub struct FeedSink {
    venue: Venue,
    symbol: String,
    tx: mpsc::UnboundedSender<FeedEvent>,
}

impl FeedSink {
    pub fn new(venue: Venue, symbol: impl Into<String>, tx: mpsc::UnboundedSender<FeedEvent>) -> Self {
        Self {
            venue,
            symbol: symbol.into(),
            tx,
        }
    }

    pub fn venue(&self) -> Venue {
        self.venue
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Delivers a price observed at `observed_at`.
    ///
    /// A non-positive price is reported as a delivery error instead.
    /// Returns false once the subscriber is gone.
    pub fn deliver(&self, price: Decimal, observed_at: DateTime<Utc>) -> bool {
        match PriceSample::at(self.venue, self.symbol.clone(), price, observed_at) {
            Ok(sample) => self.tx.send(FeedEvent::Sample(sample)).is_ok(),
            Err(e) => self.report_error(e.to_string()),
        }
    }

    /// Reports a delivery error. Returns false once the subscriber is gone.
    pub fn report_error(&self, message: impl Into<String>) -> bool {
        self.tx
            .send(FeedEvent::Error {
                venue: self.venue,
                message: message.into(),
            })
            .is_ok()
    }
}

/// SubscriptionHandle is the cancellation capability for one subscription.
///
/// Owned by whoever subscribed; released exactly once. Dropping an unreleased
/// handle aborts the adapter task.
#[derive(Debug)]
pub struct SubscriptionHandle {
    venue: Venue,
    symbol: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    released: bool,
}

impl SubscriptionHandle {
    /// Creates a handle for an adapter task that stops when `shutdown` fires.
    pub fn new(
        venue: Venue,
        symbol: impl Into<String>,
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            venue,
            symbol: symbol.into(),
            shutdown: Some(shutdown),
            task: Some(task),
            released: false,
        }
    }

    pub fn venue(&self) -> Venue {
        self.venue
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Stops the adapter task and waits for it to exit.
    pub async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(RELEASE_TIMEOUT, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_cancelled() => {}
                Ok(Err(e)) => {
                    warn!(venue = %self.venue, symbol = %self.symbol, error = %e, "feed task panicked");
                }
                Err(_) => {
                    warn!(venue = %self.venue, symbol = %self.symbol, "feed task did not stop in time, aborting");
                    task.abort();
                }
            }
        }

        debug!(venue = %self.venue, symbol = %self.symbol, "subscription released");
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
