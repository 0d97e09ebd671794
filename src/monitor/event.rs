//! Events delivered to observers.

use crate::domain::{Opportunity, Venue};

/// MonitorEvent is everything an observer can receive.
///
/// Opportunities and feed health share one channel, tagged by variant, so a
/// consumer can tell "no opportunity" apart from "feed degraded".
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// A qualifying evaluation.
    Opportunity(Opportunity),
    /// A venue reported a delivery error; its slot is stale until the next sample.
    FeedDegraded {
        symbol: String,
        venue: Venue,
        error: String,
    },
    /// First fresh sample from a venue after it degraded.
    FeedRecovered { symbol: String, venue: Venue },
    /// Monitoring for a symbol could not be started.
    StartFailed { symbol: String, error: String },
}

impl MonitorEvent {
    /// Symbol the event is about.
    pub fn symbol(&self) -> &str {
        match self {
            MonitorEvent::Opportunity(opp) => &opp.symbol,
            MonitorEvent::FeedDegraded { symbol, .. }
            | MonitorEvent::FeedRecovered { symbol, .. }
            | MonitorEvent::StartFailed { symbol, .. } => symbol,
        }
    }

    /// Short event kind used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            MonitorEvent::Opportunity(_) => "opportunity",
            MonitorEvent::FeedDegraded { .. } => "feed_degraded",
            MonitorEvent::FeedRecovered { .. } => "feed_recovered",
            MonitorEvent::StartFailed { .. } => "start_failed",
        }
    }
}
