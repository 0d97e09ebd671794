//! Runtime statistics collected from monitor events.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::monitor::{MonitorEvent, Observer};

/// Runtime statistics for the scanner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    pub opportunities: u64,
    pub feed_errors: u64,
    pub feed_recoveries: u64,
    pub start_failures: u64,
    pub total_net_profit: Decimal,
    pub best_net_profit_percent: Option<Decimal>,
    pub last_opportunity_at: Option<DateTime<Utc>>,
}

impl Stats {
    fn record(&mut self, event: &MonitorEvent) {
        match event {
            MonitorEvent::Opportunity(opp) => {
                self.opportunities += 1;
                self.total_net_profit += opp.net_profit;
                self.last_opportunity_at = Some(opp.timestamp);
                if self
                    .best_net_profit_percent
                    .is_none_or(|best| opp.net_profit_percent > best)
                {
                    self.best_net_profit_percent = Some(opp.net_profit_percent);
                }
            }
            MonitorEvent::FeedDegraded { .. } => self.feed_errors += 1,
            MonitorEvent::FeedRecovered { .. } => self.feed_recoveries += 1,
            MonitorEvent::StartFailed { .. } => self.start_failures += 1,
        }
    }
}

/// Observer that accumulates [`Stats`].
#[derive(Debug, Default)]
pub struct StatsObserver {
    stats: Mutex<Stats>,
}

impl StatsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current statistics.
    pub fn snapshot(&self) -> Stats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Observer for StatsObserver {
    fn notify(&self, event: MonitorEvent) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(&event);
    }
}
