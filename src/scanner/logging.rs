//! Observer that writes monitor events to the log.

use tracing::{debug, info};

use crate::monitor::{MonitorEvent, Observer};

/// Logs every opportunity at info; feed health and start failures are
/// already logged where they happen, so they go to debug here.
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl Observer for LoggingObserver {
    fn notify(&self, event: MonitorEvent) {
        match &event {
            MonitorEvent::Opportunity(opp) => info!(
                id = %opp.id,
                symbol = %opp.symbol,
                buy = opp.buy_venue.label(),
                sell = opp.sell_venue.label(),
                buy_price = %opp.buy_price,
                sell_price = %opp.sell_price,
                spread_percent = %opp.spread_percent.round_dp(4),
                net_profit = %opp.net_profit.round_dp(4),
                net_profit_percent = %opp.net_profit_percent.round_dp(4),
                "Opportunity"
            ),
            other => debug!(symbol = %other.symbol(), kind = other.kind(), "Monitor event"),
        }
    }
}
