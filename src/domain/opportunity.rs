//! Cross-venue arbitrage opportunity domain model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Venue;

/// Opportunity represents a price gap between the two venues that stays
/// profitable after fees.
///
/// Invariants: `buy_price < sell_price`, `net_profit = gross_profit - total_fees`,
/// and `net_profit_percent` is at least the threshold it was evaluated against.
/// Records are emitted once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    /// Identifier built from symbol, venues and evaluation time.
    pub id: String,
    /// Base asset symbol (e.g., "SOL").
    pub symbol: String,
    /// Venue quoting the lower price.
    pub buy_venue: Venue,
    /// Venue quoting the higher price.
    pub sell_venue: Venue,
    /// Price on the buy venue.
    pub buy_price: Decimal,
    /// Price on the sell venue.
    pub sell_price: Decimal,
    /// Price gap relative to the lower price, in percent.
    pub spread_percent: Decimal,
    /// Trade size in quote currency the profit and fees were computed for.
    pub notional: Decimal,
    /// Base asset quantity the notional buys at the buy price.
    pub quantity: Decimal,
    /// Profit before fees.
    pub gross_profit: Decimal,
    /// Proportional fee on the buy venue.
    pub buy_fee: Decimal,
    /// Proportional fee on the sell venue.
    pub sell_fee: Decimal,
    /// Network fee converted at the sell price.
    pub network_fee: Decimal,
    /// Sum of all fees.
    pub total_fees: Decimal,
    /// Profit after all fees.
    pub net_profit: Decimal,
    /// Net profit as a percentage of the notional.
    pub net_profit_percent: Decimal,
    /// When the evaluation was made (not when either price was observed).
    pub timestamp: DateTime<Utc>,
}

impl Opportunity {
    /// Builds the identifier used for an opportunity.
    pub fn make_id(symbol: &str, buy_venue: Venue, sell_venue: Venue, at: DateTime<Utc>) -> String {
        format!(
            "{}-{}-{}-{}",
            symbol,
            buy_venue,
            sell_venue,
            at.timestamp_millis()
        )
    }
}
