//! Price samples produced by feed adapters.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Venue;
use crate::arbitrage::ArbitrageError;

/// PriceSample is a single price observation from one venue.
///
/// Samples are immutable once built. A feed adapter produces them and exactly
/// one symbol coordinator consumes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    /// Venue that produced the sample.
    pub venue: Venue,
    /// Base asset symbol (e.g., "SOL").
    pub symbol: String,
    /// Price in quote currency. Always positive.
    pub price: Decimal,
    /// When the adapter observed the price.
    pub observed_at: DateTime<Utc>,
}

impl PriceSample {
    /// Creates a sample observed now.
    pub fn new(
        venue: Venue,
        symbol: impl Into<String>,
        price: Decimal,
    ) -> Result<Self, ArbitrageError> {
        Self::at(venue, symbol, price, Utc::now())
    }

    /// Creates a sample with an explicit observation time.
    pub fn at(
        venue: Venue,
        symbol: impl Into<String>,
        price: Decimal,
        observed_at: DateTime<Utc>,
    ) -> Result<Self, ArbitrageError> {
        if price <= Decimal::ZERO {
            return Err(ArbitrageError::InvalidArgument(format!(
                "price must be positive, got {}",
                price
            )));
        }

        Ok(Self {
            venue,
            symbol: symbol.into(),
            price,
            observed_at,
        })
    }
}
