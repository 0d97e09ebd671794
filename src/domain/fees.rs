//! Venue fee model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Venue;
use crate::arbitrage::ArbitrageError;

/// FeeModel holds the fee schedule of both venues.
///
/// Rates are expressed as decimals (e.g., 0.001 for 0.1%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeModel {
    /// Taker fee charged by venue A on the traded notional.
    pub venue_a_taker: Decimal,
    /// Swap fee charged by venue B on the traded notional.
    pub venue_b_swap: Decimal,
    /// Fixed network fee of venue B, in units of the base asset.
    pub venue_b_network: Decimal,
}

impl Default for FeeModel {
    fn default() -> Self {
        Self {
            venue_a_taker: Decimal::new(1, 3),
            venue_b_swap: Decimal::new(3, 3),
            venue_b_network: Decimal::new(5, 6),
        }
    }
}

impl FeeModel {
    /// Creates a fee model, rejecting negative rates.
    pub fn new(
        venue_a_taker: Decimal,
        venue_b_swap: Decimal,
        venue_b_network: Decimal,
    ) -> Result<Self, ArbitrageError> {
        for (name, value) in [
            ("venue_a_taker", venue_a_taker),
            ("venue_b_swap", venue_b_swap),
            ("venue_b_network", venue_b_network),
        ] {
            if value < Decimal::ZERO {
                return Err(ArbitrageError::InvalidArgument(format!(
                    "{} must not be negative, got {}",
                    name, value
                )));
            }
        }

        Ok(Self {
            venue_a_taker,
            venue_b_swap,
            venue_b_network,
        })
    }

    /// Returns the total fee a venue charges for trading `notional`, in the
    /// notional's currency.
    ///
    /// `conversion_price` converts venue B's network fee from base asset into
    /// notional currency; the evaluator passes the sell price.
    pub fn fee(
        &self,
        venue: Venue,
        notional: Decimal,
        conversion_price: Decimal,
    ) -> Result<Decimal, ArbitrageError> {
        self.proportional_fee(venue, notional)?
            .checked_add(self.network_fee(venue, conversion_price)?)
            .ok_or_else(|| out_of_range("fee", venue))
    }

    /// Returns the part of the fee that scales with the notional.
    pub fn proportional_fee(&self, venue: Venue, notional: Decimal) -> Result<Decimal, ArbitrageError> {
        if notional < Decimal::ZERO {
            return Err(ArbitrageError::InvalidArgument(format!(
                "notional must not be negative, got {}",
                notional
            )));
        }

        let rate = match venue {
            Venue::VenueA => self.venue_a_taker,
            Venue::VenueB => self.venue_b_swap,
        };

        notional
            .checked_mul(rate)
            .ok_or_else(|| out_of_range("proportional fee", venue))
    }

    /// Returns the fixed network fee of a venue converted at `conversion_price`.
    /// Zero for venues without one.
    pub fn network_fee(&self, venue: Venue, conversion_price: Decimal) -> Result<Decimal, ArbitrageError> {
        if conversion_price <= Decimal::ZERO {
            return Err(ArbitrageError::InvalidArgument(format!(
                "conversion price must be positive, got {}",
                conversion_price
            )));
        }

        match venue {
            Venue::VenueA => Ok(Decimal::ZERO),
            Venue::VenueB => self
                .venue_b_network
                .checked_mul(conversion_price)
                .ok_or_else(|| out_of_range("network fee", venue)),
        }
    }
}

fn out_of_range(what: &str, venue: Venue) -> ArbitrageError {
    ArbitrageError::InvalidArgument(format!("{} {} is out of decimal range", venue, what))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> FeeModel {
        FeeModel::new(Decimal::new(1, 3), Decimal::new(3, 3), Decimal::new(5, 3)).unwrap()
    }

    #[test]
    fn test_venue_a_is_taker_only() {
        let fee = model()
            .fee(Venue::VenueA, Decimal::from(1000), Decimal::from(100))
            .unwrap();
        assert_eq!(fee, Decimal::from(1));
    }

    #[test]
    fn test_venue_b_adds_converted_network_fee() {
        // 1000 * 0.003 + 0.005 * 100
        let fee = model()
            .fee(Venue::VenueB, Decimal::from(1000), Decimal::from(100))
            .unwrap();
        assert_eq!(fee, Decimal::new(35, 1));
    }

    #[test]
    fn test_zero_notional_still_pays_network_fee() {
        let fee = model()
            .fee(Venue::VenueB, Decimal::ZERO, Decimal::from(200))
            .unwrap();
        assert_eq!(fee, Decimal::from(1));
    }

    #[test]
    fn test_negative_notional_rejected() {
        let result = model().fee(Venue::VenueA, Decimal::from(-5), Decimal::from(100));
        assert!(matches!(result, Err(ArbitrageError::InvalidArgument(_))));
    }

    #[test]
    fn test_non_positive_conversion_price_rejected() {
        let result = model().fee(Venue::VenueB, Decimal::from(10), Decimal::ZERO);
        assert!(matches!(result, Err(ArbitrageError::InvalidArgument(_))));
    }

    #[test]
    fn test_overflowing_fee_rejected() {
        let fees = FeeModel::new(Decimal::ONE, Decimal::ONE, Decimal::MAX).unwrap();

        let network = fees.network_fee(Venue::VenueB, Decimal::from(2));
        assert!(matches!(network, Err(ArbitrageError::InvalidArgument(_))));

        let total = fees.fee(Venue::VenueA, Decimal::MAX, Decimal::ONE).unwrap();
        assert_eq!(total, Decimal::MAX);
        let total = fees.fee(Venue::VenueB, Decimal::MAX, Decimal::ONE);
        assert!(matches!(total, Err(ArbitrageError::InvalidArgument(_))));
    }

    #[test]
    fn test_negative_rate_rejected() {
        let result = FeeModel::new(Decimal::new(-1, 3), Decimal::ZERO, Decimal::ZERO);
        assert!(matches!(result, Err(ArbitrageError::InvalidArgument(_))));
    }

    #[test]
    fn test_default_schedule() {
        let fees = FeeModel::default();
        assert_eq!(fees.venue_a_taker, Decimal::new(1, 3));
        assert_eq!(fees.venue_b_swap, Decimal::new(3, 3));
        assert_eq!(fees.venue_b_network, Decimal::new(5, 6));
    }
}
