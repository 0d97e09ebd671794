//! Monitor configuration: evaluation threshold, trade size and fee rates.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use super::ConfigError;
use crate::arbitrage::{DEFAULT_MIN_PROFIT_PERCENT, Evaluator};
use crate::domain::FeeModel;

/// Default trade size in quote units (USDC).
const DEFAULT_TRADING_NOTIONAL: i64 = 1000;

/// Evaluation settings. Decimal values are strings to keep them exact.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorConfig {
    /// Minimum net profit, in percent of notional, for an opportunity (default "0.5").
    pub minimum_profit_threshold_percent: Option<String>,
    /// Trade size in quote units (default "1000").
    pub trading_notional: Option<String>,
    /// Venue A taker fee rate (default "0.001").
    pub venue_a_fee: Option<String>,
    /// Venue B swap fee rate (default "0.003").
    pub venue_b_swap_fee: Option<String>,
    /// Venue B network fee in base asset units (default "0.000005").
    pub venue_b_network_fee: Option<String>,
}

impl MonitorConfig {
    /// Builds the fee model, using defaults for unset rates.
    pub fn fee_model(&self) -> Result<FeeModel, ConfigError> {
        let defaults = FeeModel::default();

        let venue_a_taker = parse_or("venue_a_fee", &self.venue_a_fee, defaults.venue_a_taker)?;
        let venue_b_swap = parse_or(
            "venue_b_swap_fee",
            &self.venue_b_swap_fee,
            defaults.venue_b_swap,
        )?;
        let venue_b_network = parse_or(
            "venue_b_network_fee",
            &self.venue_b_network_fee,
            defaults.venue_b_network,
        )?;

        FeeModel::new(venue_a_taker, venue_b_swap, venue_b_network)
            .map_err(|e| ConfigError::Validation(format!("monitor: {}", e)))
    }

    pub fn trading_notional(&self) -> Result<Decimal, ConfigError> {
        let notional = parse_or(
            "trading_notional",
            &self.trading_notional,
            Decimal::from(DEFAULT_TRADING_NOTIONAL),
        )?;
        if notional <= Decimal::ZERO {
            return Err(ConfigError::Validation(
                "monitor.trading_notional must be positive".into(),
            ));
        }
        Ok(notional)
    }

    pub fn minimum_profit_threshold_percent(&self) -> Result<Decimal, ConfigError> {
        parse_or(
            "minimum_profit_threshold_percent",
            &self.minimum_profit_threshold_percent,
            DEFAULT_MIN_PROFIT_PERCENT,
        )
    }

    /// Builds the evaluator from all monitor settings.
    pub fn evaluator(&self) -> Result<Evaluator, ConfigError> {
        Evaluator::new(
            self.fee_model()?,
            self.trading_notional()?,
            self.minimum_profit_threshold_percent()?,
        )
        .map_err(|e| ConfigError::Validation(format!("monitor: {}", e)))
    }
}

fn parse_or(field: &str, value: &Option<String>, default: Decimal) -> Result<Decimal, ConfigError> {
    match value {
        Some(raw) => Decimal::from_str(raw.trim()).map_err(|e| {
            ConfigError::Validation(format!("monitor.{}: invalid decimal {:?}: {}", field, raw, e))
        }),
        None => Ok(default),
    }
}
