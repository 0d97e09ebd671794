//! Venue adapter configuration.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::duration;

/// Settings for both venues.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VenuesConfig {
    /// Venue A: Binance spot ticker stream (optional, defaults apply).
    pub binance: Option<BinanceVenueConfig>,
    /// Venue B: Jupiter route quotes. Token mints are required per symbol.
    #[serde(default)]
    pub jupiter: JupiterVenueConfig,
}

/// Binance adapter settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BinanceVenueConfig {
    /// REST API base URL, used for symbol discovery.
    pub rest_url: Option<String>,
    /// WebSocket base URL for ticker streams.
    pub ws_url: Option<String>,
    /// Quote asset the base symbols are paired with (default "USDC").
    pub quote_asset: Option<String>,
    /// Delay before reconnecting a dropped stream (default: 5s).
    #[serde(default, with = "duration")]
    pub reconnect_delay: Duration,
}

/// Jupiter adapter settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JupiterVenueConfig {
    /// Quote API endpoint.
    pub quote_url: Option<String>,
    /// Mint prices are quoted into (default: USDC).
    pub output_mint: Option<String>,
    /// Decimals of the output mint (default: 6).
    pub output_decimals: Option<u32>,
    /// Allowed slippage in basis points (default: 50).
    pub slippage_bps: Option<u32>,
    /// Interval between quote requests (default: 10s).
    #[serde(default, with = "duration")]
    pub poll_interval: Duration,
    /// Base asset symbol to token mint.
    #[serde(default)]
    pub tokens: HashMap<String, TokenConfig>,
}

impl JupiterVenueConfig {
    /// Returns true if a mint is configured for `symbol` (case-insensitive).
    pub fn supports(&self, symbol: &str) -> bool {
        self.tokens.keys().any(|k| k.eq_ignore_ascii_case(symbol))
    }
}

/// Solana token mint of a base asset.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub mint: String,
    pub decimals: u32,
}
