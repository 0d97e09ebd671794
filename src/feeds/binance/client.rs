//! HTTP client for the public Binance Spot API.

use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::Deserialize;
use tracing::{debug, info};

use crate::feeds::{FeedError, Result};

/// Production Binance HTTP API endpoint.
pub(crate) const BASE_HTTP_API_URL: &str = "https://api.binance.com";

/// HTTP request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Status of a pair that accepts orders.
const TRADING_STATUS: &str = "TRADING";

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    base_asset: String,
    quote_asset: String,
    status: String,
}

/// HTTP client for the public Binance Spot API.
/// Only unauthenticated market metadata is used.
pub struct BinanceClient {
    http_client: HttpClient,
    base_url: String,
    quote_asset: String,
}

impl BinanceClient {
    /// Creates a client that lists pairs quoted in `quote_asset`.
    pub fn new(base_url: impl Into<String>, quote_asset: impl Into<String>) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FeedError::Request(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            quote_asset: quote_asset.into().to_uppercase(),
        })
    }

    /// Returns the base assets of all trading pairs quoted in the client's
    /// quote asset (e.g., "SOL" for "SOLUSDC").
    pub async fn tradable_base_assets(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        debug!(url = %url, "fetching exchange info");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| FeedError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| FeedError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(FeedError::Request(format!(
                "exchangeInfo returned {}: {}",
                status,
                String::from_utf8_lossy(&body)
            )));
        }

        let assets = parse_base_assets(&body, &self.quote_asset)?;
        info!(quote = %self.quote_asset, count = assets.len(), "tradable pairs loaded");

        Ok(assets)
    }
}

/// Extracts trading base assets quoted in `quote_asset` from an exchangeInfo body.
fn parse_base_assets(body: &[u8], quote_asset: &str) -> Result<Vec<String>> {
    let info: ExchangeInfo =
        serde_json::from_slice(body).map_err(|e| FeedError::Parse(e.to_string()))?;

    Ok(info
        .symbols
        .into_iter()
        .filter(|s| s.quote_asset == quote_asset && s.status == TRADING_STATUS)
        .map(|s| s.base_asset)
        .collect())
}
