//! Venue B: Jupiter route-quote feed, sampled on a fixed interval.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client as HttpClient;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::JupiterVenueConfig;
use crate::domain::Venue;
use crate::feeds::{FeedAdapter, FeedError, FeedSink, Result, SubscriptionHandle};

const ADAPTER_NAME: &str = "jupiter";

/// Jupiter quote endpoint.
const QUOTE_API_URL: &str = "https://quote-api.jup.ag/v6/quote";

/// USDC mint on Solana.
const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// USDC has 6 decimals.
const USDC_DECIMALS: u32 = 6;

/// 0.5% slippage.
const DEFAULT_SLIPPAGE_BPS: u32 = 50;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Token mint and decimals of a base asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMint {
    pub mint: String,
    pub decimals: u32,
}

/// Runtime settings of the Jupiter adapter.
#[derive(Debug, Clone)]
pub struct JupiterFeedConfig {
    pub quote_url: String,
    /// Mint the base asset is quoted into.
    pub output_mint: String,
    pub output_decimals: u32,
    pub slippage_bps: u32,
    pub poll_interval: Duration,
    /// Base asset symbol (uppercase) to mint.
    pub tokens: HashMap<String, TokenMint>,
}

impl Default for JupiterFeedConfig {
    fn default() -> Self {
        Self {
            quote_url: QUOTE_API_URL.to_string(),
            output_mint: USDC_MINT.to_string(),
            output_decimals: USDC_DECIMALS,
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            tokens: HashMap::new(),
        }
    }
}

impl JupiterFeedConfig {
    /// Creates settings from the venue config, filling in defaults.
    pub fn from_config(config: &JupiterVenueConfig) -> Self {
        let defaults = Self::default();

        Self {
            quote_url: config.quote_url.clone().unwrap_or(defaults.quote_url),
            output_mint: config.output_mint.clone().unwrap_or(defaults.output_mint),
            output_decimals: config.output_decimals.unwrap_or(defaults.output_decimals),
            slippage_bps: config.slippage_bps.unwrap_or(defaults.slippage_bps),
            poll_interval: if config.poll_interval.is_zero() {
                defaults.poll_interval
            } else {
                config.poll_interval
            },
            tokens: config
                .tokens
                .iter()
                .map(|(symbol, token)| {
                    (
                        symbol.to_uppercase(),
                        TokenMint {
                            mint: token.mint.clone(),
                            decimals: token.decimals,
                        },
                    )
                })
                .collect(),
        }
    }

    /// Returns the mint configured for `symbol`, if any.
    pub fn token(&self, symbol: &str) -> Option<&TokenMint> {
        self.tokens.get(&symbol.to_uppercase())
    }
}

/// JupiterQuoteFeed prices one whole base token by asking for the best route
/// into the output mint, every `poll_interval`.
pub struct JupiterQuoteFeed {
    config: JupiterFeedConfig,
    http_client: HttpClient,
}

impl JupiterQuoteFeed {
    pub fn new(config: JupiterFeedConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FeedError::Request(format!("failed to build http client: {}", e)))?;

        Ok(Self { config, http_client })
    }

    /// Returns true if a mint is configured for `symbol`.
    pub fn supports(&self, symbol: &str) -> bool {
        self.config.token(symbol).is_some()
    }
}

#[async_trait]
impl FeedAdapter for JupiterQuoteFeed {
    fn venue(&self) -> Venue {
        Venue::VenueB
    }

    fn name(&self) -> &str {
        ADAPTER_NAME
    }

    async fn subscribe(&self, symbol: &str, sink: FeedSink) -> Result<SubscriptionHandle> {
        let token = self
            .config
            .token(symbol)
            .cloned()
            .ok_or_else(|| FeedError::UnsupportedSymbol(symbol.to_string()))?;

        let request = QuoteRequest::new(&self.config, &token)?;

        info!(
            symbol = %symbol,
            mint = %token.mint,
            interval = ?self.config.poll_interval,
            "starting quote polling"
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(poll_loop(
            self.http_client.clone(),
            request,
            self.config.poll_interval,
            sink,
            shutdown_rx,
        ));

        Ok(SubscriptionHandle::new(Venue::VenueB, symbol, shutdown_tx, task))
    }
}

/// Quote request parameters for one token.
#[derive(Debug, Clone)]
struct QuoteRequest {
    url: String,
    input_mint: String,
    output_mint: String,
    /// One whole token in its smallest unit.
    amount: u64,
    slippage_bps: u32,
    output_decimals: u32,
}

impl QuoteRequest {
    fn new(config: &JupiterFeedConfig, token: &TokenMint) -> Result<Self> {
        let amount = 10u64.checked_pow(token.decimals).ok_or_else(|| {
            FeedError::UnsupportedSymbol(format!("mint {} has {} decimals", token.mint, token.decimals))
        })?;

        Ok(Self {
            url: config.quote_url.clone(),
            input_mint: token.mint.clone(),
            output_mint: config.output_mint.clone(),
            amount,
            slippage_bps: config.slippage_bps,
            output_decimals: config.output_decimals,
        })
    }

    async fn fetch(&self, http_client: &HttpClient) -> Result<Option<Decimal>> {
        let amount = self.amount.to_string();
        let slippage = self.slippage_bps.to_string();

        let response = http_client
            .get(&self.url)
            .query(&[
                ("inputMint", self.input_mint.as_str()),
                ("outputMint", self.output_mint.as_str()),
                ("amount", amount.as_str()),
                ("slippageBps", slippage.as_str()),
            ])
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
                "quote returned {}: {}",
                status,
                String::from_utf8_lossy(&body)
            )));
        }

        parse_quote(&body, self.output_decimals)
    }
}

/// Polls the quote endpoint until shutdown.
async fn poll_loop(
    http_client: HttpClient,
    request: QuoteRequest,
    poll_interval: Duration,
    sink: FeedSink,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = interval.tick() => {}
        }

        let result = tokio::select! {
            _ = &mut shutdown => break,
            res = request.fetch(&http_client) => res,
        };

        let delivered = match result {
            Ok(Some(price)) => sink.deliver(price, Utc::now()),
            Ok(None) => {
                debug!(symbol = %sink.symbol(), "no route found");
                true
            }
            Err(e) => {
                warn!(symbol = %sink.symbol(), error = %e, "quote request failed");
                sink.report_error(e.to_string())
            }
        };

        if !delivered {
            debug!(symbol = %sink.symbol(), "subscriber gone");
            break;
        }
    }

    debug!(symbol = %sink.symbol(), "quote polling stopped");
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    out_amount: Option<String>,
    #[serde(default)]
    route_plan: Vec<serde_json::Value>,
}

/// Converts a quote body into the price of one whole input token.
/// Returns None when no route was found.
fn parse_quote(body: &[u8], output_decimals: u32) -> Result<Option<Decimal>> {
    let quote: QuoteResponse =
        serde_json::from_slice(body).map_err(|e| FeedError::Parse(e.to_string()))?;

    let Some(raw) = quote.out_amount else {
        return Ok(None);
    };
    if quote.route_plan.is_empty() {
        return Ok(None);
    }

    let out_amount = i128::from_str(&raw)
        .map_err(|e| FeedError::Parse(format!("invalid outAmount {}: {}", raw, e)))?;

    Decimal::try_from_i128_with_scale(out_amount, output_decimals)
        .map(|price| Some(price.normalize()))
        .map_err(|e| FeedError::Parse(format!("outAmount {} out of range: {}", raw, e)))
}
