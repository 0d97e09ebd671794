//! Binance 24h ticker WebSocket feed.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use super::client::BASE_HTTP_API_URL;
use crate::config::BinanceVenueConfig;
use crate::domain::Venue;
use crate::feeds::{FeedAdapter, FeedError, FeedSink, Result, SubscriptionHandle};

const ADAPTER_NAME: &str = "binance";

/// Binance stream endpoint.
const WEBSOCKET_URL: &str = "wss://stream.binance.com:9443/ws";

/// Default quote asset of monitored pairs.
const DEFAULT_QUOTE_ASSET: &str = "USDC";

/// Default delay before reconnecting.
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Runtime settings of the Binance adapter.
#[derive(Debug, Clone)]
pub struct BinanceFeedConfig {
    /// REST endpoint used for pair discovery.
    pub rest_url: String,
    /// Stream endpoint; the per-symbol stream name is appended.
    pub ws_url: String,
    /// Quote asset of the monitored pairs (e.g., "USDC").
    pub quote_asset: String,
    /// Delay before attempting reconnection.
    pub reconnect_delay: Duration,
}

impl Default for BinanceFeedConfig {
    fn default() -> Self {
        Self {
            rest_url: BASE_HTTP_API_URL.to_string(),
            ws_url: WEBSOCKET_URL.to_string(),
            quote_asset: DEFAULT_QUOTE_ASSET.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl BinanceFeedConfig {
    /// Creates settings from the venue config, filling in defaults.
    pub fn from_config(config: Option<&BinanceVenueConfig>) -> Self {
        let defaults = Self::default();
        let Some(config) = config else {
            return defaults;
        };

        Self {
            rest_url: config.rest_url.clone().unwrap_or(defaults.rest_url),
            ws_url: config.ws_url.clone().unwrap_or(defaults.ws_url),
            quote_asset: config.quote_asset.clone().unwrap_or(defaults.quote_asset),
            reconnect_delay: if config.reconnect_delay.is_zero() {
                defaults.reconnect_delay
            } else {
                config.reconnect_delay
            },
        }
    }

    /// Stream URL for a symbol, e.g. `.../solusdc@ticker`.
    fn stream_url(&self, symbol: &str) -> String {
        format!(
            "{}/{}{}@ticker",
            self.ws_url.trim_end_matches('/'),
            symbol.to_lowercase(),
            self.quote_asset.to_lowercase()
        )
    }
}

/// BinanceTickerFeed delivers the last traded price of `{symbol}{quote}`
/// from the 24h ticker stream. One socket per subscription.
pub struct BinanceTickerFeed {
    config: BinanceFeedConfig,
}

impl BinanceTickerFeed {
    pub fn new(config: BinanceFeedConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl FeedAdapter for BinanceTickerFeed {
    fn venue(&self) -> Venue {
        Venue::VenueA
    }

    fn name(&self) -> &str {
        ADAPTER_NAME
    }

    async fn subscribe(&self, symbol: &str, sink: FeedSink) -> Result<SubscriptionHandle> {
        let url = self.config.stream_url(symbol);
        info!(url = %url, symbol = %symbol, "connecting to ticker stream");

        let (stream, _response) = connect_async(&url).await.map_err(|e| {
            error!(error = %e, url = %url, "failed to connect to ticker stream");
            FeedError::Connection(e.to_string())
        })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let reconnect_delay = self.config.reconnect_delay;
        let task = tokio::spawn(read_loop(stream, url, reconnect_delay, sink, shutdown_rx));

        Ok(SubscriptionHandle::new(Venue::VenueA, symbol, shutdown_tx, task))
    }
}

/// Reads ticker messages until shutdown, reconnecting after stream failures.
async fn read_loop(
    mut stream: WsStream,
    url: String,
    reconnect_delay: Duration,
    sink: FeedSink,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        let failure = tokio::select! {
            _ = &mut shutdown => break,
            msg = stream.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => {
                    match parse_ticker(&text) {
                        Ok(Some((price, observed_at))) => {
                            if !sink.deliver(price, observed_at) {
                                debug!(symbol = %sink.symbol(), "subscriber gone");
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(error = %e, "unparseable ticker message");
                            if !sink.report_error(e.to_string()) {
                                break;
                            }
                        }
                    }
                    None
                }
                Some(Ok(WsMessage::Close(_))) => Some(FeedError::Closed("closed by server".into())),
                Some(Ok(_)) => None,
                Some(Err(e)) => Some(FeedError::Connection(e.to_string())),
                None => Some(FeedError::Closed("stream ended".into())),
            },
        };

        let Some(failure) = failure else {
            continue;
        };

        warn!(symbol = %sink.symbol(), error = %failure, "ticker stream failed");
        if !sink.report_error(failure.to_string()) {
            break;
        }

        match reconnect(&url, reconnect_delay, &sink, &mut shutdown).await {
            Some(new_stream) => stream = new_stream,
            None => return,
        }
    }

    if let Err(e) = stream.close(None).await {
        debug!(error = %e, "ticker stream close failed");
    }
    debug!(symbol = %sink.symbol(), "ticker read loop stopped");
}

/// Reconnects after `delay` until it succeeds or shutdown fires.
async fn reconnect(
    url: &str,
    delay: Duration,
    sink: &FeedSink,
    shutdown: &mut oneshot::Receiver<()>,
) -> Option<WsStream> {
    loop {
        info!(delay = ?delay, url = %url, "reconnecting");

        tokio::select! {
            _ = &mut *shutdown => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        let attempt = tokio::select! {
            _ = &mut *shutdown => return None,
            res = connect_async(url) => res,
        };

        match attempt {
            Ok((stream, _)) => {
                info!(url = %url, "ticker stream reconnected");
                return Some(stream);
            }
            Err(e) => {
                error!(error = %e, "reconnect failed");
                if !sink.report_error(format!("reconnect failed: {}", e)) {
                    return None;
                }
            }
        }
    }
}

/// 24h ticker payload. Only the fields we use.
#[derive(Debug, Deserialize)]
struct TickerMessage {
    /// Event type, "24hrTicker".
    #[serde(rename = "e")]
    event: Option<String>,
    /// Event time in milliseconds.
    #[serde(rename = "E")]
    event_time: Option<i64>,
    /// Last price.
    #[serde(rename = "c")]
    last_price: Option<String>,
}

/// Parses a ticker message into a price and its event time.
/// Returns None for non-ticker messages (subscription results, etc.).
fn parse_ticker(data: &str) -> Result<Option<(Decimal, DateTime<Utc>)>> {
    let msg: TickerMessage =
        serde_json::from_str(data).map_err(|e| FeedError::Parse(e.to_string()))?;

    if msg.event.as_deref() != Some("24hrTicker") {
        return Ok(None);
    }

    let raw = msg
        .last_price
        .ok_or_else(|| FeedError::Parse("ticker without last price".into()))?;
    let price = Decimal::from_str(&raw)
        .map_err(|e| FeedError::Parse(format!("invalid last price {}: {}", raw, e)))?;

    let observed_at = msg
        .event_time
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now);

    Ok(Some((price, observed_at)))
}
