//! Venue A: Binance spot ticker.

mod client;
mod websocket;

pub use client::BinanceClient;
pub use websocket::{BinanceFeedConfig, BinanceTickerFeed};
