//! Fee-aware arbitrage evaluation between the two venues.

mod error;
mod evaluator;

pub use error::ArbitrageError;
pub use evaluator::{DEFAULT_MIN_PROFIT_PERCENT, Evaluator};
