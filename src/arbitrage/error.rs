//! Arbitrage evaluation error types.

use thiserror::Error;

/// Errors raised by the fee model and the evaluator.
///
/// Both are pure: any error is a caller contract violation and is returned
/// synchronously, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArbitrageError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
