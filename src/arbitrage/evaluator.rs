//! Opportunity evaluator.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::ArbitrageError;
use crate::domain::{FeeModel, Opportunity, PriceSample};

/// Default minimum net profit, in percent of the notional.
pub const DEFAULT_MIN_PROFIT_PERCENT: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Evaluates the latest sample of each venue.
///
/// Returns `Ok(None)` when either sample is absent, when both prices are equal,
/// or when the net profit percent is below `min_profit_percent`. The returned
/// opportunity is timestamped with the current time.
pub fn evaluate(
    fees: &FeeModel,
    sample_a: Option<&PriceSample>,
    sample_b: Option<&PriceSample>,
    notional: Decimal,
    min_profit_percent: Decimal,
) -> Result<Option<Opportunity>, ArbitrageError> {
    evaluate_at(fees, sample_a, sample_b, notional, min_profit_percent, Utc::now())
}

/// Same as [`evaluate`] with an explicit evaluation time.
pub fn evaluate_at(
    fees: &FeeModel,
    sample_a: Option<&PriceSample>,
    sample_b: Option<&PriceSample>,
    notional: Decimal,
    min_profit_percent: Decimal,
    now: DateTime<Utc>,
) -> Result<Option<Opportunity>, ArbitrageError> {
    if notional <= Decimal::ZERO {
        return Err(ArbitrageError::InvalidArgument(format!(
            "notional must be positive, got {}",
            notional
        )));
    }

    // A missing side is never filled in.
    let (Some(a), Some(b)) = (sample_a, sample_b) else {
        return Ok(None);
    };

    validate_pair(a, b)?;

    if a.price == b.price {
        return Ok(None);
    }

    let (buy, sell) = if a.price < b.price { (a, b) } else { (b, a) };
    let spread = sell.price - buy.price;

    // The notional is quote-denominated; it buys `quantity` base units.
    let quantity = checked(notional.checked_div(buy.price), "quantity")?;
    let spread_percent = checked(
        spread.checked_div(buy.price).and_then(|r| r.checked_mul(HUNDRED)),
        "spread percent",
    )?;
    let gross_profit = checked(spread.checked_mul(quantity), "gross profit")?;

    let buy_fee = fees.proportional_fee(buy.venue, notional)?;
    let sell_fee = fees.proportional_fee(sell.venue, notional)?;
    let network_fee = checked(
        fees.network_fee(buy.venue, sell.price)?
            .checked_add(fees.network_fee(sell.venue, sell.price)?),
        "network fee",
    )?;
    let total_fees = checked(
        fees.fee(buy.venue, notional, sell.price)?
            .checked_add(fees.fee(sell.venue, notional, sell.price)?),
        "total fees",
    )?;

    let net_profit = checked(gross_profit.checked_sub(total_fees), "net profit")?;
    let net_profit_percent = checked(
        net_profit.checked_div(notional).and_then(|r| r.checked_mul(HUNDRED)),
        "net profit percent",
    )?;

    if net_profit_percent < min_profit_percent {
        return Ok(None);
    }

    Ok(Some(Opportunity {
        id: Opportunity::make_id(&a.symbol, buy.venue, sell.venue, now),
        symbol: a.symbol.clone(),
        buy_venue: buy.venue,
        sell_venue: sell.venue,
        buy_price: buy.price,
        sell_price: sell.price,
        spread_percent,
        notional,
        quantity,
        gross_profit,
        buy_fee,
        sell_fee,
        network_fee,
        total_fees,
        net_profit,
        net_profit_percent,
        timestamp: now,
    }))
}

/// Maps an overflowed intermediate to an error.
fn checked(value: Option<Decimal>, what: &str) -> Result<Decimal, ArbitrageError> {
    value.ok_or_else(|| {
        ArbitrageError::InvalidArgument(format!("{} is out of decimal range", what))
    })
}

fn validate_pair(a: &PriceSample, b: &PriceSample) -> Result<(), ArbitrageError> {
    for sample in [a, b] {
        if sample.price <= Decimal::ZERO {
            return Err(ArbitrageError::InvalidArgument(format!(
                "{} price must be positive, got {}",
                sample.venue, sample.price
            )));
        }
    }

    if a.venue == b.venue {
        return Err(ArbitrageError::InvalidArgument(format!(
            "both samples come from {}",
            a.venue
        )));
    }

    if a.symbol != b.symbol {
        return Err(ArbitrageError::InvalidArgument(format!(
            "symbol mismatch: {} vs {}",
            a.symbol, b.symbol
        )));
    }

    Ok(())
}

/// Evaluator binds a fee model, notional and threshold together.
#[derive(Debug, Clone)]
pub struct Evaluator {
    fees: FeeModel,
    notional: Decimal,
    min_profit_percent: Decimal,
}

impl Evaluator {
    /// Creates an evaluator. The notional must be positive.
    pub fn new(
        fees: FeeModel,
        notional: Decimal,
        min_profit_percent: Decimal,
    ) -> Result<Self, ArbitrageError> {
        if notional <= Decimal::ZERO {
            return Err(ArbitrageError::InvalidArgument(format!(
                "notional must be positive, got {}",
                notional
            )));
        }

        Ok(Self {
            fees,
            notional,
            min_profit_percent,
        })
    }

    /// Evaluates the current pair of slots.
    pub fn evaluate(
        &self,
        sample_a: Option<&PriceSample>,
        sample_b: Option<&PriceSample>,
    ) -> Result<Option<Opportunity>, ArbitrageError> {
        evaluate(
            &self.fees,
            sample_a,
            sample_b,
            self.notional,
            self.min_profit_percent,
        )
    }

    pub fn notional(&self) -> Decimal {
        self.notional
    }

    pub fn min_profit_percent(&self) -> Decimal {
        self.min_profit_percent
    }
}
