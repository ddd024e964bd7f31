//! Value Objects for checkout and payments

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered quantity; always strictly positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(i32);

impl Quantity {
    pub fn new(value: i32) -> Result<Self, QuantityError> {
        if value <= 0 { return Err(QuantityError::NotPositive(value)); }
        Ok(Self(value))
    }
    pub fn value(&self) -> i32 { self.0 }

    /// `unit_price * quantity`, `None` on overflow.
    pub fn line_total(&self, unit_price: i64) -> Option<i64> { unit_price.checked_mul(i64::from(self.0)) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum QuantityError { NotPositive(i32) }
impl std::error::Error for QuantityError {}
impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::NotPositive(v) => write!(f, "quantity must be positive, got {v}") }
    }
}

/// Correlates a gateway payment session with an order: `{orderId}-{unixMillis}`.
///
/// The suffix keeps references unique across retries for the same order, so a
/// link that supersedes an older one still maps back to the right order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalRef(String);

impl ExternalRef {
    pub fn issue(order_id: i64, at: DateTime<Utc>) -> Self {
        Self(format!("{}-{}", order_id, at.timestamp_millis()))
    }

    /// Extracts the order id from the leading numeric segment of a raw reference.
    pub fn order_id(raw: &str) -> Result<i64, ExternalRefError> {
        let head = raw.split_once('-').map_or(raw, |(head, _)| head);
        if head.is_empty() || !head.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ExternalRefError::Malformed(raw.to_string()));
        }
        match head.parse::<i64>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(ExternalRefError::Malformed(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_string(self) -> String { self.0 }
}

impl fmt::Display for ExternalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum ExternalRefError { Malformed(String) }
impl std::error::Error for ExternalRefError {}
impl fmt::Display for ExternalRefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Malformed(raw) => write!(f, "malformed reference {raw:?}") }
    }
}

/// Converts a store amount into the gateway's currency (major units).
pub trait CurrencyConversion: Send + Sync {
    fn convert(&self, amount: i64) -> Option<i64>;
}

impl<F> CurrencyConversion for F
where
    F: Fn(i64) -> Option<i64> + Send + Sync,
{
    fn convert(&self, amount: i64) -> Option<i64> { self(amount) }
}

/// Multiplies by a fixed rate and rounds up to a multiple of `increment`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateConversion { rate: Decimal, increment: i64 }

impl RateConversion {
    pub fn new(rate: Decimal, increment: i64) -> Option<Self> {
        if rate <= Decimal::ZERO || increment <= 0 { return None; }
        Some(Self { rate, increment })
    }
    pub fn identity() -> Self { Self { rate: Decimal::ONE, increment: 1 } }
    pub fn rate(&self) -> Decimal { self.rate }
    pub fn increment(&self) -> i64 { self.increment }
}

impl Default for RateConversion { fn default() -> Self { Self::identity() } }

impl CurrencyConversion for RateConversion {
    fn convert(&self, amount: i64) -> Option<i64> {
        let increment = Decimal::from(self.increment);
        let scaled = Decimal::from(amount).checked_mul(self.rate)?;
        scaled.checked_div(increment)?.ceil().checked_mul(increment)?.to_i64()
    }
}

/// VNPay expects `vnp_Amount` as the amount multiplied by 100.
pub fn to_gateway_minor_units(amount: i64) -> Option<i64> { amount.checked_mul(100) }

/// Inverse of [`to_gateway_minor_units`], used when echoing callback amounts.
pub fn from_gateway_minor_units(minor: i64) -> i64 { minor / 100 }
