//! Fixed-point fee conversion. Creation fees are 18-decimal integer strings.

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

pub const FEE_DECIMALS: u32 = 18;
/// Curators earn a third of the creation fee.
pub const CURATOR_SHARE_DIVISOR: i64 = 3;
const BASE_UNITS_PER_TOKEN: i64 = 1_000_000_000_000_000_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("malformed creation fee {value:?} in transaction {tx_hash}")]
    Malformed { tx_hash: String, value: String },
    #[error("amount {0} cannot be expressed in base units")]
    OutOfRange(Decimal),
}

/// Parse a base-unit integer string into token units. Empty means zero.
pub fn parse_base_units(raw: &str) -> Option<Decimal> {
    let s = raw.trim();
    if s.is_empty() {
        return Some(Decimal::ZERO);
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let units = s.parse::<i128>().ok()?;
    Decimal::try_from_i128_with_scale(units, FEE_DECIMALS)
        .ok()
        .map(|d| d.normalize())
}

/// Creation fee of a curation in token units. A missing fee is zero.
pub fn creation_fee(raw: Option<&str>, tx_hash: &str) -> Result<Decimal, FeeError> {
    let Some(raw) = raw else {
        return Ok(Decimal::ZERO);
    };
    parse_base_units(raw).ok_or_else(|| FeeError::Malformed {
        tx_hash: tx_hash.to_string(),
        value: raw.to_string(),
    })
}

pub fn curator_share(creation_fee: Decimal) -> Decimal {
    (creation_fee / Decimal::from(CURATOR_SHARE_DIVISOR)).normalize()
}

/// Token units to a base-unit integer string, truncating below 18 decimals.
pub fn to_base_units(amount: Decimal) -> Result<String, FeeError> {
    let truncated = amount.round_dp_with_strategy(FEE_DECIMALS, RoundingStrategy::ToZero);
    let scaled = truncated
        .checked_mul(Decimal::from(BASE_UNITS_PER_TOKEN))
        .ok_or(FeeError::OutOfRange(amount))?;
    if scaled.is_sign_negative() && !scaled.is_zero() {
        return Err(FeeError::OutOfRange(amount));
    }
    Ok(scaled.trunc().abs().normalize().to_string())
}
