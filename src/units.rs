//! Raw (smallest unit) <-> human amount conversion.
//!
//! Every on-chain amount is an integer in the token's smallest unit; the
//! human value is `raw / 10^decimals`. These are the only two places the
//! crate crosses that boundary.

use crate::error::TradeError;

/// Relative tolerance (a few ulps) for treating `human * 10^d` as already
/// integral. Absorbs binary float noise such as `0.29 * 100 = 28.999999999999996`.
const INTEGRAL_EPSILON: f64 = 4.0 * f64::EPSILON;

pub fn scale(decimals: u8) -> f64 {
    10f64.powi(decimals as i32)
}

/// Converts a human amount to raw units, truncating toward zero so we never
/// spend more than asked for.
pub fn to_raw(human: f64, decimals: u8) -> Result<u64, TradeError> {
    if !human.is_finite() || human < 0.0 {
        return Err(TradeError::InvalidIntent(format!("cannot convert amount {human}")));
    }
    let scaled = human * scale(decimals);
    let nearest = scaled.round();
    let raw = if (scaled - nearest).abs() <= nearest.max(1.0) * INTEGRAL_EPSILON {
        nearest
    } else {
        scaled.trunc()
    };
    if raw >= u64::MAX as f64 {
        return Err(TradeError::InvalidIntent(format!(
            "amount {human} overflows raw units at {decimals} decimals"
        )));
    }
    Ok(raw as u64)
}

pub fn to_human(raw: u64, decimals: u8) -> f64 {
    raw as f64 / scale(decimals)
}
