//! Decimal rounding for reported percentages and forecasts
//!
//! Values are rounded through `rust_decimal` so that results such as `33.33`
//! come out as the shortest decimal the user expects rather than the nearest
//! binary float produced by scaling tricks.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Round `value` to `dp` decimal places using banker's rounding.
///
/// Non-finite values and values outside the decimal range are returned untouched.
pub fn round_dp(value: f64, dp: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }

    Decimal::from_f64(value)
        .map(|d| d.round_dp(dp))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

/// Round to two decimal places (percentages, setpoints, harvest days)
pub fn round2(value: f64) -> f64 {
    round_dp(value, 2)
}

/// Round to four decimal places (average confidences)
pub fn round4(value: f64) -> f64 {
    round_dp(value, 4)
}
