//! Raw token amount formatting.

use alloy_primitives::U256;
use rust_decimal::Decimal;
use tracing::warn;

/// Convert a raw U256 balance to a human-readable Decimal given token decimals.
///
/// E.g. U256(1_000_000) with 6 decimals → Decimal(1.000000)
pub fn u256_to_decimal(raw: U256, decimals: u8) -> Decimal {
    // Decimal holds 28-29 significant digits. Overridden balances can be
    // arbitrary words, so anything larger is clamped.
    let s = raw.to_string();
    let d = match Decimal::from_str_exact(&s) {
        Ok(d) => d,
        Err(_) => {
            warn!(raw = %s, decimals, "U256 exceeds Decimal range, clamping");
            return Decimal::MAX;
        }
    };
    // Decimal::new(1, scale) is 10^(-scale); scale is capped at 28.
    let scale = Decimal::new(1, u32::from(decimals.min(28)));
    d.checked_mul(scale).unwrap_or(Decimal::MAX)
}
