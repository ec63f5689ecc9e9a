use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Currency used for user-facing amounts when no other context is available.
pub const DEFAULT_CURRENCY: &str = "INR";

/// Breakdown of an order total.
///
/// Always derived from the current subtotal, coupon, and shipping rule;
/// never cached independently of its inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    /// `subtotal - discount`; the base for tax.
    pub taxable: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Grand total in the gateway's minor currency unit (major x 100).
    pub fn total_minor(&self) -> i64 {
        to_minor_units(self.total)
    }
}

/// Convert a major-unit amount to the gateway's integer minor unit.
/// Rounding happens here and nowhere earlier in the computation. Amounts
/// outside the i64 range saturate instead of collapsing to zero.
pub fn to_minor_units(amount: Decimal) -> i64 {
    let minor = amount.saturating_mul(dec!(100)).round();
    minor.to_i64().unwrap_or(if minor.is_sign_negative() {
        i64::MIN
    } else {
        i64::MAX
    })
}

/// Format a major-unit amount for display, rounded to two decimals.
pub fn format_currency(amount: Decimal, currency: &str) -> String {
    let rounded = amount.round_dp(2);
    match currency {
        "INR" => format!("\u{20b9}{:.2}", rounded),
        "USD" => format!("${:.2}", rounded),
        "EUR" => format!("\u{20ac}{:.2}", rounded),
        other => format!("{} {:.2}", other, rounded),
    }
}
