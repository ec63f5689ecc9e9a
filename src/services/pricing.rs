use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::{
    config::PricingConfig,
    models::coupon::{Coupon, CouponKind},
    models::order::OrderTotals,
};

/// Discount a coupon yields against a subtotal.
///
/// Percentage coupons take `subtotal * value / 100`, capped by
/// `max_discount` when set. Fixed coupons take `value`. Either way the
/// result is clamped into `[0, subtotal]` so a total can never go negative.
/// Deterministic, no I/O, no intermediate rounding.
pub fn discount_amount(coupon: &Coupon, subtotal: Decimal) -> Decimal {
    let raw = match coupon.kind {
        CouponKind::Percentage => {
            let discount = subtotal * coupon.value / dec!(100);
            match coupon.max_discount {
                Some(cap) => discount.min(cap),
                None => discount,
            }
        }
        CouponKind::Fixed => coupon.value,
    };
    raw.min(subtotal).max(Decimal::ZERO)
}

/// Computes order totals from the configured tax and shipping rules.
#[derive(Debug, Clone)]
pub struct PricingService {
    config: PricingConfig,
}

impl PricingService {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    /// Flat shipping fee, waived above the free-shipping threshold.
    /// The threshold is evaluated on the pre-discount subtotal.
    pub fn shipping_fee(&self, subtotal: Decimal) -> Decimal {
        if subtotal > self.config.free_shipping_threshold {
            Decimal::ZERO
        } else {
            self.config.shipping_fee
        }
    }

    /// Recompute the full total breakdown from the current inputs. Tax is
    /// applied to the discounted subtotal; shipping follows the
    /// pre-discount rule.
    pub fn totals(&self, subtotal: Decimal, coupon: Option<&Coupon>) -> OrderTotals {
        let discount = coupon
            .map(|c| discount_amount(c, subtotal))
            .unwrap_or(Decimal::ZERO);
        let taxable = subtotal - discount;
        let tax = taxable * self.config.tax_rate;
        let shipping = self.shipping_fee(subtotal);
        let total = taxable + tax + shipping;
        debug!(%subtotal, %discount, %tax, %shipping, %total, "computed order totals");
        OrderTotals {
            subtotal,
            discount,
            taxable,
            tax,
            shipping,
            total,
        }
    }
}
