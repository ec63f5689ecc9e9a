use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a coupon's value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouponKind {
    /// `value` is a percentage of the subtotal, optionally capped.
    Percentage,
    /// `value` is a flat amount in major currency units.
    Fixed,
}

/// A discount code record as served by the storefront backend.
///
/// Coupons are read-only from the client's perspective: they are created and
/// edited by admins, and `used_count` is advanced by the backend when an
/// order is placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    /// Unique code, stored upper-case; lookups are case-insensitive.
    pub code: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(rename = "type")]
    pub kind: CouponKind,

    /// Positive; for percentage coupons, in [0, 100].
    pub value: Decimal,

    /// Minimum subtotal required before the coupon applies.
    #[serde(default)]
    pub min_purchase: Option<Decimal>,

    /// Cap on the computed discount; only meaningful for percentage coupons.
    #[serde(default)]
    pub max_discount: Option<Decimal>,

    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub usage_limit: Option<i64>,

    #[serde(default)]
    pub used_count: i64,

    pub active: bool,
}

impl Coupon {
    /// Canonical form of a user-entered code.
    pub fn normalized_code(code: &str) -> String {
        code.trim().to_uppercase()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|expires_at| now > expires_at).unwrap_or(false)
    }

    pub fn usage_exhausted(&self) -> bool {
        self.usage_limit
            .map(|limit| self.used_count >= limit)
            .unwrap_or(false)
    }
}
