use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::{
    client::ApiClient,
    errors::CheckoutError,
    events::{Event, EventSender},
    models::coupon::Coupon,
    models::order::{format_currency, DEFAULT_CURRENCY},
    services::pricing::discount_amount,
};

/// Why a coupon cannot be applied to the current cart.
///
/// Ordered by check precedence; the first failing check wins.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponRejection {
    #[error("This coupon is not active")]
    Inactive,

    #[error("This coupon has expired")]
    Expired,

    #[error("This coupon has reached its usage limit")]
    UsageLimitReached,

    #[error(
        "A minimum purchase of {} is required to use this coupon",
        format_currency(*.minimum, DEFAULT_CURRENCY)
    )]
    MinPurchaseNotMet { minimum: Decimal },
}

/// Check a coupon against the current subtotal. Pure predicate, no side
/// effects; stops at the first failing rule:
/// active, then expiry, then usage limit, then minimum purchase.
pub fn validate(
    coupon: &Coupon,
    subtotal: Decimal,
    now: DateTime<Utc>,
) -> Result<(), CouponRejection> {
    if !coupon.active {
        return Err(CouponRejection::Inactive);
    }
    if coupon.is_expired(now) {
        return Err(CouponRejection::Expired);
    }
    if coupon.usage_exhausted() {
        return Err(CouponRejection::UsageLimitReached);
    }
    if let Some(minimum) = coupon.min_purchase {
        if subtotal < minimum {
            return Err(CouponRejection::MinPurchaseNotMet { minimum });
        }
    }
    Ok(())
}

/// Fetches coupons from the backend and applies the business rules above.
#[derive(Clone)]
pub struct CouponService {
    api: Arc<ApiClient>,
    events: EventSender,
}

impl CouponService {
    pub fn new(api: Arc<ApiClient>, events: EventSender) -> Self {
        Self { api, events }
    }

    /// Fetch a coupon by code and validate it against the current subtotal.
    #[instrument(skip(self))]
    pub async fn fetch_and_validate(
        &self,
        code: &str,
        subtotal: Decimal,
    ) -> Result<Coupon, CheckoutError> {
        let coupon = self.api.fetch_coupon(code).await?;

        if let Err(rejection) = validate(&coupon, subtotal, Utc::now()) {
            warn!(code = %coupon.code, %rejection, "coupon rejected");
            if let Err(e) = self
                .events
                .send(Event::CouponRejected {
                    code: coupon.code.clone(),
                    reason: rejection.to_string(),
                })
                .await
            {
                warn!("Failed to send event: {}", e);
            }
            return Err(CheckoutError::CouponNotApplicable(rejection.to_string()));
        }

        let discount = discount_amount(&coupon, subtotal);
        info!(code = %coupon.code, %discount, "coupon applied");
        if let Err(e) = self
            .events
            .send(Event::CouponApplied {
                code: coupon.code.clone(),
                discount,
            })
            .await
        {
            warn!("Failed to send event: {}", e);
        }
        Ok(coupon)
    }

    /// Re-check an applied coupon after the subtotal changed (quantity
    /// edits, item removal). On rejection the caller must drop the coupon;
    /// a `CouponRemoved` event is emitted for the UI.
    #[instrument(skip(self, coupon), fields(code = %coupon.code))]
    pub async fn revalidate(
        &self,
        coupon: &Coupon,
        subtotal: Decimal,
    ) -> Result<(), CouponRejection> {
        let result = validate(coupon, subtotal, Utc::now());
        if let Err(ref rejection) = result {
            warn!(%rejection, "applied coupon no longer valid, dropping");
            if let Err(e) = self
                .events
                .send(Event::CouponRemoved {
                    code: coupon.code.clone(),
                })
                .await
            {
                warn!("Failed to send event: {}", e);
            }
        }
        result
    }
}
