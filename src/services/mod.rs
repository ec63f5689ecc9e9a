pub mod coupons;
pub mod payments;
pub mod pricing;

pub use coupons::{validate, CouponRejection, CouponService};
pub use payments::{
    CheckoutOutcome, HostedCheckout, PaymentOrchestrator, PaymentOutcome, PaymentRequest,
    PaymentState,
};
pub use pricing::{discount_amount, PricingService};
