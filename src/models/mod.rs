pub mod coupon;
pub mod order;
pub mod payment;

pub use coupon::{Coupon, CouponKind};
pub use order::OrderTotals;
pub use payment::{
    CheckoutCompletion, CheckoutOptions, CheckoutPrefill, CreateGatewayOrderRequest,
    GatewayOrderResponse, PaymentConfirmation, PaymentSession, VerifyPaymentResponse,
};
