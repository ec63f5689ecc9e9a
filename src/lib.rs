//! Storefront Checkout Core
//!
//! This crate provides the business core of an e-commerce storefront
//! client: coupon validation, discount and order-total computation, the
//! payment-session state machine for a Razorpay-style hosted checkout, and
//! an authenticated API client with single-retry token refresh.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

pub use errors::CheckoutError;
pub use models::{Coupon, CouponKind, OrderTotals};
pub use services::{CheckoutOutcome, HostedCheckout, PaymentOutcome, PaymentRequest};

/// Aggregate wiring for an embedding front end: one session, one API
/// client, and the coupon/pricing/payment services sharing them.
pub struct CheckoutClient {
    pub config: config::AppConfig,
    pub session: auth::SessionContext,
    pub api: Arc<client::ApiClient>,
    pub coupons: services::coupons::CouponService,
    pub pricing: services::pricing::PricingService,
    pub payments: services::payments::PaymentOrchestrator,
}

impl CheckoutClient {
    /// Wire up the checkout core against a hosted-checkout implementation.
    /// Events land on the returned sender's channel.
    pub fn new(
        config: config::AppConfig,
        checkout: Arc<dyn HostedCheckout>,
        events: events::EventSender,
    ) -> Result<Self, CheckoutError> {
        let session = auth::SessionContext::new();
        let api = Arc::new(client::ApiClient::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
            session.clone(),
            events.clone(),
        )?);
        let coupons = services::coupons::CouponService::new(api.clone(), events.clone());
        let pricing = services::pricing::PricingService::new(config.pricing.clone());
        let payments = services::payments::PaymentOrchestrator::new(
            api.clone(),
            checkout,
            events,
            config.currency.clone(),
            config.store_name.clone(),
        );
        Ok(Self {
            config,
            session,
            api,
            coupons,
            pricing,
            payments,
        })
    }
}
