use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::errors::ApiMessage;

pub fn validate_currency(currency: &str) -> Result<(), ValidationError> {
    if currency.len() == 3 && currency.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("currency");
        err.message = Some("Currency must be a 3-letter ISO code".into());
        Err(err)
    }
}

/// Request to create a payment-gateway order, keyed by the internal order id.
/// The backend owns the amount; the client never sends one.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGatewayOrderRequest {
    pub order_id: Uuid,
    #[validate(length(equal = 3), custom = "validate_currency")]
    pub currency: String,
    pub receipt: String,
    pub notes: GatewayOrderNotes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayOrderNotes {
    pub order_number: String,
}

/// Backend response for a created gateway order. The key identifies which
/// gateway account is active and must come from the backend; it is modeled
/// as optional so its absence can be reported instead of panicking.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrderResponse {
    pub id: String,
    #[serde(default)]
    pub key: Option<String>,
    pub amount: i64,
    pub currency: String,
}

/// One checkout attempt's worth of gateway state. Created after the gateway
/// order exists, discarded once verification settles or the user cancels.
#[derive(Debug, Clone)]
pub struct PaymentSession {
    pub gateway_order_id: String,
    pub gateway_key: String,
    /// Integer minor currency units (major x 100).
    pub amount_minor: i64,
    pub currency: String,
    pub order_id: Uuid,
    pub order_number: String,
}

/// Everything the hosted checkout UI needs to open. Field names follow the
/// gateway's invocation contract, hence snake_case on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOptions {
    pub key: String,
    pub amount: i64,
    pub currency: String,
    pub name: String,
    pub description: String,
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefill: Option<CheckoutPrefill>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<serde_json::Value>,
}

/// Best-effort prefill for the hosted UI; absence of any field must not
/// block checkout from opening.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutPrefill {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

/// Raw completion payload from the hosted UI. The gateway delivers the
/// signature triple under either snake_case or camelCase depending on the
/// integration path; both are accepted here and normalized immediately.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutCompletion {
    #[serde(default, alias = "razorpayOrderId")]
    pub razorpay_order_id: Option<String>,
    #[serde(default, alias = "razorpayPaymentId")]
    pub razorpay_payment_id: Option<String>,
    #[serde(default, alias = "razorpaySignature")]
    pub razorpay_signature: Option<String>,
}

impl CheckoutCompletion {
    /// Normalize into the canonical verification request. All three
    /// signature fields plus the internal order id are mandatory; the error
    /// lists exactly which ones were absent.
    pub fn normalize(self, order_id: Option<Uuid>) -> Result<PaymentConfirmation, Vec<String>> {
        let mut missing = Vec::new();
        if self.razorpay_order_id.is_none() {
            missing.push("razorpay_order_id".to_string());
        }
        if self.razorpay_payment_id.is_none() {
            missing.push("razorpay_payment_id".to_string());
        }
        if self.razorpay_signature.is_none() {
            missing.push("razorpay_signature".to_string());
        }
        if order_id.is_none() {
            missing.push("order_id".to_string());
        }
        if !missing.is_empty() {
            return Err(missing);
        }

        // All fields verified present above.
        Ok(PaymentConfirmation {
            razorpay_order_id: self.razorpay_order_id.unwrap_or_default(),
            razorpay_payment_id: self.razorpay_payment_id.unwrap_or_default(),
            razorpay_signature: self.razorpay_signature.unwrap_or_default(),
            order_id: order_id.unwrap_or_default(),
        })
    }
}

/// Canonical verification request: the normalized signature triple plus the
/// internal order id. The triple keeps the gateway's snake_case names; the
/// internal id uses the storefront's camelCase convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
    #[serde(rename = "orderId")]
    pub order_id: Uuid,
}

/// Backend verdict on a payment verification call.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<ApiMessage>,
    /// The placed order record, handed back to the caller on success.
    #[serde(default)]
    pub order: Option<serde_json::Value>,
}
