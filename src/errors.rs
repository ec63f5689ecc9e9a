use serde::Deserialize;

/// Crate-wide error type for the checkout core.
///
/// Variants map onto the failure taxonomy of the storefront: local
/// validation, transport, protocol violations from the payment gateway,
/// verification rejections, and auth failures.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Coupon not applicable: {0}")]
    CouponNotApplicable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Payment gateway is still loading")]
    GatewayNotReady,

    #[error("A payment attempt is already in progress")]
    AttemptInProgress,

    #[error("Payment response missing required fields: {}", .0.join(", "))]
    MissingPaymentFields(Vec<String>),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for CheckoutError {
    fn from(err: validator::ValidationErrors) -> Self {
        CheckoutError::ValidationError(err.to_string())
    }
}

/// Message field of a backend response, which may be a single string or an
/// array of strings depending on the endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiMessage {
    Many(Vec<String>),
    One(String),
}

impl ApiMessage {
    /// Flatten to display text; array messages are joined with ". ".
    pub fn into_text(self) -> String {
        match self {
            ApiMessage::Many(parts) => parts.join(". "),
            ApiMessage::One(message) => message,
        }
    }
}

/// Error body shape returned by the storefront backend.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<ApiMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_array_joins_with_period_space() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"message": ["Coupon expired", "Try another code"]}"#).unwrap();
        assert_eq!(
            body.message.unwrap().into_text(),
            "Coupon expired. Try another code"
        );
    }

    #[test]
    fn single_string_message_passes_through() {
        let body: ErrorBody = serde_json::from_str(r#"{"message": "Order not found"}"#).unwrap();
        assert_eq!(body.message.unwrap().into_text(), "Order not found");
    }

    #[test]
    fn absent_message_is_none() {
        let body: ErrorBody = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(body.message.is_none());
    }
}
