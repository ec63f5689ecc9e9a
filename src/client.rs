//! Authenticated HTTP client for the storefront backend.
//!
//! Every remote call used by the checkout core goes through [`ApiClient`].
//! Authenticated requests are wrapped in an explicit retry-once refresh
//! step: an unauthorized response triggers at most one token refresh and one
//! replay of the original request, tracked by a local in the wrapper rather
//! than a flag on the request object.

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;
use validator::Validate;

use crate::{
    auth::SessionContext,
    errors::{ApiMessage, CheckoutError, ErrorBody},
    events::{Event, EventSender},
    models::{
        coupon::Coupon,
        payment::{
            CreateGatewayOrderRequest, GatewayOrderResponse, PaymentConfirmation,
            VerifyPaymentResponse,
        },
    },
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    http: Client,
    session: SessionContext,
    events: EventSender,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        session: SessionContext,
        events: EventSender,
    ) -> Result<Self, CheckoutError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| CheckoutError::InternalError(format!("invalid API base URL: {}", e)))?;
        // Url::join treats a path without a trailing slash as a file.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            http,
            session,
            events,
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    fn endpoint(&self, path: &str) -> Result<Url, CheckoutError> {
        self.base_url
            .join(path)
            .map_err(|e| CheckoutError::InternalError(format!("invalid endpoint path: {}", e)))
    }

    /// Endpoint with a caller-supplied trailing segment. The segment is
    /// percent-encoded, so reserved characters in it cannot alter the path.
    fn endpoint_with_segment(&self, path: &str, segment: &str) -> Result<Url, CheckoutError> {
        let mut url = self.endpoint(path)?;
        url.path_segments_mut()
            .map_err(|_| CheckoutError::InternalError("API base URL cannot be a base".to_string()))?
            .push(segment);
        Ok(url)
    }

    /// Issue an authenticated request, refreshing the access token at most
    /// once on an unauthorized response.
    async fn send_authed(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, CheckoutError> {
        let mut retried = false;
        loop {
            let mut request = self.http.request(method.clone(), url.clone());
            if let Some(token) = self.session.access_token().await {
                request = request.bearer_auth(token);
            }
            if let Some(body) = &body {
                request = request.json(body);
            }
            let response = request.send().await?;

            if response.status() == StatusCode::UNAUTHORIZED && !retried {
                retried = true;
                match self.refresh_session().await {
                    Ok(()) => {
                        debug!(path = url.path(), "access token refreshed, replaying request");
                        continue;
                    }
                    Err(err) => {
                        warn!(path = url.path(), error = %err, "token refresh failed, clearing session");
                        self.session.clear().await;
                        if let Err(e) = self
                            .events
                            .send(Event::SessionExpired {
                                reason: err.to_string(),
                            })
                            .await
                        {
                            warn!("Failed to send event: {}", e);
                        }
                        // The caller sees the unauthorized response that
                        // triggered the refresh, not the refresh's own error.
                        let message = response
                            .json::<ErrorBody>()
                            .await
                            .ok()
                            .and_then(|body| body.message)
                            .map(ApiMessage::into_text)
                            .unwrap_or_else(|| {
                                "session expired, please sign in again".to_string()
                            });
                        return Err(CheckoutError::Unauthorized(message));
                    }
                }
            }
            return Ok(response);
        }
    }

    /// Exchange the stored refresh token for a new access token. The refresh
    /// call itself is unauthenticated and never intercepted.
    async fn refresh_session(&self) -> Result<(), CheckoutError> {
        let refresh_token = self.session.refresh_token().await.ok_or_else(|| {
            CheckoutError::Unauthorized("no refresh token stored".to_string())
        })?;
        let url = self.endpoint("auth/refresh")?;
        let response = self
            .http
            .post(url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CheckoutError::Unauthorized(format!(
                "refresh rejected with status {}",
                response.status()
            )));
        }
        let tokens: RefreshResponse = response.json().await?;
        self.session
            .apply_refresh(tokens.access_token, tokens.refresh_token)
            .await;
        if let Err(e) = self.events.send(Event::SessionRefreshed).await {
            warn!("Failed to send event: {}", e);
        }
        Ok(())
    }

    /// Decode a response, mapping error bodies through the backend's
    /// string-or-array message convention.
    async fn decode<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, CheckoutError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .map(ApiMessage::into_text)
            .unwrap_or_else(|| "request failed".to_string());
        match status {
            StatusCode::NOT_FOUND => Err(CheckoutError::NotFound(message)),
            StatusCode::UNAUTHORIZED => Err(CheckoutError::Unauthorized(message)),
            _ => Err(CheckoutError::Api {
                status: status.as_u16(),
                message,
            }),
        }
    }

    /// Fetch a coupon by code (case-insensitive; upper-cased on the wire).
    #[instrument(skip(self))]
    pub async fn fetch_coupon(&self, code: &str) -> Result<Coupon, CheckoutError> {
        let code = Coupon::normalized_code(code);
        let url = self.endpoint_with_segment("coupons", &code)?;
        let response = self.send_authed(Method::GET, url, None).await?;
        self.decode(response).await
    }

    /// Create a payment-gateway order keyed by the internal order id.
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn create_gateway_order(
        &self,
        request: &CreateGatewayOrderRequest,
    ) -> Result<GatewayOrderResponse, CheckoutError> {
        request.validate()?;
        let response = self
            .send_authed(
                Method::POST,
                self.endpoint("payments/gateway/order")?,
                Some(serde_json::to_value(request)?),
            )
            .await?;
        self.decode(response).await
    }

    /// Submit the normalized confirmation for server-side signature
    /// verification.
    #[instrument(skip(self, confirmation), fields(order_id = %confirmation.order_id))]
    pub async fn verify_payment(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<VerifyPaymentResponse, CheckoutError> {
        let response = self
            .send_authed(
                Method::POST,
                self.endpoint("payments/gateway/verify")?,
                Some(serde_json::to_value(confirmation)?),
            )
            .await?;
        self.decode(response).await
    }
}
