//! Payment session orchestration for the hosted checkout.
//!
//! Drives the three-step protocol against the storefront backend and the
//! gateway's hosted UI: create a gateway order keyed by the internal order
//! id, open the hosted checkout, then verify the returned signature triple
//! server-side. The hosted UI itself is behind the [`HostedCheckout`] trait;
//! its completion callback is modeled as an async outcome received by the
//! state machine rather than nested callbacks.

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    client::ApiClient,
    errors::{ApiMessage, CheckoutError},
    events::{Event, EventSender},
    models::payment::{
        CheckoutCompletion, CheckoutOptions, CheckoutPrefill, CreateGatewayOrderRequest,
        GatewayOrderNotes, PaymentSession,
    },
};

/// Seam to the hosted checkout UI, provided by the embedding front end.
#[async_trait]
pub trait HostedCheckout: Send + Sync {
    /// Load the hosted-checkout client. Invoked at most once per
    /// orchestrator; a client that is already present should return Ok
    /// immediately.
    async fn load(&self) -> Result<(), String>;

    /// Open the checkout UI and wait for the user to complete or dismiss it.
    async fn open(&self, options: CheckoutOptions) -> CheckoutOutcome;
}

/// What came back from the hosted UI.
#[derive(Debug, Clone)]
pub enum CheckoutOutcome {
    /// The user completed payment; payload may use either field convention.
    Completed(CheckoutCompletion),
    /// The user dismissed the UI before paying.
    Dismissed,
}

/// Payment session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentState {
    Idle,
    ScriptLoading,
    Ready,
    OrderCreating,
    CheckoutOpen,
    Verifying,
    Succeeded,
    Failed,
    Cancelled,
}

impl PaymentState {
    /// States during which a second "pay" trigger must be a no-op.
    pub fn in_flight(self) -> bool {
        matches!(
            self,
            PaymentState::OrderCreating | PaymentState::CheckoutOpen | PaymentState::Verifying
        )
    }
}

/// Caller-facing result of a finished attempt. Cancellation is a distinct
/// outcome, not an error.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    /// Verification succeeded; the backend's order record, if returned.
    Completed(Option<serde_json::Value>),
    Cancelled,
}

/// Input for one payment attempt.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_id: Uuid,
    pub order_number: String,
    pub prefill: Option<CheckoutPrefill>,
}

#[derive(Clone)]
pub struct PaymentOrchestrator {
    api: Arc<ApiClient>,
    checkout: Arc<dyn HostedCheckout>,
    events: EventSender,
    currency: String,
    store_name: String,
    state: Arc<Mutex<PaymentState>>,
    gateway: Arc<OnceCell<Result<(), String>>>,
}

impl PaymentOrchestrator {
    pub fn new(
        api: Arc<ApiClient>,
        checkout: Arc<dyn HostedCheckout>,
        events: EventSender,
        currency: String,
        store_name: String,
    ) -> Self {
        Self {
            api,
            checkout,
            events,
            currency,
            store_name,
            state: Arc::new(Mutex::new(PaymentState::Idle)),
            gateway: Arc::new(OnceCell::new()),
        }
    }

    fn state(&self) -> MutexGuard<'_, PaymentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, next: PaymentState) {
        *self.state() = next;
    }

    pub fn current_state(&self) -> PaymentState {
        *self.state()
    }

    /// Load the hosted-checkout client: `Idle -> ScriptLoading -> Ready`.
    ///
    /// Concurrent callers share a single load. A load failure is sticky and
    /// terminal for the gateway; later calls report it without retrying.
    #[instrument(skip(self))]
    pub async fn prepare(&self) -> Result<(), CheckoutError> {
        let result = self
            .gateway
            .get_or_init(|| async {
                self.transition(PaymentState::ScriptLoading);
                match self.checkout.load().await {
                    Ok(()) => {
                        info!("payment gateway client loaded");
                        self.transition(PaymentState::Ready);
                        if let Err(e) = self.events.send(Event::GatewayReady).await {
                            warn!("Failed to send event: {}", e);
                        }
                        Ok(())
                    }
                    Err(reason) => {
                        warn!(%reason, "payment gateway client failed to load");
                        self.transition(PaymentState::Failed);
                        if let Err(e) = self
                            .events
                            .send(Event::GatewayLoadFailed {
                                reason: reason.clone(),
                            })
                            .await
                        {
                            warn!("Failed to send event: {}", e);
                        }
                        Err(reason)
                    }
                }
            })
            .await
            .clone();

        result.map_err(CheckoutError::GatewayUnavailable)
    }

    /// Drive a single payment attempt end to end.
    ///
    /// Refuses before the gateway is ready and while a previous attempt is
    /// in flight (no duplicate order-create calls). Every terminal
    /// transition clears the in-flight guard, so a new attempt can start
    /// after success, failure, or cancellation.
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn pay(&self, request: PaymentRequest) -> Result<PaymentOutcome, CheckoutError> {
        match self.gateway.get() {
            Some(Ok(())) => {}
            Some(Err(reason)) => return Err(CheckoutError::GatewayUnavailable(reason.clone())),
            None => return Err(CheckoutError::GatewayNotReady),
        }
        {
            let mut state = self.state();
            if state.in_flight() {
                return Err(CheckoutError::AttemptInProgress);
            }
            *state = PaymentState::OrderCreating;
        }

        let outcome = self.run_attempt(&request).await;
        match &outcome {
            Ok(PaymentOutcome::Completed(_)) => {
                self.transition(PaymentState::Succeeded);
                info!("payment verified");
                if let Err(e) = self
                    .events
                    .send(Event::PaymentSucceeded {
                        order_id: request.order_id,
                    })
                    .await
                {
                    warn!("Failed to send event: {}", e);
                }
            }
            Ok(PaymentOutcome::Cancelled) => {
                self.transition(PaymentState::Cancelled);
                info!("payment cancelled by user");
                if let Err(e) = self
                    .events
                    .send(Event::PaymentCancelled {
                        order_id: request.order_id,
                    })
                    .await
                {
                    warn!("Failed to send event: {}", e);
                }
            }
            Err(err) => {
                self.transition(PaymentState::Failed);
                warn!(error = %err, "payment attempt failed");
                if let Err(e) = self
                    .events
                    .send(Event::PaymentFailed {
                        order_id: request.order_id,
                        reason: err.to_string(),
                    })
                    .await
                {
                    warn!("Failed to send event: {}", e);
                }
            }
        }
        outcome
    }

    async fn run_attempt(&self, request: &PaymentRequest) -> Result<PaymentOutcome, CheckoutError> {
        let order_request = CreateGatewayOrderRequest {
            order_id: request.order_id,
            currency: self.currency.clone(),
            receipt: request.order_number.clone(),
            notes: GatewayOrderNotes {
                order_number: request.order_number.clone(),
            },
        };
        let created = self.api.create_gateway_order(&order_request).await?;

        // The backend is the sole source of truth for the active gateway
        // key; there is no local fallback.
        let key = created.key.ok_or_else(|| {
            CheckoutError::PaymentFailed(
                "payment gateway key missing from order response, please contact support"
                    .to_string(),
            )
        })?;
        let session = PaymentSession {
            gateway_order_id: created.id,
            gateway_key: key,
            amount_minor: created.amount,
            currency: created.currency,
            order_id: request.order_id,
            order_number: request.order_number.clone(),
        };
        if let Err(e) = self
            .events
            .send(Event::GatewayOrderCreated {
                order_id: session.order_id,
                gateway_order_id: session.gateway_order_id.clone(),
            })
            .await
        {
            warn!("Failed to send event: {}", e);
        }

        self.transition(PaymentState::CheckoutOpen);
        let options = CheckoutOptions {
            key: session.gateway_key.clone(),
            amount: session.amount_minor,
            currency: session.currency.clone(),
            name: self.store_name.clone(),
            description: format!("Payment for order {}", session.order_number),
            order_id: session.gateway_order_id.clone(),
            prefill: request.prefill.clone(),
            notes: Some(json!({ "orderNumber": session.order_number })),
        };
        let completion = match self.checkout.open(options).await {
            CheckoutOutcome::Completed(payload) => payload,
            CheckoutOutcome::Dismissed => return Ok(PaymentOutcome::Cancelled),
        };

        // Normalize at the boundary; verification never runs on partial data.
        let confirmation = completion
            .normalize(Some(session.order_id))
            .map_err(CheckoutError::MissingPaymentFields)?;

        self.transition(PaymentState::Verifying);
        let verdict = self
            .api
            .verify_payment(&confirmation)
            .await
            .map_err(|err| match err {
                CheckoutError::Api { message, .. } => CheckoutError::PaymentFailed(message),
                other => other,
            })?;
        if !verdict.success {
            let reason = verdict
                .message
                .map(ApiMessage::into_text)
                .unwrap_or_else(|| "payment verification failed".to_string());
            return Err(CheckoutError::PaymentFailed(reason));
        }
        Ok(PaymentOutcome::Completed(verdict.order))
    }
}
