use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify};

use storefront_checkout::{
    auth::{SessionContext, TokenPair},
    client::ApiClient,
    events::{Event, EventSender},
    models::payment::CheckoutOptions,
    services::payments::{CheckoutOutcome, HostedCheckout, PaymentOrchestrator},
};

/// Hosted-checkout stand-in driven by a script of outcomes.
pub struct ScriptedCheckout {
    load_result: Result<(), String>,
    pub loads: AtomicUsize,
    outcomes: Mutex<VecDeque<CheckoutOutcome>>,
    /// Notified when `open` is entered.
    pub opened: Notify,
    /// When set, `open` parks until notified (for in-flight guard tests).
    release: Option<Arc<Notify>>,
}

impl ScriptedCheckout {
    pub fn with_outcomes(outcomes: Vec<CheckoutOutcome>) -> Arc<Self> {
        Arc::new(Self {
            load_result: Ok(()),
            loads: AtomicUsize::new(0),
            outcomes: Mutex::new(outcomes.into()),
            opened: Notify::new(),
            release: None,
        })
    }

    pub fn failing_to_load(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            load_result: Err(reason.to_string()),
            loads: AtomicUsize::new(0),
            outcomes: Mutex::new(VecDeque::new()),
            opened: Notify::new(),
            release: None,
        })
    }

    pub fn gated(outcomes: Vec<CheckoutOutcome>, release: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            load_result: Ok(()),
            loads: AtomicUsize::new(0),
            outcomes: Mutex::new(outcomes.into()),
            opened: Notify::new(),
            release: Some(release),
        })
    }
}

#[async_trait]
impl HostedCheckout for ScriptedCheckout {
    async fn load(&self) -> Result<(), String> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.load_result.clone()
    }

    async fn open(&self, _options: CheckoutOptions) -> CheckoutOutcome {
        self.opened.notify_one();
        if let Some(release) = &self.release {
            release.notified().await;
        }
        self.outcomes
            .lock()
            .await
            .pop_front()
            .expect("no scripted checkout outcome left")
    }
}

/// Orchestrator wired against a test backend, with a logged-in session.
pub async fn orchestrator(
    base_url: &str,
    checkout: Arc<ScriptedCheckout>,
) -> (PaymentOrchestrator, mpsc::Receiver<Event>) {
    let (events, receiver) = EventSender::channel(64);
    let session = SessionContext::new();
    session
        .login(TokenPair {
            access_token: "test-access".to_string(),
            refresh_token: "test-refresh".to_string(),
        })
        .await;
    let api = Arc::new(
        ApiClient::new(base_url, Duration::from_secs(5), session, events.clone())
            .expect("valid base url"),
    );
    let orchestrator = PaymentOrchestrator::new(
        api,
        checkout,
        events,
        "INR".to_string(),
        "Test Store".to_string(),
    );
    (orchestrator, receiver)
}
