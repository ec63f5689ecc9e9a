mod common;

use assert_matches::assert_matches;
use common::ScriptedCheckout;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::Notify;
use uuid::Uuid;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use storefront_checkout::{
    errors::CheckoutError,
    events::Event,
    models::payment::CheckoutCompletion,
    services::payments::{CheckoutOutcome, PaymentOutcome, PaymentRequest, PaymentState},
};

fn order_id() -> Uuid {
    Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap()
}

fn request() -> PaymentRequest {
    PaymentRequest {
        order_id: order_id(),
        order_number: "ORD-1001".to_string(),
        prefill: None,
    }
}

fn completion_snake() -> CheckoutCompletion {
    serde_json::from_value(json!({
        "razorpay_order_id": "order_rzp_1",
        "razorpay_payment_id": "pay_1",
        "razorpay_signature": "sig_1"
    }))
    .unwrap()
}

fn completion_camel() -> CheckoutCompletion {
    serde_json::from_value(json!({
        "razorpayOrderId": "order_rzp_1",
        "razorpayPaymentId": "pay_1",
        "razorpaySignature": "sig_1"
    }))
    .unwrap()
}

async fn mount_order_create(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api/payments/gateway/order"))
        .and(body_json(json!({
            "orderId": order_id(),
            "currency": "INR",
            "receipt": "ORD-1001",
            "notes": { "orderNumber": "ORD-1001" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "order_rzp_1",
            "key": "rzp_test_key",
            "amount": 93500,
            "currency": "INR"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn canonical_verification_body() -> serde_json::Value {
    json!({
        "razorpay_order_id": "order_rzp_1",
        "razorpay_payment_id": "pay_1",
        "razorpay_signature": "sig_1",
        "orderId": order_id()
    })
}

#[tokio::test]
async fn completed_payment_verifies_and_returns_the_order() {
    let server = MockServer::start().await;
    mount_order_create(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/payments/gateway/verify"))
        .and(body_json(canonical_verification_body()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "order": { "id": order_id(), "status": "paid" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let checkout = ScriptedCheckout::with_outcomes(vec![CheckoutOutcome::Completed(
        completion_snake(),
    )]);
    let (orchestrator, mut events) =
        common::orchestrator(&format!("{}/api", server.uri()), checkout).await;

    orchestrator.prepare().await.unwrap();
    let outcome = orchestrator.pay(request()).await.unwrap();

    let order = assert_matches!(outcome, PaymentOutcome::Completed(Some(order)) => order);
    assert_eq!(order["status"], "paid");
    assert_eq!(orchestrator.current_state(), PaymentState::Succeeded);

    assert_matches!(events.recv().await, Some(Event::GatewayReady));
    assert_matches!(
        events.recv().await,
        Some(Event::GatewayOrderCreated { gateway_order_id, .. }) if gateway_order_id == "order_rzp_1"
    );
    assert_matches!(events.recv().await, Some(Event::PaymentSucceeded { .. }));
}

#[tokio::test]
async fn camel_case_payload_sends_the_same_verification_request() {
    let server = MockServer::start().await;
    mount_order_create(&server, 1).await;
    // The matcher on the canonical body is the assertion: a camelCase
    // payload must normalize to exactly the snake_case request.
    Mock::given(method("POST"))
        .and(path("/api/payments/gateway/verify"))
        .and(body_json(canonical_verification_body()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "success": true, "order": null })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let checkout = ScriptedCheckout::with_outcomes(vec![CheckoutOutcome::Completed(
        completion_camel(),
    )]);
    let (orchestrator, _events) =
        common::orchestrator(&format!("{}/api", server.uri()), checkout).await;

    orchestrator.prepare().await.unwrap();
    let outcome = orchestrator.pay(request()).await.unwrap();
    assert_matches!(outcome, PaymentOutcome::Completed(None));
}

#[tokio::test]
async fn pay_before_prepare_is_refused() {
    let server = MockServer::start().await;
    mount_order_create(&server, 0).await;

    let checkout = ScriptedCheckout::with_outcomes(vec![]);
    let (orchestrator, _events) =
        common::orchestrator(&format!("{}/api", server.uri()), checkout).await;

    let err = orchestrator.pay(request()).await.unwrap_err();
    assert_matches!(err, CheckoutError::GatewayNotReady);
}

#[tokio::test]
async fn script_load_failure_is_sticky_and_never_retried() {
    let server = MockServer::start().await;
    let checkout = ScriptedCheckout::failing_to_load("script blocked");
    let (orchestrator, mut events) =
        common::orchestrator(&format!("{}/api", server.uri()), checkout.clone()).await;

    let first = orchestrator.prepare().await.unwrap_err();
    assert_matches!(first, CheckoutError::GatewayUnavailable(reason) if reason == "script blocked");
    let second = orchestrator.prepare().await.unwrap_err();
    assert_matches!(second, CheckoutError::GatewayUnavailable(_));
    assert_eq!(checkout.loads.load(Ordering::SeqCst), 1);

    let err = orchestrator.pay(request()).await.unwrap_err();
    assert_matches!(err, CheckoutError::GatewayUnavailable(_));

    assert_matches!(events.recv().await, Some(Event::GatewayLoadFailed { .. }));
}

#[tokio::test]
async fn missing_gateway_key_is_terminal_but_allows_a_new_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/payments/gateway/order"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "order_rzp_1",
            "amount": 93500,
            "currency": "INR"
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/payments/gateway/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(0)
        .mount(&server)
        .await;

    let checkout = ScriptedCheckout::with_outcomes(vec![]);
    let (orchestrator, _events) =
        common::orchestrator(&format!("{}/api", server.uri()), checkout).await;

    orchestrator.prepare().await.unwrap();
    let err = orchestrator.pay(request()).await.unwrap_err();
    assert_matches!(err, CheckoutError::PaymentFailed(msg) if msg.contains("contact support"));
    assert_eq!(orchestrator.current_state(), PaymentState::Failed);

    // terminal transition cleared the in-flight guard
    let err = orchestrator.pay(request()).await.unwrap_err();
    assert_matches!(err, CheckoutError::PaymentFailed(_));
}

#[tokio::test]
async fn dismissing_the_hosted_ui_cancels_without_verification() {
    let server = MockServer::start().await;
    mount_order_create(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/payments/gateway/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(0)
        .mount(&server)
        .await;

    let checkout = ScriptedCheckout::with_outcomes(vec![CheckoutOutcome::Dismissed]);
    let (orchestrator, mut events) =
        common::orchestrator(&format!("{}/api", server.uri()), checkout).await;

    orchestrator.prepare().await.unwrap();
    let outcome = orchestrator.pay(request()).await.unwrap();
    assert_matches!(outcome, PaymentOutcome::Cancelled);
    assert_eq!(orchestrator.current_state(), PaymentState::Cancelled);

    assert_matches!(events.recv().await, Some(Event::GatewayReady));
    assert_matches!(events.recv().await, Some(Event::GatewayOrderCreated { .. }));
    assert_matches!(events.recv().await, Some(Event::PaymentCancelled { .. }));
}

#[tokio::test]
async fn missing_signature_field_never_reaches_verification() {
    let server = MockServer::start().await;
    mount_order_create(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/payments/gateway/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(0)
        .mount(&server)
        .await;

    let partial: CheckoutCompletion = serde_json::from_value(json!({
        "razorpay_order_id": "order_rzp_1",
        "razorpayPaymentId": "pay_1"
    }))
    .unwrap();
    let checkout = ScriptedCheckout::with_outcomes(vec![CheckoutOutcome::Completed(partial)]);
    let (orchestrator, _events) =
        common::orchestrator(&format!("{}/api", server.uri()), checkout).await;

    orchestrator.prepare().await.unwrap();
    let err = orchestrator.pay(request()).await.unwrap_err();
    assert_matches!(
        err,
        CheckoutError::MissingPaymentFields(fields) if fields == vec!["razorpay_signature"]
    );
    assert_eq!(orchestrator.current_state(), PaymentState::Failed);
}

#[tokio::test]
async fn verification_rejection_joins_message_array() {
    let server = MockServer::start().await;
    mount_order_create(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/payments/gateway/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": ["Signature mismatch", "Contact support"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let checkout = ScriptedCheckout::with_outcomes(vec![CheckoutOutcome::Completed(
        completion_snake(),
    )]);
    let (orchestrator, _events) =
        common::orchestrator(&format!("{}/api", server.uri()), checkout).await;

    orchestrator.prepare().await.unwrap();
    let err = orchestrator.pay(request()).await.unwrap_err();
    assert_matches!(
        err,
        CheckoutError::PaymentFailed(msg) if msg == "Signature mismatch. Contact support"
    );
}

#[tokio::test]
async fn verification_transport_error_surfaces_backend_message() {
    let server = MockServer::start().await;
    mount_order_create(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/payments/gateway/verify"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "message": "Signature invalid" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let checkout = ScriptedCheckout::with_outcomes(vec![CheckoutOutcome::Completed(
        completion_snake(),
    )]);
    let (orchestrator, _events) =
        common::orchestrator(&format!("{}/api", server.uri()), checkout).await;

    orchestrator.prepare().await.unwrap();
    let err = orchestrator.pay(request()).await.unwrap_err();
    assert_matches!(err, CheckoutError::PaymentFailed(msg) if msg == "Signature invalid");
}

#[tokio::test]
async fn duplicate_pay_trigger_does_not_create_a_second_order() {
    let server = MockServer::start().await;
    mount_order_create(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/payments/gateway/verify"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "success": true, "order": null })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let release = Arc::new(Notify::new());
    let checkout = ScriptedCheckout::gated(
        vec![CheckoutOutcome::Completed(completion_snake())],
        release.clone(),
    );
    let (orchestrator, _events) =
        common::orchestrator(&format!("{}/api", server.uri()), checkout.clone()).await;

    orchestrator.prepare().await.unwrap();

    let first = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.pay(request()).await })
    };
    // wait until the first attempt is parked inside the hosted UI
    checkout.opened.notified().await;

    let err = orchestrator.pay(request()).await.unwrap_err();
    assert_matches!(err, CheckoutError::AttemptInProgress);

    release.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert_matches!(outcome, PaymentOutcome::Completed(None));
}
