//! HTTP gateway adapter against a local fixture server.
//!
//! The fixture speaks the gateway's envelope format and can be told to fail
//! or stall, so retry, timeout and rejection handling run over real sockets.
//!
//! Run with: `cargo test --test gateway_http_test`

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use gatepass_core::gateway::{
    CheckoutMetadata, CheckoutRequest, GatewayError, PaymentGateway, VerificationOutcome,
};
use gatepass_core::types::{EventId, Money, PaymentReference};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use ticketing::config::{GatewayConfig, GatewayMode};
use ticketing::payment_gateway::HttpGateway;

const SECRET: &str = "sk_test_fixture";

#[derive(Clone, Default)]
struct Fixture {
    /// Remaining 503s before `/verify` answers
    outages: Arc<AtomicUsize>,
    verify_hits: Arc<AtomicUsize>,
    initiated: Arc<Mutex<Vec<Value>>>,
}

async fn initiate(
    State(fixture): State<Fixture>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {SECRET}"));
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"requestSuccessful": false, "responseMessage": "Invalid secret key"})),
        );
    }
    fixture.initiated.lock().await.push(body);
    (
        StatusCode::OK,
        Json(json!({
            "requestSuccessful": true,
            "responseMessage": "success",
            "responseBody": {"checkoutUrl": "https://pay.fixture.test/checkout/abc"}
        })),
    )
}

async fn verify(
    State(fixture): State<Fixture>,
    Path(reference): Path<String>,
) -> (StatusCode, Json<Value>) {
    fixture.verify_hits.fetch_add(1, Ordering::SeqCst);

    if fixture
        .outages
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"message": "try later"})));
    }

    match reference.as_str() {
        "GP-REJECT" => (
            StatusCode::BAD_REQUEST,
            Json(json!({"requestSuccessful": false, "responseMessage": "Invalid reference"})),
        ),
        "GP-SLOW" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            (StatusCode::OK, Json(json!({"status": "SUCCESSFUL"})))
        }
        "GP-DECLINED" => (
            StatusCode::OK,
            Json(json!({"requestSuccessful": true, "responseBody": {"status": "DECLINED"}})),
        ),
        _ => (
            StatusCode::OK,
            Json(json!({
                "requestSuccessful": true,
                "responseBody": {"status": "SUCCESSFUL", "amount": 52.3}
            })),
        ),
    }
}

async fn serve(fixture: Fixture) -> String {
    let router = Router::new()
        .route("/payment/initiate", post(initiate))
        .route("/payment/transaction/verify/:reference", get(verify))
        .with_state(fixture);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{address}")
}

fn gateway(base_url: &str, secret: &str, verify_retries: u32) -> HttpGateway {
    HttpGateway::new(&GatewayConfig {
        mode: GatewayMode::Http,
        base_url: base_url.to_string(),
        secret_key: secret.to_string(),
        timeout_ms: 300,
        verify_retries,
        currency: "NGN".to_string(),
    })
    .unwrap()
}

fn checkout() -> CheckoutRequest {
    CheckoutRequest {
        reference: PaymentReference::new("GP-CHECKOUT-1"),
        amount: Money::from_minor(5230),
        buyer_email: "ada@example.com".to_string(),
        buyer_name: "Ada Buyer".to_string(),
        redirect_url: "https://api.gatepass.test/api/callback/redirect?ref=GP-CHECKOUT-1".to_string(),
        metadata: CheckoutMetadata {
            event_id: EventId::new(),
            ticket_type: "Regular".to_string(),
            buyer_email: "ada@example.com".to_string(),
        },
    }
}

#[tokio::test]
async fn test_initiate_sends_major_units_and_metadata() {
    let fixture = Fixture::default();
    let base = serve(fixture.clone()).await;
    let request = checkout();

    let session = gateway(&base, SECRET, 0).initiate(&request).await.unwrap();
    assert_eq!(session.checkout_url, "https://pay.fixture.test/checkout/abc");

    let sent = fixture.initiated.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["amount"], 52.3);
    assert_eq!(sent[0]["paymentReference"], "GP-CHECKOUT-1");
    assert_eq!(sent[0]["currency"], "NGN");
    assert_eq!(sent[0]["metadata"]["ticketType"], "Regular");
    assert_eq!(
        sent[0]["metadata"]["eventId"],
        request.metadata.event_id.to_string()
    );
}

#[tokio::test]
async fn test_initiate_with_bad_key_is_rejected() {
    let base = serve(Fixture::default()).await;

    let err = gateway(&base, "sk_wrong", 0)
        .initiate(&checkout())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Rejected(ref m) if m == "Invalid secret key"), "{err:?}");
}

#[tokio::test]
async fn test_verify_normalizes_outcome_and_amount() {
    let base = serve(Fixture::default()).await;
    let gateway = gateway(&base, SECRET, 0);

    let verification = gateway
        .verify(&PaymentReference::new("GP-OK"))
        .await
        .unwrap();
    assert_eq!(verification.outcome, VerificationOutcome::Successful);
    assert_eq!(verification.amount, Some(Money::from_minor(5230)));

    let verification = gateway
        .verify(&PaymentReference::new("GP-DECLINED"))
        .await
        .unwrap();
    assert_eq!(verification.outcome, VerificationOutcome::Failed);
}

#[tokio::test]
async fn test_verify_retries_transient_failures() {
    let fixture = Fixture::default();
    fixture.outages.store(2, Ordering::SeqCst);
    let base = serve(fixture.clone()).await;

    let verification = gateway(&base, SECRET, 2)
        .verify(&PaymentReference::new("GP-OK"))
        .await
        .unwrap();
    assert_eq!(verification.outcome, VerificationOutcome::Successful);
    assert_eq!(fixture.verify_hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_verify_gives_up_after_retries() {
    let fixture = Fixture::default();
    fixture.outages.store(5, Ordering::SeqCst);
    let base = serve(fixture.clone()).await;

    let err = gateway(&base, SECRET, 1)
        .verify(&PaymentReference::new("GP-OK"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Unavailable(_)), "{err:?}");
    assert_eq!(fixture.verify_hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_verify_rejection_is_not_retried() {
    let fixture = Fixture::default();
    let base = serve(fixture.clone()).await;

    let err = gateway(&base, SECRET, 3)
        .verify(&PaymentReference::new("GP-REJECT"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Rejected(_)), "{err:?}");
    assert_eq!(fixture.verify_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_verify_times_out() {
    let base = serve(Fixture::default()).await;

    let err = gateway(&base, SECRET, 0)
        .verify(&PaymentReference::new("GP-SLOW"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Timeout), "{err:?}");
}

#[tokio::test]
async fn test_unreachable_gateway_is_unavailable() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let err = gateway(&format!("http://{address}"), SECRET, 0)
        .verify(&PaymentReference::new("GP-OK"))
        .await
        .unwrap_err();
    assert!(err.is_transient(), "{err:?}");
}
