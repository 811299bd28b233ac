//! HTTP adapter for the hosted-checkout gateway.
//!
//! - `POST {base}/payment/initiate` opens a checkout
//! - `GET {base}/payment/transaction/verify/{reference}` returns the truth
//!
//! Both calls use a bounded timeout. Transport failures, timeouts, 429 and
//! 5xx surface as transient errors; `verify` retries those a configured
//! number of times before giving up.

use super::normalize;
use crate::config::GatewayConfig;
use crate::metrics;
use async_trait::async_trait;
use gatepass_core::gateway::{
    CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway, Verification,
};
use gatepass_core::types::{Money, PaymentReference};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};

/// Pause between `verify` attempts.
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitiateBody<'a> {
    amount: f64,
    payment_reference: &'a str,
    currency: &'a str,
    customer_email: &'a str,
    customer_name: &'a str,
    redirect_url: &'a str,
    payment_methods: &'static str,
    description: String,
    metadata: InitiateMetadata<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitiateMetadata<'a> {
    event_id: String,
    ticket_type: &'a str,
    email: &'a str,
}

/// Gateway amounts are major units.
#[allow(clippy::cast_precision_loss)]
fn to_major(amount: Money) -> f64 {
    amount.minor() as f64 / 100.0
}

const fn error_label(err: &GatewayError) -> &'static str {
    match err {
        GatewayError::Unavailable(_) => "unavailable",
        GatewayError::Timeout => "timeout",
        GatewayError::Rejected(_) => "rejected",
        GatewayError::Malformed(_) => "malformed",
    }
}

/// Production gateway client.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    secret_key: String,
    currency: String,
    verify_retries: u32,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url)
            .field("currency", &self.currency)
            .field("verify_retries", &self.verify_retries)
            .finish_non_exhaustive()
    }
}

impl HttpGateway {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Unavailable`] if the HTTP client cannot be built.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            currency: config.currency.clone(),
            verify_retries: config.verify_retries,
        })
    }

    /// Send a request and return the JSON body of a successful envelope.
    async fn send(&self, request: RequestBuilder) -> Result<Value, GatewayError> {
        let response = request
            .bearer_auth(&self.secret_key)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(GatewayError::Unavailable(format!("gateway returned {status}")));
        }

        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Unavailable(e.to_string())
            }
        })?;
        let body: Value = serde_json::from_str(&text).map_err(|e| {
            if status.is_success() {
                GatewayError::Malformed(e.to_string())
            } else {
                GatewayError::Rejected(format!("gateway returned {status}"))
            }
        })?;

        if !status.is_success() || !normalize::request_successful(&body) {
            let message = normalize::response_message(&body)
                .unwrap_or_else(|| format!("gateway returned {status}"));
            return Err(GatewayError::Rejected(message));
        }
        Ok(body)
    }

    async fn verify_once(&self, reference: &PaymentReference) -> Result<Verification, GatewayError> {
        let url = format!(
            "{}/payment/transaction/verify/{}",
            self.base_url,
            reference.as_str()
        );
        let body = self.send(self.client.get(url)).await?;
        Ok(normalize::verification_from_json(&body))
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn initiate(&self, request: &CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        let body = InitiateBody {
            amount: to_major(request.amount),
            payment_reference: request.reference.as_str(),
            currency: &self.currency,
            customer_email: &request.buyer_email,
            customer_name: &request.buyer_name,
            redirect_url: &request.redirect_url,
            payment_methods: "card,bank-transfer",
            description: format!("Ticket purchase: {}", request.metadata.ticket_type),
            metadata: InitiateMetadata {
                event_id: request.metadata.event_id.to_string(),
                ticket_type: &request.metadata.ticket_type,
                email: &request.metadata.buyer_email,
            },
        };

        let started = Instant::now();
        let result = self
            .send(
                self.client
                    .post(format!("{}/payment/initiate", self.base_url))
                    .json(&body),
            )
            .await
            .and_then(|body| {
                normalize::checkout_url(&body)
                    .map(|checkout_url| CheckoutSession { checkout_url })
                    .ok_or_else(|| GatewayError::Malformed("response has no checkout URL".to_string()))
            });

        let label = result.as_ref().map_or_else(error_label, |_| "ok");
        metrics::record_gateway_call("initiate", label, started.elapsed());
        match &result {
            Ok(_) => tracing::info!(reference = %request.reference, "Checkout opened"),
            Err(e) => tracing::warn!(reference = %request.reference, error = %e, "Checkout initiation failed"),
        }
        result
    }

    async fn verify(&self, reference: &PaymentReference) -> Result<Verification, GatewayError> {
        let mut attempt = 0;
        loop {
            let started = Instant::now();
            let result = self.verify_once(reference).await;
            let label = result.as_ref().map_or_else(error_label, |_| "ok");
            metrics::record_gateway_call("verify", label, started.elapsed());

            match result {
                Err(e) if e.is_transient() && attempt < self.verify_retries => {
                    attempt += 1;
                    tracing::debug!(%reference, attempt, error = %e, "Retrying verification");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                other => return other,
            }
        }
    }
}
