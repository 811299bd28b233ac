//! Development gateway.
//!
//! Approves every payment without moving money. The "checkout" URL sends
//! the buyer straight back to our redirect callback, so the full
//! initiate → callback → reconcile loop runs locally without credentials.

use async_trait::async_trait;
use gatepass_core::gateway::{
    CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway, Verification,
    VerificationOutcome,
};
use gatepass_core::types::PaymentReference;

/// Always-successful gateway for local development.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockGateway;

impl MockGateway {
    /// Create a new mock gateway.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn initiate(&self, request: &CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        tracing::info!(reference = %request.reference, amount = %request.amount, "Mock checkout opened");
        Ok(CheckoutSession {
            checkout_url: request.redirect_url.clone(),
        })
    }

    async fn verify(&self, reference: &PaymentReference) -> Result<Verification, GatewayError> {
        tracing::debug!(%reference, "Mock verification approves");
        Ok(Verification::outcome(VerificationOutcome::Successful))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use gatepass_core::gateway::CheckoutMetadata;
    use gatepass_core::types::{EventId, Money};

    #[tokio::test]
    async fn test_mock_checkout_returns_to_redirect() {
        let gateway = MockGateway::new();
        let request = CheckoutRequest {
            reference: PaymentReference::generate(),
            amount: Money::from_minor(5230),
            buyer_email: "ada@example.com".to_string(),
            buyer_name: "Ada".to_string(),
            redirect_url: "http://localhost:8080/api/callback/redirect?ref=EVT-1".to_string(),
            metadata: CheckoutMetadata {
                event_id: EventId::new(),
                ticket_type: "Regular".to_string(),
                buyer_email: "ada@example.com".to_string(),
            },
        };

        let session = gateway.initiate(&request).await.unwrap();
        assert_eq!(session.checkout_url, request.redirect_url);

        let verification = gateway.verify(&request.reference).await.unwrap();
        assert_eq!(verification.outcome, VerificationOutcome::Successful);
    }
}
