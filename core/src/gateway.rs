//! Payment gateway seam.
//!
//! The reconciliation engine only ever sees the four-valued
//! [`VerificationOutcome`]. Provider payload shapes stay inside the adapter.

use crate::types::{EventId, Money, PaymentReference};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Data echoed back by the gateway so an unknown reference can be rebuilt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutMetadata {
    /// Event being purchased
    pub event_id: EventId,
    /// Ticket type name
    pub ticket_type: String,
    /// Buyer email
    pub buyer_email: String,
}

/// Everything the gateway needs to open a hosted checkout.
#[derive(Clone, Debug)]
pub struct CheckoutRequest {
    /// Our reference (the gateway's merchant reference)
    pub reference: PaymentReference,
    /// Gross amount to charge
    pub amount: Money,
    /// Buyer email
    pub buyer_email: String,
    /// Buyer display name
    pub buyer_name: String,
    /// Where the buyer's browser returns after checkout
    pub redirect_url: String,
    /// Echoed metadata
    pub metadata: CheckoutMetadata,
}

/// A hosted checkout opened by the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutSession {
    /// URL the buyer is sent to
    pub checkout_url: String,
}

/// Normalized verification verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationOutcome {
    /// Money captured
    Successful,
    /// Still in flight
    Pending,
    /// Confirmed decline, cancellation or expiry
    Failed,
    /// Gateway answered but the status could not be classified
    Unknown,
}

/// Verification verdict plus whatever the gateway echoed back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verification {
    /// Verdict
    pub outcome: VerificationOutcome,
    /// Amount the gateway reports, if any
    pub amount: Option<Money>,
    /// Echoed checkout metadata, if present and well-formed
    pub metadata: Option<CheckoutMetadata>,
    /// Customer name reported by the gateway
    pub buyer_name: Option<String>,
}

impl Verification {
    /// A bare verdict with no echoed data.
    #[must_use]
    pub const fn outcome(outcome: VerificationOutcome) -> Self {
        Self {
            outcome,
            amount: None,
            metadata: None,
            buyer_name: None,
        }
    }
}

/// Gateway call failures.
///
/// `Unavailable` and `Timeout` are transient: a payment under verification
/// stays PENDING. Only a [`VerificationOutcome::Failed`] verdict finalizes
/// a payment as FAILED.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Network error, 5xx or rate limit
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
    /// Bounded timeout elapsed
    #[error("gateway timed out")]
    Timeout,
    /// Gateway refused the request (4xx, `requestSuccessful = false`)
    #[error("gateway rejected request: {0}")]
    Rejected(String),
    /// Response could not be interpreted
    #[error("malformed gateway response: {0}")]
    Malformed(String),
}

impl GatewayError {
    /// Whether a retry could plausibly succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout)
    }
}

/// Black-box payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Provider label for logs and metrics.
    fn name(&self) -> &'static str;

    /// Open a hosted checkout.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when no checkout URL could be obtained.
    async fn initiate(&self, request: &CheckoutRequest) -> Result<CheckoutSession, GatewayError>;

    /// Ask the provider for the truth about a reference.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] on transport failure; a decline is an
    /// `Ok` with [`VerificationOutcome::Failed`].
    async fn verify(&self, reference: &PaymentReference) -> Result<Verification, GatewayError>;
}
