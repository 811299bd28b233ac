//! Payment gateway adapters.
//!
//! Everything provider-specific lives here: the HTTP client, the payload
//! normalizer and webhook signature verification. The rest of the service
//! only sees [`PaymentGateway`] and the four-valued
//! [`VerificationOutcome`](gatepass_core::gateway::VerificationOutcome).

pub mod http;
pub mod mock;
pub mod normalize;
pub mod signature;

pub use http::HttpGateway;
pub use mock::MockGateway;
pub use signature::{SIGNATURE_HEADER, SignatureError, WebhookVerifier};

use crate::config::{GatewayConfig, GatewayMode};
use gatepass_core::gateway::{GatewayError, PaymentGateway};
use std::sync::Arc;

/// Build the gateway selected by configuration.
///
/// # Errors
///
/// [`GatewayError::Unavailable`] if the HTTP client cannot be built.
pub fn build_gateway(config: &GatewayConfig) -> Result<Arc<dyn PaymentGateway>, GatewayError> {
    match config.mode {
        GatewayMode::Http => {
            tracing::info!(base_url = %config.base_url, "Using HTTP payment gateway");
            Ok(Arc::new(HttpGateway::new(config)?))
        }
        GatewayMode::Mock => {
            tracing::warn!("Using mock payment gateway; every payment is approved");
            Ok(Arc::new(MockGateway::new()))
        }
    }
}
