//! Gateway webhook.
//!
//! - POST /api/webhook/gateway - Signed payment notification
//!
//! The signature over the raw body is checked before anything else; a bad
//! signature is the only non-200 answer. Everything after that is
//! acknowledged with 200 whatever happens, since reconciliation is
//! idempotent and a gateway retry storm helps nobody.

use crate::aggregates::ReconcileError;
use crate::config::UnknownReferencePolicy;
use crate::metrics;
use crate::payment_gateway::SIGNATURE_HEADER;
use crate::payment_gateway::normalize::webhook_reference;
use crate::server::state::AppState;
use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use gatepass_core::types::PaymentReference;
use gatepass_web::{AppError, WebResult};
use serde::Serialize;
use serde_json::Value;

/// Acknowledgement body.
#[derive(Debug, Serialize)]
pub struct Ack {
    /// Always `true`
    pub received: bool,
}

const ACK: Ack = Ack { received: true };

/// Receive a gateway notification.
///
/// # Errors
///
/// 401 when the signature is missing or does not match.
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> WebResult<Json<Ack>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if let Err(e) = state.webhook.verify(&body, signature) {
        metrics::record_webhook("bad_signature");
        tracing::warn!(error = %e, "Webhook rejected");
        return Err(AppError::unauthorized("Invalid webhook signature"));
    }

    let Some(reference) = serde_json::from_slice::<Value>(&body)
        .ok()
        .as_ref()
        .and_then(webhook_reference)
    else {
        metrics::record_webhook("malformed");
        tracing::warn!(bytes = body.len(), "Webhook without a usable payment reference");
        return Ok(Json(ACK));
    };

    handle(&state, &reference).await;
    Ok(Json(ACK))
}

async fn handle(state: &AppState, reference: &PaymentReference) {
    match state.reconciler.reconcile(reference).await {
        Ok(status) => {
            metrics::record_webhook("accepted");
            tracing::info!(%reference, %status, "Webhook processed");
        }
        Err(ReconcileError::UnknownReference(_)) => {
            metrics::record_webhook("unknown_reference");
            match state.config.webhook.unknown_reference {
                UnknownReferencePolicy::Ignore => {
                    tracing::warn!(%reference, "Webhook for unknown reference ignored");
                }
                UnknownReferencePolicy::Synthesize => match state.reconciler.adopt_unknown(reference).await {
                    Ok(Some(status)) => tracing::info!(%reference, %status, "Webhook adopted unknown reference"),
                    Ok(None) => tracing::warn!(%reference, "Unknown reference could not be adopted"),
                    Err(e) => tracing::warn!(%reference, error = %e, "Adopting unknown reference failed"),
                },
            }
        }
        Err(e) => {
            metrics::record_webhook("error");
            tracing::warn!(%reference, error = %e, "Webhook reconciliation failed, awaiting retry");
        }
    }
}
