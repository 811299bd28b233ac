//! Payment status API.
//!
//! - GET /api/payment/status/:reference - Current status; reconciles a PENDING payment
//! - POST /api/payment/verify - Manual reconciliation trigger

use crate::aggregates::ReconcileError;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use gatepass_core::state::PaymentStatus;
use gatepass_core::types::PaymentReference;
use gatepass_web::{AppError, WebResult};
use serde::{Deserialize, Serialize};

/// Payment status.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Payment reference
    pub reference: PaymentReference,
    /// `PENDING`, `SUCCESS` or `FAILED`
    pub status: PaymentStatus,
}

/// Manual verification request.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// Payment reference
    pub reference: PaymentReference,
}

/// Manual verification result.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    /// Whether the payment is now SUCCESS
    pub success: bool,
    /// Status after reconciliation
    pub status: PaymentStatus,
}

/// Current status of a payment.
///
/// A PENDING payment is reconciled on the way; if that fails the stored
/// status is returned and the client simply polls again.
///
/// # Errors
///
/// 404 for an unknown reference.
pub async fn status(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> WebResult<Json<StatusResponse>> {
    let reference = PaymentReference::new(reference);
    let payment = state
        .store
        .find_payment(&reference)
        .await?
        .ok_or_else(|| AppError::not_found("Payment", &reference))?;

    let status = if payment.status == PaymentStatus::Pending {
        match state.reconciler.reconcile(&reference).await {
            Ok(status) => status,
            Err(e @ ReconcileError::UnknownReference(_)) => return Err(e.into()),
            Err(e) => {
                tracing::warn!(%reference, error = %e, "Status poll could not reconcile");
                payment.status
            }
        }
    } else {
        payment.status
    };

    Ok(Json(StatusResponse { reference, status }))
}

/// Reconcile a payment now.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/payment/verify \
///   -H "Content-Type: application/json" -d '{"reference":"GP-..."}'
/// ```
///
/// # Errors
///
/// 404 for an unknown reference, 500 if settlement failed (the payment
/// stays PENDING).
pub async fn verify(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> WebResult<Json<VerifyResponse>> {
    let status = state.reconciler.reconcile(&request.reference).await?;
    Ok(Json(VerifyResponse {
        success: status == PaymentStatus::Success,
        status,
    }))
}
