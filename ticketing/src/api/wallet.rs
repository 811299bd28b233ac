//! Wallet and withdrawal API.
//!
//! Organizer:
//! - GET /api/wallet - Balance, totals and recent entries
//! - POST /api/withdrawals - Request a payout
//! - GET /api/withdrawals - Own withdrawals
//!
//! Admin:
//! - GET /api/admin/withdrawals?status= - All withdrawals
//! - POST /api/admin/withdrawals/:id/approve - Debit and approve
//! - POST /api/admin/withdrawals/:id/reject - Reject
//! - POST /api/admin/withdrawals/:id/paid - Mark paid out

use crate::aggregates::wallet::{WalletView, WithdrawalRequest};
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use gatepass_core::state::WithdrawalStatus;
use gatepass_core::types::{Money, WithdrawalId};
use gatepass_core::wallet::{BankDetails, Withdrawal};
use gatepass_web::{AdminIdentity, AppError, OrganizerIdentity, WebResult};
use serde::Deserialize;

/// Withdrawal request body.
#[derive(Debug, Deserialize)]
pub struct CreateWithdrawalRequest {
    /// Amount in minor units
    pub amount: Money,
    /// Payout destination
    pub bank_details: BankDetails,
}

/// Admin listing filter.
#[derive(Debug, Deserialize)]
pub struct WithdrawalFilter {
    /// `PENDING`, `APPROVED`, `REJECTED` or `PAID`
    pub status: Option<String>,
}

/// The caller's wallet.
///
/// # Errors
///
/// 500 on storage failure.
pub async fn get_wallet(
    State(state): State<AppState>,
    organizer: OrganizerIdentity,
) -> WebResult<Json<WalletView>> {
    Ok(Json(state.wallets.wallet(organizer.id()).await?))
}

/// Request a payout.
///
/// # Errors
///
/// 422 for a zero amount or incomplete bank details, 409
/// `INSUFFICIENT_BALANCE`.
pub async fn request_withdrawal(
    State(state): State<AppState>,
    organizer: OrganizerIdentity,
    Json(request): Json<CreateWithdrawalRequest>,
) -> WebResult<(StatusCode, Json<Withdrawal>)> {
    let withdrawal = state
        .wallets
        .request_withdrawal(
            organizer.id(),
            WithdrawalRequest {
                amount: request.amount,
                bank_details: request.bank_details,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(withdrawal)))
}

/// The caller's withdrawals.
///
/// # Errors
///
/// 500 on storage failure.
pub async fn my_withdrawals(
    State(state): State<AppState>,
    organizer: OrganizerIdentity,
) -> WebResult<Json<Vec<Withdrawal>>> {
    Ok(Json(state.wallets.list_mine(organizer.id()).await?))
}

/// Every withdrawal, optionally filtered by status.
///
/// # Errors
///
/// 400 for an unknown status.
pub async fn all_withdrawals(
    State(state): State<AppState>,
    _admin: AdminIdentity,
    Query(filter): Query<WithdrawalFilter>,
) -> WebResult<Json<Vec<Withdrawal>>> {
    let status = filter
        .status
        .map(|s| s.trim().to_ascii_uppercase().parse::<WithdrawalStatus>())
        .transpose()
        .map_err(|e| AppError::bad_request(e.to_string()))?;
    Ok(Json(state.wallets.list_all(status).await?))
}

/// Approve a withdrawal.
///
/// # Errors
///
/// 404, 409 `INSUFFICIENT_BALANCE` (stays PENDING) or `ILLEGAL_TRANSITION`.
pub async fn approve(
    State(state): State<AppState>,
    admin: AdminIdentity,
    Path(id): Path<WithdrawalId>,
) -> WebResult<Json<Withdrawal>> {
    Ok(Json(state.wallets.approve(id, admin.id()).await?))
}

/// Reject a withdrawal.
///
/// # Errors
///
/// 404 or 409 `ILLEGAL_TRANSITION`.
pub async fn reject(
    State(state): State<AppState>,
    admin: AdminIdentity,
    Path(id): Path<WithdrawalId>,
) -> WebResult<Json<Withdrawal>> {
    Ok(Json(state.wallets.reject(id, admin.id()).await?))
}

/// Mark an approved withdrawal as paid out.
///
/// # Errors
///
/// 404 or 409 `ILLEGAL_TRANSITION`.
pub async fn mark_paid(
    State(state): State<AppState>,
    admin: AdminIdentity,
    Path(id): Path<WithdrawalId>,
) -> WebResult<Json<Withdrawal>> {
    Ok(Json(state.wallets.mark_paid(id, admin.id()).await?))
}
