//! Admin API.
//!
//! - GET /api/admin/anomalies?limit= - Sales captured beyond inventory

use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Query, State},
};
use gatepass_core::payment::ReconciliationAnomaly;
use gatepass_web::{AdminIdentity, WebResult};
use serde::Deserialize;

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 500;

/// Listing parameters.
#[derive(Debug, Deserialize)]
pub struct AnomalyQuery {
    /// Maximum rows (default 100, max 500)
    pub limit: Option<u32>,
}

/// Most recent reconciliation anomalies.
///
/// # Errors
///
/// 500 on storage failure.
pub async fn anomalies(
    State(state): State<AppState>,
    _admin: AdminIdentity,
    Query(query): Query<AnomalyQuery>,
) -> WebResult<Json<Vec<ReconciliationAnomaly>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Ok(Json(state.store.anomalies(limit).await?))
}
