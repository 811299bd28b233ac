//! Ticket API.
//!
//! - GET /api/ticket/by-reference/:reference - Buyer polls for their ticket (public)
//! - POST /api/ticket/scan - Door scan (organizer)
//! - GET /api/tickets/sales - Sales summary (organizer)

use crate::aggregates::ticket::{Admission, EventSummary, SalesSummary, TicketLookup};
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use gatepass_core::types::{EventId, PaymentReference, QrToken};
use gatepass_web::{AppError, OrganizerIdentity, WebResult};
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Ticket readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    /// Payment not settled yet
    Pending,
    /// Payment declined
    Failed,
    /// Ticket issued
    Ready,
}

/// A buyer's ticket, or where it stands.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketResponse {
    /// Readiness
    pub status: TicketStatus,
    /// Event details, once ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<EventSummary>,
    /// Tier, once ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_type: Option<String>,
    /// Attendee, once ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer_email: Option<String>,
    /// QR image data URI, once ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_image: Option<String>,
    /// Admission time, if admitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanned_at: Option<DateTime<Utc>>,
}

impl TicketResponse {
    const fn waiting(status: TicketStatus) -> Self {
        Self {
            status,
            event: None,
            ticket_type: None,
            buyer_email: None,
            qr_image: None,
            scanned_at: None,
        }
    }
}

impl From<TicketLookup> for TicketResponse {
    fn from(lookup: TicketLookup) -> Self {
        match lookup {
            TicketLookup::Pending => Self::waiting(TicketStatus::Pending),
            TicketLookup::Failed => Self::waiting(TicketStatus::Failed),
            TicketLookup::Ready { ticket, event } => Self {
                status: TicketStatus::Ready,
                event,
                ticket_type: Some(ticket.ticket_type),
                buyer_email: Some(ticket.buyer_email),
                qr_image: Some(ticket.qr_image),
                scanned_at: ticket.scanned_at,
            },
        }
    }
}

/// Door scan request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    /// Token read from the QR code
    pub qr_token: String,
    /// Event being admitted to
    pub event_id: EventId,
}

// ============================================================================
// Handlers
// ============================================================================

/// Ticket for a payment reference.
///
/// # Errors
///
/// 404 when neither a payment nor a ticket exists for the reference.
pub async fn by_reference(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> WebResult<Json<TicketResponse>> {
    let reference = PaymentReference::new(reference);
    let lookup = state
        .tickets
        .by_reference(&reference)
        .await?
        .ok_or_else(|| AppError::not_found("Payment", &reference))?;
    Ok(Json(lookup.into()))
}

/// Admit a ticket holder.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/ticket/scan \
///   -H "X-Auth-User-Id: <organizer uuid>" -H "X-Auth-Role: organizer" \
///   -H "Content-Type: application/json" \
///   -d '{"qrToken":"...","eventId":"..."}'
/// ```
///
/// # Errors
///
/// 404 `TICKET_NOT_FOUND`, 403 for another organizer's event, 409
/// `EVENT_NOT_LIVE` or `ALREADY_USED`.
pub async fn scan(
    State(state): State<AppState>,
    organizer: OrganizerIdentity,
    Json(request): Json<ScanRequest>,
) -> WebResult<Json<Admission>> {
    let token = QrToken::new(request.qr_token.trim());
    let admission = state
        .scans
        .scan(&token, request.event_id, organizer.id())
        .await?;
    Ok(Json(admission))
}

/// Sales totals for the calling organizer.
///
/// # Errors
///
/// 500 on storage failure.
pub async fn sales(
    State(state): State<AppState>,
    organizer: OrganizerIdentity,
) -> WebResult<Json<SalesSummary>> {
    Ok(Json(state.tickets.sales_summary(organizer.id()).await?))
}
