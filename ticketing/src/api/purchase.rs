//! Purchase API.
//!
//! - POST /api/purchase/initiate - Start a purchase (public)

use crate::aggregates::{PurchaseOutcome, PurchaseRequest};
use crate::server::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use gatepass_core::ticket::Ticket;
use gatepass_core::types::PaymentReference;
use gatepass_web::WebResult;
use serde::Serialize;

/// Response to a purchase.
///
/// Paid tiers carry `checkoutUrl`; free tiers carry `redirectUrl` (the
/// success page) and the issued ticket.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    /// Payment reference; poll status and fetch the ticket with it
    pub reference: PaymentReference,
    /// Gateway checkout page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
    /// Where to send the buyer when no checkout is needed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    /// Ticket issued immediately
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<Box<Ticket>>,
}

/// Start a purchase.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/purchase/initiate \
///   -H "Content-Type: application/json" \
///   -d '{"eventId":"...","ticketType":"Regular","buyerEmail":"ada@example.com","buyerName":"Ada"}'
/// ```
///
/// # Errors
///
/// 422 for a malformed request, 404 for an unknown event or tier, 409 when
/// sold out or closed, 503 when the gateway is unreachable.
pub async fn initiate(
    State(state): State<AppState>,
    Json(request): Json<PurchaseRequest>,
) -> WebResult<(StatusCode, Json<InitiateResponse>)> {
    let response = match state.purchases.initiate(request).await? {
        PurchaseOutcome::Checkout {
            reference,
            checkout_url,
        } => InitiateResponse {
            reference,
            checkout_url: Some(checkout_url),
            redirect_url: None,
            ticket: None,
        },
        PurchaseOutcome::Issued { reference, ticket } => InitiateResponse {
            redirect_url: Some(format!(
                "{}/payment/success?ref={reference}",
                state.config.server.frontend_url.trim_end_matches('/')
            )),
            reference,
            checkout_url: None,
            ticket: Some(ticket),
        },
    };
    Ok((StatusCode::CREATED, Json(response)))
}
