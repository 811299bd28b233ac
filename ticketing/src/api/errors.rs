//! Domain error → HTTP mapping.
//!
//! Conflicts carry a specific code so clients can tell them apart:
//! `SOLD_OUT`, `EVENT_EXPIRED`, `EVENT_NOT_LIVE`, `ALREADY_USED`,
//! `INSUFFICIENT_BALANCE`, `ILLEGAL_TRANSITION`, `EVENT_NOT_ENDED`.

use crate::aggregates::{EventError, PurchaseError, ReconcileError, ScanError, WalletError};
use crate::aggregates::ticket::IssueError;
use axum::http::StatusCode;
use gatepass_core::event::InventoryError;
use gatepass_core::gateway::GatewayError;
use gatepass_core::state::TransitionError;
use gatepass_web::AppError;

fn inventory(err: &InventoryError) -> AppError {
    match err {
        InventoryError::SoldOut => AppError::conflict("SOLD_OUT", err.to_string()),
        InventoryError::TicketTypeNotFound(name) => AppError::new(
            StatusCode::NOT_FOUND,
            "TICKET_TYPE_NOT_FOUND",
            format!("ticket type {name} not found"),
        ),
        InventoryError::EventNotLive => AppError::conflict("EVENT_NOT_LIVE", err.to_string()),
        InventoryError::EventExpired => AppError::conflict("EVENT_EXPIRED", err.to_string()),
    }
}

fn transition(err: &TransitionError) -> AppError {
    AppError::conflict("ILLEGAL_TRANSITION", err.to_string())
}

impl From<IssueError> for AppError {
    fn from(err: IssueError) -> Self {
        match err {
            IssueError::Store(e) => e.into(),
            IssueError::Qr(e) => Self::internal("Ticket could not be issued").with_source(e),
        }
    }
}

impl From<PurchaseError> for AppError {
    fn from(err: PurchaseError) -> Self {
        match err {
            PurchaseError::Validation(message) => Self::validation(message),
            PurchaseError::EventNotFound(id) => Self::not_found("Event", id),
            PurchaseError::Inventory(e) => inventory(&e),
            PurchaseError::Gateway(e @ GatewayError::Rejected(_)) => Self::new(
                StatusCode::BAD_GATEWAY,
                "GATEWAY_REJECTED",
                "The payment provider rejected the checkout",
            )
            .with_source(e),
            PurchaseError::Gateway(e) => {
                Self::unavailable("The payment provider is unavailable, try again").with_source(e)
            }
            PurchaseError::Store(e) => e.into(),
            PurchaseError::Issue(e) => e.into(),
        }
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::UnknownReference(reference) => Self::not_found("Payment", reference),
            ReconcileError::Store(e) => e.into(),
            ReconcileError::Issue(e) => e.into(),
        }
    }
}

impl From<ScanError> for AppError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::NotFound => Self::new(StatusCode::NOT_FOUND, "TICKET_NOT_FOUND", err.to_string()),
            ScanError::NotAuthorized => Self::forbidden(err.to_string()),
            ScanError::EventNotLive => Self::conflict("EVENT_NOT_LIVE", err.to_string()),
            ScanError::AlreadyUsed { scanned_at: Some(at) } => {
                Self::conflict("ALREADY_USED", format!("ticket already used at {}", at.to_rfc3339()))
            }
            ScanError::AlreadyUsed { scanned_at: None } => Self::conflict("ALREADY_USED", err.to_string()),
            ScanError::Store(e) => e.into(),
        }
    }
}

impl From<WalletError> for AppError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Validation(message) => Self::validation(message),
            WalletError::NotFound(id) => Self::not_found("Withdrawal", id),
            WalletError::InsufficientBalance { .. } => Self::conflict("INSUFFICIENT_BALANCE", err.to_string()),
            WalletError::Transition(e) => transition(&e),
            WalletError::Store(e) => e.into(),
        }
    }
}

impl From<EventError> for AppError {
    fn from(err: EventError) -> Self {
        match err {
            EventError::Validation(e) => Self::validation(e.to_string()),
            EventError::NotFound(id) => Self::not_found("Event", id),
            EventError::NotAuthorized(_) => Self::forbidden(err.to_string()),
            EventError::Expired => Self::conflict("EVENT_EXPIRED", err.to_string()),
            EventError::NotEnded => Self::conflict("EVENT_NOT_ENDED", err.to_string()),
            EventError::Transition(e) => transition(&e),
            EventError::Store(e) => e.into(),
        }
    }
}
