//! Router configuration for the ticketing service.

use super::health::{health_check, metrics, readiness_check};
use super::state::AppState;
use crate::api::{admin, callback, events, payments, purchase, tickets, wallet, webhook};
use axum::{
    Router,
    routing::{get, post},
};
use gatepass_web::with_request_tracing;

/// Build the complete Axum router.
///
/// Public routes (purchase, status, callback, webhook, ticket lookup,
/// listings) need no identity; organizer and admin routes read the identity
/// forwarded by the upstream auth layer.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Buyer flow
        .route("/purchase/initiate", post(purchase::initiate))
        .route("/payment/status/:reference", get(payments::status))
        .route("/payment/verify", post(payments::verify))
        .route("/callback/redirect", get(callback::redirect))
        .route("/webhook/gateway", post(webhook::receive))
        .route("/ticket/by-reference/:reference", get(tickets::by_reference))
        // Door and sales
        .route("/ticket/scan", post(tickets::scan))
        .route("/tickets/sales", get(tickets::sales))
        // Events
        .route("/events", post(events::create_event).get(events::list_events))
        .route("/events/mine", get(events::my_events))
        .route("/events/:id", get(events::get_event).delete(events::delete_event))
        .route("/events/:id/publish", post(events::publish_event))
        .route("/events/:id/end", post(events::end_event))
        // Wallet
        .route("/wallet", get(wallet::get_wallet))
        .route(
            "/withdrawals",
            post(wallet::request_withdrawal).get(wallet::my_withdrawals),
        )
        // Admin
        .route("/admin/withdrawals", get(wallet::all_withdrawals))
        .route("/admin/withdrawals/:id/approve", post(wallet::approve))
        .route("/admin/withdrawals/:id/reject", post(wallet::reject))
        .route("/admin/withdrawals/:id/paid", post(wallet::mark_paid))
        .route("/admin/anomalies", get(admin::anomalies));

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .nest("/api", api_routes)
        .with_state(state);

    with_request_tracing(router)
}
