//! Event management API endpoints.
//!
//! - POST /api/events - Create a DRAFT event (organizer)
//! - GET /api/events - Public listing
//! - GET /api/events/mine - The caller's events (organizer)
//! - GET /api/events/:id - Event details
//! - POST /api/events/:id/publish - DRAFT → LIVE (owner)
//! - POST /api/events/:id/end - Close sales (owner)
//! - DELETE /api/events/:id - Delete an ENDED event (owner)

use crate::aggregates::EventView;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use gatepass_core::event::{Event, NewEvent};
use gatepass_core::types::EventId;
use gatepass_web::{OrganizerIdentity, WebResult};

/// Create a new event.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/events \
///   -H "X-Auth-User-Id: <organizer uuid>" -H "X-Auth-Role: organizer" \
///   -H "Content-Type: application/json" \
///   -d '{
///     "title": "Lagos Jazz Night",
///     "location": "Eko Hotel",
///     "starts_at": "2025-06-01T19:00:00Z",
///     "ends_at": "2025-06-01T23:00:00Z",
///     "capacity": 300,
///     "ticket_types": [{"name": "Regular", "price": 500000, "quantity": 250}]
///   }'
/// ```
///
/// # Errors
///
/// 422 when the submission is invalid.
pub async fn create_event(
    State(state): State<AppState>,
    organizer: OrganizerIdentity,
    Json(draft): Json<NewEvent>,
) -> WebResult<(StatusCode, Json<Event>)> {
    let event = state.events.create(organizer.id(), draft).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// Public listing of events on sale.
///
/// # Errors
///
/// 500 on storage failure.
pub async fn list_events(State(state): State<AppState>) -> WebResult<Json<Vec<EventView>>> {
    Ok(Json(state.events.list_public().await?))
}

/// The caller's events, newest first.
///
/// # Errors
///
/// 500 on storage failure.
pub async fn my_events(
    State(state): State<AppState>,
    organizer: OrganizerIdentity,
) -> WebResult<Json<Vec<EventView>>> {
    Ok(Json(state.events.list_for_organizer(organizer.id()).await?))
}

/// Event details.
///
/// # Errors
///
/// 404 for an unknown event.
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<EventId>,
) -> WebResult<Json<EventView>> {
    Ok(Json(state.events.get(id).await?))
}

/// Put a DRAFT event on sale.
///
/// # Errors
///
/// 403 for another organizer's event, 409 `EVENT_EXPIRED` or
/// `ILLEGAL_TRANSITION`.
pub async fn publish_event(
    State(state): State<AppState>,
    organizer: OrganizerIdentity,
    Path(id): Path<EventId>,
) -> WebResult<Json<Event>> {
    Ok(Json(state.events.publish(id, organizer.id()).await?))
}

/// Close sales.
///
/// # Errors
///
/// 403 for another organizer's event, 409 if already ENDED.
pub async fn end_event(
    State(state): State<AppState>,
    organizer: OrganizerIdentity,
    Path(id): Path<EventId>,
) -> WebResult<Json<Event>> {
    Ok(Json(state.events.end(id, organizer.id()).await?))
}

/// Delete an ENDED event.
///
/// # Errors
///
/// 403 for another organizer's event, 409 `EVENT_NOT_ENDED`.
pub async fn delete_event(
    State(state): State<AppState>,
    organizer: OrganizerIdentity,
    Path(id): Path<EventId>,
) -> WebResult<StatusCode> {
    state.events.delete(id, organizer.id()).await?;
    Ok(StatusCode::NO_CONTENT)
}
