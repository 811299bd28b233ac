//! Event catalog: creation, publishing and the read paths.
//!
//! Read paths apply auto-expiry before answering, so a LIVE event past its
//! end is reported (and stored) as ENDED. Status changes are conditional
//! updates checked against the event transition table.

use crate::aggregates::inventory::InventoryLedger;
use gatepass_core::environment::Clock;
use gatepass_core::error::StoreError;
use gatepass_core::event::{Event, EventValidationError, NewEvent, SalesCutoff};
use gatepass_core::state::{EventStatus, Lifecycle, TransitionError};
use gatepass_core::store::Store;
use gatepass_core::types::{EventId, OrganizerId};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Event management failures.
#[derive(Debug, Clone, Error)]
pub enum EventError {
    /// Submission rejected
    #[error(transparent)]
    Validation(#[from] EventValidationError),
    /// No such event
    #[error("event not found: {0}")]
    NotFound(EventId),
    /// Caller does not own the event
    #[error("not authorized for event {0}")]
    NotAuthorized(EventId),
    /// The event's end has passed; it was moved to ENDED
    #[error("event has expired")]
    Expired,
    /// Only ENDED events can be deleted
    #[error("event has not ended")]
    NotEnded,
    /// Requested status change is not legal from the current status
    #[error(transparent)]
    Transition(#[from] TransitionError),
    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// An event with the derived flags buyers care about.
#[derive(Clone, Debug, Serialize)]
pub struct EventView {
    /// The event
    #[serde(flatten)]
    pub event: Event,
    /// Every tier or the capacity is exhausted
    pub is_sold_out: bool,
    /// Purchases are currently accepted
    pub is_selling: bool,
}

/// Organizer-facing event management and public listings.
pub struct EventCatalog {
    store: Arc<dyn Store>,
    ledger: Arc<InventoryLedger>,
    clock: Arc<dyn Clock>,
    listing_cutoff: SalesCutoff,
    purchase_cutoff: SalesCutoff,
}

impl EventCatalog {
    /// Create a catalog. `listing_cutoff` hides events from the public list;
    /// `purchase_cutoff` drives [`EventView::is_selling`].
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        ledger: Arc<InventoryLedger>,
        clock: Arc<dyn Clock>,
        listing_cutoff: SalesCutoff,
        purchase_cutoff: SalesCutoff,
    ) -> Self {
        Self {
            store,
            ledger,
            clock,
            listing_cutoff,
            purchase_cutoff,
        }
    }

    /// Validate and store a DRAFT event.
    ///
    /// # Errors
    ///
    /// [`EventError::Validation`] or a storage failure.
    pub async fn create(&self, organizer: OrganizerId, draft: NewEvent) -> Result<Event, EventError> {
        let event = draft.into_event(organizer, self.clock.now())?;
        self.store.insert_event(&event).await?;
        tracing::info!(event_id = %event.id, %organizer, title = %event.title, "Event created");
        Ok(event)
    }

    /// Put a DRAFT event on sale.
    ///
    /// # Errors
    ///
    /// [`EventError::Expired`] if the event is already over (it is moved to
    /// ENDED), ownership and transition errors otherwise.
    pub async fn publish(&self, id: EventId, organizer: OrganizerId) -> Result<Event, EventError> {
        let mut event = self.owned(id, organizer).await?;

        if event.has_ended(self.clock.now()) {
            if !event.status.is_terminal()
                && self
                    .store
                    .transition_event(id, event.status, EventStatus::Ended)
                    .await?
            {
                tracing::info!(event_id = %id, "Expired event moved to ENDED on publish");
            }
            return Err(EventError::Expired);
        }

        self.move_status(&mut event, EventStatus::Live).await?;
        tracing::info!(event_id = %id, %organizer, "Event published");
        Ok(event)
    }

    /// Close sales for good.
    ///
    /// # Errors
    ///
    /// Ownership and transition errors.
    pub async fn end(&self, id: EventId, organizer: OrganizerId) -> Result<Event, EventError> {
        let mut event = self.owned(id, organizer).await?;
        self.move_status(&mut event, EventStatus::Ended).await?;
        tracing::info!(event_id = %id, %organizer, "Event ended");
        Ok(event)
    }

    /// Delete an ENDED event.
    ///
    /// # Errors
    ///
    /// [`EventError::NotEnded`] unless the event is ENDED after auto-expiry.
    pub async fn delete(&self, id: EventId, organizer: OrganizerId) -> Result<(), EventError> {
        let mut event = self.owned(id, organizer).await?;
        self.ledger.auto_expire(&mut event).await?;
        if event.status != EventStatus::Ended || !self.store.delete_ended_event(id).await? {
            return Err(EventError::NotEnded);
        }
        tracing::info!(event_id = %id, %organizer, "Event deleted");
        Ok(())
    }

    /// One event, with auto-expiry applied.
    ///
    /// # Errors
    ///
    /// [`EventError::NotFound`] or a storage failure.
    pub async fn get(&self, id: EventId) -> Result<EventView, EventError> {
        let event = self.ledger.load(id).await?.ok_or(EventError::NotFound(id))?;
        Ok(self.view(event))
    }

    /// LIVE events still inside the listing window and not sold out,
    /// soonest first.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn list_public(&self) -> Result<Vec<EventView>, EventError> {
        let now = self.clock.now();
        self.expire_all().await?;
        Ok(self
            .store
            .live_events()
            .await?
            .into_iter()
            .filter(|e| now < self.listing_cutoff.deadline(e) && !e.is_sold_out())
            .map(|e| self.view(e))
            .collect())
    }

    /// Every event the organizer owns, newest first.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn list_for_organizer(&self, organizer: OrganizerId) -> Result<Vec<EventView>, EventError> {
        self.expire_all().await?;
        Ok(self
            .store
            .events_by_organizer(organizer)
            .await?
            .into_iter()
            .map(|e| self.view(e))
            .collect())
    }

    async fn expire_all(&self) -> Result<(), StoreError> {
        let expired = self.store.expire_events(self.clock.now()).await?;
        if expired > 0 {
            tracing::info!(expired, "Events auto-expired");
        }
        Ok(())
    }

    fn view(&self, event: Event) -> EventView {
        let now = self.clock.now();
        EventView {
            is_sold_out: event.is_sold_out(),
            is_selling: event.is_selling(now, self.purchase_cutoff),
            event,
        }
    }

    async fn owned(&self, id: EventId, organizer: OrganizerId) -> Result<Event, EventError> {
        let event = self
            .store
            .find_event(id)
            .await?
            .ok_or(EventError::NotFound(id))?;
        if event.organizer_id != organizer {
            return Err(EventError::NotAuthorized(id));
        }
        Ok(event)
    }

    async fn move_status(&self, event: &mut Event, to: EventStatus) -> Result<(), EventError> {
        let from = event.status;
        from.transition(to)?;
        if self.store.transition_event(event.id, from, to).await? {
            event.status = to;
            return Ok(());
        }
        // Someone moved it first; report against the status they left behind
        let current = self
            .store
            .find_event(event.id)
            .await?
            .map_or(from, |e| e.status);
        Err(TransitionError {
            entity: EventStatus::ENTITY,
            from: current.as_str(),
            to: to.as_str(),
        }
        .into())
    }
}
