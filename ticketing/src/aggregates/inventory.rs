//! Inventory ledger.
//!
//! Purchase-time checks run against a freshly loaded event (after
//! auto-expiry). The decisive check happens later, inside the settlement
//! transaction, as a single increment-if-below-limit on the store; the
//! pre-check only keeps buyers from paying for something already gone.

use gatepass_core::environment::Clock;
use gatepass_core::error::StoreError;
use gatepass_core::event::{Event, InventoryError, SalesCutoff, TicketType};
use gatepass_core::state::EventStatus;
use gatepass_core::store::{SaleOutcome, Store, StoreTx};
use gatepass_core::types::{EventId, OrganizerId};
use std::sync::Arc;

/// A passed reservation check: what the buyer is about to pay for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reservation {
    /// Event
    pub event_id: EventId,
    /// Owner, credited on settlement
    pub organizer_id: OrganizerId,
    /// The tier as it was when checked
    pub ticket_type: TicketType,
}

/// Gates ticket sales against quantity, capacity and the sales window.
pub struct InventoryLedger {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    purchase_cutoff: SalesCutoff,
}

impl InventoryLedger {
    /// Create a ledger closing purchases at `purchase_cutoff`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, purchase_cutoff: SalesCutoff) -> Self {
        Self {
            store,
            clock,
            purchase_cutoff,
        }
    }

    /// Move a LIVE event past its end to ENDED, in storage and in `event`.
    ///
    /// Returns `true` if this call performed the transition.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the conditional update.
    pub async fn auto_expire(&self, event: &mut Event) -> Result<bool, StoreError> {
        if !event.needs_expiry(self.clock.now()) {
            return Ok(false);
        }
        let moved = self
            .store
            .transition_event(event.id, EventStatus::Live, EventStatus::Ended)
            .await?;
        event.status = EventStatus::Ended;
        if moved {
            tracing::info!(event_id = %event.id, "Event auto-expired");
        }
        Ok(moved)
    }

    /// Load an event with auto-expiry applied.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`].
    pub async fn load(&self, event_id: EventId) -> Result<Option<Event>, StoreError> {
        let Some(mut event) = self.store.find_event(event_id).await? else {
            return Ok(None);
        };
        self.auto_expire(&mut event).await?;
        Ok(Some(event))
    }

    /// Check that one ticket of `ticket_type` can be sold right now.
    ///
    /// # Errors
    ///
    /// [`InventoryError`] naming the first failed precondition.
    pub fn check_and_reserve(
        &self,
        event: &Event,
        ticket_type: &str,
    ) -> Result<Reservation, InventoryError> {
        let tier = event.check_purchase(ticket_type, self.clock.now(), self.purchase_cutoff)?;
        Ok(Reservation {
            event_id: event.id,
            organizer_id: event.organizer_id,
            ticket_type: tier.clone(),
        })
    }

    /// Commit one sale inside `tx`. The event flips to ENDED in the same
    /// statement when this sale exhausts it.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`]; a guard miss is `Ok(SaleOutcome::Rejected)`.
    pub async fn commit_sale(
        tx: &mut dyn StoreTx,
        event_id: EventId,
        ticket_type: &str,
    ) -> Result<SaleOutcome, StoreError> {
        let outcome = tx.commit_sale(event_id, ticket_type).await?;
        match &outcome {
            SaleOutcome::Committed { sold_out: true } => {
                tracing::info!(%event_id, ticket_type, "Event sold out, moved to ENDED");
            }
            SaleOutcome::Committed { sold_out: false } => {
                tracing::debug!(%event_id, ticket_type, "Sale committed");
            }
            SaleOutcome::Rejected(reason) => {
                tracing::debug!(%event_id, ticket_type, %reason, "Sale rejected");
            }
        }
        Ok(outcome)
    }
}
