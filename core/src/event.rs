//! Events, ticket types and the pure inventory rules.

use crate::state::EventStatus;
use crate::types::{EventId, Money, OrganizerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// A tier of tickets within an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketType {
    /// Name, unique within the event
    pub name: String,
    /// Price in minor units (0 = free)
    pub price: Money,
    /// Number of tickets of this type on sale
    pub quantity: u32,
    /// Number already sold (never exceeds `quantity`)
    pub sold: u32,
}

impl TicketType {
    /// Tickets of this type still available.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.quantity.saturating_sub(self.sold)
    }

    /// Free ticket types bypass the gateway.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.price.is_zero()
    }
}

/// An organizer's event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event ID
    pub id: EventId,
    /// Owning organizer
    pub organizer_id: OrganizerId,
    /// Title
    pub title: String,
    /// Free-form description
    pub description: String,
    /// Venue
    pub location: String,
    /// Optional banner image URL
    pub banner_url: Option<String>,
    /// Doors open
    pub starts_at: DateTime<Utc>,
    /// Event over; always after `starts_at`
    pub ends_at: DateTime<Utc>,
    /// Hard cap across all ticket types
    pub capacity: u32,
    /// Ticket tiers
    pub ticket_types: Vec<TicketType>,
    /// Lifecycle status
    pub status: EventStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Which instant closes sales (or the public listing) for an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesCutoff {
    /// Close when the event starts
    EventStart,
    /// Stay open until the event ends
    EventEnd,
}

impl SalesCutoff {
    /// The instant after which the event is closed under this cut-off.
    #[must_use]
    pub const fn deadline(self, event: &Event) -> DateTime<Utc> {
        match self {
            Self::EventStart => event.starts_at,
            Self::EventEnd => event.ends_at,
        }
    }
}

/// Why a reservation check rejected a purchase.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// No tickets left for this type, or the event is at capacity
    #[error("sold out")]
    SoldOut,
    /// The event has no ticket type with this name
    #[error("ticket type not found: {0}")]
    TicketTypeNotFound(String),
    /// The event is not LIVE
    #[error("event is not live")]
    EventNotLive,
    /// The event has ended, or its sales cut-off has passed
    #[error("event has expired")]
    EventExpired,
}

impl Event {
    /// Sum of `sold` across all ticket types.
    #[must_use]
    pub fn total_sold(&self) -> u64 {
        self.ticket_types.iter().map(|t| u64::from(t.sold)).sum()
    }

    /// Look up a ticket type by name.
    #[must_use]
    pub fn ticket_type(&self, name: &str) -> Option<&TicketType> {
        self.ticket_types.iter().find(|t| t.name == name)
    }

    /// At capacity, or every ticket type exhausted.
    #[must_use]
    pub fn is_sold_out(&self) -> bool {
        self.total_sold() >= u64::from(self.capacity)
            || self.ticket_types.iter().all(|t| t.sold >= t.quantity)
    }

    /// The schedule window has closed.
    #[must_use]
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.ends_at
    }

    /// LIVE and past its end: the condition `autoExpire` acts on.
    #[must_use]
    pub fn needs_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::Live && self.has_ended(now)
    }

    /// Apply auto-expiry to this in-memory copy. Returns `true` if it changed.
    pub fn auto_expire(&mut self, now: DateTime<Utc>) -> bool {
        if self.needs_expiry(now) {
            self.status = EventStatus::Ended;
            true
        } else {
            false
        }
    }

    /// Whether buyers can currently purchase anything.
    #[must_use]
    pub fn is_selling(&self, now: DateTime<Utc>, cutoff: SalesCutoff) -> bool {
        self.status == EventStatus::Live
            && !self.has_ended(now)
            && now < cutoff.deadline(self)
            && !self.is_sold_out()
    }

    /// Reservation check for one ticket of `name`.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::EventExpired`] once the event (or the cut-off) has passed
    /// - [`InventoryError::EventNotLive`] for DRAFT or manually ended events
    /// - [`InventoryError::TicketTypeNotFound`] for an unknown tier
    /// - [`InventoryError::SoldOut`] when the tier or the event capacity is exhausted
    pub fn check_purchase(
        &self,
        name: &str,
        now: DateTime<Utc>,
        cutoff: SalesCutoff,
    ) -> Result<&TicketType, InventoryError> {
        if self.has_ended(now) {
            return Err(InventoryError::EventExpired);
        }
        if self.status != EventStatus::Live {
            return Err(InventoryError::EventNotLive);
        }
        if now >= cutoff.deadline(self) {
            return Err(InventoryError::EventExpired);
        }
        let ticket_type = self
            .ticket_type(name)
            .ok_or_else(|| InventoryError::TicketTypeNotFound(name.to_string()))?;
        if ticket_type.sold >= ticket_type.quantity
            || self.total_sold() >= u64::from(self.capacity)
        {
            return Err(InventoryError::SoldOut);
        }
        Ok(ticket_type)
    }
}

// ============================================================================
// Creation
// ============================================================================

/// Ticket tier as submitted by an organizer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewTicketType {
    /// Name
    pub name: String,
    /// Price in minor units
    pub price: Money,
    /// Quantity on sale
    pub quantity: u32,
}

/// Event as submitted by an organizer, before validation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewEvent {
    /// Title
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Venue
    #[serde(default)]
    pub location: String,
    /// Banner image URL
    #[serde(default)]
    pub banner_url: Option<String>,
    /// Start
    pub starts_at: DateTime<Utc>,
    /// End
    pub ends_at: DateTime<Utc>,
    /// Capacity across all tiers
    pub capacity: u32,
    /// Ticket tiers
    pub ticket_types: Vec<NewTicketType>,
}

/// Rejected event submission.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EventValidationError {
    /// Title missing
    #[error("title is required")]
    EmptyTitle,
    /// `ends_at` is not after `starts_at`
    #[error("event must end after it starts")]
    InvalidSchedule,
    /// No ticket tiers
    #[error("at least one ticket type is required")]
    NoTicketTypes,
    /// Tier with a blank name
    #[error("ticket type name is required")]
    EmptyTicketTypeName,
    /// Two tiers share a name
    #[error("duplicate ticket type: {0}")]
    DuplicateTicketType(String),
}

impl NewEvent {
    /// Validate and build a DRAFT event with every `sold` counter at zero.
    ///
    /// # Errors
    ///
    /// Returns [`EventValidationError`] describing the first problem found.
    pub fn into_event(
        self,
        organizer_id: OrganizerId,
        now: DateTime<Utc>,
    ) -> Result<Event, EventValidationError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(EventValidationError::EmptyTitle);
        }
        if self.ends_at <= self.starts_at {
            return Err(EventValidationError::InvalidSchedule);
        }
        if self.ticket_types.is_empty() {
            return Err(EventValidationError::NoTicketTypes);
        }

        let mut seen = HashSet::new();
        let mut ticket_types = Vec::with_capacity(self.ticket_types.len());
        for tier in self.ticket_types {
            let name = tier.name.trim().to_string();
            if name.is_empty() {
                return Err(EventValidationError::EmptyTicketTypeName);
            }
            if !seen.insert(name.clone()) {
                return Err(EventValidationError::DuplicateTicketType(name));
            }
            ticket_types.push(TicketType {
                name,
                price: tier.price,
                quantity: tier.quantity,
                sold: 0,
            });
        }

        Ok(Event {
            id: EventId::new(),
            organizer_id,
            title,
            description: self.description,
            location: self.location,
            banner_url: self.banner_url,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            capacity: self.capacity,
            ticket_types,
            status: EventStatus::Draft,
            created_at: now,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn live_event() -> Event {
        Event {
            id: EventId::new(),
            organizer_id: OrganizerId::new(),
            title: "Launch".to_string(),
            description: String::new(),
            location: "Lagos".to_string(),
            banner_url: None,
            starts_at: now() + Duration::days(1),
            ends_at: now() + Duration::days(1) + Duration::hours(4),
            capacity: 3,
            ticket_types: vec![
                TicketType { name: "Regular".to_string(), price: Money::from_minor(5000), quantity: 2, sold: 0 },
                TicketType { name: "VIP".to_string(), price: Money::from_minor(20000), quantity: 2, sold: 0 },
            ],
            status: EventStatus::Live,
            created_at: now(),
        }
    }

    #[test]
    fn test_check_purchase_happy_path() {
        let event = live_event();
        let tier = event.check_purchase("VIP", now(), SalesCutoff::EventEnd).unwrap();
        assert_eq!(tier.price, Money::from_minor(20000));
    }

    #[test]
    fn test_check_purchase_respects_type_quantity_and_capacity() {
        let mut event = live_event();
        event.ticket_types[0].sold = 2;
        assert_eq!(
            event.check_purchase("Regular", now(), SalesCutoff::EventEnd),
            Err(InventoryError::SoldOut)
        );

        event.ticket_types[1].sold = 1;
        // 3 sold == capacity 3, VIP still has quantity left
        assert_eq!(
            event.check_purchase("VIP", now(), SalesCutoff::EventEnd),
            Err(InventoryError::SoldOut)
        );
        assert!(event.is_sold_out());
    }

    #[test]
    fn test_check_purchase_status_and_time() {
        let mut event = live_event();
        assert_eq!(
            event.check_purchase("Gold", now(), SalesCutoff::EventEnd),
            Err(InventoryError::TicketTypeNotFound("Gold".to_string()))
        );

        let during = event.starts_at + Duration::hours(1);
        assert!(event.check_purchase("VIP", during, SalesCutoff::EventEnd).is_ok());
        assert_eq!(
            event.check_purchase("VIP", during, SalesCutoff::EventStart),
            Err(InventoryError::EventExpired)
        );
        assert_eq!(
            event.check_purchase("VIP", event.ends_at, SalesCutoff::EventEnd),
            Err(InventoryError::EventExpired)
        );

        event.status = EventStatus::Draft;
        assert_eq!(
            event.check_purchase("VIP", now(), SalesCutoff::EventEnd),
            Err(InventoryError::EventNotLive)
        );
    }

    #[test]
    fn test_auto_expire_only_touches_live_events() {
        let mut event = live_event();
        assert!(!event.auto_expire(now()));
        assert!(event.auto_expire(event.ends_at));
        assert_eq!(event.status, EventStatus::Ended);

        let mut draft = live_event();
        draft.status = EventStatus::Draft;
        assert!(!draft.auto_expire(draft.ends_at + Duration::days(1)));
        assert_eq!(draft.status, EventStatus::Draft);
    }

    #[test]
    fn test_new_event_validation() {
        let draft = NewEvent {
            title: "  Launch ".to_string(),
            description: String::new(),
            location: String::new(),
            banner_url: None,
            starts_at: now(),
            ends_at: now() + Duration::hours(2),
            capacity: 10,
            ticket_types: vec![NewTicketType {
                name: "Regular".to_string(),
                price: Money::ZERO,
                quantity: 10,
            }],
        };
        let event = draft.clone().into_event(OrganizerId::new(), now()).unwrap();
        assert_eq!(event.title, "Launch");
        assert_eq!(event.status, EventStatus::Draft);
        assert!(event.ticket_types.iter().all(|t| t.sold == 0));

        let mut bad = draft.clone();
        bad.ends_at = bad.starts_at;
        assert_eq!(
            bad.into_event(OrganizerId::new(), now()),
            Err(EventValidationError::InvalidSchedule)
        );

        let mut dup = draft;
        dup.ticket_types.push(dup.ticket_types[0].clone());
        assert_eq!(
            dup.into_event(OrganizerId::new(), now()),
            Err(EventValidationError::DuplicateTicketType("Regular".to_string()))
        );
    }
}
