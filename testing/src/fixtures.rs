//! Builders for domain fixtures.

use chrono::{DateTime, Duration, Utc};
use gatepass_core::event::{Event, TicketType};
use gatepass_core::fees::FeePolicy;
use gatepass_core::payment::{NewPayment, PaymentProvider};
use gatepass_core::state::EventStatus;
use gatepass_core::ticket::Ticket;
use gatepass_core::types::{EventId, Money, OrganizerId, PaymentReference, QrToken, TicketId};

/// Fluent builder for [`Event`].
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    /// A LIVE event starting one day after `now` and lasting four hours,
    /// with capacity 100 and no ticket types.
    #[must_use]
    pub fn live(now: DateTime<Utc>) -> Self {
        let starts_at = now + Duration::days(1);
        Self {
            event: Event {
                id: EventId::new(),
                organizer_id: OrganizerId::new(),
                title: "Fixture Night".to_string(),
                description: "A fixture event".to_string(),
                location: "Main Hall".to_string(),
                banner_url: None,
                starts_at,
                ends_at: starts_at + Duration::hours(4),
                capacity: 100,
                ticket_types: Vec::new(),
                status: EventStatus::Live,
                created_at: now,
            },
        }
    }

    /// Same as [`EventBuilder::live`] but in DRAFT.
    #[must_use]
    pub fn draft(now: DateTime<Utc>) -> Self {
        Self::live(now).status(EventStatus::Draft)
    }

    /// Owner.
    #[must_use]
    pub fn organizer(mut self, organizer: OrganizerId) -> Self {
        self.event.organizer_id = organizer;
        self
    }

    /// Title.
    #[must_use]
    pub fn title(mut self, title: &str) -> Self {
        self.event.title = title.to_string();
        self
    }

    /// Capacity across all types.
    #[must_use]
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.event.capacity = capacity;
        self
    }

    /// Status.
    #[must_use]
    pub fn status(mut self, status: EventStatus) -> Self {
        self.event.status = status;
        self
    }

    /// Schedule window.
    #[must_use]
    pub fn window(mut self, starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Self {
        self.event.starts_at = starts_at;
        self.event.ends_at = ends_at;
        self
    }

    /// Add a ticket type with nothing sold.
    #[must_use]
    pub fn ticket_type(self, name: &str, price: u64, quantity: u32) -> Self {
        self.sold_ticket_type(name, price, quantity, 0)
    }

    /// Add a ticket type with `sold` already sold.
    #[must_use]
    pub fn sold_ticket_type(mut self, name: &str, price: u64, quantity: u32, sold: u32) -> Self {
        self.event.ticket_types.push(TicketType {
            name: name.to_string(),
            price: Money::from_minor(price),
            quantity,
            sold,
        });
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> Event {
        self.event
    }
}

/// A gateway payment request for one ticket of `ticket_type`, priced by `fees`.
#[must_use]
pub fn new_payment(event: &Event, ticket_type: &str, fees: &FeePolicy) -> NewPayment {
    let price = event
        .ticket_type(ticket_type)
        .map_or(Money::ZERO, |t| t.price);
    let breakdown = fees.breakdown(price);
    NewPayment {
        reference: PaymentReference::generate(),
        event_id: event.id,
        organizer_id: event.organizer_id,
        ticket_type: ticket_type.to_string(),
        buyer_email: "buyer@example.com".to_string(),
        buyer_name: "Ada Buyer".to_string(),
        amount: breakdown.amount,
        platform_fee: breakdown.platform_fee,
        organizer_amount: breakdown.organizer_amount,
        provider: PaymentProvider::Gateway,
    }
}

/// An unscanned ticket for `event`.
#[must_use]
pub fn ticket(event: &Event, ticket_type: &str, now: DateTime<Utc>) -> Ticket {
    let token = QrToken::generate();
    Ticket {
        id: TicketId::new(),
        event_id: event.id,
        organizer_id: event.organizer_id,
        buyer_email: "attendee@example.com".to_string(),
        ticket_type: ticket_type.to_string(),
        qr_image: format!("data:text/plain,{token}"),
        qr_token: token,
        amount_paid: Money::ZERO,
        payment_ref: PaymentReference::generate(),
        scanned_at: None,
        created_at: now,
    }
}
