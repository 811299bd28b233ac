//! Issued tickets.

use crate::state::ScanState;
use crate::types::{EventId, Money, OrganizerId, PaymentReference, QrToken, TicketId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A ticket, issued exactly once per successful payment.
///
/// Immutable except for `scanned_at`, which goes from `None` to `Some` once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket ID
    pub id: TicketId,
    /// Event
    pub event_id: EventId,
    /// Organizer
    pub organizer_id: OrganizerId,
    /// Attendee email
    pub buyer_email: String,
    /// Ticket type name
    pub ticket_type: String,
    /// Unique QR token
    pub qr_token: QrToken,
    /// Rendered QR image (data URI)
    pub qr_image: String,
    /// Organizer amount of the originating payment
    pub amount_paid: Money,
    /// Originating payment; at most one ticket per reference
    pub payment_ref: PaymentReference,
    /// When the ticket was admitted
    pub scanned_at: Option<DateTime<Utc>>,
    /// Issue time
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Door-scan state derived from `scanned_at`.
    #[must_use]
    pub const fn scan_state(&self) -> ScanState {
        if self.scanned_at.is_some() {
            ScanState::Scanned
        } else {
            ScanState::Unscanned
        }
    }

    /// Convenience for `scan_state() == Scanned`.
    #[must_use]
    pub const fn is_scanned(&self) -> bool {
        self.scanned_at.is_some()
    }
}

/// Result of the atomic conditional scan update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    /// This call flipped the ticket to SCANNED
    Admitted(Ticket),
    /// The conditional update matched nothing
    NoMatch,
}

/// Per-event totals for an organizer's sales summary.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSales {
    /// Event
    pub event_id: EventId,
    /// Event title
    pub title: String,
    /// Tickets issued
    pub tickets: u64,
    /// Tickets admitted
    pub scanned: u64,
    /// Sum of `amount_paid`
    pub revenue: Money,
}
