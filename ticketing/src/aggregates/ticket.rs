//! Ticket issuance, door scanning and ticket reads.

use crate::aggregates::inventory::InventoryLedger;
use crate::metrics;
use chrono::{DateTime, Utc};
use gatepass_core::environment::Clock;
use gatepass_core::error::StoreError;
use gatepass_core::event::Event;
use gatepass_core::payment::Payment;
use gatepass_core::qr::{QrError, QrRenderer};
use gatepass_core::state::{EventStatus, PaymentStatus};
use gatepass_core::store::{Store, StoreTx};
use gatepass_core::ticket::{EventSales, ScanOutcome, Ticket};
use gatepass_core::types::{EventId, Money, OrganizerId, PaymentReference, QrToken, TicketId};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Fresh tokens tried before giving up on a collision streak.
const MAX_TOKEN_ATTEMPTS: usize = 3;

// ============================================================================
// Issuance
// ============================================================================

/// Ticket issuance failed; the enclosing transaction must be dropped.
#[derive(Debug, Clone, Error)]
pub enum IssueError {
    /// Storage failure or a unique key collision
    #[error(transparent)]
    Store(#[from] StoreError),
    /// QR image could not be rendered
    #[error(transparent)]
    Qr(#[from] QrError),
}

/// Mints tickets inside a caller-owned transaction.
#[derive(Clone)]
pub struct TicketMinter {
    qr: Arc<dyn QrRenderer>,
}

impl TicketMinter {
    /// Create a minter rendering QR images with `qr`.
    #[must_use]
    pub fn new(qr: Arc<dyn QrRenderer>) -> Self {
        Self { qr }
    }

    /// Issue the ticket for a settled payment.
    ///
    /// # Errors
    ///
    /// [`IssueError`] if rendering or the insert fails. The caller drops
    /// `tx` so the payment never settles without its ticket.
    pub async fn issue(
        &self,
        tx: &mut dyn StoreTx,
        payment: &Payment,
        now: DateTime<Utc>,
    ) -> Result<Ticket, IssueError> {
        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let token = QrToken::generate();
            if tx.qr_token_exists(&token).await? {
                tracing::warn!(reference = %payment.reference, "QR token collision, regenerating");
                continue;
            }

            let ticket = Ticket {
                id: TicketId::new(),
                event_id: payment.event_id,
                organizer_id: payment.organizer_id,
                buyer_email: payment.buyer_email.clone(),
                ticket_type: payment.ticket_type.clone(),
                qr_image: self.qr.render(&token)?,
                qr_token: token,
                amount_paid: payment.organizer_amount,
                payment_ref: payment.reference.clone(),
                scanned_at: None,
                created_at: now,
            };
            tx.insert_ticket(&ticket).await?;
            tracing::info!(
                reference = %payment.reference,
                ticket_id = %ticket.id,
                event_id = %ticket.event_id,
                "Ticket issued"
            );
            return Ok(ticket);
        }
        Err(StoreError::UniqueViolation("tickets_qr_token_key".to_string()).into())
    }
}

// ============================================================================
// Scanning
// ============================================================================

/// Why a scan did not admit the holder.
#[derive(Debug, Clone, Error)]
pub enum ScanError {
    /// No ticket with this token for this event
    #[error("ticket not found for this event")]
    NotFound,
    /// Caller does not own the event
    #[error("not authorized to scan tickets for this event")]
    NotAuthorized,
    /// Event is not LIVE
    #[error("event is not live")]
    EventNotLive,
    /// Ticket was admitted earlier
    #[error("ticket already used")]
    AlreadyUsed {
        /// When it was admitted
        scanned_at: Option<DateTime<Utc>>,
    },
    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ScanError {
    const fn label(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::NotAuthorized => "not_authorized",
            Self::EventNotLive => "not_live",
            Self::AlreadyUsed { .. } => "already_used",
            Self::Store(_) => "error",
        }
    }
}

/// A successful admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Admission {
    /// Attendee
    pub attendee_email: String,
    /// Tier
    pub ticket_type: String,
    /// Admission time
    pub scanned_at: DateTime<Utc>,
}

/// Door scanning. Exactly one of any number of concurrent scans of a ticket
/// succeeds.
pub struct ScanEngine {
    store: Arc<dyn Store>,
    ledger: Arc<InventoryLedger>,
    clock: Arc<dyn Clock>,
}

impl ScanEngine {
    /// Create a scan engine.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, ledger: Arc<InventoryLedger>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            ledger,
            clock,
        }
    }

    /// Admit the holder of `token` to `event_id`.
    ///
    /// # Errors
    ///
    /// [`ScanError`]; `NotFound` and `AlreadyUsed` are told apart by a read
    /// after the conditional update misses.
    pub async fn scan(
        &self,
        token: &QrToken,
        event_id: EventId,
        organizer: OrganizerId,
    ) -> Result<Admission, ScanError> {
        let result = self.try_scan(token, event_id, organizer).await;
        match &result {
            Ok(_) => metrics::record_scan("admitted"),
            Err(e) => {
                metrics::record_scan(e.label());
                tracing::info!(%event_id, %organizer, reason = %e, "Scan refused");
            }
        }
        result
    }

    async fn try_scan(
        &self,
        token: &QrToken,
        event_id: EventId,
        organizer: OrganizerId,
    ) -> Result<Admission, ScanError> {
        let event = self.ledger.load(event_id).await?.ok_or(ScanError::NotFound)?;
        if event.organizer_id != organizer {
            return Err(ScanError::NotAuthorized);
        }
        if event.status != EventStatus::Live {
            return Err(ScanError::EventNotLive);
        }

        let now = self.clock.now();
        match self.store.mark_scanned(token, event_id, now).await? {
            ScanOutcome::Admitted(ticket) => {
                tracing::info!(%event_id, ticket_id = %ticket.id, "Ticket admitted");
                Ok(Admission {
                    attendee_email: ticket.buyer_email,
                    ticket_type: ticket.ticket_type,
                    scanned_at: ticket.scanned_at.unwrap_or(now),
                })
            }
            ScanOutcome::NoMatch => match self.store.ticket_by_token(token, event_id).await? {
                Some(ticket) => Err(ScanError::AlreadyUsed {
                    scanned_at: ticket.scanned_at,
                }),
                None => Err(ScanError::NotFound),
            },
        }
    }
}

// ============================================================================
// Reads
// ============================================================================

/// Event details shown next to a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    /// Event
    pub id: EventId,
    /// Title
    pub title: String,
    /// Venue
    pub location: String,
    /// Start
    pub starts_at: DateTime<Utc>,
    /// End
    pub ends_at: DateTime<Utc>,
}

impl From<&Event> for EventSummary {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id,
            title: event.title.clone(),
            location: event.location.clone(),
            starts_at: event.starts_at,
            ends_at: event.ends_at,
        }
    }
}

/// What a buyer sees when polling for their ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketLookup {
    /// Payment not settled yet
    Pending,
    /// Payment declined; no ticket will be issued
    Failed,
    /// Ticket issued. The event may have been deleted since.
    Ready {
        /// The ticket
        ticket: Box<Ticket>,
        /// Event details
        event: Option<EventSummary>,
    },
}

/// An organizer's sales totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    /// Tickets issued
    pub total_tickets: u64,
    /// Tickets admitted
    pub scanned: u64,
    /// Tickets not yet admitted
    pub unscanned: u64,
    /// Sum of `amount_paid`
    pub revenue: Money,
    /// Per-event breakdown
    pub events: Vec<EventSales>,
}

impl SalesSummary {
    fn from_events(events: Vec<EventSales>) -> Self {
        let total_tickets = events.iter().map(|e| e.tickets).sum();
        let scanned = events.iter().map(|e| e.scanned).sum();
        let revenue = events
            .iter()
            .fold(Money::ZERO, |acc, e| acc.checked_add(e.revenue).unwrap_or(acc));
        Self {
            total_tickets,
            scanned,
            unscanned: total_tickets.saturating_sub(scanned),
            revenue,
            events,
        }
    }
}

/// Read side for tickets.
pub struct TicketOffice {
    store: Arc<dyn Store>,
}

impl TicketOffice {
    /// Create a ticket office.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Ticket for a payment reference, or where the payment stands.
    /// `None` when neither a ticket nor a payment exists.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`].
    pub async fn by_reference(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<TicketLookup>, StoreError> {
        if let Some(ticket) = self.store.ticket_by_payment_ref(reference).await? {
            let event = self
                .store
                .find_event(ticket.event_id)
                .await?
                .map(|event| EventSummary::from(&event));
            return Ok(Some(TicketLookup::Ready {
                ticket: Box::new(ticket),
                event,
            }));
        }

        Ok(self
            .store
            .find_payment(reference)
            .await?
            .map(|payment| match payment.status {
                PaymentStatus::Failed => TicketLookup::Failed,
                PaymentStatus::Pending | PaymentStatus::Success => TicketLookup::Pending,
            }))
    }

    /// Sales totals for an organizer.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`].
    pub async fn sales_summary(&self, organizer: OrganizerId) -> Result<SalesSummary, StoreError> {
        let events = self.store.sales_by_organizer(organizer).await?;
        Ok(SalesSummary::from_events(events))
    }
}
