//! Storage traits.
//!
//! Repositories cover reads and single-statement conditional updates.
//! [`StoreTx`] is the unit of work used by the reconciliation engine, free
//! ticket issuance and withdrawal approval: every mutation on it happens in
//! one transaction that either commits as a whole or not at all (dropping a
//! transaction without committing rolls it back).
//!
//! The contended counters are only ever changed through conditional
//! operations:
//!
//! | State                | Operation                                  |
//! |----------------------|--------------------------------------------|
//! | `Payment.status`     | [`StoreTx::finalize_payment`], [`PaymentRepository::finalize_payment`] (CAS from PENDING) |
//! | `TicketType.sold`    | [`StoreTx::commit_sale`] (increment-if-below-limit) |
//! | `Wallet.balance`     | [`StoreTx::credit_wallet`] (atomic increment), [`StoreTx::debit_wallet`] (decrement-if-sufficient) |
//! | `Ticket.scanned_at`  | [`TicketRepository::mark_scanned`] (set-if-null) |

use crate::error::StoreError;
use crate::event::{Event, InventoryError};
use crate::payment::{NewPayment, Payment, ReconciliationAnomaly};
use crate::state::{EventStatus, PaymentStatus, WithdrawalStatus};
use crate::ticket::{EventSales, ScanOutcome, Ticket};
use crate::types::{EventId, Money, OrganizerId, PaymentReference, QrToken, WithdrawalId};
use crate::wallet::{Wallet, WalletEntry, Withdrawal};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

// ============================================================================
// Outcomes of conditional updates
// ============================================================================

/// Result of a payment compare-and-swap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// This call moved the payment out of PENDING
    Applied(Payment),
    /// The payment was already terminal; nothing changed
    AlreadyFinalized(PaymentStatus),
}

/// Result of an inventory increment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaleOutcome {
    /// `sold` was incremented. `sold_out` is set when this sale exhausted
    /// the event, which has been moved to ENDED in the same statement.
    Committed {
        /// Event flipped to ENDED by this sale
        sold_out: bool,
    },
    /// The increment guard did not match; counters untouched
    Rejected(InventoryError),
}

/// Result of a conditional wallet debit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DebitOutcome {
    /// Balance decremented
    Debited(Wallet),
    /// `balance < amount`; wallet untouched
    InsufficientBalance {
        /// Balance at the time of the attempt
        available: Money,
    },
}

// ============================================================================
// Repositories
// ============================================================================

/// Events and their ticket types.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Insert a new event with its ticket types.
    async fn insert_event(&self, event: &Event) -> Result<(), StoreError>;

    /// Load one event.
    async fn find_event(&self, id: EventId) -> Result<Option<Event>, StoreError>;

    /// All events owned by an organizer, newest first.
    async fn events_by_organizer(&self, organizer: OrganizerId) -> Result<Vec<Event>, StoreError>;

    /// All LIVE events, soonest first.
    async fn live_events(&self) -> Result<Vec<Event>, StoreError>;

    /// Compare-and-swap the event status. Returns `false` if the current
    /// status is not `from`.
    ///
    /// # Errors
    ///
    /// [`StoreError::IllegalTransition`] if `from -> to` is not in the table.
    async fn transition_event(
        &self,
        id: EventId,
        from: EventStatus,
        to: EventStatus,
    ) -> Result<bool, StoreError>;

    /// Move every LIVE event whose end is at or before `now` to ENDED.
    /// Returns the number of events expired.
    async fn expire_events(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Delete an event, only if it is ENDED. Returns `false` otherwise.
    async fn delete_ended_event(&self, id: EventId) -> Result<bool, StoreError>;
}

/// Payment records.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Create a PENDING payment.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateReference`] if the reference exists.
    async fn create_pending(
        &self,
        payment: NewPayment,
        now: DateTime<Utc>,
    ) -> Result<Payment, StoreError>;

    /// Load a payment by reference.
    async fn find_payment(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<Payment>, StoreError>;

    /// Compare-and-swap PENDING -> `to` outside a transaction (used for FAILED).
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] for an unknown reference,
    /// [`StoreError::IllegalTransition`] if `to` is PENDING.
    async fn finalize_payment(
        &self,
        reference: &PaymentReference,
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, StoreError>;

    /// PENDING gateway payments created before `before`. Payments never
    /// swept come first, then the least recently swept, then the oldest.
    async fn stale_pending(
        &self,
        before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Payment>, StoreError>;

    /// Record that a sweep looked at this payment at `now`, moving it to the
    /// back of the [`PaymentRepository::stale_pending`] order. No-op once the
    /// payment is final.
    async fn mark_swept(
        &self,
        reference: &PaymentReference,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Issued tickets.
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// The ticket issued for a payment, if any.
    async fn ticket_by_payment_ref(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<Ticket>, StoreError>;

    /// The ticket with this token for this event, if any.
    async fn ticket_by_token(
        &self,
        token: &QrToken,
        event_id: EventId,
    ) -> Result<Option<Ticket>, StoreError>;

    /// `SET scanned_at = now WHERE qr_token = token AND event_id = event AND scanned_at IS NULL`.
    async fn mark_scanned(
        &self,
        token: &QrToken,
        event_id: EventId,
        now: DateTime<Utc>,
    ) -> Result<ScanOutcome, StoreError>;

    /// Per-event ticket counts and revenue for an organizer.
    async fn sales_by_organizer(
        &self,
        organizer: OrganizerId,
    ) -> Result<Vec<EventSales>, StoreError>;
}

/// Wallet reads. Mutations go through [`StoreTx`].
#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// The organizer's wallet, if ever credited.
    async fn find_wallet(&self, organizer: OrganizerId) -> Result<Option<Wallet>, StoreError>;

    /// Most recent ledger entries, newest first.
    async fn wallet_entries(
        &self,
        organizer: OrganizerId,
        limit: u32,
    ) -> Result<Vec<WalletEntry>, StoreError>;
}

/// Withdrawal requests. Status changes go through [`StoreTx`].
#[async_trait]
pub trait WithdrawalRepository: Send + Sync {
    /// Insert a PENDING withdrawal.
    async fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<(), StoreError>;

    /// Load one withdrawal.
    async fn find_withdrawal(&self, id: WithdrawalId) -> Result<Option<Withdrawal>, StoreError>;

    /// An organizer's withdrawals, newest first.
    async fn withdrawals_by_organizer(
        &self,
        organizer: OrganizerId,
    ) -> Result<Vec<Withdrawal>, StoreError>;

    /// All withdrawals, optionally filtered by status, newest first.
    async fn list_withdrawals(
        &self,
        status: Option<WithdrawalStatus>,
    ) -> Result<Vec<Withdrawal>, StoreError>;
}

/// Reconciliation anomaly log.
#[async_trait]
pub trait AnomalyRepository: Send + Sync {
    /// Most recent anomalies, newest first.
    async fn anomalies(&self, limit: u32) -> Result<Vec<ReconciliationAnomaly>, StoreError>;
}

// ============================================================================
// Store and unit of work
// ============================================================================

/// A transactional store.
#[async_trait]
pub trait Store:
    EventRepository
    + PaymentRepository
    + TicketRepository
    + WalletRepository
    + WithdrawalRepository
    + AnomalyRepository
{
    /// Open a transaction. Never hold one across a gateway call.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;

    /// Connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// One open transaction.
#[async_trait]
pub trait StoreTx: Send {
    /// Insert a payment in whatever status it carries.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateReference`] if the reference exists.
    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError>;

    /// Compare-and-swap PENDING -> `to`.
    async fn finalize_payment(
        &mut self,
        reference: &PaymentReference,
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, StoreError>;

    /// The ticket already issued for a payment, if any.
    async fn ticket_for_payment(
        &mut self,
        reference: &PaymentReference,
    ) -> Result<Option<Ticket>, StoreError>;

    /// Whether any ticket already carries this QR token.
    async fn qr_token_exists(&mut self, token: &QrToken) -> Result<bool, StoreError>;

    /// Increment `sold` for one ticket type if both the type's quantity and
    /// the event capacity allow it; flip the event to ENDED when exhausted.
    async fn commit_sale(
        &mut self,
        event_id: EventId,
        ticket_type: &str,
    ) -> Result<SaleOutcome, StoreError>;

    /// Insert an issued ticket.
    ///
    /// # Errors
    ///
    /// [`StoreError::UniqueViolation`] on a duplicate token or payment ref.
    async fn insert_ticket(&mut self, ticket: &Ticket) -> Result<(), StoreError>;

    /// Upsert the wallet and add `amount` to balance and earnings, with a
    /// CREDIT ledger entry.
    async fn credit_wallet(
        &mut self,
        organizer: OrganizerId,
        amount: Money,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Wallet, StoreError>;

    /// Subtract `amount` from balance (adding to withdrawn) only if the
    /// balance covers it, with a DEBIT ledger entry.
    async fn debit_wallet(
        &mut self,
        organizer: OrganizerId,
        amount: Money,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<DebitOutcome, StoreError>;

    /// Compare-and-swap a withdrawal's status, stamping the admin.
    /// Returns `None` when the current status is not `from`.
    async fn transition_withdrawal(
        &mut self,
        id: WithdrawalId,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
        admin: OrganizerId,
        now: DateTime<Utc>,
    ) -> Result<Option<Withdrawal>, StoreError>;

    /// Persist a reconciliation anomaly.
    async fn record_anomaly(&mut self, anomaly: &ReconciliationAnomaly) -> Result<(), StoreError>;

    /// Commit everything written through this transaction.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
