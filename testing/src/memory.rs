//! Transactional in-memory store.
//!
//! A single async mutex guards the whole state. A transaction takes the lock
//! for its lifetime and works on a copy; `commit` writes the copy back and
//! dropping the transaction discards it. Conditional updates are written the
//! same way as their SQL counterparts so engine tests exercise the CAS
//! outcomes, not just the happy path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatepass_core::error::StoreError;
use gatepass_core::event::{Event, InventoryError};
use gatepass_core::payment::{NewPayment, Payment, ReconciliationAnomaly};
use gatepass_core::state::{EventStatus, Lifecycle, PaymentStatus, WithdrawalStatus};
use gatepass_core::store::{
    AnomalyRepository, DebitOutcome, EventRepository, PaymentRepository, SaleOutcome, Store,
    StoreTx, TicketRepository, TransitionOutcome, WalletRepository, WithdrawalRepository,
};
use gatepass_core::ticket::{EventSales, ScanOutcome, Ticket};
use gatepass_core::types::{
    EventId, Money, OrganizerId, PaymentReference, QrToken, WalletEntryId, WithdrawalId,
};
use gatepass_core::wallet::{EntryKind, Wallet, WalletEntry, Withdrawal};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Debug, Default)]
struct State {
    events: HashMap<EventId, Event>,
    payments: HashMap<PaymentReference, Payment>,
    /// Last sweep time per PENDING payment
    swept: HashMap<PaymentReference, DateTime<Utc>>,
    tickets: Vec<Ticket>,
    wallets: HashMap<OrganizerId, Wallet>,
    entries: Vec<WalletEntry>,
    withdrawals: BTreeMap<WithdrawalId, Withdrawal>,
    anomalies: Vec<ReconciliationAnomaly>,
}

impl State {
    fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        if self.payments.contains_key(&payment.reference) {
            return Err(StoreError::DuplicateReference(payment.reference.to_string()));
        }
        self.payments.insert(payment.reference.clone(), payment.clone());
        Ok(())
    }

    fn finalize_payment(
        &mut self,
        reference: &PaymentReference,
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, StoreError> {
        PaymentStatus::Pending.transition(to)?;
        let payment = self
            .payments
            .get_mut(reference)
            .ok_or_else(|| StoreError::NotFound {
                entity: "payment",
                id: reference.to_string(),
            })?;
        if payment.status != PaymentStatus::Pending {
            return Ok(TransitionOutcome::AlreadyFinalized(payment.status));
        }
        payment.status = to;
        payment.finalized_at = Some(now);
        Ok(TransitionOutcome::Applied(payment.clone()))
    }

    fn commit_sale(&mut self, event_id: EventId, name: &str) -> Result<SaleOutcome, StoreError> {
        let event = self
            .events
            .get_mut(&event_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "event",
                id: event_id.to_string(),
            })?;
        let total_sold = event.total_sold();
        let capacity = u64::from(event.capacity);
        let Some(tier) = event.ticket_types.iter_mut().find(|t| t.name == name) else {
            return Ok(SaleOutcome::Rejected(InventoryError::TicketTypeNotFound(
                name.to_string(),
            )));
        };
        if tier.sold >= tier.quantity || total_sold >= capacity {
            return Ok(SaleOutcome::Rejected(InventoryError::SoldOut));
        }
        tier.sold += 1;

        let sold_out = event.is_sold_out() && event.status != EventStatus::Ended;
        if sold_out {
            event.status = EventStatus::Ended;
        }
        Ok(SaleOutcome::Committed { sold_out })
    }

    fn credit_wallet(
        &mut self,
        organizer: OrganizerId,
        amount: Money,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Wallet, StoreError> {
        let wallet = self
            .wallets
            .entry(organizer)
            .or_insert_with(|| Wallet::empty(organizer, now));
        let overflow = || StoreError::Backend("wallet overflow".to_string());
        wallet.balance = wallet.balance.checked_add(amount).ok_or_else(overflow)?;
        wallet.total_earnings = wallet.total_earnings.checked_add(amount).ok_or_else(overflow)?;
        wallet.updated_at = now;
        let wallet = wallet.clone();
        self.entries.push(WalletEntry {
            id: WalletEntryId::new(),
            organizer_id: organizer,
            kind: EntryKind::Credit,
            amount,
            reference: reference.to_string(),
            created_at: now,
        });
        Ok(wallet)
    }

    fn debit_wallet(
        &mut self,
        organizer: OrganizerId,
        amount: Money,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<DebitOutcome, StoreError> {
        let Some(wallet) = self.wallets.get_mut(&organizer) else {
            return Ok(DebitOutcome::InsufficientBalance {
                available: Money::ZERO,
            });
        };
        let Some(balance) = wallet.balance.checked_sub(amount) else {
            return Ok(DebitOutcome::InsufficientBalance {
                available: wallet.balance,
            });
        };
        wallet.balance = balance;
        wallet.total_withdrawn = wallet
            .total_withdrawn
            .checked_add(amount)
            .ok_or_else(|| StoreError::Backend("wallet overflow".to_string()))?;
        wallet.updated_at = now;
        let wallet = wallet.clone();
        self.entries.push(WalletEntry {
            id: WalletEntryId::new(),
            organizer_id: organizer,
            kind: EntryKind::Debit,
            amount,
            reference: reference.to_string(),
            created_at: now,
        });
        Ok(DebitOutcome::Debited(wallet))
    }

    fn transition_withdrawal(
        &mut self,
        id: WithdrawalId,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
        admin: OrganizerId,
        now: DateTime<Utc>,
    ) -> Result<Option<Withdrawal>, StoreError> {
        from.transition(to)?;
        let Some(withdrawal) = self.withdrawals.get_mut(&id) else {
            return Ok(None);
        };
        if withdrawal.status != from {
            return Ok(None);
        }
        withdrawal.status = to;
        withdrawal.processed_by = Some(admin);
        withdrawal.processed_at = Some(now);
        Ok(Some(withdrawal.clone()))
    }
}

/// In-memory [`Store`] with the same conditional-update semantics as the
/// Postgres implementation.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
    fail_ticket_insert: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event as-is (any status, any `sold` counts).
    pub async fn seed_event(&self, event: Event) {
        self.state.lock().await.events.insert(event.id, event);
    }

    /// Insert a payment as-is.
    pub async fn seed_payment(&self, payment: Payment) {
        self.state
            .lock()
            .await
            .payments
            .insert(payment.reference.clone(), payment);
    }

    /// Insert a ticket as-is.
    pub async fn seed_ticket(&self, ticket: Ticket) {
        self.state.lock().await.tickets.push(ticket);
    }

    /// Every ticket issued so far.
    pub async fn tickets(&self) -> Vec<Ticket> {
        self.state.lock().await.tickets.clone()
    }

    /// Make the next `insert_ticket` inside a transaction fail.
    pub fn fail_next_ticket_insert(&self) {
        self.fail_ticket_insert.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventRepository for InMemoryStore {
    async fn insert_event(&self, event: &Event) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.events.contains_key(&event.id) {
            return Err(StoreError::UniqueViolation(format!("event {}", event.id)));
        }
        state.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn find_event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.state.lock().await.events.get(&id).cloned())
    }

    async fn events_by_organizer(&self, organizer: OrganizerId) -> Result<Vec<Event>, StoreError> {
        let state = self.state.lock().await;
        let mut events: Vec<Event> = state
            .events
            .values()
            .filter(|e| e.organizer_id == organizer)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }

    async fn live_events(&self) -> Result<Vec<Event>, StoreError> {
        let state = self.state.lock().await;
        let mut events: Vec<Event> = state
            .events
            .values()
            .filter(|e| e.status == EventStatus::Live)
            .cloned()
            .collect();
        events.sort_by(|a, b| a.starts_at.cmp(&b.starts_at));
        Ok(events)
    }

    async fn transition_event(
        &self,
        id: EventId,
        from: EventStatus,
        to: EventStatus,
    ) -> Result<bool, StoreError> {
        from.transition(to)?;
        let mut state = self.state.lock().await;
        match state.events.get_mut(&id) {
            Some(event) if event.status == from => {
                event.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire_events(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let mut expired = 0;
        for event in state.events.values_mut() {
            if event.auto_expire(now) {
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn delete_ended_event(&self, id: EventId) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.events.get(&id) {
            Some(event) if event.status == EventStatus::Ended => {
                state.events.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn create_pending(
        &self,
        payment: NewPayment,
        now: DateTime<Utc>,
    ) -> Result<Payment, StoreError> {
        let payment = payment.into_payment(PaymentStatus::Pending, now);
        self.state.lock().await.insert_payment(&payment)?;
        Ok(payment)
    }

    async fn find_payment(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<Payment>, StoreError> {
        Ok(self.state.lock().await.payments.get(reference).cloned())
    }

    async fn finalize_payment(
        &self,
        reference: &PaymentReference,
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, StoreError> {
        self.state.lock().await.finalize_payment(reference, to, now)
    }

    async fn stale_pending(
        &self,
        before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Payment>, StoreError> {
        let state = self.state.lock().await;
        let mut stale: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Pending && p.created_at < before)
            .cloned()
            .collect();
        // `None` sorts before `Some`, so never-swept payments lead
        stale.sort_by_key(|p| (state.swept.get(&p.reference).copied(), p.created_at));
        stale.truncate(limit as usize);
        Ok(stale)
    }

    async fn mark_swept(
        &self,
        reference: &PaymentReference,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let pending = state
            .payments
            .get(reference)
            .is_some_and(|p| p.status == PaymentStatus::Pending);
        if pending {
            state.swept.insert(reference.clone(), now);
        }
        Ok(())
    }
}

#[async_trait]
impl TicketRepository for InMemoryStore {
    async fn ticket_by_payment_ref(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<Ticket>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .tickets
            .iter()
            .find(|t| &t.payment_ref == reference)
            .cloned())
    }

    async fn ticket_by_token(
        &self,
        token: &QrToken,
        event_id: EventId,
    ) -> Result<Option<Ticket>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .tickets
            .iter()
            .find(|t| &t.qr_token == token && t.event_id == event_id)
            .cloned())
    }

    async fn mark_scanned(
        &self,
        token: &QrToken,
        event_id: EventId,
        now: DateTime<Utc>,
    ) -> Result<ScanOutcome, StoreError> {
        let mut state = self.state.lock().await;
        let matched = state.tickets.iter_mut().find(|t| {
            &t.qr_token == token && t.event_id == event_id && t.scanned_at.is_none()
        });
        Ok(match matched {
            Some(ticket) => {
                ticket.scanned_at = Some(now);
                ScanOutcome::Admitted(ticket.clone())
            }
            None => ScanOutcome::NoMatch,
        })
    }

    async fn sales_by_organizer(
        &self,
        organizer: OrganizerId,
    ) -> Result<Vec<EventSales>, StoreError> {
        let state = self.state.lock().await;
        let mut by_event: BTreeMap<EventId, EventSales> = BTreeMap::new();
        for ticket in state.tickets.iter().filter(|t| t.organizer_id == organizer) {
            let entry = by_event.entry(ticket.event_id).or_insert_with(|| EventSales {
                event_id: ticket.event_id,
                title: state
                    .events
                    .get(&ticket.event_id)
                    .map(|e| e.title.clone())
                    .unwrap_or_default(),
                ..EventSales::default()
            });
            entry.tickets += 1;
            if ticket.is_scanned() {
                entry.scanned += 1;
            }
            entry.revenue = entry
                .revenue
                .checked_add(ticket.amount_paid)
                .unwrap_or(entry.revenue);
        }
        Ok(by_event.into_values().collect())
    }
}

#[async_trait]
impl WalletRepository for InMemoryStore {
    async fn find_wallet(&self, organizer: OrganizerId) -> Result<Option<Wallet>, StoreError> {
        Ok(self.state.lock().await.wallets.get(&organizer).cloned())
    }

    async fn wallet_entries(
        &self,
        organizer: OrganizerId,
        limit: u32,
    ) -> Result<Vec<WalletEntry>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .rev()
            .filter(|e| e.organizer_id == organizer)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl WithdrawalRepository for InMemoryStore {
    async fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .withdrawals
            .insert(withdrawal.id, withdrawal.clone());
        Ok(())
    }

    async fn find_withdrawal(&self, id: WithdrawalId) -> Result<Option<Withdrawal>, StoreError> {
        Ok(self.state.lock().await.withdrawals.get(&id).cloned())
    }

    async fn withdrawals_by_organizer(
        &self,
        organizer: OrganizerId,
    ) -> Result<Vec<Withdrawal>, StoreError> {
        let state = self.state.lock().await;
        let mut found: Vec<Withdrawal> = state
            .withdrawals
            .values()
            .filter(|w| w.organizer_id == organizer)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn list_withdrawals(
        &self,
        status: Option<WithdrawalStatus>,
    ) -> Result<Vec<Withdrawal>, StoreError> {
        let state = self.state.lock().await;
        let mut found: Vec<Withdrawal> = state
            .withdrawals
            .values()
            .filter(|w| status.is_none_or(|s| w.status == s))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

#[async_trait]
impl AnomalyRepository for InMemoryStore {
    async fn anomalies(&self, limit: u32) -> Result<Vec<ReconciliationAnomaly>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .anomalies
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTx {
            guard,
            working,
            fail_ticket_insert: Arc::clone(&self.fail_ticket_insert),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

struct InMemoryTx {
    guard: OwnedMutexGuard<State>,
    working: State,
    fail_ticket_insert: Arc<AtomicBool>,
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        self.working.insert_payment(payment)
    }

    async fn finalize_payment(
        &mut self,
        reference: &PaymentReference,
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, StoreError> {
        self.working.finalize_payment(reference, to, now)
    }

    async fn ticket_for_payment(
        &mut self,
        reference: &PaymentReference,
    ) -> Result<Option<Ticket>, StoreError> {
        Ok(self
            .working
            .tickets
            .iter()
            .find(|t| &t.payment_ref == reference)
            .cloned())
    }

    async fn qr_token_exists(&mut self, token: &QrToken) -> Result<bool, StoreError> {
        Ok(self.working.tickets.iter().any(|t| &t.qr_token == token))
    }

    async fn commit_sale(
        &mut self,
        event_id: EventId,
        ticket_type: &str,
    ) -> Result<SaleOutcome, StoreError> {
        self.working.commit_sale(event_id, ticket_type)
    }

    async fn insert_ticket(&mut self, ticket: &Ticket) -> Result<(), StoreError> {
        if self.fail_ticket_insert.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected ticket insert failure".to_string()));
        }
        let tickets = &self.working.tickets;
        if tickets.iter().any(|t| t.qr_token == ticket.qr_token) {
            return Err(StoreError::UniqueViolation("tickets.qr_token".to_string()));
        }
        if tickets.iter().any(|t| t.payment_ref == ticket.payment_ref) {
            return Err(StoreError::UniqueViolation("tickets.payment_ref".to_string()));
        }
        self.working.tickets.push(ticket.clone());
        Ok(())
    }

    async fn credit_wallet(
        &mut self,
        organizer: OrganizerId,
        amount: Money,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Wallet, StoreError> {
        self.working.credit_wallet(organizer, amount, reference, now)
    }

    async fn debit_wallet(
        &mut self,
        organizer: OrganizerId,
        amount: Money,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<DebitOutcome, StoreError> {
        self.working.debit_wallet(organizer, amount, reference, now)
    }

    async fn transition_withdrawal(
        &mut self,
        id: WithdrawalId,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
        admin: OrganizerId,
        now: DateTime<Utc>,
    ) -> Result<Option<Withdrawal>, StoreError> {
        self.working.transition_withdrawal(id, from, to, admin, now)
    }

    async fn record_anomaly(&mut self, anomaly: &ReconciliationAnomaly) -> Result<(), StoreError> {
        self.working.anomalies.push(anomaly.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let Self {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixtures::EventBuilder;
    use crate::mocks::test_clock;
    use gatepass_core::environment::Clock;

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let clock = test_clock();
        let store = InMemoryStore::new();
        let event = EventBuilder::live(clock.now())
            .ticket_type("Regular", 1000, 5)
            .build();
        let event_id = event.id;
        store.seed_event(event).await;

        {
            let mut tx = store.begin().await.unwrap();
            let outcome = tx.commit_sale(event_id, "Regular").await.unwrap();
            assert_eq!(outcome, SaleOutcome::Committed { sold_out: false });
        }

        let event = store.find_event(event_id).await.unwrap().unwrap();
        assert_eq!(event.ticket_types[0].sold, 0);
    }

    #[tokio::test]
    async fn test_commit_sale_flips_event_when_exhausted() {
        let clock = test_clock();
        let store = InMemoryStore::new();
        let event = EventBuilder::live(clock.now())
            .capacity(1)
            .ticket_type("Regular", 1000, 5)
            .build();
        let event_id = event.id;
        store.seed_event(event).await;

        let mut tx = store.begin().await.unwrap();
        assert_eq!(
            tx.commit_sale(event_id, "Regular").await.unwrap(),
            SaleOutcome::Committed { sold_out: true }
        );
        assert_eq!(
            tx.commit_sale(event_id, "Regular").await.unwrap(),
            SaleOutcome::Rejected(InventoryError::SoldOut)
        );
        tx.commit().await.unwrap();

        let event = store.find_event(event_id).await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::Ended);
        assert_eq!(event.total_sold(), 1);
    }

    #[tokio::test]
    async fn test_debit_requires_sufficient_balance() {
        let clock = test_clock();
        let store = InMemoryStore::new();
        let organizer = OrganizerId::new();

        let mut tx = store.begin().await.unwrap();
        tx.credit_wallet(organizer, Money::from_minor(500), "EVT-1", clock.now())
            .await
            .unwrap();
        let short = tx
            .debit_wallet(organizer, Money::from_minor(600), "w-1", clock.now())
            .await
            .unwrap();
        assert_eq!(
            short,
            DebitOutcome::InsufficientBalance {
                available: Money::from_minor(500)
            }
        );
        tx.commit().await.unwrap();

        let wallet = store.find_wallet(organizer).await.unwrap().unwrap();
        assert_eq!(wallet.balance, Money::from_minor(500));
        assert!(wallet.is_balanced());
        assert_eq!(store.wallet_entries(organizer, 10).await.unwrap().len(), 1);
    }
}
