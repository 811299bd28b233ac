//! Organizer wallets and withdrawals.
//!
//! Credits happen inside the settlement transaction through
//! [`WalletLedger::credit`]. Withdrawals follow PENDING → APPROVED → PAID or
//! PENDING → REJECTED; approval debits the wallet with a conditional
//! decrement in the same transaction as the status change, so two approvals
//! racing for the same balance can never both succeed.

use crate::metrics;
use chrono::{DateTime, Utc};
use gatepass_core::environment::Clock;
use gatepass_core::error::StoreError;
use gatepass_core::state::{Lifecycle, TransitionError, WithdrawalStatus};
use gatepass_core::store::{DebitOutcome, Store, StoreTx};
use gatepass_core::types::{Money, OrganizerId, WithdrawalId};
use gatepass_core::wallet::{BankDetails, Wallet, WalletEntry, Withdrawal};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Ledger entries returned with a wallet.
const RECENT_ENTRIES: u32 = 50;

/// Wallet and withdrawal failures.
#[derive(Debug, Clone, Error)]
pub enum WalletError {
    /// Malformed request
    #[error("{0}")]
    Validation(String),
    /// No such withdrawal
    #[error("withdrawal not found: {0}")]
    NotFound(WithdrawalId),
    /// Balance does not cover the amount
    #[error("insufficient balance: {available} available, {requested} requested")]
    InsufficientBalance {
        /// Current balance
        available: Money,
        /// Amount asked for
        requested: Money,
    },
    /// Withdrawal is not in a status that allows this action
    #[error(transparent)]
    Transition(#[from] TransitionError),
    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A wallet with its recent movements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletView {
    /// Balance and totals
    pub wallet: Wallet,
    /// Most recent entries, newest first
    pub entries: Vec<WalletEntry>,
}

/// Withdrawal request as submitted by an organizer.
#[derive(Debug, Clone)]
pub struct WithdrawalRequest {
    /// Amount in minor units
    pub amount: Money,
    /// Payout destination
    pub bank_details: BankDetails,
}

/// Wallet reads and the withdrawal workflow.
pub struct WalletLedger {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl WalletLedger {
    /// Create a wallet ledger.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Credit an organizer inside `tx`. A zero amount is a no-op.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`].
    pub async fn credit(
        tx: &mut dyn StoreTx,
        organizer: OrganizerId,
        amount: Money,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Wallet>, StoreError> {
        if amount.is_zero() {
            return Ok(None);
        }
        let wallet = tx.credit_wallet(organizer, amount, reference, now).await?;
        metrics::record_wallet_credit(amount.minor());
        tracing::info!(
            %organizer,
            %amount,
            reference,
            balance = %wallet.balance,
            "Wallet credited"
        );
        Ok(Some(wallet))
    }

    /// The organizer's wallet (zero if never credited) and recent entries.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`].
    pub async fn wallet(&self, organizer: OrganizerId) -> Result<WalletView, StoreError> {
        let wallet = self
            .store
            .find_wallet(organizer)
            .await?
            .unwrap_or_else(|| Wallet::empty(organizer, self.clock.now()));
        let entries = self.store.wallet_entries(organizer, RECENT_ENTRIES).await?;
        Ok(WalletView { wallet, entries })
    }

    /// Submit a PENDING withdrawal.
    ///
    /// # Errors
    ///
    /// - [`WalletError::Validation`] for a zero amount or blank bank details
    /// - [`WalletError::InsufficientBalance`] if the balance does not cover it
    pub async fn request_withdrawal(
        &self,
        organizer: OrganizerId,
        request: WithdrawalRequest,
    ) -> Result<Withdrawal, WalletError> {
        if request.amount.is_zero() {
            return Err(WalletError::Validation("amount must be positive".to_string()));
        }
        let bank = &request.bank_details;
        if [&bank.bank_name, &bank.account_number, &bank.account_name]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(WalletError::Validation("bank details are incomplete".to_string()));
        }

        let available = self
            .store
            .find_wallet(organizer)
            .await?
            .map_or(Money::ZERO, |w| w.balance);
        if available < request.amount {
            return Err(WalletError::InsufficientBalance {
                available,
                requested: request.amount,
            });
        }

        let withdrawal = Withdrawal {
            id: WithdrawalId::new(),
            organizer_id: organizer,
            amount: request.amount,
            bank_details: request.bank_details,
            status: WithdrawalStatus::Pending,
            processed_by: None,
            created_at: self.clock.now(),
            processed_at: None,
        };
        self.store.insert_withdrawal(&withdrawal).await?;
        tracing::info!(
            withdrawal_id = %withdrawal.id,
            %organizer,
            amount = %withdrawal.amount,
            "Withdrawal requested"
        );
        Ok(withdrawal)
    }

    /// Approve a PENDING withdrawal, debiting the wallet.
    ///
    /// # Errors
    ///
    /// - [`WalletError::InsufficientBalance`] if the balance no longer covers
    ///   the amount; the withdrawal stays PENDING
    /// - [`WalletError::Transition`] if it is not PENDING
    pub async fn approve(&self, id: WithdrawalId, admin: OrganizerId) -> Result<Withdrawal, WalletError> {
        let withdrawal = self.find(id).await?;
        withdrawal.status.transition(WithdrawalStatus::Approved)?;

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let Some(approved) = tx
            .transition_withdrawal(id, WithdrawalStatus::Pending, WithdrawalStatus::Approved, admin, now)
            .await?
        else {
            drop(tx);
            return Err(self.lost_race(id, WithdrawalStatus::Approved).await);
        };

        match tx
            .debit_wallet(approved.organizer_id, approved.amount, &id.to_string(), now)
            .await?
        {
            DebitOutcome::Debited(wallet) => {
                tx.commit().await?;
                tracing::info!(
                    withdrawal_id = %id,
                    %admin,
                    amount = %approved.amount,
                    balance = %wallet.balance,
                    "Withdrawal approved"
                );
                Ok(approved)
            }
            DebitOutcome::InsufficientBalance { available } => {
                tracing::warn!(
                    withdrawal_id = %id,
                    %available,
                    requested = %approved.amount,
                    "Withdrawal approval refused, balance no longer covers it"
                );
                Err(WalletError::InsufficientBalance {
                    available,
                    requested: approved.amount,
                })
            }
        }
    }

    /// Reject a PENDING withdrawal. The wallet is untouched.
    ///
    /// # Errors
    ///
    /// [`WalletError::Transition`] if it is not PENDING.
    pub async fn reject(&self, id: WithdrawalId, admin: OrganizerId) -> Result<Withdrawal, WalletError> {
        self.move_status(id, admin, WithdrawalStatus::Pending, WithdrawalStatus::Rejected)
            .await
    }

    /// Mark an APPROVED withdrawal as paid out.
    ///
    /// # Errors
    ///
    /// [`WalletError::Transition`] if it is not APPROVED.
    pub async fn mark_paid(&self, id: WithdrawalId, admin: OrganizerId) -> Result<Withdrawal, WalletError> {
        self.move_status(id, admin, WithdrawalStatus::Approved, WithdrawalStatus::Paid)
            .await
    }

    /// An organizer's own withdrawals, newest first.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`].
    pub async fn list_mine(&self, organizer: OrganizerId) -> Result<Vec<Withdrawal>, StoreError> {
        self.store.withdrawals_by_organizer(organizer).await
    }

    /// All withdrawals, optionally by status, newest first.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`].
    pub async fn list_all(
        &self,
        status: Option<WithdrawalStatus>,
    ) -> Result<Vec<Withdrawal>, StoreError> {
        self.store.list_withdrawals(status).await
    }

    async fn find(&self, id: WithdrawalId) -> Result<Withdrawal, WalletError> {
        self.store
            .find_withdrawal(id)
            .await?
            .ok_or(WalletError::NotFound(id))
    }

    async fn move_status(
        &self,
        id: WithdrawalId,
        admin: OrganizerId,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    ) -> Result<Withdrawal, WalletError> {
        let withdrawal = self.find(id).await?;
        if withdrawal.status != from {
            withdrawal.status.transition(to)?;
        }

        let mut tx = self.store.begin().await?;
        let Some(moved) = tx
            .transition_withdrawal(id, from, to, admin, self.clock.now())
            .await?
        else {
            drop(tx);
            return Err(self.lost_race(id, to).await);
        };
        tx.commit().await?;
        tracing::info!(withdrawal_id = %id, %admin, status = %to, "Withdrawal status changed");
        Ok(moved)
    }

    /// Error for a conditional update that found the withdrawal already moved.
    async fn lost_race(&self, id: WithdrawalId, to: WithdrawalStatus) -> WalletError {
        match self.find(id).await {
            Ok(current) => WalletError::Transition(TransitionError {
                entity: WithdrawalStatus::ENTITY,
                from: current.status.as_str(),
                to: to.as_str(),
            }),
            Err(e) => e,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use gatepass_testing::{InMemoryStore, test_clock};

    fn bank() -> BankDetails {
        BankDetails {
            bank_name: "First Bank".to_string(),
            account_number: "0123456789".to_string(),
            account_name: "Ada Organizer".to_string(),
        }
    }

    async fn funded(store: &InMemoryStore, organizer: OrganizerId, amount: u64) {
        let mut tx = store.begin().await.unwrap();
        WalletLedger::credit(&mut *tx, organizer, Money::from_minor(amount), "EVT-seed", test_clock().now())
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    fn ledger(store: &InMemoryStore) -> WalletLedger {
        WalletLedger::new(Arc::new(store.clone()), Arc::new(test_clock()))
    }

    #[tokio::test]
    async fn test_zero_credit_is_noop() {
        let store = InMemoryStore::new();
        let organizer = OrganizerId::new();
        let mut tx = store.begin().await.unwrap();
        let credited = WalletLedger::credit(&mut *tx, organizer, Money::ZERO, "FREE-1", test_clock().now())
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert!(credited.is_none());

        let view = ledger(&store).wallet(organizer).await.unwrap();
        assert_eq!(view.wallet.balance, Money::ZERO);
        assert!(view.entries.is_empty());
    }

    #[tokio::test]
    async fn test_withdrawal_lifecycle() {
        let store = InMemoryStore::new();
        let organizer = OrganizerId::new();
        let admin = OrganizerId::new();
        funded(&store, organizer, 10_000).await;
        let ledger = ledger(&store);

        let withdrawal = ledger
            .request_withdrawal(organizer, WithdrawalRequest { amount: Money::from_minor(4000), bank_details: bank() })
            .await
            .unwrap();
        assert_eq!(withdrawal.status, WithdrawalStatus::Pending);

        let approved = ledger.approve(withdrawal.id, admin).await.unwrap();
        assert_eq!(approved.status, WithdrawalStatus::Approved);
        assert_eq!(approved.processed_by, Some(admin));

        let view = ledger.wallet(organizer).await.unwrap();
        assert_eq!(view.wallet.balance, Money::from_minor(6000));
        assert_eq!(view.wallet.total_withdrawn, Money::from_minor(4000));
        assert!(view.wallet.is_balanced());
        assert_eq!(view.entries.len(), 2);

        assert!(matches!(
            ledger.approve(withdrawal.id, admin).await,
            Err(WalletError::Transition(_))
        ));
        let paid = ledger.mark_paid(withdrawal.id, admin).await.unwrap();
        assert_eq!(paid.status, WithdrawalStatus::Paid);
        assert!(matches!(
            ledger.reject(withdrawal.id, admin).await,
            Err(WalletError::Transition(_))
        ));
    }

    #[tokio::test]
    async fn test_request_validation() {
        let store = InMemoryStore::new();
        let organizer = OrganizerId::new();
        funded(&store, organizer, 1000).await;
        let ledger = ledger(&store);

        let zero = ledger
            .request_withdrawal(organizer, WithdrawalRequest { amount: Money::ZERO, bank_details: bank() })
            .await;
        assert!(matches!(zero, Err(WalletError::Validation(_))));

        let mut blank = bank();
        blank.account_number = " ".to_string();
        let incomplete = ledger
            .request_withdrawal(organizer, WithdrawalRequest { amount: Money::from_minor(10), bank_details: blank })
            .await;
        assert!(matches!(incomplete, Err(WalletError::Validation(_))));

        let too_much = ledger
            .request_withdrawal(organizer, WithdrawalRequest { amount: Money::from_minor(1001), bank_details: bank() })
            .await;
        assert!(matches!(
            too_much,
            Err(WalletError::InsufficientBalance { available, .. }) if available == Money::from_minor(1000)
        ));
    }

    #[tokio::test]
    async fn test_second_approval_over_balance_stays_pending() {
        let store = InMemoryStore::new();
        let organizer = OrganizerId::new();
        let admin = OrganizerId::new();
        funded(&store, organizer, 5000).await;
        let ledger = ledger(&store);

        let request = || WithdrawalRequest { amount: Money::from_minor(3000), bank_details: bank() };
        let first = ledger.request_withdrawal(organizer, request()).await.unwrap();
        let second = ledger.request_withdrawal(organizer, request()).await.unwrap();

        ledger.approve(first.id, admin).await.unwrap();
        let err = ledger.approve(second.id, admin).await.unwrap_err();
        assert!(matches!(
            err,
            WalletError::InsufficientBalance { available, requested }
                if available == Money::from_minor(2000) && requested == Money::from_minor(3000)
        ));

        let pending = ledger.list_all(Some(WithdrawalStatus::Pending)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second.id);
        assert_eq!(ledger.wallet(organizer).await.unwrap().wallet.balance, Money::from_minor(2000));

        let rejected = ledger.reject(second.id, admin).await.unwrap();
        assert_eq!(rejected.status, WithdrawalStatus::Rejected);
        assert_eq!(ledger.list_mine(organizer).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_withdrawal() {
        let store = InMemoryStore::new();
        let id = WithdrawalId::new();
        assert!(matches!(
            ledger(&store).approve(id, OrganizerId::new()).await,
            Err(WalletError::NotFound(missing)) if missing == id
        ));
    }
}
