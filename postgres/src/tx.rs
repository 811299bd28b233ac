//! [`StoreTx`] over a `sqlx` transaction.

use crate::ops;
use crate::rows::db_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatepass_core::error::StoreError;
use gatepass_core::payment::{Payment, ReconciliationAnomaly};
use gatepass_core::state::{PaymentStatus, WithdrawalStatus};
use gatepass_core::store::{DebitOutcome, SaleOutcome, StoreTx, TransitionOutcome};
use gatepass_core::ticket::Ticket;
use gatepass_core::types::{EventId, Money, OrganizerId, PaymentReference, QrToken, WithdrawalId};
use gatepass_core::wallet::{Wallet, Withdrawal};
use sqlx::{Postgres, Transaction};

/// An open Postgres transaction. Dropping it without [`StoreTx::commit`]
/// rolls back.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTx {
    pub(crate) const fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        ops::insert_payment(&mut self.tx, payment).await
    }

    async fn finalize_payment(
        &mut self,
        reference: &PaymentReference,
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, StoreError> {
        ops::finalize_payment(&mut self.tx, reference, to, now).await
    }

    async fn ticket_for_payment(
        &mut self,
        reference: &PaymentReference,
    ) -> Result<Option<Ticket>, StoreError> {
        ops::ticket_for_payment(&mut self.tx, reference).await
    }

    async fn qr_token_exists(&mut self, token: &QrToken) -> Result<bool, StoreError> {
        ops::qr_token_exists(&mut self.tx, token).await
    }

    async fn commit_sale(
        &mut self,
        event_id: EventId,
        ticket_type: &str,
    ) -> Result<SaleOutcome, StoreError> {
        ops::commit_sale(&mut self.tx, event_id, ticket_type).await
    }

    async fn insert_ticket(&mut self, ticket: &Ticket) -> Result<(), StoreError> {
        ops::insert_ticket(&mut self.tx, ticket).await
    }

    async fn credit_wallet(
        &mut self,
        organizer: OrganizerId,
        amount: Money,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Wallet, StoreError> {
        ops::credit_wallet(&mut self.tx, organizer, amount, reference, now).await
    }

    async fn debit_wallet(
        &mut self,
        organizer: OrganizerId,
        amount: Money,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<DebitOutcome, StoreError> {
        ops::debit_wallet(&mut self.tx, organizer, amount, reference, now).await
    }

    async fn transition_withdrawal(
        &mut self,
        id: WithdrawalId,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
        admin: OrganizerId,
        now: DateTime<Utc>,
    ) -> Result<Option<Withdrawal>, StoreError> {
        ops::transition_withdrawal(&mut self.tx, id, from, to, admin, now).await
    }

    async fn record_anomaly(&mut self, anomaly: &ReconciliationAnomaly) -> Result<(), StoreError> {
        ops::record_anomaly(&mut self.tx, anomaly).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(db_error)
    }
}
