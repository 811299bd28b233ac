//! Repository implementations over the connection pool.

use crate::rows::{self, db_error};
use crate::{PostgresStore, ops};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatepass_core::error::StoreError;
use gatepass_core::event::Event;
use gatepass_core::payment::{NewPayment, Payment, ReconciliationAnomaly};
use gatepass_core::state::{EventStatus, Lifecycle, PaymentStatus, WithdrawalStatus};
use gatepass_core::store::{
    AnomalyRepository, EventRepository, PaymentRepository, TicketRepository, TransitionOutcome,
    WalletRepository, WithdrawalRepository,
};
use gatepass_core::ticket::{EventSales, ScanOutcome, Ticket};
use gatepass_core::types::{EventId, Money, OrganizerId, PaymentReference, QrToken, WithdrawalId};
use gatepass_core::wallet::{Wallet, WalletEntry, Withdrawal};
use sqlx::Row;
use sqlx::postgres::PgRow;
use std::collections::HashMap;
use uuid::Uuid;

impl PostgresStore {
    /// Decode event rows and attach their ticket types in one extra query.
    async fn hydrate_events(&self, event_rows: Vec<PgRow>) -> Result<Vec<Event>, StoreError> {
        let mut events = event_rows
            .iter()
            .map(rows::event)
            .collect::<Result<Vec<_>, _>>()?;
        if events.is_empty() {
            return Ok(events);
        }

        let ids: Vec<Uuid> = events.iter().map(|e| *e.id.as_uuid()).collect();
        let tier_rows = sqlx::query(
            r"
            SELECT event_id, name, price, quantity, sold
            FROM ticket_types
            WHERE event_id = ANY($1)
            ORDER BY event_id, position
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut tiers: HashMap<EventId, Vec<_>> = HashMap::new();
        for row in &tier_rows {
            let (event_id, tier) = rows::ticket_type(row)?;
            tiers.entry(event_id).or_default().push(tier);
        }
        for event in &mut events {
            event.ticket_types = tiers.remove(&event.id).unwrap_or_default();
        }
        Ok(events)
    }
}

#[async_trait]
impl EventRepository for PostgresStore {
    async fn insert_event(&self, event: &Event) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        ops::insert_event(&mut tx, event).await?;
        tx.commit().await.map_err(db_error)?;

        tracing::debug!(event_id = %event.id, tiers = event.ticket_types.len(), "Event stored");
        Ok(())
    }

    async fn find_event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        let row = sqlx::query("SELECT * FROM events WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(self.hydrate_events(row.into_iter().collect()).await?.pop())
    }

    async fn events_by_organizer(&self, organizer: OrganizerId) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM events WHERE organizer_id = $1 ORDER BY created_at DESC",
        )
        .bind(organizer.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        self.hydrate_events(rows).await
    }

    async fn live_events(&self) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query("SELECT * FROM events WHERE status = 'LIVE' ORDER BY starts_at ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        self.hydrate_events(rows).await
    }

    async fn transition_event(
        &self,
        id: EventId,
        from: EventStatus,
        to: EventStatus,
    ) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        ops::transition_event(&mut conn, id, from, to).await
    }

    async fn expire_events(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE events SET status = 'ENDED' WHERE status = 'LIVE' AND ends_at <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() > 0 {
            tracing::info!(expired = result.rows_affected(), "Expired events past their end");
        }
        Ok(result.rows_affected())
    }

    async fn delete_ended_event(&self, id: EventId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1 AND status = 'ENDED'")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PaymentRepository for PostgresStore {
    async fn create_pending(
        &self,
        payment: NewPayment,
        now: DateTime<Utc>,
    ) -> Result<Payment, StoreError> {
        let payment = payment.into_payment(PaymentStatus::Pending, now);
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        ops::insert_payment(&mut conn, &payment).await?;
        Ok(payment)
    }

    async fn find_payment(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<Payment>, StoreError> {
        sqlx::query("SELECT * FROM payments WHERE reference = $1")
            .bind(reference.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(rows::payment)
            .transpose()
    }

    async fn finalize_payment(
        &self,
        reference: &PaymentReference,
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        ops::finalize_payment(&mut conn, reference, to, now).await
    }

    async fn stale_pending(
        &self,
        before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Payment>, StoreError> {
        sqlx::query(
            r"
            SELECT * FROM payments
            WHERE status = 'PENDING' AND created_at < $1
            ORDER BY last_swept_at ASC NULLS FIRST, created_at ASC
            LIMIT $2
            ",
        )
        .bind(before)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?
        .iter()
        .map(rows::payment)
        .collect()
    }

    async fn mark_swept(
        &self,
        reference: &PaymentReference,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE payments SET last_swept_at = $2 WHERE reference = $1 AND status = 'PENDING'",
        )
        .bind(reference.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}

#[async_trait]
impl TicketRepository for PostgresStore {
    async fn ticket_by_payment_ref(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<Ticket>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        ops::ticket_for_payment(&mut conn, reference).await
    }

    async fn ticket_by_token(
        &self,
        token: &QrToken,
        event_id: EventId,
    ) -> Result<Option<Ticket>, StoreError> {
        sqlx::query("SELECT * FROM tickets WHERE qr_token = $1 AND event_id = $2")
            .bind(token.as_str())
            .bind(event_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(rows::ticket)
            .transpose()
    }

    async fn mark_scanned(
        &self,
        token: &QrToken,
        event_id: EventId,
        now: DateTime<Utc>,
    ) -> Result<ScanOutcome, StoreError> {
        let row = sqlx::query(
            r"
            UPDATE tickets
            SET scanned_at = $3
            WHERE qr_token = $1 AND event_id = $2 AND scanned_at IS NULL
            RETURNING *
            ",
        )
        .bind(token.as_str())
        .bind(event_id.as_uuid())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(match row {
            Some(row) => ScanOutcome::Admitted(rows::ticket(&row)?),
            None => ScanOutcome::NoMatch,
        })
    }

    async fn sales_by_organizer(
        &self,
        organizer: OrganizerId,
    ) -> Result<Vec<EventSales>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT
                t.event_id,
                COALESCE(MAX(e.title), '') AS title,
                COUNT(*) AS tickets,
                COUNT(t.scanned_at) AS scanned,
                COALESCE(SUM(t.amount_paid), 0)::BIGINT AS revenue
            FROM tickets t
            LEFT JOIN events e ON e.id = t.event_id
            WHERE t.organizer_id = $1
            GROUP BY t.event_id
            ORDER BY t.event_id
            ",
        )
        .bind(organizer.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter()
            .map(|row| {
                let corrupt = |e: sqlx::Error| StoreError::Corrupt(e.to_string());
                let tickets: i64 = row.try_get("tickets").map_err(corrupt)?;
                let scanned: i64 = row.try_get("scanned").map_err(corrupt)?;
                let revenue: i64 = row.try_get("revenue").map_err(corrupt)?;
                Ok(EventSales {
                    event_id: EventId::from_uuid(row.try_get("event_id").map_err(corrupt)?),
                    title: row.try_get("title").map_err(corrupt)?,
                    tickets: u64::try_from(tickets).unwrap_or_default(),
                    scanned: u64::try_from(scanned).unwrap_or_default(),
                    revenue: Money::from_minor(u64::try_from(revenue).unwrap_or_default()),
                })
            })
            .collect()
    }
}

#[async_trait]
impl WalletRepository for PostgresStore {
    async fn find_wallet(&self, organizer: OrganizerId) -> Result<Option<Wallet>, StoreError> {
        sqlx::query("SELECT * FROM wallets WHERE organizer_id = $1")
            .bind(organizer.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(rows::wallet)
            .transpose()
    }

    async fn wallet_entries(
        &self,
        organizer: OrganizerId,
        limit: u32,
    ) -> Result<Vec<WalletEntry>, StoreError> {
        sqlx::query(
            r"
            SELECT * FROM wallet_entries
            WHERE organizer_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            ",
        )
        .bind(organizer.as_uuid())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?
        .iter()
        .map(rows::wallet_entry)
        .collect()
    }
}

#[async_trait]
impl WithdrawalRepository for PostgresStore {
    async fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO withdrawals (
                id, organizer_id, amount, bank_name, account_number, account_name,
                status, processed_by, created_at, processed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(withdrawal.id.as_uuid())
        .bind(withdrawal.organizer_id.as_uuid())
        .bind(rows::money_to_db(withdrawal.amount)?)
        .bind(&withdrawal.bank_details.bank_name)
        .bind(&withdrawal.bank_details.account_number)
        .bind(&withdrawal.bank_details.account_name)
        .bind(withdrawal.status.as_str())
        .bind(withdrawal.processed_by.map(|admin| *admin.as_uuid()))
        .bind(withdrawal.created_at)
        .bind(withdrawal.processed_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_withdrawal(&self, id: WithdrawalId) -> Result<Option<Withdrawal>, StoreError> {
        sqlx::query("SELECT * FROM withdrawals WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(rows::withdrawal)
            .transpose()
    }

    async fn withdrawals_by_organizer(
        &self,
        organizer: OrganizerId,
    ) -> Result<Vec<Withdrawal>, StoreError> {
        sqlx::query("SELECT * FROM withdrawals WHERE organizer_id = $1 ORDER BY created_at DESC")
            .bind(organizer.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?
            .iter()
            .map(rows::withdrawal)
            .collect()
    }

    async fn list_withdrawals(
        &self,
        status: Option<WithdrawalStatus>,
    ) -> Result<Vec<Withdrawal>, StoreError> {
        sqlx::query(
            r"
            SELECT * FROM withdrawals
            WHERE $1::TEXT IS NULL OR status = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(status.map(Lifecycle::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?
        .iter()
        .map(rows::withdrawal)
        .collect()
    }
}

#[async_trait]
impl AnomalyRepository for PostgresStore {
    async fn anomalies(&self, limit: u32) -> Result<Vec<ReconciliationAnomaly>, StoreError> {
        sqlx::query("SELECT * FROM reconciliation_anomalies ORDER BY recorded_at DESC LIMIT $1")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?
            .iter()
            .map(rows::anomaly)
            .collect()
    }
}
