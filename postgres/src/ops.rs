//! Statements shared by the pool-backed repositories and [`PostgresTx`].
//!
//! Every contended write is a single conditional statement; the row lock it
//! takes is what serializes concurrent callers.
//!
//! [`PostgresTx`]: crate::PostgresTx

use crate::rows::{self, count_to_db, db_error, money_to_db};
use chrono::{DateTime, Utc};
use gatepass_core::error::StoreError;
use gatepass_core::event::{Event, InventoryError};
use gatepass_core::payment::{Payment, ReconciliationAnomaly};
use gatepass_core::state::{EventStatus, Lifecycle, PaymentStatus, WithdrawalStatus};
use gatepass_core::store::{DebitOutcome, SaleOutcome, TransitionOutcome};
use gatepass_core::ticket::Ticket;
use gatepass_core::types::{EventId, Money, OrganizerId, PaymentReference, QrToken, WithdrawalId};
use gatepass_core::wallet::{EntryKind, Wallet, Withdrawal};
use sqlx::{PgConnection, Row};
use uuid::Uuid;

const REFERENCE_CONSTRAINT: &str = "payments_reference_key";

pub(crate) async fn insert_event(conn: &mut PgConnection, event: &Event) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO events (
            id, organizer_id, title, description, location, banner_url,
            starts_at, ends_at, capacity, sold_total, status, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ",
    )
    .bind(event.id.as_uuid())
    .bind(event.organizer_id.as_uuid())
    .bind(&event.title)
    .bind(&event.description)
    .bind(&event.location)
    .bind(event.banner_url.as_deref())
    .bind(event.starts_at)
    .bind(event.ends_at)
    .bind(count_to_db(event.capacity)?)
    .bind(
        i32::try_from(event.total_sold())
            .map_err(|_| StoreError::Corrupt("sold total out of range".to_string()))?,
    )
    .bind(event.status.as_str())
    .bind(event.created_at)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    for (position, tier) in event.ticket_types.iter().enumerate() {
        sqlx::query(
            r"
            INSERT INTO ticket_types (event_id, position, name, price, quantity, sold)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(event.id.as_uuid())
        .bind(i32::try_from(position).unwrap_or(i32::MAX))
        .bind(&tier.name)
        .bind(money_to_db(tier.price)?)
        .bind(count_to_db(tier.quantity)?)
        .bind(count_to_db(tier.sold)?)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    }
    Ok(())
}

pub(crate) async fn insert_payment(
    conn: &mut PgConnection,
    payment: &Payment,
) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO payments (
            id, reference, event_id, organizer_id, ticket_type, buyer_email, buyer_name,
            amount, platform_fee, organizer_amount, status, provider, created_at, finalized_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ",
    )
    .bind(payment.id.as_uuid())
    .bind(payment.reference.as_str())
    .bind(payment.event_id.as_uuid())
    .bind(payment.organizer_id.as_uuid())
    .bind(&payment.ticket_type)
    .bind(&payment.buyer_email)
    .bind(&payment.buyer_name)
    .bind(money_to_db(payment.amount)?)
    .bind(money_to_db(payment.platform_fee)?)
    .bind(money_to_db(payment.organizer_amount)?)
    .bind(payment.status.as_str())
    .bind(payment.provider.as_str())
    .bind(payment.created_at)
    .bind(payment.finalized_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| match db_error(e) {
        StoreError::UniqueViolation(constraint) if constraint == REFERENCE_CONSTRAINT => {
            StoreError::DuplicateReference(payment.reference.to_string())
        }
        other => other,
    })?;
    Ok(())
}

/// `UPDATE ... WHERE status = 'PENDING'`; on a miss, report what is there.
pub(crate) async fn finalize_payment(
    conn: &mut PgConnection,
    reference: &PaymentReference,
    to: PaymentStatus,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, StoreError> {
    PaymentStatus::Pending.transition(to)?;

    let updated = sqlx::query(
        r"
        UPDATE payments
        SET status = $2, finalized_at = $3
        WHERE reference = $1 AND status = 'PENDING'
        RETURNING *
        ",
    )
    .bind(reference.as_str())
    .bind(to.as_str())
    .bind(now)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error)?;

    if let Some(row) = updated {
        return Ok(TransitionOutcome::Applied(rows::payment(&row)?));
    }

    let current = sqlx::query("SELECT status FROM payments WHERE reference = $1")
        .bind(reference.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;

    match current {
        Some(row) => {
            let status: String = row
                .try_get("status")
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            Ok(TransitionOutcome::AlreadyFinalized(status.parse()?))
        }
        None => Err(StoreError::NotFound {
            entity: "payment",
            id: reference.to_string(),
        }),
    }
}

pub(crate) async fn ticket_for_payment(
    conn: &mut PgConnection,
    reference: &PaymentReference,
) -> Result<Option<Ticket>, StoreError> {
    sqlx::query("SELECT * FROM tickets WHERE payment_ref = $1")
        .bind(reference.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?
        .as_ref()
        .map(rows::ticket)
        .transpose()
}

pub(crate) async fn qr_token_exists(
    conn: &mut PgConnection,
    token: &QrToken,
) -> Result<bool, StoreError> {
    let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM tickets WHERE qr_token = $1) AS taken")
        .bind(token.as_str())
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error)?;
    row.try_get("taken")
        .map_err(|e| StoreError::Corrupt(e.to_string()))
}

/// Take one seat from the event, then one from the tier, then flip the
/// event to ENDED if nothing is left.
///
/// The first statement locks the event row, so concurrent sales for the same
/// event queue behind it until this transaction ends.
pub(crate) async fn commit_sale(
    conn: &mut PgConnection,
    event_id: EventId,
    ticket_type: &str,
) -> Result<SaleOutcome, StoreError> {
    let seat = sqlx::query(
        r"
        UPDATE events
        SET sold_total = sold_total + 1
        WHERE id = $1 AND sold_total < capacity
        RETURNING id
        ",
    )
    .bind(event_id.as_uuid())
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error)?;

    if seat.is_none() {
        return Ok(SaleOutcome::Rejected(
            reject_reason(conn, event_id, ticket_type).await?,
        ));
    }

    let tier = sqlx::query(
        r"
        UPDATE ticket_types
        SET sold = sold + 1
        WHERE event_id = $1 AND name = $2 AND sold < quantity
        RETURNING sold
        ",
    )
    .bind(event_id.as_uuid())
    .bind(ticket_type)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error)?;

    if tier.is_none() {
        sqlx::query("UPDATE events SET sold_total = sold_total - 1 WHERE id = $1")
            .bind(event_id.as_uuid())
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        return Ok(SaleOutcome::Rejected(
            reject_reason(conn, event_id, ticket_type).await?,
        ));
    }

    let flipped = sqlx::query(
        r"
        UPDATE events e
        SET status = 'ENDED'
        WHERE e.id = $1
          AND e.status <> 'ENDED'
          AND (
            e.sold_total >= e.capacity
            OR NOT EXISTS (
                SELECT 1 FROM ticket_types t WHERE t.event_id = e.id AND t.sold < t.quantity
            )
          )
        ",
    )
    .bind(event_id.as_uuid())
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    Ok(SaleOutcome::Committed {
        sold_out: flipped.rows_affected() > 0,
    })
}

async fn reject_reason(
    conn: &mut PgConnection,
    event_id: EventId,
    ticket_type: &str,
) -> Result<InventoryError, StoreError> {
    let row = sqlx::query(
        r"
        SELECT
            EXISTS (SELECT 1 FROM events WHERE id = $1) AS event_exists,
            EXISTS (SELECT 1 FROM ticket_types WHERE event_id = $1 AND name = $2) AS tier_exists
        ",
    )
    .bind(event_id.as_uuid())
    .bind(ticket_type)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error)?;

    let event_exists: bool = row
        .try_get("event_exists")
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let tier_exists: bool = row
        .try_get("tier_exists")
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    if !event_exists {
        return Err(StoreError::NotFound {
            entity: "event",
            id: event_id.to_string(),
        });
    }
    if tier_exists {
        Ok(InventoryError::SoldOut)
    } else {
        Ok(InventoryError::TicketTypeNotFound(ticket_type.to_string()))
    }
}

pub(crate) async fn insert_ticket(conn: &mut PgConnection, ticket: &Ticket) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO tickets (
            id, event_id, organizer_id, buyer_email, ticket_type, qr_token, qr_image,
            amount_paid, payment_ref, scanned_at, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ",
    )
    .bind(ticket.id.as_uuid())
    .bind(ticket.event_id.as_uuid())
    .bind(ticket.organizer_id.as_uuid())
    .bind(&ticket.buyer_email)
    .bind(&ticket.ticket_type)
    .bind(ticket.qr_token.as_str())
    .bind(&ticket.qr_image)
    .bind(money_to_db(ticket.amount_paid)?)
    .bind(ticket.payment_ref.as_str())
    .bind(ticket.scanned_at)
    .bind(ticket.created_at)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(())
}

async fn insert_entry(
    conn: &mut PgConnection,
    organizer: OrganizerId,
    kind: EntryKind,
    amount: Money,
    reference: &str,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO wallet_entries (id, organizer_id, kind, amount, reference, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(Uuid::new_v4())
    .bind(organizer.as_uuid())
    .bind(kind.as_str())
    .bind(money_to_db(amount)?)
    .bind(reference)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(())
}

pub(crate) async fn credit_wallet(
    conn: &mut PgConnection,
    organizer: OrganizerId,
    amount: Money,
    reference: &str,
    now: DateTime<Utc>,
) -> Result<Wallet, StoreError> {
    let row = sqlx::query(
        r"
        INSERT INTO wallets (organizer_id, balance, total_earnings, total_withdrawn, updated_at)
        VALUES ($1, $2, $2, 0, $3)
        ON CONFLICT (organizer_id) DO UPDATE
        SET balance = wallets.balance + EXCLUDED.balance,
            total_earnings = wallets.total_earnings + EXCLUDED.total_earnings,
            updated_at = EXCLUDED.updated_at
        RETURNING *
        ",
    )
    .bind(organizer.as_uuid())
    .bind(money_to_db(amount)?)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error)?;

    insert_entry(conn, organizer, EntryKind::Credit, amount, reference, now).await?;
    rows::wallet(&row)
}

pub(crate) async fn debit_wallet(
    conn: &mut PgConnection,
    organizer: OrganizerId,
    amount: Money,
    reference: &str,
    now: DateTime<Utc>,
) -> Result<DebitOutcome, StoreError> {
    let updated = sqlx::query(
        r"
        UPDATE wallets
        SET balance = balance - $2,
            total_withdrawn = total_withdrawn + $2,
            updated_at = $3
        WHERE organizer_id = $1 AND balance >= $2
        RETURNING *
        ",
    )
    .bind(organizer.as_uuid())
    .bind(money_to_db(amount)?)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error)?;

    let Some(row) = updated else {
        let available = sqlx::query("SELECT * FROM wallets WHERE organizer_id = $1")
            .bind(organizer.as_uuid())
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(rows::wallet)
            .transpose()?
            .map_or(Money::ZERO, |w| w.balance);
        return Ok(DebitOutcome::InsufficientBalance { available });
    };

    insert_entry(conn, organizer, EntryKind::Debit, amount, reference, now).await?;
    Ok(DebitOutcome::Debited(rows::wallet(&row)?))
}

pub(crate) async fn transition_withdrawal(
    conn: &mut PgConnection,
    id: WithdrawalId,
    from: WithdrawalStatus,
    to: WithdrawalStatus,
    admin: OrganizerId,
    now: DateTime<Utc>,
) -> Result<Option<Withdrawal>, StoreError> {
    from.transition(to)?;

    sqlx::query(
        r"
        UPDATE withdrawals
        SET status = $3, processed_by = $4, processed_at = $5
        WHERE id = $1 AND status = $2
        RETURNING *
        ",
    )
    .bind(id.as_uuid())
    .bind(from.as_str())
    .bind(to.as_str())
    .bind(admin.as_uuid())
    .bind(now)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error)?
    .as_ref()
    .map(rows::withdrawal)
    .transpose()
}

pub(crate) async fn record_anomaly(
    conn: &mut PgConnection,
    anomaly: &ReconciliationAnomaly,
) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO reconciliation_anomalies (id, reference, event_id, ticket_type, reason, recorded_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(anomaly.id.as_uuid())
    .bind(anomaly.reference.as_str())
    .bind(anomaly.event_id.as_uuid())
    .bind(&anomaly.ticket_type)
    .bind(&anomaly.reason)
    .bind(anomaly.recorded_at)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(())
}

pub(crate) async fn transition_event(
    conn: &mut PgConnection,
    id: EventId,
    from: EventStatus,
    to: EventStatus,
) -> Result<bool, StoreError> {
    from.transition(to)?;

    let result = sqlx::query("UPDATE events SET status = $3 WHERE id = $1 AND status = $2")
        .bind(id.as_uuid())
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    Ok(result.rows_affected() > 0)
}
