//! Row decoding and column conversions.

use gatepass_core::error::StoreError;
use gatepass_core::event::{Event, TicketType};
use gatepass_core::payment::{Payment, ReconciliationAnomaly};
use gatepass_core::ticket::Ticket;
use gatepass_core::types::{
    AnomalyId, EventId, Money, OrganizerId, PaymentId, PaymentReference, QrToken, TicketId,
    WalletEntryId, WithdrawalId,
};
use gatepass_core::wallet::{BankDetails, Wallet, WalletEntry, Withdrawal};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

/// Map a driver error, recognising unique violations by constraint name.
pub(crate) fn db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let constraint = db.constraint().unwrap_or("unknown").to_string();
            return StoreError::UniqueViolation(constraint);
        }
    }
    StoreError::Backend(err.to_string())
}

pub(crate) fn money_to_db(money: Money) -> Result<i64, StoreError> {
    i64::try_from(money.minor()).map_err(|_| StoreError::Corrupt(format!("amount {money} out of range")))
}

pub(crate) fn count_to_db(count: u32) -> Result<i32, StoreError> {
    i32::try_from(count).map_err(|_| StoreError::Corrupt(format!("count {count} out of range")))
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Corrupt(format!("{column}: {e}")))
}

fn money(row: &PgRow, column: &str) -> Result<Money, StoreError> {
    let raw: i64 = get(row, column)?;
    u64::try_from(raw)
        .map(Money::from_minor)
        .map_err(|_| StoreError::Corrupt(format!("{column}: negative amount {raw}")))
}

fn count(row: &PgRow, column: &str) -> Result<u32, StoreError> {
    let raw: i32 = get(row, column)?;
    u32::try_from(raw).map_err(|_| StoreError::Corrupt(format!("{column}: negative count {raw}")))
}

fn parsed<T>(row: &PgRow, column: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr,
    StoreError: From<T::Err>,
{
    let raw: String = get(row, column)?;
    Ok(raw.parse::<T>()?)
}

pub(crate) fn ticket_type(row: &PgRow) -> Result<(EventId, TicketType), StoreError> {
    Ok((
        EventId::from_uuid(get(row, "event_id")?),
        TicketType {
            name: get(row, "name")?,
            price: money(row, "price")?,
            quantity: count(row, "quantity")?,
            sold: count(row, "sold")?,
        },
    ))
}

/// Decode an `events` row; ticket types are attached by the caller.
pub(crate) fn event(row: &PgRow) -> Result<Event, StoreError> {
    Ok(Event {
        id: EventId::from_uuid(get(row, "id")?),
        organizer_id: OrganizerId::from_uuid(get(row, "organizer_id")?),
        title: get(row, "title")?,
        description: get(row, "description")?,
        location: get(row, "location")?,
        banner_url: get(row, "banner_url")?,
        starts_at: get(row, "starts_at")?,
        ends_at: get(row, "ends_at")?,
        capacity: count(row, "capacity")?,
        ticket_types: Vec::new(),
        status: parsed(row, "status")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn payment(row: &PgRow) -> Result<Payment, StoreError> {
    Ok(Payment {
        id: PaymentId::from_uuid(get(row, "id")?),
        reference: PaymentReference::new(get::<String>(row, "reference")?),
        event_id: EventId::from_uuid(get(row, "event_id")?),
        organizer_id: OrganizerId::from_uuid(get(row, "organizer_id")?),
        ticket_type: get(row, "ticket_type")?,
        buyer_email: get(row, "buyer_email")?,
        buyer_name: get(row, "buyer_name")?,
        amount: money(row, "amount")?,
        platform_fee: money(row, "platform_fee")?,
        organizer_amount: money(row, "organizer_amount")?,
        status: parsed(row, "status")?,
        provider: parsed(row, "provider")?,
        created_at: get(row, "created_at")?,
        finalized_at: get(row, "finalized_at")?,
    })
}

pub(crate) fn ticket(row: &PgRow) -> Result<Ticket, StoreError> {
    Ok(Ticket {
        id: TicketId::from_uuid(get(row, "id")?),
        event_id: EventId::from_uuid(get(row, "event_id")?),
        organizer_id: OrganizerId::from_uuid(get(row, "organizer_id")?),
        buyer_email: get(row, "buyer_email")?,
        ticket_type: get(row, "ticket_type")?,
        qr_token: QrToken::new(get::<String>(row, "qr_token")?),
        qr_image: get(row, "qr_image")?,
        amount_paid: money(row, "amount_paid")?,
        payment_ref: PaymentReference::new(get::<String>(row, "payment_ref")?),
        scanned_at: get(row, "scanned_at")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn wallet(row: &PgRow) -> Result<Wallet, StoreError> {
    Ok(Wallet {
        organizer_id: OrganizerId::from_uuid(get(row, "organizer_id")?),
        balance: money(row, "balance")?,
        total_earnings: money(row, "total_earnings")?,
        total_withdrawn: money(row, "total_withdrawn")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(crate) fn wallet_entry(row: &PgRow) -> Result<WalletEntry, StoreError> {
    Ok(WalletEntry {
        id: WalletEntryId::from_uuid(get(row, "id")?),
        organizer_id: OrganizerId::from_uuid(get(row, "organizer_id")?),
        kind: parsed(row, "kind")?,
        amount: money(row, "amount")?,
        reference: get(row, "reference")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn withdrawal(row: &PgRow) -> Result<Withdrawal, StoreError> {
    let processed_by: Option<Uuid> = get(row, "processed_by")?;
    Ok(Withdrawal {
        id: WithdrawalId::from_uuid(get(row, "id")?),
        organizer_id: OrganizerId::from_uuid(get(row, "organizer_id")?),
        amount: money(row, "amount")?,
        bank_details: BankDetails {
            bank_name: get(row, "bank_name")?,
            account_number: get(row, "account_number")?,
            account_name: get(row, "account_name")?,
        },
        status: parsed(row, "status")?,
        processed_by: processed_by.map(OrganizerId::from_uuid),
        created_at: get(row, "created_at")?,
        processed_at: get(row, "processed_at")?,
    })
}

pub(crate) fn anomaly(row: &PgRow) -> Result<ReconciliationAnomaly, StoreError> {
    Ok(ReconciliationAnomaly {
        id: AnomalyId::from_uuid(get(row, "id")?),
        reference: PaymentReference::new(get::<String>(row, "reference")?),
        event_id: EventId::from_uuid(get(row, "event_id")?),
        ticket_type: get(row, "ticket_type")?,
        reason: get(row, "reason")?,
        recorded_at: get(row, "recorded_at")?,
    })
}
