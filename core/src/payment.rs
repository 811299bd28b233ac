//! Payment records and reconciliation anomalies.

use crate::state::PaymentStatus;
use crate::types::{AnomalyId, EventId, Money, OrganizerId, PaymentId, PaymentReference};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who processed the payment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentProvider {
    /// Free ticket, no money moved
    Free,
    /// External payment gateway
    Gateway,
}

impl PaymentProvider {
    /// Storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Gateway => "GATEWAY",
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentProvider {
    type Err = crate::state::ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FREE" => Ok(Self::Free),
            "GATEWAY" => Ok(Self::Gateway),
            other => Err(crate::state::ParseStatusError {
                entity: "payment provider",
                value: other.to_string(),
            }),
        }
    }
}

/// One payment attempt. `reference` is the idempotency key for every
/// reconciliation signal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment ID
    pub id: PaymentId,
    /// Unique, immutable reference
    pub reference: PaymentReference,
    /// Event being paid for
    pub event_id: EventId,
    /// Organizer, denormalized from the event at creation
    pub organizer_id: OrganizerId,
    /// Ticket type name
    pub ticket_type: String,
    /// Buyer email
    pub buyer_email: String,
    /// Buyer display name
    pub buyer_name: String,
    /// Gross amount charged to the buyer
    pub amount: Money,
    /// Platform fee portion
    pub platform_fee: Money,
    /// Amount credited to the organizer on success, fixed at initiation
    pub organizer_amount: Money,
    /// Lifecycle status
    pub status: PaymentStatus,
    /// Free or gateway
    pub provider: PaymentProvider,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// When the payment reached a terminal status
    pub finalized_at: Option<DateTime<Utc>>,
}

/// Fields needed to create a payment record.
#[derive(Clone, Debug)]
pub struct NewPayment {
    /// Reference
    pub reference: PaymentReference,
    /// Event
    pub event_id: EventId,
    /// Organizer
    pub organizer_id: OrganizerId,
    /// Ticket type name
    pub ticket_type: String,
    /// Buyer email
    pub buyer_email: String,
    /// Buyer name
    pub buyer_name: String,
    /// Gross amount
    pub amount: Money,
    /// Platform fee
    pub platform_fee: Money,
    /// Organizer credit
    pub organizer_amount: Money,
    /// Provider
    pub provider: PaymentProvider,
}

impl NewPayment {
    /// Materialize the record with the given initial status.
    #[must_use]
    pub fn into_payment(self, status: PaymentStatus, now: DateTime<Utc>) -> Payment {
        Payment {
            id: PaymentId::new(),
            reference: self.reference,
            event_id: self.event_id,
            organizer_id: self.organizer_id,
            ticket_type: self.ticket_type,
            buyer_email: self.buyer_email,
            buyer_name: self.buyer_name,
            amount: self.amount,
            platform_fee: self.platform_fee,
            organizer_amount: self.organizer_amount,
            status,
            provider: self.provider,
            created_at: now,
            finalized_at: if status == PaymentStatus::Pending {
                None
            } else {
                Some(now)
            },
        }
    }
}

/// A success that could not be matched to inventory.
///
/// Written inside the success transaction when `commit_sale` is rejected
/// after the buyer has already paid; the ticket is still issued.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationAnomaly {
    /// Anomaly ID
    pub id: AnomalyId,
    /// Payment reference
    pub reference: PaymentReference,
    /// Event
    pub event_id: EventId,
    /// Ticket type name
    pub ticket_type: String,
    /// Human-readable reason
    pub reason: String,
    /// When it was recorded
    pub recorded_at: DateTime<Utc>,
}
