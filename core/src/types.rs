//! Value objects shared by every Gatepass component.
//!
//! Identifiers are UUID newtypes. Amounts are integer minor units (kobo,
//! cents) so fee arithmetic never touches floating point.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for an event
    EventId
);
uuid_id!(
    /// Unique identifier for an organizer (supplied by the auth layer)
    OrganizerId
);
uuid_id!(
    /// Unique identifier for a payment record
    PaymentId
);
uuid_id!(
    /// Unique identifier for an issued ticket
    TicketId
);
uuid_id!(
    /// Unique identifier for a withdrawal request
    WithdrawalId
);
uuid_id!(
    /// Unique identifier for a wallet ledger entry
    WalletEntryId
);
uuid_id!(
    /// Unique identifier for a recorded reconciliation anomaly
    AnomalyId
);

// ============================================================================
// Money Value Object (minor units to avoid floating point errors)
// ============================================================================

/// An amount of money in integer minor currency units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from minor units
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Subtracts two money amounts (returns None if result would be negative)
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        if self.0 >= other.0 {
            Some(Self(self.0 - other.0))
        } else {
            None
        }
    }

    /// Subtracts, clamping at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// References and tokens
// ============================================================================

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0_u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

/// Globally unique payment reference: the idempotency key for reconciliation.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentReference(String);

impl PaymentReference {
    /// Prefix for references sent to the gateway.
    pub const GATEWAY_PREFIX: &'static str = "EVT-";
    /// Prefix for free-ticket references that never leave the service.
    pub const FREE_PREFIX: &'static str = "FREE-";

    /// Generates a fresh reference for a gateway checkout.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{}{}", Self::GATEWAY_PREFIX, random_hex(8)))
    }

    /// Generates a fresh reference for a free ticket.
    #[must_use]
    pub fn generate_free() -> Self {
        Self(format!("{}{}", Self::FREE_PREFIX, random_hex(8)))
    }

    /// Wraps an existing reference (from a webhook, URL or database row).
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Borrow the reference string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque random token encoded in a ticket's QR code.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QrToken(String);

impl QrToken {
    /// Generates a fresh token with 96 bits of entropy.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("TICKET-{}", random_hex(12)))
    }

    /// Wraps an existing token (scanned from a QR code or read from storage).
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the token string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QrToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
