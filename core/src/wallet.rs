//! Organizer wallets, ledger entries and withdrawals.

use crate::state::WithdrawalStatus;
use crate::types::{Money, OrganizerId, WalletEntryId, WithdrawalId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Running balance for one organizer. Created lazily on first credit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Owner
    pub organizer_id: OrganizerId,
    /// Spendable balance, never negative
    pub balance: Money,
    /// Lifetime credits (monotonic)
    pub total_earnings: Money,
    /// Lifetime debits (monotonic)
    pub total_withdrawn: Money,
    /// Last mutation
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// The view of an organizer who has not been credited yet.
    #[must_use]
    pub const fn empty(organizer_id: OrganizerId, now: DateTime<Utc>) -> Self {
        Self {
            organizer_id,
            balance: Money::ZERO,
            total_earnings: Money::ZERO,
            total_withdrawn: Money::ZERO,
            updated_at: now,
        }
    }

    /// `balance == total_earnings - total_withdrawn`.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.total_earnings.checked_sub(self.total_withdrawn) == Some(self.balance)
    }
}

/// Direction of a ledger entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    /// Ticket sale settled
    Credit,
    /// Withdrawal approved
    Debit,
}

impl EntryKind {
    /// Storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Credit => "CREDIT",
            Self::Debit => "DEBIT",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = crate::state::ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREDIT" => Ok(Self::Credit),
            "DEBIT" => Ok(Self::Debit),
            other => Err(crate::state::ParseStatusError {
                entity: "wallet entry",
                value: other.to_string(),
            }),
        }
    }
}

/// One balance movement, written in the same transaction as the balance change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletEntry {
    /// Entry ID
    pub id: WalletEntryId,
    /// Wallet owner
    pub organizer_id: OrganizerId,
    /// Credit or debit
    pub kind: EntryKind,
    /// Amount moved
    pub amount: Money,
    /// Payment reference (credits) or withdrawal ID (debits)
    pub reference: String,
    /// Time of the movement
    pub created_at: DateTime<Utc>,
}

/// Payout destination supplied with a withdrawal request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetails {
    /// Bank name
    pub bank_name: String,
    /// Account number
    pub account_number: String,
    /// Account holder
    pub account_name: String,
}

/// A request to move wallet funds to a bank account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    /// Withdrawal ID
    pub id: WithdrawalId,
    /// Requesting organizer
    pub organizer_id: OrganizerId,
    /// Amount requested
    pub amount: Money,
    /// Payout destination
    pub bank_details: BankDetails,
    /// Lifecycle status
    pub status: WithdrawalStatus,
    /// Admin who last moved the request
    pub processed_by: Option<OrganizerId>,
    /// Submission time
    pub created_at: DateTime<Utc>,
    /// Last status change by an admin
    pub processed_at: Option<DateTime<Utc>>,
}
