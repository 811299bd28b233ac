//! Explicit state machines.
//!
//! Every entity with a lifecycle has an enumerated status and a single table
//! of legal transitions. Stores consult [`Lifecycle::transition`] before
//! issuing a conditional update, so an illegal transition is rejected instead
//! of silently overwriting a status column.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Attempted transition not present in the entity's transition table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal {entity} transition {from} -> {to}")]
pub struct TransitionError {
    /// Entity kind (`event`, `payment`, ...)
    pub entity: &'static str,
    /// Status before the attempted transition
    pub from: &'static str,
    /// Requested status
    pub to: &'static str,
}

/// Unrecognised status string read from storage or the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {entity} status: {value}")]
pub struct ParseStatusError {
    /// Entity kind
    pub entity: &'static str,
    /// Offending value
    pub value: String,
}

/// A status enum with a table of legal transitions.
pub trait Lifecycle: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Entity name used in errors and logs.
    const ENTITY: &'static str;

    /// Whether `self -> next` appears in the transition table.
    fn can_transition_to(self, next: Self) -> bool;

    /// Canonical upper-case name.
    fn as_str(self) -> &'static str;

    /// A status with no outgoing transitions.
    fn is_terminal(self) -> bool;

    /// Validate a transition against the table.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the transition is not legal.
    fn transition(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                entity: Self::ENTITY,
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

macro_rules! status_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $entity:literal {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
        transitions { $($from:ident => [$($to:ident),*]),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl Lifecycle for $name {
            const ENTITY: &'static str = $entity;

            #[allow(unreachable_patterns)]
            fn can_transition_to(self, next: Self) -> bool {
                match self {
                    $(Self::$from => matches!(next, $(Self::$to)|*),)*
                    _ => false,
                }
            }

            fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            fn is_terminal(self) -> bool {
                [$(Self::$variant),+].iter().all(|next| !self.can_transition_to(*next))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(Lifecycle::as_str(*self))
            }
        }

        impl FromStr for $name {
            type Err = ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseStatusError {
                        entity: $entity,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

status_enum! {
    /// Event lifecycle. Monotonic: never returns to an earlier status.
    EventStatus, "event" {
        /// Created, not yet on sale
        Draft => "DRAFT",
        /// Published and selling
        Live => "LIVE",
        /// Over, sold out or closed by the organizer
        Ended => "ENDED",
    }
    transitions {
        Draft => [Live, Ended],
        Live => [Ended],
    }
}

status_enum! {
    /// Payment lifecycle. `PENDING` is the only non-terminal status.
    PaymentStatus, "payment" {
        /// Awaiting a terminal signal from the gateway
        Pending => "PENDING",
        /// Captured; ticket issued and wallet credited
        Success => "SUCCESS",
        /// Confirmed decline
        Failed => "FAILED",
    }
    transitions {
        Pending => [Success, Failed],
    }
}

status_enum! {
    /// Door-scan state of a ticket.
    ScanState, "ticket" {
        /// Not yet admitted
        Unscanned => "UNSCANNED",
        /// Admitted once
        Scanned => "SCANNED",
    }
    transitions {
        Unscanned => [Scanned],
    }
}

status_enum! {
    /// Withdrawal request lifecycle.
    WithdrawalStatus, "withdrawal" {
        /// Submitted by the organizer
        Pending => "PENDING",
        /// Approved by an admin; wallet debited
        Approved => "APPROVED",
        /// Declined by an admin; wallet untouched
        Rejected => "REJECTED",
        /// Funds sent to the organizer's bank
        Paid => "PAID",
    }
    transitions {
        Pending => [Approved, Rejected],
        Approved => [Paid],
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_event_status_is_monotonic() {
        assert!(EventStatus::Draft.can_transition_to(EventStatus::Live));
        assert!(EventStatus::Live.can_transition_to(EventStatus::Ended));
        assert!(!EventStatus::Live.can_transition_to(EventStatus::Draft));
        assert!(!EventStatus::Ended.can_transition_to(EventStatus::Live));
        assert!(EventStatus::Ended.is_terminal());
        assert!(!EventStatus::Draft.is_terminal());
    }

    #[test]
    fn test_payment_terminal_states() {
        for terminal in [PaymentStatus::Success, PaymentStatus::Failed] {
            assert!(terminal.is_terminal());
            for next in [PaymentStatus::Pending, PaymentStatus::Success, PaymentStatus::Failed] {
                assert!(terminal.transition(next).is_err());
            }
        }
        assert_eq!(
            PaymentStatus::Pending.transition(PaymentStatus::Success),
            Ok(PaymentStatus::Success)
        );
    }

    #[test]
    fn test_transition_error_names_both_ends() {
        let err = PaymentStatus::Failed
            .transition(PaymentStatus::Success)
            .unwrap_err();
        assert_eq!(err.to_string(), "illegal payment transition FAILED -> SUCCESS");
    }

    #[test]
    fn test_withdrawal_paths() {
        use WithdrawalStatus::{Approved, Paid, Pending, Rejected};
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Paid));
        assert!(!Pending.can_transition_to(Paid));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(Rejected.is_terminal());
        assert!(Paid.is_terminal());
    }

    #[test]
    fn test_parse_round_trip_and_serde_names() {
        assert_eq!("LIVE".parse::<EventStatus>(), Ok(EventStatus::Live));
        assert!("live".parse::<EventStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&ScanState::Unscanned).unwrap_or_default(),
            "\"UNSCANNED\""
        );
    }
}
