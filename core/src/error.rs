//! Storage error taxonomy.

use crate::state::{ParseStatusError, TransitionError};
use thiserror::Error;

/// Errors raised by [`Store`](crate::store::Store) implementations.
///
/// Conditional-update misses (a CAS that lost, a sold-out ticket type, an
/// insufficient balance) are *not* errors: they come back as outcome enums
/// on [`StoreTx`](crate::store::StoreTx). This type is reserved for genuine
/// faults and uniqueness violations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A payment with this reference already exists
    #[error("duplicate payment reference: {0}")]
    DuplicateReference(String),

    /// A unique key other than the payment reference collided
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The row a transaction expected to exist was not found
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The transition table rejected the requested status change
    #[error(transparent)]
    IllegalTransition(#[from] TransitionError),

    /// Stored data could not be decoded into a domain value
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Connection, pool or driver failure
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<ParseStatusError> for StoreError {
    fn from(err: ParseStatusError) -> Self {
        Self::Corrupt(err.to_string())
    }
}
