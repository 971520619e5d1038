//! Error taxonomies for the store port and the purchase engine.

use crate::types::{ParseEnumError, ShowId};
use thiserror::Error;

/// Errors raised by a [`crate::store::TicketStore`] implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Connection, query or transaction failure.
    #[error("Database error: {0}")]
    Database(String),

    /// A unique constraint rejected the write (idempotency key, live ticket).
    ///
    /// Stores report this without poisoning the open transaction.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// A stored row could not be decoded into a domain value.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<ParseEnumError> for StoreError {
    fn from(err: ParseEnumError) -> Self {
        Self::Corrupt(err.to_string())
    }
}

/// Errors surfaced by the purchase engine.
///
/// A repeated request under a known idempotency key is not an error: the
/// engine returns the first result flagged as a replay.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed or missing input, rejected before the store is touched.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Unknown show, purchase or customer reference.
    #[error("{resource} with id {id} not found")]
    NotFound {
        /// Kind of record that was looked up.
        resource: &'static str,
        /// The identifier that missed.
        id: String,
    },

    /// At least one requested seat could not be claimed; nothing was applied.
    #[error("Seat conflict on show {show_id}: claimed {claimed} of {requested} seats")]
    Conflict {
        /// Show the claim ran against.
        show_id: ShowId,
        /// Seats requested in the claim.
        requested: usize,
        /// Seats the store actually moved before rollback.
        claimed: u64,
    },

    /// Transaction or connectivity failure; nothing was committed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Shorthand for [`EngineError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for [`EngineError::NotFound`].
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Whether a concurrent request under the same idempotency key may have
    /// caused this failure, in which case the ledger is worth re-reading.
    #[must_use]
    pub const fn may_be_key_race(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::Store(StoreError::DuplicateKey(_))
        )
    }
}
