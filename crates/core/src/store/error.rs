//! Storage backend error classification.

use thiserror::Error;

/// Error reported by a storage backend.
///
/// The engine never matches on backend message text; backends classify their
/// driver errors into these variants and the locking protocol decides what is
/// retryable. Anything a backend cannot classify belongs in [`Self::Other`]
/// and propagates as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected an insert.
    #[error("duplicate key on {constraint}")]
    DuplicateKey {
        /// Name of the violated constraint or index.
        constraint: String,
    },

    /// The backend chose this transaction as a deadlock victim.
    #[error("deadlock detected")]
    Deadlock,

    /// The backend was too busy to take the required locks.
    #[error("store busy: {0}")]
    Busy(String),

    /// A row-lock wait exceeded the backend's configured timeout.
    #[error("lock wait timeout exceeded")]
    LockWaitTimeout,

    /// The transaction was already committed or rolled back.
    #[error("transaction is no longer active")]
    TransactionClosed,

    /// Any other backend failure.
    #[error("store error: {0}")]
    Other(String),
}

impl StoreError {
    /// Builds a duplicate-key error for a named constraint.
    #[must_use]
    pub fn duplicate_key(constraint: impl Into<String>) -> Self {
        Self::DuplicateKey {
            constraint: constraint.into(),
        }
    }

    /// True for uniqueness violations.
    #[must_use]
    pub const fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }

    /// True when the backend aborted this transaction to break a deadlock.
    #[must_use]
    pub const fn is_deadlock(&self) -> bool {
        matches!(self, Self::Deadlock | Self::Busy(_))
    }

    /// True when a row-lock wait timed out.
    #[must_use]
    pub const fn is_lock_wait_timeout(&self) -> bool {
        matches!(self, Self::LockWaitTimeout)
    }

    /// True for conditions that clear up when the whole operation is retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.is_deadlock() || self.is_lock_wait_timeout()
    }
}

/// Exposes the store error inside a wrapping error type, if any.
///
/// The retry layer classifies failures of a whole locked operation
/// without knowing the caller's error enum; wrappers point it at the
/// embedded [`StoreError`].
pub trait AsStoreError {
    /// The embedded store error, when this failure wraps one.
    fn as_store_error(&self) -> Option<&StoreError>;
}

impl AsStoreError for StoreError {
    fn as_store_error(&self) -> Option<&StoreError> {
        Some(self)
    }
}
