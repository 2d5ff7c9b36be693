//! Lock protocol error types.

use thiserror::Error;

use crate::execution::AccountKey;

/// Errors raised by the account locking protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The caller already holds an open transaction; locked operations
    /// own their transaction end to end.
    #[error("must be outermost transaction")]
    MustBeOutermostTransaction,

    /// A nested operation asked for an aggregate the session never
    /// locked.
    #[error("No lock held for account {0}")]
    NotHeld(AccountKey),

    /// Row-lock waits kept timing out until the retry budget ran out.
    #[error("lock wait timeout after {attempts} attempts")]
    WaitTimeout {
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// An aggregate row was still missing after it was created and the
    /// acquisition was retried. Indicates a broken storage backend.
    #[error("account aggregate still missing after creation retry")]
    Disaster,
}
