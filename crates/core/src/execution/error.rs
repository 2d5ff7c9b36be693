//! Runtime error umbrella for entry execution.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tally_shared::{Currency, Ident, IdentError, MoneyError};
use thiserror::Error;

use crate::definition::Side;
use crate::locking::LockError;
use crate::store::{AsStoreError, StoreError};

/// Errors raised while resolving or posting an entry execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    // ========== Resolution Errors ==========
    /// The tenant kind was never declared.
    #[error("tenant {0} is not defined")]
    UnknownTenant(Ident),

    /// The entry code was never declared for the tenant.
    #[error("entry {entry} is not defined for tenant {tenant}")]
    UnknownEntry {
        /// Tenant kind of the execution.
        tenant: Ident,
        /// Missing entry code.
        entry: Ident,
    },

    /// The account name was never declared for the tenant.
    #[error("account {account} is not defined for tenant {tenant}")]
    UnknownAccount {
        /// Tenant kind of the execution.
        tenant: Ident,
        /// Missing account name.
        account: Ident,
    },

    /// The document reference does not carry the entry's declared kind.
    #[error("document {found} can't anchor entry {entry}: expected a {expected}")]
    WrongDocumentKind {
        /// Entry code of the execution.
        entry: Ident,
        /// Declared document kind.
        expected: Ident,
        /// Kind actually supplied.
        found: Ident,
    },

    /// No declared movement matches the supplied leg.
    #[error("invalid entry account {account} with accountable {accountable} in {side}s")]
    InvalidMovement {
        /// Account name of the rejected leg.
        account: Ident,
        /// Accountable kind of the rejected leg, or `none`.
        accountable: String,
        /// Direction of the rejected leg.
        side: Side,
    },

    /// A movement amount was zero or negative.
    #[error("movement amount {amount} on {account} must be positive")]
    NonPositiveAmount {
        /// Account name of the rejected leg.
        account: Ident,
        /// Offending amount.
        amount: Decimal,
    },

    /// A movement amount carried the wrong currency.
    #[error("movement on {account} must be denominated in {expected}, got {found}")]
    WrongDenomination {
        /// Account name of the rejected leg.
        account: Ident,
        /// Currency the leg must be denominated in.
        expected: Currency,
        /// Currency actually supplied.
        found: Currency,
    },

    /// The conversion anchor was not denominated in the tenant currency.
    #[error("conversion anchor must be denominated in the tenant currency {expected}, got {found}")]
    AnchorDenomination {
        /// Tenant base currency.
        expected: Currency,
        /// Currency actually supplied.
        found: Currency,
    },

    // ========== Posting Errors ==========
    /// The execution carried no movements at all.
    #[error("can't execute entry without movements")]
    EmptyMovements,

    /// Debits and credits did not cancel.
    #[error("trial balance must be zero")]
    UnbalancedEntry,

    /// An adjustment was dated before the rows it adjusts.
    #[error("adjustment date {new} must be greater than old entry date {old}")]
    StaleAdjustment {
        /// Timestamp of the attempted adjustment.
        new: DateTime<Utc>,
        /// Timestamp of the latest persisted row.
        old: DateTime<Utc>,
    },

    /// The revaluation name was never declared for the tenant.
    #[error("revaluation {revaluation} is not defined for tenant {tenant}")]
    UnknownRevaluation {
        /// Tenant kind of the execution.
        tenant: Ident,
        /// Missing revaluation name.
        revaluation: Ident,
    },

    // ========== Input Normalization ==========
    /// An account name could not be normalized to canonical form.
    #[error(transparent)]
    Ident(#[from] IdentError),

    /// Monetary arithmetic failed, e.g. legs in different currencies.
    #[error(transparent)]
    Money(#[from] MoneyError),

    // ========== Infrastructure ==========
    /// Lock protocol failure.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ExecutionError {
    /// Builds the invalid-movement error, rendering a missing
    /// accountable kind as `none`.
    #[must_use]
    pub fn invalid_movement(account: Ident, accountable: Option<&Ident>, side: Side) -> Self {
        Self::InvalidMovement {
            account,
            accountable: accountable.map_or_else(|| "none".to_owned(), ToString::to_string),
            side,
        }
    }
}

impl AsStoreError for ExecutionError {
    fn as_store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store(error) => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_movement_renders_missing_accountable() {
        let err = ExecutionError::invalid_movement(
            Ident::new("cash").unwrap(),
            None,
            Side::Debit,
        );
        assert_eq!(
            err.to_string(),
            "invalid entry account cash with accountable none in debits"
        );
    }

    #[test]
    fn invalid_movement_renders_accountable_kind() {
        let user = Ident::new("user").unwrap();
        let err = ExecutionError::invalid_movement(
            Ident::new("payable").unwrap(),
            Some(&user),
            Side::Credit,
        );
        assert_eq!(
            err.to_string(),
            "invalid entry account payable with accountable user in credits"
        );
    }

    #[test]
    fn store_errors_are_classifiable_through_the_umbrella() {
        let wrapped = ExecutionError::from(StoreError::Deadlock);
        assert!(wrapped.as_store_error().is_some_and(StoreError::is_retryable));
        assert!(ExecutionError::EmptyMovements.as_store_error().is_none());
    }
}
