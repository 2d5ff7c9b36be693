//! Configuration-time error types.

use tally_shared::{Currency, Ident, IdentError, MoneyError};
use thiserror::Error;

/// Errors raised while declaring or freezing a definition.
///
/// All of these surface synchronously at configuration time; a built
/// [`super::Definition`] is internally consistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    // ========== Registry Errors ==========
    /// The tenant kind was declared twice.
    #[error("tenant {0} is already defined")]
    DuplicateTenant(Ident),

    /// An account name was redeclared with different attributes.
    #[error("account {account} is already defined for tenant {tenant}")]
    DuplicateAccount {
        /// Owning tenant kind.
        tenant: Ident,
        /// Colliding account name.
        account: Ident,
    },

    /// An entry code was declared twice.
    #[error("entry {entry} is already defined for tenant {tenant}")]
    DuplicateEntry {
        /// Owning tenant kind.
        tenant: Ident,
        /// Colliding entry code.
        entry: Ident,
    },

    /// A movement with the same identity tuple was declared twice.
    #[error("{side} movement on {account} is already defined for entry {entry}")]
    DuplicateMovement {
        /// Owning entry code.
        entry: Ident,
        /// Movement direction, `debit` or `credit`.
        side: &'static str,
        /// Account the movement posts to.
        account: Ident,
    },

    /// A revaluation name was declared twice.
    #[error("revaluation {0} is already defined")]
    DuplicateRevaluation(Ident),

    /// An entry referenced an account that was never declared.
    #[error("account {account} is not defined for tenant {tenant}")]
    UnknownAccount {
        /// Owning tenant kind.
        tenant: Ident,
        /// Missing account name.
        account: Ident,
    },

    /// A movement was added to an entry that was never declared.
    #[error("entry {entry} is not defined for tenant {tenant}")]
    UnknownEntry {
        /// Owning tenant kind.
        tenant: Ident,
        /// Missing entry code.
        entry: Ident,
    },

    // ========== Account Declaration Errors ==========
    /// The mirror currency differs from the account's own currency.
    #[error("mirror currency {mirror} must match the account currency {currency}")]
    MirrorCurrencyMismatch {
        /// Declared mirror currency.
        mirror: Currency,
        /// Declared account currency.
        currency: Currency,
    },

    /// A tenant-currency account was declared mirror-tracked.
    #[error("account {account} must be denominated in a non-tenant currency to be mirror-tracked")]
    MirrorOnTenantCurrency {
        /// Offending account name.
        account: Ident,
    },

    // ========== Revaluation Expansion Errors ==========
    /// A revaluation was declared with no target accounts.
    #[error("missing revaluation accounts for {revaluation}")]
    MissingRevaluationAccounts {
        /// Revaluation name.
        revaluation: Ident,
    },

    /// A revaluation targeted an account that was never declared.
    #[error("undefined {account} account for {revaluation} revaluation")]
    UndefinedRevaluationAccount {
        /// Missing account name.
        account: Ident,
        /// Revaluation name.
        revaluation: Ident,
    },

    /// A revaluation targeted an account that is neither asset nor liability.
    #[error("account {account} must be asset or liability to be revalued")]
    NotAssetOrLiability {
        /// Offending account name.
        account: Ident,
    },

    /// A revaluation targeted an account with no mirror tracking.
    #[error(
        "account {account} can't be revalued: only accounts with a currency other than the tenant can be revalued"
    )]
    NotRevaluable {
        /// Offending account name.
        account: Ident,
    },

    /// Targets of one revaluation span more than one currency.
    #[error("revaluation {revaluation} mixes currencies {first} and {second}; declare one revaluation per currency")]
    MixedRevaluationCurrencies {
        /// Revaluation name.
        revaluation: Ident,
        /// First currency seen.
        first: Currency,
        /// Conflicting currency.
        second: Currency,
    },

    // ========== Input Normalization ==========
    /// A name could not be normalized to canonical form.
    #[error(transparent)]
    Ident(#[from] IdentError),

    /// A currency code could not be normalized.
    #[error(transparent)]
    Currency(#[from] MoneyError),
}
