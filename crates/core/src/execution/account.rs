//! The executable account: the key every aggregate and line is filed
//! under.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::{Currency, EntityRef, Ident};

use crate::definition::AccountType;
use crate::store::{LedgerStore, StoreError};

/// Identity of one balance aggregate.
///
/// The derived `Ord` is the lexicographic order of the fields and is
/// the global lock order: every caller that locks several aggregates
/// sorts them by this order first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountKey {
    /// Concrete tenant the aggregate belongs to.
    pub tenant: EntityRef,
    /// Concrete accountable entity the aggregate is split by, if the
    /// movement was declared with an accountable kind.
    pub accountable: Option<EntityRef>,
    /// Declared account name.
    pub name: Ident,
    /// Account class, fixes the normal balance.
    pub account_type: AccountType,
    /// Denomination currency of the account.
    pub currency: Currency,
    /// `Some` marks the tenant-currency mirror aggregate.
    pub mirror_currency: Option<Currency>,
}

impl AccountKey {
    /// The balance implied by the lines alone: the signed sum of every
    /// line filed under this key. Equal to the stored aggregate balance
    /// whenever the store is consistent.
    ///
    /// # Errors
    ///
    /// Propagates the store's read error.
    pub fn derived_balance<S: LedgerStore>(&self, store: &S) -> Result<Decimal, StoreError> {
        store.line_sum(self)
    }

    /// The same aggregate identity with the mirror tag replaced.
    #[must_use]
    pub fn with_mirror(&self, mirror_currency: Option<Currency>) -> Self {
        Self {
            mirror_currency,
            ..self.clone()
        }
    }
}

impl std::fmt::Display for AccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.tenant, self.account_type, self.name)?;
        if let Some(accountable) = &self.accountable {
            write!(f, " for {accountable}")?;
        }
        write!(f, " in {}", self.currency)?;
        if let Some(mirror) = &self.mirror_currency {
            write!(f, " mirroring {mirror}")?;
        }
        Ok(())
    }
}
