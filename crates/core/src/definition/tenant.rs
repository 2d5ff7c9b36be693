//! Tenant declarations: the chart of accounts, entry catalog, and
//! revaluation set for one tenant kind.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tally_shared::{Currency, Ident};

use super::account::AccountDefinition;
use super::entry::{EntryDefinition, MovementDefinition, Side};
use super::error::ConfigError;
use super::revaluation::RevaluationDefinition;

/// Everything declared for one tenant kind.
///
/// A tenant kind names a class of ledger owners (an `organization`, a
/// `portfolio`). Every concrete tenant of that kind shares this chart
/// of accounts and entry catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantDefinition {
    /// Tenant kind, unique within the definition.
    pub kind: Ident,
    /// Base currency all trial balances are struck in.
    pub currency: Currency,
    accounts: BTreeMap<Ident, AccountDefinition>,
    entries: BTreeMap<Ident, EntryDefinition>,
    revaluations: BTreeMap<Ident, RevaluationDefinition>,
}

impl TenantDefinition {
    /// Declares an empty tenant kind.
    #[must_use]
    pub const fn new(kind: Ident, currency: Currency) -> Self {
        Self {
            kind,
            currency,
            accounts: BTreeMap::new(),
            entries: BTreeMap::new(),
            revaluations: BTreeMap::new(),
        }
    }

    /// Adds an account declaration.
    ///
    /// Redeclaring an account with identical attributes is a no-op, so
    /// the revaluation expansion can share income and expense accounts
    /// across revaluations.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateAccount`] when the name is
    /// already taken by a declaration with different attributes.
    pub fn add_account(&mut self, account: AccountDefinition) -> Result<(), ConfigError> {
        if let Some(existing) = self.accounts.get(&account.name) {
            if *existing == account {
                return Ok(());
            }
            return Err(ConfigError::DuplicateAccount {
                tenant: self.kind.clone(),
                account: account.name,
            });
        }
        self.accounts.insert(account.name.clone(), account);
        Ok(())
    }

    /// Adds an entry declaration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateEntry`] when the code is taken,
    /// or [`ConfigError::UnknownAccount`] when a movement references an
    /// undeclared account.
    pub fn add_entry(&mut self, entry: EntryDefinition) -> Result<(), ConfigError> {
        if self.entries.contains_key(&entry.code) {
            return Err(ConfigError::DuplicateEntry {
                tenant: self.kind.clone(),
                entry: entry.code,
            });
        }
        for movement in &entry.movements {
            if !self.accounts.contains_key(&movement.account) {
                return Err(ConfigError::UnknownAccount {
                    tenant: self.kind.clone(),
                    account: movement.account.clone(),
                });
            }
        }
        self.entries.insert(entry.code.clone(), entry);
        Ok(())
    }

    /// Adds a movement leg to a declared entry.
    ///
    /// On a mirror-tracked account this registers two variants, the
    /// primary and the mirror, in one call.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the entry or account is undeclared
    /// or the leg duplicates an existing identity tuple.
    pub fn add_movement(
        &mut self,
        entry: &Ident,
        side: Side,
        account: &Ident,
        accountable: Option<Ident>,
    ) -> Result<(), ConfigError> {
        let Some(definition) = self.accounts.get(account).cloned() else {
            return Err(ConfigError::UnknownAccount {
                tenant: self.kind.clone(),
                account: account.clone(),
            });
        };
        let Some(template) = self.entries.get_mut(entry) else {
            return Err(ConfigError::UnknownEntry {
                tenant: self.kind.clone(),
                entry: entry.clone(),
            });
        };
        template.add_movement(MovementDefinition {
            side,
            account: definition.name.clone(),
            account_type: definition.account_type,
            currency: definition.currency.clone(),
            mirror: None,
            accountable: accountable.clone(),
            contra: definition.contra,
        })?;
        if let Some(mirror) = definition.mirror_currency {
            template.add_movement(MovementDefinition {
                side,
                account: definition.name,
                account_type: definition.account_type,
                currency: definition.currency,
                mirror: Some(mirror),
                accountable,
                contra: definition.contra,
            })?;
        }
        Ok(())
    }

    /// Adds a revaluation declaration. Expansion into accounts and
    /// entries happens when the definition is built.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateRevaluation`] when the name is
    /// taken.
    pub fn add_revaluation(&mut self, revaluation: RevaluationDefinition) -> Result<(), ConfigError> {
        if self.revaluations.contains_key(&revaluation.name) {
            return Err(ConfigError::DuplicateRevaluation(revaluation.name));
        }
        self.revaluations.insert(revaluation.name.clone(), revaluation);
        Ok(())
    }

    /// Looks up an account declaration by name.
    #[must_use]
    pub fn find_account(&self, name: &Ident) -> Option<&AccountDefinition> {
        self.accounts.get(name)
    }

    /// Looks up an entry declaration by code.
    #[must_use]
    pub fn find_entry(&self, code: &Ident) -> Option<&EntryDefinition> {
        self.entries.get(code)
    }

    /// Looks up a revaluation declaration by name.
    #[must_use]
    pub fn find_revaluation(&self, name: &Ident) -> Option<&RevaluationDefinition> {
        self.revaluations.get(name)
    }

    /// All declared accounts, in name order.
    pub fn accounts(&self) -> impl Iterator<Item = &AccountDefinition> {
        self.accounts.values()
    }

    /// All declared entries, in code order.
    pub fn entries(&self) -> impl Iterator<Item = &EntryDefinition> {
        self.entries.values()
    }

    /// All declared revaluations, in name order.
    pub fn revaluations(&self) -> impl Iterator<Item = &RevaluationDefinition> {
        self.revaluations.values()
    }
}
