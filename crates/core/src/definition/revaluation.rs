//! Revaluation declarations and their expansion into accounts and
//! entries.
//!
//! A revaluation names a set of mirror-tracked accounts whose
//! tenant-currency mirrors drift from the anchored value of their
//! foreign balances. Building the definition expands each declaration
//! into one income account, one expense account, and up to four
//! correction entries that the revaluation executor posts in mirror
//! mode.

use serde::{Deserialize, Serialize};
use tally_shared::{Currency, Ident};

use super::account::{AccountDefinition, AccountType};
use super::entry::{EntryDefinition, MovementDefinition, Side};
use super::error::ConfigError;
use super::tenant::TenantDefinition;

/// Whether a correction entry recognizes a gain or a loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevaluationDirection {
    /// Gain. Debits the target, credits the income account.
    Positive,
    /// Loss. Credits the target, debits the expense account.
    Negative,
}

impl RevaluationDirection {
    /// Canonical lowercase name, `positive` or `negative`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

/// One account targeted by a revaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevaluationTarget {
    /// Declared account name.
    pub account: Ident,
    /// Accountable entity kind the aggregate is split by, if any.
    pub accountable: Option<Ident>,
}

/// A declared revaluation, before expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevaluationDefinition {
    /// Revaluation name, unique within the tenant.
    pub name: Ident,
    /// Target accounts, in declaration order.
    pub targets: Vec<RevaluationTarget>,
}

impl RevaluationDefinition {
    /// Declares an empty revaluation.
    #[must_use]
    pub const fn new(name: Ident) -> Self {
        Self {
            name,
            targets: Vec::new(),
        }
    }

    /// Adds a target account. Exact re-declarations are a no-op.
    pub fn add_target(&mut self, account: Ident, accountable: Option<Ident>) {
        let target = RevaluationTarget {
            account,
            accountable,
        };
        if !self.targets.contains(&target) {
            self.targets.push(target);
        }
    }

    /// Name of the income account gains are recognized in.
    #[must_use]
    pub fn income_account(&self) -> Ident {
        self.name.prefixed("positive")
    }

    /// Name of the expense account losses are recognized in.
    #[must_use]
    pub fn expense_account(&self) -> Ident {
        self.name.prefixed("negative")
    }

    /// Document kind carried by every correction entry.
    #[must_use]
    pub fn document_kind(&self) -> Ident {
        self.name.suffixed("revaluation")
    }

    /// Code of the correction entry for one account class and
    /// direction, e.g. `positive_asset_exchange`.
    #[must_use]
    pub fn entry_code(&self, account_type: AccountType, direction: RevaluationDirection) -> Ident {
        self.name
            .prefixed(account_type.as_str())
            .prefixed(direction.as_str())
    }
}

/// Expands every revaluation declared on the tenant.
pub(super) fn expand(tenant: &mut TenantDefinition) -> Result<(), ConfigError> {
    let revaluations: Vec<RevaluationDefinition> = tenant.revaluations().cloned().collect();
    for revaluation in revaluations {
        expand_one(tenant, &revaluation)?;
    }
    Ok(())
}

fn expand_one(
    tenant: &mut TenantDefinition,
    revaluation: &RevaluationDefinition,
) -> Result<(), ConfigError> {
    let mut currency: Option<Currency> = None;
    let mut resolved: Vec<(AccountDefinition, Option<Ident>)> = Vec::new();

    for target in &revaluation.targets {
        let Some(account) = tenant.find_account(&target.account) else {
            return Err(ConfigError::UndefinedRevaluationAccount {
                account: target.account.clone(),
                revaluation: revaluation.name.clone(),
            });
        };
        if !matches!(
            account.account_type,
            AccountType::Asset | AccountType::Liability
        ) {
            return Err(ConfigError::NotAssetOrLiability {
                account: account.name.clone(),
            });
        }
        let Some(mirror) = &account.mirror_currency else {
            return Err(ConfigError::NotRevaluable {
                account: account.name.clone(),
            });
        };
        match &currency {
            None => currency = Some(mirror.clone()),
            Some(first) if first != mirror => {
                return Err(ConfigError::MixedRevaluationCurrencies {
                    revaluation: revaluation.name.clone(),
                    first: first.clone(),
                    second: mirror.clone(),
                });
            }
            Some(_) => {}
        }
        resolved.push((account.clone(), target.accountable.clone()));
    }

    let Some(currency) = currency else {
        return Err(ConfigError::MissingRevaluationAccounts {
            revaluation: revaluation.name.clone(),
        });
    };

    let income = AccountDefinition {
        name: revaluation.income_account(),
        account_type: AccountType::Income,
        currency: currency.clone(),
        mirror_currency: Some(currency.clone()),
        contra: false,
    };
    let expense = AccountDefinition {
        name: revaluation.expense_account(),
        account_type: AccountType::Expense,
        currency: currency.clone(),
        mirror_currency: Some(currency),
        contra: false,
    };
    tenant.add_account(income.clone())?;
    tenant.add_account(expense.clone())?;

    for account_type in [AccountType::Asset, AccountType::Liability] {
        let group: Vec<&(AccountDefinition, Option<Ident>)> = resolved
            .iter()
            .filter(|(account, _)| account.account_type == account_type)
            .collect();
        if group.is_empty() {
            continue;
        }
        for direction in [RevaluationDirection::Positive, RevaluationDirection::Negative] {
            let (correction, correction_side, target_side) = match direction {
                RevaluationDirection::Positive => (&income, Side::Credit, Side::Debit),
                RevaluationDirection::Negative => (&expense, Side::Debit, Side::Credit),
            };
            let mut entry = EntryDefinition::new(
                revaluation.entry_code(account_type, direction),
                revaluation.document_kind(),
            );
            entry.add_movement(mirror_movement(correction, correction_side, None))?;
            for (account, accountable) in &group {
                entry.add_movement(mirror_movement(account, target_side, accountable.clone()))?;
            }
            tenant.add_entry(entry)?;
        }
    }
    Ok(())
}

/// Builds the mirror variant of a movement on the given account.
fn mirror_movement(
    account: &AccountDefinition,
    side: Side,
    accountable: Option<Ident>,
) -> MovementDefinition {
    MovementDefinition {
        side,
        account: account.name.clone(),
        account_type: account.account_type,
        currency: account.currency.clone(),
        mirror: account.mirror_currency.clone(),
        accountable,
        contra: account.contra,
    }
}
