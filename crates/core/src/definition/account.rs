//! Account declarations.

use serde::{Deserialize, Serialize};
use tally_shared::{Currency, Ident};

use super::error::ConfigError;

/// The five fundamental account classes of double-entry bookkeeping.
///
/// An account's class fixes its normal balance: debit-normal accounts
/// grow when debited, credit-normal accounts grow when credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Debit-normal. Resources owned by the tenant.
    Asset,
    /// Credit-normal. Obligations owed by the tenant.
    Liability,
    /// Credit-normal. Revenue earned by the tenant.
    Income,
    /// Debit-normal. Costs incurred by the tenant.
    Expense,
    /// Credit-normal. Residual claim on the tenant.
    Equity,
}

impl AccountType {
    /// Whether debits increase the balance of this account class.
    #[must_use]
    pub const fn is_debit_normal(self) -> bool {
        matches!(self, Self::Asset | Self::Expense)
    }

    /// Canonical lowercase name of the class.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Liability => "liability",
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Equity => "equity",
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared account: the template every concrete aggregate of this
/// name is stamped from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDefinition {
    /// Canonical account name, unique within the tenant.
    pub name: Ident,
    /// Fundamental class, fixes the normal balance.
    pub account_type: AccountType,
    /// Denomination currency. Defaults to the tenant currency.
    pub currency: Currency,
    /// Present when the account keeps a tenant-currency mirror.
    /// Always equal to [`Self::currency`] when set.
    pub mirror_currency: Option<Currency>,
    /// Contra accounts carry the opposite of their class's normal
    /// balance (accumulated depreciation, sales discounts).
    pub contra: bool,
}

impl AccountDefinition {
    /// Declares an account in the given tenant currency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when mirror tracking is requested for an
    /// account denominated in the tenant currency, or when the mirror
    /// currency does not match the account currency.
    pub fn new(
        name: Ident,
        account_type: AccountType,
        currency: Currency,
        mirror_currency: Option<Currency>,
        contra: bool,
        tenant_currency: &Currency,
    ) -> Result<Self, ConfigError> {
        if let Some(mirror) = &mirror_currency {
            if mirror != &currency {
                return Err(ConfigError::MirrorCurrencyMismatch {
                    mirror: mirror.clone(),
                    currency,
                });
            }
            if &currency == tenant_currency {
                return Err(ConfigError::MirrorOnTenantCurrency { account: name });
            }
        }
        Ok(Self {
            name,
            account_type,
            currency,
            mirror_currency,
            contra,
        })
    }

    /// Whether this account keeps a tenant-currency mirror aggregate.
    #[must_use]
    pub const fn is_mirror_tracked(&self) -> bool {
        self.mirror_currency.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd() -> Currency {
        Currency::new("USD").unwrap()
    }

    fn clp() -> Currency {
        Currency::new("CLP").unwrap()
    }

    #[test]
    fn debit_normal_classes() {
        assert!(AccountType::Asset.is_debit_normal());
        assert!(AccountType::Expense.is_debit_normal());
        assert!(!AccountType::Liability.is_debit_normal());
        assert!(!AccountType::Income.is_debit_normal());
        assert!(!AccountType::Equity.is_debit_normal());
    }

    #[test]
    fn plain_account_has_no_mirror() {
        let def = AccountDefinition::new(
            Ident::new("cash").unwrap(),
            AccountType::Asset,
            clp(),
            None,
            false,
            &clp(),
        )
        .unwrap();
        assert!(!def.is_mirror_tracked());
        assert_eq!(def.currency, clp());
    }

    #[test]
    fn mirror_requires_matching_currency() {
        let err = AccountDefinition::new(
            Ident::new("bank_usd").unwrap(),
            AccountType::Asset,
            usd(),
            Some(clp()),
            false,
            &clp(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MirrorCurrencyMismatch { .. }));
    }

    #[test]
    fn mirror_rejected_on_tenant_currency() {
        let err = AccountDefinition::new(
            Ident::new("cash").unwrap(),
            AccountType::Asset,
            clp(),
            Some(clp()),
            false,
            &clp(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MirrorOnTenantCurrency { .. }));
    }

    #[test]
    fn foreign_mirror_accepted() {
        let def = AccountDefinition::new(
            Ident::new("bank_usd").unwrap(),
            AccountType::Asset,
            usd(),
            Some(usd()),
            false,
            &clp(),
        )
        .unwrap();
        assert!(def.is_mirror_tracked());
    }
}
