//! Closure-based configuration builders.
//!
//! Hosts declare their ledger through nested closures:
//!
//! ```
//! use tally_core::definition::{AccountSpec, Definition};
//!
//! let definition = Definition::configure(|cfg| {
//!     cfg.tenant("portfolio", "CLP", |t| {
//!         t.account(AccountSpec::asset("cash"))?;
//!         t.account(AccountSpec::liability("payable"))?;
//!         t.entry("deposit", "receipt", |e| {
//!             e.debit("cash", Some("user"))?;
//!             e.credit("payable", Some("user"))?;
//!             Ok(())
//!         })?;
//!         Ok(())
//!     })?;
//!     Ok(())
//! })
//! .unwrap();
//! assert!(definition.find_tenant(&"portfolio".parse().unwrap()).is_some());
//! ```

use std::collections::BTreeMap;

use tally_shared::{Currency, Ident};

use super::account::{AccountDefinition, AccountType};
use super::entry::{EntryDefinition, Side};
use super::error::ConfigError;
use super::revaluation::RevaluationDefinition;
use super::tenant::TenantDefinition;

/// An account declaration before normalization.
///
/// Construct with one of the class shorthands, then refine:
/// `AccountSpec::asset("bank_usd").currency("USD").mirrored()`.
#[derive(Debug, Clone)]
pub struct AccountSpec {
    name: String,
    account_type: AccountType,
    currency: Option<String>,
    mirrored: bool,
    contra: bool,
}

impl AccountSpec {
    fn with_type(name: String, account_type: AccountType) -> Self {
        Self {
            name,
            account_type,
            currency: None,
            mirrored: false,
            contra: false,
        }
    }

    /// Declares an asset account.
    pub fn asset(name: impl Into<String>) -> Self {
        Self::with_type(name.into(), AccountType::Asset)
    }

    /// Declares a liability account.
    pub fn liability(name: impl Into<String>) -> Self {
        Self::with_type(name.into(), AccountType::Liability)
    }

    /// Declares an income account.
    pub fn income(name: impl Into<String>) -> Self {
        Self::with_type(name.into(), AccountType::Income)
    }

    /// Declares an expense account.
    pub fn expense(name: impl Into<String>) -> Self {
        Self::with_type(name.into(), AccountType::Expense)
    }

    /// Declares an equity account.
    pub fn equity(name: impl Into<String>) -> Self {
        Self::with_type(name.into(), AccountType::Equity)
    }

    /// Denominates the account in a currency other than the tenant's.
    #[must_use]
    pub fn currency(mut self, code: impl Into<String>) -> Self {
        self.currency = Some(code.into());
        self
    }

    /// Keeps a tenant-currency mirror aggregate next to the account.
    /// Requires a non-tenant [`Self::currency`].
    #[must_use]
    pub fn mirrored(mut self) -> Self {
        self.mirrored = true;
        self
    }

    /// Marks the account contra: its balance carries the sign opposite
    /// to its class's normal balance.
    #[must_use]
    pub fn contra(mut self) -> Self {
        self.contra = true;
        self
    }
}

/// Builder for the whole definition, one tenant kind at a time.
#[derive(Debug, Default)]
pub struct DefinitionBuilder {
    pub(super) tenants: BTreeMap<Ident, TenantDefinition>,
}

impl DefinitionBuilder {
    /// Declares a tenant kind with its base currency and runs the
    /// tenant configuration closure.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateTenant`] for a redeclared kind,
    /// or whatever the closure raises.
    pub fn tenant(
        &mut self,
        kind: &str,
        currency: &str,
        f: impl FnOnce(&mut TenantBuilder<'_>) -> Result<(), ConfigError>,
    ) -> Result<&mut Self, ConfigError> {
        let kind = Ident::new(kind)?;
        let currency = Currency::new(currency)?;
        if self.tenants.contains_key(&kind) {
            return Err(ConfigError::DuplicateTenant(kind));
        }
        let mut tenant = TenantDefinition::new(kind.clone(), currency);
        f(&mut TenantBuilder {
            tenant: &mut tenant,
        })?;
        self.tenants.insert(kind, tenant);
        Ok(self)
    }
}

/// Builder scoped to one tenant kind.
#[derive(Debug)]
pub struct TenantBuilder<'a> {
    tenant: &'a mut TenantDefinition,
}

impl TenantBuilder<'_> {
    /// Declares an account from a spec, defaulting the currency to the
    /// tenant's.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on normalization failures, conflicting
    /// redeclarations, or invalid mirror tracking.
    pub fn account(&mut self, spec: AccountSpec) -> Result<&mut Self, ConfigError> {
        let name = Ident::new(&spec.name)?;
        let currency = match spec.currency {
            Some(code) => Currency::new(&code)?,
            None => self.tenant.currency.clone(),
        };
        let mirror_currency = spec.mirrored.then(|| currency.clone());
        let account = AccountDefinition::new(
            name,
            spec.account_type,
            currency,
            mirror_currency,
            spec.contra,
            &self.tenant.currency,
        )?;
        self.tenant.add_account(account)?;
        Ok(self)
    }

    /// Declares an entry template and runs the movement closure.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for duplicate codes or whatever the
    /// closure raises.
    pub fn entry(
        &mut self,
        code: &str,
        document: &str,
        f: impl FnOnce(&mut EntryBuilder<'_>) -> Result<(), ConfigError>,
    ) -> Result<&mut Self, ConfigError> {
        let code = Ident::new(code)?;
        let document = Ident::new(document)?;
        self.tenant
            .add_entry(EntryDefinition::new(code.clone(), document))?;
        f(&mut EntryBuilder {
            tenant: self.tenant,
            code,
        })?;
        Ok(self)
    }

    /// Declares a revaluation and runs the target closure. Expansion
    /// into accounts and entries happens at build time.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for duplicate names or whatever the
    /// closure raises.
    pub fn revaluation(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut RevaluationBuilder) -> Result<(), ConfigError>,
    ) -> Result<&mut Self, ConfigError> {
        let mut builder = RevaluationBuilder {
            definition: RevaluationDefinition::new(Ident::new(name)?),
        };
        f(&mut builder)?;
        self.tenant.add_revaluation(builder.definition)?;
        Ok(self)
    }
}

/// Builder scoped to one entry template.
#[derive(Debug)]
pub struct EntryBuilder<'a> {
    tenant: &'a mut TenantDefinition,
    code: Ident,
}

impl EntryBuilder<'_> {
    /// Declares a debit leg on the given account, split by an
    /// accountable entity kind when one is given.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for undeclared accounts or duplicate
    /// legs.
    pub fn debit(
        &mut self,
        account: &str,
        accountable: Option<&str>,
    ) -> Result<&mut Self, ConfigError> {
        self.movement(Side::Debit, account, accountable)
    }

    /// Declares a credit leg on the given account.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for undeclared accounts or duplicate
    /// legs.
    pub fn credit(
        &mut self,
        account: &str,
        accountable: Option<&str>,
    ) -> Result<&mut Self, ConfigError> {
        self.movement(Side::Credit, account, accountable)
    }

    fn movement(
        &mut self,
        side: Side,
        account: &str,
        accountable: Option<&str>,
    ) -> Result<&mut Self, ConfigError> {
        let account = Ident::new(account)?;
        let accountable = accountable.map(Ident::new).transpose()?;
        self.tenant
            .add_movement(&self.code, side, &account, accountable)?;
        Ok(self)
    }
}

/// Builder scoped to one revaluation declaration.
#[derive(Debug)]
pub struct RevaluationBuilder {
    definition: RevaluationDefinition,
}

impl RevaluationBuilder {
    /// Targets an account, split by an accountable entity kind when one
    /// is given.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Ident`] on normalization failures.
    pub fn account(
        &mut self,
        account: &str,
        accountable: Option<&str>,
    ) -> Result<&mut Self, ConfigError> {
        let account = Ident::new(account)?;
        let accountable = accountable.map(Ident::new).transpose()?;
        self.definition.add_target(account, accountable);
        Ok(self)
    }
}
