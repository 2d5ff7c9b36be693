//! The frozen definition registry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tally_shared::Ident;

use super::builder::DefinitionBuilder;
use super::error::ConfigError;
use super::revaluation;
use super::tenant::TenantDefinition;

/// The complete, immutable ledger definition.
///
/// Built once through [`Definition::configure`] and then shared (hosts
/// typically wrap it in an `Arc` and hand it to every ledger). There is
/// no way to mutate a built definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    tenants: BTreeMap<Ident, TenantDefinition>,
}

impl Definition {
    /// Runs the configuration closure and freezes the result.
    ///
    /// Freezing expands every declared revaluation into its income and
    /// expense accounts and correction entries.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for any declaration or expansion
    /// failure; a returned definition is internally consistent.
    pub fn configure(
        f: impl FnOnce(&mut DefinitionBuilder) -> Result<(), ConfigError>,
    ) -> Result<Self, ConfigError> {
        let mut builder = DefinitionBuilder::default();
        f(&mut builder)?;
        let mut tenants = builder.tenants;
        for tenant in tenants.values_mut() {
            revaluation::expand(tenant)?;
        }
        Ok(Self { tenants })
    }

    /// Looks up a tenant kind.
    #[must_use]
    pub fn find_tenant(&self, kind: &Ident) -> Option<&TenantDefinition> {
        self.tenants.get(kind)
    }

    /// All declared tenant kinds, in order.
    pub fn tenants(&self) -> impl Iterator<Item = &TenantDefinition> {
        self.tenants.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::builder::AccountSpec;

    fn ident(raw: &str) -> Ident {
        Ident::new(raw).unwrap()
    }

    #[test]
    fn configure_builds_and_expands() {
        let definition = Definition::configure(|cfg| {
            cfg.tenant("portfolio", "CLP", |t| {
                t.account(AccountSpec::asset("bank_usd").currency("USD").mirrored())?;
                t.entry("deposit", "receipt", |e| {
                    e.debit("bank_usd", Some("user"))?;
                    Ok(())
                })?;
                t.revaluation("exchange", |r| {
                    r.account("bank_usd", Some("user"))?;
                    Ok(())
                })?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

        let tenant = definition.find_tenant(&ident("portfolio")).unwrap();
        assert!(tenant.find_account(&ident("positive_exchange")).is_some());
        assert!(tenant.find_account(&ident("negative_exchange")).is_some());
        assert!(tenant.find_entry(&ident("positive_asset_exchange")).is_some());
        assert!(definition.find_tenant(&ident("fund")).is_none());
    }

    #[test]
    fn expansion_failures_surface_from_configure() {
        let err = Definition::configure(|cfg| {
            cfg.tenant("portfolio", "CLP", |t| {
                t.revaluation("exchange", |r| {
                    r.account("ghost", None)?;
                    Ok(())
                })?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "undefined ghost account for exchange revaluation"
        );
    }
}
