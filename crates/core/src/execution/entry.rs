//! Entry resolution: from host input to validated, postable views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_shared::{Currency, EntityRef, Ident, Money};

use crate::definition::{EntryDefinition, Side, TenantDefinition};
use crate::store::EntryKey;

use super::account::AccountKey;
use super::error::ExecutionError;
use super::movement::ResolvedMovement;

/// Host input identifying one entry execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryParams {
    /// Concrete tenant the entry belongs to.
    pub tenant: EntityRef,
    /// Declared entry code to execute.
    pub entry: Ident,
    /// Host document the execution is anchored to. Re-executing with
    /// the same document adjusts instead of duplicating.
    pub document: EntityRef,
    /// Posting timestamp.
    pub posted_at: DateTime<Utc>,
    /// Tenant-currency price of one unit of the entry's currency.
    /// Present on executions that keep mirror aggregates current.
    pub conversion_anchor: Option<Money>,
}

impl EntryParams {
    /// Builds params for a plain execution.
    #[must_use]
    pub const fn new(
        tenant: EntityRef,
        entry: Ident,
        document: EntityRef,
        posted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant,
            entry,
            document,
            posted_at,
            conversion_anchor: None,
        }
    }

    /// Attaches a conversion anchor; mirror-tracked legs will post a
    /// converted companion entry.
    #[must_use]
    pub fn with_anchor(mut self, anchor: Money) -> Self {
        self.conversion_anchor = Some(anchor);
        self
    }
}

/// Collects and validates the movements of one execution.
///
/// Hosts receive this in the `execute` closure; each leg is validated
/// against the entry's declared movements as it is added, so a typo
/// fails at the call site that made it.
#[derive(Debug)]
pub struct MovementsBuilder<'a> {
    tenant: &'a TenantDefinition,
    entry: &'a EntryDefinition,
    tenant_ref: &'a EntityRef,
    mirror: bool,
    movements: Vec<ResolvedMovement>,
}

impl<'a> MovementsBuilder<'a> {
    pub(crate) const fn new(
        tenant: &'a TenantDefinition,
        entry: &'a EntryDefinition,
        tenant_ref: &'a EntityRef,
        mirror: bool,
    ) -> Self {
        Self {
            tenant,
            entry,
            tenant_ref,
            mirror,
            movements: Vec::new(),
        }
    }

    /// Adds a debit leg.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] when no declared movement matches or
    /// the amount is non-positive or wrongly denominated.
    pub fn debit(
        &mut self,
        account: &str,
        accountable: Option<EntityRef>,
        amount: Money,
    ) -> Result<&mut Self, ExecutionError> {
        self.movement(Side::Debit, account, accountable, amount)
    }

    /// Adds a credit leg.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] when no declared movement matches or
    /// the amount is non-positive or wrongly denominated.
    pub fn credit(
        &mut self,
        account: &str,
        accountable: Option<EntityRef>,
        amount: Money,
    ) -> Result<&mut Self, ExecutionError> {
        self.movement(Side::Credit, account, accountable, amount)
    }

    fn movement(
        &mut self,
        side: Side,
        account: &str,
        accountable: Option<EntityRef>,
        amount: Money,
    ) -> Result<&mut Self, ExecutionError> {
        let account = Ident::new(account)?;
        let kind = accountable.as_ref().map(|entity| entity.kind.clone());
        let Some(definition) = self
            .entry
            .find_movement(side, &account, self.mirror, kind.as_ref())
        else {
            return Err(ExecutionError::invalid_movement(account, kind.as_ref(), side));
        };
        let expected = if self.mirror {
            &self.tenant.currency
        } else {
            &definition.currency
        };
        if amount.currency != *expected {
            return Err(ExecutionError::WrongDenomination {
                account,
                expected: expected.clone(),
                found: amount.currency,
            });
        }
        if !amount.is_positive() {
            return Err(ExecutionError::NonPositiveAmount {
                account,
                amount: amount.amount,
            });
        }
        let mirror_tracked =
            self.mirror || self.entry.find_movement(side, &account, true, kind.as_ref()).is_some();
        self.movements.push(ResolvedMovement {
            key: AccountKey {
                tenant: self.tenant_ref.clone(),
                accountable,
                name: definition.account.clone(),
                account_type: definition.account_type,
                currency: definition.currency.clone(),
                mirror_currency: definition.mirror.clone(),
            },
            side,
            amount: amount.amount,
            denomination: expected.clone(),
            contra: definition.contra,
            mirror_tracked,
        });
        Ok(self)
    }

    pub(crate) fn into_movements(self) -> Vec<ResolvedMovement> {
        self.movements
    }
}

/// One postable entry: a header key plus its validated movements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryView {
    /// Header key the rows of this view are filed under.
    pub key: EntryKey,
    /// Posting timestamp.
    pub posted_at: DateTime<Utc>,
    /// Anchor justifying the amounts, on mirror views only.
    pub conversion_anchor: Option<Money>,
    /// Validated movements, in input order.
    pub movements: Vec<ResolvedMovement>,
}

impl EntryView {
    /// Aggregate keys this view posts to.
    pub fn account_keys(&self) -> impl Iterator<Item = &AccountKey> {
        self.movements.iter().map(|movement| &movement.key)
    }

    /// Verifies debits equal credits in one currency.
    pub(crate) fn check_balanced(&self) -> Result<(), ExecutionError> {
        let mut total: Option<Money> = None;
        for movement in &self.movements {
            let signed = movement.trial_money();
            total = Some(match total {
                None => signed,
                Some(total) => total.checked_add(&signed)?,
            });
        }
        match total {
            Some(total) if !total.is_zero() => Err(ExecutionError::UnbalancedEntry),
            _ => Ok(()),
        }
    }
}

/// A fully validated execution: the primary view plus, on anchored
/// executions touching mirror-tracked accounts, the converted mirror
/// companion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEntry {
    /// Postable views, primary first.
    pub views: Vec<EntryView>,
}

impl ResolvedEntry {
    /// Assembles the views of a primary execution.
    pub(crate) fn assemble(
        params: &EntryParams,
        movements: Vec<ResolvedMovement>,
    ) -> Result<Self, ExecutionError> {
        if movements.is_empty() {
            return Err(ExecutionError::EmptyMovements);
        }
        let primary = EntryView {
            key: EntryKey {
                tenant: params.tenant.clone(),
                document: params.document.clone(),
                code: params.entry.clone(),
                mirror_currency: None,
            },
            posted_at: params.posted_at,
            conversion_anchor: None,
            movements,
        };
        primary.check_balanced()?;

        let mut views = vec![primary];
        if let Some(anchor) = &params.conversion_anchor {
            if let Some(mirror) = Self::mirror_companion(params, &views[0], anchor)? {
                views.push(mirror);
            }
        }
        Ok(Self { views })
    }

    /// Assembles the single view of a mirror-mode execution, used by
    /// the revaluation executor.
    pub(crate) fn assemble_mirror(
        params: &EntryParams,
        mirror_currency: Currency,
        movements: Vec<ResolvedMovement>,
    ) -> Result<Self, ExecutionError> {
        if movements.is_empty() {
            return Err(ExecutionError::EmptyMovements);
        }
        let view = EntryView {
            key: EntryKey {
                tenant: params.tenant.clone(),
                document: params.document.clone(),
                code: params.entry.clone(),
                mirror_currency: Some(mirror_currency),
            },
            posted_at: params.posted_at,
            conversion_anchor: params.conversion_anchor.clone(),
            movements,
        };
        view.check_balanced()?;
        Ok(Self { views: vec![view] })
    }

    fn mirror_companion(
        params: &EntryParams,
        primary: &EntryView,
        anchor: &Money,
    ) -> Result<Option<EntryView>, ExecutionError> {
        let mut mirror_currency: Option<Currency> = None;
        let mut mirrored = Vec::new();
        for movement in primary
            .movements
            .iter()
            .filter(|movement| movement.has_mirror_companion())
        {
            mirror_currency.get_or_insert_with(|| movement.key.currency.clone());
            let converted =
                Money::new(movement.amount, movement.key.currency.clone()).convert_with(anchor);
            mirrored.push(ResolvedMovement {
                key: movement.key.with_mirror(Some(movement.key.currency.clone())),
                side: movement.side,
                amount: converted.amount,
                denomination: converted.currency,
                contra: movement.contra,
                mirror_tracked: true,
            });
        }
        let Some(mirror_currency) = mirror_currency else {
            return Ok(None);
        };
        let view = EntryView {
            key: EntryKey {
                tenant: params.tenant.clone(),
                document: params.document.clone(),
                code: params.entry.clone(),
                mirror_currency: Some(mirror_currency),
            },
            posted_at: params.posted_at,
            conversion_anchor: Some(anchor.clone()),
            movements: mirrored,
        };
        view.check_balanced()?;
        Ok(Some(view))
    }

    /// Every aggregate key any view posts to.
    pub fn account_keys(&self) -> impl Iterator<Item = &AccountKey> {
        self.views.iter().flat_map(EntryView::account_keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{AccountSpec, Definition};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn definition() -> Definition {
        Definition::configure(|cfg| {
            cfg.tenant("portfolio", "CLP", |t| {
                t.account(AccountSpec::asset("cash"))?;
                t.account(AccountSpec::liability("payable"))?;
                t.account(AccountSpec::asset("bank_usd").currency("USD").mirrored())?;
                t.account(AccountSpec::income("fees_usd").currency("USD").mirrored())?;
                t.entry("deposit", "receipt", |e| {
                    e.debit("cash", Some("user"))?;
                    e.credit("payable", Some("user"))?;
                    Ok(())
                })?;
                t.entry("usd_interest", "statement", |e| {
                    e.debit("bank_usd", None)?;
                    e.credit("fees_usd", None)?;
                    Ok(())
                })?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap()
    }

    fn portfolio() -> EntityRef {
        EntityRef::new(Ident::new("portfolio").unwrap(), Uuid::from_u128(7))
    }

    fn user() -> EntityRef {
        EntityRef::new(Ident::new("user").unwrap(), Uuid::from_u128(9))
    }

    fn clp(amount: Decimal) -> Money {
        Money::new(amount, Currency::new("CLP").unwrap())
    }

    fn usd(amount: Decimal) -> Money {
        Money::new(amount, Currency::new("USD").unwrap())
    }

    fn params(entry: &str, document_kind: &str) -> EntryParams {
        EntryParams::new(
            portfolio(),
            Ident::new(entry).unwrap(),
            EntityRef::new(Ident::new(document_kind).unwrap(), Uuid::from_u128(20)),
            Utc::now(),
        )
    }

    fn builder_for<'a>(
        definition: &'a Definition,
        entry: &str,
        mirror: bool,
        tenant_ref: &'a EntityRef,
    ) -> MovementsBuilder<'a> {
        let tenant = definition.find_tenant(&Ident::new("portfolio").unwrap()).unwrap();
        let entry = tenant.find_entry(&Ident::new(entry).unwrap()).unwrap();
        MovementsBuilder::new(tenant, entry, tenant_ref, mirror)
    }

    #[test]
    fn unmatched_leg_is_rejected_eagerly() {
        let definition = definition();
        let tenant_ref = portfolio();
        let mut builder = builder_for(&definition, "deposit", false, &tenant_ref);
        let err = builder.debit("cash", None, clp(dec!(100))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid entry account cash with accountable none in debits"
        );
    }

    #[test]
    fn wrong_denomination_is_rejected() {
        let definition = definition();
        let tenant_ref = portfolio();
        let mut builder = builder_for(&definition, "deposit", false, &tenant_ref);
        let err = builder
            .debit("cash", Some(user()), usd(dec!(100)))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "movement on cash must be denominated in CLP, got USD"
        );
    }

    #[test]
    fn zero_amount_is_rejected() {
        let definition = definition();
        let tenant_ref = portfolio();
        let mut builder = builder_for(&definition, "deposit", false, &tenant_ref);
        let err = builder
            .credit("payable", Some(user()), clp(dec!(0)))
            .unwrap_err();
        assert!(matches!(err, ExecutionError::NonPositiveAmount { .. }));
    }

    #[test]
    fn empty_movements_rejected_at_assembly() {
        let err = ResolvedEntry::assemble(&params("deposit", "receipt"), Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), "can't execute entry without movements");
    }

    #[test]
    fn unbalanced_movements_rejected_at_assembly() {
        let definition = definition();
        let tenant_ref = portfolio();
        let mut builder = builder_for(&definition, "deposit", false, &tenant_ref);
        builder.debit("cash", Some(user()), clp(dec!(1000))).unwrap();
        builder.credit("payable", Some(user()), clp(dec!(700))).unwrap();
        let err =
            ResolvedEntry::assemble(&params("deposit", "receipt"), builder.into_movements())
                .unwrap_err();
        assert_eq!(err.to_string(), "trial balance must be zero");
    }

    #[test]
    fn balanced_resolution_yields_primary_view() {
        let definition = definition();
        let tenant_ref = portfolio();
        let mut builder = builder_for(&definition, "deposit", false, &tenant_ref);
        builder.debit("cash", Some(user()), clp(dec!(1000))).unwrap();
        builder.credit("payable", Some(user()), clp(dec!(1000))).unwrap();
        let resolved =
            ResolvedEntry::assemble(&params("deposit", "receipt"), builder.into_movements())
                .unwrap();
        assert_eq!(resolved.views.len(), 1);
        let view = &resolved.views[0];
        assert_eq!(view.key.mirror_currency, None);
        assert_eq!(view.movements[0].signed_amount(), dec!(1000));
        assert_eq!(view.movements[1].signed_amount(), dec!(1000));
    }

    #[test]
    fn anchored_execution_grows_a_mirror_companion() {
        let definition = definition();
        let tenant_ref = portfolio();
        let mut builder = builder_for(&definition, "usd_interest", false, &tenant_ref);
        builder.debit("bank_usd", None, usd(dec!(100))).unwrap();
        builder.credit("fees_usd", None, usd(dec!(100))).unwrap();
        let params = params("usd_interest", "statement").with_anchor(clp(dec!(950)));
        let resolved = ResolvedEntry::assemble(&params, builder.into_movements()).unwrap();

        assert_eq!(resolved.views.len(), 2);
        let mirror = &resolved.views[1];
        assert_eq!(mirror.key.mirror_currency, Some(Currency::new("USD").unwrap()));
        assert_eq!(mirror.conversion_anchor, params.conversion_anchor);
        assert!(mirror
            .movements
            .iter()
            .all(|m| m.key.mirror_currency.is_some()));
        assert_eq!(mirror.movements[0].amount, dec!(95000.0000));
        assert_eq!(
            mirror.movements[0].denomination,
            Currency::new("CLP").unwrap()
        );
    }

    #[test]
    fn anchor_without_tracked_accounts_posts_no_companion() {
        let definition = definition();
        let tenant_ref = portfolio();
        let mut builder = builder_for(&definition, "deposit", false, &tenant_ref);
        builder.debit("cash", Some(user()), clp(dec!(1000))).unwrap();
        builder.credit("payable", Some(user()), clp(dec!(1000))).unwrap();
        let params = params("deposit", "receipt").with_anchor(clp(dec!(950)));
        let resolved = ResolvedEntry::assemble(&params, builder.into_movements()).unwrap();
        assert_eq!(resolved.views.len(), 1);
    }

    proptest! {
        #[test]
        fn resolved_views_always_balance(cents in 1u64..10_000_000) {
            let definition = definition();
            let tenant_ref = portfolio();
            let amount = Decimal::new(i64::try_from(cents).unwrap(), 2);
            let mut builder = builder_for(&definition, "usd_interest", false, &tenant_ref);
            builder.debit("bank_usd", None, usd(amount)).unwrap();
            builder.credit("fees_usd", None, usd(amount)).unwrap();
            let params = params("usd_interest", "statement").with_anchor(clp(dec!(932.7)));
            let resolved = ResolvedEntry::assemble(&params, builder.into_movements()).unwrap();
            for view in &resolved.views {
                let total: Decimal = view
                    .movements
                    .iter()
                    .map(|movement| movement.trial_money().amount)
                    .sum();
                prop_assert_eq!(total, Decimal::ZERO);
            }
        }
    }
}
