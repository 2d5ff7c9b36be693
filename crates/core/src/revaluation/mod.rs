//! The revaluation executor: corrects mirror aggregates for FX drift.
//!
//! A mirror aggregate records what a foreign-currency balance was worth
//! in tenant currency when each entry posted. As the exchange rate
//! moves, that recorded value drifts from the anchored value of the
//! foreign balance; a revaluation run posts the difference to the
//! revaluation's income or expense account, in mirror mode only, so the
//! foreign balance itself is never touched.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use tally_shared::{Currency, EntityRef, Ident, Money};

use crate::definition::{AccountType, RevaluationDirection};
use crate::engine::Ledger;
use crate::execution::{AccountKey, EntryParams, ExecutionError, MovementsBuilder, ResolvedEntry};
use crate::store::LedgerStore;

/// Namespace for deterministic revaluation document ids.
const REVALUATION_NAMESPACE: Uuid = Uuid::from_u128(0x8d8a_c5ff_6b0e_4f6a_9b2f_3c64_1d0a_7e19);

/// Host input identifying one revaluation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevaluationParams {
    /// Declared revaluation name.
    pub revaluation: Ident,
    /// Concrete tenant whose aggregates are corrected.
    pub tenant: EntityRef,
    /// Target account name.
    pub account: Ident,
    /// Concrete accountable entity, when the target was declared with
    /// an accountable kind.
    pub accountable: Option<EntityRef>,
    /// Currency being revalued; must match the account's currency.
    pub currency: Currency,
    /// Instant the correction is dated at.
    pub revalued_at: DateTime<Utc>,
    /// Tenant-currency price of one unit of the target currency.
    pub conversion_anchor: Money,
}

/// Deterministic document id for one revaluation run.
///
/// Derived (UUID v5) from account, accountable, currency, and
/// timestamp: re-running at the same instant re-executes the same
/// document and is a no-op, while runs at new instants accumulate their
/// own correction entries.
#[must_use]
pub fn revaluation_document(params: &RevaluationParams) -> Uuid {
    let accountable = params
        .accountable
        .as_ref()
        .map_or_else(String::new, ToString::to_string);
    let name = format!(
        "{}:{}:{}:{}",
        params.account,
        accountable,
        params.currency,
        params.revalued_at.to_rfc3339()
    );
    Uuid::new_v5(&REVALUATION_NAMESPACE, name.as_bytes())
}

fn direction_for(account_type: AccountType, diff: Decimal) -> RevaluationDirection {
    // negative drift: the mirror is below the anchored value
    let below = diff.is_sign_negative();
    if account_type.is_debit_normal() == below {
        RevaluationDirection::Positive
    } else {
        RevaluationDirection::Negative
    }
}

impl<S: LedgerStore> Ledger<S> {
    /// Revalues one target aggregate of a declared revaluation.
    ///
    /// Compares the mirror aggregate against the anchored value of the
    /// foreign balance and posts the difference through the expanded
    /// correction entry. Returns `false` without posting when the two
    /// already agree.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] for unknown names, denomination
    /// mismatches, lock protocol failures, or store failures.
    pub fn execute_revaluation(&self, params: &RevaluationParams) -> Result<bool, ExecutionError> {
        let tenant = self
            .definition()
            .find_tenant(&params.tenant.kind)
            .ok_or_else(|| ExecutionError::UnknownTenant(params.tenant.kind.clone()))?;
        let revaluation = tenant
            .find_revaluation(&params.revaluation)
            .ok_or_else(|| ExecutionError::UnknownRevaluation {
                tenant: tenant.kind.clone(),
                revaluation: params.revaluation.clone(),
            })?;
        let account = tenant
            .find_account(&params.account)
            .ok_or_else(|| ExecutionError::UnknownAccount {
                tenant: tenant.kind.clone(),
                account: params.account.clone(),
            })?;
        if params.currency != account.currency {
            return Err(ExecutionError::WrongDenomination {
                account: account.name.clone(),
                expected: account.currency.clone(),
                found: params.currency.clone(),
            });
        }
        if params.conversion_anchor.currency != tenant.currency {
            return Err(ExecutionError::AnchorDenomination {
                expected: tenant.currency.clone(),
                found: params.conversion_anchor.currency.clone(),
            });
        }

        let primary = AccountKey {
            tenant: params.tenant.clone(),
            accountable: params.accountable.clone(),
            name: account.name.clone(),
            account_type: account.account_type,
            currency: account.currency.clone(),
            mirror_currency: None,
        };
        let mirror = primary.with_mirror(Some(account.currency.clone()));

        let foreign = self
            .store()
            .find_balance(&primary)?
            .map_or(Decimal::ZERO, |row| row.balance);
        let mirrored = self
            .store()
            .find_balance(&mirror)?
            .map_or(Decimal::ZERO, |row| row.balance);
        let anchored = Money::new(foreign, account.currency.clone())
            .convert_with(&params.conversion_anchor)
            .amount;
        let diff = mirrored - anchored;
        if diff.is_zero() {
            debug!(account = %account.name, "mirror matches anchored value");
            return Ok(false);
        }

        let direction = direction_for(account.account_type, diff);
        let code = revaluation.entry_code(account.account_type, direction);
        let entry = tenant
            .find_entry(&code)
            .ok_or_else(|| ExecutionError::UnknownEntry {
                tenant: tenant.kind.clone(),
                entry: code.clone(),
            })?;
        let document = EntityRef::new(revaluation.document_kind(), revaluation_document(params));
        let entry_params = EntryParams {
            tenant: params.tenant.clone(),
            entry: code,
            document,
            posted_at: params.revalued_at,
            conversion_anchor: Some(params.conversion_anchor.clone()),
        };

        let magnitude = Money::new(diff.abs(), tenant.currency.clone());
        let mut movements = MovementsBuilder::new(tenant, entry, &entry_params.tenant, true);
        match direction {
            RevaluationDirection::Positive => {
                movements.debit(
                    account.name.as_str(),
                    params.accountable.clone(),
                    magnitude.clone(),
                )?;
                movements.credit(revaluation.income_account().as_str(), None, magnitude)?;
            }
            RevaluationDirection::Negative => {
                movements.credit(
                    account.name.as_str(),
                    params.accountable.clone(),
                    magnitude.clone(),
                )?;
                movements.debit(revaluation.expense_account().as_str(), None, magnitude)?;
            }
        }
        let resolved = ResolvedEntry::assemble_mirror(
            &entry_params,
            account.currency.clone(),
            movements.into_movements(),
        )?;
        debug!(account = %account.name, %diff, "posting revaluation correction");
        self.post(&resolved)?;
        Ok(true)
    }
}
