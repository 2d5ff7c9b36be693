//! Predicate-based queries over posted lines.
//!
//! Lines denormalize everything a report needs, so filtering never
//! joins: a [`LineFilter`] is a conjunction of per-field predicates
//! evaluated against each line. Set predicates are OR-ed within a field
//! and AND-ed across fields; ordered predicates bound posting time and
//! signed amount inclusively.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tally_core::store::LineRow;
use tally_shared::{EntityRef, Ident};

/// A conjunctive filter over posted lines.
///
/// An empty filter matches every line. Each predicate method returns
/// the filter, so conditions chain:
///
/// ```
/// use tally_db::LineFilter;
/// use tally_shared::{EntityRef, Ident};
/// use uuid::Uuid;
///
/// let tenant = EntityRef::of("portfolio", Uuid::nil()).unwrap();
/// let filter = LineFilter::new()
///     .tenant(tenant)
///     .account(Ident::new("cash").unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub struct LineFilter {
    tenants: Vec<EntityRef>,
    entry_codes: Vec<Ident>,
    accounts: Vec<Ident>,
    accountables: Vec<EntityRef>,
    posted_at_or_after: Option<DateTime<Utc>>,
    posted_at_or_before: Option<DateTime<Utc>>,
    amount_at_least: Option<Decimal>,
    amount_at_most: Option<Decimal>,
}

impl LineFilter {
    /// An empty filter matching every line.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps lines of this tenant. Repeatable; any listed tenant
    /// matches.
    #[must_use]
    pub fn tenant(mut self, tenant: EntityRef) -> Self {
        self.tenants.push(tenant);
        self
    }

    /// Keeps lines posted by this entry code. Repeatable.
    #[must_use]
    pub fn entry_code(mut self, code: Ident) -> Self {
        self.entry_codes.push(code);
        self
    }

    /// Keeps lines posted to this account name. Repeatable.
    #[must_use]
    pub fn account(mut self, name: Ident) -> Self {
        self.accounts.push(name);
        self
    }

    /// Keeps lines split by this accountable entity. Repeatable; lines
    /// without an accountable never match.
    #[must_use]
    pub fn accountable(mut self, accountable: EntityRef) -> Self {
        self.accountables.push(accountable);
        self
    }

    /// Keeps lines posted at or after `at`.
    #[must_use]
    pub fn posted_at_or_after(mut self, at: DateTime<Utc>) -> Self {
        self.posted_at_or_after = Some(at);
        self
    }

    /// Keeps lines posted at or before `at`.
    #[must_use]
    pub fn posted_at_or_before(mut self, at: DateTime<Utc>) -> Self {
        self.posted_at_or_before = Some(at);
        self
    }

    /// Keeps lines whose signed amount is at least `amount`.
    #[must_use]
    pub fn amount_at_least(mut self, amount: Decimal) -> Self {
        self.amount_at_least = Some(amount);
        self
    }

    /// Keeps lines whose signed amount is at most `amount`.
    #[must_use]
    pub fn amount_at_most(mut self, amount: Decimal) -> Self {
        self.amount_at_most = Some(amount);
        self
    }

    /// True when `line` satisfies every predicate.
    #[must_use]
    pub fn matches(&self, line: &LineRow) -> bool {
        (self.tenants.is_empty() || self.tenants.contains(&line.account.tenant))
            && (self.entry_codes.is_empty() || self.entry_codes.contains(&line.entry_code))
            && (self.accounts.is_empty() || self.accounts.contains(&line.account.name))
            && (self.accountables.is_empty()
                || line
                    .account
                    .accountable
                    .as_ref()
                    .is_some_and(|accountable| self.accountables.contains(accountable)))
            && self
                .posted_at_or_after
                .is_none_or(|at| line.posted_at >= at)
            && self
                .posted_at_or_before
                .is_none_or(|at| line.posted_at <= at)
            && self.amount_at_least.is_none_or(|min| line.amount >= min)
            && self.amount_at_most.is_none_or(|max| line.amount <= max)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use tally_core::definition::AccountType;
    use tally_core::execution::AccountKey;
    use tally_shared::Currency;
    use uuid::Uuid;

    use super::*;

    fn line(account: &str, accountable: Option<EntityRef>, amount: Decimal) -> LineRow {
        let key = AccountKey {
            tenant: EntityRef::of("portfolio", Uuid::nil()).unwrap(),
            accountable,
            name: Ident::new(account).unwrap(),
            account_type: AccountType::Asset,
            currency: Currency::new("CLP").unwrap(),
            mirror_currency: None,
        };
        LineRow {
            id: Uuid::now_v7(),
            entry_id: Uuid::now_v7(),
            balance_id: Uuid::now_v7(),
            account: key,
            entry_code: Ident::new("deposit").unwrap(),
            document: EntityRef::of("receipt", Uuid::nil()).unwrap(),
            posted_at: Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap(),
            amount,
            balance: amount,
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(LineFilter::new().matches(&line("cash", None, dec!(100))));
    }

    #[test]
    fn set_predicates_or_within_and_across() {
        let cash = line("cash", None, dec!(100));
        let fees = line("fees", None, dec!(5));

        let filter = LineFilter::new()
            .account(Ident::new("cash").unwrap())
            .account(Ident::new("payable").unwrap());
        assert!(filter.matches(&cash));
        assert!(!filter.matches(&fees));

        // across fields both predicates must hold
        let filter = LineFilter::new()
            .account(Ident::new("cash").unwrap())
            .entry_code(Ident::new("withdrawal").unwrap());
        assert!(!filter.matches(&cash));
    }

    #[test]
    fn accountable_predicate_skips_unsplit_lines() {
        let user = EntityRef::of("user", Uuid::now_v7()).unwrap();
        let split = line("payable", Some(user.clone()), dec!(100));
        let unsplit = line("payable", None, dec!(100));

        let filter = LineFilter::new().accountable(user);
        assert!(filter.matches(&split));
        assert!(!filter.matches(&unsplit));
    }

    #[test]
    fn time_bounds_are_inclusive() {
        let row = line("cash", None, dec!(100));
        let at = row.posted_at;

        assert!(LineFilter::new().posted_at_or_after(at).matches(&row));
        assert!(LineFilter::new().posted_at_or_before(at).matches(&row));
        assert!(
            !LineFilter::new()
                .posted_at_or_after(at + chrono::Duration::seconds(1))
                .matches(&row)
        );
        assert!(
            !LineFilter::new()
                .posted_at_or_before(at - chrono::Duration::seconds(1))
                .matches(&row)
        );
    }

    #[test]
    fn amount_bounds_are_signed() {
        let reversal = line("cash", None, dec!(-40));
        assert!(LineFilter::new().amount_at_most(dec!(0)).matches(&reversal));
        assert!(
            !LineFilter::new()
                .amount_at_least(dec!(0))
                .matches(&reversal)
        );
        assert!(
            LineFilter::new()
                .amount_at_least(dec!(-40))
                .amount_at_most(dec!(-40))
                .matches(&reversal)
        );
    }
}
