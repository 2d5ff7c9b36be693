//! Adjustment arithmetic: pure diffing of signed postings.
//!
//! Adjustments never rewrite history. Re-executing an entry key posts a
//! fresh header carrying only the per-aggregate differences between
//! what is on the books and what the new execution says; this module
//! computes those differences.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::execution::{AccountKey, ResolvedMovement};
use crate::store::LineRow;

/// One signed posting against an aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// Aggregate posted to.
    pub key: AccountKey,
    /// Signed amount.
    pub amount: Decimal,
}

/// Sums persisted lines into signed totals per aggregate.
///
/// All rows sharing the entry key participate, the original and every
/// prior adjustment, so the totals are what the books currently say.
#[must_use]
pub fn accumulate_lines(lines: &[LineRow]) -> BTreeMap<AccountKey, Decimal> {
    let mut totals = BTreeMap::new();
    for line in lines {
        let total = totals.entry(line.account.clone()).or_insert(Decimal::ZERO);
        *total += line.amount;
    }
    totals
}

/// Sums resolved movements into signed totals per aggregate.
#[must_use]
pub fn accumulate_movements(movements: &[ResolvedMovement]) -> BTreeMap<AccountKey, Decimal> {
    let mut totals = BTreeMap::new();
    for movement in movements {
        let total = totals.entry(movement.key.clone()).or_insert(Decimal::ZERO);
        *total += movement.signed_amount();
    }
    totals
}

/// Per-aggregate differences `new - old`, zero diffs dropped.
///
/// An aggregate absent from `new` diffs to its full reversal; an
/// aggregate absent from `old` diffs to its full new total. The result
/// is in aggregate key order.
#[must_use]
pub fn diff_postings(
    old: &BTreeMap<AccountKey, Decimal>,
    new: &BTreeMap<AccountKey, Decimal>,
) -> Vec<Posting> {
    let mut diffs = Vec::new();
    for (key, new_total) in new {
        let old_total = old.get(key).copied().unwrap_or(Decimal::ZERO);
        let amount = new_total - old_total;
        if !amount.is_zero() {
            diffs.push(Posting {
                key: key.clone(),
                amount,
            });
        }
    }
    for (key, old_total) in old {
        if !new.contains_key(key) && !old_total.is_zero() {
            diffs.push(Posting {
                key: key.clone(),
                amount: -old_total,
            });
        }
    }
    diffs.sort_by(|a, b| a.key.cmp(&b.key));
    diffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::AccountType;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use tally_shared::{Currency, EntityRef, Ident};
    use uuid::Uuid;

    fn key(name: &str) -> AccountKey {
        AccountKey {
            tenant: EntityRef::new(Ident::new("portfolio").unwrap(), Uuid::from_u128(1)),
            accountable: None,
            name: Ident::new(name).unwrap(),
            account_type: AccountType::Asset,
            currency: Currency::new("CLP").unwrap(),
            mirror_currency: None,
        }
    }

    fn totals(entries: &[(&str, Decimal)]) -> BTreeMap<AccountKey, Decimal> {
        entries
            .iter()
            .map(|(name, amount)| (key(name), *amount))
            .collect()
    }

    #[test]
    fn identical_totals_diff_to_nothing() {
        let old = totals(&[("cash", dec!(1000)), ("payable", dec!(1000))]);
        assert!(diff_postings(&old, &old.clone()).is_empty());
    }

    #[test]
    fn changed_totals_diff_to_the_delta() {
        let old = totals(&[("cash", dec!(1000)), ("payable", dec!(1000))]);
        let new = totals(&[("cash", dec!(1500)), ("payable", dec!(1500))]);
        let diffs = diff_postings(&old, &new);
        assert_eq!(diffs.len(), 2);
        assert!(diffs.iter().all(|diff| diff.amount == dec!(500)));
    }

    #[test]
    fn omitted_aggregate_diffs_to_full_reversal() {
        let old = totals(&[("cash", dec!(1000)), ("fees", dec!(-200))]);
        let new = totals(&[("cash", dec!(1000))]);
        let diffs = diff_postings(&old, &new);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].key, key("fees"));
        assert_eq!(diffs[0].amount, dec!(200));
    }

    #[test]
    fn fresh_aggregate_diffs_to_its_total() {
        let old = totals(&[("cash", dec!(1000))]);
        let new = totals(&[("cash", dec!(1000)), ("fees", dec!(-30))]);
        let diffs = diff_postings(&old, &new);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].amount, dec!(-30));
    }

    fn arb_totals() -> impl Strategy<Value = BTreeMap<AccountKey, Decimal>> {
        let names = prop_oneof![Just("cash"), Just("payable"), Just("fees"), Just("bank")];
        proptest::collection::btree_map(
            names.prop_map(key),
            (-1_000_000i64..1_000_000).prop_map(|cents| Decimal::new(cents, 2)),
            0..4,
        )
    }

    proptest! {
        #[test]
        fn diffs_close_the_gap(old in arb_totals(), new in arb_totals()) {
            let diffs = diff_postings(&old, &new);

            // applying the diffs on top of old reproduces new
            let mut applied = old.clone();
            for diff in &diffs {
                *applied.entry(diff.key.clone()).or_insert(Decimal::ZERO) += diff.amount;
            }
            applied.retain(|_, amount| !amount.is_zero());
            let mut expected = new.clone();
            expected.retain(|_, amount| !amount.is_zero());
            prop_assert_eq!(applied, expected);

            // the diff total equals the drift between the two sums
            let old_sum: Decimal = old.values().copied().sum();
            let new_sum: Decimal = new.values().copied().sum();
            let diff_sum: Decimal = diffs.iter().map(|diff| diff.amount).sum();
            prop_assert_eq!(diff_sum, new_sum - old_sum);
        }

        #[test]
        fn rediffing_identical_totals_is_empty(totals in arb_totals()) {
            prop_assert!(diff_postings(&totals, &totals.clone()).is_empty());
        }
    }
}
