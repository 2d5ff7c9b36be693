//! Resolved movements and the signed-amount algebra.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::{Currency, Money};

use crate::definition::{AccountType, Side};

use super::account::AccountKey;

/// Signed posting amount of one leg.
///
/// Debit-normal classes (asset, expense) post debits positive and
/// credits negative; credit-normal classes (liability, income, equity)
/// the reverse. Contra accounts invert the sign of their class.
#[must_use]
pub fn signed_amount(
    account_type: AccountType,
    contra: bool,
    side: Side,
    amount: Decimal,
) -> Decimal {
    let debit_grows = account_type.is_debit_normal() != contra;
    let grows = match side {
        Side::Debit => debit_grows,
        Side::Credit => !debit_grows,
    };
    if grows { amount } else { -amount }
}

/// One validated leg of an execution, bound to its aggregate key.
///
/// The amount is a positive magnitude in the aggregate's denomination:
/// the account currency on primary legs, the tenant currency on mirror
/// legs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMovement {
    /// Aggregate the leg posts to.
    pub key: AccountKey,
    /// Direction of the leg.
    pub side: Side,
    /// Positive magnitude.
    pub amount: Decimal,
    /// Currency the amount is denominated in.
    pub denomination: Currency,
    /// Whether the account is contra.
    pub contra: bool,
    /// Whether the account keeps a tenant-currency mirror aggregate.
    pub mirror_tracked: bool,
}

impl ResolvedMovement {
    /// Signed posting amount of this leg.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        signed_amount(self.key.account_type, self.contra, self.side, self.amount)
    }

    /// Signed posting amount as money in the leg's denomination.
    #[must_use]
    pub fn signed_money(&self) -> Money {
        Money::new(self.signed_amount(), self.denomination.clone())
    }

    /// Amount in the debits-positive convention the trial balance
    /// sums. Distinct from [`Self::signed_amount`], which signs by the
    /// account's orientation for posting.
    #[must_use]
    pub fn trial_money(&self) -> Money {
        let signed = match self.side {
            Side::Debit => self.amount,
            Side::Credit => -self.amount,
        };
        Money::new(signed, self.denomination.clone())
    }

    /// True on primary legs whose account keeps a mirror aggregate;
    /// anchored executions post a converted companion for these.
    #[must_use]
    pub const fn has_mirror_companion(&self) -> bool {
        self.mirror_tracked && self.key.mirror_currency.is_none()
    }

    /// Aggregate key of the mirror companion, when one exists.
    #[must_use]
    pub fn mirror_key(&self) -> Option<AccountKey> {
        self.has_mirror_companion()
            .then(|| self.key.with_mirror(Some(self.key.currency.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(AccountType::Asset, false, Side::Debit, dec!(100))]
    #[case(AccountType::Asset, false, Side::Credit, dec!(-100))]
    #[case(AccountType::Asset, true, Side::Debit, dec!(-100))]
    #[case(AccountType::Asset, true, Side::Credit, dec!(100))]
    #[case(AccountType::Expense, false, Side::Debit, dec!(100))]
    #[case(AccountType::Expense, false, Side::Credit, dec!(-100))]
    #[case(AccountType::Liability, false, Side::Debit, dec!(-100))]
    #[case(AccountType::Liability, false, Side::Credit, dec!(100))]
    #[case(AccountType::Liability, true, Side::Debit, dec!(100))]
    #[case(AccountType::Income, false, Side::Credit, dec!(100))]
    #[case(AccountType::Income, false, Side::Debit, dec!(-100))]
    #[case(AccountType::Equity, false, Side::Credit, dec!(100))]
    #[case(AccountType::Equity, true, Side::Credit, dec!(-100))]
    fn test_signed_amount(
        #[case] account_type: AccountType,
        #[case] contra: bool,
        #[case] side: Side,
        #[case] expected: Decimal,
    ) {
        assert_eq!(signed_amount(account_type, contra, side, dec!(100)), expected);
    }

    fn arb_account_type() -> impl Strategy<Value = AccountType> {
        prop_oneof![
            Just(AccountType::Asset),
            Just(AccountType::Liability),
            Just(AccountType::Income),
            Just(AccountType::Expense),
            Just(AccountType::Equity),
        ]
    }

    proptest! {
        #[test]
        fn debit_and_credit_of_equal_magnitude_cancel(
            account_type in arb_account_type(),
            contra in any::<bool>(),
            cents in 1u64..1_000_000_000,
        ) {
            let amount = Decimal::new(i64::try_from(cents).unwrap(), 2);
            let debit = signed_amount(account_type, contra, Side::Debit, amount);
            let credit = signed_amount(account_type, contra, Side::Credit, amount);
            prop_assert_eq!(debit + credit, Decimal::ZERO);
            prop_assert_eq!(debit.abs(), amount);
        }
    }
}
