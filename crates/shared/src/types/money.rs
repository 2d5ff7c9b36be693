//! Money type with decimal precision and currency.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! This type wraps `rust_decimal::Decimal` for arbitrary precision.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scale used when converting between currencies.
const CONVERSION_SCALE: u32 = 4;

/// Errors from building or combining monetary values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// Two amounts in different currencies were combined.
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        /// Currency of the left-hand operand.
        left: Currency,
        /// Currency of the right-hand operand.
        right: Currency,
    },
    /// A currency code was empty or not alphanumeric ASCII.
    #[error("invalid currency code: {0:?}")]
    InvalidCurrency(String),
}

/// A currency code in canonical uppercase form.
///
/// Codes are open-ended rather than a closed ISO list: charts of accounts are
/// host-declared, so `CLP`, `USD`, or an internal unit like `POINTS` are all
/// acceptable. Input is trimmed and uppercased before storage, which keeps
/// lookups exact-match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Normalizes and validates a currency code.
    pub fn new(code: &str) -> Result<Self, MoneyError> {
        let canonical = code.trim().to_uppercase();
        if canonical.is_empty() || !canonical.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(MoneyError::InvalidCurrency(code.to_string()));
        }
        Ok(Self(canonical))
    }

    /// The canonical code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Represents a monetary amount with currency.
///
/// Uses `Decimal` internally to avoid floating-point precision errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The exact amount.
    pub amount: Decimal,
    /// Canonical currency code (e.g., "CLP", "USD").
    pub currency: Currency,
}

impl Money {
    /// Creates a new Money instance.
    #[must_use]
    pub const fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Creates a zero amount in the specified currency.
    #[must_use]
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Returns true if the amount is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    /// Adds another amount in the same currency.
    pub fn checked_add(&self, other: &Self) -> Result<Self, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(Self::new(self.amount + other.amount, self.currency.clone()))
    }

    /// Subtracts another amount in the same currency.
    pub fn checked_sub(&self, other: &Self) -> Result<Self, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(Self::new(self.amount - other.amount, self.currency.clone()))
    }

    /// Converts this amount into the anchor's currency.
    ///
    /// The anchor prices one unit of this amount's currency, so the result is
    /// `amount * anchor.amount` in the anchor currency, rounded to 4 decimal
    /// places with banker's rounding.
    #[must_use]
    pub fn convert_with(&self, anchor: &Self) -> Self {
        let converted = (self.amount * anchor.amount)
            .round_dp_with_strategy(CONVERSION_SCALE, RoundingStrategy::MidpointNearestEven);
        Self::new(converted, anchor.currency.clone())
    }

    fn ensure_same_currency(&self, other: &Self) -> Result<(), MoneyError> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(MoneyError::CurrencyMismatch {
                left: self.currency.clone(),
                right: other.currency.clone(),
            })
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
