//! Canonical symbolic identifiers for definition names.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error for identifiers that cannot be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid identifier: {0:?}")]
pub struct IdentError(pub String);

/// A canonical symbolic name.
///
/// Tenant kinds, account names, entry codes, and document kinds are all
/// spelled by the host. Input is folded to one canonical form (trimmed,
/// lowercased, `-` and spaces become `_`) before storage, so registry
/// lookups are exact-match regardless of the host's spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ident(String);

impl Ident {
    /// Normalizes and validates a raw name.
    pub fn new(raw: &str) -> Result<Self, IdentError> {
        let trimmed = raw.trim();
        let mut canonical = String::with_capacity(trimmed.len());
        for ch in trimmed.chars() {
            match ch {
                'a'..='z' | '0'..='9' | '_' => canonical.push(ch),
                'A'..='Z' => canonical.push(ch.to_ascii_lowercase()),
                '-' | ' ' => canonical.push('_'),
                _ => return Err(IdentError(raw.to_string())),
            }
        }
        if canonical.is_empty() {
            return Err(IdentError(raw.to_string()));
        }
        Ok(Self(canonical))
    }

    /// The canonical name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives `<prefix>_<self>`. The prefix must itself be canonical.
    #[must_use]
    pub fn prefixed(&self, prefix: &str) -> Self {
        Self(format!("{prefix}_{}", self.0))
    }

    /// Derives `<self>_<suffix>`. The suffix must itself be canonical.
    #[must_use]
    pub fn suffixed(&self, suffix: &str) -> Self {
        Self(format!("{}_{suffix}", self.0))
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Ident {
    type Err = IdentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("cash", "cash")]
    #[case("Cash", "cash")]
    #[case(" CASH ", "cash")]
    #[case("user-deposit", "user_deposit")]
    #[case("user deposit", "user_deposit")]
    #[case("account_2", "account_2")]
    fn test_normalization(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(Ident::new(raw).unwrap().as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("caja$")]
    #[case("días")]
    fn test_rejects_invalid(#[case] raw: &str) {
        assert!(Ident::new(raw).is_err());
    }

    #[test]
    fn test_derived_names() {
        let name = Ident::new("exchange").unwrap();
        assert_eq!(name.prefixed("positive").as_str(), "positive_exchange");
        assert_eq!(name.suffixed("revaluation").as_str(), "exchange_revaluation");
    }

    #[test]
    fn test_lookup_is_spelling_insensitive() {
        assert_eq!(Ident::new("Deposit").unwrap(), Ident::new("deposit").unwrap());
    }
}
