//! Entry and movement declarations.

use serde::{Deserialize, Serialize};
use tally_shared::{Currency, Ident};

use super::account::AccountType;
use super::error::ConfigError;

/// A movement direction in the double-entry sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Left side. Increases debit-normal accounts.
    Debit,
    /// Right side. Increases credit-normal accounts.
    Credit,
}

impl Side {
    /// Canonical lowercase name, `debit` or `credit`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared movement: one leg of an entry template.
///
/// Identity within an entry is the tuple `(side, account, currency,
/// mirror, accountable)`. Declaring a leg on a mirror-tracked account
/// registers two variants, the primary (`mirror = None`) and the mirror
/// (`mirror = Some(account currency)`); only mirror-mode postings reach
/// the latter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementDefinition {
    /// Direction of the leg.
    pub side: Side,
    /// Declared account the leg posts to.
    pub account: Ident,
    /// Account class, copied from the account declaration.
    pub account_type: AccountType,
    /// Denomination currency, copied from the account declaration.
    pub currency: Currency,
    /// `Some` marks the mirror variant of the leg.
    pub mirror: Option<Currency>,
    /// Accountable entity kind the aggregate is split by. `None` posts
    /// to the tenant-wide aggregate.
    pub accountable: Option<Ident>,
    /// Whether the account is contra, copied from the declaration.
    pub contra: bool,
}

impl MovementDefinition {
    /// The components that make a movement unique within its entry.
    #[must_use]
    pub fn identity(&self) -> (Side, &Ident, &Currency, Option<&Currency>, Option<&Ident>) {
        (
            self.side,
            &self.account,
            &self.currency,
            self.mirror.as_ref(),
            self.accountable.as_ref(),
        )
    }

    /// Whether this is the mirror variant of the leg.
    #[must_use]
    pub const fn is_mirror(&self) -> bool {
        self.mirror.is_some()
    }
}

/// A declared entry: a named template of movements that executions
/// instantiate with concrete amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDefinition {
    /// Entry code, unique within the tenant.
    pub code: Ident,
    /// Host document kind executions must reference.
    pub document: Ident,
    /// Declared legs, in declaration order.
    pub movements: Vec<MovementDefinition>,
}

impl EntryDefinition {
    /// Declares an empty entry template.
    #[must_use]
    pub const fn new(code: Ident, document: Ident) -> Self {
        Self {
            code,
            document,
            movements: Vec::new(),
        }
    }

    /// Adds a movement leg to the template.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateMovement`] when a leg with the
    /// same identity tuple already exists.
    pub fn add_movement(&mut self, movement: MovementDefinition) -> Result<(), ConfigError> {
        if self
            .movements
            .iter()
            .any(|existing| existing.identity() == movement.identity())
        {
            return Err(ConfigError::DuplicateMovement {
                entry: self.code.clone(),
                side: movement.side.as_str(),
                account: movement.account,
            });
        }
        self.movements.push(movement);
        Ok(())
    }

    /// Looks up a movement variant.
    #[must_use]
    pub fn find_movement(
        &self,
        side: Side,
        account: &Ident,
        mirror: bool,
        accountable: Option<&Ident>,
    ) -> Option<&MovementDefinition> {
        self.movements.iter().find(|m| {
            m.side == side
                && &m.account == account
                && m.is_mirror() == mirror
                && m.accountable.as_ref() == accountable
        })
    }

    /// Movement variants for one posting mode: primary postings see the
    /// primary variants, mirror postings the mirror variants.
    pub fn movements_for(&self, mirror: bool) -> impl Iterator<Item = &MovementDefinition> {
        self.movements.iter().filter(move |m| m.is_mirror() == mirror)
    }
}
