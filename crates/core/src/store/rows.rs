//! Persisted row shapes shared by every storage backend.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::{Currency, EntityRef, Ident, Money};
use uuid::Uuid;

use crate::execution::AccountKey;

/// Identity of an entry header.
///
/// The create/adjust branch and the adjustment baseline both key off this
/// tuple. Several headers may share a key: the original posting plus one
/// header per adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryKey {
    /// Owning tenant record.
    pub tenant: EntityRef,
    /// The business document the entry is evidence for.
    pub document: EntityRef,
    /// Registered entry code.
    pub code: Ident,
    /// Set only on the FX mirror companion ledger.
    pub mirror_currency: Option<Currency>,
}

/// A persisted account aggregate: identity tuple plus live balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceRow {
    /// Row identity.
    pub id: Uuid,
    /// Aggregate identity; unique per store.
    pub key: AccountKey,
    /// Live balance, maintained under row locks.
    pub balance: Decimal,
}

/// A persisted entry header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRow {
    /// Row identity.
    pub id: Uuid,
    /// Header identity tuple.
    pub key: EntryKey,
    /// When the entry was posted.
    pub posted_at: DateTime<Utc>,
    /// FX rate anchor; present only on mirror companion headers.
    pub conversion_anchor: Option<Money>,
}

/// A persisted movement: signed amount plus a running-balance snapshot.
///
/// Descriptive fields are denormalized from the entry and account so line
/// queries never join. For mirror-tagged accounts the amount is denominated
/// in the tenant currency; the account's own currency stays in the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRow {
    /// Row identity.
    pub id: Uuid,
    /// Owning entry header.
    pub entry_id: Uuid,
    /// Aggregate the movement posted to.
    pub balance_id: Uuid,
    /// Denormalized aggregate identity.
    pub account: AccountKey,
    /// Denormalized entry code.
    pub entry_code: Ident,
    /// Denormalized document reference.
    pub document: EntityRef,
    /// Denormalized posting time.
    pub posted_at: DateTime<Utc>,
    /// Signed amount (positive grows the account's natural balance).
    pub amount: Decimal,
    /// Aggregate balance right after this movement was applied.
    pub balance: Decimal,
}
