//! The account locking protocol.
//!
//! Every posting operation runs inside one store transaction that
//! row-locks the touched balance aggregates in a deterministic order:
//! the derived `Ord` of [`AccountKey`]. Two concurrent operations with
//! intersecting account sets therefore serialize on the first shared
//! aggregate instead of deadlocking; disjoint operations never wait on
//! each other.
//!
//! Transient failures (deadlock victims, busy backends, lock-wait
//! timeouts) restart the whole operation under a bounded retry policy
//! with full-jitter exponential backoff.

pub mod error;

use std::collections::BTreeMap;
use std::time::Duration;

use rand::Rng;
use rust_decimal::Decimal;
use tracing::{debug, warn};
use uuid::Uuid;

use tally_shared::LockingConfig;

use crate::execution::AccountKey;
use crate::store::{AsStoreError, BalanceRow, LedgerStore, StoreError, StoreTransaction};

pub use error::LockError;

/// A balance aggregate held under row lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeldBalance {
    /// Row id of the aggregate.
    pub id: Uuid,
    /// Balance as of the last write in this session.
    pub balance: Decimal,
}

/// Entry point of the protocol: sorts, locks, runs, commits.
#[derive(Debug)]
pub struct AccountLocker<'a, S: LedgerStore> {
    store: &'a S,
    config: &'a LockingConfig,
}

impl<'a, S: LedgerStore> AccountLocker<'a, S> {
    /// Binds the protocol to a store and a retry policy.
    #[must_use]
    pub const fn new(store: &'a S, config: &'a LockingConfig) -> Self {
        Self { store, config }
    }

    /// Runs `f` with every requested aggregate held under row lock, in
    /// one committed transaction.
    ///
    /// The requested keys are deduplicated and locked in their total
    /// order. Aggregates that do not exist yet are created (racing
    /// creators tolerated) and the acquisition is retried once. The
    /// whole operation restarts, bounded by the retry policy, when the
    /// store reports a retryable condition; `f` must therefore be safe
    /// to re-run from scratch.
    ///
    /// # Errors
    ///
    /// [`LockError::MustBeOutermostTransaction`] when the caller holds
    /// an open transaction, [`LockError::WaitTimeout`] when lock waits
    /// kept timing out, the store error itself when retries were
    /// exhausted on deadlocks, and whatever `f` raises.
    pub fn lock_accounts<T, E>(
        &self,
        accounts: &[AccountKey],
        mut f: impl FnMut(&mut LockSession<S::Tx>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<LockError> + From<StoreError> + AsStoreError,
    {
        let allowance = usize::from(self.config.fixture_transaction);
        if self.store.open_transaction_depth() > allowance {
            return Err(LockError::MustBeOutermostTransaction.into());
        }

        let mut keys = accounts.to_vec();
        keys.sort();
        keys.dedup();

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.run_once(&keys, &mut f) {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let retryable = error
                        .as_store_error()
                        .is_some_and(StoreError::is_retryable);
                    if retryable && attempt < self.config.max_attempts {
                        let delay = backoff_delay(self.config.backoff_base(), attempt);
                        warn!(attempt, ?delay, "retrying locked operation");
                        std::thread::sleep(delay);
                        continue;
                    }
                    if error
                        .as_store_error()
                        .is_some_and(StoreError::is_lock_wait_timeout)
                    {
                        return Err(LockError::WaitTimeout { attempts: attempt }.into());
                    }
                    return Err(error);
                }
            }
        }
    }

    fn run_once<T, E>(
        &self,
        keys: &[AccountKey],
        f: &mut impl FnMut(&mut LockSession<S::Tx>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<LockError> + From<StoreError>,
    {
        let mut session = self.acquire::<E>(keys)?;
        let value = f(&mut session)?;
        session.commit()?;
        Ok(value)
    }

    fn acquire<E>(&self, keys: &[AccountKey]) -> Result<LockSession<S::Tx>, E>
    where
        E: From<LockError> + From<StoreError>,
    {
        if let Some(session) = self.try_acquire::<E>(keys, true)? {
            return Ok(session);
        }
        // missing aggregates were just created; one more pass
        match self.try_acquire::<E>(keys, false)? {
            Some(session) => Ok(session),
            None => Err(LockError::Disaster.into()),
        }
    }

    fn try_acquire<E>(
        &self,
        keys: &[AccountKey],
        create_missing: bool,
    ) -> Result<Option<LockSession<S::Tx>>, E>
    where
        E: From<StoreError>,
    {
        let mut tx = self.store.begin().map_err(E::from)?;
        let mut held = BTreeMap::new();
        let mut missing: Vec<&AccountKey> = Vec::new();
        for key in keys {
            match tx.lock_balance(key).map_err(E::from)? {
                Some(row) => {
                    held.insert(
                        key.clone(),
                        HeldBalance {
                            id: row.id,
                            balance: row.balance,
                        },
                    );
                }
                None => missing.push(key),
            }
        }
        if missing.is_empty() {
            debug!(locked = held.len(), "aggregates locked");
            return Ok(Some(LockSession { tx, held }));
        }
        // release everything before creating, so creators never wait on us
        tx.rollback().map_err(E::from)?;
        if create_missing {
            self.create_missing(&missing).map_err(E::from)?;
        }
        Ok(None)
    }

    fn create_missing(&self, keys: &[&AccountKey]) -> Result<(), StoreError> {
        for key in keys {
            let mut tx = self.store.begin()?;
            let row = BalanceRow {
                id: Uuid::now_v7(),
                key: (*key).clone(),
                balance: Decimal::ZERO,
            };
            match tx.insert_balance(&row) {
                Ok(()) => tx.commit()?,
                Err(error) if error.is_duplicate_key() => {
                    debug!(%key, "aggregate created concurrently");
                    tx.rollback()?;
                }
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }
}

/// Full-jitter exponential backoff: a uniform delay in
/// `0..=base * 2^(attempt-1)`.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let cap = base.saturating_mul(1u32 << (attempt - 1).min(16));
    let cap_ms = u64::try_from(cap.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(rand::rng().random_range(0..=cap_ms))
}

/// One open locked scope: the transaction plus the aggregates it holds.
///
/// The engine reads and updates held balances through this session and
/// appends rows through [`Self::tx`]; nothing escapes the transaction
/// until the locker commits it.
#[derive(Debug)]
pub struct LockSession<Tx: StoreTransaction> {
    tx: Tx,
    held: BTreeMap<AccountKey, HeldBalance>,
}

impl<Tx: StoreTransaction> LockSession<Tx> {
    /// Reruns a nested operation over aggregates this session already
    /// holds. No new locks are taken.
    ///
    /// # Errors
    ///
    /// [`LockError::NotHeld`] when any requested key was never locked,
    /// and whatever `f` raises.
    pub fn lock_accounts<T, E>(
        &mut self,
        accounts: &[AccountKey],
        f: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<LockError>,
    {
        for key in accounts {
            if !self.held.contains_key(key) {
                return Err(LockError::NotHeld(key.clone()).into());
            }
        }
        f(self)
    }

    /// Locks further aggregates discovered while already holding locks,
    /// in place and out of global order.
    ///
    /// The out-of-order acquisition can deadlock against another
    /// session; the store reports it and the retry layer restarts the
    /// operation.
    ///
    /// # Errors
    ///
    /// Store errors from the lock waits; [`LockError::Disaster`] when a
    /// discovered aggregate has no row.
    pub fn lock_additional<E>(&mut self, accounts: &[AccountKey]) -> Result<(), E>
    where
        E: From<LockError> + From<StoreError>,
    {
        for key in accounts {
            if self.held.contains_key(key) {
                continue;
            }
            match self.tx.lock_balance(key).map_err(E::from)? {
                Some(row) => {
                    self.held.insert(
                        key.clone(),
                        HeldBalance {
                            id: row.id,
                            balance: row.balance,
                        },
                    );
                }
                // discovered keys come from persisted lines, so their
                // aggregates must exist
                None => return Err(LockError::Disaster.into()),
            }
        }
        Ok(())
    }

    /// The held aggregate for a key, if this session locked it.
    #[must_use]
    pub fn held(&self, key: &AccountKey) -> Option<HeldBalance> {
        self.held.get(key).copied()
    }

    /// Records a new balance for a held aggregate after posting to it.
    pub fn update_held(&mut self, key: &AccountKey, balance: Decimal) {
        if let Some(held) = self.held.get_mut(key) {
            held.balance = balance;
        }
    }

    /// The underlying transaction, for row writes and in-transaction
    /// reads.
    pub fn tx(&mut self) -> &mut Tx {
        &mut self.tx
    }

    fn commit(self) -> Result<(), StoreError> {
        self.tx.commit()
    }
}
