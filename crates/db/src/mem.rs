//! The in-process reference store.
//!
//! [`MemStore`] implements the storage contract over guarded hash maps
//! with the blocking behavior of a relational backend: `SELECT ... FOR
//! UPDATE`-style row locks on balance aggregates, wait-for-graph
//! deadlock detection, a configurable lock-wait timeout, and
//! duplicate-key detection on the aggregate unique index. Writes buffer
//! inside the transaction and apply atomically on commit; dropping an
//! unfinished transaction rolls it back and releases its locks.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use tally_core::execution::AccountKey;
use tally_core::store::{
    BalanceRow, EntryKey, EntryRow, LedgerStore, LineRow, StoreError, StoreTransaction,
};
use tally_shared::LockingConfig;

use crate::query::LineFilter;

/// A shared in-memory ledger store.
///
/// Cloning is cheap and every clone sees the same committed state, so a
/// store can be handed to one ledger per thread.
#[derive(Debug, Clone)]
pub struct MemStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    state: Mutex<State>,
    /// Signalled whenever a transaction releases row locks.
    released: Condvar,
    next_tx: AtomicU64,
    lock_wait: Duration,
}

#[derive(Debug, Default)]
struct State {
    tables: Tables,
    /// Row lock per aggregate key: the transaction currently holding
    /// it. Pending balance inserts claim their key here too, so the
    /// unique index blocks racing creators the way a backend would.
    row_locks: HashMap<AccountKey, u64>,
    /// Which lock each blocked transaction is waiting on.
    waits_for: HashMap<u64, WaitEdge>,
    /// Open transactions per thread.
    depths: HashMap<ThreadId, usize>,
}

#[derive(Debug, Default)]
struct Tables {
    balances: HashMap<Uuid, BalanceRow>,
    /// Unique index: aggregate key to row id.
    balance_index: HashMap<AccountKey, Uuid>,
    entries: Vec<EntryRow>,
    lines: Vec<LineRow>,
}

#[derive(Debug)]
struct WaitEdge {
    holder: u64,
    key: AccountKey,
}

#[derive(Debug, Clone)]
enum Write {
    InsertBalance(BalanceRow),
    UpdateBalance { id: Uuid, balance: Decimal },
    InsertEntry(EntryRow),
    InsertLine(LineRow),
}

impl MemStore {
    /// An empty store with the default lock-wait timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_lock_wait_timeout(LockingConfig::default().lock_wait_timeout())
    }

    /// An empty store whose row-lock waits give up after `timeout`.
    #[must_use]
    pub fn with_lock_wait_timeout(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(State::default()),
                released: Condvar::new(),
                next_tx: AtomicU64::new(1),
                lock_wait: timeout,
            }),
        }
    }

    /// Committed aggregate rows, ordered by account key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Other`] when the store state is poisoned.
    pub fn balances(&self) -> Result<Vec<BalanceRow>, StoreError> {
        let state = self.inner.state()?;
        let mut rows: Vec<BalanceRow> = state.tables.balances.values().cloned().collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(rows)
    }

    /// Committed lines matching `filter`, newest first: posting time,
    /// then row id, descending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Other`] when the store state is poisoned.
    pub fn lines(&self, filter: &LineFilter) -> Result<Vec<LineRow>, StoreError> {
        let state = self.inner.state()?;
        let mut lines: Vec<LineRow> = state
            .tables
            .lines
            .iter()
            .filter(|line| filter.matches(line))
            .cloned()
            .collect();
        lines.sort_by(|a, b| (b.posted_at, b.id).cmp(&(a.posted_at, a.id)));
        Ok(lines)
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerStore for MemStore {
    type Tx = MemTransaction;

    fn begin(&self) -> Result<MemTransaction, StoreError> {
        let id = self.inner.next_tx.fetch_add(1, Ordering::Relaxed);
        let opener = thread::current().id();
        let mut state = self.inner.state()?;
        *state.depths.entry(opener).or_insert(0) += 1;
        drop(state);
        Ok(MemTransaction {
            store: self.clone(),
            id,
            opener,
            locks: HashSet::new(),
            writes: Vec::new(),
            finished: false,
        })
    }

    fn open_transaction_depth(&self) -> usize {
        let state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        state
            .depths
            .get(&thread::current().id())
            .copied()
            .unwrap_or(0)
    }

    fn find_balance(&self, key: &AccountKey) -> Result<Option<BalanceRow>, StoreError> {
        let state = self.inner.state()?;
        Ok(state.tables.balance(key).cloned())
    }

    fn entries_for_key(&self, key: &EntryKey) -> Result<Vec<EntryRow>, StoreError> {
        let state = self.inner.state()?;
        Ok(state.tables.entries_for_key(key))
    }

    fn lines_for_entry_key(&self, key: &EntryKey) -> Result<Vec<LineRow>, StoreError> {
        let state = self.inner.state()?;
        Ok(state.tables.lines_for_entry_key(key))
    }

    fn line_sum(&self, key: &AccountKey) -> Result<Decimal, StoreError> {
        let state = self.inner.state()?;
        Ok(state.tables.line_sum(key))
    }
}

impl StoreInner {
    fn state(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Other("store state poisoned".into()))
    }
}

impl State {
    /// True when `waiter` blocking on `holder` would close a cycle in
    /// the wait-for graph. Edges are validated against the lock table,
    /// so a stale edge left by a thread that has not woken yet cannot
    /// fabricate a cycle.
    fn would_deadlock(&self, waiter: u64, holder: u64) -> bool {
        let mut current = holder;
        let mut visited = HashSet::new();
        loop {
            if current == waiter {
                return true;
            }
            if !visited.insert(current) {
                return false;
            }
            let Some(edge) = self.waits_for.get(&current) else {
                return false;
            };
            if self.row_locks.get(&edge.key) != Some(&edge.holder) {
                return false;
            }
            current = edge.holder;
        }
    }

    fn release(&mut self, tx: u64, locks: &HashSet<AccountKey>, opener: ThreadId) {
        for key in locks {
            if self.row_locks.get(key) == Some(&tx) {
                self.row_locks.remove(key);
            }
        }
        self.waits_for.remove(&tx);
        if let Some(depth) = self.depths.get_mut(&opener) {
            *depth = depth.saturating_sub(1);
            if *depth == 0 {
                self.depths.remove(&opener);
            }
        }
    }

    /// Applies a commit's buffered writes. The unique index is
    /// re-validated first so the whole batch lands or none of it does.
    fn apply(&mut self, writes: Vec<Write>) -> Result<(), StoreError> {
        let mut inserted = HashSet::new();
        for write in &writes {
            if let Write::InsertBalance(row) = write {
                if self.tables.balance_index.contains_key(&row.key) || !inserted.insert(&row.key) {
                    return Err(StoreError::duplicate_key("balances.key"));
                }
            }
        }
        for write in writes {
            match write {
                Write::InsertBalance(row) => {
                    self.tables.balance_index.insert(row.key.clone(), row.id);
                    self.tables.balances.insert(row.id, row);
                }
                Write::UpdateBalance { id, balance } => {
                    if let Some(row) = self.tables.balances.get_mut(&id) {
                        row.balance = balance;
                    }
                }
                Write::InsertEntry(row) => self.tables.entries.push(row),
                Write::InsertLine(row) => self.tables.lines.push(row),
            }
        }
        Ok(())
    }
}

impl Tables {
    fn balance(&self, key: &AccountKey) -> Option<&BalanceRow> {
        self.balance_index
            .get(key)
            .and_then(|id| self.balances.get(id))
    }

    fn entries_for_key(&self, key: &EntryKey) -> Vec<EntryRow> {
        self.entries
            .iter()
            .filter(|row| row.key == *key)
            .cloned()
            .collect()
    }

    fn lines_for_entry_key(&self, key: &EntryKey) -> Vec<LineRow> {
        let ids: HashSet<Uuid> = self
            .entries
            .iter()
            .filter(|row| row.key == *key)
            .map(|row| row.id)
            .collect();
        self.lines
            .iter()
            .filter(|line| ids.contains(&line.entry_id))
            .cloned()
            .collect()
    }

    fn line_sum(&self, key: &AccountKey) -> Decimal {
        self.lines
            .iter()
            .filter(|line| line.account == *key)
            .map(|line| line.amount)
            .sum()
    }
}

/// One open transaction on a [`MemStore`].
///
/// Row locks are taken as [`Self::lock_balance`] and
/// [`Self::insert_balance`] are called and held until commit, rollback,
/// or drop. All writes are buffered and invisible to other transactions
/// until commit.
#[derive(Debug)]
pub struct MemTransaction {
    store: MemStore,
    id: u64,
    opener: ThreadId,
    locks: HashSet<AccountKey>,
    writes: Vec<Write>,
    finished: bool,
}

impl MemTransaction {
    /// Blocks on the released condvar until the edge's lock frees up,
    /// erroring out on deadlock or when the deadline has passed.
    fn wait_for<'a>(
        inner: &'a StoreInner,
        state: MutexGuard<'a, State>,
        waiter: u64,
        holder: u64,
        key: &AccountKey,
        deadline: Instant,
    ) -> Result<MutexGuard<'a, State>, StoreError> {
        if state.would_deadlock(waiter, holder) {
            debug!(tx = waiter, %key, "deadlock detected");
            return Err(StoreError::Deadlock);
        }
        let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
            return Err(StoreError::LockWaitTimeout);
        };
        let mut state = state;
        state.waits_for.insert(
            waiter,
            WaitEdge {
                holder,
                key: key.clone(),
            },
        );
        let (mut state, _timeout) = inner
            .released
            .wait_timeout(state, remaining)
            .map_err(|_| StoreError::Other("store state poisoned".into()))?;
        state.waits_for.remove(&waiter);
        Ok(state)
    }
}

impl StoreTransaction for MemTransaction {
    fn lock_balance(&mut self, key: &AccountKey) -> Result<Option<BalanceRow>, StoreError> {
        let inner: &StoreInner = &self.store.inner;
        let deadline = Instant::now() + inner.lock_wait;
        let mut state = inner.state()?;
        loop {
            let Some(row) = state.tables.balance(key) else {
                // no committed row: nothing to lock, like a FOR UPDATE
                // that matched no rows
                return Ok(None);
            };
            let row = row.clone();
            match state.row_locks.get(key).copied() {
                None => {
                    state.row_locks.insert(key.clone(), self.id);
                    self.locks.insert(key.clone());
                    return Ok(Some(row));
                }
                Some(holder) if holder == self.id => return Ok(Some(row)),
                Some(holder) => {
                    state = Self::wait_for(inner, state, self.id, holder, key, deadline)?;
                }
            }
        }
    }

    fn insert_balance(&mut self, row: &BalanceRow) -> Result<(), StoreError> {
        let inner: &StoreInner = &self.store.inner;
        let deadline = Instant::now() + inner.lock_wait;
        let mut state = inner.state()?;
        loop {
            if state.tables.balance_index.contains_key(&row.key) {
                return Err(StoreError::duplicate_key("balances.key"));
            }
            match state.row_locks.get(&row.key).copied() {
                None => {
                    // claim the index slot until commit or rollback
                    state.row_locks.insert(row.key.clone(), self.id);
                    self.locks.insert(row.key.clone());
                    self.writes.push(Write::InsertBalance(row.clone()));
                    return Ok(());
                }
                Some(holder) if holder == self.id => {
                    return Err(StoreError::duplicate_key("balances.key"));
                }
                Some(holder) => {
                    // a racing creator holds the slot; block like a
                    // unique-index insert until it resolves
                    state = Self::wait_for(inner, state, self.id, holder, &row.key, deadline)?;
                }
            }
        }
    }

    fn update_balance(&mut self, id: Uuid, balance: Decimal) -> Result<(), StoreError> {
        self.writes.push(Write::UpdateBalance { id, balance });
        Ok(())
    }

    fn insert_entry(&mut self, row: &EntryRow) -> Result<(), StoreError> {
        self.writes.push(Write::InsertEntry(row.clone()));
        Ok(())
    }

    fn insert_line(&mut self, row: &LineRow) -> Result<(), StoreError> {
        self.writes.push(Write::InsertLine(row.clone()));
        Ok(())
    }

    fn entries_for_key(&self, key: &EntryKey) -> Result<Vec<EntryRow>, StoreError> {
        let state = self.store.inner.state()?;
        Ok(state.tables.entries_for_key(key))
    }

    fn lines_for_entry_key(&self, key: &EntryKey) -> Result<Vec<LineRow>, StoreError> {
        let state = self.store.inner.state()?;
        Ok(state.tables.lines_for_entry_key(key))
    }

    fn commit(mut self) -> Result<(), StoreError> {
        self.finished = true;
        let writes = std::mem::take(&mut self.writes);
        let count = writes.len();
        let mut state = self.store.inner.state()?;
        let result = state.apply(writes);
        state.release(self.id, &self.locks, self.opener);
        drop(state);
        self.store.inner.released.notify_all();
        if result.is_ok() {
            debug!(tx = self.id, writes = count, "transaction committed");
        }
        result
    }

    fn rollback(mut self) -> Result<(), StoreError> {
        self.finished = true;
        let mut state = self.store.inner.state()?;
        state.release(self.id, &self.locks, self.opener);
        drop(state);
        self.store.inner.released.notify_all();
        debug!(tx = self.id, "transaction rolled back");
        Ok(())
    }
}

impl Drop for MemTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut state = self
            .store
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        state.release(self.id, &self.locks, self.opener);
        drop(state);
        self.store.inner.released.notify_all();
    }
}
