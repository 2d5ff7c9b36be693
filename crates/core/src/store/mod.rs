//! Storage contract consumed by the engine.
//!
//! The engine is storage-agnostic: it drives any backend that can open
//! transactions, lock aggregate rows, and append entry/line rows. Backends
//! translate their driver errors into the [`StoreError`] taxonomy; the
//! locking protocol decides what to retry.

pub mod error;
pub mod rows;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::execution::AccountKey;

pub use error::{AsStoreError, StoreError};
pub use rows::{BalanceRow, EntryKey, EntryRow, LineRow};

/// A storage backend the engine can post to.
pub trait LedgerStore {
    /// Transaction handle type.
    type Tx: StoreTransaction;

    /// Opens a read-write transaction.
    fn begin(&self) -> Result<Self::Tx, StoreError>;

    /// Number of transactions already open on the caller's connection.
    ///
    /// The locking protocol refuses to run inside a caller-held transaction;
    /// backends track this as connection (not store-wide) state.
    fn open_transaction_depth(&self) -> usize;

    /// Reads a committed aggregate row without locking it.
    fn find_balance(&self, key: &AccountKey) -> Result<Option<BalanceRow>, StoreError>;

    /// Committed entry headers sharing a key, in insertion order.
    fn entries_for_key(&self, key: &EntryKey) -> Result<Vec<EntryRow>, StoreError>;

    /// Committed lines of every header sharing a key, in insertion order.
    fn lines_for_entry_key(&self, key: &EntryKey) -> Result<Vec<LineRow>, StoreError>;

    /// Signed sum of all committed lines posted to an aggregate.
    ///
    /// This is the derived balance; it must reconcile with the stored
    /// [`BalanceRow::balance`] at all times.
    fn line_sum(&self, key: &AccountKey) -> Result<Decimal, StoreError>;
}

/// One open read-write transaction.
///
/// Dropping an unfinished transaction rolls it back and releases its locks.
pub trait StoreTransaction {
    /// Acquires a row lock on an aggregate and returns the row, or `None`
    /// without locking when the row does not exist.
    ///
    /// Blocks while another transaction holds the row; the backend reports
    /// [`StoreError::Deadlock`] or [`StoreError::LockWaitTimeout`] when the
    /// wait cannot succeed.
    fn lock_balance(&mut self, key: &AccountKey) -> Result<Option<BalanceRow>, StoreError>;

    /// Inserts a new aggregate row. Fails with a duplicate-key error when
    /// the key is already present.
    fn insert_balance(&mut self, row: &BalanceRow) -> Result<(), StoreError>;

    /// Overwrites the balance of an aggregate row.
    fn update_balance(&mut self, id: Uuid, balance: Decimal) -> Result<(), StoreError>;

    /// Appends an entry header.
    fn insert_entry(&mut self, row: &EntryRow) -> Result<(), StoreError>;

    /// Appends a line.
    fn insert_line(&mut self, row: &LineRow) -> Result<(), StoreError>;

    /// Committed entry headers sharing a key, in insertion order.
    fn entries_for_key(&self, key: &EntryKey) -> Result<Vec<EntryRow>, StoreError>;

    /// Committed lines of every header sharing a key, in insertion order.
    fn lines_for_entry_key(&self, key: &EntryKey) -> Result<Vec<LineRow>, StoreError>;

    /// Commits buffered writes and releases held locks.
    fn commit(self) -> Result<(), StoreError>
    where
        Self: Sized;

    /// Discards buffered writes and releases held locks.
    fn rollback(self) -> Result<(), StoreError>
    where
        Self: Sized;
}
