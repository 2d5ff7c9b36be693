//! The ledger facade: resolve, lock, branch, post.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use tally_shared::{Ident, LockingConfig};

use crate::definition::Definition;
use crate::execution::{
    AccountKey, EntryParams, EntryView, ExecutionError, MovementsBuilder, ResolvedEntry,
};
use crate::locking::{AccountLocker, LockError, LockSession};
use crate::store::{EntryRow, LedgerStore, LineRow, StoreTransaction};

use super::adjustment::{accumulate_lines, accumulate_movements, diff_postings, Posting};

/// What an execution did to the books.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// First execution of the entry key; rows were posted.
    Created,
    /// Re-execution changed amounts; a diff entry was posted.
    Adjusted,
    /// Re-execution matched the books; nothing was posted.
    Unchanged,
}

/// One posted entry header with its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedEntry {
    /// The header row.
    pub entry: EntryRow,
    /// Its lines, in posting order.
    pub lines: Vec<LineRow>,
}

/// Result of a committed execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Overall outcome across all posted views.
    pub outcome: Outcome,
    /// Rows posted by this execution; empty when unchanged.
    pub entries: Vec<PostedEntry>,
}

/// The engine facade hosts post through.
///
/// Holds the frozen definition, a storage backend, and the locking
/// policy. Cheap to share per thread when the store is `Clone`.
#[derive(Debug)]
pub struct Ledger<S: LedgerStore> {
    definition: Arc<Definition>,
    store: S,
    locking: LockingConfig,
}

impl<S: LedgerStore> Ledger<S> {
    /// Binds a definition to a storage backend with the given locking
    /// policy.
    #[must_use]
    pub const fn new(definition: Arc<Definition>, store: S, locking: LockingConfig) -> Self {
        Self {
            definition,
            store,
            locking,
        }
    }

    /// The frozen definition this ledger posts against.
    #[must_use]
    pub fn definition(&self) -> &Arc<Definition> {
        &self.definition
    }

    /// The storage backend this ledger posts to.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Executes an entry: validates the movements supplied by the
    /// closure, then creates or adjusts the entry key's rows under row
    /// locks in one committed transaction.
    ///
    /// Executions are idempotent per `(document, entry code)`: the
    /// first call creates, a re-run with changed amounts posts only the
    /// differences, and an identical re-run changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] for validation failures (nothing is
    /// posted), lock protocol failures, or store failures.
    pub fn execute(
        &self,
        params: &EntryParams,
        movements: impl FnOnce(&mut MovementsBuilder<'_>) -> Result<(), ExecutionError>,
    ) -> Result<Execution, ExecutionError> {
        let resolved = self.resolve(params, movements)?;
        self.post(&resolved)
    }

    /// Resolves and validates an execution without touching storage.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] for any validation failure.
    pub fn resolve(
        &self,
        params: &EntryParams,
        movements: impl FnOnce(&mut MovementsBuilder<'_>) -> Result<(), ExecutionError>,
    ) -> Result<ResolvedEntry, ExecutionError> {
        let tenant = self
            .definition
            .find_tenant(&params.tenant.kind)
            .ok_or_else(|| ExecutionError::UnknownTenant(params.tenant.kind.clone()))?;
        let entry = tenant
            .find_entry(&params.entry)
            .ok_or_else(|| ExecutionError::UnknownEntry {
                tenant: tenant.kind.clone(),
                entry: params.entry.clone(),
            })?;
        if params.document.kind != entry.document {
            return Err(ExecutionError::WrongDocumentKind {
                entry: entry.code.clone(),
                expected: entry.document.clone(),
                found: params.document.kind.clone(),
            });
        }
        if let Some(anchor) = &params.conversion_anchor {
            if anchor.currency != tenant.currency {
                return Err(ExecutionError::AnchorDenomination {
                    expected: tenant.currency.clone(),
                    found: anchor.currency.clone(),
                });
            }
        }
        let mut builder = MovementsBuilder::new(tenant, entry, &params.tenant, false);
        movements(&mut builder)?;
        ResolvedEntry::assemble(params, builder.into_movements())
    }

    /// Posts a resolved execution under the locking protocol.
    pub(crate) fn post(&self, resolved: &ResolvedEntry) -> Result<Execution, ExecutionError> {
        let lock_set = self.collect_lock_set(resolved)?;
        let locker = AccountLocker::new(&self.store, &self.locking);
        locker.lock_accounts(&lock_set, |session| self.post_views(session, resolved))
    }

    /// The aggregates an execution can touch: every view's keys plus
    /// the keys of lines already persisted under each view's entry key.
    ///
    /// This is a committed-read pre-scan; keys that appear between the
    /// scan and the lock are taken in place under the lock.
    fn collect_lock_set(&self, resolved: &ResolvedEntry) -> Result<Vec<AccountKey>, ExecutionError> {
        let mut keys: Vec<AccountKey> = resolved.account_keys().cloned().collect();
        for view in &resolved.views {
            for line in self.store.lines_for_entry_key(&view.key)? {
                keys.push(line.account);
            }
        }
        Ok(keys)
    }

    fn post_views(
        &self,
        session: &mut LockSession<S::Tx>,
        resolved: &ResolvedEntry,
    ) -> Result<Execution, ExecutionError> {
        let mut outcomes = Vec::with_capacity(resolved.views.len());
        let mut entries = Vec::new();
        for view in &resolved.views {
            let (outcome, posted) = self.post_view(session, view)?;
            outcomes.push(outcome);
            entries.extend(posted);
        }
        Ok(Execution {
            outcome: combine(&outcomes),
            entries,
        })
    }

    fn post_view(
        &self,
        session: &mut LockSession<S::Tx>,
        view: &EntryView,
    ) -> Result<(Outcome, Option<PostedEntry>), ExecutionError> {
        let headers = session.tx().entries_for_key(&view.key)?;
        if headers.is_empty() {
            let postings: Vec<Posting> = view
                .movements
                .iter()
                .map(|movement| Posting {
                    key: movement.key.clone(),
                    amount: movement.signed_amount(),
                })
                .collect();
            let posted = self.post_rows(session, view, &postings)?;
            debug!(entry = %posted.entry.id, lines = posted.lines.len(), "entry created");
            return Ok((Outcome::Created, Some(posted)));
        }
        self.adjust_view(session, view, &headers)
    }

    /// Adjustment branch: accumulate what the books say for this entry
    /// key, diff against the new movements, and post only the deltas.
    fn adjust_view(
        &self,
        session: &mut LockSession<S::Tx>,
        view: &EntryView,
        headers: &[EntryRow],
    ) -> Result<(Outcome, Option<PostedEntry>), ExecutionError> {
        let lines = session.tx().lines_for_entry_key(&view.key)?;
        let old = accumulate_lines(&lines);
        let new = accumulate_movements(&view.movements);
        let diffs = diff_postings(&old, &new);
        if diffs.is_empty() {
            debug!(code = %view.key.code, "entry unchanged");
            return Ok((Outcome::Unchanged, None));
        }

        let total = self.trial_total(&view.key.tenant.kind, &diffs)?;
        if !total.is_zero() {
            return Err(ExecutionError::UnbalancedEntry);
        }
        let latest = latest_posted_at(headers);
        if let Some(latest) = latest {
            if view.posted_at < latest {
                return Err(ExecutionError::StaleAdjustment {
                    new: view.posted_at,
                    old: latest,
                });
            }
        }

        // reversal diffs can touch aggregates the pre-scan never saw
        let diff_keys: Vec<AccountKey> = diffs.iter().map(|diff| diff.key.clone()).collect();
        session.lock_additional::<ExecutionError>(&diff_keys)?;
        let posted = session.lock_accounts(&diff_keys, |session| {
            self.post_rows(session, view, &diffs)
        })?;
        debug!(entry = %posted.entry.id, lines = posted.lines.len(), "entry adjusted");
        Ok((Outcome::Adjusted, Some(posted)))
    }

    /// Trial balance of orientation-signed postings: each amount is
    /// re-signed to the debits-positive convention through its
    /// account's orientation before summing.
    fn trial_total(
        &self,
        tenant_kind: &Ident,
        postings: &[Posting],
    ) -> Result<Decimal, ExecutionError> {
        let tenant = self
            .definition
            .find_tenant(tenant_kind)
            .ok_or_else(|| ExecutionError::UnknownTenant(tenant_kind.clone()))?;
        let mut total = Decimal::ZERO;
        for posting in postings {
            let account = tenant.find_account(&posting.key.name).ok_or_else(|| {
                ExecutionError::UnknownAccount {
                    tenant: tenant.kind.clone(),
                    account: posting.key.name.clone(),
                }
            })?;
            let debit_grows = account.account_type.is_debit_normal() != account.contra;
            total += if debit_grows {
                posting.amount
            } else {
                -posting.amount
            };
        }
        Ok(total)
    }

    /// Create path: one header plus one line per posting, balances
    /// updated as each line lands.
    fn post_rows(
        &self,
        session: &mut LockSession<S::Tx>,
        view: &EntryView,
        postings: &[Posting],
    ) -> Result<PostedEntry, ExecutionError> {
        let entry = EntryRow {
            id: Uuid::now_v7(),
            key: view.key.clone(),
            posted_at: view.posted_at,
            conversion_anchor: view.conversion_anchor.clone(),
        };
        session.tx().insert_entry(&entry)?;
        let mut lines = Vec::with_capacity(postings.len());
        for posting in postings {
            let held = session
                .held(&posting.key)
                .ok_or_else(|| LockError::NotHeld(posting.key.clone()))?;
            let balance = held.balance + posting.amount;
            let line = LineRow {
                id: Uuid::now_v7(),
                entry_id: entry.id,
                balance_id: held.id,
                account: posting.key.clone(),
                entry_code: entry.key.code.clone(),
                document: entry.key.document.clone(),
                posted_at: view.posted_at,
                amount: posting.amount,
                balance,
            };
            session.tx().insert_line(&line)?;
            session.tx().update_balance(held.id, balance)?;
            session.update_held(&posting.key, balance);
            lines.push(line);
        }
        Ok(PostedEntry { entry, lines })
    }
}

fn combine(outcomes: &[Outcome]) -> Outcome {
    if outcomes.contains(&Outcome::Adjusted) {
        Outcome::Adjusted
    } else if outcomes.contains(&Outcome::Created) {
        Outcome::Created
    } else {
        Outcome::Unchanged
    }
}

fn latest_posted_at(headers: &[EntryRow]) -> Option<DateTime<Utc>> {
    headers.iter().map(|header| header.posted_at).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_outcome_prefers_adjusted() {
        assert_eq!(
            combine(&[Outcome::Created, Outcome::Adjusted]),
            Outcome::Adjusted
        );
        assert_eq!(
            combine(&[Outcome::Created, Outcome::Created]),
            Outcome::Created
        );
        assert_eq!(
            combine(&[Outcome::Unchanged, Outcome::Unchanged]),
            Outcome::Unchanged
        );
        assert_eq!(combine(&[]), Outcome::Unchanged);
    }
}
