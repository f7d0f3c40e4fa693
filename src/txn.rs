//! The transaction engine: optimistic concurrency control over a
//! snapshot taken at `Begin`, validated and installed at `Commit`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;

use crate::clock::Version;
use crate::entry::{Entry, Value};
use crate::error::{CResult, Error};
use crate::persistence;
use crate::store::Inner;

struct PendingWrite {
    value: Value,
    force_history: bool,
}

/// An ambient cancellation signal a caller can share across one
/// transaction's lifetime. Cloning shares the same underlying flag.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A single read-only or read-write transaction.
///
/// Every facade operation opens one of these, does its work, and commits
/// or drops it. Holds a shared handle to the store rather than borrowing
/// it directly, so a `Txn` can outlive the call that created it.
pub struct Txn {
    inner: Arc<Inner>,
    snapshot: Version,
    read_only: bool,
    reads: HashSet<Vec<u8>>,
    writes: HashMap<Vec<u8>, PendingWrite>,
    cancel: Option<CancelToken>,
}

impl Txn {
    pub(crate) fn begin(inner: Arc<Inner>, read_only: bool) -> CResult<Txn> {
        Self::begin_with_cancel(inner, read_only, None)
    }

    pub(crate) fn begin_with_cancel(inner: Arc<Inner>, read_only: bool, cancel: Option<CancelToken>) -> CResult<Txn> {
        if inner.is_closed() {
            return Err(Error::Closed);
        }
        let snapshot = inner.clock.current();
        Ok(Txn { inner, snapshot, read_only, reads: HashSet::new(), writes: HashMap::new(), cancel })
    }

    fn check_cancelled(&self) -> CResult<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }

    /// The snapshot version this transaction reads at.
    pub fn snapshot(&self) -> Version {
        self.snapshot
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Reads `key` as visible at this transaction's snapshot, including any
    /// not-yet-committed write made earlier in the same transaction
    /// (read-your-own-writes, needed for `ExecuteBatch` chains).
    pub fn get(&mut self, key: &[u8]) -> CResult<Option<Entry>> {
        if self.inner.is_closed() {
            return Err(Error::Closed);
        }
        self.check_cancelled()?;
        if let Some(pending) = self.writes.get(key) {
            return Ok(Some(Entry::apply_write(
                self.inner.keyspace.get(key),
                pending.value.clone(),
                self.snapshot,
                Utc::now(),
                0,
                false,
            )));
        }
        if !self.read_only {
            self.reads.insert(key.to_vec());
        }
        Ok(self.inner.keyspace.get_at_snapshot(key, self.snapshot))
    }

    /// Stages a write. Not visible to other transactions until `commit`.
    pub fn set(&mut self, key: &[u8], value: Value, force_history: bool) -> CResult<()> {
        if self.inner.is_closed() {
            return Err(Error::Closed);
        }
        self.check_cancelled()?;
        if self.read_only {
            return Err(Error::InvalidArgument("cannot write in a read-only transaction".into()));
        }
        if key.is_empty() {
            return Err(Error::InvalidArgument("key must not be empty".into()));
        }
        self.writes.insert(key.to_vec(), PendingWrite { value, force_history });
        Ok(())
    }

    /// Runs the commit protocol. A read-only transaction with no staged
    /// writes is a no-op that always succeeds.
    pub fn commit(self) -> CResult<()> {
        if self.read_only || self.writes.is_empty() {
            return Ok(());
        }
        if self.inner.is_closed() {
            return Err(Error::Closed);
        }
        self.check_cancelled()?;

        // Step 1: acquire the commit lock, serializing with every other commit.
        let _guard = self.inner.commit_lock.lock().unwrap();

        // Step 2: validate the read and write sets against what's actually
        // committed now. Any key touched that has moved past our snapshot
        // means we read or are about to overwrite data we never saw.
        for key in self.reads.iter().chain(self.writes.keys()) {
            if let Some(committed) = self.inner.keyspace.committed_version(key) {
                if committed > self.snapshot {
                    return Err(Error::WriteConflict);
                }
            }
        }

        // Step 3: project the memory delta this commit would cause and
        // check it against the budget before touching anything.
        let mut delta: i64 = 0;
        let mut staged: Vec<(Vec<u8>, Option<Entry>, PendingWrite)> = Vec::with_capacity(self.writes.len());
        for (key, pending) in self.writes {
            let previous = self.inner.keyspace.get(&key);
            let old_size = previous
                .as_ref()
                .map(|e| key.len() + e.value.approx_size() + crate::entry::ENTRY_OVERHEAD)
                .unwrap_or(0);
            let new_size = key.len() + pending.value.approx_size() + crate::entry::ENTRY_OVERHEAD;
            delta += new_size as i64 - old_size as i64;
            staged.push((key, previous, pending));
        }
        if self.inner.accountant.would_exceed(delta) {
            return Err(Error::MemoryLimit);
        }

        // Step 4: issue the commit version.
        let version = self.inner.clock.next();
        let now = Utc::now();

        // Step 5: install every write as the new current entry.
        let mut rollback: Vec<(Vec<u8>, Option<Entry>)> = Vec::with_capacity(staged.len());
        for (key, previous, pending) in staged {
            rollback.push((key.clone(), previous.clone()));
            let entry = Entry::apply_write(
                previous,
                pending.value,
                version,
                now,
                self.inner.config.max_versions,
                pending.force_history,
            );
            self.inner.keyspace.install(key, entry);
        }

        // Step 6: update the memory accountant.
        self.inner.accountant.apply(delta);

        // Step 7: sync-on-commit, still under the commit lock so the
        // write is persisted before it's released.
        if self.inner.config.sync_write {
            let entries = self.inner.keyspace.snapshot_all();
            let next_version = self.inner.clock.current() + 1;
            if let Err(err) = persistence::write_snapshot(&self.inner.config.data_dir, entries, next_version) {
                if self.inner.config.strict_sync {
                    for (key, previous) in rollback {
                        match previous {
                            Some(entry) => self.inner.keyspace.install(key, entry),
                            None => self.inner.keyspace.remove(&key),
                        }
                    }
                    self.inner.accountant.apply(-delta);
                    return Err(err);
                }
                log::error!("sync-on-commit failed (non-strict, commit already applied in memory): {}", err);
            }
        }

        Ok(())
        // Step 8: commit lock released when `_guard` drops here.
    }
}
