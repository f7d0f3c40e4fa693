//! Store lifecycle: configuration, open/close, and the handle every
//! facade and transaction is built from.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use fs4::FileExt;

use crate::accountant::Accountant;
use crate::batch::{BatchOp, BatchResult};
use crate::clock::VersionClock;
use crate::error::{CResult, Error};
use crate::facade::{HashFacade, ListFacade, SetFacade, StringFacade, ZSetFacade};
use crate::iter::Cursor;
use crate::keyspace::Keyspace;
use crate::persistence;
use crate::txn::{CancelToken, Txn};

/// Tunables for an opened store. Every field has the value a fresh
/// `Config::default()` store runs with.
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory holding the data file and its lock file.
    pub data_dir: PathBuf,
    /// Byte budget for live (non-history) values. `0` disables the budget.
    pub max_memory: u64,
    /// Retained history frames per key. `0` keeps every version ever written.
    pub max_versions: usize,
    /// Persists to disk at the end of every write commit.
    pub sync_write: bool,
    /// When `sync_write` is set, an `io_error` during the sync is treated
    /// as a commit failure and the in-memory write is rolled back, rather
    /// than merely logged. Defaults off, matching `sync_write`'s own
    /// off-by-default stance.
    pub strict_sync: bool,
    /// Background snapshot interval. `None` disables autosave.
    pub autosave_interval: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            max_memory: 0,
            max_versions: 0,
            sync_write: false,
            strict_sync: false,
            autosave_interval: None,
        }
    }
}

struct AutosaveHandle {
    stop: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

/// Shared state behind every clone of a `Store` handle.
pub(crate) struct Inner {
    pub(crate) keyspace: Keyspace,
    pub(crate) clock: VersionClock,
    pub(crate) accountant: Accountant,
    pub(crate) config: Config,
    pub(crate) commit_lock: Mutex<()>,
    save_io_lock: Mutex<()>,
    closed: AtomicBool,
    _lock_file: Option<std::fs::File>,
    autosave: Mutex<Option<AutosaveHandle>>,
}

impl Inner {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A handle to an open key/value store. Cheap to clone; every clone shares
/// the same underlying keyspace, clock, and accountant.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl Store {
    /// Opens (or creates) a store rooted at `config.data_dir`. Acquires an
    /// exclusive advisory lock on the data directory for the lifetime of
    /// the returned handle: only one process may hold a given data
    /// directory open at a time.
    pub fn open(config: Config) -> CResult<Store> {
        std::fs::create_dir_all(&config.data_dir)?;

        let lock_path = persistence::lock_file_path(&config.data_dir);
        let lock_file = std::fs::OpenOptions::new().create(true).write(true).open(&lock_path)?;
        lock_file.try_lock_exclusive().map_err(|_| {
            Error::InvalidArgument(format!("{}: data directory already in use", config.data_dir.display()))
        })?;

        let (keyspace, clock, accountant) = match persistence::load(&config.data_dir)? {
            Some(loaded) => {
                let total: u64 = loaded
                    .entries
                    .iter()
                    .map(|(k, e)| (k.len() + e.value.approx_size() + crate::entry::ENTRY_OVERHEAD) as u64)
                    .sum();
                let clock = VersionClock::default();
                clock.reseed_above(loaded.highest_version);
                let accountant = Accountant::new(config.max_memory);
                accountant.seed(total);
                log::info!(
                    "{}: loaded {} keys, highest version {}",
                    config.data_dir.display(),
                    loaded.entries.len(),
                    loaded.highest_version
                );
                (Keyspace::from_entries(loaded.entries), clock, accountant)
            }
            None => {
                log::info!("{}: starting a fresh store", config.data_dir.display());
                (Keyspace::new(), VersionClock::default(), Accountant::new(config.max_memory))
            }
        };

        let inner = Arc::new(Inner {
            keyspace,
            clock,
            accountant,
            config: config.clone(),
            commit_lock: Mutex::new(()),
            save_io_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
            _lock_file: Some(lock_file),
            autosave: Mutex::new(None),
        });

        if let Some(interval) = config.autosave_interval {
            Self::spawn_autosave(Arc::clone(&inner), interval);
        }

        Ok(Store { inner })
    }

    fn spawn_autosave(inner: Arc<Inner>, interval: Duration) {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let join = std::thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Ok(()) => return,
                Err(mpsc::RecvTimeoutError::Disconnected) => return,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if inner.is_closed() {
                        return;
                    }
                    // Skip this tick entirely if a save is already underway
                    // rather than queueing up behind it: edge-triggered, a
                    // busy save is never queued.
                    if let Ok(_guard) = inner.save_io_lock.try_lock() {
                        if let Err(err) = save_to_disk(&inner) {
                            log::error!("autosave failed: {}", err);
                        }
                    }
                }
            }
        });
        *inner.autosave.lock().unwrap() = Some(AutosaveHandle { stop: stop_tx, join });
    }

    /// Persists the current state immediately, regardless of the autosave
    /// schedule.
    pub fn save(&self) -> CResult<()> {
        if self.inner.is_closed() {
            return Err(Error::Closed);
        }
        let _guard = self.inner.save_io_lock.lock().unwrap();
        save_to_disk(&self.inner)
    }

    /// Stops autosave (if running), saves one last time, and releases the
    /// data directory lock. Every operation on a `Store` or any handle
    /// derived from it returns `Error::Closed` afterward.
    pub fn close(&self) -> CResult<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(handle) = self.inner.autosave.lock().unwrap().take() {
            let _ = handle.stop.send(());
            let _ = handle.join.join();
        }
        save_to_disk(&self.inner)
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn new_transaction(&self, read_only: bool) -> CResult<Txn> {
        Txn::begin(Arc::clone(&self.inner), read_only)
    }

    /// Like `new_transaction`, but `cancel` is checked on every read/write
    /// and once more before the commit lock is taken.
    pub fn new_transaction_with_cancel(&self, read_only: bool, cancel: CancelToken) -> CResult<Txn> {
        Txn::begin_with_cancel(Arc::clone(&self.inner), read_only, Some(cancel))
    }

    /// A prefix cursor over the keyspace as of right now.
    pub fn new_cursor(&self, prefix: &[u8]) -> CResult<Cursor> {
        if self.inner.is_closed() {
            return Err(Error::Closed);
        }
        let snapshot = self.inner.clock.current();
        Ok(Cursor::new(self.inner.keyspace.snapshot_prefix(prefix), snapshot))
    }

    pub fn strings(&self) -> StringFacade {
        StringFacade::new(Arc::clone(&self.inner))
    }
    pub fn lists(&self) -> ListFacade {
        ListFacade::new(Arc::clone(&self.inner))
    }
    pub fn hashes(&self) -> HashFacade {
        HashFacade::new(Arc::clone(&self.inner))
    }
    pub fn sets(&self) -> SetFacade {
        SetFacade::new(Arc::clone(&self.inner))
    }
    pub fn zsets(&self) -> ZSetFacade {
        ZSetFacade::new(Arc::clone(&self.inner))
    }

    /// Applies a batch of operations as one transaction: all-or-nothing
    /// under optimistic concurrency control.
    pub fn execute_batch(&self, ops: Vec<BatchOp>) -> CResult<Vec<BatchResult>> {
        crate::batch::execute(Arc::clone(&self.inner), ops)
    }

    pub fn memory_used(&self) -> u64 {
        self.inner.accountant.used()
    }

    pub fn len(&self) -> usize {
        self.inner.keyspace.len()
    }

    /// Every retained version number for `key`, newest first. Type-agnostic:
    /// it walks `Entry::history` directly rather than going through a facade.
    pub fn list_versions(&self, key: &[u8]) -> CResult<Vec<crate::clock::Version>> {
        if self.inner.is_closed() {
            return Err(Error::Closed);
        }
        Ok(self.inner.keyspace.get(key).map(|e| e.list_versions()).unwrap_or_default())
    }

    /// The value recorded under `key` at exactly `version`, current or
    /// historical.
    pub fn get_version(&self, key: &[u8], version: crate::clock::Version) -> CResult<Option<crate::entry::Value>> {
        if self.inner.is_closed() {
            return Err(Error::Closed);
        }
        Ok(self.inner.keyspace.get(key).and_then(|e| e.value_at_version(version).cloned()))
    }

    /// A pretty-printed JSON dump of every entry: current value, version,
    /// timestamps, and bounded history.
    pub fn export_to_json(&self) -> CResult<String> {
        if self.inner.is_closed() {
            return Err(Error::Closed);
        }
        Ok(crate::export::render(&self.inner.keyspace.snapshot_all())?)
    }
}

fn save_to_disk(inner: &Inner) -> CResult<()> {
    let (entries, next_version) = {
        let _commit_guard = inner.commit_lock.lock().unwrap();
        (inner.keyspace.snapshot_all(), inner.clock.current() + 1)
    };
    persistence::write_snapshot(&inner.config.data_dir, entries, next_version)
}
