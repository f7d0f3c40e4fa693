//! `xedb` is an embedded, multi-type key/value store: string, list, hash,
//! set, and sorted-set values under one keyspace, with snapshot-isolated
//! transactions, per-key version history, prefix iteration, and durable
//! whole-store persistence. All live keys and their current values fit in
//! memory; history frames and the on-disk file are bounded by
//! `Config::max_versions` and the accounted memory budget respectively.
//!
//! ## Getting started
//!
//! ```rust
//! use bytes::Bytes;
//! use tempfile::tempdir;
//! use xedb::{Config, Store};
//!
//! fn main() -> Result<(), xedb::Error> {
//!     let dir = tempdir().unwrap();
//!     let store = Store::open(Config { data_dir: dir.path().to_path_buf(), ..Config::default() })?;
//!
//!     store.strings().set(b"user:1:name", Bytes::from_static(b"Ada"))?;
//!     store.lists().push_right(b"user:1:tags", Bytes::from_static(b"admin"))?;
//!     store.sets().add(b"user:1:roles", [Bytes::from_static(b"owner")])?;
//!     store.zsets().add(b"leaderboard", Bytes::from_static(b"user:1"), 42.0)?;
//!
//!     assert_eq!(store.strings().get(b"user:1:name")?, Some(Bytes::from_static(b"Ada")));
//!
//!     let mut cursor = store.new_cursor(b"user:1:")?;
//!     while let Some(item) = cursor.next() {
//!         println!("{:?}", item.key);
//!     }
//!
//!     store.close()?;
//!     Ok(())
//! }
//! ```

pub mod accountant;
pub mod batch;
pub mod clock;
pub mod entry;
pub mod error;
mod export;
pub mod facade;
pub mod iter;
mod keyspace;
pub mod persistence;
mod store;
mod txn;

pub use batch::{BatchOp, BatchResult};
pub use clock::Version;
pub use entry::{Entry, HistoryFrame, Value, ValueType, ZSet};
pub use error::{CResult, Error};
pub use facade::{HashFacade, ListFacade, SetFacade, StringFacade, ZSetFacade};
pub use iter::{Cursor, Item};
pub use store::{Config, Store};
pub use txn::{CancelToken, Txn};

#[cfg(test)]
mod integration {
    use super::*;
    use bytes::Bytes;

    fn open() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(Config { data_dir: dir.path().to_path_buf(), ..Config::default() }).unwrap();
        (store, dir)
    }

    #[test]
    fn facades_reject_cross_type_writes() {
        let (store, _dir) = open();
        store.strings().set(b"k", Bytes::from_static(b"v")).unwrap();
        let err = store.lists().push_right(b"k", Bytes::from_static(b"x")).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch));
    }

    #[test]
    fn reopening_a_closed_store_restores_its_data() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config { data_dir: dir.path().to_path_buf(), ..Config::default() };

        let store = Store::open(cfg.clone()).unwrap();
        store.strings().set(b"greeting", Bytes::from_static(b"hello")).unwrap();
        store.close().unwrap();

        let reopened = Store::open(cfg).unwrap();
        assert_eq!(reopened.strings().get(b"greeting").unwrap(), Some(Bytes::from_static(b"hello")));
    }
}
