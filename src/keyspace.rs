//! The mapping from key to entry, plus its prefix-ordered view.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::clock::Version;
use crate::entry::Entry;

/// Keys are arbitrary non-empty byte strings kept in a `BTreeMap` for
/// lexicographic iteration, mapping each key straight to its entry since
/// everything lives in memory rather than behind an offset index.
pub struct Keyspace {
    map: RwLock<BTreeMap<Vec<u8>, Entry>>,
}

impl Keyspace {
    pub fn new() -> Self {
        Self { map: RwLock::new(BTreeMap::new()) }
    }

    pub fn from_entries(entries: Vec<(Vec<u8>, Entry)>) -> Self {
        Self { map: RwLock::new(entries.into_iter().collect()) }
    }

    /// The current committed entry for `key`, regardless of any snapshot.
    pub fn get(&self, key: &[u8]) -> Option<Entry> {
        self.map.read().unwrap().get(key).cloned()
    }

    /// The committed version of `key`, or `None` if absent. Used by OCC
    /// validation, which only cares about the version number.
    pub fn committed_version(&self, key: &[u8]) -> Option<Version> {
        self.map.read().unwrap().get(key).map(|e| e.version)
    }

    /// The newest version of `key` visible at `snapshot`, or `None` if the
    /// key is absent or postdates the snapshot entirely.
    pub fn get_at_snapshot(&self, key: &[u8], snapshot: Version) -> Option<Entry> {
        let entry = self.map.read().unwrap().get(key).cloned()?;
        let (value, version, created, last_updated) = entry.resolve_at(snapshot)?;
        Some(Entry {
            value: value.clone(),
            version,
            created,
            last_updated,
            history: entry.history.clone(),
        })
    }

    /// Installs `entry` as the new current state for `key`. Only ever
    /// called by a committer holding the store's commit lock.
    pub fn install(&self, key: Vec<u8>, entry: Entry) {
        self.map.write().unwrap().insert(key, entry);
    }

    /// Removes `key` entirely. Only used to unwind a strict-sync commit
    /// whose persistence step failed after a brand new key was installed.
    pub fn remove(&self, key: &[u8]) {
        self.map.write().unwrap().remove(key);
    }

    /// A point-in-time clone of every `(key, entry)` pair whose key begins
    /// with `prefix`. Cloning the whole matching range up front (rather
    /// than holding the lock open across a lazy iterator) is what makes
    /// the iterator in `crate::iter` trivially consistent under concurrent
    /// commits and free of writer-blocking: the lock is only held for the
    /// duration of this clone.
    pub fn snapshot_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Entry)> {
        let map = self.map.read().unwrap();
        let start = std::ops::Bound::Included(prefix.to_vec());
        let end = match prefix_upper_bound(prefix) {
            Some(end) => std::ops::Bound::Excluded(end),
            None => std::ops::Bound::Unbounded,
        };
        map.range((start, end)).map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// A full clone of the keyspace, used by autosave/`Save` to capture a
    /// consistent snapshot under the commit lock before serializing it to
    /// disk outside the lock.
    pub fn snapshot_all(&self) -> Vec<(Vec<u8>, Entry)> {
        self.map.read().unwrap().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    pub fn len(&self) -> usize {
        self.map.read().unwrap().len()
    }
}

/// The smallest key that is *not* prefixed by `prefix`, used as an
/// exclusive upper range bound for prefix scans.
pub fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    match prefix.iter().rposition(|b| *b != 0xff) {
        Some(i) => {
            let mut upper = prefix[..i].to_vec();
            upper.push(prefix[i] + 1);
            Some(upper)
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Entry, Value};
    use bytes::Bytes;
    use chrono::{DateTime, Utc};

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(0, 0).unwrap()
    }

    fn entry(version: Version, v: &'static str) -> Entry {
        Entry::apply_write(None, Value::String(Bytes::from_static(v.as_bytes())), version, now(), 0, false)
    }

    #[test]
    fn prefix_scan_only_returns_matching_keys() {
        let ks = Keyspace::new();
        ks.install(b"user:1".to_vec(), entry(1, "Alice"));
        ks.install(b"user:2".to_vec(), entry(2, "Bob"));
        ks.install(b"post:1".to_vec(), entry(3, "P1"));

        let mut got: Vec<_> = ks.snapshot_prefix(b"user:").into_iter().map(|(k, _)| k).collect();
        got.sort();
        assert_eq!(got, vec![b"user:1".to_vec(), b"user:2".to_vec()]);
    }

    #[test]
    fn prefix_scan_with_no_matches_is_empty() {
        let ks = Keyspace::new();
        ks.install(b"user:1".to_vec(), entry(1, "Alice"));
        assert!(ks.snapshot_prefix(b"nonexistent:").is_empty());
    }

    #[test]
    fn upper_bound_handles_0xff_tail() {
        assert_eq!(prefix_upper_bound(b"a"), Some(b"b".to_vec()));
        assert_eq!(prefix_upper_bound(b"\xff"), None);
        assert_eq!(prefix_upper_bound(b"a\xff"), Some(b"b".to_vec()));
    }
}
