//! Prefix iteration: a snapshot-consistent cursor over a prefix range,
//! forward or reverse.
//!
//! The snapshot is the whole matching range, cloned once by
//! [`crate::keyspace::Keyspace::snapshot_prefix`] when the cursor is
//! created — later commits, including ones that touch keys inside the
//! prefix, are simply invisible to an already-open cursor.

use bytes::Bytes;

use crate::clock::Version;
use crate::entry::{Entry, Value};

/// One visible item yielded by a [`Cursor`].
pub struct Item {
    pub key: Vec<u8>,
    pub value: Value,
    pub version: Version,
}

/// A forward- or reverse-ordered cursor over a captured prefix range.
pub struct Cursor {
    entries: Vec<(Vec<u8>, Entry)>,
    snapshot: Version,
    pos: usize,
    reverse: bool,
}

impl Cursor {
    pub(crate) fn new(entries: Vec<(Vec<u8>, Entry)>, snapshot: Version) -> Self {
        Self { entries, snapshot, pos: 0, reverse: false }
    }

    /// Switches iteration direction and rewinds to the start of that
    /// direction.
    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self.pos = 0;
        self
    }

    /// Skips ahead to the first item whose key is `>= target` (forward) or
    /// `<= target` (reverse), discarding everything before it. An exact
    /// match on `target` is included in both directions.
    pub fn seek(&mut self, target: &[u8]) {
        let idx = self.entries.partition_point(|(k, _)| k.as_slice() < target);
        let exact = idx < self.entries.len() && self.entries[idx].0.as_slice() == target;
        self.pos = if self.reverse {
            if exact {
                self.entries.len() - 1 - idx
            } else {
                self.entries.len().saturating_sub(idx)
            }
        } else {
            idx
        };
    }

    /// Whether `next` would return an item without advancing past the end
    /// of the captured range. Items whose entire history postdates the
    /// snapshot are skipped lazily, so `valid` can still flip to `false`
    /// after skipping a run of not-yet-visible keys.
    pub fn valid(&self) -> bool {
        let mut probe = self.pos;
        while probe < self.entries.len() {
            let idx = self.resolve_index(probe);
            if self.entries[idx].1.resolve_at(self.snapshot).is_some() {
                return true;
            }
            probe += 1;
        }
        false
    }

    /// Returns the next visible item and advances the cursor, or `None`
    /// once the captured range is exhausted.
    pub fn next(&mut self) -> Option<Item> {
        while self.pos < self.entries.len() {
            let idx = self.resolve_index(self.pos);
            self.pos += 1;
            let (key, entry) = &self.entries[idx];
            if let Some((value, version, _, _)) = entry.resolve_at(self.snapshot) {
                return Some(Item { key: key.clone(), value: value.clone(), version });
            }
        }
        None
    }

    /// Drains every remaining visible item, consuming the cursor.
    pub fn collect_remaining(mut self) -> Vec<Item> {
        let mut items = Vec::new();
        while let Some(item) = self.next() {
            items.push(item);
        }
        items
    }

    fn resolve_index(&self, step: usize) -> usize {
        if self.reverse {
            self.entries.len() - 1 - step
        } else {
            step
        }
    }
}

impl Item {
    /// Convenience accessor for `Type::String` items; other shapes return
    /// `None` rather than panicking.
    pub fn as_string(&self) -> Option<&Bytes> {
        match &self.value {
            Value::String(b) => Some(b),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes as B;
    use chrono::{DateTime, Utc};

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(0, 0).unwrap()
    }

    fn entries() -> Vec<(Vec<u8>, Entry)> {
        vec![
            (b"a".to_vec(), Entry::apply_write(None, Value::String(B::from_static(b"1")), 1, now(), 0, false)),
            (b"b".to_vec(), Entry::apply_write(None, Value::String(B::from_static(b"2")), 2, now(), 0, false)),
            (b"c".to_vec(), Entry::apply_write(None, Value::String(B::from_static(b"3")), 3, now(), 0, false)),
        ]
    }

    #[test]
    fn forward_iteration_is_key_ordered() {
        let cursor = Cursor::new(entries(), 10);
        let keys: Vec<_> = cursor.collect_remaining().into_iter().map(|i| i.key).collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn reverse_iteration_flips_order() {
        let cursor = Cursor::new(entries(), 10).reversed();
        let keys: Vec<_> = cursor.collect_remaining().into_iter().map(|i| i.key).collect();
        assert_eq!(keys, vec![b"c".to_vec(), b"b".to_vec(), b"a".to_vec()]);
    }

    #[test]
    fn snapshot_hides_keys_written_after_it_was_taken() {
        let cursor = Cursor::new(entries(), 2);
        let keys: Vec<_> = cursor.collect_remaining().into_iter().map(|i| i.key).collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn seek_skips_to_target_key() {
        let mut cursor = Cursor::new(entries(), 10);
        cursor.seek(b"b");
        assert_eq!(cursor.next().unwrap().key, b"b".to_vec());
    }

    #[test]
    fn reverse_seek_to_an_exact_key_lands_on_that_key() {
        let mut cursor = Cursor::new(entries(), 10).reversed();
        cursor.seek(b"b");
        assert_eq!(cursor.next().unwrap().key, b"b".to_vec());
        assert_eq!(cursor.next().unwrap().key, b"a".to_vec());
        assert!(cursor.next().is_none());
    }

    #[test]
    fn reverse_seek_to_a_missing_key_lands_on_the_next_lower_key() {
        let mut cursor = Cursor::new(entries(), 10).reversed();
        cursor.seek(b"bb");
        assert_eq!(cursor.next().unwrap().key, b"b".to_vec());
    }
}
