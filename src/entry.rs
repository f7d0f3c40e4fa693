//! The tagged value shapes and the versioned entry that wraps them.
//!
//! An [`Entry`] is the unit stored under a key. Its `Type` (discriminant on
//! [`Value`]) is fixed at creation and never changes across writes — a
//! type-mismatched write is rejected by the facade layer before it ever
//! reaches here.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumString};

use crate::clock::Version;

/// Per-element bookkeeping overhead used by the memory accountant's
/// conservative size estimate: bytes of all stored strings plus a fixed
/// overhead per element.
pub const ELEMENT_OVERHEAD: usize = 16;
/// Fixed overhead charged once per entry for its metadata (version,
/// timestamps, type tag).
pub const ENTRY_OVERHEAD: usize = 48;

/// The shape discriminant. Immutable for the lifetime of a key (invariant 1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, StrumDisplay, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ValueType {
    String,
    List,
    Hash,
    Set,
    ZSet,
}

/// A sorted-set score. Ordered with `f64::total_cmp` so that (score, member)
/// pairs form a total order, without rejecting any finite float callers
/// might pass in.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Score(pub f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == std::cmp::Ordering::Equal
    }
}
impl Eq for Score {}
impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Score {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// A sorted set: members unique, logically ordered by `(score, member)`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ZSet {
    by_member: HashMap<Bytes, Score>,
    by_score: BTreeSet<(Score, Bytes)>,
}

impl ZSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or re-scores `member`. If `member` already exists at a
    /// different score, exactly that entry is replaced, leaving exactly
    /// one member at the new score.
    pub fn insert(&mut self, score: f64, member: Bytes) {
        let score = Score(score);
        if let Some(old) = self.by_member.insert(member.clone(), score) {
            self.by_score.remove(&(old, member.clone()));
        }
        self.by_score.insert((score, member));
    }

    pub fn score_of(&self, member: &[u8]) -> Option<f64> {
        self.by_member.get(member).map(|s| s.0)
    }

    pub fn len(&self) -> usize {
        self.by_score.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_score.is_empty()
    }

    /// Members in ascending `(score, member)` order.
    pub fn iter_ascending(&self) -> impl Iterator<Item = (&Bytes, f64)> {
        self.by_score.iter().map(|(s, m)| (m, s.0))
    }

    fn approx_size(&self) -> usize {
        self.by_member
            .keys()
            .map(|m| m.len() + ELEMENT_OVERHEAD * 2) // stored twice (index + map)
            .sum()
    }
}

/// One of the five coexisting value shapes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    String(Bytes),
    List(VecDeque<Bytes>),
    Hash(HashMap<Bytes, Bytes>),
    Set(HashSet<Bytes>),
    ZSet(ZSet),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::List(_) => ValueType::List,
            Value::Hash(_) => ValueType::Hash,
            Value::Set(_) => ValueType::Set,
            Value::ZSet(_) => ValueType::ZSet,
        }
    }

    /// Conservative upper-ish-bound byte estimate, used by the memory
    /// accountant. Only the live value is charged, never history.
    pub fn approx_size(&self) -> usize {
        match self {
            Value::String(b) => b.len() + ELEMENT_OVERHEAD,
            Value::List(items) => items.iter().map(|b| b.len() + ELEMENT_OVERHEAD).sum(),
            Value::Hash(fields) => fields
                .iter()
                .map(|(k, v)| k.len() + v.len() + ELEMENT_OVERHEAD)
                .sum(),
            Value::Set(members) => members.iter().map(|m| m.len() + ELEMENT_OVERHEAD).sum(),
            Value::ZSet(z) => z.approx_size(),
        }
    }
}

/// A retained prior `{Value, Version, Created, LastUpdated}` snapshot,
/// kept for time-travel reads (`GetVersion`, `ListVersions`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryFrame {
    pub value: Value,
    pub version: Version,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// The unit stored under a key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entry {
    pub value: Value,
    pub version: Version,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Newest first; length bounded by `MaxVersions` (0 = unbounded).
    pub history: VecDeque<HistoryFrame>,
}

impl Entry {
    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }

    /// Builds the entry that results from writing `value` over `previous`
    /// (`None` for a brand new key) at `version`/`now`, applying the
    /// history bound. `force_history` makes the write record a history
    /// frame even if `value` is identical to the previous value — the
    /// distinction `SetWithVersion` draws over plain `Set`.
    pub fn apply_write(
        previous: Option<Entry>,
        value: Value,
        version: Version,
        now: DateTime<Utc>,
        max_versions: usize,
        force_history: bool,
    ) -> Entry {
        match previous {
            None => Entry { value, version, created: now, last_updated: now, history: VecDeque::new() },
            Some(mut prev) => {
                let unchanged = values_equal(&prev.value, &value);
                let mut history = std::mem::take(&mut prev.history);
                if force_history || !unchanged {
                    history.push_front(HistoryFrame {
                        value: prev.value,
                        version: prev.version,
                        created: prev.created,
                        last_updated: prev.last_updated,
                    });
                }
                if max_versions > 0 {
                    history.truncate(max_versions);
                }
                Entry { value, version, created: prev.created, last_updated: now, history }
            }
        }
    }

    /// Every retained version number, newest first, including the current one.
    pub fn list_versions(&self) -> Vec<Version> {
        let mut versions = Vec::with_capacity(self.history.len() + 1);
        versions.push(self.version);
        versions.extend(self.history.iter().map(|f| f.version));
        versions
    }

    /// Looks up the value recorded at exactly `version`, current or historical.
    pub fn value_at_version(&self, version: Version) -> Option<&Value> {
        if self.version == version {
            return Some(&self.value);
        }
        self.history.iter().find(|f| f.version == version).map(|f| &f.value)
    }

    /// Resolves this entry's visible state at `snapshot`: `None` if the
    /// entry (including all of its history) postdates the snapshot.
    pub fn resolve_at(&self, snapshot: Version) -> Option<(&Value, Version, DateTime<Utc>, DateTime<Utc>)> {
        if self.version <= snapshot {
            return Some((&self.value, self.version, self.created, self.last_updated));
        }
        self.history
            .iter()
            .find(|f| f.version <= snapshot)
            .map(|f| (&f.value, f.version, self.created, f.last_updated))
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x == y,
        (Value::List(x), Value::List(y)) => x == y,
        (Value::Hash(x), Value::Hash(y)) => x == y,
        (Value::Set(x), Value::Set(y)) => x == y,
        (Value::ZSet(x), Value::ZSet(y)) => {
            x.by_member.len() == y.by_member.len()
                && x.by_member.iter().all(|(m, s)| y.by_member.get(m) == Some(s))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(0, 0).unwrap()
    }

    #[test]
    fn first_write_has_empty_history() {
        let e = Entry::apply_write(None, Value::String(Bytes::from_static(b"v1")), 1, now(), 0, false);
        assert!(e.history.is_empty());
        assert_eq!(e.version, 1);
    }

    #[test]
    fn history_bounded_by_max_versions() {
        let mut e = Entry::apply_write(None, Value::String(Bytes::from_static(b"v1")), 1, now(), 2, false);
        e = Entry::apply_write(Some(e), Value::String(Bytes::from_static(b"v2")), 2, now(), 2, false);
        e = Entry::apply_write(Some(e), Value::String(Bytes::from_static(b"v3")), 3, now(), 2, false);
        assert_eq!(e.history.len(), 2);
        assert_eq!(e.list_versions(), vec![3, 2, 1]);
        assert_eq!(e.value_at_version(3).unwrap().approx_size(), 2 + ELEMENT_OVERHEAD);
    }

    #[test]
    fn identical_set_skips_history_unless_forced() {
        let mut e = Entry::apply_write(None, Value::String(Bytes::from_static(b"v1")), 1, now(), 0, false);
        e = Entry::apply_write(Some(e), Value::String(Bytes::from_static(b"v1")), 2, now(), 0, false);
        assert!(e.history.is_empty());
        e = Entry::apply_write(Some(e), Value::String(Bytes::from_static(b"v1")), 3, now(), 0, true);
        assert_eq!(e.history.len(), 1);
    }

    #[test]
    fn resolve_at_walks_history_for_older_snapshots() {
        let mut e = Entry::apply_write(None, Value::String(Bytes::from_static(b"v1")), 1, now(), 0, false);
        e = Entry::apply_write(Some(e), Value::String(Bytes::from_static(b"v2")), 5, now(), 0, false);
        let (v, ver, _, _) = e.resolve_at(3).unwrap();
        assert_eq!(ver, 1);
        match v {
            Value::String(b) => assert_eq!(b.as_ref(), b"v1"),
            _ => panic!("wrong shape"),
        }
        assert!(e.resolve_at(0).is_none());
    }

    #[test]
    fn zset_reinsert_replaces_score() {
        let mut z = ZSet::new();
        z.insert(1.0, Bytes::from_static(b"m1"));
        z.insert(2.0, Bytes::from_static(b"m2"));
        z.insert(3.0, Bytes::from_static(b"m1"));
        assert_eq!(z.len(), 2);
        let ordered: Vec<_> = z.iter_ascending().map(|(m, s)| (m.clone(), s)).collect();
        assert_eq!(ordered, vec![(Bytes::from_static(b"m2"), 2.0), (Bytes::from_static(b"m1"), 3.0)]);
    }
}
