use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;

use super::{expect_type, read_as};
use crate::entry::{Value, ValueType};
use crate::error::CResult;
use crate::store::Inner;
use crate::txn::Txn;

/// Operations on `Type::List` keys: an ordered, index-addressable sequence.
pub struct ListFacade {
    inner: Arc<Inner>,
}

impl ListFacade {
    pub(crate) fn new(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub fn push_left(&self, key: &[u8], value: Bytes) -> CResult<usize> {
        self.mutate(key, |list| {
            list.push_front(value);
            list.len()
        })
    }

    pub fn push_right(&self, key: &[u8], value: Bytes) -> CResult<usize> {
        self.mutate(key, |list| {
            list.push_back(value);
            list.len()
        })
    }

    pub fn pop_left(&self, key: &[u8]) -> CResult<Option<Bytes>> {
        self.mutate(key, |list| list.pop_front())
    }

    pub fn pop_right(&self, key: &[u8]) -> CResult<Option<Bytes>> {
        self.mutate(key, |list| list.pop_back())
    }

    pub fn len(&self, key: &[u8]) -> CResult<usize> {
        Ok(self.get_list(key)?.map(|l| l.len()).unwrap_or(0))
    }

    /// Elements from `start` to `stop` inclusive, both Python-style
    /// negative-index-from-end.
    ///
    /// `None` when the normalized bounds are out of order or fall entirely
    /// outside `[0, n-1]` — distinct from `Some(vec![])`, which means the
    /// list itself has no elements.
    pub fn range(&self, key: &[u8], start: isize, stop: isize) -> CResult<Option<Vec<Bytes>>> {
        let list = self.get_list(key)?.unwrap_or_default();
        let len = list.len() as isize;
        if len == 0 {
            return Ok(Some(Vec::new()));
        }
        let norm = |i: isize| -> isize {
            if i < 0 {
                (len + i).max(0)
            } else {
                i.min(len - 1).max(0)
            }
        };
        let (lo, hi) = (norm(start), norm(stop));
        if lo > hi {
            return Ok(None);
        }
        Ok(Some(list.iter().skip(lo as usize).take((hi - lo + 1) as usize).cloned().collect()))
    }

    fn get_list(&self, key: &[u8]) -> CResult<Option<VecDeque<Bytes>>> {
        let mut txn = Txn::begin(Arc::clone(&self.inner), true)?;
        match read_as(txn.get(key)?, ValueType::List) {
            None => Ok(None),
            Some(e) => match e.value {
                Value::List(l) => Ok(Some(l)),
                _ => unreachable!(),
            },
        }
    }

    fn mutate<T>(&self, key: &[u8], f: impl FnOnce(&mut VecDeque<Bytes>) -> T) -> CResult<T> {
        let mut txn = Txn::begin(Arc::clone(&self.inner), false)?;
        let mut list = match txn.get(key)? {
            None => VecDeque::new(),
            Some(e) => {
                expect_type(&e, ValueType::List)?;
                match e.value {
                    Value::List(l) => l,
                    _ => unreachable!(),
                }
            }
        };
        let result = f(&mut list);
        txn.set(key, Value::List(list), false)?;
        txn.commit()?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Config, Store};

    fn open() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(Config { data_dir: dir.path().to_path_buf(), ..Config::default() }).unwrap();
        (dir, store)
    }

    #[test]
    fn range_on_a_missing_key_is_an_empty_sequence() {
        let (_dir, store) = open();
        assert_eq!(store.lists().range(b"nope", 0, -1).unwrap(), Some(Vec::new()));
    }

    #[test]
    fn range_out_of_order_after_normalizing_is_nothing() {
        let (_dir, store) = open();
        store.lists().push_right(b"k", bytes::Bytes::from_static(b"a")).unwrap();
        store.lists().push_right(b"k", bytes::Bytes::from_static(b"b")).unwrap();
        assert_eq!(store.lists().range(b"k", 5, 6).unwrap(), None);
    }

    #[test]
    fn range_within_bounds_returns_the_slice() {
        let (_dir, store) = open();
        store.lists().push_right(b"k", bytes::Bytes::from_static(b"a")).unwrap();
        store.lists().push_right(b"k", bytes::Bytes::from_static(b"b")).unwrap();
        store.lists().push_right(b"k", bytes::Bytes::from_static(b"c")).unwrap();
        let got = store.lists().range(b"k", -2, -1).unwrap().unwrap();
        assert_eq!(got, vec![bytes::Bytes::from_static(b"b"), bytes::Bytes::from_static(b"c")]);
    }
}
