use std::sync::Arc;

use bytes::Bytes;

use super::{expect_type, read_as};
use crate::entry::{Value, ValueType, ZSet};
use crate::error::CResult;
use crate::store::Inner;
use crate::txn::Txn;

/// Operations on `Type::ZSet` keys: members unique, ordered by `(score, member)`.
pub struct ZSetFacade {
    inner: Arc<Inner>,
}

impl ZSetFacade {
    pub(crate) fn new(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    /// Adds `member` at `score`, or re-scores it if already present.
    pub fn add(&self, key: &[u8], member: Bytes, score: f64) -> CResult<()> {
        self.mutate(key, |zset| zset.insert(score, member))
    }

    pub fn score(&self, key: &[u8], member: &[u8]) -> CResult<Option<f64>> {
        Ok(self.get_zset(key)?.and_then(|z| z.score_of(member)))
    }

    /// Members by rank, ascending `(score, member)` order, with the same
    /// inclusive negative-from-end bounds as `ListFacade::range`.
    ///
    /// `None` when the normalized bounds are out of order or fall entirely
    /// outside `[0, n-1]` — distinct from `Some(vec![])`, which means the
    /// zset itself has no members.
    pub fn range(&self, key: &[u8], start: isize, stop: isize) -> CResult<Option<Vec<(Bytes, f64)>>> {
        let members: Vec<(Bytes, f64)> = self
            .get_zset(key)?
            .map(|z| z.iter_ascending().map(|(m, s)| (m.clone(), s)).collect())
            .unwrap_or_default();
        let len = members.len() as isize;
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
        Ok(Some(members[lo as usize..=(hi as usize)].to_vec()))
    }

    pub fn len(&self, key: &[u8]) -> CResult<usize> {
        Ok(self.get_zset(key)?.map(|z| z.len()).unwrap_or(0))
    }

    fn get_zset(&self, key: &[u8]) -> CResult<Option<ZSet>> {
        let mut txn = Txn::begin(Arc::clone(&self.inner), true)?;
        match read_as(txn.get(key)?, ValueType::ZSet) {
            None => Ok(None),
            Some(e) => match e.value {
                Value::ZSet(z) => Ok(Some(z)),
                _ => unreachable!(),
            },
        }
    }

    fn mutate(&self, key: &[u8], f: impl FnOnce(&mut ZSet)) -> CResult<()> {
        let mut txn = Txn::begin(Arc::clone(&self.inner), false)?;
        let mut zset = match txn.get(key)? {
            None => ZSet::new(),
            Some(e) => {
                expect_type(&e, ValueType::ZSet)?;
                match e.value {
                    Value::ZSet(z) => z,
                    _ => unreachable!(),
                }
            }
        };
        f(&mut zset);
        txn.set(key, Value::ZSet(zset), false)?;
        txn.commit()
    }
}
