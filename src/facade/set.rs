use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;

use super::{expect_type, read_as};
use crate::entry::{Value, ValueType};
use crate::error::CResult;
use crate::store::Inner;
use crate::txn::Txn;

/// Operations on `Type::Set` keys: an unordered collection of unique members.
pub struct SetFacade {
    inner: Arc<Inner>,
}

impl SetFacade {
    pub(crate) fn new(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    /// Adds one or more members in a single commit. Returns the count of
    /// members that were newly added (already-present members don't count).
    pub fn add(&self, key: &[u8], members: impl IntoIterator<Item = Bytes>) -> CResult<usize> {
        self.mutate(key, |set| members.into_iter().filter(|m| set.insert(m.clone())).count())
    }

    pub fn remove(&self, key: &[u8], member: &[u8]) -> CResult<bool> {
        self.mutate(key, |members| members.remove(member))
    }

    pub fn contains(&self, key: &[u8], member: &[u8]) -> CResult<bool> {
        Ok(self.members(key)?.map(|m| m.contains(member)).unwrap_or(false))
    }

    pub fn members(&self, key: &[u8]) -> CResult<Option<HashSet<Bytes>>> {
        let mut txn = Txn::begin(Arc::clone(&self.inner), true)?;
        match read_as(txn.get(key)?, ValueType::Set) {
            None => Ok(None),
            Some(e) => match e.value {
                Value::Set(members) => Ok(Some(members)),
                _ => unreachable!(),
            },
        }
    }

    pub fn len(&self, key: &[u8]) -> CResult<usize> {
        Ok(self.members(key)?.map(|m| m.len()).unwrap_or(0))
    }

    fn mutate<T>(&self, key: &[u8], f: impl FnOnce(&mut HashSet<Bytes>) -> T) -> CResult<T> {
        let mut txn = Txn::begin(Arc::clone(&self.inner), false)?;
        let mut members = match txn.get(key)? {
            None => HashSet::new(),
            Some(e) => {
                expect_type(&e, ValueType::Set)?;
                match e.value {
                    Value::Set(m) => m,
                    _ => unreachable!(),
                }
            }
        };
        let result = f(&mut members);
        txn.set(key, Value::Set(members), false)?;
        txn.commit()?;
        Ok(result)
    }
}
