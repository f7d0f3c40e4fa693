use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use super::{expect_type, read_as};
use crate::entry::{Value, ValueType};
use crate::error::CResult;
use crate::store::Inner;
use crate::txn::Txn;

/// Operations on `Type::Hash` keys: a field/value map under one key.
pub struct HashFacade {
    inner: Arc<Inner>,
}

impl HashFacade {
    pub(crate) fn new(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub fn set_field(&self, key: &[u8], field: Bytes, value: Bytes) -> CResult<()> {
        self.mutate(key, |fields| {
            fields.insert(field, value);
        })
    }

    pub fn remove_field(&self, key: &[u8], field: &[u8]) -> CResult<bool> {
        self.mutate(key, |fields| fields.remove(field).is_some())
    }

    pub fn get_field(&self, key: &[u8], field: &[u8]) -> CResult<Option<Bytes>> {
        Ok(self.get_all(key)?.and_then(|fields| fields.get(field).cloned()))
    }

    pub fn get_all(&self, key: &[u8]) -> CResult<Option<HashMap<Bytes, Bytes>>> {
        let mut txn = Txn::begin(Arc::clone(&self.inner), true)?;
        match read_as(txn.get(key)?, ValueType::Hash) {
            None => Ok(None),
            Some(e) => match e.value {
                Value::Hash(fields) => Ok(Some(fields)),
                _ => unreachable!(),
            },
        }
    }

    pub fn len(&self, key: &[u8]) -> CResult<usize> {
        Ok(self.get_all(key)?.map(|m| m.len()).unwrap_or(0))
    }

    fn mutate<T>(&self, key: &[u8], f: impl FnOnce(&mut HashMap<Bytes, Bytes>) -> T) -> CResult<T> {
        let mut txn = Txn::begin(Arc::clone(&self.inner), false)?;
        let mut fields = match txn.get(key)? {
            None => HashMap::new(),
            Some(e) => {
                expect_type(&e, ValueType::Hash)?;
                match e.value {
                    Value::Hash(f) => f,
                    _ => unreachable!(),
                }
            }
        };
        let result = f(&mut fields);
        txn.set(key, Value::Hash(fields), false)?;
        txn.commit()?;
        Ok(result)
    }
}
