use std::sync::Arc;

use bytes::Bytes;

use super::{expect_type, read_as};
use crate::entry::{Value, ValueType};
use crate::error::CResult;
use crate::store::Inner;
use crate::txn::Txn;

/// Operations on `Type::String` keys.
pub struct StringFacade {
    inner: Arc<Inner>,
}

impl StringFacade {
    pub(crate) fn new(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub fn get(&self, key: &[u8]) -> CResult<Option<Bytes>> {
        let mut txn = Txn::begin(Arc::clone(&self.inner), true)?;
        match read_as(txn.get(key)?, ValueType::String) {
            None => Ok(None),
            Some(e) => match e.value {
                Value::String(b) => Ok(Some(b)),
                _ => unreachable!(),
            },
        }
    }

    pub fn set(&self, key: &[u8], value: Bytes) -> CResult<()> {
        self.write(key, value, false)
    }

    /// Like `set`, but always records a history frame even if `value` is
    /// identical to the current one.
    pub fn set_with_version(&self, key: &[u8], value: Bytes) -> CResult<()> {
        self.write(key, value, true)
    }

    fn write(&self, key: &[u8], value: Bytes, force_history: bool) -> CResult<()> {
        let mut txn = Txn::begin(Arc::clone(&self.inner), false)?;
        if let Some(existing) = txn.get(key)? {
            expect_type(&existing, ValueType::String)?;
        }
        txn.set(key, Value::String(value), force_history)?;
        txn.commit()
    }
}
