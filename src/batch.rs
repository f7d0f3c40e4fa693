//! `ExecuteBatch`: several operations staged into one transaction, so the
//! whole batch commits or none of it does.

use std::sync::Arc;

use bytes::Bytes;

use crate::entry::{Value, ValueType};
use crate::error::{CResult, Error};
use crate::facade::expect_type;
use crate::store::Inner;
use crate::txn::Txn;

/// One staged write in a batch. Modeled as a closed, typed enum rather
/// than a stringly-typed `{Op, Key, Value}` triple: every variant pairs
/// the operation with exactly the arguments it needs, and a caller gets a
/// compile error instead of a runtime parse failure for a malformed op.
#[derive(Clone, Debug)]
pub enum BatchOp {
    SetString { key: Vec<u8>, value: Bytes },
    PushListRight { key: Vec<u8>, value: Bytes },
    PushListLeft { key: Vec<u8>, value: Bytes },
    SetHashField { key: Vec<u8>, field: Bytes, value: Bytes },
    AddSetMember { key: Vec<u8>, member: Bytes },
    AddZSetMember { key: Vec<u8>, member: Bytes, score: f64 },
}

impl BatchOp {
    fn key(&self) -> &[u8] {
        match self {
            BatchOp::SetString { key, .. }
            | BatchOp::PushListRight { key, .. }
            | BatchOp::PushListLeft { key, .. }
            | BatchOp::SetHashField { key, .. }
            | BatchOp::AddSetMember { key, .. }
            | BatchOp::AddZSetMember { key, .. } => key,
        }
    }
}

/// The outcome of one op within a committed batch.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchResult {
    Ack,
    ListLen(usize),
}

pub(crate) fn execute(inner: Arc<Inner>, ops: Vec<BatchOp>) -> CResult<Vec<BatchResult>> {
    if ops.is_empty() {
        return Ok(Vec::new());
    }
    let mut txn = Txn::begin(Arc::clone(&inner), false)?;
    let mut results = Vec::with_capacity(ops.len());

    for op in ops {
        if op.key().is_empty() {
            return Err(Error::InvalidArgument("batch op key must not be empty".into()));
        }
        let result = apply(&mut txn, op)?;
        results.push(result);
    }

    txn.commit()?;
    Ok(results)
}

fn apply(txn: &mut Txn, op: BatchOp) -> CResult<BatchResult> {
    match op {
        BatchOp::SetString { key, value } => {
            if let Some(existing) = txn.get(&key)? {
                expect_type(&existing, ValueType::String)?;
            }
            txn.set(&key, Value::String(value), false)?;
            Ok(BatchResult::Ack)
        }
        BatchOp::PushListRight { key, value } => {
            let mut list = match txn.get(&key)? {
                None => Default::default(),
                Some(e) => {
                    expect_type(&e, ValueType::List)?;
                    match e.value {
                        Value::List(l) => l,
                        _ => unreachable!(),
                    }
                }
            };
            list.push_back(value);
            let len = list.len();
            txn.set(&key, Value::List(list), false)?;
            Ok(BatchResult::ListLen(len))
        }
        BatchOp::PushListLeft { key, value } => {
            let mut list = match txn.get(&key)? {
                None => Default::default(),
                Some(e) => {
                    expect_type(&e, ValueType::List)?;
                    match e.value {
                        Value::List(l) => l,
                        _ => unreachable!(),
                    }
                }
            };
            list.push_front(value);
            let len = list.len();
            txn.set(&key, Value::List(list), false)?;
            Ok(BatchResult::ListLen(len))
        }
        BatchOp::SetHashField { key, field, value } => {
            let mut fields = match txn.get(&key)? {
                None => Default::default(),
                Some(e) => {
                    expect_type(&e, ValueType::Hash)?;
                    match e.value {
                        Value::Hash(f) => f,
                        _ => unreachable!(),
                    }
                }
            };
            fields.insert(field, value);
            txn.set(&key, Value::Hash(fields), false)?;
            Ok(BatchResult::Ack)
        }
        BatchOp::AddSetMember { key, member } => {
            let mut members = match txn.get(&key)? {
                None => Default::default(),
                Some(e) => {
                    expect_type(&e, ValueType::Set)?;
                    match e.value {
                        Value::Set(m) => m,
                        _ => unreachable!(),
                    }
                }
            };
            members.insert(member);
            txn.set(&key, Value::Set(members), false)?;
            Ok(BatchResult::Ack)
        }
        BatchOp::AddZSetMember { key, member, score } => {
            let mut zset = match txn.get(&key)? {
                None => Default::default(),
                Some(e) => {
                    expect_type(&e, ValueType::ZSet)?;
                    match e.value {
                        Value::ZSet(z) => z,
                        _ => unreachable!(),
                    }
                }
            };
            zset.insert(score, member);
            txn.set(&key, Value::ZSet(zset), false)?;
            Ok(BatchResult::Ack)
        }
    }
}
