//! Type facades: one thin wrapper per value shape, each operation a
//! short transaction against the shared store handle.
//!
//! A key whose entry exists with a different shape behaves differently
//! depending on direction: a read treats it as absent (no type error ever
//! surfaces from a query), a write rejects it outright and leaves the
//! existing entry untouched.

mod hash;
mod list;
mod set;
mod string;
mod zset;

pub use hash::HashFacade;
pub use list::ListFacade;
pub use set::SetFacade;
pub use string::StringFacade;
pub use zset::ZSetFacade;

use crate::entry::{Entry, ValueType};
use crate::error::{CResult, Error};

/// Rejects a write against an existing key of the wrong shape.
pub(crate) fn expect_type(entry: &Entry, expected: ValueType) -> CResult<()> {
    if entry.value_type() == expected {
        Ok(())
    } else {
        Err(Error::TypeMismatch)
    }
}

/// Narrows a read result to `expected`'s shape, treating a mismatch as
/// "absent" rather than an error.
pub(crate) fn read_as(entry: Option<Entry>, expected: ValueType) -> Option<Entry> {
    entry.filter(|e| e.value_type() == expected)
}
