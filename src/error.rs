use std::fmt::{Display, Formatter};

/// The error taxonomy surfaced to callers of [`crate::Store`] and its facades.
///
/// Facade operations never recover from these locally; every abnormal outcome
/// propagates to the caller as one of these variants.
#[derive(Debug)]
pub enum Error {
    /// Optimistic concurrency control validation failed at commit time.
    /// The caller may retry with a fresh transaction.
    WriteConflict,

    /// The commit would push the store's accounted size past `MaxMemory`.
    MemoryLimit,

    /// A write targeted a key whose existing entry has a different shape.
    /// The existing entry is left untouched.
    TypeMismatch,

    /// The read target does not exist at the snapshot version.
    NotFound,

    /// An ambient cancellation signal fired before commit.
    Cancelled,

    /// The store has been closed; no further operations are serviced.
    Closed,

    /// The persistence layer failed (file I/O or (de)serialization).
    Io(String),

    /// A malformed call: empty key, out-of-range batch op, etc.
    InvalidArgument(String),
}

pub type CResult<T> = std::result::Result<T, Error>;

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::WriteConflict => write!(f, "write conflict"),
            Error::MemoryLimit => write!(f, "memory limit exceeded"),
            Error::TypeMismatch => write!(f, "type mismatch"),
            Error::NotFound => write!(f, "not found"),
            Error::Cancelled => write!(f, "cancelled"),
            Error::Closed => write!(f, "store closed"),
            Error::Io(msg) => write!(f, "io error: {msg}"),
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_readable_messages() {
        assert_eq!(Error::WriteConflict.to_string(), "write conflict");
        assert_eq!(Error::MemoryLimit.to_string(), "memory limit exceeded");
        assert_eq!(
            Error::InvalidArgument("empty key".into()).to_string(),
            "invalid argument: empty key"
        );
    }
}
