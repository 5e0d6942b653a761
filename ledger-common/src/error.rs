use std::fmt;

use crate::db::DaoError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerError {
    Forbidden(String),
    Unauthorized(String),
    Config(String),
    Upstream {
        status: Option<u16>,
        message: String,
    },
    Protocol(String),
    Store(String),
    StoreContention(String),
    NotFound(String),
    Validation(String),
}

impl LedgerError {
    /// Whether a sync attempt that failed with this error may be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            LedgerError::Upstream { status, .. } => match status {
                Some(s) => *s >= 500,
                None => true,
            },
            LedgerError::StoreContention(_) => true,
            _ => false,
        }
    }
}

impl std::error::Error for LedgerError {}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Forbidden(msg) => write!(f, "LedgerError: Forbidden: {msg}"),
            LedgerError::Unauthorized(msg) => write!(f, "LedgerError: Unauthorized: {msg}"),
            LedgerError::Config(msg) => write!(f, "LedgerError: Configuration: {msg}"),
            LedgerError::Upstream { status, message } => match status {
                Some(s) => write!(f, "LedgerError: Upstream responded {s}: {message}"),
                None => write!(f, "LedgerError: Upstream unreachable: {message}"),
            },
            LedgerError::Protocol(msg) => write!(f, "LedgerError: Malformed upstream body: {msg}"),
            LedgerError::Store(msg) => write!(f, "LedgerError: Store failure: {msg}"),
            LedgerError::StoreContention(msg) => {
                write!(f, "LedgerError: Store contention: {msg}")
            }
            LedgerError::NotFound(msg) => write!(f, "LedgerError: Not found: {msg}"),
            LedgerError::Validation(msg) => write!(f, "LedgerError: Validation failed: {msg}"),
        }
    }
}

impl From<DaoError> for LedgerError {
    fn from(e: DaoError) -> Self {
        match e {
            DaoError::LockContention(_) => LedgerError::StoreContention(e.to_string()),
            _ => LedgerError::Store(e.to_string()),
        }
    }
}
