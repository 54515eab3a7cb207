use rusqlite::ffi;
use thiserror::Error;

/// Errors surfaced by the driver, connection and statement wrappers.
///
/// Variants that originate in the engine carry its result code and message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("invalid connection configuration: {0}")]
    Configuration(String),
    #[error("unable to open database: {message} (code {code})")]
    Connection { message: String, code: i32 },
    #[error("{message} (code {code})")]
    Statement { message: String, code: i32 },
    #[error("statement has been closed")]
    StatementClosed,
    #[error("unknown parameter type '{0}'")]
    UnknownType(String),
    #[error("unknown fetch style '{0}'")]
    UnknownFetchStyle(String),
    #[error("transaction control failed: {message} (code {code})")]
    Transaction { message: String, code: i32 },
}

impl Error {
    /// The engine result code, for variants that carry one.
    pub fn native_code(&self) -> Option<i32> {
        match self {
            Error::Connection { code, .. }
            | Error::Statement { code, .. }
            | Error::Transaction { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub(crate) fn statement(native: NativeError) -> Self {
        Error::Statement {
            message: native.message,
            code: native.code,
        }
    }

    pub(crate) fn connection(native: NativeError) -> Self {
        Error::Connection {
            message: native.message,
            code: native.code,
        }
    }

    pub(crate) fn transaction(native: NativeError) -> Self {
        Error::Transaction {
            message: native.message,
            code: native.code,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Primary result code and message as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    pub code: i32,
    pub message: String,
}

impl NativeError {
    pub(crate) fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn ok() -> Self {
        Self::new(ffi::SQLITE_OK, "not an error")
    }
}

impl From<&rusqlite::Error> for NativeError {
    fn from(err: &rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, Some(message)) = err {
            return NativeError::new(failure.extended_code & 0xff, message.clone());
        }
        match err {
            rusqlite::Error::InvalidParameterName(name) => NativeError::new(
                ffi::SQLITE_RANGE,
                format!("unknown parameter name '{name}'"),
            ),
            rusqlite::Error::InvalidColumnIndex(index) => NativeError::new(
                ffi::SQLITE_RANGE,
                format!("column index {index} out of range"),
            ),
            // extended codes carry the primary code in the low byte
            other => NativeError::new(
                other
                    .sqlite_error()
                    .map_or(ffi::SQLITE_ERROR, |e| e.extended_code & 0xff),
                other.to_string(),
            ),
        }
    }
}
