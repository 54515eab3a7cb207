//! Connection parameters and driver options.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use rusqlite::OpenFlags;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sqlite::Value;

/// Filename the engine treats as a private in-memory database.
pub const MEMORY_FILENAME: &str = ":memory:";

/// Busy timeout applied when the parameters do not set one.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 60_000;

/// Where to connect and how to open the database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionParams {
    pub dbname: Option<String>,
    pub path: Option<String>,
    pub memory: bool,
    /// Raw `SQLITE_OPEN_*` bitmask; READ_WRITE | CREATE when unset.
    pub flags: Option<i32>,
    pub encryption_key: Option<String>,
    /// Milliseconds to wait on a locked database.
    pub busy_timeout: Option<u64>,
}

impl ConnectionParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memory() -> Self {
        Self {
            memory: true,
            ..Self::default()
        }
    }

    pub fn with_dbname(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = Some(dbname.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_flags(mut self, flags: OpenFlags) -> Self {
        self.flags = Some(flags.bits());
        self
    }

    pub fn with_encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = Some(key.into());
        self
    }

    pub fn with_busy_timeout(mut self, millis: u64) -> Self {
        self.busy_timeout = Some(millis);
        self
    }

    /// Filename to open: `dbname`, then `path`, then the in-memory marker.
    pub fn filename(&self) -> Result<&str> {
        self.dbname
            .as_deref()
            .or(self.path.as_deref())
            .or(self.memory.then_some(MEMORY_FILENAME))
            .ok_or_else(|| {
                Error::Configuration(
                    "either a dbname, path or memory entry is required".to_string(),
                )
            })
    }

    /// Configured database name: `dbname`, else `path`.
    pub fn database(&self) -> Option<&str> {
        self.dbname.as_deref().or(self.path.as_deref())
    }

    pub fn open_flags(&self) -> OpenFlags {
        match self.flags {
            Some(bits) => OpenFlags::from_bits_truncate(bits),
            None => OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS))
    }
}

/// Error type user functions may return.
pub type FunctionError = Box<dyn std::error::Error + Send + Sync + 'static>;

type Callback = dyn Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static;

/// A scalar SQL function registered on every new connection.
#[derive(Clone)]
pub struct UserFunction {
    callback: Arc<Callback>,
    arity: i32,
    deterministic: bool,
}

impl UserFunction {
    /// Function taking exactly `arity` arguments; -1 accepts any number.
    pub fn new<F>(arity: i32, callback: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
            arity,
            deterministic: false,
        }
    }

    pub fn variadic<F>(callback: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        Self::new(-1, callback)
    }

    /// Mark the function as returning the same result for the same input,
    /// which lets the engine use it in indexes and constant folding.
    pub fn deterministic(mut self) -> Self {
        self.deterministic = true;
        self
    }

    pub fn arity(&self) -> i32 {
        self.arity
    }

    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, FunctionError> {
        (self.callback)(args)
    }
}

impl fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserFunction")
            .field("arity", &self.arity)
            .field("deterministic", &self.deterministic)
            .finish_non_exhaustive()
    }
}

/// Engine extras applied to each connection a driver opens.
#[derive(Debug, Clone, Default)]
pub struct DriverOptions {
    pub user_defined_functions: IndexMap<String, UserFunction>,
    /// Loadable extensions, loaded in order.
    pub user_defined_extensions: Vec<PathBuf>,
}

impl DriverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_function(mut self, name: impl Into<String>, function: UserFunction) -> Self {
        self.user_defined_functions.insert(name.into(), function);
        self
    }

    pub fn with_extension(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_defined_extensions.push(path.into());
        self
    }

    /// Overlay `other` on top of `self`: functions replace by name,
    /// extensions are appended.
    pub fn merged(&self, other: &DriverOptions) -> DriverOptions {
        let mut merged = self.clone();
        for (name, function) in &other.user_defined_functions {
            merged
                .user_defined_functions
                .insert(name.clone(), function.clone());
        }
        merged
            .user_defined_extensions
            .extend(other.user_defined_extensions.iter().cloned());
        merged
    }
}
