//! SQLite3 driver adapter for a database abstraction layer.
//!
//! # Intention
//!
//! - Let a DBAL drive an embedded SQLite database through its usual
//!   driver, connection and statement interfaces ([`dbal`]).
//! - Translate logical parameter types and fetch styles to what the
//!   engine understands, and engine failures to [`Error`].
//!
//! # Architectural Boundaries
//!
//! - Only SQLite/database code belongs here.
//! - Everything is forwarded to `rusqlite`; no query rewriting, pooling or
//!   retrying happens in this crate.
//!
//! ```
//! use sqlite3_dbal::{ConnectionParams, FetchStyle, Sqlite3Driver};
//!
//! let driver = Sqlite3Driver::new();
//! let conn = driver.connect(&ConnectionParams::memory())?;
//! conn.exec("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")?;
//! conn.exec("INSERT INTO t (name) VALUES ('a')")?;
//!
//! let mut stmt = conn.query("SELECT name FROM t")?;
//! let row = stmt.fetch(Some(FetchStyle::Associative))?.unwrap();
//! assert_eq!(row.get_named("name").and_then(|v| v.as_str()), Some("a"));
//! # Ok::<(), sqlite3_dbal::Error>(())
//! ```

pub mod config;
pub mod dbal;
pub mod error;
pub mod row;
pub mod sqlite;
pub mod types;

pub use config::{ConnectionParams, DriverOptions, UserFunction};
pub use error::{Error, NativeError, Result};
pub use row::Row;
pub use sqlite::{
    ParamCell, ParamKey, Params, RowIter, Sqlite3Connection, Sqlite3Driver, Sqlite3Statement,
    Value,
};
pub use types::{FetchStyle, ParamType};
