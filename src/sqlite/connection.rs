use std::cell::RefCell;
use std::path::PathBuf;

use indexmap::IndexMap;
use rusqlite::{LoadExtensionGuard, OptionalExtension};
use tracing::{debug, info, warn};

use crate::config::{ConnectionParams, UserFunction};
use crate::error::{Error, NativeError, Result};
use crate::sqlite::functions;
use crate::sqlite::statement::Sqlite3Statement;
use crate::sqlite::Value;
use crate::types::ParamType;

/// An open SQLite database handle.
///
/// Statements borrow the connection, so it cannot be dropped while one of
/// its statements is still alive.
pub struct Sqlite3Connection {
    conn: rusqlite::Connection,
    params: ConnectionParams,
    last_error: RefCell<NativeError>,
    encrypted: bool,
}

impl Sqlite3Connection {
    /// Open `filename` and prepare the handle for use.
    ///
    /// The open flags, encryption key and busy timeout come from `params`.
    /// Each function in `functions` is registered under its name and each
    /// extension is loaded in order; any failure aborts the open.
    pub fn open(
        filename: &str,
        params: ConnectionParams,
        functions: &IndexMap<String, UserFunction>,
        extensions: &[PathBuf],
    ) -> Result<Self> {
        let flags = params.open_flags();
        let conn = rusqlite::Connection::open_with_flags(filename, flags)
            .map_err(|e| Error::connection(NativeError::from(&e)))?;

        let encrypted = match params.encryption_key.as_deref() {
            Some(key) => apply_key(&conn, filename, key)?,
            None => false,
        };

        conn.busy_timeout(params.busy_timeout())
            .map_err(|e| Error::connection(NativeError::from(&e)))?;

        for (name, function) in functions {
            functions::register(&conn, name, function)
                .map_err(|e| Error::connection(NativeError::from(&e)))?;
        }

        if !extensions.is_empty() {
            load_extensions(&conn, extensions)?;
        }

        info!(
            filename,
            flags = flags.bits(),
            functions = functions.len(),
            extensions = extensions.len(),
            "opened sqlite3 connection"
        );

        Ok(Self {
            conn,
            params,
            last_error: RefCell::new(NativeError::ok()),
            encrypted,
        })
    }

    /// The native handle, for code that talks to the engine directly.
    pub fn wrapped_handle(&self) -> &rusqlite::Connection {
        &self.conn
    }

    /// Parameters this connection was opened with.
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Whether an encryption key was given and the engine accepted it.
    ///
    /// Builds without a cipher accept `PRAGMA key` silently, so this is
    /// `false` for them even when a key was configured.
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Compile `sql` into a statement.
    pub fn prepare(&self, sql: &str) -> Result<Sqlite3Statement<'_>> {
        debug!(sql, "preparing statement");
        let stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| Error::statement(self.record(&e)))?;
        self.clear_error();
        Ok(Sqlite3Statement::new(self, sql, stmt))
    }

    /// Prepare `sql` and execute it without parameters.
    pub fn query(&self, sql: &str) -> Result<Sqlite3Statement<'_>> {
        let mut stmt = self.prepare(sql)?;
        stmt.execute(None)?;
        Ok(stmt)
    }

    /// Render `value` as an SQL literal.
    ///
    /// Numbers come back as bare numerals since the engine types values,
    /// not columns; text is single-quoted with embedded quotes doubled.
    /// `_ty` is accepted for callers of the host contract and not used.
    pub fn quote(&self, value: &Value, _ty: ParamType) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Text(s) => quote_text(s),
            Value::Boolean(true) => "'1'".to_string(),
            Value::Boolean(false) => "''".to_string(),
            Value::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
        }
    }

    /// Run every statement in `sql` and return the rows changed by the
    /// last write.
    pub fn exec(&self, sql: &str) -> Result<u64> {
        debug!(sql, "executing");
        self.conn
            .execute_batch(sql)
            .map_err(|e| Error::statement(self.record(&e)))?;
        self.clear_error();
        Ok(self.changes())
    }

    /// Rowid assigned by the most recent successful insert.
    pub fn last_insert_id(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    pub fn begin_transaction(&self) -> Result<()> {
        self.transaction_control("BEGIN TRANSACTION")
    }

    pub fn commit(&self) -> Result<()> {
        self.transaction_control("COMMIT")
    }

    pub fn roll_back(&self) -> Result<()> {
        self.transaction_control("ROLLBACK")
    }

    pub fn is_autocommit(&self) -> bool {
        self.conn.is_autocommit()
    }

    /// Result code of the most recent call into the engine: 0 after a
    /// success, the failure's code otherwise.
    pub fn error_code(&self) -> i32 {
        self.last_error.borrow().code
    }

    /// Message matching [`error_code`](Self::error_code).
    pub fn error_message(&self) -> String {
        self.last_error.borrow().message.clone()
    }

    /// Close the handle, reporting any failure the engine returns.
    pub fn close(self) -> Result<()> {
        let filename = self.params.filename().unwrap_or_default().to_string();
        self.conn.close().map_err(|(_, e)| {
            warn!(filename = %filename, error = %e, "failed to close sqlite3 connection");
            Error::connection(NativeError::from(&e))
        })?;
        info!(filename = %filename, "closed sqlite3 connection");
        Ok(())
    }

    /// Rows changed by the most recent INSERT, UPDATE or DELETE.
    pub(crate) fn changes(&self) -> u64 {
        self.conn.changes() as u64
    }

    /// Remember `err` as the handle's last error and hand it back.
    pub(crate) fn record(&self, err: impl Into<NativeError>) -> NativeError {
        let native = err.into();
        *self.last_error.borrow_mut() = native.clone();
        native
    }

    pub(crate) fn clear_error(&self) {
        *self.last_error.borrow_mut() = NativeError::ok();
    }

    fn transaction_control(&self, sql: &str) -> Result<()> {
        debug!(sql, "transaction control");
        self.conn
            .execute_batch(sql)
            .map_err(|e| Error::transaction(self.record(&e)))?;
        self.clear_error();
        Ok(())
    }
}

impl std::fmt::Debug for Sqlite3Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sqlite3Connection")
            .field("params", &self.params)
            .field("last_error", &self.last_error.borrow())
            .finish_non_exhaustive()
    }
}

fn load_extensions(conn: &rusqlite::Connection, extensions: &[PathBuf]) -> Result<()> {
    // SAFETY: extension loading is switched on only for the duration of the
    // guard, and only for paths the caller configured on the driver.
    let _guard = unsafe { LoadExtensionGuard::new(conn) }
        .map_err(|e| Error::connection(NativeError::from(&e)))?;
    for extension in extensions {
        let path = extension.as_path();
        debug!(extension = %path.display(), "loading extension");
        // SAFETY: see above.
        unsafe { conn.load_extension(path, None) }.map_err(|e| Error::Connection {
            message: format!("failed to load extension {}: {e}", path.display()),
            code: NativeError::from(&e).code,
        })?;
    }
    Ok(())
}

/// Send `key` to the engine and report whether it understood it.
///
/// Cipher builds answer `PRAGMA cipher_version`; plain builds return no
/// row for unknown pragmas.
fn apply_key(conn: &rusqlite::Connection, filename: &str, key: &str) -> Result<bool> {
    conn.execute_batch(&format!("PRAGMA key = {}", quote_text(key)))
        .map_err(|e| Error::connection(NativeError::from(&e)))?;
    let cipher = conn
        .query_row("PRAGMA cipher_version", [], |row| row.get::<_, Option<String>>(0))
        .optional()
        .map_err(|e| Error::connection(NativeError::from(&e)))?
        .flatten();
    match cipher {
        Some(version) => {
            debug!(filename, cipher = %version, "applied encryption key");
            Ok(true)
        }
        None => {
            warn!(
                filename,
                "encryption key ignored: this SQLite build has no cipher, database is not encrypted"
            );
            Ok(false)
        }
    }
}

/// Single-quote `s` for SQL, doubling any quote inside it.
fn quote_text(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
