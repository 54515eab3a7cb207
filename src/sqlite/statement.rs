use std::collections::BTreeMap;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;
use std::sync::Arc;

use rusqlite::ffi;
use tracing::debug;

use crate::error::{Error, NativeError, Result};
use crate::row::Row;
use crate::sqlite::connection::Sqlite3Connection;
use crate::sqlite::{ParamCell, ParamKey, Params, Value};
use crate::types::{FetchStyle, ParamType};

/// What a placeholder is bound to until the next execution reads it.
enum Binding {
    Value(rusqlite::types::Value),
    Cell(ParamCell, Option<ParamType>),
}

impl Binding {
    fn native(&self) -> rusqlite::types::Value {
        match self {
            Binding::Value(value) => value.clone(),
            Binding::Cell(cell, ty) => cell.get().to_native(*ty),
        }
    }
}

/// Live cursor over the latest execution.
///
/// `peeked` holds the row stepped by `execute` until it is fetched.
struct ResultCursor<'conn> {
    rows: rusqlite::Rows<'conn>,
    columns: Arc<[String]>,
    peeked: Option<Vec<Value>>,
}

impl ResultCursor<'_> {
    fn advance(&mut self) -> rusqlite::Result<Option<Vec<Value>>> {
        match self.peeked.take() {
            Some(values) => Ok(Some(values)),
            None => self.step(),
        }
    }

    fn step(&mut self) -> rusqlite::Result<Option<Vec<Value>>> {
        let width = self.columns.len();
        let Some(row) = self.rows.next()? else {
            return Ok(None);
        };
        (0..width)
            .map(|i| row.get_ref(i).map(Value::from))
            .collect::<rusqlite::Result<Vec<_>>>()
            .map(Some)
    }
}

/// A boxed native statement and the cursor stepping it.
///
/// The cursor borrows the statement, so the box is held as a raw pointer.
/// The statement is only borrowed mutably once the cursor is gone, and the
/// cursor is always dropped before the box is freed.
struct NativeStatement<'conn> {
    stmt: NonNull<rusqlite::Statement<'conn>>,
    cursor: Option<ResultCursor<'conn>>,
}

impl<'conn> NativeStatement<'conn> {
    fn new(stmt: rusqlite::Statement<'conn>) -> Self {
        Self {
            stmt: NonNull::from(Box::leak(Box::new(stmt))),
            cursor: None,
        }
    }

    fn get(&self) -> &rusqlite::Statement<'conn> {
        // SAFETY: the box lives as long as `self` and a live cursor only
        // holds a shared borrow.
        unsafe { self.stmt.as_ref() }
    }

    /// Mutable access, ending (and resetting) any live cursor first.
    fn get_mut(&mut self) -> &mut rusqlite::Statement<'conn> {
        self.cursor = None;
        // SAFETY: no cursor is left that borrows the statement.
        unsafe { self.stmt.as_mut() }
    }

    /// Replace the cursor with a fresh one and step it once.
    fn start(&mut self, columns: Arc<[String]>) -> rusqlite::Result<()> {
        self.cursor = None;
        // SAFETY: the only borrow handed out is owned by the cursor, which
        // is dropped before the box in `finalize` and `Drop`.
        let stmt: &'conn mut rusqlite::Statement<'conn> = unsafe { &mut *self.stmt.as_ptr() };
        let mut cursor = ResultCursor {
            rows: stmt.raw_query(),
            columns,
            peeked: None,
        };
        cursor.peeked = cursor.step()?;
        self.cursor = Some(cursor);
        Ok(())
    }

    fn finalize(self) -> rusqlite::Result<()> {
        let mut this = ManuallyDrop::new(self);
        this.cursor = None;
        // SAFETY: the pointer came from `Box::leak` in `new`, and `Drop`
        // does not run for `this`.
        let stmt = unsafe { Box::from_raw(this.stmt.as_ptr()) };
        stmt.finalize()
    }
}

impl Drop for NativeStatement<'_> {
    fn drop(&mut self) {
        self.cursor = None;
        // SAFETY: the pointer came from `Box::leak` in `new` and is freed
        // only here or in `finalize`.
        drop(unsafe { Box::from_raw(self.stmt.as_ptr()) });
    }
}

/// A compiled statement and the cursor of its latest execution.
///
/// Lifecycle: bind any number of parameters, `execute`, fetch rows, and
/// execute again as often as needed. Values bound with [`bind_value`]
/// stay bound across executions; cells bound with [`bind_param`] are read
/// again at every execution. After [`close`] every operation fails with
/// [`Error::StatementClosed`].
///
/// `execute` steps the first row, so writes and their errors land there.
/// Later rows are stepped one at a time as they are fetched.
///
/// [`bind_value`]: Sqlite3Statement::bind_value
/// [`bind_param`]: Sqlite3Statement::bind_param
/// [`close`]: Sqlite3Statement::close
pub struct Sqlite3Statement<'conn> {
    conn: &'conn Sqlite3Connection,
    sql: String,
    native: Option<NativeStatement<'conn>>,
    bindings: BTreeMap<usize, Binding>,
    default_fetch_style: FetchStyle,
}

impl<'conn> Sqlite3Statement<'conn> {
    pub(crate) fn new(
        conn: &'conn Sqlite3Connection,
        sql: &str,
        stmt: rusqlite::Statement<'conn>,
    ) -> Self {
        Self {
            conn,
            sql: sql.to_string(),
            native: Some(NativeStatement::new(stmt)),
            bindings: BTreeMap::new(),
            default_fetch_style: FetchStyle::default(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn is_closed(&self) -> bool {
        self.native.is_none()
    }

    /// Number of placeholders in the statement.
    pub fn parameter_count(&self) -> Result<usize> {
        Ok(self.native()?.get().parameter_count())
    }

    /// Bind `value` for the next `execute`. It stays bound until rebound.
    pub fn bind_value(
        &mut self,
        key: impl Into<ParamKey>,
        value: impl Into<Value>,
        ty: Option<ParamType>,
    ) -> Result<()> {
        let index = self.resolve(&key.into())?;
        let native = value.into().to_native(ty);
        self.bindings.insert(index, Binding::Value(native));
        Ok(())
    }

    /// Bind `cell` by reference: its content is read at every `execute`.
    pub fn bind_param(
        &mut self,
        key: impl Into<ParamKey>,
        cell: &ParamCell,
        ty: Option<ParamType>,
    ) -> Result<()> {
        let index = self.resolve(&key.into())?;
        self.bindings.insert(index, Binding::Cell(cell.clone(), ty));
        Ok(())
    }

    /// Run the statement, binding `params` first if given.
    ///
    /// Replaces the cursor of any earlier execution.
    pub fn execute(&mut self, params: Option<&Params>) -> Result<()> {
        if let Some(params) = params {
            for (key, value) in &params.values {
                self.bind_value(key.clone(), value.clone(), None)?;
            }
        }

        let conn = self.conn;
        let native = self.native.as_mut().ok_or(Error::StatementClosed)?;
        let stmt = native.get_mut();
        for (index, binding) in &self.bindings {
            stmt.raw_bind_parameter(*index, binding.native())
                .map_err(|e| Error::statement(conn.record(&e)))?;
        }
        let columns: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let width = columns.len();

        native
            .start(columns)
            .map_err(|e| Error::statement(conn.record(&e)))?;
        conn.clear_error();
        debug!(sql = %self.sql, columns = width, "executed statement");
        Ok(())
    }

    /// Next row of the cursor, or `None` once it is exhausted or if the
    /// statement has not been executed.
    pub fn fetch(&mut self, style: Option<FetchStyle>) -> Result<Option<Row>> {
        let style = style.unwrap_or(self.default_fetch_style);
        let conn = self.conn;
        let Some(cursor) = self.native_mut()?.cursor.as_mut() else {
            return Ok(None);
        };
        let values = cursor
            .advance()
            .map_err(|e| Error::statement(conn.record(&e)))?;
        conn.clear_error();
        Ok(values.map(|values| Row::build(style, &cursor.columns, values)))
    }

    /// All remaining rows. Empty once the cursor is exhausted.
    pub fn fetch_all(&mut self, style: Option<FetchStyle>) -> Result<Vec<Row>> {
        let style = style.unwrap_or(self.default_fetch_style);
        let mut rows = Vec::new();
        while let Some(row) = self.fetch(Some(style))? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Column `index` (0-based) of the next row.
    ///
    /// An index past the last column fails without consuming the row.
    pub fn fetch_column(&mut self, index: usize) -> Result<Option<Value>> {
        let width = match self.native()?.cursor.as_ref() {
            Some(cursor) => cursor.columns.len(),
            None => return Ok(None),
        };
        if index >= width {
            let native = self.conn.record(NativeError::new(
                ffi::SQLITE_RANGE,
                format!("column index {index} out of range"),
            ));
            return Err(Error::statement(native));
        }
        Ok(self
            .fetch(Some(FetchStyle::Numeric))?
            .map(|row| row.into_values().swap_remove(index)))
    }

    /// Drop the current cursor. Returns `false` if there was none.
    ///
    /// The statement itself stays compiled and can be executed again.
    pub fn close_cursor(&mut self) -> Result<bool> {
        Ok(self.native_mut()?.cursor.take().is_some())
    }

    /// Rows changed by the connection's most recent write.
    ///
    /// The engine does not count result rows, so after a SELECT this still
    /// reports the last INSERT, UPDATE or DELETE.
    pub fn row_count(&self) -> Result<u64> {
        self.native()?;
        Ok(self.conn.changes())
    }

    /// Columns in the current cursor, 0 when there is none.
    pub fn column_count(&self) -> Result<usize> {
        Ok(self
            .native()?
            .cursor
            .as_ref()
            .map_or(0, |cursor| cursor.columns.len()))
    }

    /// Style used by `fetch` and `fetch_all` when none is given.
    pub fn set_fetch_mode(&mut self, style: FetchStyle) -> Result<()> {
        self.native()?;
        self.default_fetch_style = style;
        Ok(())
    }

    /// Remaining rows in the default fetch style, stepped as they are
    /// pulled.
    ///
    /// Single pass; execute again to start over.
    pub fn rows(&mut self) -> Result<RowIter<'_, 'conn>> {
        self.native()?;
        Ok(RowIter { stmt: self })
    }

    pub fn error_code(&self) -> i32 {
        self.conn.error_code()
    }

    pub fn error_message(&self) -> String {
        self.conn.error_message()
    }

    /// Finalize the compiled statement.
    pub fn close(&mut self) -> Result<()> {
        let native = self.native.take().ok_or(Error::StatementClosed)?;
        self.bindings.clear();
        native
            .finalize()
            .map_err(|e| Error::statement(self.conn.record(&e)))
    }

    fn native(&self) -> Result<&NativeStatement<'conn>> {
        self.native.as_ref().ok_or(Error::StatementClosed)
    }

    fn native_mut(&mut self) -> Result<&mut NativeStatement<'conn>> {
        self.native.as_mut().ok_or(Error::StatementClosed)
    }

    /// 1-based placeholder index for `key`.
    ///
    /// Bare names are looked up with a `:` prefix.
    fn resolve(&self, key: &ParamKey) -> Result<usize> {
        let stmt = self.native()?.get();
        let index = match key {
            ParamKey::Position(p) => Some(*p).filter(|p| (1..=stmt.parameter_count()).contains(p)),
            ParamKey::Name(name) => {
                let name = if name.starts_with([':', '@', '$']) {
                    name.clone()
                } else {
                    format!(":{name}")
                };
                stmt.parameter_index(&name)
                    .map_err(|e| Error::statement(self.conn.record(&e)))?
            }
        };
        index.ok_or_else(|| {
            Error::statement(self.conn.record(NativeError::new(
                ffi::SQLITE_RANGE,
                format!("unknown parameter {key}"),
            )))
        })
    }
}

impl std::fmt::Debug for Sqlite3Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sqlite3Statement")
            .field("sql", &self.sql)
            .field("closed", &self.is_closed())
            .field("default_fetch_style", &self.default_fetch_style)
            .finish_non_exhaustive()
    }
}

/// Iterator returned by [`Sqlite3Statement::rows`].
///
/// Each item is one `fetch` in the statement's default style; iteration
/// stops at the end of the cursor or after the first error.
pub struct RowIter<'stmt, 'conn> {
    stmt: &'stmt mut Sqlite3Statement<'conn>,
}

impl Iterator for RowIter<'_, '_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Result<Row>> {
        self.stmt.fetch(None).transpose()
    }
}
