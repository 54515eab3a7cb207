use tracing::debug;

use crate::config::{ConnectionParams, DriverOptions};
use crate::error::Result;
use crate::sqlite::connection::Sqlite3Connection;
use crate::sqlite::functions;

/// Name the driver reports to the abstraction layer.
pub const DRIVER_NAME: &str = "sqlite3";

/// Opens [`Sqlite3Connection`]s.
///
/// The function and extension tables are fixed when the driver is built:
/// the built-in `sqrt`, `mod` and `locate` functions overlaid with the
/// caller's [`DriverOptions`].
#[derive(Debug, Clone)]
pub struct Sqlite3Driver {
    options: DriverOptions,
}

impl Sqlite3Driver {
    /// Driver with only the built-in functions.
    pub fn new() -> Self {
        Self {
            options: DriverOptions {
                user_defined_functions: functions::builtins(),
                user_defined_extensions: Vec::new(),
            },
        }
    }

    /// Driver with `options` merged over the built-ins.
    pub fn with_options(options: DriverOptions) -> Self {
        Self {
            options: Self::new().options.merged(&options),
        }
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// Open the database named by `params`.
    pub fn connect(&self, params: &ConnectionParams) -> Result<Sqlite3Connection> {
        Self::open(params, &self.options)
    }

    /// Like [`connect`](Self::connect), with `options` applied on top of
    /// the driver's own for this connection only.
    pub fn connect_with_options(
        &self,
        params: &ConnectionParams,
        options: &DriverOptions,
    ) -> Result<Sqlite3Connection> {
        Self::open(params, &self.options.merged(options))
    }

    pub fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    /// Database name `conn` was opened with: its `dbname`, else its
    /// `path`. In-memory connections have none.
    pub fn database<'c>(&self, conn: &'c Sqlite3Connection) -> Option<&'c str> {
        conn.params().database()
    }

    fn open(params: &ConnectionParams, options: &DriverOptions) -> Result<Sqlite3Connection> {
        let filename = params.filename()?;
        debug!(filename, "connecting");
        Sqlite3Connection::open(
            filename,
            params.clone(),
            &options.user_defined_functions,
            &options.user_defined_extensions,
        )
    }
}

impl Default for Sqlite3Driver {
    fn default() -> Self {
        Self::new()
    }
}
