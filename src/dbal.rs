//! Interfaces the abstraction layer programs against.
//!
//! A [`Driver`] opens [`Connection`]s, a connection prepares
//! [`Statement`]s. The sqlite3 types implement these by delegating to
//! their inherent methods.

use crate::config::ConnectionParams;
use crate::error::Result;
use crate::row::Row;
use crate::sqlite::{
    ParamCell, ParamKey, Params, Sqlite3Connection, Sqlite3Driver, Sqlite3Statement, Value,
};
use crate::types::{FetchStyle, ParamType};

pub trait Driver {
    type Connection: Connection;

    fn connect(&self, params: &ConnectionParams) -> Result<Self::Connection>;

    fn name(&self) -> &str;

    fn database<'c>(&self, conn: &'c Self::Connection) -> Option<&'c str>;
}

pub trait Connection {
    type Statement<'conn>: Statement
    where
        Self: 'conn;

    fn prepare(&self, sql: &str) -> Result<Self::Statement<'_>>;

    fn query(&self, sql: &str) -> Result<Self::Statement<'_>>;

    fn quote(&self, value: &Value, ty: ParamType) -> String;

    fn exec(&self, sql: &str) -> Result<u64>;

    fn last_insert_id(&self) -> i64;

    fn begin_transaction(&self) -> Result<()>;

    fn commit(&self) -> Result<()>;

    fn roll_back(&self) -> Result<()>;

    fn error_code(&self) -> i32;

    fn error_message(&self) -> String;
}

pub trait Statement {
    fn bind_value(&mut self, key: ParamKey, value: Value, ty: Option<ParamType>) -> Result<()>;

    fn bind_param(&mut self, key: ParamKey, cell: &ParamCell, ty: Option<ParamType>)
        -> Result<()>;

    fn execute(&mut self, params: Option<&Params>) -> Result<()>;

    fn fetch(&mut self, style: Option<FetchStyle>) -> Result<Option<Row>>;

    fn fetch_all(&mut self, style: Option<FetchStyle>) -> Result<Vec<Row>>;

    fn fetch_column(&mut self, index: usize) -> Result<Option<Value>>;

    fn close_cursor(&mut self) -> Result<bool>;

    fn row_count(&self) -> Result<u64>;

    fn column_count(&self) -> Result<usize>;

    fn set_fetch_mode(&mut self, style: FetchStyle) -> Result<()>;

    fn error_code(&self) -> i32;

    fn error_message(&self) -> String;
}

impl Driver for Sqlite3Driver {
    type Connection = Sqlite3Connection;

    fn connect(&self, params: &ConnectionParams) -> Result<Sqlite3Connection> {
        Sqlite3Driver::connect(self, params)
    }

    fn name(&self) -> &str {
        Sqlite3Driver::name(self)
    }

    fn database<'c>(&self, conn: &'c Sqlite3Connection) -> Option<&'c str> {
        Sqlite3Driver::database(self, conn)
    }
}

impl Connection for Sqlite3Connection {
    type Statement<'conn> = Sqlite3Statement<'conn>;

    fn prepare(&self, sql: &str) -> Result<Sqlite3Statement<'_>> {
        Sqlite3Connection::prepare(self, sql)
    }

    fn query(&self, sql: &str) -> Result<Sqlite3Statement<'_>> {
        Sqlite3Connection::query(self, sql)
    }

    fn quote(&self, value: &Value, ty: ParamType) -> String {
        Sqlite3Connection::quote(self, value, ty)
    }

    fn exec(&self, sql: &str) -> Result<u64> {
        Sqlite3Connection::exec(self, sql)
    }

    fn last_insert_id(&self) -> i64 {
        Sqlite3Connection::last_insert_id(self)
    }

    fn begin_transaction(&self) -> Result<()> {
        Sqlite3Connection::begin_transaction(self)
    }

    fn commit(&self) -> Result<()> {
        Sqlite3Connection::commit(self)
    }

    fn roll_back(&self) -> Result<()> {
        Sqlite3Connection::roll_back(self)
    }

    fn error_code(&self) -> i32 {
        Sqlite3Connection::error_code(self)
    }

    fn error_message(&self) -> String {
        Sqlite3Connection::error_message(self)
    }
}

impl Statement for Sqlite3Statement<'_> {
    fn bind_value(&mut self, key: ParamKey, value: Value, ty: Option<ParamType>) -> Result<()> {
        Sqlite3Statement::bind_value(self, key, value, ty)
    }

    fn bind_param(
        &mut self,
        key: ParamKey,
        cell: &ParamCell,
        ty: Option<ParamType>,
    ) -> Result<()> {
        Sqlite3Statement::bind_param(self, key, cell, ty)
    }

    fn execute(&mut self, params: Option<&Params>) -> Result<()> {
        Sqlite3Statement::execute(self, params)
    }

    fn fetch(&mut self, style: Option<FetchStyle>) -> Result<Option<Row>> {
        Sqlite3Statement::fetch(self, style)
    }

    fn fetch_all(&mut self, style: Option<FetchStyle>) -> Result<Vec<Row>> {
        Sqlite3Statement::fetch_all(self, style)
    }

    fn fetch_column(&mut self, index: usize) -> Result<Option<Value>> {
        Sqlite3Statement::fetch_column(self, index)
    }

    fn close_cursor(&mut self) -> Result<bool> {
        Sqlite3Statement::close_cursor(self)
    }

    fn row_count(&self) -> Result<u64> {
        Sqlite3Statement::row_count(self)
    }

    fn column_count(&self) -> Result<usize> {
        Sqlite3Statement::column_count(self)
    }

    fn set_fetch_mode(&mut self, style: FetchStyle) -> Result<()> {
        Sqlite3Statement::set_fetch_mode(self, style)
    }

    fn error_code(&self) -> i32 {
        Sqlite3Statement::error_code(self)
    }

    fn error_message(&self) -> String {
        Sqlite3Statement::error_message(self)
    }
}
