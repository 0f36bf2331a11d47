//! SQL engine seam. [`SqliteEngine`] is the production engine; tests swap in an
//! instrumented fake through the [`SqlEngine`] trait.

use std::{ops::ControlFlow, path::Path};

use rusqlite::{Batch, Connection, types::ValueRef};

use crate::errors::EngineError;

pub const NULL_MARKER: &str = "NULL";

/// Status codes shared with the SQLite C API.
pub mod codes {
    pub const ERROR: i32 = rusqlite::ffi::SQLITE_ERROR;
    pub const ABORT: i32 = rusqlite::ffi::SQLITE_ABORT;
    pub const CANTOPEN: i32 = rusqlite::ffi::SQLITE_CANTOPEN;
}

/// One result row, borrowed for the duration of a visitor call.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    names: &'a [String],
    values: &'a [Option<String>],
}

impl<'a> Row<'a> {
    /// `names` and `values` must have the same length.
    pub fn new(names: &'a [String], values: &'a [Option<String>]) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self { names, values }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &'a [String] {
        self.names
    }

    pub fn values(&self) -> &'a [Option<String>] {
        self.values
    }

    /// Columns in result order; `None` is SQL NULL.
    pub fn columns(&self) -> impl Iterator<Item = (&'a str, Option<&'a str>)> + 'a {
        self.names
            .iter()
            .zip(self.values.iter())
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    pub fn get(&self, name: &str) -> Option<Option<&'a str>> {
        self.columns()
            .find(|(column, _)| *column == name)
            .map(|(_, value)| value)
    }
}

pub trait SqlEngine {
    type Handle;

    fn open(&self, path: &Path) -> Result<Self::Handle, EngineError>;

    /// Runs every statement in `sql` in order, calling `on_row` for each
    /// result row. A `Break` from `on_row` stops execution with an
    /// [`codes::ABORT`] error.
    fn exec(
        &self,
        handle: &mut Self::Handle,
        sql: &str,
        on_row: &mut dyn FnMut(Row<'_>) -> ControlFlow<()>,
    ) -> Result<(), EngineError>;

    fn close(&self, handle: Self::Handle) -> Result<(), EngineError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteEngine;

impl SqliteEngine {
    pub fn new() -> Self {
        Self
    }
}

impl SqlEngine for SqliteEngine {
    type Handle = Connection;

    fn open(&self, path: &Path) -> Result<Connection, EngineError> {
        Connection::open(path).map_err(EngineError::from)
    }

    fn exec(
        &self,
        handle: &mut Connection,
        sql: &str,
        on_row: &mut dyn FnMut(Row<'_>) -> ControlFlow<()>,
    ) -> Result<(), EngineError> {
        let conn: &Connection = handle;
        let mut batch = Batch::new(conn, sql);
        while let Some(mut stmt) = batch.next()? {
            let names: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(str::to_string)
                .collect();
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(names.len());
                for idx in 0..names.len() {
                    values.push(render_value(conn, row.get_ref(idx)?)?);
                }
                if on_row(Row::new(&names, &values)).is_break() {
                    return Err(EngineError::new(codes::ABORT, "query aborted"));
                }
            }
        }
        Ok(())
    }

    fn close(&self, handle: Connection) -> Result<(), EngineError> {
        handle.close().map_err(|(_, err)| EngineError::from(err))
    }
}

/// Text form of a column value as SQLite itself converts it. Reals go through
/// SQLite's formatter on `conn`, so `1e20` reads `1.0e+20`.
pub fn render_value(conn: &Connection, value: ValueRef<'_>) -> rusqlite::Result<Option<String>> {
    Ok(match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(
            conn.prepare_cached("SELECT CAST(?1 AS TEXT)")?
                .query_row([f], |row| row.get::<_, String>(0))?,
        ),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    })
}
