//! [`GenericClient`] over an embedded SQLite database (`rusqlite`).

use crate::client::GenericClient;
use crate::error::{DbError, DbResult};
use crate::row::Row;
use rusqlite::Connection;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Number, Value};
use std::path::Path;
use std::sync::Mutex;

/// A single SQLite connection shared behind a mutex.
///
/// Statements run synchronously on the calling task; the returned future is
/// already complete when it is first polled.
pub struct SqliteClient {
    conn: Mutex<Connection>,
}

impl SqliteClient {
    /// Open a private in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory().map_err(DbError::from_sqlite)?;
        Self::from_connection(conn)
    }

    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let conn = Connection::open(path).map_err(DbError::from_sqlite)?;
        Self::from_connection(conn)
    }

    /// Wrap an existing connection. Foreign key enforcement is switched on.
    pub fn from_connection(conn: Connection) -> DbResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(DbError::from_sqlite)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run one or more `;`-separated statements without parameters (schema setup).
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(sql).map_err(DbError::from_sqlite)
    }

    fn lock(&self) -> DbResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DbError::backend("sqlite connection mutex poisoned"))
    }

    fn run(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(DbError::from_sqlite)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let bound: Vec<SqlValue> = params.iter().map(to_sql_value).collect();

        let mut rows = stmt
            .query(rusqlite::params_from_iter(bound.iter()))
            .map_err(DbError::from_sqlite)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(DbError::from_sqlite)? {
            let mut map = Row::with_capacity(names.len());
            for (idx, name) in names.iter().enumerate() {
                let value = row.get_ref(idx).map_err(DbError::from_sqlite)?;
                map.insert(name.clone(), from_sql_value(value));
            }
            out.push(map);
        }
        Ok(out)
    }
}

impl GenericClient for SqliteClient {
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = DbResult<Vec<Row>>> + Send {
        std::future::ready(self.run(sql, params))
    }
}

/// JSON parameter to SQLite storage class.
///
/// Booleans bind as 0/1; arrays and objects bind as JSON text.
fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(r) => Number::from_f64(r).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}
