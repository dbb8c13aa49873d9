//! SQLite / embedded-file adapter over `rusqlite`.
//!
//! `rusqlite::Connection` is synchronous; every call is dispatched through
//! `tokio::task::spawn_blocking` so the async core never blocks its
//! executor on file I/O.

use crate::connection::provider::{ColumnMeta, RawConnection, RawConnector, RawRow, RawRows};
use crate::error::{Error, Result};
use crate::value::{DbType, Value};
use async_trait::async_trait;
use std::borrow::Cow;
use std::sync::{Arc, Mutex};

pub struct SqliteConnector;

#[async_trait]
impl RawConnector for SqliteConnector {
    async fn connect(&self, connection_string: &str) -> Result<Box<dyn RawConnection>> {
        Ok(Box::new(SqliteConnection { path: connection_string.to_string(), conn: None }))
    }
}

pub struct SqliteConnection {
    path: String,
    conn: Option<Arc<Mutex<rusqlite::Connection>>>,
}

#[async_trait]
impl RawConnection for SqliteConnection {
    async fn open(&mut self) -> Result<()> {
        let path = self.path.clone();
        let conn = tokio::task::spawn_blocking(move || {
            if path.contains(":memory:") {
                rusqlite::Connection::open_in_memory()
            } else {
                rusqlite::Connection::open(&path)
            }
        })
        .await
        .map_err(|e| Error::ConnectionFailed(e.to_string()))?
        .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        self.conn = Some(Arc::new(Mutex::new(conn)));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.conn = None;
        Ok(())
    }

    fn is_broken(&self) -> bool {
        self.conn.is_none()
    }

    async fn execute_raw(&mut self, sql: &str, params: &[Value<'static>]) -> Result<u64> {
        let conn = self.conn.clone().ok_or_else(|| Error::provider("connection not open"))?;
        let sql = sql.to_string();
        let bound: Vec<SqliteValue> = params.iter().map(SqliteValue::from).collect();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap();
            let refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
            guard.execute(&sql, refs.as_slice()).map(|n| n as u64)
        })
        .await
        .map_err(|e| Error::provider(e.to_string()))?
        .map_err(|e| Error::provider_with_source("sqlite execute failed", e))
    }

    async fn query_raw(&mut self, sql: &str, params: &[Value<'static>]) -> Result<RawRows> {
        let conn = self.conn.clone().ok_or_else(|| Error::provider("connection not open"))?;
        let sql = sql.to_string();
        let bound: Vec<SqliteValue> = params.iter().map(SqliteValue::from).collect();
        tokio::task::spawn_blocking(move || -> rusqlite::Result<RawRows> {
            let guard = conn.lock().unwrap();
            let mut stmt = guard.prepare(&sql)?;
            let column_count = stmt.column_count();
            let columns: Vec<ColumnMeta> = (0..column_count)
                .map(|i| ColumnMeta {
                    name: stmt.column_name(i).unwrap_or("").to_string(),
                    db_type: decl_type_to_db_type(stmt.column_decltype(i)),
                })
                .collect();
            let refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
            let mut rows_cursor = stmt.query(refs.as_slice())?;
            let mut rows = Vec::new();
            while let Some(row) = rows_cursor.next()? {
                let mut values = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    values.push(sqlite_value_at(row, i));
                }
                rows.push(RawRow { values });
            }
            Ok(RawRows { columns, rows })
        })
        .await
        .map_err(|e| Error::provider(e.to_string()))?
        .map_err(|e| Error::provider_with_source("sqlite query failed", e))
    }

    async fn begin(&mut self) -> Result<()> {
        self.execute_raw("BEGIN", &[]).await.map(|_| ())
    }

    async fn commit(&mut self) -> Result<()> {
        self.execute_raw("COMMIT", &[]).await.map(|_| ())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.execute_raw("ROLLBACK", &[]).await.map(|_| ())
    }
}

enum SqliteValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<&Value<'static>> for SqliteValue {
    fn from(v: &Value<'static>) -> Self {
        match v {
            Value::Null => SqliteValue::Null,
            Value::Boolean(b) => SqliteValue::Integer(if *b { 1 } else { 0 }),
            Value::Int32(i) => SqliteValue::Integer(*i as i64),
            Value::Int64(i) => SqliteValue::Integer(*i),
            Value::Float(f) => SqliteValue::Real(*f as f64),
            Value::Double(d) => SqliteValue::Real(*d),
            Value::Numeric(n) => SqliteValue::Text(n.to_string()),
            Value::Text(s) => SqliteValue::Text(s.to_string()),
            Value::Bytes(b) => SqliteValue::Blob(b.to_vec()),
            Value::Date(d) => SqliteValue::Text(d.to_string()),
            Value::Time(t) => SqliteValue::Text(t.to_string()),
            Value::DateTime(dt) => SqliteValue::Text(dt.to_rfc3339()),
            Value::Json(j) => SqliteValue::Text(j.to_string()),
            Value::Uuid(u) => SqliteValue::Text(u.to_string()),
            Value::Array(_) | Value::Opaque { .. } => SqliteValue::Text(format!("{v:?}")),
        }
    }
}

impl rusqlite::ToSql for SqliteValue {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, Value as SqlVal};
        Ok(match self {
            SqliteValue::Null => ToSqlOutput::Owned(SqlVal::Null),
            SqliteValue::Integer(i) => ToSqlOutput::Owned(SqlVal::Integer(*i)),
            SqliteValue::Real(r) => ToSqlOutput::Owned(SqlVal::Real(*r)),
            SqliteValue::Text(s) => ToSqlOutput::Owned(SqlVal::Text(s.clone())),
            SqliteValue::Blob(b) => ToSqlOutput::Owned(SqlVal::Blob(b.clone())),
        })
    }
}

fn decl_type_to_db_type(decl: Option<&str>) -> DbType {
    match decl.map(str::to_ascii_uppercase).as_deref() {
        Some("INTEGER") | Some("INT") => DbType::Int64,
        Some("REAL") | Some("DOUBLE") | Some("FLOAT") => DbType::Double,
        Some("BLOB") => DbType::Binary,
        Some("BOOLEAN") => DbType::Boolean,
        _ => DbType::String,
    }
}

fn sqlite_value_at(row: &rusqlite::Row, idx: usize) -> Value<'static> {
    use rusqlite::types::ValueRef;
    match row.get_ref_unwrap(idx) {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(r) => Value::Double(r),
        ValueRef::Text(t) => Value::Text(Cow::Owned(String::from_utf8_lossy(t).into_owned())),
        ValueRef::Blob(b) => Value::Bytes(Cow::Owned(b.to_vec())),
    }
}
