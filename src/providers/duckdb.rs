//! DuckDB adapter over the `duckdb` crate.
//!
//! Same `spawn_blocking` bridge as [`crate::providers::sqlite`] — the
//! `duckdb` crate exposes a synchronous `rusqlite`-flavored API and offers
//! no async runtime integration of its own.

use crate::connection::provider::{ColumnMeta, RawConnection, RawConnector, RawRow, RawRows};
use crate::error::{Error, Result};
use crate::value::{DbType, Value};
use async_trait::async_trait;
use std::borrow::Cow;
use std::sync::{Arc, Mutex};

pub struct DuckDbConnector;

#[async_trait]
impl RawConnector for DuckDbConnector {
    async fn connect(&self, connection_string: &str) -> Result<Box<dyn RawConnection>> {
        Ok(Box::new(DuckDbConnection { path: connection_string.to_string(), conn: None }))
    }
}

pub struct DuckDbConnection {
    path: String,
    conn: Option<Arc<Mutex<duckdb::Connection>>>,
}

#[async_trait]
impl RawConnection for DuckDbConnection {
    async fn open(&mut self) -> Result<()> {
        let path = self.path.clone();
        let conn = tokio::task::spawn_blocking(move || {
            if path.is_empty() || path == ":memory:" {
                duckdb::Connection::open_in_memory()
            } else {
                duckdb::Connection::open(&path)
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
        let bound: Vec<DuckDbValue> = params.iter().map(DuckDbValue::from).collect();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap();
            let refs: Vec<&dyn duckdb::ToSql> = bound.iter().map(|v| v as &dyn duckdb::ToSql).collect();
            guard.execute(&sql, refs.as_slice()).map(|n| n as u64)
        })
        .await
        .map_err(|e| Error::provider(e.to_string()))?
        .map_err(|e| Error::provider_with_source("duckdb execute failed", e))
    }

    async fn query_raw(&mut self, sql: &str, params: &[Value<'static>]) -> Result<RawRows> {
        let conn = self.conn.clone().ok_or_else(|| Error::provider("connection not open"))?;
        let sql = sql.to_string();
        let bound: Vec<DuckDbValue> = params.iter().map(DuckDbValue::from).collect();
        tokio::task::spawn_blocking(move || -> duckdb::Result<RawRows> {
            let guard = conn.lock().unwrap();
            let mut stmt = guard.prepare(&sql)?;
            let column_count = stmt.column_count();
            let columns: Vec<ColumnMeta> = (0..column_count)
                .map(|i| ColumnMeta {
                    name: stmt.column_name(i).map(|s| s.to_string()).unwrap_or_default(),
                    db_type: decl_type_to_db_type(stmt.column_decltype(i)),
                })
                .collect();
            let refs: Vec<&dyn duckdb::ToSql> = bound.iter().map(|v| v as &dyn duckdb::ToSql).collect();
            let mut rows_cursor = stmt.query(refs.as_slice())?;
            let mut rows = Vec::new();
            while let Some(row) = rows_cursor.next()? {
                let mut values = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    values.push(duckdb_value_at(row, i));
                }
                rows.push(RawRow { values });
            }
            Ok(RawRows { columns, rows })
        })
        .await
        .map_err(|e| Error::provider(e.to_string()))?
        .map_err(|e| Error::provider_with_source("duckdb query failed", e))
    }

    async fn begin(&mut self) -> Result<()> {
        self.execute_raw("BEGIN TRANSACTION", &[]).await.map(|_| ())
    }

    async fn commit(&mut self) -> Result<()> {
        self.execute_raw("COMMIT", &[]).await.map(|_| ())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.execute_raw("ROLLBACK", &[]).await.map(|_| ())
    }
}

enum DuckDbValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<&Value<'static>> for DuckDbValue {
    fn from(v: &Value<'static>) -> Self {
        match v {
            Value::Null => DuckDbValue::Null,
            Value::Boolean(b) => DuckDbValue::Integer(if *b { 1 } else { 0 }),
            Value::Int32(i) => DuckDbValue::Integer(*i as i64),
            Value::Int64(i) => DuckDbValue::Integer(*i),
            Value::Float(f) => DuckDbValue::Real(*f as f64),
            Value::Double(d) => DuckDbValue::Real(*d),
            Value::Numeric(n) => DuckDbValue::Text(n.to_string()),
            Value::Text(s) => DuckDbValue::Text(s.to_string()),
            Value::Bytes(b) => DuckDbValue::Blob(b.to_vec()),
            Value::Date(d) => DuckDbValue::Text(d.to_string()),
            Value::Time(t) => DuckDbValue::Text(t.to_string()),
            Value::DateTime(dt) => DuckDbValue::Text(dt.to_rfc3339()),
            Value::Json(j) => DuckDbValue::Text(j.to_string()),
            Value::Uuid(u) => DuckDbValue::Text(u.to_string()),
            Value::Array(_) | Value::Opaque { .. } => DuckDbValue::Text(format!("{v:?}")),
        }
    }
}

impl duckdb::ToSql for DuckDbValue {
    fn to_sql(&self) -> duckdb::Result<duckdb::types::ToSqlOutput<'_>> {
        use duckdb::types::{ToSqlOutput, Value as DVal};
        Ok(match self {
            DuckDbValue::Null => ToSqlOutput::Owned(DVal::Null),
            DuckDbValue::Integer(i) => ToSqlOutput::Owned(DVal::BigInt(*i)),
            DuckDbValue::Real(r) => ToSqlOutput::Owned(DVal::Double(*r)),
            DuckDbValue::Text(s) => ToSqlOutput::Owned(DVal::Text(s.clone())),
            DuckDbValue::Blob(b) => ToSqlOutput::Owned(DVal::Blob(b.clone())),
        })
    }
}

fn decl_type_to_db_type(decl: Option<&str>) -> DbType {
    match decl.map(str::to_ascii_uppercase).as_deref() {
        Some("BIGINT") | Some("INTEGER") | Some("INT") => DbType::Int64,
        Some("DOUBLE") | Some("REAL") | Some("FLOAT") => DbType::Double,
        Some("BLOB") => DbType::Binary,
        Some("BOOLEAN") => DbType::Boolean,
        _ => DbType::String,
    }
}

fn duckdb_value_at(row: &duckdb::Row, idx: usize) -> Value<'static> {
    use duckdb::types::ValueRef;
    match row.get_ref_unwrap(idx) {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Boolean(b),
        ValueRef::BigInt(i) => Value::Int64(i),
        ValueRef::Int(i) => Value::Int32(i),
        ValueRef::Double(d) => Value::Double(d),
        ValueRef::Float(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(Cow::Owned(String::from_utf8_lossy(t).into_owned())),
        ValueRef::Blob(b) => Value::Bytes(Cow::Owned(b.to_vec())),
        _ => Value::Null,
    }
}
