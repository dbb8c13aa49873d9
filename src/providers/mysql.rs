//! MySQL / MariaDb adapter over `mysql_async`.

use crate::connection::provider::{ColumnMeta, RawConnection, RawConnector, RawRow, RawRows};
use crate::error::{Error, Result};
use crate::value::{DbType, Value};
use async_trait::async_trait;
use mysql_async::prelude::Queryable as _;
use std::borrow::Cow;

pub struct MySqlConnector;

#[async_trait]
impl RawConnector for MySqlConnector {
    async fn connect(&self, connection_string: &str) -> Result<Box<dyn RawConnection>> {
        let opts = mysql_async::Opts::from_url(connection_string).map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        Ok(Box::new(MySqlConnection { opts, conn: None }))
    }
}

pub struct MySqlConnection {
    opts: mysql_async::Opts,
    conn: Option<mysql_async::Conn>,
}

#[async_trait]
impl RawConnection for MySqlConnection {
    async fn open(&mut self) -> Result<()> {
        let conn = mysql_async::Conn::new(self.opts.clone())
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        self.conn = Some(conn);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            let _ = conn.disconnect().await;
        }
        Ok(())
    }

    fn is_broken(&self) -> bool {
        self.conn.is_none()
    }

    async fn execute_raw(&mut self, sql: &str, params: &[Value<'static>]) -> Result<u64> {
        let conn = self.conn.as_mut().ok_or_else(|| Error::provider("connection not open"))?;
        let bound = to_mysql_params(params);
        conn.exec_drop(sql, bound)
            .await
            .map_err(|e| Error::provider_with_source("mysql execute failed", e))?;
        Ok(conn.affected_rows())
    }

    async fn query_raw(&mut self, sql: &str, params: &[Value<'static>]) -> Result<RawRows> {
        let conn = self.conn.as_mut().ok_or_else(|| Error::provider("connection not open"))?;
        let bound = to_mysql_params(params);
        let result: Vec<mysql_async::Row> = conn
            .exec(sql, bound)
            .await
            .map_err(|e| Error::provider_with_source("mysql query failed", e))?;

        let columns = result
            .first()
            .map(|row| {
                row.columns_ref()
                    .iter()
                    .map(|c| ColumnMeta { name: c.name_str().into_owned(), db_type: mysql_col_to_db_type(c) })
                    .collect()
            })
            .unwrap_or_default();

        let mut out = Vec::with_capacity(result.len());
        for row in result {
            let mut values = Vec::with_capacity(row.len());
            for i in 0..row.len() {
                values.push(mysql_value_at(&row, i));
            }
            out.push(RawRow { values });
        }
        Ok(RawRows { columns, rows: out })
    }

    async fn begin(&mut self) -> Result<()> {
        self.execute_raw("START TRANSACTION", &[]).await.map(|_| ())
    }

    async fn commit(&mut self) -> Result<()> {
        self.execute_raw("COMMIT", &[]).await.map(|_| ())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.execute_raw("ROLLBACK", &[]).await.map(|_| ())
    }
}

fn to_mysql_params(params: &[Value<'static>]) -> mysql_async::Params {
    if params.is_empty() {
        return mysql_async::Params::Empty;
    }
    let values: Vec<mysql_async::Value> = params
        .iter()
        .map(|v| match v {
            Value::Null => mysql_async::Value::NULL,
            Value::Boolean(b) => mysql_async::Value::Int(if *b { 1 } else { 0 }),
            Value::Int32(i) => mysql_async::Value::Int(*i as i64),
            Value::Int64(i) => mysql_async::Value::Int(*i),
            Value::Float(f) => mysql_async::Value::Float(*f),
            Value::Double(d) => mysql_async::Value::Double(*d),
            Value::Numeric(n) => mysql_async::Value::Bytes(n.to_string().into_bytes()),
            Value::Text(s) => mysql_async::Value::Bytes(s.as_bytes().to_vec()),
            Value::Bytes(b) => mysql_async::Value::Bytes(b.to_vec()),
            Value::Date(d) => mysql_async::Value::Bytes(d.to_string().into_bytes()),
            Value::Time(t) => mysql_async::Value::Bytes(t.to_string().into_bytes()),
            Value::DateTime(dt) => mysql_async::Value::Bytes(dt.to_rfc3339().into_bytes()),
            Value::Json(j) => mysql_async::Value::Bytes(j.to_string().into_bytes()),
            Value::Uuid(u) => mysql_async::Value::Bytes(u.to_string().into_bytes()),
            Value::Array(_) | Value::Opaque { .. } => mysql_async::Value::Bytes(format!("{v:?}").into_bytes()),
        })
        .collect();
    mysql_async::Params::Positional(values)
}

fn mysql_col_to_db_type(col: &mysql_async::Column) -> DbType {
    use mysql_async::consts::ColumnType::*;
    match col.column_type() {
        MYSQL_TYPE_TINY => DbType::Byte,
        MYSQL_TYPE_SHORT => DbType::Int16,
        MYSQL_TYPE_LONG | MYSQL_TYPE_INT24 => DbType::Int32,
        MYSQL_TYPE_LONGLONG => DbType::Int64,
        MYSQL_TYPE_FLOAT => DbType::Float,
        MYSQL_TYPE_DOUBLE => DbType::Double,
        MYSQL_TYPE_NEWDECIMAL | MYSQL_TYPE_DECIMAL => DbType::Decimal,
        MYSQL_TYPE_BLOB | MYSQL_TYPE_TINY_BLOB | MYSQL_TYPE_MEDIUM_BLOB | MYSQL_TYPE_LONG_BLOB => DbType::Binary,
        MYSQL_TYPE_DATETIME | MYSQL_TYPE_TIMESTAMP | MYSQL_TYPE_DATE => DbType::DateTime,
        MYSQL_TYPE_JSON => DbType::Json,
        _ => DbType::String,
    }
}

fn mysql_value_at(row: &mysql_async::Row, idx: usize) -> Value<'static> {
    use mysql_async::Value as MySqlValue;
    match row.as_ref(idx) {
        None | Some(MySqlValue::NULL) => Value::Null,
        Some(MySqlValue::Int(i)) => Value::Int64(*i),
        Some(MySqlValue::UInt(u)) => Value::Int64(*u as i64),
        Some(MySqlValue::Float(f)) => Value::Float(*f),
        Some(MySqlValue::Double(d)) => Value::Double(*d),
        Some(MySqlValue::Bytes(b)) => Value::Text(Cow::Owned(String::from_utf8_lossy(b).into_owned())),
        Some(MySqlValue::Date(year, month, day, hour, minute, second, _micro)) => Value::Text(Cow::Owned(format!(
            "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
        ))),
        Some(MySqlValue::Time(negative, days, hours, minutes, seconds, _micro)) => Value::Text(Cow::Owned(format!(
            "{}{}:{minutes:02}:{seconds:02}",
            if *negative { "-" } else { "" },
            *days as i64 * 24 + *hours as i64
        ))),
    }
}
