//! SQL Server adapter over `tiberius`.
//!
//! Tiberius speaks its wire protocol over any `AsyncRead + AsyncWrite`; on
//! Linux that's a plain `tokio::net::TcpStream`, on Windows/macOS it can
//! additionally ride named pipes, mirroring the target-gated feature split
//! already present in `Cargo.toml`.

use crate::connection::provider::{ColumnMeta, RawConnection, RawConnector, RawRow, RawRows};
use crate::error::{Error, Result};
use crate::value::{DbType, Value};
use async_trait::async_trait;
use std::borrow::Cow;
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

pub struct MssqlConnector;

#[async_trait]
impl RawConnector for MssqlConnector {
    async fn connect(&self, connection_string: &str) -> Result<Box<dyn RawConnection>> {
        let config =
            tiberius::Config::from_ado_string(connection_string).map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        Ok(Box::new(MssqlConnection { config, client: None }))
    }
}

pub struct MssqlConnection {
    config: tiberius::Config,
    client: Option<tiberius::Client<Compat<TcpStream>>>,
}

#[async_trait]
impl RawConnection for MssqlConnection {
    async fn open(&mut self) -> Result<()> {
        let addr = self.config.get_addr();
        let tcp = TcpStream::connect(addr).await.map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        tcp.set_nodelay(true).map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        let client = tiberius::Client::connect(self.config.clone(), tcp.compat_write())
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.client = None;
        Ok(())
    }

    fn is_broken(&self) -> bool {
        self.client.is_none()
    }

    async fn execute_raw(&mut self, sql: &str, params: &[Value<'static>]) -> Result<u64> {
        let client = self.client.as_mut().ok_or_else(|| Error::provider("connection not open"))?;
        let bound: Vec<MssqlValue> = params.iter().map(MssqlValue::from).collect();
        let refs: Vec<&dyn tiberius::ToSql> = bound.iter().map(|v| v as &dyn tiberius::ToSql).collect();
        let result = client
            .execute(sql, refs.as_slice())
            .await
            .map_err(|e| Error::provider_with_source("mssql execute failed", e))?;
        Ok(result.rows_affected().iter().sum())
    }

    async fn query_raw(&mut self, sql: &str, params: &[Value<'static>]) -> Result<RawRows> {
        let client = self.client.as_mut().ok_or_else(|| Error::provider("connection not open"))?;
        let bound: Vec<MssqlValue> = params.iter().map(MssqlValue::from).collect();
        let refs: Vec<&dyn tiberius::ToSql> = bound.iter().map(|v| v as &dyn tiberius::ToSql).collect();
        let stream = client
            .query(sql, refs.as_slice())
            .await
            .map_err(|e| Error::provider_with_source("mssql query failed", e))?;
        let result_rows = stream.into_first_result().await.map_err(|e| Error::provider_with_source("mssql fetch failed", e))?;

        let columns = result_rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|c| ColumnMeta { name: c.name().to_string(), db_type: mssql_col_to_db_type(c) })
                    .collect()
            })
            .unwrap_or_default();

        let mut rows = Vec::with_capacity(result_rows.len());
        for row in &result_rows {
            let mut values = Vec::with_capacity(row.len());
            for i in 0..row.len() {
                values.push(mssql_value_at(row, i));
            }
            rows.push(RawRow { values });
        }
        Ok(RawRows { columns, rows })
    }

    async fn begin(&mut self) -> Result<()> {
        self.execute_raw("BEGIN TRANSACTION", &[]).await.map(|_| ())
    }

    async fn commit(&mut self) -> Result<()> {
        self.execute_raw("COMMIT TRANSACTION", &[]).await.map(|_| ())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.execute_raw("ROLLBACK TRANSACTION", &[]).await.map(|_| ())
    }

    async fn execute_session_statement(&mut self, sql: &str) -> Result<()> {
        // `SET NOCOUNT ON;` and friends return no rowcount worth reporting.
        self.execute_raw(sql, &[]).await.map(|_| ())
    }
}

enum MssqlValue {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl From<&Value<'static>> for MssqlValue {
    fn from(v: &Value<'static>) -> Self {
        match v {
            Value::Null => MssqlValue::Null,
            Value::Boolean(b) => MssqlValue::Bool(*b),
            Value::Int32(i) => MssqlValue::I32(*i),
            Value::Int64(i) => MssqlValue::I64(*i),
            Value::Float(f) => MssqlValue::F64(*f as f64),
            Value::Double(d) => MssqlValue::F64(*d),
            Value::Numeric(n) => MssqlValue::Text(n.to_string()),
            Value::Text(s) => MssqlValue::Text(s.to_string()),
            Value::Bytes(b) => MssqlValue::Bytes(b.to_vec()),
            Value::Date(d) => MssqlValue::Text(d.to_string()),
            Value::Time(t) => MssqlValue::Text(t.to_string()),
            Value::DateTime(dt) => MssqlValue::Text(dt.to_rfc3339()),
            Value::Json(j) => MssqlValue::Text(j.to_string()),
            Value::Uuid(u) => MssqlValue::Text(u.to_string()),
            Value::Array(_) | Value::Opaque { .. } => MssqlValue::Text(format!("{v:?}")),
        }
    }
}

impl tiberius::ToSql for MssqlValue {
    fn to_sql(&self) -> tiberius::ColumnData<'_> {
        match self {
            MssqlValue::Null => tiberius::ColumnData::Bit(None),
            MssqlValue::Bool(b) => tiberius::ColumnData::Bit(Some(*b)),
            MssqlValue::I32(i) => tiberius::ColumnData::I32(Some(*i)),
            MssqlValue::I64(i) => tiberius::ColumnData::I64(Some(*i)),
            MssqlValue::F64(f) => tiberius::ColumnData::F64(Some(*f)),
            MssqlValue::Text(s) => tiberius::ColumnData::String(Some(Cow::Owned(s.clone()))),
            MssqlValue::Bytes(b) => tiberius::ColumnData::Binary(Some(Cow::Owned(b.clone()))),
        }
    }
}

fn mssql_col_to_db_type(col: &tiberius::Column) -> DbType {
    use tiberius::ColumnType;
    match col.column_type() {
        ColumnType::Bit | ColumnType::Bitn => DbType::Boolean,
        ColumnType::Int1 => DbType::Byte,
        ColumnType::Int2 => DbType::Int16,
        ColumnType::Int4 => DbType::Int32,
        ColumnType::Int8 | ColumnType::Intn => DbType::Int64,
        ColumnType::Float4 => DbType::Float,
        ColumnType::Float8 | ColumnType::Floatn => DbType::Double,
        ColumnType::Decimaln | ColumnType::Numericn | ColumnType::Money | ColumnType::Money4 => DbType::Decimal,
        ColumnType::BigBinary | ColumnType::BigVarBin | ColumnType::Image => DbType::Binary,
        ColumnType::Datetime | ColumnType::Datetime2 | ColumnType::Datetime4 | ColumnType::Datetimen => DbType::DateTime,
        ColumnType::DatetimeOffsetn => DbType::DateTimeOffset,
        ColumnType::Guid => DbType::Guid,
        _ => DbType::String,
    }
}

fn mssql_value_at(row: &tiberius::Row, idx: usize) -> Value<'static> {
    if let Ok(Some(v)) = row.try_get::<bool, _>(idx) {
        return Value::Boolean(v);
    }
    if let Ok(Some(v)) = row.try_get::<i32, _>(idx) {
        return Value::Int32(v);
    }
    if let Ok(Some(v)) = row.try_get::<i64, _>(idx) {
        return Value::Int64(v);
    }
    if let Ok(Some(v)) = row.try_get::<f64, _>(idx) {
        return Value::Double(v);
    }
    if let Ok(Some(v)) = row.try_get::<&str, _>(idx) {
        return Value::Text(Cow::Owned(v.to_string()));
    }
    if let Ok(Some(v)) = row.try_get::<&[u8], _>(idx) {
        return Value::Bytes(Cow::Owned(v.to_vec()));
    }
    Value::Null
}
