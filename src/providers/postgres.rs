//! PostgreSQL / CockroachDb adapter over `tokio-postgres`.

use crate::connection::provider::{ColumnMeta, RawConnection, RawConnector, RawRow, RawRows};
use crate::error::{Error, Result};
use crate::value::{DbType, Value};
use async_trait::async_trait;
use std::borrow::Cow;

pub struct PostgresConnector;

#[async_trait]
impl RawConnector for PostgresConnector {
    async fn connect(&self, connection_string: &str) -> Result<Box<dyn RawConnection>> {
        let config = connection_string
            .parse::<tokio_postgres::Config>()
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        Ok(Box::new(PostgresConnection { config, client: None }))
    }
}

pub struct PostgresConnection {
    config: tokio_postgres::Config,
    client: Option<tokio_postgres::Client>,
}

#[async_trait]
impl RawConnection for PostgresConnection {
    async fn open(&mut self) -> Result<()> {
        let (client, connection) = self
            .config
            .connect(tokio_postgres::NoTls)
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        // The driver hands back a connection future that must be polled to
        // completion off to the side; spawn it and let it run for the
        // lifetime of the client, matching the usual tokio-postgres idiom.
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::warn!(error = %err, "postgres connection task exited with an error");
            }
        });
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.client = None;
        Ok(())
    }

    fn is_broken(&self) -> bool {
        self.client.as_ref().map(|c| c.is_closed()).unwrap_or(true)
    }

    async fn execute_raw(&mut self, sql: &str, params: &[Value<'static>]) -> Result<u64> {
        let client = self.client.as_ref().ok_or_else(|| Error::provider("connection not open"))?;
        let bound: Vec<PgValue> = params.iter().map(PgValue::from).collect();
        let refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> =
            bound.iter().map(|v| v as &(dyn tokio_postgres::types::ToSql + Sync)).collect();
        client
            .execute(sql, &refs)
            .await
            .map_err(|e| Error::provider_with_source("postgres execute failed", e))
    }

    async fn query_raw(&mut self, sql: &str, params: &[Value<'static>]) -> Result<RawRows> {
        let client = self.client.as_ref().ok_or_else(|| Error::provider("connection not open"))?;
        let bound: Vec<PgValue> = params.iter().map(PgValue::from).collect();
        let refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> =
            bound.iter().map(|v| v as &(dyn tokio_postgres::types::ToSql + Sync)).collect();
        let rows = client
            .query(sql, &refs)
            .await
            .map_err(|e| Error::provider_with_source("postgres query failed", e))?;

        let columns = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|c| ColumnMeta { name: c.name().to_string(), db_type: pg_type_to_db_type(c.type_()) })
                    .collect()
            })
            .unwrap_or_default();

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(row.len());
            for i in 0..row.len() {
                values.push(column_value(row, i));
            }
            out.push(RawRow { values });
        }
        Ok(RawRows { columns, rows: out })
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

/// Owned wrapper implementing `ToSql` by dispatching on `Value`'s variant;
/// kept narrow (only the shapes `apply_binding_rules` can actually produce
/// for PostgreSQL reach this point).
enum PgValue {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Uuid(uuid::Uuid),
    Timestamp(chrono::DateTime<chrono::Utc>),
}

impl From<&Value<'static>> for PgValue {
    fn from(v: &Value<'static>) -> Self {
        match v {
            Value::Null => PgValue::Null,
            Value::Boolean(b) => PgValue::Bool(*b),
            Value::Int32(i) => PgValue::I32(*i),
            Value::Int64(i) => PgValue::I64(*i),
            Value::Float(f) => PgValue::F64(*f as f64),
            Value::Double(d) => PgValue::F64(*d),
            Value::Numeric(n) => PgValue::Text(n.to_string()),
            Value::Text(s) => PgValue::Text(s.to_string()),
            Value::Bytes(b) => PgValue::Bytes(b.to_vec()),
            Value::Date(d) => PgValue::Text(d.to_string()),
            Value::Time(t) => PgValue::Text(t.to_string()),
            Value::DateTime(dt) => PgValue::Timestamp(*dt),
            Value::Json(j) => PgValue::Json(j.clone()),
            Value::Uuid(u) => PgValue::Uuid(*u),
            Value::Array(_) | Value::Opaque { .. } => PgValue::Text(format!("{v:?}")),
        }
    }
}

impl tokio_postgres::types::ToSql for PgValue {
    fn to_sql(
        &self,
        ty: &tokio_postgres::types::Type,
        out: &mut bytes::BytesMut,
    ) -> std::result::Result<tokio_postgres::types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            PgValue::Null => Ok(tokio_postgres::types::IsNull::Yes),
            PgValue::Bool(b) => b.to_sql(ty, out),
            PgValue::I32(i) => i.to_sql(ty, out),
            PgValue::I64(i) => i.to_sql(ty, out),
            PgValue::F64(f) => f.to_sql(ty, out),
            PgValue::Text(s) => s.to_sql(ty, out),
            PgValue::Bytes(b) => b.to_sql(ty, out),
            PgValue::Json(j) => j.to_sql(ty, out),
            PgValue::Uuid(u) => u.to_sql(ty, out),
            PgValue::Timestamp(dt) => dt.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &tokio_postgres::types::Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

fn pg_type_to_db_type(ty: &tokio_postgres::types::Type) -> DbType {
    use tokio_postgres::types::Type;
    match *ty {
        Type::BOOL => DbType::Boolean,
        Type::INT2 => DbType::Int16,
        Type::INT4 => DbType::Int32,
        Type::INT8 => DbType::Int64,
        Type::FLOAT4 => DbType::Float,
        Type::FLOAT8 => DbType::Double,
        Type::NUMERIC => DbType::Decimal,
        Type::BYTEA => DbType::Binary,
        Type::JSON | Type::JSONB => DbType::Json,
        Type::TIMESTAMP | Type::TIMESTAMPTZ => DbType::DateTime,
        Type::UUID => DbType::Guid,
        _ => DbType::String,
    }
}

fn column_value(row: &tokio_postgres::Row, idx: usize) -> Value<'static> {
    use tokio_postgres::types::Type;
    let ty = row.columns()[idx].type_();
    match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx).ok().flatten().map(Value::Boolean).unwrap_or(Value::Null),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Int32(v as i32))
            .unwrap_or(Value::Null),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx).ok().flatten().map(Value::Int32).unwrap_or(Value::Null),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx).ok().flatten().map(Value::Int64).unwrap_or(Value::Null),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).ok().flatten().map(Value::Double).unwrap_or(Value::Null),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR => row
            .try_get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map(|s| Value::Text(Cow::Owned(s)))
            .unwrap_or(Value::Null),
        Type::UUID => row.try_get::<_, Option<uuid::Uuid>>(idx).ok().flatten().map(Value::Uuid).unwrap_or(Value::Null),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .ok()
            .flatten()
            .map(Value::DateTime)
            .unwrap_or(Value::Null),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .ok()
            .flatten()
            .map(Value::Json)
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map(|s| Value::Text(Cow::Owned(s)))
            .unwrap_or(Value::Null),
    }
}
