//! The seam between the execution core and a concrete driver.
//!
//! Real per-engine adapters (tokio-postgres, mysql_async, tiberius,
//! rusqlite, duckdb — see `crate::providers`) implement [`RawConnector`] and
//! [`RawConnection`]. The core never constructs a driver directly; a
//! [`ProviderFactoryMap`] is handed to the database context at construction,
//! replacing the source's global provider-factory registry (spec §9).

use crate::error::Result;
use crate::value::Value;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// One materialized row as returned by a provider, keyed by ordinal. Column
/// names/types are carried alongside on [`RawRows`] so a reader plan can be
/// built once per distinct schema.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub values: Vec<Value<'static>>,
}

#[derive(Debug, Clone)]
pub struct ColumnMeta {
    pub name: String,
    pub db_type: crate::value::DbType,
}

#[derive(Debug, Clone)]
pub struct RawRows {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<RawRow>,
}

impl RawRows {
    pub fn empty() -> Self {
        RawRows { columns: Vec::new(), rows: Vec::new() }
    }
}

/// A single physical connection to a concrete engine. Implementations own
/// whatever async driver handle the engine requires.
#[async_trait]
pub trait RawConnection: Send + Sync {
    async fn open(&mut self) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
    fn is_broken(&self) -> bool;

    async fn execute_raw(&mut self, sql: &str, params: &[Value<'static>]) -> Result<u64>;
    async fn query_raw(&mut self, sql: &str, params: &[Value<'static>]) -> Result<RawRows>;

    async fn begin(&mut self) -> Result<()>;
    async fn commit(&mut self) -> Result<()>;
    async fn rollback(&mut self) -> Result<()>;

    /// Executes a raw session statement (preamble, `SET`/`PRAGMA` scripts,
    /// savepoint DDL) without expecting a result set.
    async fn execute_session_statement(&mut self, sql: &str) -> Result<()> {
        self.execute_raw(sql, &[]).await.map(|_| ())
    }
}

/// Constructs a fresh, unopened [`RawConnection`] for one of the two
/// connection strings a context may be configured with (primary or
/// read-only). Implemented once per engine; see `crate::providers`.
#[async_trait]
pub trait RawConnector: Send + Sync {
    async fn connect(&self, connection_string: &str) -> Result<Box<dyn RawConnection>>;
}

/// Explicit registry handed to [`crate::context::DbContext`] at construction,
/// replacing ADO.NET-style `DbProviderFactories` global state. Tests seed it
/// directly with a fake in-memory connector.
#[derive(Clone, Default)]
pub struct ProviderFactoryMap {
    factories: HashMap<crate::dialect::DatabaseKind, Arc<dyn RawConnector>>,
}

impl ProviderFactoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: crate::dialect::DatabaseKind, connector: Arc<dyn RawConnector>) {
        self.factories.insert(kind, connector);
    }

    pub fn get(&self, kind: crate::dialect::DatabaseKind) -> Option<Arc<dyn RawConnector>> {
        self.factories.get(&kind).cloned()
    }
}
