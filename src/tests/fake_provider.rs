//! In-memory `RawConnector`/`RawConnection` used only by this crate's own
//! test suite. It understands exactly enough pseudo-SQL to drive the
//! testable properties below; it is not a SQL engine and is never compiled
//! outside `#[cfg(test)]`.

use crate::connection::provider::{ColumnMeta, RawConnection, RawConnector, RawRow, RawRows};
use crate::error::Result;
use crate::value::{DbType, Value};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Shared across every connection a `FakeConnector` hands out, so tests can
/// observe how many `BEGIN`/`COMMIT`/`ROLLBACK`/statements a scenario issued.
#[derive(Default)]
pub struct FakeLedger {
    pub begins: AtomicU64,
    pub commits: AtomicU64,
    pub rollbacks: AtomicU64,
    pub statements: Mutex<Vec<String>>,
}

impl FakeLedger {
    pub fn statement_count(&self) -> usize {
        self.statements.lock().unwrap().len()
    }
}

pub struct FakeConnector {
    pub ledger: Arc<FakeLedger>,
    /// If set, `connect` fails every time — used to exercise
    /// `ConnectionFailed` during strategy construction.
    pub fail_connect: bool,
}

impl FakeConnector {
    pub fn new() -> Self {
        FakeConnector { ledger: Arc::new(FakeLedger::default()), fail_connect: false }
    }
}

#[async_trait]
impl RawConnector for FakeConnector {
    async fn connect(&self, connection_string: &str) -> Result<Box<dyn RawConnection>> {
        if self.fail_connect {
            return Err(crate::error::Error::ConnectionFailed("fake connector configured to fail".into()));
        }
        Ok(Box::new(FakeConnection {
            connection_string: connection_string.to_string(),
            ledger: self.ledger.clone(),
            opened: false,
        }))
    }
}

pub struct FakeConnection {
    #[allow(dead_code)]
    connection_string: String,
    ledger: Arc<FakeLedger>,
    opened: bool,
}

#[async_trait]
impl RawConnection for FakeConnection {
    async fn open(&mut self) -> Result<()> {
        self.opened = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.opened = false;
        Ok(())
    }

    fn is_broken(&self) -> bool {
        !self.opened
    }

    async fn execute_raw(&mut self, sql: &str, _params: &[Value<'static>]) -> Result<u64> {
        self.ledger.statements.lock().unwrap().push(sql.to_string());
        Ok(1)
    }

    async fn query_raw(&mut self, sql: &str, _params: &[Value<'static>]) -> Result<RawRows> {
        self.ledger.statements.lock().unwrap().push(sql.to_string());
        if sql == "SELECT VERSION()" || sql.to_ascii_uppercase().contains("VERSION") {
            return Ok(RawRows {
                columns: vec![ColumnMeta { name: "version".into(), db_type: DbType::String }],
                rows: vec![RawRow { values: vec![Value::Text("fake-engine 1.0".into())] }],
            });
        }
        if sql == "SELECT 1" {
            return Ok(RawRows {
                columns: vec![ColumnMeta { name: "one".into(), db_type: DbType::Int32 }],
                rows: vec![RawRow { values: vec![Value::Int32(1)] }],
            });
        }
        Ok(RawRows::empty())
    }

    async fn begin(&mut self) -> Result<()> {
        self.ledger.begins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.ledger.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.ledger.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
