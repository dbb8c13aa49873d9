//! A safe, single-completion wrapper around one tracked connection.

use crate::connection::{LeaseKind, TrackedConnection};
use crate::dialect::{Dialect, IsolationLevel};
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const ACTIVE: u8 = 0;
const COMMITTED: u8 = 1;
const ROLLED_BACK: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

impl From<u8> for TransactionState {
    fn from(v: u8) -> Self {
        match v {
            COMMITTED => TransactionState::Committed,
            ROLLED_BACK => TransactionState::RolledBack,
            _ => TransactionState::Active,
        }
    }
}

/// Released exactly once regardless of how many threads race `commit` and
/// `rollback` concurrently: the CAS on `state` picks exactly one winner, and
/// only the winner runs the release path.
pub struct TransactionContext {
    connection: TrackedConnection,
    dialect: Arc<Dialect>,
    isolation_level: IsolationLevel,
    state: AtomicU8,
    savepoints: tokio::sync::Mutex<Vec<String>>,
    release: Box<dyn Fn(TrackedConnection) -> futures::future::BoxFuture<'static, Result<()>> + Send + Sync>,
    /// Held for the transaction's lifetime; dropped (releasing the governor
    /// permit) once commit/rollback/dispose completes.
    _permit: Option<crate::governor::Permit>,
}

impl TransactionContext {
    pub(crate) fn new(
        connection: TrackedConnection,
        dialect: Arc<Dialect>,
        isolation_level: IsolationLevel,
        release: Box<dyn Fn(TrackedConnection) -> futures::future::BoxFuture<'static, Result<()>> + Send + Sync>,
        permit: crate::governor::Permit,
    ) -> Result<Self> {
        if matches!(connection.lease_kind, LeaseKind::TransactionBound) {
            return Err(Error::NestedTransactionRejected);
        }
        Ok(TransactionContext {
            connection,
            dialect,
            isolation_level,
            state: AtomicU8::new(ACTIVE),
            savepoints: tokio::sync::Mutex::new(Vec::new()),
            release,
            _permit: Some(permit),
        })
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn state(&self) -> TransactionState {
        self.state.load(Ordering::SeqCst).into()
    }

    /// The tracked connection this transaction owns. Containers built
    /// against this connection see `lease_kind = TransactionBound` and treat
    /// release as a no-op (the transaction itself owns the connection).
    pub fn connection(&self) -> TrackedConnection {
        let mut conn = self.connection.clone();
        conn.lease_kind = LeaseKind::TransactionBound;
        conn
    }

    fn try_complete(&self, target: u8) -> Result<()> {
        self.state
            .compare_exchange(ACTIVE, target, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| Error::AlreadyCompleted)
    }

    pub async fn commit(&self) -> Result<()> {
        self.try_complete(COMMITTED)?;
        let result = self
            .connection
            .with_raw(|raw| Box::pin(async move { raw.commit().await }))
            .await;
        (self.release)(self.connection.clone()).await?;
        result
    }

    pub async fn rollback(&self) -> Result<()> {
        self.try_complete(ROLLED_BACK)?;
        self.rollback_inner().await
    }

    pub async fn rollback_async(&self) -> Result<()> {
        self.rollback().await
    }

    async fn rollback_inner(&self) -> Result<()> {
        let result = self
            .connection
            .with_raw(|raw| Box::pin(async move { raw.rollback().await }))
            .await;
        (self.release)(self.connection.clone()).await?;
        result
    }

    /// `dispose` on an active transaction rolls back, swallowing secondary
    /// errors from the rollback itself (logged, not surfaced) so the
    /// primary dispose path never throws. Idempotent on a terminal
    /// transaction.
    pub async fn dispose(&self) {
        if self.try_complete(ROLLED_BACK).is_ok() {
            if let Err(err) = self.rollback_inner().await {
                tracing::warn!(error = %err, "rollback during transaction dispose failed; swallowing");
            }
        }
    }

    pub async fn savepoint(&self, name: &str) -> Result<()> {
        if self.state() != TransactionState::Active {
            return Err(Error::AlreadyCompleted);
        }
        let sql = self.dialect.savepoint_sql(name)?;
        self.connection
            .with_raw(|raw| Box::pin(async move { raw.execute_session_statement(&sql).await }))
            .await?;
        self.savepoints.lock().await.push(name.to_string());
        Ok(())
    }

    pub async fn rollback_to_savepoint(&self, name: &str) -> Result<()> {
        if self.state() != TransactionState::Active {
            return Err(Error::AlreadyCompleted);
        }
        let sql = self.dialect.rollback_to_savepoint_sql(name)?;
        self.connection
            .with_raw(|raw| Box::pin(async move { raw.execute_session_statement(&sql).await }))
            .await
    }

    pub async fn savepoint_names(&self) -> Vec<String> {
        self.savepoints.lock().await.clone()
    }
}
