//! Ownership wrapper around one physical connection, plus the instrumented
//! open-connection counters callers can assert against.

use super::provider::RawConnection;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
    Broken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseKind {
    /// Owned by the strategy for the context's lifetime (KeepAlive sentinel,
    /// SingleWriter writer, SingleConnection's one connection).
    Persistent,
    /// Owned by the caller; released back to the strategy after use.
    Transient,
    /// Owned by a `TransactionContext`; invisible to the strategy's release
    /// path for the transaction's lifetime.
    TransactionBound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Read,
    Write,
}

/// Shared, process-wide instrumentation: counts of currently-open and
/// historically-maximum-open connections, used by testable property #1
/// (`NumberOfOpenConnections`, `MaxNumberOfConnections`).
#[derive(Debug, Default)]
pub struct ConnectionCounters {
    open: AtomicUsize,
    max_open: AtomicUsize,
}

impl ConnectionCounters {
    pub fn record_open(&self) {
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open.fetch_max(now, Ordering::SeqCst);
    }

    pub fn record_close(&self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn max_open(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }
}

/// A single physical connection plus its lifecycle bookkeeping. Cloning a
/// `TrackedConnection` clones the handle (cheap `Arc`s); both clones refer to
/// the same underlying physical connection and counters.
#[derive(Clone)]
pub struct TrackedConnection {
    pub(crate) inner: Arc<Mutex<Box<dyn RawConnection>>>,
    pub state: Arc<std::sync::atomic::AtomicU8>,
    pub lease_kind: LeaseKind,
    pub channel: Channel,
    pub is_read_only_marked: bool,
    pub(crate) counters: Arc<ConnectionCounters>,
    /// Set once the session preamble has run on this physical connection, so
    /// `SqlContainer`'s execute path only applies it once per connection.
    pub(crate) preamble_applied: Arc<std::sync::atomic::AtomicBool>,
}

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_BROKEN: u8 = 2;

impl TrackedConnection {
    pub fn new(
        raw: Box<dyn RawConnection>,
        lease_kind: LeaseKind,
        channel: Channel,
        counters: Arc<ConnectionCounters>,
    ) -> Self {
        TrackedConnection {
            inner: Arc::new(Mutex::new(raw)),
            state: Arc::new(std::sync::atomic::AtomicU8::new(STATE_CLOSED)),
            lease_kind,
            channel,
            is_read_only_marked: false,
            counters,
            preamble_applied: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self.state.load(Ordering::SeqCst) {
            STATE_OPEN => ConnectionState::Open,
            STATE_BROKEN => ConnectionState::Broken,
            _ => ConnectionState::Closed,
        }
    }

    pub async fn ensure_open(&self) -> crate::error::Result<()> {
        if self.state() == ConnectionState::Open {
            return Ok(());
        }
        let mut guard = self.inner.lock().await;
        guard.open().await?;
        self.state.store(STATE_OPEN, Ordering::SeqCst);
        self.counters.record_open();
        Ok(())
    }

    pub async fn close(&self) -> crate::error::Result<()> {
        if self.state() == ConnectionState::Closed {
            return Ok(());
        }
        let mut guard = self.inner.lock().await;
        guard.close().await?;
        self.state.store(STATE_CLOSED, Ordering::SeqCst);
        self.counters.record_close();
        Ok(())
    }

    pub fn mark_broken(&self) {
        self.state.store(STATE_BROKEN, Ordering::SeqCst);
    }

    pub fn mark_read_only(&mut self) {
        self.is_read_only_marked = true;
    }

    pub fn has_applied_preamble(&self) -> bool {
        self.preamble_applied.load(Ordering::SeqCst)
    }

    pub fn mark_preamble_applied(&self) {
        self.preamble_applied.store(true, Ordering::SeqCst);
    }

    pub async fn with_raw<F, R>(&self, f: F) -> R
    where
        F: for<'a> FnOnce(&'a mut Box<dyn RawConnection>) -> futures::future::BoxFuture<'a, R>,
    {
        let mut guard = self.inner.lock().await;
        f(&mut guard).await
    }
}
