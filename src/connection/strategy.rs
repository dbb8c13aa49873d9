//! Four pluggable connection strategies, selected once at context
//! construction and immutable thereafter.

use super::provider::{ProviderFactoryMap, RawConnector};
use super::tracked::{Channel, ConnectionCounters, LeaseKind, TrackedConnection};
use crate::dialect::{DatabaseKind, Dialect};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbMode {
    Best,
    Standard,
    KeepAlive,
    SingleWriter,
    SingleConnection,
}

/// Applies the mode-coercion rules from spec §4.3, resolving `DbMode::Best`
/// and forcing in-memory connection strings to `SingleConnection`
/// regardless of what was requested.
pub fn resolve_mode(requested: DbMode, kind: DatabaseKind, connection_string: &str) -> DbMode {
    if kind.is_in_memory(connection_string) {
        return DbMode::SingleConnection;
    }
    match requested {
        DbMode::Best => {
            if kind.is_file_backed() {
                DbMode::SingleWriter
            } else {
                DbMode::Standard
            }
        }
        DbMode::Standard if kind.is_server_product() => {
            // Server products accept KeepAlive but are never coerced *into*
            // it purely by being a server product; an explicit `Standard`
            // request is honored. KeepAlive is only forced when the caller
            // asked for it, or via `Best` which never selects it.
            DbMode::Standard
        }
        other => other,
    }
}

#[async_trait]
pub trait ConnectionStrategy: Send + Sync {
    async fn get(&self, channel: Channel) -> Result<TrackedConnection>;
    async fn release(&self, conn: TrackedConnection) -> Result<()>;
    /// Runs once, immediately after the context's dialect detection
    /// completes, to apply the session preamble to persistent connections
    /// this strategy owns (Standard disposes its detection connection
    /// instead).
    async fn post_init(&self, dialect: &Dialect) -> Result<()>;
    fn counters(&self) -> &Arc<ConnectionCounters>;
    fn mode(&self) -> DbMode;
}

async fn open_fresh(
    connector: &Arc<dyn RawConnector>,
    connection_string: &str,
    lease_kind: LeaseKind,
    channel: Channel,
    counters: &Arc<ConnectionCounters>,
) -> Result<TrackedConnection> {
    let raw = connector
        .connect(connection_string)
        .await
        .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
    let conn = TrackedConnection::new(raw, lease_kind, channel, counters.clone());
    conn.ensure_open().await?;
    Ok(conn)
}

struct Endpoints {
    write_connector: Arc<dyn RawConnector>,
    write_connection_string: String,
    read_connector: Arc<dyn RawConnector>,
    read_connection_string: String,
}

fn resolve_endpoints(
    kind: DatabaseKind,
    factories: &ProviderFactoryMap,
    connection_string: &str,
    read_only_connection_string: Option<&str>,
) -> Result<Endpoints> {
    let connector = factories
        .get(kind)
        .ok_or_else(|| Error::Configuration(format!("no provider registered for dialect `{kind}`")))?;
    let read_string = read_only_connection_string.unwrap_or(connection_string).to_string();
    Ok(Endpoints {
        write_connector: connector.clone(),
        write_connection_string: connection_string.to_string(),
        read_connector: connector,
        read_connection_string: read_string,
    })
}

/// Every `get` returns a fresh connection; `release` disposes it. The
/// context's own detection connection (not modeled here) is disposed by the
/// composition root, not by this strategy.
pub struct StandardStrategy {
    endpoints: Endpoints,
    counters: Arc<ConnectionCounters>,
}

impl StandardStrategy {
    pub fn new(
        kind: DatabaseKind,
        factories: &ProviderFactoryMap,
        connection_string: &str,
        read_only_connection_string: Option<&str>,
    ) -> Result<Self> {
        Ok(StandardStrategy {
            endpoints: resolve_endpoints(kind, factories, connection_string, read_only_connection_string)?,
            counters: Arc::new(ConnectionCounters::default()),
        })
    }
}

#[async_trait]
impl ConnectionStrategy for StandardStrategy {
    async fn get(&self, channel: Channel) -> Result<TrackedConnection> {
        let (connector, conn_str) = match channel {
            Channel::Write => (&self.endpoints.write_connector, &self.endpoints.write_connection_string),
            Channel::Read => (&self.endpoints.read_connector, &self.endpoints.read_connection_string),
        };
        open_fresh(connector, conn_str, LeaseKind::Transient, channel, &self.counters).await
    }

    async fn release(&self, conn: TrackedConnection) -> Result<()> {
        conn.close().await
    }

    async fn post_init(&self, _dialect: &Dialect) -> Result<()> {
        Ok(())
    }

    fn counters(&self) -> &Arc<ConnectionCounters> {
        &self.counters
    }

    fn mode(&self) -> DbMode {
        DbMode::Standard
    }
}

/// A single sentinel connection is held open for the context's lifetime
/// (preventing ephemeral databases from being torn down), plus a fresh
/// connection per `get`. Releasing the sentinel is a no-op.
pub struct KeepAliveStrategy {
    endpoints: Endpoints,
    sentinel: TrackedConnection,
    counters: Arc<ConnectionCounters>,
}

impl KeepAliveStrategy {
    pub async fn new(
        kind: DatabaseKind,
        factories: &ProviderFactoryMap,
        connection_string: &str,
        read_only_connection_string: Option<&str>,
    ) -> Result<Self> {
        let endpoints = resolve_endpoints(kind, factories, connection_string, read_only_connection_string)?;
        let counters = Arc::new(ConnectionCounters::default());
        let sentinel = open_fresh(
            &endpoints.write_connector,
            &endpoints.write_connection_string,
            LeaseKind::Persistent,
            Channel::Write,
            &counters,
        )
        .await?;
        Ok(KeepAliveStrategy { endpoints, sentinel, counters })
    }
}

#[async_trait]
impl ConnectionStrategy for KeepAliveStrategy {
    async fn get(&self, channel: Channel) -> Result<TrackedConnection> {
        let (connector, conn_str) = match channel {
            Channel::Write => (&self.endpoints.write_connector, &self.endpoints.write_connection_string),
            Channel::Read => (&self.endpoints.read_connector, &self.endpoints.read_connection_string),
        };
        open_fresh(connector, conn_str, LeaseKind::Transient, channel, &self.counters).await
    }

    async fn release(&self, conn: TrackedConnection) -> Result<()> {
        if matches!(conn.lease_kind, LeaseKind::Persistent) {
            return Ok(());
        }
        conn.close().await
    }

    async fn post_init(&self, dialect: &Dialect) -> Result<()> {
        apply_preamble(&self.sentinel, dialect, false).await
    }

    fn counters(&self) -> &Arc<ConnectionCounters> {
        &self.counters
    }

    fn mode(&self) -> DbMode {
        DbMode::KeepAlive
    }
}

/// Exactly one persistent writer connection; `get(Write)` always returns it.
/// `get(Read)` returns a fresh, read-only-marked connection.
pub struct SingleWriterStrategy {
    endpoints: Endpoints,
    writer: TrackedConnection,
    counters: Arc<ConnectionCounters>,
}

impl SingleWriterStrategy {
    pub async fn new(
        kind: DatabaseKind,
        factories: &ProviderFactoryMap,
        connection_string: &str,
        read_only_connection_string: Option<&str>,
    ) -> Result<Self> {
        let endpoints = resolve_endpoints(kind, factories, connection_string, read_only_connection_string)?;
        let counters = Arc::new(ConnectionCounters::default());
        let writer = open_fresh(
            &endpoints.write_connector,
            &endpoints.write_connection_string,
            LeaseKind::Persistent,
            Channel::Write,
            &counters,
        )
        .await?;
        Ok(SingleWriterStrategy { endpoints, writer, counters })
    }
}

#[async_trait]
impl ConnectionStrategy for SingleWriterStrategy {
    async fn get(&self, channel: Channel) -> Result<TrackedConnection> {
        match channel {
            Channel::Write => Ok(self.writer.clone()),
            Channel::Read => {
                let mut conn = open_fresh(
                    &self.endpoints.read_connector,
                    &self.endpoints.read_connection_string,
                    LeaseKind::Transient,
                    Channel::Read,
                    &self.counters,
                )
                .await?;
                conn.mark_read_only();
                Ok(conn)
            }
        }
    }

    async fn release(&self, conn: TrackedConnection) -> Result<()> {
        if matches!(conn.lease_kind, LeaseKind::Persistent) {
            return Ok(());
        }
        conn.close().await
    }

    async fn post_init(&self, dialect: &Dialect) -> Result<()> {
        apply_preamble(&self.writer, dialect, false).await
    }

    fn counters(&self) -> &Arc<ConnectionCounters> {
        &self.counters
    }

    fn mode(&self) -> DbMode {
        DbMode::SingleWriter
    }
}

/// One persistent connection shared by both channels; every `get` returns
/// the same reference; `release` is always a no-op. A lock serializes
/// concurrent use since most drivers require exclusive access per physical
/// connection.
pub struct SingleConnectionStrategy {
    shared: TrackedConnection,
    counters: Arc<ConnectionCounters>,
    #[allow(dead_code)]
    guard: Arc<Mutex<()>>,
}

impl SingleConnectionStrategy {
    pub async fn new(
        kind: DatabaseKind,
        factories: &ProviderFactoryMap,
        connection_string: &str,
        read_only_connection_string: Option<&str>,
    ) -> Result<Self> {
        let endpoints = resolve_endpoints(kind, factories, connection_string, read_only_connection_string)?;
        let counters = Arc::new(ConnectionCounters::default());
        let shared = open_fresh(
            &endpoints.write_connector,
            &endpoints.write_connection_string,
            LeaseKind::Persistent,
            Channel::Write,
            &counters,
        )
        .await?;
        Ok(SingleConnectionStrategy { shared, counters, guard: Arc::new(Mutex::new(())) })
    }
}

#[async_trait]
impl ConnectionStrategy for SingleConnectionStrategy {
    async fn get(&self, _channel: Channel) -> Result<TrackedConnection> {
        Ok(self.shared.clone())
    }

    async fn release(&self, _conn: TrackedConnection) -> Result<()> {
        Ok(())
    }

    async fn post_init(&self, dialect: &Dialect) -> Result<()> {
        apply_preamble(&self.shared, dialect, false).await
    }

    fn counters(&self) -> &Arc<ConnectionCounters> {
        &self.counters
    }

    fn mode(&self) -> DbMode {
        DbMode::SingleConnection
    }
}

async fn apply_preamble(conn: &TrackedConnection, dialect: &Dialect, read_only: bool) -> Result<()> {
    let preamble = dialect.session_preamble(read_only);
    if preamble.is_empty() || conn.has_applied_preamble() {
        return Ok(());
    }
    conn.with_raw(|raw| Box::pin(async move { raw.execute_session_statement(&preamble).await }))
        .await?;
    conn.mark_preamble_applied();
    Ok(())
}

pub async fn build_strategy(
    mode: DbMode,
    kind: DatabaseKind,
    factories: &ProviderFactoryMap,
    connection_string: &str,
    read_only_connection_string: Option<&str>,
) -> Result<Box<dyn ConnectionStrategy>> {
    let resolved = resolve_mode(mode, kind, connection_string);
    match resolved {
        DbMode::Best => unreachable!("resolve_mode never returns Best"),
        DbMode::Standard => {
            Ok(Box::new(StandardStrategy::new(kind, factories, connection_string, read_only_connection_string)?))
        }
        DbMode::KeepAlive => Ok(Box::new(
            KeepAliveStrategy::new(kind, factories, connection_string, read_only_connection_string).await?,
        )),
        DbMode::SingleWriter => Ok(Box::new(
            SingleWriterStrategy::new(kind, factories, connection_string, read_only_connection_string).await?,
        )),
        DbMode::SingleConnection => Ok(Box::new(
            SingleConnectionStrategy::new(kind, factories, connection_string, read_only_connection_string).await?,
        )),
    }
}
