//! Composition root: owns the dialect, connection strategy, pool governor,
//! and type/reader-plan registries. `DbContext` is the only place that ties
//! these together; the strategy and governor hold borrowed references to
//! the context's dialect and config, never an owning pointer back to the
//! context itself (spec §9: no cyclic references between context, strategy,
//! and governor).

use crate::config::{DbContextConfig, ReadWriteMode};
use crate::connection::{
    build_strategy, resolve_mode, Channel, ConnectionStrategy, ProviderFactoryMap, RawConnector as _, TrackedConnection,
};
use crate::container::{ExecutionType, SqlContainer};
use crate::dialect::{Dialect, DatabaseKind, IsolationLevel, IsolationProfile, ProductInfo};
use crate::error::Result;
use crate::governor::PoolGovernor;
use crate::registry::{ReaderPlanCache, TypeRegistry};
use crate::transaction::TransactionContext;
use std::sync::Arc;

const DEFAULT_PLAN_CACHE_CAPACITY: usize = 256;

pub struct DbContext {
    dialect: Arc<Dialect>,
    strategy: Box<dyn ConnectionStrategy>,
    governor: PoolGovernor,
    type_registry: TypeRegistry,
    plan_cache: ReaderPlanCache,
    config: DbContextConfig,
}

impl DbContext {
    /// Detects the dialect, resolves the connection mode, constructs the
    /// strategy (opening persistent connections where the mode requires
    /// it), runs detection once, and applies the post-init session preamble.
    ///
    /// Connection-open failure during initialization for KeepAlive /
    /// SingleConnection / SingleWriter fails construction with
    /// `ConnectionFailed`; for Standard with an unknown provider,
    /// initialization is allowed to succeed with the `Unknown` dialect.
    pub async fn new(config: DbContextConfig, factories: ProviderFactoryMap) -> Result<Arc<DbContext>> {
        let kind = config
            .provider_name
            .as_deref()
            .and_then(parse_provider_name)
            .unwrap_or_else(|| DatabaseKind::from_connection_string(&config.connection_string));

        let mut dialect = Dialect::for_kind(kind);

        let resolved_mode = resolve_mode(config.db_mode, kind, &config.connection_string);

        let write_conn_str = config.postprocess_connection_string(kind, Channel::Write);
        let read_conn_str = config.postprocess_connection_string(kind, Channel::Read);

        let strategy = build_strategy(
            resolved_mode,
            kind,
            &factories,
            &write_conn_str,
            Some(read_conn_str.as_str()),
        )
        .await?;

        if let Some(connector) = factories.get(kind) {
            if let Ok(mut detection_conn) = connector.connect(&write_conn_str).await {
                if detection_conn.open().await.is_ok() {
                    if let Ok(info) = detect_info(&kind, &dialect, detection_conn.as_mut()).await {
                        dialect.product_info = info;
                    }
                    let _ = detection_conn.close().await;
                }
            }
        }

        let dialect = Arc::new(dialect);
        strategy.post_init(&dialect).await?;

        let governor = if config.enable_pool_governor || resolved_mode == crate::connection::DbMode::Standard {
            PoolGovernor::new(
                config.max_concurrent_reads,
                config.max_concurrent_writes,
                config.pool_acquire_timeout,
                config.enable_writer_preference,
            )
        } else {
            PoolGovernor::disabled()
        };

        Ok(Arc::new(DbContext {
            dialect,
            strategy,
            governor,
            type_registry: TypeRegistry::new(),
            plan_cache: ReaderPlanCache::with_capacity(DEFAULT_PLAN_CACHE_CAPACITY),
            config,
        }))
    }

    pub fn dialect(&self) -> &Arc<Dialect> {
        &self.dialect
    }

    pub(crate) fn strategy(&self) -> &dyn ConnectionStrategy {
        self.strategy.as_ref()
    }

    pub(crate) fn governor(&self) -> &PoolGovernor {
        &self.governor
    }

    pub fn type_registry(&self) -> &TypeRegistry {
        &self.type_registry
    }

    pub fn plan_cache(&self) -> &ReaderPlanCache {
        &self.plan_cache
    }

    pub fn read_write_mode(&self) -> ReadWriteMode {
        self.config.read_write_mode
    }

    pub fn number_of_open_connections(&self) -> usize {
        self.strategy.counters().open_count()
    }

    pub fn max_number_of_connections(&self) -> usize {
        self.strategy.counters().max_open()
    }

    pub fn mode(&self) -> crate::connection::DbMode {
        self.strategy.mode()
    }

    pub fn container(self: &Arc<Self>, execution_type: ExecutionType) -> SqlContainer {
        SqlContainer::new(execution_type, self.dialect.clone(), self.clone())
    }

    /// Opens a transaction on a tracked connection acquired for the write
    /// channel (transactions always bind a writer connection; read-only
    /// transactions are a façade concern layered on top, not a core
    /// concept). Resolves the isolation level from either an explicit level
    /// or a profile via the dialect.
    pub async fn begin_transaction(
        self: &Arc<Self>,
        profile: IsolationProfile,
        rcsi_enabled: bool,
    ) -> Result<TransactionContext> {
        if self.config.read_write_mode.is_read_only() {
            return Err(crate::error::Error::ReadOnlyContext);
        }
        let isolation_level = self.dialect.resolve_isolation(profile, rcsi_enabled)?;
        let permit = self.governor.acquire(Channel::Write).await?;
        let conn = self.strategy.get(Channel::Write).await?;
        conn.ensure_open().await?;

        let begin_result = conn
            .with_raw(|raw| Box::pin(async move { raw.begin().await }))
            .await;
        if let Err(err) = begin_result {
            let _ = self.strategy.release(conn).await;
            return Err(err);
        }

        let ctx = self.clone();
        let release: Box<
            dyn Fn(TrackedConnection) -> futures::future::BoxFuture<'static, Result<()>> + Send + Sync,
        > = Box::new(move |conn| {
            let ctx = ctx.clone();
            Box::pin(async move { ctx.strategy.release(conn).await })
        });

        TransactionContext::new(conn, self.dialect.clone(), isolation_level, release, permit)
    }

    pub fn container_on_transaction(self: &Arc<Self>, execution_type: ExecutionType, tx: &TransactionContext) -> SqlContainer {
        SqlContainer::new(execution_type, self.dialect.clone(), self.clone()).bind_to_connection(tx.connection())
    }
}

fn parse_provider_name(name: &str) -> Option<DatabaseKind> {
    match name.to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" | "npgsql" => Some(DatabaseKind::PostgreSql),
        "cockroachdb" => Some(DatabaseKind::CockroachDb),
        "mysql" => Some(DatabaseKind::MySql),
        "mariadb" => Some(DatabaseKind::MariaDb),
        "sqlserver" | "mssql" => Some(DatabaseKind::SqlServer),
        "sqlite" => Some(DatabaseKind::Sqlite),
        "oracle" => Some(DatabaseKind::Oracle),
        "firebird" => Some(DatabaseKind::Firebird),
        "duckdb" => Some(DatabaseKind::DuckDb),
        _ => None,
    }
}

/// Runs the dialect-specific version query; on failure, falls back to
/// schema metadata (not distinguished further here — the raw query result is
/// all the core's abstract `RawConnection` exposes); if that fails too,
/// returns `Unknown`/`Sql92` and the caller logs a compatibility warning.
/// Detection errors never propagate past this function: they always
/// degrade.
async fn detect_info(
    kind: &DatabaseKind,
    dialect: &Dialect,
    conn: &mut dyn crate::connection::RawConnection,
) -> Result<ProductInfo> {
    let query = dialect.version_query();
    if query.is_empty() {
        return Ok(ProductInfo::default());
    }
    match conn.query_raw(query, &[]).await {
        Ok(rows) => {
            let raw_version = rows
                .rows
                .first()
                .and_then(|r| r.values.first())
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            let parsed_version = dialect.parse_version(&raw_version);
            let sql_standard_level = dialect.determine_sql_standard(parsed_version);
            Ok(ProductInfo {
                product_name: kind.to_string(),
                raw_version,
                parsed_version,
                sql_standard_level,
            })
        }
        Err(err) => {
            tracing::warn!(error = %err, dialect = %kind, "version detection failed; degrading to Unknown/Sql92");
            Ok(ProductInfo::default())
        }
    }
}

