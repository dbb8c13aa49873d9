use crate::config::{DbContextConfig, ReadWriteMode};
use crate::connection::{DbMode, ProviderFactoryMap};
use crate::container::ExecutionType;
use crate::context::DbContext;
use crate::dialect::{DatabaseKind, IsolationProfile};
use crate::tests::fake_provider::FakeConnector;
use std::sync::Arc;

async fn standard_context(connector: FakeConnector, kind: DatabaseKind) -> Arc<DbContext> {
    let mut factories = ProviderFactoryMap::new();
    factories.register(kind, Arc::new(connector));
    let config = DbContextConfig::new("postgresql://fake/db").with_db_mode(DbMode::Standard);
    DbContext::new(config, factories).await.unwrap()
}

#[tokio::test]
async fn standard_mode_closes_every_connection_after_release_and_tracks_peak() {
    let ctx = standard_context(FakeConnector::new(), DatabaseKind::PostgreSql).await;

    for _ in 0..5 {
        let container = ctx.container(ExecutionType::Write);
        let mut c = container;
        c.append("UPDATE t SET x = 1");
        c.execute_non_query().await.unwrap();
    }

    assert_eq!(ctx.number_of_open_connections(), 0, "standard mode must close every connection after release");
    assert_eq!(ctx.max_number_of_connections(), 1, "sequential execution never needs more than one open connection");
}

#[tokio::test]
async fn read_only_context_rejects_write_containers() {
    let mut factories = ProviderFactoryMap::new();
    factories.register(DatabaseKind::PostgreSql, Arc::new(FakeConnector::new()));
    let config = DbContextConfig::new("postgresql://fake/db")
        .with_db_mode(DbMode::Standard)
        .with_read_write_mode(ReadWriteMode::ReadOnly);
    let ctx = DbContext::new(config, factories).await.unwrap();

    let mut container = ctx.container(ExecutionType::Write);
    container.append("DELETE FROM t");
    let err = container.execute_non_query().await.unwrap_err();
    assert!(matches!(err, crate::error::Error::ReadOnlyContext));
}

#[tokio::test]
async fn begin_transaction_rejected_on_a_read_only_context() {
    let mut factories = ProviderFactoryMap::new();
    factories.register(DatabaseKind::PostgreSql, Arc::new(FakeConnector::new()));
    let config = DbContextConfig::new("postgresql://fake/db")
        .with_db_mode(DbMode::Standard)
        .with_read_write_mode(ReadWriteMode::ReadOnly);
    let ctx = DbContext::new(config, factories).await.unwrap();

    let err = ctx.begin_transaction(IsolationProfile::StrictConsistency, false).await.unwrap_err();
    assert!(matches!(err, crate::error::Error::ReadOnlyContext));
}

#[tokio::test]
async fn single_connection_mode_forced_for_in_memory_sqlite_regardless_of_requested_mode() {
    let mut factories = ProviderFactoryMap::new();
    factories.register(DatabaseKind::Sqlite, Arc::new(FakeConnector::new()));
    let config = DbContextConfig::new("sqlite://:memory:").with_db_mode(DbMode::Standard);
    let ctx = DbContext::new(config, factories).await.unwrap();
    assert_eq!(ctx.mode(), DbMode::SingleConnection);
}

#[tokio::test]
async fn construction_fails_with_connection_failed_when_a_persistent_strategy_cannot_open() {
    let mut connector = FakeConnector::new();
    connector.fail_connect = true;
    let mut factories = ProviderFactoryMap::new();
    factories.register(DatabaseKind::PostgreSql, Arc::new(connector));
    let config = DbContextConfig::new("postgresql://fake/db").with_db_mode(DbMode::KeepAlive);
    let err = DbContext::new(config, factories).await.unwrap_err();
    assert!(matches!(err, crate::error::Error::ConnectionFailed(_)));
}
