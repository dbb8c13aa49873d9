use crate::config::DbContextConfig;
use crate::connection::{DbMode, ProviderFactoryMap};
use crate::container::ExecutionType;
use crate::context::DbContext;
use crate::dialect::{DatabaseKind, IsolationProfile};
use crate::tests::fake_provider::FakeConnector;
use crate::transaction::TransactionState;
use std::sync::Arc;

async fn postgres_context(connector: FakeConnector) -> Arc<DbContext> {
    let mut factories = ProviderFactoryMap::new();
    factories.register(DatabaseKind::PostgreSql, Arc::new(connector));
    let config = DbContextConfig::new("postgresql://fake/db").with_db_mode(DbMode::Standard);
    DbContext::new(config, factories).await.unwrap()
}

#[tokio::test]
async fn commit_and_rollback_racing_complete_exactly_once() {
    let connector = FakeConnector::new();
    let ledger = connector.ledger.clone();
    let ctx = postgres_context(connector).await;

    let tx = Arc::new(ctx.begin_transaction(IsolationProfile::StrictConsistency, false).await.unwrap());
    assert_eq!(tx.state(), TransactionState::Active);

    let tx_a = tx.clone();
    let tx_b = tx.clone();
    let (commit_result, rollback_result) = tokio::join!(async move { tx_a.commit().await }, async move { tx_b.rollback().await });

    let outcomes = [commit_result.is_ok(), rollback_result.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1, "exactly one of commit/rollback should win the race");

    use std::sync::atomic::Ordering;
    assert_eq!(ledger.begins.load(Ordering::SeqCst), 1);
    assert_eq!(ledger.commits.load(Ordering::SeqCst) + ledger.rollbacks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transaction_releases_its_connection_exactly_once_on_commit() {
    let ctx = postgres_context(FakeConnector::new()).await;
    let tx = ctx.begin_transaction(IsolationProfile::StrictConsistency, false).await.unwrap();
    assert_eq!(ctx.number_of_open_connections(), 1, "begin_transaction holds one open connection");

    tx.commit().await.unwrap();
    assert_eq!(ctx.number_of_open_connections(), 0, "commit must release the connection back to the strategy");

    let err = tx.commit().await.unwrap_err();
    assert!(matches!(err, crate::error::Error::AlreadyCompleted));
}

#[tokio::test]
async fn container_bound_to_a_transaction_reuses_its_connection_and_skips_release() {
    let ctx = postgres_context(FakeConnector::new()).await;
    let tx = ctx.begin_transaction(IsolationProfile::StrictConsistency, false).await.unwrap();

    let mut container = ctx.container_on_transaction(ExecutionType::Write, &tx);
    container.append("UPDATE t SET x = 1");
    container.execute_non_query().await.unwrap();

    assert_eq!(ctx.number_of_open_connections(), 1, "a transaction-bound container must not release the shared connection");
    tx.commit().await.unwrap();
    assert_eq!(ctx.number_of_open_connections(), 0);
}

#[tokio::test]
async fn nested_transaction_on_a_transaction_bound_connection_is_rejected() {
    let ctx = postgres_context(FakeConnector::new()).await;
    let tx = ctx.begin_transaction(IsolationProfile::StrictConsistency, false).await.unwrap();
    let inner_conn = tx.connection();
    let permit = ctx.governor().acquire(crate::connection::Channel::Write).await.unwrap();
    let err = crate::transaction::TransactionContext::new(
        inner_conn,
        ctx.dialect().clone(),
        tx.isolation_level(),
        Box::new(|_conn| Box::pin(async { Ok(()) })),
        permit,
    )
    .unwrap_err();
    assert!(matches!(err, crate::error::Error::NestedTransactionRejected));
    tx.dispose().await;
}

#[tokio::test]
async fn dispose_on_an_active_transaction_rolls_back_and_is_idempotent() {
    let connector = FakeConnector::new();
    let ledger = connector.ledger.clone();
    let ctx = postgres_context(connector).await;
    let tx = ctx.begin_transaction(IsolationProfile::StrictConsistency, false).await.unwrap();

    tx.dispose().await;
    tx.dispose().await;

    use std::sync::atomic::Ordering;
    assert_eq!(ledger.rollbacks.load(Ordering::SeqCst), 1, "dispose must roll back exactly once even when called twice");
}

#[tokio::test]
async fn savepoints_are_tracked_in_order() {
    let ctx = postgres_context(FakeConnector::new()).await;
    let tx = ctx.begin_transaction(IsolationProfile::StrictConsistency, false).await.unwrap();
    tx.savepoint("sp1").await.unwrap();
    tx.savepoint("sp2").await.unwrap();
    assert_eq!(tx.savepoint_names().await, vec!["sp1".to_string(), "sp2".to_string()]);
    tx.dispose().await;
}
