use crate::config::DbContextConfig;
use crate::connection::{DbMode, ProviderFactoryMap};
use crate::container::ExecutionType;
use crate::context::DbContext;
use crate::dialect::DatabaseKind;
use crate::error::Error;
use crate::tests::fake_provider::FakeConnector;
use crate::value::{DbType, Value};
use std::sync::Arc;

async fn postgres_context(connector: FakeConnector) -> Arc<DbContext> {
    let mut factories = ProviderFactoryMap::new();
    factories.register(DatabaseKind::PostgreSql, Arc::new(connector));
    let config = DbContextConfig::new("postgresql://fake/db").with_db_mode(DbMode::Standard);
    DbContext::new(config, factories).await.unwrap()
}

#[tokio::test]
async fn add_parameter_truncates_names_past_the_dialect_length_limit() {
    let ctx = postgres_context(FakeConnector::new()).await;
    let mut container = ctx.container(ExecutionType::Read);
    let long_name = "p".repeat(100);
    let reference = container.add_parameter(Some(&long_name), DbType::Int32, Value::Int32(1)).unwrap();
    assert_eq!(reference.0.len(), 63, "PostgreSQL truncates identifiers to 63 characters");
}

#[tokio::test]
async fn sqlite_rejects_parameters_past_its_dialect_limit() {
    let mut factories = ProviderFactoryMap::new();
    factories.register(DatabaseKind::Sqlite, Arc::new(FakeConnector::new()));
    let config = DbContextConfig::new("sqlite://:memory:").with_db_mode(DbMode::Standard);
    let ctx = DbContext::new(config, factories).await.unwrap();
    let mut container = ctx.container(ExecutionType::Read);
    let limit = ctx.dialect().max_parameter_limit;
    for i in 0..limit {
        container.add_parameter(Some(&format!("p{i}")), DbType::Int32, Value::Int32(i as i32)).unwrap();
    }
    let err = container.add_parameter(None, DbType::Int32, Value::Int32(0)).unwrap_err();
    assert!(matches!(err, Error::TooManyParameters { .. }));
}

#[tokio::test]
async fn execute_non_query_acquires_applies_preamble_once_and_releases() {
    let connector = FakeConnector::new();
    let ledger = connector.ledger.clone();
    let ctx = postgres_context(connector).await;

    let mut container = ctx.container(ExecutionType::Write);
    container.append("INSERT INTO t (x) VALUES (1)");
    container.execute_non_query().await.unwrap();

    let mut container2 = ctx.container(ExecutionType::Write);
    container2.append("INSERT INTO t (x) VALUES (2)");
    container2.execute_non_query().await.unwrap();

    assert!(ledger.statement_count() >= 2, "both inserts must have reached the fake connector");
    assert_eq!(ctx.number_of_open_connections(), 0);
}

#[tokio::test]
async fn set_parameter_value_on_missing_name_returns_parameter_not_found() {
    let ctx = postgres_context(FakeConnector::new()).await;
    let mut container = ctx.container(ExecutionType::Read);
    container.add_parameter(Some("known"), DbType::Int32, Value::Int32(1)).unwrap();

    let err = container.set_parameter_value("missing", Value::Int32(2)).unwrap_err();
    assert!(matches!(err, Error::ParameterNotFound(name) if name == "missing"));
}

#[tokio::test]
async fn set_parameter_value_with_array_retypes_parameter_to_object() {
    let ctx = postgres_context(FakeConnector::new()).await;
    let mut container = ctx.container(ExecutionType::Read);
    let reference = container.add_parameter(Some("ids"), DbType::Int32, Value::Int32(1)).unwrap();
    container.set_parameter_value(&reference.0, Value::Array(vec![Value::Int32(1), Value::Int32(2)])).unwrap();
    assert_eq!(container.parameters()[0].db_type, DbType::Object);
}

#[tokio::test]
async fn replace_neutral_tokens_substitutes_quote_and_parameter_markers() {
    let ctx = postgres_context(FakeConnector::new()).await;
    let container = ctx.container(ExecutionType::Read);
    let sql = container.replace_neutral_tokens("SELECT {Q}name{q} FROM t WHERE id = {S}1").unwrap();
    assert_eq!(sql, "SELECT \"name\" FROM t WHERE id = $1");
}

#[tokio::test]
async fn replace_neutral_tokens_rejects_empty_input() {
    let ctx = postgres_context(FakeConnector::new()).await;
    let container = ctx.container(ExecutionType::Read);
    assert!(matches!(container.replace_neutral_tokens(""), Err(Error::NullArgument)));
}

#[tokio::test]
async fn build_where_in_empty_list_is_always_false() {
    let ctx = postgres_context(FakeConnector::new()).await;
    let mut container = ctx.container(ExecutionType::Read);
    let predicate = container.build_where_in("id", DbType::Int64, vec![]).unwrap();
    assert_eq!(predicate, "1 = 0");
    assert!(container.parameters().is_empty());
}

#[tokio::test]
async fn build_where_in_single_value_uses_equality() {
    let ctx = postgres_context(FakeConnector::new()).await;
    let mut container = ctx.container(ExecutionType::Read);
    let predicate = container.build_where_in("id", DbType::Int64, vec![Value::Int64(7)]).unwrap();
    assert!(predicate.starts_with("id = "));
    assert_eq!(container.parameters().len(), 1);
}

#[tokio::test]
async fn build_where_in_multiple_values_uses_in_clause() {
    let ctx = postgres_context(FakeConnector::new()).await;
    let mut container = ctx.container(ExecutionType::Read);
    let predicate = container
        .build_where_in("id", DbType::Int64, vec![Value::Int64(1), Value::Int64(2), Value::Int64(3)])
        .unwrap();
    assert!(predicate.starts_with("id IN ("));
    assert_eq!(container.parameters().len(), 3);
}

#[tokio::test]
async fn build_where_in_splits_when_exceeding_parameter_limit() {
    let ctx = postgres_context(FakeConnector::new()).await;
    let mut container = ctx.container(ExecutionType::Read);

    // Shrink the limit so the split path is exercised without binding
    // thousands of parameters in a test.
    let mut shrunk = container.dialect_for_test().clone();
    shrunk.max_parameter_limit = 2;
    container.set_dialect_for_test(Arc::new(shrunk));

    let values = vec![Value::Int64(1), Value::Int64(2), Value::Int64(3), Value::Int64(4)];
    let predicate = container.build_where_in("id", DbType::Int64, values).unwrap();
    assert!(predicate.contains(" OR "));
    assert_eq!(container.parameters().len(), 4);
}
