use crate::dialect::{DatabaseKind, Dialect, IsolationProfile};

#[test]
fn wrap_object_name_quotes_each_segment_per_dialect() {
    let postgres = Dialect::for_kind(DatabaseKind::PostgreSql);
    assert_eq!(postgres.wrap_object_name("public.users"), "\"public\".\"users\"");

    let mysql = Dialect::for_kind(DatabaseKind::MySql);
    assert_eq!(mysql.wrap_object_name("mydb.users"), "`mydb`.`users`");
}

#[test]
fn wrap_object_name_drops_blank_segments_and_trims_whitespace() {
    let dialect = Dialect::for_kind(DatabaseKind::PostgreSql);
    assert_eq!(dialect.wrap_object_name(" schema . table "), "\"schema\".\"table\"");
    assert_eq!(dialect.wrap_object_name("schema..table"), "\"schema\".\"table\"");
}

#[test]
fn wrap_object_name_on_blank_input_yields_empty_string() {
    let dialect = Dialect::for_kind(DatabaseKind::SqlServer);
    assert_eq!(dialect.wrap_object_name(""), "");
    assert_eq!(dialect.wrap_object_name("   "), "");
}

#[test]
fn postgres_rejects_safe_non_blocking_reads_unconditionally() {
    let dialect = Dialect::for_kind(DatabaseKind::PostgreSql);
    let err = dialect.resolve_isolation(IsolationProfile::SafeNonBlockingReads, true).unwrap_err();
    assert!(matches!(err, crate::error::Error::UnsupportedIsolation { .. }));
    let err = dialect.resolve_isolation(IsolationProfile::SafeNonBlockingReads, false).unwrap_err();
    assert!(matches!(err, crate::error::Error::UnsupportedIsolation { .. }));
}

#[test]
fn sqlserver_resolves_safe_non_blocking_reads_only_when_rcsi_enabled() {
    let dialect = Dialect::for_kind(DatabaseKind::SqlServer);
    let level = dialect.resolve_isolation(IsolationProfile::SafeNonBlockingReads, true).unwrap();
    assert_eq!(level, crate::dialect::IsolationLevel::Snapshot);

    let err = dialect.resolve_isolation(IsolationProfile::SafeNonBlockingReads, false).unwrap_err();
    assert!(matches!(err, crate::error::Error::UnsupportedIsolation { .. }));
}

#[test]
fn cockroachdb_always_resolves_to_serializable_regardless_of_profile() {
    let dialect = Dialect::for_kind(DatabaseKind::CockroachDb);
    for profile in [
        IsolationProfile::StrictConsistency,
        IsolationProfile::FastWithRisks,
        IsolationProfile::SafeNonBlockingReads,
    ] {
        assert_eq!(dialect.resolve_isolation(profile, false).unwrap(), crate::dialect::IsolationLevel::Serializable);
    }
}

#[test]
fn duckdb_rejects_fast_with_risks() {
    let dialect = Dialect::for_kind(DatabaseKind::DuckDb);
    assert!(dialect.resolve_isolation(IsolationProfile::FastWithRisks, false).is_err());
}

#[test]
fn postgres_resolves_fast_with_risks_to_read_committed() {
    let dialect = Dialect::for_kind(DatabaseKind::PostgreSql);
    assert_eq!(
        dialect.resolve_isolation(IsolationProfile::FastWithRisks, false).unwrap(),
        crate::dialect::IsolationLevel::ReadCommitted
    );
}

#[test]
fn strict_consistency_always_resolves_to_serializable_on_every_dialect() {
    for kind in [
        DatabaseKind::PostgreSql,
        DatabaseKind::MySql,
        DatabaseKind::MariaDb,
        DatabaseKind::SqlServer,
        DatabaseKind::Sqlite,
        DatabaseKind::Unknown,
    ] {
        let dialect = Dialect::for_kind(kind);
        assert_eq!(
            dialect.resolve_isolation(IsolationProfile::StrictConsistency, false).unwrap(),
            crate::dialect::IsolationLevel::Serializable,
            "dialect {kind} should resolve StrictConsistency to Serializable"
        );
    }
}

#[test]
fn cockroachdb_narrows_postgres_feature_set_and_parameter_limit() {
    let postgres = Dialect::for_kind(DatabaseKind::PostgreSql);
    let cockroach = Dialect::for_kind(DatabaseKind::CockroachDb);
    assert!(postgres.has_feature(crate::dialect::Feature::WindowFns));
    assert!(!cockroach.has_feature(crate::dialect::Feature::WindowFns));
    assert_eq!(cockroach.max_parameter_limit, 32_767);
}

#[test]
fn savepoint_sql_rejected_on_dialect_without_savepoints() {
    let dialect = Dialect::for_kind(DatabaseKind::Unknown);
    assert!(matches!(dialect.savepoint_sql("sp1"), Err(crate::error::Error::SavepointNotSupported)));
}

#[test]
fn savepoint_sql_supported_on_postgres() {
    let dialect = Dialect::for_kind(DatabaseKind::PostgreSql);
    let sql = dialect.savepoint_sql("sp1").unwrap();
    assert!(sql.to_ascii_uppercase().contains("SAVEPOINT"));
}

#[test]
fn database_kind_detected_from_connection_string_scheme() {
    assert_eq!(DatabaseKind::from_connection_string("postgresql://localhost/db"), DatabaseKind::PostgreSql);
    assert_eq!(DatabaseKind::from_connection_string("mysql://localhost/db"), DatabaseKind::MySql);
    assert_eq!(DatabaseKind::from_connection_string("file:./local.db"), DatabaseKind::Sqlite);
    assert_eq!(DatabaseKind::from_connection_string("nonsense"), DatabaseKind::Unknown);
}
