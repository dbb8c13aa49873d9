//! Per-engine behavior. Every behavioral difference between SQL engines is
//! encoded here; callers elsewhere consult [`Dialect`] flags or methods, they
//! never branch on [`DatabaseKind`] directly outside this module.
//!
//! Represented as a tagged-variant descriptor (`DatabaseKind`) plus a trait
//! (`DialectBehavior`) implemented once per variant, selected at
//! construction and immutable thereafter — a fixed descriptor in place of
//! per-engine dynamic dispatch.

mod cockroachdb;
mod duckdb;
mod firebird;
mod mssql;
mod mysql;
mod oracle;
mod postgres;
mod sqlite;
mod unknown;

use crate::error::{Error, Result};
use crate::parameter::{Direction, Parameter};
use crate::value::{DbType, Value};
use enumflags2::{bitflags, BitFlags};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseKind {
    SqlServer,
    PostgreSql,
    MySql,
    MariaDb,
    Sqlite,
    Oracle,
    Firebird,
    CockroachDb,
    DuckDb,
    Unknown,
}

impl DatabaseKind {
    /// Best-effort detection from a connection string's scheme: the scheme
    /// alone selects the dialect before any connection is opened.
    pub fn from_connection_string(conn_str: &str) -> DatabaseKind {
        let scheme = conn_str.split("://").next().unwrap_or("").to_ascii_lowercase();
        match scheme.as_str() {
            "postgres" | "postgresql" => DatabaseKind::PostgreSql,
            "cockroachdb" | "cockroach" => DatabaseKind::CockroachDb,
            "mysql" => DatabaseKind::MySql,
            "mariadb" => DatabaseKind::MariaDb,
            "sqlserver" | "mssql" | "jdbc:sqlserver" => DatabaseKind::SqlServer,
            "oracle" => DatabaseKind::Oracle,
            "firebird" => DatabaseKind::Firebird,
            "duckdb" => DatabaseKind::DuckDb,
            "file" | "sqlite" => DatabaseKind::Sqlite,
            _ if conn_str == ":memory:" || conn_str.ends_with(".db") || conn_str.ends_with(".sqlite") => {
                DatabaseKind::Sqlite
            }
            _ => DatabaseKind::Unknown,
        }
    }

    /// Whether a connection string names an in-memory / ephemeral database.
    /// Used by the connection strategy's mode-coercion rule: such a string
    /// is always forced to `DbMode::SingleConnection`.
    pub fn is_in_memory(self, conn_str: &str) -> bool {
        match self {
            DatabaseKind::Sqlite => conn_str.contains(":memory:"),
            DatabaseKind::DuckDb => conn_str == ":memory:" || conn_str.is_empty(),
            _ => false,
        }
    }

    /// Whether this is a "server product": a standalone daemon reached over
    /// the network, as opposed to an embedded/file engine. Server products
    /// accept `DbMode::KeepAlive` but cannot be coerced away from it.
    pub fn is_server_product(self) -> bool {
        matches!(
            self,
            DatabaseKind::SqlServer
                | DatabaseKind::Oracle
                | DatabaseKind::PostgreSql
                | DatabaseKind::MySql
                | DatabaseKind::MariaDb
                | DatabaseKind::CockroachDb
                | DatabaseKind::Firebird
        )
    }

    pub fn is_file_backed(self) -> bool {
        matches!(self, DatabaseKind::Sqlite | DatabaseKind::DuckDb)
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DatabaseKind::SqlServer => "sqlserver",
            DatabaseKind::PostgreSql => "postgresql",
            DatabaseKind::MySql => "mysql",
            DatabaseKind::MariaDb => "mariadb",
            DatabaseKind::Sqlite => "sqlite",
            DatabaseKind::Oracle => "oracle",
            DatabaseKind::Firebird => "firebird",
            DatabaseKind::CockroachDb => "cockroachdb",
            DatabaseKind::DuckDb => "duckdb",
            DatabaseKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    NamedParams,
    Merge,
    OnConflict,
    OnDuplicateKey,
    Returning,
    JsonTypes,
    ArrayTypes,
    WindowFns,
    Cte,
    Namespaces,
    Savepoints,
    IdentityColumns,
    Prepare,
    XmlTypes,
    Temporal,
    SetValuedParams,
}

pub type Features = BitFlags<Feature>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcWrappingStyle {
    None,
    Call,
    ExecuteProcedure,
    PostgreSql,
    Oracle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SqlStandardLevel {
    Sql92,
    Sql99,
    Sql2003,
    Sql2008,
    Sql2011,
    Sql2016,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// Populated exactly once during context initialization; never mutates
/// afterward. Falls back to `Unknown`/`Sql92` if detection fails.
#[derive(Debug, Clone)]
pub struct ProductInfo {
    pub product_name: String,
    pub raw_version: String,
    pub parsed_version: Option<Version>,
    pub sql_standard_level: SqlStandardLevel,
}

impl Default for ProductInfo {
    fn default() -> Self {
        ProductInfo {
            product_name: "Unknown".to_string(),
            raw_version: String::new(),
            parsed_version: None,
            sql_standard_level: SqlStandardLevel::Sql92,
        }
    }
}

/// High-level intents a caller asks for; each dialect maps them to a
/// concrete isolation level, or rejects the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationProfile {
    FastWithRisks,
    SafeNonBlockingReads,
    StrictConsistency,
    Explicit(IsolationLevel),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Snapshot,
    Serializable,
}

/// Immutable per-engine descriptor. Constructed once via [`Dialect::for_kind`]
/// and consulted everywhere else; the behavioral methods live on
/// [`DialectBehavior`], selected by `kind` at construction.
#[derive(Debug, Clone)]
pub struct Dialect {
    pub kind: DatabaseKind,
    pub parameter_marker: &'static str,
    pub supports_named_parameters: bool,
    pub quote_prefix: &'static str,
    pub quote_suffix: &'static str,
    pub composite_identifier_separator: char,
    pub parameter_name_max_length: usize,
    pub max_parameter_limit: usize,
    pub max_output_parameters: usize,
    pub proc_wrapping_style: ProcWrappingStyle,
    pub features: Features,
    pub product_info: ProductInfo,
}

impl Dialect {
    pub fn for_kind(kind: DatabaseKind) -> Dialect {
        match kind {
            DatabaseKind::SqlServer => mssql::descriptor(),
            DatabaseKind::PostgreSql => postgres::descriptor(DatabaseKind::PostgreSql),
            DatabaseKind::CockroachDb => cockroachdb::descriptor(),
            DatabaseKind::MySql => mysql::descriptor(DatabaseKind::MySql),
            DatabaseKind::MariaDb => mysql::descriptor(DatabaseKind::MariaDb),
            DatabaseKind::Sqlite => sqlite::descriptor(),
            DatabaseKind::Oracle => oracle::descriptor(),
            DatabaseKind::Firebird => firebird::descriptor(),
            DatabaseKind::DuckDb => duckdb::descriptor(),
            DatabaseKind::Unknown => unknown::descriptor(),
        }
    }

    /// Splits `identifier` on [`Self::composite_identifier_separator`], trims
    /// whitespace, drops empty segments, wraps each in the quote
    /// prefix/suffix, rejoins. Null/empty/whitespace input yields `""`.
    pub fn wrap_object_name(&self, identifier: &str) -> String {
        if identifier.trim().is_empty() {
            return String::new();
        }
        identifier
            .split(self.composite_identifier_separator)
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(|segment| format!("{}{}{}", self.quote_prefix, segment, self.quote_suffix))
            .collect::<Vec<_>>()
            .join(&self.composite_identifier_separator.to_string())
    }

    /// Returns the bare marker for positional dialects; otherwise the marker
    /// followed by the normalized name. Null input returns the bare marker.
    pub fn make_parameter_name(&self, raw: Option<&str>) -> String {
        if !self.supports_named_parameters {
            return self.parameter_marker.to_string();
        }
        match raw {
            Some(name) if !name.is_empty() => format!("{}{}", self.parameter_marker, name),
            _ => self.parameter_marker.to_string(),
        }
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(feature)
    }

    /// Produces a provider parameter with `db_type` applied, size set to the
    /// value's logical length (`-1` sentinel for "max" past the dialect's
    /// large-object threshold), precision/scale set for decimals, and
    /// provider-specific metadata reset.
    ///
    /// Numeric providers (Npgsql-style) re-mark a "has been set" flag on
    /// write, so the generic reset in [`Parameter::reset_provider_state`]
    /// must run *before* `db_type` is assigned here, not after.
    pub fn create_parameter(&self, name: Option<String>, db_type: DbType, value: Value<'static>) -> Parameter {
        let mut param = Parameter {
            name,
            db_type,
            value,
            direction: Direction::Input,
            size: None,
            precision: None,
            scale: None,
        };
        param.reset_provider_state();

        let large_object_threshold = self.large_object_threshold();
        if let Some(len) = param.value.logical_len() {
            param.size = Some(if len > large_object_threshold { -1 } else { len as i64 });
        }
        if let Value::Numeric(n) = &param.value {
            let (_, scale) = n.as_bigint_and_exponent();
            param.scale = Some(scale as i16);
            param.precision = Some(n.digits() as i16);
        }
        param.db_type = db_type;
        param
    }

    fn large_object_threshold(&self) -> usize {
        match self.kind {
            DatabaseKind::SqlServer => 8000,
            _ => 8000,
        }
    }

    /// Universal binding rules shared across all dialects, applied after
    /// `create_parameter`. Returns `Err(UnsupportedTypeBinding)` when a value
    /// shape has no representation on this engine and no fallback exists.
    pub fn apply_binding_rules(&self, param: &mut Parameter) -> Result<()> {
        match (&param.value, self.kind) {
            (Value::Boolean(b), DatabaseKind::MySql | DatabaseKind::MariaDb) => {
                param.value = Value::Int32(if *b { 1 } else { 0 });
                param.db_type = DbType::Byte;
            }
            (Value::Null, _) if param.db_type == DbType::Boolean => {
                param.db_type = DbType::Boolean;
            }
            (Value::Text(s), _) if s.chars().count() > 8000 => {
                param.size = Some(-1);
            }
            (Value::Bytes(b), kind) if !self.supports_native_binary(kind) => {
                let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b.as_ref());
                param.value = Value::Json(serde_json::Value::String(encoded));
                param.db_type = DbType::Json;
            }
            (Value::Array(_), DatabaseKind::PostgreSql | DatabaseKind::CockroachDb) => {
                param.db_type = DbType::Object;
            }
            (Value::Array(items), _) => {
                let json = serde_json::Value::Array(
                    items
                        .iter()
                        .map(|v| serde_json::to_value(format!("{v:?}")).unwrap_or(serde_json::Value::Null))
                        .collect(),
                );
                param.value = Value::Json(json);
                param.db_type = DbType::Json;
            }
            (Value::DateTime(_), _) => {
                param.db_type = DbType::DateTime;
            }
            _ => {}
        }
        Ok(())
    }

    fn supports_native_binary(&self, kind: DatabaseKind) -> bool {
        !matches!(kind, DatabaseKind::Oracle | DatabaseKind::Firebird)
    }

    /// One-time statements applied to a freshly opened connection. Empty for
    /// engines that apply settings via connection-string keys.
    pub fn session_preamble(&self, read_only: bool) -> String {
        match self.kind {
            DatabaseKind::SqlServer => "SET NOCOUNT ON;".to_string(),
            DatabaseKind::PostgreSql | DatabaseKind::CockroachDb => String::new(),
            DatabaseKind::Sqlite => {
                let mut s = "PRAGMA foreign_keys=ON;".to_string();
                if read_only {
                    s.push_str(" PRAGMA query_only=1;");
                }
                s
            }
            DatabaseKind::DuckDb => {
                if read_only {
                    "PRAGMA read_only=1;".to_string()
                } else {
                    String::new()
                }
            }
            _ => String::new(),
        }
    }

    pub fn version_query(&self) -> &'static str {
        match self.kind {
            DatabaseKind::SqlServer => "SELECT @@VERSION",
            DatabaseKind::PostgreSql | DatabaseKind::CockroachDb => "SHOW server_version",
            DatabaseKind::MySql | DatabaseKind::MariaDb => "SELECT VERSION()",
            DatabaseKind::Sqlite => "SELECT sqlite_version()",
            DatabaseKind::DuckDb => "PRAGMA version",
            DatabaseKind::Oracle => "SELECT * FROM v$version",
            DatabaseKind::Firebird => "SELECT rdb$get_context('SYSTEM', 'ENGINE_VERSION') FROM rdb$database",
            DatabaseKind::Unknown => "",
        }
    }

    pub fn parse_version(&self, raw: &str) -> Option<Version> {
        let digits_and_dots: String = raw
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let mut parts = digits_and_dots.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        let patch = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        Some(Version { major, minor, patch })
    }

    pub fn determine_sql_standard(&self, version: Option<Version>) -> SqlStandardLevel {
        let Some(v) = version else {
            return SqlStandardLevel::Sql92;
        };
        match self.kind {
            DatabaseKind::PostgreSql | DatabaseKind::CockroachDb if v.major >= 10 => SqlStandardLevel::Sql2011,
            DatabaseKind::SqlServer if v.major >= 13 => SqlStandardLevel::Sql2016,
            DatabaseKind::MySql | DatabaseKind::MariaDb if v.major >= 8 => SqlStandardLevel::Sql2011,
            DatabaseKind::Sqlite if v.major >= 3 => SqlStandardLevel::Sql2003,
            _ => SqlStandardLevel::Sql92,
        }
    }

    /// Resolves a high-level isolation intent to a concrete level, or fails
    /// with `UnsupportedIsolation` when the dialect has no safe mapping.
    pub fn resolve_isolation(&self, profile: IsolationProfile, rcsi_enabled: bool) -> Result<IsolationLevel> {
        if let IsolationProfile::Explicit(level) = profile {
            return Ok(level);
        }
        match (self.kind, profile) {
            (_, IsolationProfile::StrictConsistency) => Ok(IsolationLevel::Serializable),
            (DatabaseKind::CockroachDb, _) => Ok(IsolationLevel::Serializable),
            (DatabaseKind::SqlServer, IsolationProfile::SafeNonBlockingReads) => {
                if rcsi_enabled {
                    Ok(IsolationLevel::Snapshot)
                } else {
                    Err(Error::UnsupportedIsolation {
                        profile: "SafeNonBlockingReads".into(),
                        dialect: self.kind.to_string(),
                        reason: "profile requires RCSI (snapshot isolation) enabled on the database".into(),
                    })
                }
            }
            (DatabaseKind::PostgreSql, IsolationProfile::SafeNonBlockingReads) => Err(Error::UnsupportedIsolation {
                profile: "SafeNonBlockingReads".into(),
                dialect: self.kind.to_string(),
                reason: "profile requires RCSI (snapshot isolation) enabled on the database".into(),
            }),
            (DatabaseKind::Unknown, _) => Ok(IsolationLevel::Serializable),
            (_, IsolationProfile::FastWithRisks) => match self.kind {
                DatabaseKind::PostgreSql => Ok(IsolationLevel::ReadCommitted),
                DatabaseKind::CockroachDb | DatabaseKind::DuckDb => Err(Error::UnsupportedIsolation {
                    profile: "FastWithRisks".into(),
                    dialect: self.kind.to_string(),
                    reason: "engine has no read-uncommitted equivalent".into(),
                }),
                _ => Ok(IsolationLevel::ReadUncommitted),
            },
            (_, IsolationProfile::SafeNonBlockingReads) => Ok(IsolationLevel::RepeatableRead),
            (_, IsolationProfile::Explicit(level)) => Ok(level),
        }
    }

    /// The engine-native reference to the inserted row's column inside a
    /// conflict/upsert clause.
    pub fn upsert_incoming_column(&self, column: &str) -> String {
        let quoted = self.wrap_object_name(column);
        match self.kind {
            DatabaseKind::MySql | DatabaseKind::MariaDb => format!("VALUES({quoted})"),
            DatabaseKind::PostgreSql | DatabaseKind::CockroachDb | DatabaseKind::Sqlite | DatabaseKind::DuckDb => {
                format!("EXCLUDED.{quoted}")
            }
            DatabaseKind::SqlServer => format!("source.{quoted}"),
            _ => quoted,
        }
    }

    pub fn supports_upsert_clause(&self) -> bool {
        self.has_feature(Feature::OnConflict) || self.has_feature(Feature::Merge) || self.has_feature(Feature::OnDuplicateKey)
    }

    /// Engine-specific predicate used by the façade to classify a raw
    /// provider error as a unique-constraint violation. The core never
    /// retries; it only classifies.
    pub fn is_unique_violation(&self, raw_message: &str) -> bool {
        match self.kind {
            DatabaseKind::PostgreSql | DatabaseKind::CockroachDb => raw_message.contains("23505"),
            DatabaseKind::MySql | DatabaseKind::MariaDb => {
                raw_message.contains("1062") || raw_message.to_ascii_lowercase().contains("duplicate entry")
            }
            DatabaseKind::SqlServer => raw_message.contains("2627") || raw_message.contains("2601"),
            DatabaseKind::Sqlite => raw_message.to_ascii_lowercase().contains("unique constraint"),
            _ => raw_message.to_ascii_lowercase().contains("unique"),
        }
    }

    pub fn savepoint_sql(&self, name: &str) -> Result<String> {
        if !self.has_feature(Feature::Savepoints) {
            return Err(Error::SavepointNotSupported);
        }
        let sql = match self.kind {
            DatabaseKind::Firebird => format!("SAVEPOINT {name}"),
            _ => format!("SAVEPOINT {name}"),
        };
        Ok(sql)
    }

    pub fn release_savepoint_sql(&self, name: &str) -> Result<String> {
        if !self.has_feature(Feature::Savepoints) {
            return Err(Error::SavepointNotSupported);
        }
        Ok(format!("RELEASE SAVEPOINT {name}"))
    }

    pub fn rollback_to_savepoint_sql(&self, name: &str) -> Result<String> {
        if !self.has_feature(Feature::Savepoints) {
            return Err(Error::SavepointNotSupported);
        }
        Ok(format!("ROLLBACK TO SAVEPOINT {name}"))
    }
}
