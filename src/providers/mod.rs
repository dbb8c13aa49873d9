//! Per-engine [`crate::connection::RawConnector`]/[`crate::connection::RawConnection`]
//! adapters. Each module is feature-gated behind its matching `*-native`
//! Cargo feature.

#[cfg(feature = "postgresql-native")]
pub mod postgres;

#[cfg(feature = "mysql-native")]
pub mod mysql;

#[cfg(feature = "mssql-native")]
pub mod mssql;

#[cfg(feature = "sqlite-native")]
pub mod sqlite;

#[cfg(feature = "duckdb-native")]
pub mod duckdb;
