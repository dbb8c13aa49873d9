//! Provider-agnostic relational data-access execution core.
//!
//! This crate is the lower layer a higher-level data-access façade (entity
//! mapping, CRUD templating, audit trails) would sit on top of — none of
//! that lives here. What does live here: a per-engine dialect registry, a
//! `Value`/coercion layer that moves typed data in and out of SQL text, a
//! connection-strategy abstraction that knows how to keep a database happy
//! under four different lifecycle policies, a pool governor bounding
//! in-process concurrency independently of whatever pooling a driver does
//! internally, and a transaction context with exactly-once completion
//! semantics.
//!
//! Supported engines: PostgreSQL, CockroachDB, MySQL/MariaDB, SQL Server,
//! SQLite, DuckDB, plus dialect-only support (no bundled native driver) for
//! Oracle and Firebird.

pub mod config;
pub mod connection;
pub mod container;
pub mod context;
pub mod dialect;
pub mod error;
pub mod governor;
pub mod parameter;
pub mod providers;
pub mod reader;
pub mod registry;
#[cfg(feature = "telemetry")]
pub mod telemetry;
pub mod transaction;
pub mod value;

#[cfg(test)]
mod tests;

pub use config::{DbContextConfig, ReadWriteMode};
pub use connection::{DbMode, ProviderFactoryMap};
pub use container::{ExecutionType, SqlContainer};
pub use context::DbContext;
pub use dialect::{DatabaseKind, Dialect, IsolationLevel, IsolationProfile};
pub use error::{Error, Result};
pub use parameter::{Direction, Parameter};
pub use transaction::TransactionContext;
pub use value::{DbType, Value};
