//! Typed configuration surface. There is no separate config-file format —
//! configuration travels purely through connection strings and
//! constructor options.

use crate::connection::DbMode;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadWriteMode {
    ReadOnly,
    ReadWrite,
}

impl ReadWriteMode {
    pub fn is_read_only(self) -> bool {
        matches!(self, ReadWriteMode::ReadOnly)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriState {
    Unset,
    Enabled,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct DbContextConfig {
    pub connection_string: String,
    pub read_only_connection_string: Option<String>,
    pub provider_name: Option<String>,
    pub db_mode: DbMode,
    pub read_write_mode: ReadWriteMode,
    pub max_concurrent_reads: Option<usize>,
    pub max_concurrent_writes: Option<usize>,
    pub pool_acquire_timeout: Duration,
    pub mode_lock_timeout: Duration,
    pub enable_pool_governor: bool,
    pub enable_writer_preference: bool,
    pub force_manual_prepare: TriState,
    pub disable_prepare: TriState,
    pub application_name: Option<String>,
}

impl DbContextConfig {
    pub fn new(connection_string: impl Into<String>) -> Self {
        DbContextConfig {
            connection_string: connection_string.into(),
            read_only_connection_string: None,
            provider_name: None,
            db_mode: DbMode::Best,
            read_write_mode: ReadWriteMode::ReadWrite,
            max_concurrent_reads: None,
            max_concurrent_writes: None,
            pool_acquire_timeout: Duration::from_secs(5),
            mode_lock_timeout: Duration::from_secs(30),
            enable_pool_governor: true,
            enable_writer_preference: true,
            force_manual_prepare: TriState::Unset,
            disable_prepare: TriState::Unset,
            application_name: None,
        }
    }

    pub fn with_read_only_connection_string(mut self, value: impl Into<String>) -> Self {
        self.read_only_connection_string = Some(value.into());
        self
    }

    pub fn with_db_mode(mut self, mode: DbMode) -> Self {
        self.db_mode = mode;
        self
    }

    pub fn with_read_write_mode(mut self, mode: ReadWriteMode) -> Self {
        self.read_write_mode = mode;
        self
    }

    pub fn with_max_concurrent_reads(mut self, n: usize) -> Self {
        self.max_concurrent_reads = Some(n);
        self
    }

    pub fn with_max_concurrent_writes(mut self, n: usize) -> Self {
        self.max_concurrent_writes = Some(n);
        self
    }

    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Standard-mode-only connection-string post-processing: when the
    /// dialect exposes a pooling keyword and pooling is enabled (or
    /// unspecified), inject `Min Pool Size = 1` unless the caller already
    /// set it. PostgreSQL read-only channels append
    /// `Options='-c default_transaction_read_only=on'` instead of issuing a
    /// session statement. If the provider's connection-string syntax
    /// rejects an unknown keyword at this stage, the original raw string is
    /// retained unchanged (post-processing is best-effort, never fatal).
    pub fn postprocess_connection_string(
        &self,
        kind: crate::dialect::DatabaseKind,
        channel: crate::connection::Channel,
    ) -> String {
        let base = match channel {
            crate::connection::Channel::Read => self.read_only_connection_string.as_deref().unwrap_or(&self.connection_string),
            crate::connection::Channel::Write => self.connection_string.as_str(),
        };

        let mut result = base.to_string();

        if let Some(name) = &self.application_name {
            if application_name_key(kind).is_some() && !result.to_ascii_lowercase().contains("application name") {
                result = append_kv(&result, kind, application_name_key(kind).unwrap(), name);
            }
        }

        if self.db_mode == DbMode::Standard {
            if let Some(key) = pool_size_key(kind) {
                if !result.to_ascii_lowercase().contains(&key.to_ascii_lowercase()) {
                    result = append_kv(&result, kind, key, "1");
                }
            }
        }

        if matches!(channel, crate::connection::Channel::Read) && kind == crate::dialect::DatabaseKind::PostgreSql {
            if !result.contains("default_transaction_read_only") {
                result = append_kv(&result, kind, "Options", "'-c default_transaction_read_only=on'");
            }
        }

        result
    }
}

fn application_name_key(kind: crate::dialect::DatabaseKind) -> Option<&'static str> {
    use crate::dialect::DatabaseKind::*;
    match kind {
        PostgreSql | CockroachDb => Some("Application Name"),
        SqlServer => Some("Application Name"),
        MySql | MariaDb => Some("Program Name"),
        _ => None,
    }
}

fn pool_size_key(kind: crate::dialect::DatabaseKind) -> Option<&'static str> {
    use crate::dialect::DatabaseKind::*;
    match kind {
        PostgreSql | CockroachDb | SqlServer | MySql | MariaDb => Some("Min Pool Size"),
        _ => None,
    }
}

fn append_kv(base: &str, _kind: crate::dialect::DatabaseKind, key: &str, value: &str) -> String {
    if base.is_empty() {
        format!("{key}={value}")
    } else if base.contains('?') {
        format!("{base};{key}={value}")
    } else {
        format!("{base};{key}={value}")
    }
}
