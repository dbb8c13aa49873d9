//! Error taxonomy for the execution core.
//!
//! Setup errors fail construction, contract errors surface synchronously,
//! runtime errors propagate after the connection is released, and
//! detection errors are swallowed upstream (see `dialect::detect_info`)
//! and never appear here.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to establish a connection: {0}")]
    ConnectionFailed(String),

    #[error("write attempted against a read-only context")]
    ReadOnlyContext,

    #[error("operation attempted on an already-completed transaction")]
    AlreadyCompleted,

    #[error("no parameter named `{0}` in this container")]
    ParameterNotFound(String),

    #[error("parameter count {actual} exceeds dialect limit {limit}")]
    TooManyParameters { actual: usize, limit: usize },

    #[error("timed out after {0:?} waiting for a pool permit")]
    PoolAcquireTimeout(std::time::Duration),

    #[error("expected a non-null value for a non-nullable target")]
    UnexpectedNull,

    #[error("no binding rule or registered coercion for type `{0}` on this dialect")]
    UnsupportedTypeBinding(String),

    #[error("dialect does not support savepoints")]
    SavepointNotSupported,

    #[error("nested transactions are not supported")]
    NestedTransactionRejected,

    #[error("named argument is required but was null or empty")]
    NullArgument,

    #[error("isolation profile `{profile}` is not supported on dialect `{dialect}`: {reason}")]
    UnsupportedIsolation {
        profile: String,
        dialect: String,
        reason: String,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("operation was cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("provider error: {message}")]
    Provider {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    pub fn provider(message: impl Into<String>) -> Self {
        Error::Provider {
            message: message.into(),
            source: None,
        }
    }

    pub fn provider_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Provider {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Best-effort classification used by `dialect::is_unique_violation`-style
    /// predicates: the core never retries on this, it only classifies for the
    /// façade above it.
    pub fn is_provider(&self) -> bool {
        matches!(self, Error::Provider { .. })
    }
}

/// Narrow view of a provider's raw error message, handed to dialect-specific
/// classification predicates (`Dialect::is_unique_violation`, etc.) without
/// requiring the core to know each driver's concrete error type.
pub struct RawProviderError<'a>(pub &'a str);

impl fmt::Display for RawProviderError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
