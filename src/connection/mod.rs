pub mod provider;
pub mod strategy;
pub mod tracked;

pub use provider::{ProviderFactoryMap, RawConnection, RawConnector, RawRow, RawRows};
pub use strategy::{build_strategy, resolve_mode, ConnectionStrategy, DbMode};
pub use tracked::{Channel, ConnectionCounters, ConnectionState, LeaseKind, TrackedConnection};
