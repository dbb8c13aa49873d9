//! Tracing setup shared by binaries and integration tests.
//!
//! The core never initializes a subscriber on its own — libraries shouldn't
//! install global state behind a caller's back. This module is a thin,
//! optional convenience for embedders and for integration tests.

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber honoring `RUST_LOG`, defaulting to `warn`
/// when unset. Safe to call more than once; subsequent calls are ignored.
pub fn init_default() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
}
