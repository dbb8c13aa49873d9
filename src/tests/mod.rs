//! Crate-internal test suite, driven against [`fake_provider`] rather than a
//! live database.

pub(crate) mod fake_provider;

mod concurrency_tests;
mod container_tests;
mod context_tests;
mod dialect_tests;
mod registry_tests;
mod transaction_tests;
