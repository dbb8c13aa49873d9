//! A single bound parameter inside a [`crate::container::SqlContainer`].

use crate::value::{DbType, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    /// `None` when the container was built against a positional dialect, or
    /// before a name has been generated by `SqlContainer::add_parameter`.
    pub name: Option<String>,
    pub db_type: DbType,
    pub value: Value<'static>,
    pub direction: Direction,
    /// Byte/char size; `-1` is the provider "max" sentinel (see
    /// `Dialect::create_parameter`).
    pub size: Option<i64>,
    pub precision: Option<i16>,
    pub scale: Option<i16>,
}

impl Parameter {
    pub fn new(name: Option<String>, db_type: DbType, value: Value<'static>) -> Self {
        Parameter {
            name,
            db_type,
            value,
            direction: Direction::Input,
            size: None,
            precision: None,
            scale: None,
        }
    }

    /// Clears provider-specific "has been set" bookkeeping when a parameter
    /// object is reused from a pool. Must run before the dialect reassigns
    /// `db_type`, mirroring the Npgsql-style requirement noted in the
    /// dialect layer: the provider's own flag gets re-marked the moment a
    /// new `db_type`/value is written, so clearing first and assigning after
    /// is the only ordering that leaves the flag in the new state.
    pub fn reset_provider_state(&mut self) {
        self.size = None;
        self.precision = None;
        self.scale = None;
        self.direction = Direction::Input;
    }

    /// Short name with any leading parameter marker stripped, used when
    /// matching a caller-supplied name against the stored (possibly
    /// dialect-prefixed) name.
    pub fn short_name(&self) -> Option<&str> {
        self.name.as_deref().map(|n| n.trim_start_matches(['@', ':', '$', '?']))
    }
}
