//! The dialect-neutral value representation bound into [`crate::parameter::Parameter`]
//! and read back out of provider rows.
//!
//! Covers booleans, integers of multiple widths, decimals, text, bytes,
//! timestamps, json, uuid, and arrays — one value representation shared
//! across every engine this crate talks to.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::borrow::Cow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Numeric(BigDecimal),
    Text(Cow<'a, str>),
    Bytes(Cow<'a, [u8]>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<Utc>),
    Json(serde_json::Value),
    Uuid(Uuid),
    Array(Vec<Value<'a>>),
    /// Interval / range / spatial and other registry-mediated shapes travel
    /// as an opaque tagged blob; the type registry knows how to encode and
    /// decode the tag.
    Opaque { tag: Cow<'static, str>, payload: Vec<u8> },
}

impl<'a> Value<'a> {
    pub fn text(s: impl Into<Cow<'a, str>>) -> Self {
        Value::Text(s.into())
    }

    pub fn bytes(b: impl Into<Cow<'a, [u8]>>) -> Self {
        Value::Bytes(b.into())
    }

    pub fn int32(i: i32) -> Self {
        Value::Int32(i)
    }

    pub fn int64(i: i64) -> Self {
        Value::Int64(i)
    }

    pub fn null_int64() -> Self {
        Value::Null
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(i) => Some(*i),
            Value::Int64(i) => i32::try_from(*i).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(i) => Some(*i as i64),
            Value::Int64(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Int32(i) => Some(*i != 0),
            Value::Int64(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// The logical length used by `Dialect::create_parameter` to size a
    /// provider parameter. `None` for types without a natural byte/char
    /// length (booleans, numerics).
    pub fn logical_len(&self) -> Option<usize> {
        match self {
            Value::Text(s) => Some(s.chars().count()),
            Value::Bytes(b) => Some(b.len()),
            Value::Json(v) => Some(v.to_string().len()),
            _ => None,
        }
    }

    pub fn into_owned(self) -> Value<'static> {
        match self {
            Value::Null => Value::Null,
            Value::Boolean(b) => Value::Boolean(b),
            Value::Int32(i) => Value::Int32(i),
            Value::Int64(i) => Value::Int64(i),
            Value::Float(f) => Value::Float(f),
            Value::Double(d) => Value::Double(d),
            Value::Numeric(n) => Value::Numeric(n),
            Value::Text(s) => Value::Text(Cow::Owned(s.into_owned())),
            Value::Bytes(b) => Value::Bytes(Cow::Owned(b.into_owned())),
            Value::Date(d) => Value::Date(d),
            Value::Time(t) => Value::Time(t),
            Value::DateTime(dt) => Value::DateTime(dt),
            Value::Json(j) => Value::Json(j),
            Value::Uuid(u) => Value::Uuid(u),
            Value::Array(items) => Value::Array(items.into_iter().map(Value::into_owned).collect()),
            Value::Opaque { tag, payload } => Value::Opaque { tag, payload },
        }
    }
}

/// Coarse provider-facing type tag. Each dialect maps these onto its native
/// `DbType`/parameter-type enum; the registry may override the mapping for a
/// specific (logical type, dialect) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbType {
    Boolean,
    Byte,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    Decimal,
    String,
    Binary,
    Date,
    Time,
    DateTime,
    DateTimeOffset,
    Json,
    Xml,
    Object,
    Guid,
}
