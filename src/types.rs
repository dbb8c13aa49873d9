//! Registry-mediated value shapes beyond the primitive [`crate::value::Value`]
//! variants: intervals, ranges, spatial geometries, row-version tokens, and
//! provider-specific shims matched by shape rather than by declared type.
//!
//! These travel inside `Value::Opaque` once bound to a parameter; a
//! [`crate::registry::Coercion`] impl in `registry.rs` knows how to encode
//! each one to a provider-native wire string and decode it back.

use std::fmt;
use std::net::IpAddr;

/// ISO 8601 year-month interval (`P{n}Y{m}M`). `P0Y0M` is the zero identity;
/// a missing leading `P` is accepted leniently on parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntervalYearMonth {
    pub years: i32,
    pub months: i32,
}

impl IntervalYearMonth {
    pub fn parse(s: &str) -> Option<Self> {
        let body = s.strip_prefix('P').unwrap_or(s);
        let (years_part, rest) = body.split_once('Y')?;
        let months_part = rest.strip_suffix('M')?;
        let years: i32 = years_part.parse().ok()?;
        let months: i32 = months_part.parse().ok()?;
        Some(IntervalYearMonth { years, months })
    }

    pub fn format(&self) -> String {
        format!("P{}Y{}M", self.years, self.months)
    }
}

impl fmt::Display for IntervalYearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// ISO 8601 day-time interval (`P{d}DT{h}H{m}M{s}S`), fractional seconds
/// expressed as nanoseconds. `PT0S`-equivalent (`P0DT0S`) is the zero
/// identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntervalDaySecond {
    pub days: i64,
    pub hours: i32,
    pub minutes: i32,
    pub seconds: i32,
    pub nanos: u32,
}

impl IntervalDaySecond {
    pub fn parse(s: &str) -> Option<Self> {
        let body = s.strip_prefix('P')?;
        let (day_part, time_part) = body.split_once('T').unwrap_or((body, ""));
        let days = match day_part {
            "" => 0,
            d => d.strip_suffix('D')?.parse().ok()?,
        };
        let mut hours = 0;
        let mut minutes = 0;
        let mut seconds = 0;
        let mut nanos = 0;
        let mut rest = time_part;
        if let Some((h, r)) = rest.split_once('H') {
            hours = h.parse().ok()?;
            rest = r;
        }
        if let Some((m, r)) = rest.split_once('M') {
            minutes = m.parse().ok()?;
            rest = r;
        }
        if let Some(s_part) = rest.strip_suffix('S') {
            if let Some((whole, frac)) = s_part.split_once('.') {
                seconds = whole.parse().ok()?;
                let padded = format!("{frac:0<9}");
                nanos = padded[..9].parse().ok()?;
            } else if !s_part.is_empty() {
                seconds = s_part.parse().ok()?;
            }
        }
        Some(IntervalDaySecond { days, hours, minutes, seconds, nanos })
    }

    pub fn format(&self) -> String {
        let mut out = format!("P{}D", self.days);
        let has_time = self.hours != 0 || self.minutes != 0 || self.seconds != 0 || self.nanos != 0;
        if has_time {
            out.push('T');
            if self.hours != 0 {
                out.push_str(&format!("{}H", self.hours));
            }
            if self.minutes != 0 {
                out.push_str(&format!("{}M", self.minutes));
            }
            if self.nanos != 0 {
                out.push_str(&format!("{}.{:09}S", self.seconds, self.nanos));
            } else if self.seconds != 0 {
                out.push_str(&format!("{}S", self.seconds));
            }
        }
        out
    }
}

impl fmt::Display for IntervalDaySecond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// An inclusive/exclusive-bounded range over signed 64-bit integers — the
/// common case for PostgreSQL's `int4range`/`int8range` family. Unbounded
/// ends are `None`. Formats as PostgreSQL range literal syntax
/// (`[lower,upper)`), which is also accepted by SQLite/DuckDB's
/// `on_conflict`-adjacent range helpers as plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntRange {
    pub lower: Option<i64>,
    pub upper: Option<i64>,
    pub lower_inclusive: bool,
    pub upper_inclusive: bool,
}

impl IntRange {
    pub fn format(&self) -> String {
        let open = if self.lower_inclusive { '[' } else { '(' };
        let close = if self.upper_inclusive { ']' } else { ')' };
        let lower = self.lower.map(|v| v.to_string()).unwrap_or_default();
        let upper = self.upper.map(|v| v.to_string()).unwrap_or_default();
        format!("{open}{lower},{upper}{close}")
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("empty") {
            return Some(IntRange { lower: Some(0), upper: Some(0), lower_inclusive: true, upper_inclusive: false });
        }
        let mut chars = s.chars();
        let open = chars.next()?;
        let close = s.chars().last()?;
        let lower_inclusive = open == '[';
        let upper_inclusive = close == ']';
        let body = &s[1..s.len() - 1];
        let (lower_part, upper_part) = body.split_once(',')?;
        let lower = if lower_part.is_empty() { None } else { Some(lower_part.parse().ok()?) };
        let upper = if upper_part.is_empty() { None } else { Some(upper_part.parse().ok()?) };
        Some(IntRange { lower, upper, lower_inclusive, upper_inclusive })
    }
}

impl fmt::Display for IntRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// A geometry carried as WKT text plus an optional SRID, the shape every
/// supported spatial wire format (native WKT/WKB params, PostGIS `geometry`,
/// GeoJSON columns) is normalized to before crossing the `Value` boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub wkt: String,
    pub srid: Option<i32>,
}

impl Geometry {
    pub fn new(wkt: impl Into<String>, srid: Option<i32>) -> Self {
        Geometry { wkt: wkt.into(), srid }
    }

    /// Parses an EWKB (extended well-known binary) buffer, extracting the
    /// SRID when the high bit of the geometry-type word is set. Handles
    /// both byte orders: byte 0 is `0x00` for big-endian, `0x01` for
    /// little-endian, matching the WKB/EWKB spec.
    ///
    /// Only point geometries are decoded to coordinates; other geometry
    /// types still yield a correct SRID with an empty coordinate-less WKT
    /// tag, since the core only needs SRID extraction to round-trip through
    /// the registry, not full geometry rendering.
    pub fn from_ewkb(data: &[u8]) -> Option<Geometry> {
        if data.is_empty() {
            return None;
        }
        let little_endian = match data[0] {
            0x00 => false,
            0x01 => true,
            _ => return None,
        };
        let read_u32 = |b: &[u8]| -> u32 {
            if little_endian {
                u32::from_le_bytes([b[0], b[1], b[2], b[3]])
            } else {
                u32::from_be_bytes([b[0], b[1], b[2], b[3]])
            }
        };
        let read_f64 = |b: &[u8]| -> f64 {
            let arr = [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]];
            if little_endian {
                f64::from_le_bytes(arr)
            } else {
                f64::from_be_bytes(arr)
            }
        };
        if data.len() < 5 {
            return None;
        }
        let type_word = read_u32(&data[1..5]);
        const SRID_FLAG: u32 = 0x2000_0000;
        let has_srid = type_word & SRID_FLAG != 0;
        let geom_type = type_word & 0x0000_00FF;
        let mut offset = 5;
        let srid = if has_srid {
            if data.len() < offset + 4 {
                return None;
            }
            let s = read_u32(&data[offset..offset + 4]) as i32;
            offset += 4;
            Some(s)
        } else {
            None
        };

        if geom_type == 1 && data.len() >= offset + 16 {
            let x = read_f64(&data[offset..offset + 8]);
            let y = read_f64(&data[offset + 8..offset + 16]);
            return Some(Geometry::new(format!("POINT({x} {y})"), srid));
        }
        Some(Geometry::new(String::new(), srid))
    }

    /// Best-effort decode of a GeoJSON `{"type":"Point","coordinates":[..]}`
    /// document; other geometry types are passed through as raw GeoJSON
    /// text in `wkt` (the field name is a simplification — it stores
    /// whichever text form the source carried).
    pub fn from_geojson(value: &serde_json::Value) -> Option<Geometry> {
        let ty = value.get("type")?.as_str()?;
        if ty == "Point" {
            let coords = value.get("coordinates")?.as_array()?;
            let x = coords.first()?.as_f64()?;
            let y = coords.get(1)?.as_f64()?;
            return Some(Geometry::new(format!("POINT({x} {y})"), None));
        }
        Some(Geometry::new(value.to_string(), None))
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wkt)
    }
}

/// An 8-byte optimistic-concurrency token (SQL Server `rowversion`/
/// `timestamp`). Compared by raw byte sequence, never by numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowVersion(pub [u8; 8]);

impl RowVersion {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 8] = bytes.try_into().ok()?;
        Some(RowVersion(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for RowVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode_upper(self.0))
    }
}

/// A CIDR block matched by shape rather than by a dedicated wrapper type at
/// the call site: any JSON object carrying an `Address` string and a
/// `Netmask` byte deserializes as one, mirroring the source's duck-typed
/// provider shim (an object is treated as a CIDR purely because it has
/// those two fields, not because it implements a marker trait).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrBlock {
    pub address: IpAddr,
    pub netmask: u8,
}

impl CidrBlock {
    /// Returns `Some` only when `value` is a JSON object shaped like
    /// `{"Address": "<ip>", "Netmask": <0-128>}` (or the lowercase
    /// `address`/`netmask` spelling) — the duck-typing check.
    pub fn from_shape(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        let address_raw = obj.get("Address").or_else(|| obj.get("address"))?.as_str()?;
        let netmask_raw = obj.get("Netmask").or_else(|| obj.get("netmask"))?;
        let address: IpAddr = address_raw.parse().ok()?;
        let netmask = netmask_raw.as_u64()?.try_into().ok()?;
        Some(CidrBlock { address, netmask })
    }

    pub fn format(&self) -> String {
        format!("{}/{}", self.address, self.netmask)
    }

    /// Parses the plain `address/netmask` text form engines commonly return
    /// for a `cidr`/`inet` column, the counterpart to `format`.
    pub fn parse(s: &str) -> Option<Self> {
        let (address_raw, netmask_raw) = s.trim().split_once('/')?;
        let address: IpAddr = address_raw.parse().ok()?;
        let netmask: u8 = netmask_raw.parse().ok()?;
        Some(CidrBlock { address, netmask })
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_month_interval_zero_identity_round_trips() {
        let zero = IntervalYearMonth::default();
        assert_eq!(zero.format(), "P0Y0M");
        assert_eq!(IntervalYearMonth::parse(&zero.format()), Some(zero));
    }

    #[test]
    fn year_month_interval_parse_then_format_recovers_canonical_text() {
        let canonical = "P2Y6M";
        let parsed = IntervalYearMonth::parse(canonical).unwrap();
        assert_eq!(parsed, IntervalYearMonth { years: 2, months: 6 });
        assert_eq!(parsed.format(), canonical);
    }

    #[test]
    fn year_month_interval_parse_is_lenient_about_missing_prefix() {
        assert_eq!(IntervalYearMonth::parse("1Y3M"), Some(IntervalYearMonth { years: 1, months: 3 }));
    }

    #[test]
    fn day_second_interval_round_trips_with_fractional_seconds() {
        let original = IntervalDaySecond { days: 3, hours: 4, minutes: 5, seconds: 6, nanos: 500_000_000 };
        let formatted = original.format();
        assert_eq!(IntervalDaySecond::parse(&formatted), Some(original));
    }

    #[test]
    fn day_second_interval_zero_identity() {
        let zero = IntervalDaySecond::default();
        assert_eq!(zero.format(), "P0D");
        assert_eq!(IntervalDaySecond::parse("P0D"), Some(zero));
    }

    #[test]
    fn int_range_formats_postgres_literal_syntax() {
        let range = IntRange { lower: Some(1), upper: Some(10), lower_inclusive: true, upper_inclusive: false };
        assert_eq!(range.format(), "[1,10)");
        assert_eq!(IntRange::parse("[1,10)"), Some(range));
    }

    #[test]
    fn int_range_handles_unbounded_ends() {
        let range = IntRange { lower: None, upper: Some(5), lower_inclusive: false, upper_inclusive: true };
        assert_eq!(range.format(), "(,5]");
        assert_eq!(IntRange::parse("(,5]"), Some(range));
    }

    #[test]
    fn geometry_extracts_srid_from_little_endian_ewkb_point() {
        let mut buf = vec![0x01u8];
        buf.extend_from_slice(&(0x20000001u32).to_le_bytes());
        buf.extend_from_slice(&4326i32.to_le_bytes());
        buf.extend_from_slice(&1.5f64.to_le_bytes());
        buf.extend_from_slice(&2.5f64.to_le_bytes());
        let geom = Geometry::from_ewkb(&buf).unwrap();
        assert_eq!(geom.srid, Some(4326));
        assert_eq!(geom.wkt, "POINT(1.5 2.5)");
    }

    #[test]
    fn geometry_extracts_srid_from_big_endian_ewkb_point() {
        let mut buf = vec![0x00u8];
        buf.extend_from_slice(&(0x20000001u32).to_be_bytes());
        buf.extend_from_slice(&4326i32.to_be_bytes());
        buf.extend_from_slice(&1.5f64.to_be_bytes());
        buf.extend_from_slice(&2.5f64.to_be_bytes());
        let geom = Geometry::from_ewkb(&buf).unwrap();
        assert_eq!(geom.srid, Some(4326));
        assert_eq!(geom.wkt, "POINT(1.5 2.5)");
    }

    #[test]
    fn geometry_from_geojson_point() {
        let json = serde_json::json!({"type": "Point", "coordinates": [1.0, 2.0]});
        let geom = Geometry::from_geojson(&json).unwrap();
        assert_eq!(geom.wkt, "POINT(1 2)");
    }

    #[test]
    fn row_version_compares_by_byte_sequence() {
        let a = RowVersion::from_bytes(&[0, 0, 0, 0, 0, 0, 0, 1]).unwrap();
        let b = RowVersion::from_bytes(&[0, 0, 0, 0, 0, 0, 0, 1]).unwrap();
        let c = RowVersion::from_bytes(&[1, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn cidr_block_recognized_by_shape_not_by_a_marker_type() {
        let shaped = serde_json::json!({"Address": "10.0.0.0", "Netmask": 8});
        let cidr = CidrBlock::from_shape(&shaped).unwrap();
        assert_eq!(cidr.format(), "10.0.0.0/8");

        let not_shaped = serde_json::json!({"Address": "10.0.0.0"});
        assert!(CidrBlock::from_shape(&not_shaped).is_none());
    }

    #[test]
    fn cidr_block_parse_then_format_round_trips() {
        let cidr = CidrBlock::parse("10.0.0.0/8").unwrap();
        assert_eq!(cidr.format(), "10.0.0.0/8");
    }
}
