//! Thread-safe, extensible mapping between application types and provider
//! values, plus the bounded reader-plan cache used during materialization.

use crate::dialect::DatabaseKind;
use crate::error::{Error, Result};
use crate::parameter::Parameter;
use crate::types::{CidrBlock, Geometry, IntRange, IntervalDaySecond, IntervalYearMonth, RowVersion};
use crate::value::{DbType, Value};
use std::any::TypeId;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Answers both directions: given a target type and dialect, configure a
/// provider parameter; given a provider value, read it back as the target
/// type.
pub trait Coercion: Send + Sync {
    fn configure(&self, param: &mut Parameter, value: &Value<'static>) -> Result<()>;
    fn read(&self, raw: &Value<'static>) -> Result<Value<'static>>;
    fn db_type(&self) -> DbType;
}

type TypeKey = TypeId;

struct MemoEntry {
    stamp: u64,
    coercion: Arc<dyn Coercion>,
}

/// `(target_type) -> coercion` general map, `(target_type, dialect) ->
/// coercion` override map preferred when present, a version counter bumped
/// on every registration, and a versioned-stamp memo cache so concurrent
/// `try_configure_parameter` calls never block on registration and always
/// converge to the latest registration within a bounded number of calls.
pub struct TypeRegistry {
    general: RwLock<HashMap<TypeKey, Arc<dyn Coercion>>>,
    overrides: RwLock<HashMap<(TypeKey, DatabaseKind), Arc<dyn Coercion>>>,
    version: AtomicU64,
    memo: RwLock<HashMap<(TypeKey, DatabaseKind), MemoEntry>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        let registry = TypeRegistry {
            general: RwLock::new(HashMap::new()),
            overrides: RwLock::new(HashMap::new()),
            version: AtomicU64::new(0),
            memo: RwLock::new(HashMap::new()),
        };
        registry.install_builtins();
        registry
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn install_builtins(&self) {
        self.register_converter(TypeId::of::<bool>(), Arc::new(BooleanCoercion));
        self.register_converter(TypeId::of::<i32>(), Arc::new(ScalarCoercion(DbType::Int32)));
        self.register_converter(TypeId::of::<i64>(), Arc::new(ScalarCoercion(DbType::Int64)));
        self.register_converter(TypeId::of::<String>(), Arc::new(ScalarCoercion(DbType::String)));
        self.register_converter(TypeId::of::<Vec<u8>>(), Arc::new(ScalarCoercion(DbType::Binary)));
        self.register_converter(TypeId::of::<chrono::DateTime<chrono::Utc>>(), Arc::new(DateTimeCoercion));
        self.register_converter(TypeId::of::<bigdecimal::BigDecimal>(), Arc::new(DecimalCoercion));
        self.register_converter(TypeId::of::<serde_json::Value>(), Arc::new(JsonCoercion));
        self.register_converter(TypeId::of::<uuid::Uuid>(), Arc::new(UuidCoercion));
        self.register_converter(
            TypeId::of::<chrono::DateTime<chrono::FixedOffset>>(),
            Arc::new(DateTimeOffsetCoercion),
        );
        self.register_converter(TypeId::of::<IntervalYearMonth>(), Arc::new(IntervalYearMonthCoercion));
        self.register_converter(TypeId::of::<IntervalDaySecond>(), Arc::new(IntervalDaySecondCoercion));
        self.register_converter(TypeId::of::<IntRange>(), Arc::new(IntRangeCoercion));
        self.register_converter(TypeId::of::<Geometry>(), Arc::new(SpatialCoercion));
        self.register_converter(TypeId::of::<RowVersion>(), Arc::new(RowVersionCoercion));
        self.register_converter(TypeId::of::<CidrBlock>(), Arc::new(CidrCoercion));
    }

    pub fn register_mapping(&self, type_id: TypeKey, dialect: DatabaseKind, mapping: Arc<dyn Coercion>) {
        self.overrides.write().unwrap().insert((type_id, dialect), mapping);
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    pub fn register_converter(&self, type_id: TypeKey, converter: Arc<dyn Coercion>) {
        self.general.write().unwrap().insert(type_id, converter);
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    fn lookup(&self, type_id: TypeKey, dialect: DatabaseKind) -> Option<Arc<dyn Coercion>> {
        let current_version = self.version.load(Ordering::SeqCst);
        if let Some(entry) = self.memo.read().unwrap().get(&(type_id, dialect)) {
            if entry.stamp == current_version {
                return Some(entry.coercion.clone());
            }
        }
        let resolved = self
            .overrides
            .read()
            .unwrap()
            .get(&(type_id, dialect))
            .cloned()
            .or_else(|| self.general.read().unwrap().get(&type_id).cloned())?;
        self.memo.write().unwrap().insert(
            (type_id, dialect),
            MemoEntry { stamp: current_version, coercion: resolved.clone() },
        );
        Some(resolved)
    }

    /// For dialects without an override, the returned coercion is the same
    /// `Arc` instance as the general-map entry (testable property: pointer
    /// equality). Adding an override for `(type_id, dialect)` makes
    /// subsequent lookups return a distinct instance.
    pub fn get_coercion(&self, type_id: TypeKey, dialect: DatabaseKind) -> Option<Arc<dyn Coercion>> {
        self.lookup(type_id, dialect)
    }

    /// Sets `parameter.value` to null for a null input, otherwise applies
    /// the registered converter and stamps `DbType`/`Size`/`Precision`/
    /// `Scale`. Returns `false` only when no mapping exists, in which case
    /// the caller falls back to `Dialect::apply_binding_rules`.
    pub fn try_configure_parameter(
        &self,
        param: &mut Parameter,
        type_id: TypeKey,
        value: Value<'static>,
        dialect: DatabaseKind,
    ) -> bool {
        let Some(coercion) = self.lookup(type_id, dialect) else {
            return false;
        };
        param.value = value;
        if param.value.is_null() {
            param.db_type = coercion.db_type();
            return true;
        }
        if coercion.configure(param, &param.value.clone()).is_err() {
            return false;
        }
        true
    }
}

struct ScalarCoercion(DbType);
impl Coercion for ScalarCoercion {
    fn configure(&self, param: &mut Parameter, _value: &Value<'static>) -> Result<()> {
        param.db_type = self.0;
        Ok(())
    }
    fn read(&self, raw: &Value<'static>) -> Result<Value<'static>> {
        Ok(raw.clone())
    }
    fn db_type(&self) -> DbType {
        self.0
    }
}

/// Accepts the engine-agnostic "truthy" set: `t/T/y/Y/1/true/non-zero-numeric`.
struct BooleanCoercion;
impl Coercion for BooleanCoercion {
    fn configure(&self, param: &mut Parameter, value: &Value<'static>) -> Result<()> {
        param.db_type = DbType::Boolean;
        if let Value::Text(s) = value {
            let truthy = matches!(s.as_ref(), "t" | "T" | "y" | "Y" | "1" | "true" | "TRUE" | "True");
            param.value = Value::Boolean(truthy || s.parse::<f64>().map(|n| n != 0.0).unwrap_or(false));
        }
        Ok(())
    }
    fn read(&self, raw: &Value<'static>) -> Result<Value<'static>> {
        match raw {
            Value::Boolean(_) => Ok(raw.clone()),
            Value::Int32(i) => Ok(Value::Boolean(*i != 0)),
            Value::Int64(i) => Ok(Value::Boolean(*i != 0)),
            Value::Text(s) => Ok(Value::Boolean(matches!(
                s.as_ref(),
                "t" | "T" | "y" | "Y" | "1" | "true" | "TRUE" | "True"
            ))),
            Value::Null => Ok(Value::Null),
            _ => Err(Error::UnsupportedTypeBinding("bool".into())),
        }
    }
    fn db_type(&self) -> DbType {
        DbType::Boolean
    }
}

struct DateTimeCoercion;
impl Coercion for DateTimeCoercion {
    fn configure(&self, param: &mut Parameter, _value: &Value<'static>) -> Result<()> {
        param.db_type = DbType::DateTime;
        Ok(())
    }
    fn read(&self, raw: &Value<'static>) -> Result<Value<'static>> {
        Ok(raw.clone())
    }
    fn db_type(&self) -> DbType {
        DbType::DateTime
    }
}

struct DecimalCoercion;
impl Coercion for DecimalCoercion {
    fn configure(&self, param: &mut Parameter, value: &Value<'static>) -> Result<()> {
        param.db_type = DbType::Decimal;
        if let Value::Numeric(n) = value {
            let (_, scale) = n.as_bigint_and_exponent();
            param.scale = Some(scale as i16);
            param.precision = Some(n.digits() as i16);
        }
        Ok(())
    }
    fn read(&self, raw: &Value<'static>) -> Result<Value<'static>> {
        Ok(raw.clone())
    }
    fn db_type(&self) -> DbType {
        DbType::Decimal
    }
}

struct JsonCoercion;
impl Coercion for JsonCoercion {
    fn configure(&self, param: &mut Parameter, _value: &Value<'static>) -> Result<()> {
        param.db_type = DbType::Json;
        Ok(())
    }
    fn read(&self, raw: &Value<'static>) -> Result<Value<'static>> {
        Ok(raw.clone())
    }
    fn db_type(&self) -> DbType {
        DbType::Json
    }
}

struct UuidCoercion;
impl Coercion for UuidCoercion {
    fn configure(&self, param: &mut Parameter, _value: &Value<'static>) -> Result<()> {
        param.db_type = DbType::Guid;
        Ok(())
    }
    fn read(&self, raw: &Value<'static>) -> Result<Value<'static>> {
        Ok(raw.clone())
    }
    fn db_type(&self) -> DbType {
        DbType::Guid
    }
}

struct DateTimeOffsetCoercion;
impl Coercion for DateTimeOffsetCoercion {
    fn configure(&self, param: &mut Parameter, _value: &Value<'static>) -> Result<()> {
        param.db_type = DbType::DateTimeOffset;
        Ok(())
    }
    fn read(&self, raw: &Value<'static>) -> Result<Value<'static>> {
        Ok(raw.clone())
    }
    fn db_type(&self) -> DbType {
        DbType::DateTimeOffset
    }
}

/// Binds/reads the ISO 8601 `P{n}Y{m}M` text form via [`IntervalYearMonth`].
struct IntervalYearMonthCoercion;
impl Coercion for IntervalYearMonthCoercion {
    fn configure(&self, param: &mut Parameter, value: &Value<'static>) -> Result<()> {
        param.db_type = DbType::String;
        if let Value::Text(s) = value {
            let interval = IntervalYearMonth::parse(s)
                .ok_or_else(|| Error::UnsupportedTypeBinding("IntervalYearMonth".into()))?;
            param.value = Value::Text(Cow::Owned(interval.format()));
        }
        Ok(())
    }
    fn read(&self, raw: &Value<'static>) -> Result<Value<'static>> {
        match raw {
            Value::Null => Ok(Value::Null),
            Value::Text(s) => {
                let interval = IntervalYearMonth::parse(s)
                    .ok_or_else(|| Error::UnsupportedTypeBinding("IntervalYearMonth".into()))?;
                Ok(Value::Text(Cow::Owned(interval.format())))
            }
            _ => Err(Error::UnsupportedTypeBinding("IntervalYearMonth".into())),
        }
    }
    fn db_type(&self) -> DbType {
        DbType::String
    }
}

/// Binds/reads the ISO 8601 `P{d}DT{h}H{m}M{s}S` text form via [`IntervalDaySecond`].
struct IntervalDaySecondCoercion;
impl Coercion for IntervalDaySecondCoercion {
    fn configure(&self, param: &mut Parameter, value: &Value<'static>) -> Result<()> {
        param.db_type = DbType::String;
        if let Value::Text(s) = value {
            let interval = IntervalDaySecond::parse(s)
                .ok_or_else(|| Error::UnsupportedTypeBinding("IntervalDaySecond".into()))?;
            param.value = Value::Text(Cow::Owned(interval.format()));
        }
        Ok(())
    }
    fn read(&self, raw: &Value<'static>) -> Result<Value<'static>> {
        match raw {
            Value::Null => Ok(Value::Null),
            Value::Text(s) => {
                let interval = IntervalDaySecond::parse(s)
                    .ok_or_else(|| Error::UnsupportedTypeBinding("IntervalDaySecond".into()))?;
                Ok(Value::Text(Cow::Owned(interval.format())))
            }
            _ => Err(Error::UnsupportedTypeBinding("IntervalDaySecond".into())),
        }
    }
    fn db_type(&self) -> DbType {
        DbType::String
    }
}

/// Binds/reads the PostgreSQL range literal (`[lower,upper)`) via [`IntRange`].
struct IntRangeCoercion;
impl Coercion for IntRangeCoercion {
    fn configure(&self, param: &mut Parameter, value: &Value<'static>) -> Result<()> {
        param.db_type = DbType::String;
        if let Value::Text(s) = value {
            let range =
                IntRange::parse(s).ok_or_else(|| Error::UnsupportedTypeBinding("IntRange".into()))?;
            param.value = Value::Text(Cow::Owned(range.format()));
        }
        Ok(())
    }
    fn read(&self, raw: &Value<'static>) -> Result<Value<'static>> {
        match raw {
            Value::Null => Ok(Value::Null),
            Value::Text(s) => {
                let range = IntRange::parse(s)
                    .ok_or_else(|| Error::UnsupportedTypeBinding("IntRange".into()))?;
                Ok(Value::Text(Cow::Owned(range.format())))
            }
            _ => Err(Error::UnsupportedTypeBinding("IntRange".into())),
        }
    }
    fn db_type(&self) -> DbType {
        DbType::String
    }
}

/// Normalizes any of the supported spatial wire shapes (WKT text, EWKB bytes,
/// GeoJSON) to a [`Geometry`], then carries it as `Value::Opaque` so the
/// SRID survives the round trip even though `Value` has no dedicated
/// spatial variant.
struct SpatialCoercion;
impl SpatialCoercion {
    const TAG: &'static str = "geometry";

    fn encode(geom: &Geometry) -> Vec<u8> {
        let srid = geom.srid.unwrap_or(0);
        let mut payload = Vec::with_capacity(5 + geom.wkt.len());
        payload.extend_from_slice(&srid.to_le_bytes());
        payload.push(if geom.srid.is_some() { 1 } else { 0 });
        payload.extend_from_slice(geom.wkt.as_bytes());
        payload
    }

    fn decode(payload: &[u8]) -> Result<Geometry> {
        if payload.len() < 5 {
            return Err(Error::UnsupportedTypeBinding("Geometry".into()));
        }
        let srid = i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let has_srid = payload[4] != 0;
        let wkt = String::from_utf8_lossy(&payload[5..]).into_owned();
        Ok(Geometry::new(wkt, has_srid.then_some(srid)))
    }
}
impl Coercion for SpatialCoercion {
    fn configure(&self, param: &mut Parameter, value: &Value<'static>) -> Result<()> {
        param.db_type = DbType::Binary;
        let geom = match value {
            Value::Text(s) => Geometry::new(s.as_ref(), None),
            Value::Bytes(b) => Geometry::from_ewkb(b)
                .ok_or_else(|| Error::UnsupportedTypeBinding("Geometry".into()))?,
            Value::Json(j) => {
                Geometry::from_geojson(j).ok_or_else(|| Error::UnsupportedTypeBinding("Geometry".into()))?
            }
            Value::Opaque { tag, payload } if tag.as_ref() == Self::TAG => Self::decode(payload)?,
            _ => return Err(Error::UnsupportedTypeBinding("Geometry".into())),
        };
        param.value = Value::Opaque { tag: Cow::Borrowed(Self::TAG), payload: Self::encode(&geom) };
        Ok(())
    }
    fn read(&self, raw: &Value<'static>) -> Result<Value<'static>> {
        match raw {
            Value::Null => Ok(Value::Null),
            Value::Opaque { tag, payload } if tag.as_ref() == Self::TAG => {
                let geom = Self::decode(payload)?;
                Ok(Value::Opaque { tag: Cow::Borrowed(Self::TAG), payload: Self::encode(&geom) })
            }
            Value::Bytes(b) => {
                let geom = Geometry::from_ewkb(b).ok_or_else(|| Error::UnsupportedTypeBinding("Geometry".into()))?;
                Ok(Value::Opaque { tag: Cow::Borrowed(Self::TAG), payload: Self::encode(&geom) })
            }
            _ => Err(Error::UnsupportedTypeBinding("Geometry".into())),
        }
    }
    fn db_type(&self) -> DbType {
        DbType::Binary
    }
}

/// Binds/reads the raw 8-byte token via [`RowVersion`], compared by byte
/// sequence rather than numeric value by every caller downstream.
struct RowVersionCoercion;
impl Coercion for RowVersionCoercion {
    fn configure(&self, param: &mut Parameter, value: &Value<'static>) -> Result<()> {
        param.db_type = DbType::Binary;
        if let Value::Bytes(b) = value {
            let version =
                RowVersion::from_bytes(b).ok_or_else(|| Error::UnsupportedTypeBinding("RowVersion".into()))?;
            param.value = Value::Bytes(Cow::Owned(version.as_bytes().to_vec()));
        }
        Ok(())
    }
    fn read(&self, raw: &Value<'static>) -> Result<Value<'static>> {
        match raw {
            Value::Null => Ok(Value::Null),
            Value::Bytes(b) => {
                let version =
                    RowVersion::from_bytes(b).ok_or_else(|| Error::UnsupportedTypeBinding("RowVersion".into()))?;
                Ok(Value::Bytes(Cow::Owned(version.as_bytes().to_vec())))
            }
            _ => Err(Error::UnsupportedTypeBinding("RowVersion".into())),
        }
    }
    fn db_type(&self) -> DbType {
        DbType::Binary
    }
}

/// Accepts the duck-typed `{"Address": .., "Netmask": ..}` shape on the way
/// in via [`CidrBlock::from_shape`], and the plain `address/netmask` text
/// form on the way back via [`CidrBlock::parse`].
struct CidrCoercion;
impl Coercion for CidrCoercion {
    fn configure(&self, param: &mut Parameter, value: &Value<'static>) -> Result<()> {
        param.db_type = DbType::String;
        let cidr = match value {
            Value::Json(j) => {
                CidrBlock::from_shape(j).ok_or_else(|| Error::UnsupportedTypeBinding("CidrBlock".into()))?
            }
            Value::Text(s) => {
                CidrBlock::parse(s).ok_or_else(|| Error::UnsupportedTypeBinding("CidrBlock".into()))?
            }
            _ => return Err(Error::UnsupportedTypeBinding("CidrBlock".into())),
        };
        param.value = Value::Text(Cow::Owned(cidr.format()));
        Ok(())
    }
    fn read(&self, raw: &Value<'static>) -> Result<Value<'static>> {
        match raw {
            Value::Null => Ok(Value::Null),
            Value::Text(s) => {
                let cidr = CidrBlock::parse(s).ok_or_else(|| Error::UnsupportedTypeBinding("CidrBlock".into()))?;
                Ok(Value::Text(Cow::Owned(cidr.format())))
            }
            Value::Json(j) => {
                let cidr =
                    CidrBlock::from_shape(j).ok_or_else(|| Error::UnsupportedTypeBinding("CidrBlock".into()))?;
                Ok(Value::Text(Cow::Owned(cidr.format())))
            }
            _ => Err(Error::UnsupportedTypeBinding("CidrBlock".into())),
        }
    }
    fn db_type(&self) -> DbType {
        DbType::String
    }
}

/// A target field this materialization plan will populate: column name to
/// match against the schema, plus the application type identity used to
/// select a coercion. Supplied by the caller (the façade's `TableInfo`-style
/// descriptor, built via plain field lookups rather than reflection) — the
/// core never inspects attributes.
#[derive(Clone)]
pub struct TargetField {
    pub column_name: String,
    pub type_id: TypeKey,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum EnumParseMode {
    Strict,
    Lenient,
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PlanCacheKey {
    pub target_type: TypeKey,
    pub schema_hash: u64,
    pub columns_only: bool,
    pub enum_parse_mode: u8,
}

/// One (source column ordinal, coercion) instruction per populated target
/// field, invoked once per row. Column name/type metadata lookups
/// (`GetFieldType`/`GetName` equivalents) are hoisted into plan construction
/// so a 100-row materialization does constant metadata work.
#[derive(Clone)]
pub struct RecordsetPlan {
    pub steps: Vec<(usize, Arc<dyn Coercion>)>,
}

/// Bounded, process-wide cache of materialization plans keyed by
/// `(target type, schema hash, columns-only flag, enum-parse mode)`.
/// Eviction is approximate-LRU via the `lru-cache` crate.
pub struct ReaderPlanCache {
    inner: std::sync::Mutex<lru_cache::LruCache<PlanCacheKey, Arc<RecordsetPlan>>>,
}

impl ReaderPlanCache {
    pub fn with_capacity(capacity: usize) -> Self {
        ReaderPlanCache { inner: std::sync::Mutex::new(lru_cache::LruCache::new(capacity.max(1))) }
    }

    pub fn get(&self, key: &PlanCacheKey) -> Option<Arc<RecordsetPlan>> {
        self.inner.lock().unwrap().get_mut(key).cloned()
    }

    pub fn insert(&self, key: PlanCacheKey, plan: Arc<RecordsetPlan>) {
        self.inner.lock().unwrap().insert(key, plan);
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

pub fn plan_cache_key(
    columns: &[crate::connection::provider::ColumnMeta],
    target_fields: &[TargetField],
    columns_only: bool,
    enum_parse_mode: EnumParseMode,
) -> PlanCacheKey {
    PlanCacheKey {
        target_type: target_fields.first().map(|f| f.type_id).unwrap_or_else(TypeId::of::<()>),
        schema_hash: hash_schema(columns),
        columns_only,
        enum_parse_mode: enum_parse_mode as u8,
    }
}

/// Computes a schema hash from column names + types, checks the cache, and
/// on a miss builds a plan that records `(ordinal, coercion)` for each
/// target field with a matching column. Returns whether the lookup was a
/// cache hit alongside the plan, so callers can account metadata-access
/// work (hoisted entirely into the miss path) precisely.
pub fn build_plan_tracked(
    registry: &TypeRegistry,
    dialect: DatabaseKind,
    columns: &[crate::connection::provider::ColumnMeta],
    target_fields: &[TargetField],
    columns_only: bool,
    enum_parse_mode: EnumParseMode,
    cache: &ReaderPlanCache,
) -> (Arc<RecordsetPlan>, bool) {
    let key = plan_cache_key(columns, target_fields, columns_only, enum_parse_mode);
    if let Some(hit) = cache.get(&key) {
        return (hit, true);
    }
    let mut steps = Vec::with_capacity(target_fields.len());
    for field in target_fields {
        if let Some(ordinal) = columns.iter().position(|c| c.name == field.column_name) {
            if let Some(coercion) = registry.get_coercion(field.type_id, dialect) {
                steps.push((ordinal, coercion));
            }
        }
    }
    let plan = Arc::new(RecordsetPlan { steps });
    cache.insert(key, plan.clone());
    (plan, false)
}

pub fn build_plan(
    registry: &TypeRegistry,
    dialect: DatabaseKind,
    columns: &[crate::connection::provider::ColumnMeta],
    target_fields: &[TargetField],
    columns_only: bool,
    enum_parse_mode: EnumParseMode,
    cache: &ReaderPlanCache,
) -> Arc<RecordsetPlan> {
    build_plan_tracked(registry, dialect, columns, target_fields, columns_only, enum_parse_mode, cache).0
}

fn hash_schema(columns: &[crate::connection::provider::ColumnMeta]) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    for col in columns {
        col.name.hash(&mut hasher);
        (col.db_type as u32 as u8).hash(&mut hasher);
    }
    hasher.finish()
}
