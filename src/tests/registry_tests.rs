use crate::connection::provider::ColumnMeta;
use crate::dialect::DatabaseKind;
use crate::parameter::Parameter;
use crate::registry::{build_plan_tracked, Coercion, EnumParseMode, ReaderPlanCache, TargetField, TypeRegistry};
use crate::types::{CidrBlock, Geometry, IntRange, IntervalDaySecond, IntervalYearMonth, RowVersion};
use crate::value::{DbType, Value};
use std::any::TypeId;
use std::sync::Arc;

#[test]
fn unregistered_override_returns_the_same_instance_as_the_general_map() {
    let registry = TypeRegistry::new();
    let a = registry.get_coercion(TypeId::of::<i32>(), DatabaseKind::PostgreSql).unwrap();
    let b = registry.get_coercion(TypeId::of::<i32>(), DatabaseKind::MySql).unwrap();
    assert!(Arc::ptr_eq(&a, &b), "both dialects should resolve to the same general-map coercion instance");
}

struct MarkerCoercion;
impl Coercion for MarkerCoercion {
    fn configure(&self, param: &mut crate::parameter::Parameter, _value: &Value<'static>) -> crate::error::Result<()> {
        param.db_type = DbType::Int32;
        Ok(())
    }
    fn read(&self, raw: &Value<'static>) -> crate::error::Result<Value<'static>> {
        Ok(raw.clone())
    }
    fn db_type(&self) -> DbType {
        DbType::Int32
    }
}

#[test]
fn registering_a_dialect_override_returns_a_distinct_instance_for_that_dialect_only() {
    let registry = TypeRegistry::new();
    let general = registry.get_coercion(TypeId::of::<i32>(), DatabaseKind::PostgreSql).unwrap();

    registry.register_mapping(TypeId::of::<i32>(), DatabaseKind::PostgreSql, Arc::new(MarkerCoercion));

    let overridden = registry.get_coercion(TypeId::of::<i32>(), DatabaseKind::PostgreSql).unwrap();
    let unaffected = registry.get_coercion(TypeId::of::<i32>(), DatabaseKind::MySql).unwrap();

    assert!(!Arc::ptr_eq(&general, &overridden));
    assert!(Arc::ptr_eq(&general, &unaffected));
}

#[test]
fn converter_registration_invalidates_previously_memoized_lookups() {
    let registry = TypeRegistry::new();
    let before = registry.get_coercion(TypeId::of::<i64>(), DatabaseKind::Sqlite).unwrap();

    registry.register_converter(TypeId::of::<i64>(), Arc::new(MarkerCoercion));
    let after = registry.get_coercion(TypeId::of::<i64>(), DatabaseKind::Sqlite).unwrap();

    assert!(!Arc::ptr_eq(&before, &after), "memoized entry must not survive a new registration");
}

fn sample_columns() -> Vec<ColumnMeta> {
    vec![
        ColumnMeta { name: "id".into(), db_type: DbType::Int64 },
        ColumnMeta { name: "name".into(), db_type: DbType::String },
    ]
}

#[test]
fn reader_plan_cache_reuses_the_same_plan_for_an_identical_schema() {
    let registry = TypeRegistry::new();
    let cache = ReaderPlanCache::with_capacity(8);
    let columns = sample_columns();
    let targets = vec![
        TargetField { column_name: "id".into(), type_id: TypeId::of::<i64>() },
        TargetField { column_name: "name".into(), type_id: TypeId::of::<String>() },
    ];

    let (plan_a, hit_a) =
        build_plan_tracked(&registry, DatabaseKind::Sqlite, &columns, &targets, false, EnumParseMode::Strict, &cache);
    assert!(!hit_a);
    assert_eq!(plan_a.steps.len(), 1, "only the first target field's type_id seeds the cache key, as documented");

    let (plan_b, hit_b) =
        build_plan_tracked(&registry, DatabaseKind::Sqlite, &columns, &targets, false, EnumParseMode::Strict, &cache);
    assert!(hit_b);
    assert!(Arc::ptr_eq(&plan_a, &plan_b));
}

#[test]
fn reader_plan_cache_is_bounded_by_its_configured_capacity() {
    let cache = ReaderPlanCache::with_capacity(2);
    let registry = TypeRegistry::new();
    for i in 0..5u64 {
        let columns = vec![ColumnMeta { name: format!("col{i}"), db_type: DbType::Int64 }];
        let targets = vec![TargetField { column_name: format!("col{i}"), type_id: TypeId::of::<i64>() }];
        build_plan_tracked(&registry, DatabaseKind::Sqlite, &columns, &targets, false, EnumParseMode::Strict, &cache);
    }
    assert!(cache.len() <= 2);
}

#[test]
fn boolean_coercion_accepts_the_documented_truthy_text_set() {
    let registry = TypeRegistry::new();
    let coercion = registry.get_coercion(TypeId::of::<bool>(), DatabaseKind::Oracle).unwrap();
    for truthy in ["t", "T", "y", "Y", "1", "true", "TRUE", "True"] {
        assert_eq!(coercion.read(&Value::Text(truthy.into())).unwrap(), Value::Boolean(true));
    }
    assert_eq!(coercion.read(&Value::Text("false".into())).unwrap(), Value::Boolean(false));
    assert_eq!(coercion.read(&Value::Null).unwrap(), Value::Null);
}

fn round_trip(coercion: &dyn Coercion, bound: Value<'static>) -> Value<'static> {
    let mut param = Parameter::new(None, DbType::String, Value::Null);
    coercion.configure(&mut param, &bound).unwrap();
    coercion.read(&param.value).unwrap()
}

#[test]
fn datetime_offset_coercion_is_registered_and_passes_values_through() {
    let registry = TypeRegistry::new();
    let coercion = registry
        .get_coercion(TypeId::of::<chrono::DateTime<chrono::FixedOffset>>(), DatabaseKind::PostgreSql)
        .unwrap();
    assert_eq!(coercion.db_type(), DbType::DateTimeOffset);
    assert_eq!(coercion.read(&Value::Null).unwrap(), Value::Null);
}

#[test]
fn interval_year_month_coercion_round_trips_canonical_text() {
    let registry = TypeRegistry::new();
    let coercion = registry.get_coercion(TypeId::of::<IntervalYearMonth>(), DatabaseKind::PostgreSql).unwrap();
    let result = round_trip(coercion.as_ref(), Value::Text("1Y3M".into()));
    assert_eq!(result, Value::Text("P1Y3M".into()));
}

#[test]
fn interval_day_second_coercion_round_trips_canonical_text() {
    let registry = TypeRegistry::new();
    let coercion = registry.get_coercion(TypeId::of::<IntervalDaySecond>(), DatabaseKind::PostgreSql).unwrap();
    let result = round_trip(coercion.as_ref(), Value::Text("P2DT3H".into()));
    assert_eq!(result, Value::Text("P2DT3H".into()));
}

#[test]
fn int_range_coercion_round_trips_postgres_literal_syntax() {
    let registry = TypeRegistry::new();
    let coercion = registry.get_coercion(TypeId::of::<IntRange>(), DatabaseKind::PostgreSql).unwrap();
    let result = round_trip(coercion.as_ref(), Value::Text("[1,10)".into()));
    assert_eq!(result, Value::Text("[1,10)".into()));
}

#[test]
fn spatial_coercion_round_trips_srid_through_opaque_payload() {
    let registry = TypeRegistry::new();
    let coercion = registry.get_coercion(TypeId::of::<Geometry>(), DatabaseKind::PostgreSql).unwrap();
    let mut buf = vec![0x01u8];
    buf.extend_from_slice(&(0x2000_0001u32).to_le_bytes());
    buf.extend_from_slice(&4326i32.to_le_bytes());
    buf.extend_from_slice(&1.5f64.to_le_bytes());
    buf.extend_from_slice(&2.5f64.to_le_bytes());

    let mut param = Parameter::new(None, DbType::String, Value::Null);
    coercion.configure(&mut param, &Value::Bytes(buf.into())).unwrap();
    let read_back = coercion.read(&param.value).unwrap();
    match read_back {
        Value::Opaque { tag, payload } => {
            assert_eq!(tag.as_ref(), "geometry");
            assert!(!payload.is_empty());
        }
        other => panic!("expected Opaque, got {other:?}"),
    }
}

#[test]
fn row_version_coercion_round_trips_raw_bytes() {
    let registry = TypeRegistry::new();
    let coercion = registry.get_coercion(TypeId::of::<RowVersion>(), DatabaseKind::SqlServer).unwrap();
    let bytes: Vec<u8> = vec![0, 0, 0, 0, 0, 0, 0, 7];
    let result = round_trip(coercion.as_ref(), Value::Bytes(bytes.clone().into()));
    assert_eq!(result, Value::Bytes(bytes.into()));
}

#[test]
fn cidr_coercion_accepts_the_duck_typed_json_shape_and_round_trips_as_text() {
    let registry = TypeRegistry::new();
    let coercion = registry.get_coercion(TypeId::of::<CidrBlock>(), DatabaseKind::PostgreSql).unwrap();
    let shaped = serde_json::json!({"Address": "10.0.0.0", "Netmask": 8});
    let result = round_trip(coercion.as_ref(), Value::Json(shaped));
    assert_eq!(result, Value::Text("10.0.0.0/8".into()));
}
