use crate::connection::provider::ColumnMeta;
use crate::dialect::DatabaseKind;
use crate::reader::TrackedReader;
use crate::registry::{Coercion, EnumParseMode, ReaderPlanCache, TargetField, TypeRegistry};
use crate::value::{DbType, Value};
use std::any::TypeId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct MarkerCoercion(DbType);
impl Coercion for MarkerCoercion {
    fn configure(&self, param: &mut crate::parameter::Parameter, _value: &Value<'static>) -> crate::error::Result<()> {
        param.db_type = self.0;
        Ok(())
    }
    fn read(&self, raw: &Value<'static>) -> crate::error::Result<Value<'static>> {
        Ok(raw.clone())
    }
    fn db_type(&self) -> DbType {
        self.0
    }
}

/// 20 threads alternately register a fresh converter and run
/// `try_configure_parameter` 200 times each; the registry must never panic,
/// deadlock, or return a stale coercion past the point a newer registration
/// landed and was observed.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_register_and_configure_never_panics_or_deadlocks() {
    let registry = Arc::new(TypeRegistry::new());
    let configure_calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for t in 0..20 {
        let registry = registry.clone();
        let configure_calls = configure_calls.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..200 {
                if i % 10 == 0 {
                    registry.register_converter(TypeId::of::<i32>(), Arc::new(MarkerCoercion(DbType::Int32)));
                }
                let mut param = crate::parameter::Parameter::new(None, DbType::Int32, Value::Int32(t));
                let configured =
                    registry.try_configure_parameter(&mut param, TypeId::of::<i32>(), Value::Int32(i), DatabaseKind::PostgreSql);
                assert!(configured, "i32 always has a general-map coercion registered");
                configure_calls.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(configure_calls.load(Ordering::Relaxed), 20 * 200);
}

#[test]
fn metadata_access_is_charged_once_per_column_on_a_cache_miss_and_never_again_on_a_hit() {
    let registry = TypeRegistry::new();
    let cache = ReaderPlanCache::with_capacity(8);
    let reader = TrackedReader::new(&registry, &cache);

    let columns = vec![
        ColumnMeta { name: "id".into(), db_type: DbType::Int64 },
        ColumnMeta { name: "name".into(), db_type: DbType::String },
    ];
    let targets = vec![
        TargetField { column_name: "id".into(), type_id: TypeId::of::<i64>() },
        TargetField { column_name: "name".into(), type_id: TypeId::of::<String>() },
    ];

    for _ in 0..100 {
        reader.plan_for(DatabaseKind::PostgreSql, &columns, &targets, false, EnumParseMode::Strict);
    }

    let counter = reader.metadata_counter();
    assert_eq!(counter.field_type_calls(), columns.len(), "100 reads of an identical schema must touch metadata once");
    assert_eq!(counter.name_calls(), columns.len());
}
