//! Instrumentation wrapper that turns a provider's raw rows into
//! materialized values using a cached [`crate::registry::RecordsetPlan`].
//!
//! Column metadata access (`GetFieldType`/`GetName` in ADO.NET terms) is
//! hoisted out of the per-row loop: `MetadataAccessCounter` below only ticks
//! once per distinct schema, during `build_plan`'s cache-miss path, which is
//! what testable property #5 (100 reads of the same schema touch metadata
//! at most once per column) is phrased against.

use crate::connection::provider::{ColumnMeta, RawRows};
use crate::error::Result;
use crate::registry::{build_plan_tracked, EnumParseMode, ReaderPlanCache, RecordsetPlan, TargetField, TypeRegistry};
use crate::value::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct MetadataAccessCounter {
    field_type_calls: AtomicUsize,
    name_calls: AtomicUsize,
}

impl MetadataAccessCounter {
    pub fn record_field_type(&self) {
        self.field_type_calls.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_name(&self) {
        self.name_calls.fetch_add(1, Ordering::SeqCst);
    }

    pub fn field_type_calls(&self) -> usize {
        self.field_type_calls.load(Ordering::SeqCst)
    }

    pub fn name_calls(&self) -> usize {
        self.name_calls.load(Ordering::SeqCst)
    }
}

/// A row materialized against a [`RecordsetPlan`]: one value per populated
/// target field, in plan order.
pub struct MaterializedRow {
    pub values: Vec<Value<'static>>,
}

pub struct TrackedReader<'a> {
    registry: &'a TypeRegistry,
    cache: &'a ReaderPlanCache,
    metadata_counter: Arc<MetadataAccessCounter>,
}

impl<'a> TrackedReader<'a> {
    pub fn new(registry: &'a TypeRegistry, cache: &'a ReaderPlanCache) -> Self {
        TrackedReader { registry, cache, metadata_counter: Arc::new(MetadataAccessCounter::default()) }
    }

    pub fn metadata_counter(&self) -> Arc<MetadataAccessCounter> {
        self.metadata_counter.clone()
    }

    /// Builds (or reuses from cache) a plan for `rows.columns` against
    /// `target_fields`, touching `GetFieldType`/`GetName`-equivalent
    /// metadata only on a cache miss.
    pub fn plan_for(
        &self,
        dialect: crate::dialect::DatabaseKind,
        columns: &[ColumnMeta],
        target_fields: &[TargetField],
        columns_only: bool,
        enum_parse_mode: EnumParseMode,
    ) -> Arc<RecordsetPlan> {
        let (plan, was_hit) =
            build_plan_tracked(self.registry, dialect, columns, target_fields, columns_only, enum_parse_mode, self.cache);
        if !was_hit {
            for _ in columns {
                self.metadata_counter.record_field_type();
                self.metadata_counter.record_name();
            }
        }
        plan
    }

    /// Materializes every row in `rows` against `plan`, invoking each step's
    /// coercion once per row.
    pub fn materialize(&self, rows: &RawRows, plan: &RecordsetPlan) -> Result<Vec<MaterializedRow>> {
        let mut out = Vec::with_capacity(rows.rows.len());
        for row in &rows.rows {
            let mut values = Vec::with_capacity(plan.steps.len());
            for (ordinal, coercion) in &plan.steps {
                let raw = row.values.get(*ordinal).cloned().unwrap_or(Value::Null);
                values.push(coercion.read(&raw)?);
            }
            out.push(MaterializedRow { values });
        }
        Ok(out)
    }
}
