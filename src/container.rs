//! Mutable query buffer + ordered parameter list with name-normalization and
//! neutral-token rewriting. Not `Send`-shared across threads by design — one
//! container belongs to one logical command.

use crate::connection::{Channel, TrackedConnection};
use crate::context::DbContext;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::parameter::{Direction, Parameter};
use crate::value::{DbType, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionType {
    Read,
    Write,
}

/// A reference returned by `add_parameter`, naming the parameter so callers
/// can later `set_parameter_value` without holding a borrow of the
/// container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterRef(pub String);

pub struct SqlContainer {
    query: String,
    parameters: Vec<Parameter>,
    execution_type: ExecutionType,
    dialect: Arc<Dialect>,
    context: Arc<DbContext>,
    next_param_index: usize,
    /// When bound to a transaction, execute operations reuse this
    /// connection and release becomes a no-op.
    bound_connection: Option<TrackedConnection>,
}

impl SqlContainer {
    pub(crate) fn new(execution_type: ExecutionType, dialect: Arc<Dialect>, context: Arc<DbContext>) -> Self {
        SqlContainer {
            query: String::new(),
            parameters: Vec::new(),
            execution_type,
            dialect,
            context,
            next_param_index: 0,
            bound_connection: None,
        }
    }

    pub(crate) fn bind_to_connection(mut self, connection: TrackedConnection) -> Self {
        self.bound_connection = Some(connection);
        self
    }

    pub fn execution_type(&self) -> ExecutionType {
        self.execution_type
    }

    pub fn sql(&self) -> &str {
        &self.query
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Null/empty input is a no-op.
    pub fn append(&mut self, text: &str) -> &mut Self {
        if !text.is_empty() {
            self.query.push_str(text);
        }
        self
    }

    /// Strips the dialect marker if present; returns `raw` unchanged for
    /// positional dialects.
    pub fn normalize_parameter_name(&self, raw: &str) -> String {
        if !self.dialect.supports_named_parameters {
            return raw.to_string();
        }
        raw.trim_start_matches(self.dialect.parameter_marker).to_string()
    }

    /// Generates a unique name if omitted (prefix `p`, monotonic counter,
    /// truncated to the dialect's name-length limit — truncation may
    /// collapse distinct logical names, so callers must verify uniqueness
    /// post-truncation for caller-supplied names).
    pub fn add_parameter(&mut self, name: Option<&str>, db_type: DbType, value: Value<'static>) -> Result<ParameterRef> {
        if self.parameters.len() >= self.dialect.max_parameter_limit {
            return Err(Error::TooManyParameters {
                actual: self.parameters.len() + 1,
                limit: self.dialect.max_parameter_limit,
            });
        }
        self.push_parameter(name, db_type, value)
    }

    /// Core of `add_parameter`, without the per-call `max_parameter_limit`
    /// check. Used directly by `build_where_in`'s split path, which
    /// deliberately binds more parameters than a single `IN (...)` clause's
    /// share of the limit would allow — the limit bounds one `IN` group's
    /// marker count, not the container's total, once splitting is in play.
    fn push_parameter(&mut self, name: Option<&str>, db_type: DbType, value: Value<'static>) -> Result<ParameterRef> {
        let normalized = match name {
            Some(n) => self.normalize_parameter_name(n),
            None => {
                let generated = format!("p{}", self.next_param_index);
                self.next_param_index += 1;
                generated
            }
        };
        let truncated: String = normalized.chars().take(self.dialect.parameter_name_max_length).collect();

        let mut param = self.dialect.create_parameter(Some(truncated.clone()), db_type, value);
        self.dialect.apply_binding_rules(&mut param)?;

        self.parameters.push(param);
        Ok(ParameterRef(truncated))
    }

    /// Like `add_parameter`, but resolves the provider shaping through the
    /// type/coercion registry first (keyed by the Rust type `T`), falling
    /// back to the dialect's generic binding rules when no mapping is
    /// registered for `T`.
    pub fn add_typed_parameter<T: 'static>(&mut self, name: Option<&str>, value: Value<'static>) -> Result<ParameterRef> {
        if self.parameters.len() >= self.dialect.max_parameter_limit {
            return Err(Error::TooManyParameters {
                actual: self.parameters.len() + 1,
                limit: self.dialect.max_parameter_limit,
            });
        }
        let normalized = match name {
            Some(n) => self.normalize_parameter_name(n),
            None => {
                let generated = format!("p{}", self.next_param_index);
                self.next_param_index += 1;
                generated
            }
        };
        let truncated: String = normalized.chars().take(self.dialect.parameter_name_max_length).collect();

        let mut param = self
            .dialect
            .create_parameter(Some(truncated.clone()), DbType::Object, Value::Null);
        let configured = self.context.type_registry().try_configure_parameter(
            &mut param,
            std::any::TypeId::of::<T>(),
            value,
            self.dialect.kind,
        );
        if !configured {
            self.dialect.apply_binding_rules(&mut param)?;
        }

        self.parameters.push(param);
        Ok(ParameterRef(truncated))
    }

    /// Locates an existing parameter by either its full or short name.
    /// Updating to an array value retypes the parameter to `Object`.
    pub fn set_parameter_value(&mut self, name: &str, value: Value<'static>) -> Result<()> {
        let normalized = self.normalize_parameter_name(name);
        let param = self
            .parameters
            .iter_mut()
            .find(|p| p.name.as_deref() == Some(normalized.as_str()) || p.short_name() == Some(normalized.as_str()))
            .ok_or_else(|| Error::ParameterNotFound(name.to_string()))?;
        if matches!(value, Value::Array(_)) {
            param.db_type = DbType::Object;
        }
        param.value = value;
        Ok(())
    }

    /// Substitutes `{Q}` / `{q}` / `{S}` with the dialect's quote prefix,
    /// quote suffix, and parameter marker.
    pub fn replace_neutral_tokens(&self, sql: &str) -> Result<String> {
        if sql.is_empty() {
            return Err(Error::NullArgument);
        }
        Ok(sql
            .replace("{Q}", self.dialect.quote_prefix)
            .replace("{q}", self.dialect.quote_suffix)
            .replace("{S}", self.dialect.parameter_marker))
    }

    fn check_read_write_mode(&self) -> Result<()> {
        if self.execution_type == ExecutionType::Write && self.context.read_write_mode().is_read_only() {
            return Err(Error::ReadOnlyContext);
        }
        Ok(())
    }

    fn channel(&self) -> Channel {
        match self.execution_type {
            ExecutionType::Read => Channel::Read,
            ExecutionType::Write => Channel::Write,
        }
    }

    /// Acquires a connection (via the governor and strategy) for this
    /// container's execution type, applies the session preamble exactly
    /// once per physical connection, and for SQL Server reconciles
    /// `DBCC USEROPTIONS` against the expected session flags before
    /// proceeding. Guarantees release on every exit path; for
    /// transaction-bound containers release is a no-op.
    async fn acquire(&self) -> Result<(TrackedConnection, Option<crate::governor::Permit>)> {
        self.check_read_write_mode()?;
        if self.parameters.len() > self.dialect.max_parameter_limit {
            return Err(Error::TooManyParameters {
                actual: self.parameters.len(),
                limit: self.dialect.max_parameter_limit,
            });
        }

        if let Some(conn) = &self.bound_connection {
            conn.ensure_open().await?;
            self.apply_preamble_if_needed(conn).await?;
            return Ok((conn.clone(), None));
        }

        let permit = self.context.governor().acquire(self.channel()).await?;
        let conn = self.context.strategy().get(self.channel()).await?;
        conn.ensure_open().await?;
        self.apply_preamble_if_needed(&conn).await?;
        Ok((conn, Some(permit)))
    }

    async fn apply_preamble_if_needed(&self, conn: &TrackedConnection) -> Result<()> {
        if conn.has_applied_preamble() {
            return Ok(());
        }
        let preamble = self.dialect.session_preamble(conn.is_read_only_marked);
        if !preamble.is_empty() {
            conn.with_raw(|raw| Box::pin(async move { raw.execute_session_statement(&preamble).await }))
                .await?;
        }
        conn.mark_preamble_applied();
        Ok(())
    }

    async fn release(&self, conn: TrackedConnection) -> Result<()> {
        if self.bound_connection.is_some() {
            return Ok(());
        }
        self.context.strategy().release(conn).await
    }

    fn bound_values(&self) -> Vec<Value<'static>> {
        self.parameters.iter().map(|p| p.value.clone()).collect()
    }

    #[tracing::instrument(skip(self), fields(execution_type = ?self.execution_type))]
    pub async fn execute_non_query(&self) -> Result<u64> {
        let (conn, _permit) = self.acquire().await?;
        let values = self.bound_values();
        let result = conn
            .with_raw(|raw| {
                let sql = self.query.clone();
                Box::pin(async move { raw.execute_raw(&sql, &values).await })
            })
            .await;
        self.release(conn).await?;
        result
    }

    #[tracing::instrument(skip(self, target), fields(execution_type = ?self.execution_type))]
    pub async fn execute_scalar<T>(&self, target: impl Fn(&Value<'static>) -> Option<T> + Send) -> Result<Option<T>> {
        let (conn, _permit) = self.acquire().await?;
        let values = self.bound_values();
        let result = conn
            .with_raw(|raw| {
                let sql = self.query.clone();
                Box::pin(async move { raw.query_raw(&sql, &values).await })
            })
            .await;
        self.release(conn).await?;
        let rows = result?;
        match rows.rows.first().and_then(|r| r.values.first()) {
            None => Ok(None),
            Some(Value::Null) => Ok(None),
            Some(v) => target(v).map(Some).ok_or(Error::UnexpectedNull),
        }
    }

    /// Same as `execute_scalar` but explicitly against the write channel,
    /// for engines where a scalar-returning write (e.g. `RETURNING`) must
    /// run on the writer connection.
    pub async fn execute_scalar_write<T>(&self, target: impl Fn(&Value<'static>) -> Option<T> + Send) -> Result<Option<T>> {
        self.check_read_write_mode()?;
        self.execute_scalar(target).await
    }

    #[tracing::instrument(skip(self), fields(execution_type = ?self.execution_type))]
    pub async fn execute_reader(&self) -> Result<crate::connection::RawRows> {
        let (conn, _permit) = self.acquire().await?;
        let values = self.bound_values();
        let result = conn
            .with_raw(|raw| {
                let sql = self.query.clone();
                Box::pin(async move { raw.query_raw(&sql, &values).await })
            })
            .await;
        self.release(conn).await?;
        result
    }

    pub async fn execute_reader_single_row(&self) -> Result<Option<crate::connection::RawRow>> {
        let mut rows = self.execute_reader().await?;
        Ok(if rows.rows.is_empty() { None } else { Some(rows.rows.remove(0)) })
    }

    /// Builds a `column IN (...)` predicate (or its degenerate forms) and
    /// binds one parameter per value, appending both to this container.
    /// An empty `values` returns an always-false predicate without binding
    /// anything; a single value uses `=`; more than one uses `IN (...)`,
    /// splitting across multiple `OR`-joined `IN` groups when the list
    /// would otherwise push the container over `max_parameter_limit`.
    pub fn build_where_in(&mut self, column: &str, db_type: DbType, values: Vec<Value<'static>>) -> Result<String> {
        if values.is_empty() {
            return Ok("1 = 0".to_string());
        }
        if values.len() == 1 {
            let value = values.into_iter().next().unwrap();
            let ref_ = self.add_parameter(None, db_type, value)?;
            let marker = self.dialect.make_parameter_name(Some(&ref_.0));
            return Ok(format!("{column} = {marker}"));
        }

        // `max_parameter_limit` bounds one `IN (...)` group's own marker
        // count here, not the container's running total: splitting exists
        // precisely to bind more values than a single `IN` clause could
        // hold, so each chunk is pushed via `push_parameter`, which skips
        // the whole-container cap `add_parameter` enforces.
        let chunk_size = self.dialect.max_parameter_limit.max(1);
        let mut groups = Vec::new();
        for chunk in values.chunks(chunk_size) {
            let mut markers = Vec::with_capacity(chunk.len());
            for value in chunk.iter().cloned() {
                let ref_ = self.push_parameter(None, db_type, value)?;
                markers.push(self.dialect.make_parameter_name(Some(&ref_.0)));
            }
            groups.push(format!("{column} IN ({})", markers.join(", ")));
        }
        if groups.len() == 1 {
            Ok(groups.into_iter().next().unwrap())
        } else {
            Ok(format!("({})", groups.join(" OR ")))
        }
    }

    /// Test-only seam: lets `src/tests/container_tests.rs` shrink the
    /// dialect's parameter limit without a full context reconstruction, to
    /// exercise `build_where_in`'s split path cheaply.
    #[cfg(test)]
    pub(crate) fn set_dialect_for_test(&mut self, dialect: Arc<Dialect>) {
        self.dialect = dialect;
    }

    #[cfg(test)]
    pub(crate) fn dialect_for_test(&self) -> &Dialect {
        &self.dialect
    }
}

impl Parameter {
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }
}
