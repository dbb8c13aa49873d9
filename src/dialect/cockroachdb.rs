use super::{postgres, DatabaseKind, Dialect, Feature};

/// CockroachDb speaks the PostgreSQL wire protocol and reuses most of its
/// quoting/marker behavior, but always resolves to `Serializable` isolation
/// (see `Dialect::resolve_isolation`) and lacks window functions support
/// parity in older releases, so `WindowFns` is dropped from the inherited
/// feature set.
pub(super) fn descriptor() -> Dialect {
    let mut d = postgres::descriptor(DatabaseKind::CockroachDb);
    d.features.remove(Feature::WindowFns);
    d.max_parameter_limit = 32_767;
    d
}
