use super::{DatabaseKind, Dialect, Feature, ProcWrappingStyle, ProductInfo};
use enumflags2::BitFlags;

/// Shared between `PostgreSql` and the wire-compatible `CockroachDb` caller
/// (see `cockroachdb.rs`, which narrows the feature set this returns).
pub(super) fn descriptor(kind: DatabaseKind) -> Dialect {
    Dialect {
        kind,
        parameter_marker: "$",
        supports_named_parameters: false,
        quote_prefix: "\"",
        quote_suffix: "\"",
        composite_identifier_separator: '.',
        parameter_name_max_length: 63,
        max_parameter_limit: 65_535,
        max_output_parameters: 100,
        proc_wrapping_style: ProcWrappingStyle::PostgreSql,
        features: Feature::NamedParams
            | Feature::OnConflict
            | Feature::Returning
            | Feature::JsonTypes
            | Feature::ArrayTypes
            | Feature::WindowFns
            | Feature::Cte
            | Feature::Namespaces
            | Feature::Savepoints
            | Feature::IdentityColumns
            | Feature::Prepare
            | Feature::SetValuedParams,
        product_info: ProductInfo::default(),
    }
}

#[allow(dead_code)]
pub(super) fn empty_features() -> BitFlags<Feature> {
    BitFlags::empty()
}
