use super::{DatabaseKind, Dialect, Feature, ProcWrappingStyle, ProductInfo};

/// MariaDb is handled by the same function as MySql: they're one
/// behavioral family, differing only in the `DatabaseKind` tag used
/// downstream (e.g. `Dialect::upsert_incoming_column` never branches on
/// MySql vs MariaDb, only on the shared feature set here).
pub(super) fn descriptor(kind: DatabaseKind) -> Dialect {
    Dialect {
        kind,
        parameter_marker: "?",
        supports_named_parameters: false,
        quote_prefix: "`",
        quote_suffix: "`",
        composite_identifier_separator: '.',
        parameter_name_max_length: 64,
        max_parameter_limit: 65_535,
        max_output_parameters: 100,
        proc_wrapping_style: ProcWrappingStyle::Call,
        features: Feature::OnDuplicateKey
            | Feature::JsonTypes
            | Feature::WindowFns
            | Feature::Cte
            | Feature::Savepoints
            | Feature::IdentityColumns
            | Feature::Prepare,
        product_info: ProductInfo::default(),
    }
}
