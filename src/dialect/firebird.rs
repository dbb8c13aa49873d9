use super::{DatabaseKind, Dialect, Feature, ProcWrappingStyle, ProductInfo};

pub(super) fn descriptor() -> Dialect {
    Dialect {
        kind: DatabaseKind::Firebird,
        parameter_marker: "?",
        supports_named_parameters: false,
        quote_prefix: "\"",
        quote_suffix: "\"",
        composite_identifier_separator: '.',
        parameter_name_max_length: 31,
        max_parameter_limit: 1_499,
        max_output_parameters: 1_499,
        proc_wrapping_style: ProcWrappingStyle::ExecuteProcedure,
        features: Feature::Merge | Feature::Cte | Feature::Savepoints | Feature::IdentityColumns,
        product_info: ProductInfo::default(),
    }
}
