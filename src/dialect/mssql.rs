use super::{DatabaseKind, Dialect, Feature, ProcWrappingStyle, ProductInfo};

pub(super) fn descriptor() -> Dialect {
    Dialect {
        kind: DatabaseKind::SqlServer,
        parameter_marker: "@",
        supports_named_parameters: true,
        quote_prefix: "[",
        quote_suffix: "]",
        composite_identifier_separator: '.',
        parameter_name_max_length: 128,
        max_parameter_limit: 2_100,
        max_output_parameters: 2_100,
        proc_wrapping_style: ProcWrappingStyle::ExecuteProcedure,
        features: Feature::NamedParams
            | Feature::Merge
            | Feature::JsonTypes
            | Feature::WindowFns
            | Feature::Cte
            | Feature::Namespaces
            | Feature::Savepoints
            | Feature::IdentityColumns
            | Feature::Prepare
            | Feature::Temporal,
        product_info: ProductInfo::default(),
    }
}
