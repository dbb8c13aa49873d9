use super::{DatabaseKind, Dialect, Feature, ProcWrappingStyle, ProductInfo};

pub(super) fn descriptor() -> Dialect {
    Dialect {
        kind: DatabaseKind::Oracle,
        parameter_marker: ":",
        supports_named_parameters: true,
        quote_prefix: "\"",
        quote_suffix: "\"",
        composite_identifier_separator: '.',
        parameter_name_max_length: 30,
        max_parameter_limit: 64_000,
        max_output_parameters: 64_000,
        proc_wrapping_style: ProcWrappingStyle::Oracle,
        features: Feature::NamedParams
            | Feature::Merge
            | Feature::WindowFns
            | Feature::Cte
            | Feature::Namespaces
            | Feature::Savepoints
            | Feature::IdentityColumns
            | Feature::Prepare
            | Feature::XmlTypes
            | Feature::Temporal,
        product_info: ProductInfo::default(),
    }
}
