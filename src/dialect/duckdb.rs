use super::{DatabaseKind, Dialect, Feature, ProcWrappingStyle, ProductInfo};

pub(super) fn descriptor() -> Dialect {
    Dialect {
        kind: DatabaseKind::DuckDb,
        parameter_marker: "?",
        supports_named_parameters: false,
        quote_prefix: "\"",
        quote_suffix: "\"",
        composite_identifier_separator: '.',
        parameter_name_max_length: 255,
        max_parameter_limit: 4_000,
        max_output_parameters: 0,
        proc_wrapping_style: ProcWrappingStyle::None,
        features: Feature::OnConflict | Feature::Returning | Feature::JsonTypes | Feature::WindowFns | Feature::Cte,
        product_info: ProductInfo::default(),
    }
}
