use super::{DatabaseKind, Dialect, ProcWrappingStyle, ProductInfo};
use enumflags2::BitFlags;

/// Fallback used when detection fails or the provider name is unrecognized.
/// Conservative: no optional features, `Sql92` standard level.
pub(super) fn descriptor() -> Dialect {
    Dialect {
        kind: DatabaseKind::Unknown,
        parameter_marker: "?",
        supports_named_parameters: false,
        quote_prefix: "\"",
        quote_suffix: "\"",
        composite_identifier_separator: '.',
        parameter_name_max_length: 30,
        max_parameter_limit: 999,
        max_output_parameters: 0,
        proc_wrapping_style: ProcWrappingStyle::None,
        features: BitFlags::empty(),
        product_info: ProductInfo::default(),
    }
}
