//! Per-attribute format and width resolution, plus the named format pool.

use std::collections::BTreeMap;

use crate::book::SheetBook;
use crate::conf::{derive_default_cell_format, derive_default_title_format};
use crate::spec::{SpecCellFormat, SpecFormatHandle, SpecStylingPolicy};

/// Named reusable formats of one session.
pub type DictFormatPool = BTreeMap<String, SpecFormatHandle>;

/// Data cell format of `property`: override, else the default.
pub fn resolve_cell_format(property: &str, styling: &SpecStylingPolicy) -> Option<SpecFormatHandle> {
    styling
        .dict_fmt_by_property
        .get(property)
        .copied()
        .or(styling.fmt_cell)
}

/// Title cell format of `property`: override, else the default.
pub fn resolve_title_format(
    property: &str,
    styling: &SpecStylingPolicy,
) -> Option<SpecFormatHandle> {
    styling
        .dict_fmt_title_by_property
        .get(property)
        .copied()
        .or(styling.fmt_title)
}

/// Column width of `property`: override, else the default.
pub fn resolve_column_width(property: &str, styling: &SpecStylingPolicy) -> Option<f64> {
    styling
        .dict_width_by_property
        .get(property)
        .copied()
        .or(styling.width_column_default)
}

/// Create the default data/title formats in `book` if the policy has none.
pub fn ensure_default_formats(
    book: &mut SheetBook,
    styling: &mut SpecStylingPolicy,
    if_write_title: bool,
) {
    if styling.fmt_cell.is_none() {
        styling.fmt_cell = Some(book.create_format(derive_default_cell_format()));
    }
    if if_write_title && styling.fmt_title.is_none() {
        styling.fmt_title = Some(book.create_format(derive_default_title_format()));
    }
}

/// Handle of pooled format `name`, creating it from `fmt` on first use.
///
/// An existing entry is returned unchanged; `fmt` is then ignored.
pub fn register_pooled_format(
    book: &mut SheetBook,
    dict_fmt_pool: &mut DictFormatPool,
    name: &str,
    fmt: SpecCellFormat,
) -> SpecFormatHandle {
    if let Some(handle) = dict_fmt_pool.get(name) {
        return *handle;
    }
    let handle = book.create_format(fmt);
    dict_fmt_pool.insert(name.to_string(), handle);
    handle
}
