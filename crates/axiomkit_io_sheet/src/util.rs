//! Stateless helper utilities used by the export engine.

use std::collections::BTreeSet;

use chrono::format::{Item, StrftimeItems};

use crate::conf::{C_DATE_FORMAT_DEFAULT, N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL};
use crate::error::{SheetExportError, SheetExportResult};

////////////////////////////////////////////////////////////////////////////////
// #region PropertyUtils

/// Drop repeated names, keeping the first occurrence and the input order.
pub fn derive_unique_properties<I, S>(properties: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut set_seen = BTreeSet::new();
    let mut l_properties = Vec::new();
    for c_property in properties {
        let c_property = c_property.into();
        if set_seen.insert(c_property.clone()) {
            l_properties.push(c_property);
        }
    }
    l_properties
}

/// Fail when `properties` has more entries than the format allows.
pub fn validate_column_count(n_properties: usize, n_cols_max: usize) -> SheetExportResult<()> {
    if n_properties > n_cols_max {
        return Err(SheetExportError::config(format!(
            "column count {n_properties} exceeds the maximum {n_cols_max}."
        )));
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DateFormatUtils

/// Session date pattern; blank falls back to the default.
pub fn derive_date_format(pattern: &str) -> &str {
    if pattern.trim().is_empty() {
        C_DATE_FORMAT_DEFAULT
    } else {
        pattern
    }
}

/// Parse a chrono strftime pattern, rejecting unknown specifiers.
pub fn parse_date_format(pattern: &str) -> SheetExportResult<Vec<Item<'_>>> {
    let l_items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if l_items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(SheetExportError::config(format!(
            "invalid date format pattern: {pattern:?}"
        )));
    }
    Ok(l_items)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Create suffixed sheet name (`base1`, `base2`, ...), respecting length cap.
pub fn create_sheet_identifier(base_name: &str, part_idx_1based: usize) -> String {
    let c_sheet_name_suffix = part_idx_1based.to_string();
    let n_len_base_name_max = N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(c_sheet_name_suffix.len());

    let c_sheet_name_base: String = base_name
        .chars()
        .take(usize::max(1, n_len_base_name_max))
        .collect();

    format!("{c_sheet_name_base}{c_sheet_name_suffix}")
}

/// Return `name`, or the first free `name__{n}` (n >= 2), and mark it used.
pub fn derive_unique_sheet_name(
    name: &str,
    set_sheet_names_existing: &mut BTreeSet<String>,
) -> String {
    if set_sheet_names_existing.insert(name.to_string()) {
        return name.to_string();
    }

    let mut n_idx = 2usize;
    loop {
        let c_sheet_name_suffix = format!("__{n_idx}");
        let n_len_base_name_max =
            N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(c_sheet_name_suffix.len());
        let c_sheet_name_base: String = name
            .chars()
            .take(usize::max(1, n_len_base_name_max))
            .collect();
        let candidate = format!("{c_sheet_name_base}{c_sheet_name_suffix}");
        if set_sheet_names_existing.insert(candidate.clone()) {
            return candidate;
        }
        n_idx += 1;
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region IndexCasting

/// Convert a zero-based row index to the backend row type.
pub fn cast_row_num(value: usize) -> SheetExportResult<u32> {
    u32::try_from(value)
        .map_err(|_| SheetExportError::config(format!("row index overflow: {value}")))
}

/// Convert a zero-based column index to the backend column type.
pub fn cast_col_num(value: usize) -> SheetExportResult<u16> {
    u16::try_from(value)
        .map_err(|_| SheetExportError::config(format!("column index overflow: {value}")))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
