//! Raw attribute value to cell value coercion.

use std::fmt::Write as _;

use chrono::{NaiveDateTime, NaiveTime};

use crate::error::{SheetExportError, SheetExportResult};
use crate::spec::{EnumCellValue, EnumRecordValue, SpecStylingPolicy, SpecValuePolicy};
use crate::util::parse_date_format;

/// Convert `value` of `property` into a cell value.
///
/// Returns the cell value and whether the cell is blank. Only a null value,
/// directly or as a boolean substitute, produces a blank cell.
pub fn convert_record_value(
    value: &EnumRecordValue,
    property: &str,
    styling: &SpecStylingPolicy,
    date_format_default: &str,
    value_policy: &SpecValuePolicy,
) -> SheetExportResult<(EnumCellValue, bool)> {
    let cell_value = match value {
        EnumRecordValue::Null => return Ok((EnumCellValue::String(String::new()), true)),
        EnumRecordValue::Date(val) => EnumCellValue::String(format_date_time(
            &val.and_time(NaiveTime::MIN),
            property,
            styling,
            date_format_default,
        )?),
        EnumRecordValue::DateTime(val) => EnumCellValue::String(format_date_time(
            val,
            property,
            styling,
            date_format_default,
        )?),
        EnumRecordValue::DateTimeTz(val) => {
            let pattern = select_date_format(property, styling, date_format_default);
            EnumCellValue::String(render_date_time(val.format_with_items(
                parse_date_format(pattern)?.into_iter(),
            ))?)
        }
        EnumRecordValue::Boolean(val) => {
            let Some(mapping) = styling.dict_bool_mapping_by_property.get(property) else {
                return Ok((EnumCellValue::Boolean(*val), false));
            };
            let value_mapped = mapping.select(*val);
            validate_bool_substitute(property, value_mapped)?;
            return convert_record_value(
                value_mapped,
                property,
                styling,
                date_format_default,
                value_policy,
            );
        }
        EnumRecordValue::Integer(val) => EnumCellValue::Number(*val as f64),
        EnumRecordValue::Float(val) => {
            if val.is_finite() {
                EnumCellValue::Number(*val)
            } else {
                EnumCellValue::String(convert_non_finite_to_str(*val, value_policy))
            }
        }
        EnumRecordValue::Char(val) => EnumCellValue::String(val.to_string()),
        EnumRecordValue::String(val) | EnumRecordValue::Text(val) => {
            EnumCellValue::String(val.clone())
        }
    };
    Ok((cell_value, false))
}

/// Fail when a boolean substitute is itself boolean.
pub fn validate_bool_substitute(property: &str, value: &EnumRecordValue) -> SheetExportResult<()> {
    if value.is_boolean() {
        return Err(SheetExportError::config(format!(
            "boolean mapping of property {property:?} must not map to a boolean."
        )));
    }
    Ok(())
}

fn select_date_format<'a>(
    property: &str,
    styling: &'a SpecStylingPolicy,
    date_format_default: &'a str,
) -> &'a str {
    styling
        .dict_date_format_by_property
        .get(property)
        .map_or(date_format_default, String::as_str)
}

fn format_date_time(
    value: &NaiveDateTime,
    property: &str,
    styling: &SpecStylingPolicy,
    date_format_default: &str,
) -> SheetExportResult<String> {
    let pattern = select_date_format(property, styling, date_format_default);
    render_date_time(value.format_with_items(parse_date_format(pattern)?.into_iter()))
}

fn render_date_time(formatted: impl std::fmt::Display) -> SheetExportResult<String> {
    let mut c_text = String::new();
    write!(c_text, "{formatted}").map_err(|_| {
        SheetExportError::config("date format pattern does not apply to the value.")
    })?;
    Ok(c_text)
}

fn convert_non_finite_to_str(x: f64, value_policy: &SpecValuePolicy) -> String {
    if x.is_nan() {
        value_policy.nan_str.clone()
    } else if x.is_sign_positive() {
        value_policy.posinf_str.clone()
    } else {
        value_policy.neginf_str.clone()
    }
}
