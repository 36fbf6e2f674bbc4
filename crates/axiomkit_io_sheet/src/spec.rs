//! Shared sheet export specification models.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

use crate::conf::{
    C_DATE_FORMAT_DEFAULT, C_SHEET_NAME_DEFAULT, EnumFormatKind, N_WIDTH_COLUMN_DEFAULT,
};

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification registered in the document format table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,
    /// Font color (`#RRGGBB`).
    pub font_color: Option<String>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color (`#RRGGBB`).
    pub bg_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
        }
    }
}

/// Handle to a format registered in a [`crate::book::SheetBook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpecFormatHandle(pub(crate) usize);

impl SpecFormatHandle {
    /// Zero-based position in the format table.
    pub fn index(self) -> usize {
        self.0
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ValueSpecification

/// Spreadsheet-primitive value stored in a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Text value. Blank cells hold an empty string.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Boolean(bool),
}

/// Raw attribute value exposed by a record.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumRecordValue {
    /// Missing value.
    Null,
    /// String value.
    String(String),
    /// Single character.
    Char(char),
    /// Boolean value.
    Boolean(bool),
    /// Integral number.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Calendar date without time.
    Date(NaiveDate),
    /// Local date and time.
    DateTime(NaiveDateTime),
    /// Date and time with a fixed UTC offset.
    DateTimeTz(DateTime<FixedOffset>),
    /// Display text of any other value.
    Text(String),
}

impl EnumRecordValue {
    /// Wrap any displayable value as text.
    pub fn text(value: impl Display) -> Self {
        Self::Text(value.to_string())
    }

    /// Whether this is a boolean value.
    pub fn is_boolean(&self) -> bool {
        matches!(self, Self::Boolean(_))
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for EnumRecordValue {
                fn from(value: $ty) -> Self {
                    Self::Integer(i64::from(value))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

/// Integers wider than `i64` fall back to `Float` when out of range.
macro_rules! impl_from_wide_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for EnumRecordValue {
                fn from(value: $ty) -> Self {
                    i64::try_from(value).map_or(Self::Float(value as f64), Self::Integer)
                }
            }
        )*
    };
}

impl_from_wide_integer!(u64, usize, i128, isize);

impl From<f32> for EnumRecordValue {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for EnumRecordValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for EnumRecordValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<char> for EnumRecordValue {
    fn from(value: char) -> Self {
        Self::Char(value)
    }
}

impl From<&str> for EnumRecordValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for EnumRecordValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<NaiveDate> for EnumRecordValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<NaiveDateTime> for EnumRecordValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<DateTime<FixedOffset>> for EnumRecordValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::DateTimeTz(value)
    }
}

impl<T: Into<EnumRecordValue>> From<Option<T>> for EnumRecordValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Substitute values written in place of a boolean attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecBoolMapping {
    /// Written when the attribute is `true`.
    pub value_true: EnumRecordValue,
    /// Written when the attribute is `false`.
    pub value_false: EnumRecordValue,
}

impl SpecBoolMapping {
    /// Return the substitute for `value`.
    pub fn select(&self, value: bool) -> &EnumRecordValue {
        if value { &self.value_true } else { &self.value_false }
    }
}

/// Replacement staged by a cell-value callback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecCellOverride {
    /// Replacement raw value.
    pub value: Option<EnumRecordValue>,
    /// Replacement format.
    pub fmt: Option<SpecFormatHandle>,
}

impl SpecCellOverride {
    /// Keep the resolved value and format.
    pub fn keep() -> Self {
        Self::default()
    }

    /// Stage a replacement value.
    pub fn with_value(mut self, value: impl Into<EnumRecordValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Stage a replacement format.
    pub fn with_fmt(mut self, fmt: SpecFormatHandle) -> Self {
        self.fmt = Some(fmt);
        self
    }
}

/// Text written for non-finite floats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecValuePolicy {
    /// Replacement text for NaN.
    pub nan_str: String,
    /// Replacement text for positive infinity.
    pub posinf_str: String,
    /// Replacement text for negative infinity.
    pub neginf_str: String,
}

impl Default for SpecValuePolicy {
    fn default() -> Self {
        Self {
            nan_str: "NaN".to_string(),
            posinf_str: "Inf".to_string(),
            neginf_str: "-Inf".to_string(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ExportOptions

/// Session options fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecExportOptions {
    /// Write a title row on top of every page (below reserved rows).
    pub if_write_title: bool,
    /// Overwrite blank rows in place instead of keeping them.
    pub if_skip_blank_rows: bool,
    /// Data rows per page; `<= 0` means bounded only by the format ceiling.
    pub rows_per_page: i64,
    /// Rows reserved on top of every page for caller content.
    pub rows_reserved: usize,
    /// Output binary layout.
    pub format_kind: EnumFormatKind,
    /// Default chrono date pattern.
    pub date_format: String,
    /// Page name prefix.
    pub sheet_name: String,
    /// Non-finite float text.
    pub value_policy: SpecValuePolicy,
}

impl Default for SpecExportOptions {
    fn default() -> Self {
        Self {
            if_write_title: true,
            if_skip_blank_rows: true,
            rows_per_page: -1,
            rows_reserved: 0,
            format_kind: EnumFormatKind::Modern,
            date_format: C_DATE_FORMAT_DEFAULT.to_string(),
            sheet_name: C_SHEET_NAME_DEFAULT.to_string(),
            value_policy: SpecValuePolicy::default(),
        }
    }
}

/// Column selection, mutable between write batches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecExportColumns {
    /// Attribute names in output column order.
    pub properties: Vec<String>,
    /// Attribute names never written.
    pub exclude_properties: BTreeSet<String>,
    /// Title texts, parallel to `properties`.
    pub titles: Vec<String>,
}

/// Formatting policy, mutable between write batches.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecStylingPolicy {
    /// Default data cell format; created lazily when `None`.
    pub fmt_cell: Option<SpecFormatHandle>,
    /// Default title cell format; created lazily when `None`.
    pub fmt_title: Option<SpecFormatHandle>,
    /// Data cell format by attribute.
    pub dict_fmt_by_property: BTreeMap<String, SpecFormatHandle>,
    /// Title cell format by attribute.
    pub dict_fmt_title_by_property: BTreeMap<String, SpecFormatHandle>,
    /// Default column width in characters; `None` keeps the backend default.
    pub width_column_default: Option<f64>,
    /// Column width by attribute.
    pub dict_width_by_property: BTreeMap<String, f64>,
    /// Data row height in points.
    pub height_row: Option<f64>,
    /// Title row height in points.
    pub height_title_row: Option<f64>,
    /// Date pattern by attribute.
    pub dict_date_format_by_property: BTreeMap<String, String>,
    /// Boolean substitutes by attribute.
    pub dict_bool_mapping_by_property: BTreeMap<String, SpecBoolMapping>,
}

impl Default for SpecStylingPolicy {
    fn default() -> Self {
        Self {
            fmt_cell: None,
            fmt_title: None,
            dict_fmt_by_property: BTreeMap::new(),
            dict_fmt_title_by_property: BTreeMap::new(),
            width_column_default: Some(N_WIDTH_COLUMN_DEFAULT),
            dict_width_by_property: BTreeMap::new(),
            height_row: None,
            height_title_row: None,
            dict_date_format_by_property: BTreeMap::new(),
            dict_bool_mapping_by_property: BTreeMap::new(),
        }
    }
}

impl SpecStylingPolicy {
    /// Map `true`/`false` of `property` to substitute values.
    pub fn put_bool_mapping(
        &mut self,
        property: impl Into<String>,
        value_true: impl Into<EnumRecordValue>,
        value_false: impl Into<EnumRecordValue>,
    ) {
        self.dict_bool_mapping_by_property.insert(
            property.into(),
            SpecBoolMapping {
                value_true: value_true.into(),
                value_false: value_false.into(),
            },
        );
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region BatchPlanSpecification

/// One resolved output column.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecColumnPlan {
    /// Attribute name.
    pub property: String,
    /// Title text, when titles are written.
    pub title: Option<String>,
    /// Resolved data cell format.
    pub fmt_cell: Option<SpecFormatHandle>,
    /// Resolved title cell format.
    pub fmt_title: Option<SpecFormatHandle>,
    /// Resolved column width.
    pub width: Option<f64>,
}

/// Per-batch resolution of columns and styling.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecBatchPlan {
    /// Output columns in order.
    pub columns: Vec<SpecColumnPlan>,
    /// Data row height.
    pub height_row: Option<f64>,
    /// Title row height.
    pub height_title_row: Option<f64>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Document-level counters snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecExportReport {
    /// Pages created so far.
    pub n_sheets: usize,
    /// Non-blank rows including title rows, excluding reserved rows.
    pub n_rows_non_blank: usize,
    /// Non-blank data rows.
    pub n_rows_data: usize,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecExportReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
