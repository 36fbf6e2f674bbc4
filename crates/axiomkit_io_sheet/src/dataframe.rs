//! Polars `DataFrame` as a record source.

use std::io::Cursor;

use polars::prelude::{AnyValue, DataFrame, IpcReader, SerReader};

use crate::error::SheetExportResult;
use crate::record::SpecRecordAttributes;
use crate::spec::EnumRecordValue;

/// One record per frame row, attributes named after the columns in frame order.
pub fn derive_records_from_dataframe(
    df: &DataFrame,
) -> SheetExportResult<Vec<SpecRecordAttributes>> {
    let l_cols = df.get_columns();
    let mut l_records = Vec::with_capacity(df.height());

    for n_idx_row in 0..df.height() {
        let mut attributes = SpecRecordAttributes::new();
        for col in l_cols {
            let value = derive_record_value_from_any_value(col.get(n_idx_row)?);
            attributes.insert(col.name().as_str(), value);
        }
        l_records.push(attributes);
    }

    Ok(l_records)
}

/// Records of an Arrow IPC encoded frame.
pub fn derive_records_from_ipc_bytes(
    v_ipc_df: &[u8],
) -> SheetExportResult<Vec<SpecRecordAttributes>> {
    let df = IpcReader::new(Cursor::new(v_ipc_df)).finish()?;
    derive_records_from_dataframe(&df)
}

fn derive_record_value_from_any_value(value: AnyValue<'_>) -> EnumRecordValue {
    match value {
        AnyValue::Null => EnumRecordValue::Null,
        AnyValue::String(val) => EnumRecordValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumRecordValue::String(val.to_string()),
        AnyValue::Boolean(val) => EnumRecordValue::Boolean(val),
        AnyValue::UInt8(val) => EnumRecordValue::Integer(i64::from(val)),
        AnyValue::UInt16(val) => EnumRecordValue::Integer(i64::from(val)),
        AnyValue::UInt32(val) => EnumRecordValue::Integer(i64::from(val)),
        AnyValue::UInt64(val) => {
            i64::try_from(val).map_or(EnumRecordValue::Float(val as f64), EnumRecordValue::Integer)
        }
        AnyValue::Int8(val) => EnumRecordValue::Integer(i64::from(val)),
        AnyValue::Int16(val) => EnumRecordValue::Integer(i64::from(val)),
        AnyValue::Int32(val) => EnumRecordValue::Integer(i64::from(val)),
        AnyValue::Int64(val) => EnumRecordValue::Integer(val),
        AnyValue::Int128(val) => {
            i64::try_from(val).map_or(EnumRecordValue::Float(val as f64), EnumRecordValue::Integer)
        }
        AnyValue::Float32(val) => EnumRecordValue::Float(f64::from(val)),
        AnyValue::Float64(val) => EnumRecordValue::Float(val),
        _ => EnumRecordValue::Text(value.to_string()),
    }
}
