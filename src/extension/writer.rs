//! Conversion of cell values into DuckDB vectors for typed table columns.

use crate::database::column::ColumnType;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::CellValue;
use duckdb::core::FlatVector;
use duckdb::core::Inserter;
use libduckdb_sys::duckdb_date;
use libduckdb_sys::duckdb_time;
use libduckdb_sys::duckdb_timestamp;

/// A cell value converted to the physical representation of its column.
#[derive(Debug, PartialEq)]
pub(super) enum TypedValue {
    Boolean(bool),
    BigInt(i64),
    Double(f64),
    Varchar(String),
    /// Microseconds since 1970-01-01
    Timestamp(i64),
    /// Days since 1970-01-01
    Date(i32),
    /// Microseconds since midnight
    Time(i64),
}

impl TypedValue {
    /// Converts `value` for a column of type `kind`, or explains why it cannot.
    pub(super) fn convert(kind: ColumnType, value: &CellValue) -> Result<Self, String> {
        match kind {
            ColumnType::Boolean => to_boolean(value).map(TypedValue::Boolean),
            ColumnType::BigInt => value.to_bigint().map(TypedValue::BigInt),
            ColumnType::Double => value.to_double().map(TypedValue::Double),
            ColumnType::Varchar => Ok(TypedValue::Varchar(value.to_string())),
            ColumnType::Timestamp => value.to_datetime().map(TypedValue::Timestamp),
            ColumnType::Date => value.to_date().map(TypedValue::Date),
            ColumnType::Time => value.to_time().map(TypedValue::Time),
        }
    }

    pub(super) fn write(&self, vector: &mut FlatVector, row: usize) {
        match self {
            TypedValue::Boolean(value) => write_primitive(vector, row, *value),
            TypedValue::BigInt(value) => write_primitive(vector, row, *value),
            TypedValue::Double(value) => write_primitive(vector, row, *value),
            TypedValue::Varchar(value) => vector.insert(row, value.as_str()),
            TypedValue::Timestamp(value) => write_timestamp(vector, row, *value),
            TypedValue::Date(value) => write_date(vector, row, *value),
            TypedValue::Time(value) => write_time(vector, row, *value),
        }
    }
}

/// Boolean cells, and the texts `true`/`false`/`1`/`0` in any case.
fn to_boolean(value: &CellValue) -> Result<bool, String> {
    match value.kind {
        CellType::Boolean => Ok(value.to_boolean()),
        _ => match value.value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(format!("parse '{}' to boolean failed", value.value)),
        },
    }
}

/// Writes a primitive value directly to a vector using pointer arithmetic.
pub(super) fn write_primitive<T>(vector: &mut FlatVector, index: usize, value: T) {
    let pointer: *mut T = vector.as_mut_ptr();
    unsafe {
        std::ptr::write(pointer.add(index), value);
    }
}

fn write_timestamp(vector: &mut FlatVector, index: usize, value: i64) {
    let pointer: *mut duckdb_timestamp = vector.as_mut_ptr();
    unsafe {
        let pointer = pointer.add(index);
        (*pointer).micros = value;
    }
}

fn write_date(vector: &mut FlatVector, index: usize, value: i32) {
    let pointer: *mut duckdb_date = vector.as_mut_ptr();
    unsafe {
        let pointer = pointer.add(index);
        (*pointer).days = value;
    }
}

fn write_time(vector: &mut FlatVector, index: usize, value: i64) {
    let pointer: *mut duckdb_time = vector.as_mut_ptr();
    unsafe {
        let pointer = pointer.add(index);
        (*pointer).micros = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_by_column_type() {
        let number = CellValue::new(CellType::Number, "12");
        assert_eq!(TypedValue::convert(ColumnType::BigInt, &number), Ok(TypedValue::BigInt(12)));
        assert_eq!(TypedValue::convert(ColumnType::Double, &number), Ok(TypedValue::Double(12.0)));
        assert_eq!(TypedValue::convert(ColumnType::Varchar, &number), Ok(TypedValue::Varchar("12".to_owned())));

        let date = CellValue::new(CellType::NumberDate1900, "45554");
        assert_eq!(TypedValue::convert(ColumnType::Date, &date), Ok(TypedValue::Date(19985)));
        assert_eq!(TypedValue::convert(ColumnType::Varchar, &date), Ok(TypedValue::Varchar("2024-09-19".to_owned())));

        let datetime = CellValue::new(CellType::IsoDateTime, "2024-09-19T12:00:00");
        assert_eq!(
            TypedValue::convert(ColumnType::Timestamp, &datetime),
            Ok(TypedValue::Timestamp(19985 * 86_400_000_000 + 12 * 3_600_000_000)),
        );
        assert_eq!(TypedValue::convert(ColumnType::Time, &datetime), Ok(TypedValue::Time(12 * 3_600_000_000)));
    }

    #[test]
    fn convert_booleans() {
        assert_eq!(TypedValue::convert(ColumnType::Boolean, &CellValue::new(CellType::Boolean, "1")), Ok(TypedValue::Boolean(true)));
        assert_eq!(TypedValue::convert(ColumnType::Boolean, &CellValue::text("FALSE")), Ok(TypedValue::Boolean(false)));
        assert!(TypedValue::convert(ColumnType::Boolean, &CellValue::text("maybe")).is_err());
    }

    #[test]
    fn convert_failures_name_the_value() {
        let error = CellValue::new(CellType::Error, "#DIV/0!");
        assert_eq!(
            TypedValue::convert(ColumnType::BigInt, &error),
            Err("parse '#DIV/0!' to bigint failed".to_owned()),
        );
        assert!(TypedValue::convert(ColumnType::Date, &CellValue::text("soon")).is_err());
    }

    #[test]
    fn convert_rejects_serials_past_the_calendar() {
        let far = CellValue::new(CellType::NumberDateTime1900, "99999999999");
        assert_eq!(
            TypedValue::convert(ColumnType::Timestamp, &far),
            Err("date serial '99999999999' out of range".to_owned()),
        );
        assert!(TypedValue::convert(ColumnType::Date, &far).is_err());
        assert_eq!(TypedValue::convert(ColumnType::Varchar, &far), Ok(TypedValue::Varchar("99999999999".to_owned())));
    }
}
