use crate::error::SheetTablesError;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::CellValue;
use duckdb::core::LogicalTypeId;
use glob::Pattern;
use std::collections::HashSet;
use thiserror::Error;

/// Errors related to column type parsing and validation.
#[derive(Error, Debug)]
pub(crate) enum ColumnError {
    #[error("Invalid column type '{0}'")]
    TypeError(String),
}

/// Supported column data types for extracted tables.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ColumnType {
    Boolean,
    BigInt,
    Double,
    Varchar,
    /// Date and time with microsecond precision
    Timestamp,
    Date,
    Time,
}

/// A typed output column of `read_table`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Column {
    /// Column name (from header row or generated)
    pub(crate) name: String,
    pub(crate) kind: ColumnType,
}

impl ColumnType {
    /// Parses a type name, accepting the usual SQL aliases.
    pub(crate) fn parse(name: &str) -> Result<Self, SheetTablesError> {
        match name.trim().to_ascii_uppercase().as_str() {
            "BOOL" | "BOOLEAN" => Ok(Self::Boolean),
            "INT" | "BIGINT" | "INTEGER" => Ok(Self::BigInt),
            "FLOAT" | "DOUBLE" | "DECIMAL" | "NUMERIC" => Ok(Self::Double),
            "TEXT" | "STRING" | "VARCHAR" => Ok(Self::Varchar),
            "DATETIME" | "TIMESTAMP" => Ok(Self::Timestamp),
            "DATE" => Ok(Self::Date),
            "TIME" => Ok(Self::Time),
            _ => Err(ColumnError::TypeError(name.to_string()))?,
        }
    }

    /// Infers the narrowest type able to hold `value`; empty and error cells give no hint.
    pub(crate) fn from(value: &CellValue) -> Option<Self> {
        let text = value.value.as_str();
        match value.kind {
            CellType::Boolean => Some(ColumnType::Boolean),
            CellType::Number if Self::is_integer(text) => Some(ColumnType::BigInt),
            CellType::Number => Some(ColumnType::Double),
            CellType::NumberDateTime1900 | CellType::NumberDateTime1904 => Some(ColumnType::Timestamp),
            CellType::NumberDate1900 | CellType::NumberDate1904 => Some(ColumnType::Date),
            CellType::NumberTime1900 | CellType::NumberTime1904 => Some(ColumnType::Time),
            CellType::IsoDateTime if text.contains("1899-12-30T") => Some(ColumnType::Time),
            CellType::IsoDateTime if !text.contains('T') || text.ends_with("T00:00:00") => Some(ColumnType::Date),
            CellType::IsoDateTime => Some(ColumnType::Timestamp),
            CellType::IsoDuration => Some(ColumnType::Time),
            CellType::Text => Some(ColumnType::Varchar),
            CellType::Empty | CellType::Error => None,
        }
    }

    /// Converts column type to DuckDB's logical type ID.
    pub(crate) const fn to_logical_type_id(&self) -> LogicalTypeId {
        match self {
            Self::Boolean => LogicalTypeId::Boolean,
            Self::BigInt => LogicalTypeId::Bigint,
            Self::Double => LogicalTypeId::Double,
            Self::Varchar => LogicalTypeId::Varchar,
            Self::Timestamp => LogicalTypeId::Timestamp,
            Self::Date => LogicalTypeId::Date,
            Self::Time => LogicalTypeId::Time,
        }
    }

    /// Checks if a numeric string has no fractional part.
    fn is_integer(value: &str) -> bool {
        match value.split_once('.') {
            Some((_, fraction)) => fraction.chars().all(|char| char == '0'),
            None => !value.contains(['e', 'E']),
        }
    }

    /// Picks the most specific type shared by every candidate, VARCHAR when they disagree or there are none.
    pub(crate) fn detect(types: Vec<Option<ColumnType>>) -> ColumnType {
        let types: Vec<ColumnType> = types.into_iter().flatten().collect();
        if types.is_empty() {
            ColumnType::Varchar
        } else if types.iter().all(ColumnType::is_boolean) {
            ColumnType::Boolean
        } else if types.iter().all(ColumnType::is_int) {
            ColumnType::BigInt
        } else if types.iter().all(ColumnType::is_float) {
            ColumnType::Double
        } else if types.iter().all(|kind| *kind == ColumnType::Date) {
            ColumnType::Date
        } else if types.iter().all(|kind| *kind == ColumnType::Time) {
            ColumnType::Time
        } else if types.iter().all(ColumnType::is_datetime) {
            ColumnType::Timestamp
        } else {
            ColumnType::Varchar
        }
    }

    fn is_boolean(&self) -> bool {
        matches!(self, ColumnType::Boolean)
    }

    fn is_int(&self) -> bool {
        matches!(self, ColumnType::BigInt)
    }

    fn is_float(&self) -> bool {
        matches!(self, ColumnType::BigInt | ColumnType::Double)
    }

    fn is_datetime(&self) -> bool {
        matches!(self, ColumnType::Timestamp | ColumnType::Date | ColumnType::Time)
    }
}

impl Column {
    /// Turns header cells into distinct column names.
    ///
    /// Blank headers become `column{n}` with the 1-based position, and a name
    /// already taken gets `_2`, `_3`... appended.
    pub(crate) fn names(headers: Vec<Option<String>>) -> Vec<String> {
        let mut taken = HashSet::<String>::new();
        headers
            .into_iter()
            .enumerate()
            .map(|(index, header)| {
                let base = header
                    .map(|header| header.trim().to_owned())
                    .filter(|header| !header.is_empty())
                    .unwrap_or_else(|| format!("column{}", index + 1));
                let mut name = base.to_owned();
                let mut suffix = 1usize;
                while taken.contains(&name.to_lowercase()) {
                    suffix += 1;
                    name = format!("{base}_{suffix}");
                }
                taken.insert(name.to_lowercase());
                name
            })
            .collect()
    }

    /// Type forced by the first matching `columns` pattern, if any.
    pub(crate) fn forced_type(name: &str, patterns: &[(Pattern, ColumnType)]) -> Option<ColumnType> {
        patterns
            .iter()
            .find(|(pattern, _)| pattern.matches(name))
            .map(|(_, kind)| *kind)
    }
}
