//! # Table Functions
//!
//! Parameter handling shared by the SQL surface, and the [`TableSource`] that
//! every table function uses to turn a workbook sheet into extracted tables.
pub(crate) mod analyze_tables;
pub(crate) mod extract_tables;
pub(crate) mod metrics;
pub(crate) mod read_table;
pub(crate) mod writer;

use crate::database::bridge::ValueBridge;
use crate::database::column::ColumnType;
use crate::database::range::Range;
use crate::error::SheetTablesError;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::open_spreadsheet;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::table::extract_tables;
use crate::table::Table;
use duckdb::core::LogicalTypeHandle;
use duckdb::core::LogicalTypeId;
use duckdb::vtab::BindInfo;
use duckdb::vtab::Value;
use glob::Pattern;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum ExtensionError {
    #[error("Invalid parameter '{0}': {1}")]
    InvalidParameter(String, String),

    #[error("No sheet matches '{1}' in '{0}'")]
    SheetWildcardError(String, String),

    #[error("Table #{2} not found in sheet '{1}' of '{0}', it holds {3} table(s)")]
    TableIndexError(String, String, usize, usize),
}

/// Positional parameter of a table function.
pub(crate) trait Param<T> {
    fn kind() -> LogicalTypeHandle;

    fn read(bind: &BindInfo, index: u64) -> Result<T, SheetTablesError>;
}

/// Optional named parameter of a table function.
pub(crate) trait NamedParam<T> {
    /// Name as written in SQL, e.g. `sheet := 'Q*'`
    fn name() -> &'static str;

    fn kind() -> LogicalTypeHandle;

    fn definition() -> (String, LogicalTypeHandle) {
        (Self::name().to_string(), Self::kind())
    }

    fn parse(value: &Value) -> Result<T, SheetTablesError>;

    /// Reads the parameter, `None` when the query does not set it.
    fn read(bind: &BindInfo) -> Result<Option<T>, SheetTablesError> {
        bind.get_named_parameter(Self::name())
            .map(|value| Self::parse(&value))
            .transpose()
    }
}

pub(crate) struct FileParam;
pub(crate) struct SheetParam;
pub(crate) struct RangeParam;
pub(crate) struct MergeCellsParam;
pub(crate) struct NullsParam;
pub(crate) struct ErrorAsNullParam;
pub(crate) struct TableParam;
pub(crate) struct HeaderParam;
pub(crate) struct ColumnsParam;
pub(crate) struct AnalyzeRowsParam;

impl Param<String> for FileParam {
    fn kind() -> LogicalTypeHandle {
        LogicalTypeHandle::from(LogicalTypeId::Varchar)
    }

    fn read(bind: &BindInfo, index: u64) -> Result<String, SheetTablesError> {
        let file_name = bind.get_parameter(index).to_varchar();
        if file_name.trim().is_empty() {
            Err(ExtensionError::InvalidParameter("file".to_owned(), "file name is empty".to_owned()))?;
        }
        Ok(file_name)
    }
}

impl NamedParam<Pattern> for SheetParam {
    fn name() -> &'static str {
        "sheet"
    }

    fn kind() -> LogicalTypeHandle {
        LogicalTypeHandle::from(LogicalTypeId::Varchar)
    }

    fn parse(value: &Value) -> Result<Pattern, SheetTablesError> {
        Ok(Pattern::new(&value.to_varchar())?)
    }
}

impl NamedParam<Range> for RangeParam {
    fn name() -> &'static str {
        "range"
    }

    fn kind() -> LogicalTypeHandle {
        LogicalTypeHandle::from(LogicalTypeId::Varchar)
    }

    fn parse(value: &Value) -> Result<Range, SheetTablesError> {
        Range::try_from(value.to_varchar().as_str())
    }
}

impl NamedParam<bool> for MergeCellsParam {
    fn name() -> &'static str {
        "merge_cells"
    }

    fn kind() -> LogicalTypeHandle {
        LogicalTypeHandle::from(LogicalTypeId::Boolean)
    }

    fn parse(value: &Value) -> Result<bool, SheetTablesError> {
        Ok(value.to_bool())
    }
}

impl NamedParam<HashSet<String>> for NullsParam {
    fn name() -> &'static str {
        "nulls"
    }

    fn kind() -> LogicalTypeHandle {
        LogicalTypeHandle::list(&LogicalTypeHandle::from(LogicalTypeId::Varchar))
    }

    fn parse(value: &Value) -> Result<HashSet<String>, SheetTablesError> {
        Ok(value.to_list().iter().map(ValueBridge::to_varchar).collect())
    }
}

impl NamedParam<bool> for ErrorAsNullParam {
    fn name() -> &'static str {
        "error_as_null"
    }

    fn kind() -> LogicalTypeHandle {
        LogicalTypeHandle::from(LogicalTypeId::Boolean)
    }

    fn parse(value: &Value) -> Result<bool, SheetTablesError> {
        Ok(value.to_bool())
    }
}

impl NamedParam<usize> for TableParam {
    fn name() -> &'static str {
        "table"
    }

    fn kind() -> LogicalTypeHandle {
        LogicalTypeHandle::from(LogicalTypeId::UInteger)
    }

    fn parse(value: &Value) -> Result<usize, SheetTablesError> {
        Ok(value.to_usize())
    }
}

impl NamedParam<bool> for HeaderParam {
    fn name() -> &'static str {
        "header"
    }

    fn kind() -> LogicalTypeHandle {
        LogicalTypeHandle::from(LogicalTypeId::Boolean)
    }

    fn parse(value: &Value) -> Result<bool, SheetTablesError> {
        Ok(value.to_bool())
    }
}

impl NamedParam<Vec<(Pattern, ColumnType)>> for ColumnsParam {
    fn name() -> &'static str {
        "columns"
    }

    fn kind() -> LogicalTypeHandle {
        LogicalTypeHandle::map(
            &LogicalTypeHandle::from(LogicalTypeId::Varchar),
            &LogicalTypeHandle::from(LogicalTypeId::Varchar),
        )
    }

    fn parse(value: &Value) -> Result<Vec<(Pattern, ColumnType)>, SheetTablesError> {
        let entries = value
            .to_map_entries()
            .iter()
            .map(|(key, value)| (key.to_varchar(), value.to_varchar()))
            .collect();
        parse_columns(entries)
    }
}

impl NamedParam<usize> for AnalyzeRowsParam {
    fn name() -> &'static str {
        "analyze_rows"
    }

    fn kind() -> LogicalTypeHandle {
        LogicalTypeHandle::from(LogicalTypeId::UInteger)
    }

    fn parse(value: &Value) -> Result<usize, SheetTablesError> {
        Ok(value.to_usize())
    }
}

/// Parses `columns` entries of column-name glob to type name.
fn parse_columns(entries: Vec<(String, String)>) -> Result<Vec<(Pattern, ColumnType)>, SheetTablesError> {
    entries
        .into_iter()
        .map(|(pattern, kind)| Ok((Pattern::new(&pattern)?, ColumnType::parse(&kind)?)))
        .collect()
}

/// Tables extracted from one sheet, in discovery order.
pub(crate) struct SheetTables {
    pub(crate) name: String,
    pub(crate) tables: Vec<Table<CellValue>>,
}

impl SheetTables {
    /// Splits a sheet into its disjoint tables.
    pub(crate) fn extract(sheet: &Sheet) -> SheetTables {
        let tables = extract_tables(sheet.to_grid(), &sheet.merges);
        tracing::debug!(
            file_name = sheet.file_name.as_str(),
            sheet = sheet.name.as_str(),
            tables = tables.len(),
            "extracted tables"
        );
        SheetTables {
            name: sheet.name.to_owned(),
            tables,
        }
    }
}

/// The workbook, sheet selection and cell filtering shared by every table function.
pub(crate) struct TableSource {
    pub(crate) file_name: String,
    sheet: Option<Pattern>,
    range: Option<Range>,
    merge_cells: Option<bool>,
    nulls: Option<HashSet<String>>,
    error_as_null: Option<bool>,
}

impl TryFrom<&BindInfo> for TableSource {
    type Error = SheetTablesError;

    fn try_from(bind: &BindInfo) -> Result<Self, Self::Error> {
        Ok(TableSource {
            file_name: FileParam::read(bind, 0)?,
            sheet: SheetParam::read(bind)?,
            range: RangeParam::read(bind)?,
            merge_cells: MergeCellsParam::read(bind)?,
            nulls: NullsParam::read(bind)?,
            error_as_null: ErrorAsNullParam::read(bind)?,
        })
    }
}

impl TableSource {
    /// Named parameters understood by every table function.
    pub(crate) fn definitions() -> Vec<(String, LogicalTypeHandle)> {
        vec![
            SheetParam::definition(),
            RangeParam::definition(),
            MergeCellsParam::definition(),
            NullsParam::definition(),
            ErrorAsNullParam::definition(),
        ]
    }

    pub(crate) fn error_as_null(&self) -> bool {
        self.error_as_null.unwrap_or(false)
    }

    /// Reading criteria; without a `sheet` pattern, or when `single` is set, only one sheet is read.
    fn criteria(&self, single: bool) -> Criteria {
        Criteria {
            sheet_name_patterns: self.sheet.as_ref().map(|pattern| vec![pattern.to_owned()]),
            sheet_limit: if single || self.sheet.is_none() { Some(1) } else { None },
            range: self.range,
            nulls: self.nulls.to_owned().unwrap_or_else(|| HashSet::from([String::new()])),
            error_as_null: self.error_as_null(),
            merge_cells: self.merge_cells.unwrap_or(true),
        }
    }

    /// Opens the workbook and extracts the tables of every selected sheet.
    pub(crate) fn load(&self, single: bool) -> Result<Vec<SheetTables>, SheetTablesError> {
        let mut spreadsheet = open_spreadsheet(&self.file_name)?;
        self.load_from(spreadsheet.as_mut(), single)
    }

    pub(crate) fn load_from(&self, spreadsheet: &mut dyn Spreadsheet, single: bool) -> Result<Vec<SheetTables>, SheetTablesError> {
        let sheets = spreadsheet.read_sheets(&self.criteria(single))?;
        if sheets.is_empty() {
            Err(ExtensionError::SheetWildcardError(
                spreadsheet.name(),
                self.sheet.as_ref().map(|pattern| pattern.to_string()).unwrap_or_default(),
            ))?;
        }
        Ok(sheets.iter().map(SheetTables::extract).collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::helpers::reader::UnifiedReader;
    use crate::spreadsheet::xlsx::tests::workbook_bytes;
    use crate::spreadsheet::xlsx::XlsxSpreadsheet;
    use std::io::Cursor;

    pub(crate) fn source(sheet: Option<&str>) -> TableSource {
        TableSource {
            file_name: "report.xlsx".to_owned(),
            sheet: sheet.map(|pattern| Pattern::new(pattern).unwrap()),
            range: None,
            merge_cells: None,
            nulls: None,
            error_as_null: None,
        }
    }

    pub(crate) fn load(source: &TableSource, single: bool) -> Result<Vec<SheetTables>, SheetTablesError> {
        let reader = UnifiedReader::Remote(Cursor::new(workbook_bytes()));
        let mut spreadsheet = XlsxSpreadsheet::from_reader("report.xlsx", reader)?;
        source.load_from(&mut spreadsheet, single)
    }

    #[test]
    fn defaults_read_first_sheet() {
        let criteria = source(None).criteria(false);
        assert_eq!(criteria.sheet_limit, Some(1));
        assert!(criteria.merge_cells);
        assert!(!criteria.error_as_null);
        assert_eq!(criteria.nulls, HashSet::from([String::new()]));

        let criteria = source(Some("*")).criteria(false);
        assert_eq!(criteria.sheet_limit, None);
        assert_eq!(source(Some("*")).criteria(true).sheet_limit, Some(1));
    }

    #[test]
    fn load_extracts_each_sheet() {
        let sheets = load(&source(Some("*")), false).unwrap();
        let names: Vec<&str> = sheets.iter().map(|sheet| sheet.name.as_str()).collect();
        assert_eq!(names, vec!["Report", "Summary"]);
        // Banner merged over A1:C2 joins the data block below it, D5 stands alone
        let ranges: Vec<String> = sheets[0].tables.iter().map(Table::range).collect();
        assert_eq!(ranges, vec!["A1:C5", "D5:D5"]);
        assert_eq!(sheets[0].tables[0].rows, vec![0, 2, 3, 4]);
        assert_eq!(sheets[1].tables.len(), 1);
        assert_eq!(sheets[1].tables[0].range(), "A1:B2");
    }

    #[test]
    fn unmatched_sheet_pattern_fails() {
        let error = load(&source(Some("Missing*")), false).err().map(|error| error.to_string());
        assert_eq!(error, Some("No sheet matches 'Missing*' in 'report.xlsx'".to_owned()));
    }

    #[test]
    fn parse_column_overrides() {
        let columns = parse_columns(vec![("*date".to_owned(), "date".to_owned())]).unwrap();
        assert_eq!(columns.len(), 1);
        assert!(columns[0].0.matches("start_date"));
        assert_eq!(columns[0].1, ColumnType::Date);
        assert!(parse_columns(vec![("x".to_owned(), "blob".to_owned())]).is_err());
        assert!(parse_columns(vec![("[".to_owned(), "date".to_owned())]).is_err());
    }
}
