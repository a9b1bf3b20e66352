//! # Read Table Function
//!
//! `read_table(file)` exposes one extracted table as a typed relation. The
//! header row names the columns, the first body rows decide their types and
//! every remaining row is converted cell by cell.
use crate::database::column::Column;
use crate::database::column::ColumnType;
use crate::error::ResultMessage;
use crate::error::SheetTablesError;
use crate::extension::writer::TypedValue;
use crate::extension::AnalyzeRowsParam;
use crate::extension::ColumnsParam;
use crate::extension::ExtensionError;
use crate::extension::FileParam;
use crate::extension::HeaderParam;
use crate::extension::NamedParam;
use crate::extension::Param;
use crate::extension::TableParam;
use crate::extension::TableSource;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::SpreadsheetError;
use crate::table::Table;
use duckdb::core::DataChunkHandle;
use duckdb::core::LogicalTypeHandle;
use duckdb::vtab::BindInfo;
use duckdb::vtab::InitInfo;
use duckdb::vtab::TableFunctionInfo;
use duckdb::vtab::VTab;
use glob::Pattern;
use std::error::Error;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

struct ReadTableParameters {
    source: TableSource,
    /// Index of the table within the sheet (default: 0)
    table: Option<usize>,
    /// Whether the first table row holds column names (default: true)
    header: Option<bool>,
    /// Column type overrides by column-name glob
    columns: Option<Vec<(Pattern, ColumnType)>>,
    /// Number of body rows used for type detection (default: 10)
    analyze_rows: Option<usize>,
}

impl TryFrom<&BindInfo> for ReadTableParameters {
    type Error = SheetTablesError;

    fn try_from(bind: &BindInfo) -> Result<Self, Self::Error> {
        Ok(ReadTableParameters {
            source: TableSource::try_from(bind)?,
            table: TableParam::read(bind)?,
            header: HeaderParam::read(bind)?,
            columns: ColumnsParam::read(bind)?,
            analyze_rows: AnalyzeRowsParam::read(bind)?,
        })
    }
}

/// Names and types the columns of `table`.
///
/// The header row, when present, is not part of the body. Types come from the
/// first `analyze_rows` body rows unless a pattern in `overrides` matches the
/// column name.
fn layout(
    table: &Table<CellValue>,
    header: bool,
    overrides: &[(Pattern, ColumnType)],
    analyze_rows: usize,
) -> Vec<Column> {
    let headers = match table.cells.first() {
        Some(record) if header => record.iter().map(|value| value.as_ref().map(CellValue::to_string)).collect(),
        _ => vec![None; table.col_count()],
    };
    let body = if header { 1 } else { 0 };
    Column::names(headers)
        .into_iter()
        .enumerate()
        .map(|(col, name)| {
            let kind = Column::forced_type(&name, overrides).unwrap_or_else(|| {
                ColumnType::detect(
                    table.cells
                        .iter()
                        .skip(body)
                        .take(analyze_rows)
                        .map(|record| record[col].as_ref().and_then(ColumnType::from))
                        .collect(),
                )
            });
            Column { name, kind }
        })
        .collect()
}

#[repr(C)]
pub(crate) struct ReadTableBindData {
    file_name: String,
    sheet_name: String,
    table: Table<CellValue>,
    columns: Vec<Column>,
    /// Index of the first body row in `table`
    body: usize,
    error_as_null: bool,
}

impl ReadTableBindData {
    fn row_count(&self) -> usize {
        self.table.row_count().saturating_sub(self.body)
    }

    /// Converts the body cell at (`row`, `col`); `None` for empty cells and,
    /// under `error_as_null`, for values the column type cannot hold.
    fn value(&self, row: usize, col: usize) -> Result<Option<TypedValue>, SheetTablesError> {
        let Some(value) = &self.table.cells[self.body + row][col] else {
            return Ok(None);
        };
        match TypedValue::convert(self.columns[col].kind, value) {
            Ok(value) => Ok(Some(value)),
            Err(_) if self.error_as_null => Ok(None),
            Err(message) => Err(SpreadsheetError::CellValueError(
                self.file_name.to_owned(),
                self.sheet_name.to_owned(),
                self.table.reference(self.body + row, col),
                message,
            ))?,
        }
    }
}

impl TryFrom<&ReadTableParameters> for ReadTableBindData {
    type Error = SheetTablesError;

    fn try_from(parameters: &ReadTableParameters) -> Result<Self, Self::Error> {
        let source = &parameters.source;
        let mut sheets = source.load(true).with_prefix(&source.file_name)?;
        let sheet = sheets.swap_remove(0);
        let index = parameters.table.unwrap_or(0);
        let count = sheet.tables.len();
        let Some(table) = sheet.tables.into_iter().nth(index) else {
            return Err(ExtensionError::TableIndexError(source.file_name.to_owned(), sheet.name, index, count).into());
        };

        let header = parameters.header.unwrap_or(true);
        let overrides = parameters.columns.to_owned().unwrap_or_default();
        let columns = layout(&table, header, &overrides, parameters.analyze_rows.unwrap_or(10));
        tracing::debug!(
            file_name = source.file_name.as_str(),
            sheet = sheet.name.as_str(),
            table = index,
            range = table.range().as_str(),
            columns = columns.len(),
            "read table"
        );
        Ok(ReadTableBindData {
            file_name: source.file_name.to_owned(),
            sheet_name: sheet.name,
            table,
            columns,
            body: if header { 1 } else { 0 },
            error_as_null: source.error_as_null(),
        })
    }
}

#[repr(C)]
pub(crate) struct ReadTableInitData {
    /// Next body row to emit
    row: AtomicUsize,
    /// Column projection indices
    projections: Vec<usize>,
}

pub(crate) struct ReadTableTableFunction;

impl VTab for ReadTableTableFunction {
    type InitData = ReadTableInitData;
    type BindData = ReadTableBindData;

    fn bind(bind: &BindInfo) -> Result<Self::BindData, Box<dyn Error>> {
        let parameters = ReadTableParameters::try_from(bind)?;
        let data = ReadTableBindData::try_from(&parameters)?;
        for column in &data.columns {
            bind.add_result_column(&column.name, LogicalTypeHandle::from(column.kind.to_logical_type_id()));
        }
        Ok(data)
    }

    fn init(init: &InitInfo) -> Result<Self::InitData, Box<dyn Error>> {
        let projections = init.get_column_indices()
            .into_iter()
            .map(|index| index as usize)
            .collect::<Vec<_>>();
        Ok(ReadTableInitData {
            row: AtomicUsize::new(0),
            projections,
        })
    }

    fn func(
        func: &TableFunctionInfo<Self>,
        output: &mut DataChunkHandle,
    ) -> Result<(), Box<dyn Error>> {
        let bind = func.get_bind_data();
        let init = func.get_init_data();
        let lower = init.row.fetch_add(2048, Ordering::Relaxed);
        let upper = bind.row_count().min(lower + 2048);
        if lower < upper {
            let mut vectors: Vec<_> = (0..init.projections.len()).map(|index| output.flat_vector(index)).collect();
            for row in lower..upper {
                for (index, col) in init.projections.iter().enumerate() {
                    let vector = &mut vectors[index];
                    match bind.value(row, *col)? {
                        Some(value) => value.write(vector, row - lower),
                        None => vector.set_null(row - lower),
                    }
                }
            }
            output.set_len(upper - lower);
        } else {
            output.set_len(0);
        }
        Ok(())
    }

    fn supports_pushdown() -> bool {
        true
    }

    fn parameters() -> Option<Vec<LogicalTypeHandle>> {
        Some(vec![FileParam::kind()])
    }

    fn named_parameters() -> Option<Vec<(String, LogicalTypeHandle)>> {
        let mut definitions = TableSource::definitions();
        definitions.extend([
            TableParam::definition(),
            HeaderParam::definition(),
            ColumnsParam::definition(),
            AnalyzeRowsParam::definition(),
        ]);
        Some(definitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::tests::load;
    use crate::extension::tests::source;
    use crate::spreadsheet::cell::CellType;

    fn report_table() -> Table<CellValue> {
        let mut sheets = load(&source(None), true).unwrap();
        sheets.swap_remove(0).tables.swap_remove(0)
    }

    fn bind_data(table: Table<CellValue>, columns: Vec<Column>, body: usize, error_as_null: bool) -> ReadTableBindData {
        ReadTableBindData {
            file_name: "report.xlsx".to_owned(),
            sheet_name: "Report".to_owned(),
            table,
            columns,
            body,
            error_as_null,
        }
    }

    fn table(records: Vec<Vec<Option<CellValue>>>) -> Table<CellValue> {
        Table {
            rows: (0..records.len()).collect(),
            cols: (0..records.first().map(Vec::len).unwrap_or(0)).collect(),
            cells: records,
        }
    }

    #[test]
    fn layout_names_and_types() {
        let table = table(vec![
            vec![Some(CellValue::text("id")), Some(CellValue::text("when")), None],
            vec![Some(CellValue::new(CellType::Number, "1")), Some(CellValue::new(CellType::NumberDate1900, "45554")), None],
            vec![Some(CellValue::new(CellType::Number, "2.5")), None, Some(CellValue::text("x"))],
        ]);
        let columns = layout(&table, true, &[], 10);
        assert_eq!(columns, vec![
            Column { name: "id".to_owned(), kind: ColumnType::Double },
            Column { name: "when".to_owned(), kind: ColumnType::Date },
            Column { name: "column3".to_owned(), kind: ColumnType::Varchar },
        ]);

        // Only the first body row is analyzed
        let columns = layout(&table, true, &[], 1);
        assert_eq!(columns[0].kind, ColumnType::BigInt);

        let overrides = vec![(Pattern::new("wh*").unwrap(), ColumnType::Varchar)];
        assert_eq!(layout(&table, true, &overrides, 10)[1].kind, ColumnType::Varchar);
    }

    #[test]
    fn layout_without_header() {
        let table = table(vec![
            vec![Some(CellValue::text("id"))],
            vec![Some(CellValue::new(CellType::Number, "1"))],
        ]);
        let columns = layout(&table, false, &[], 10);
        assert_eq!(columns, vec![Column { name: "column1".to_owned(), kind: ColumnType::Varchar }]);
    }

    #[test]
    fn report_table_layout() {
        let table = report_table();
        let columns = layout(&table, true, &[], 10);
        let names: Vec<&str> = columns.iter().map(|column| column.name.as_str()).collect();
        // Banner row repeats across the merge, so the names are de-duplicated
        assert_eq!(names, vec!["Monthly report", "Monthly report_2", "Monthly report_3"]);
        let kinds: Vec<ColumnType> = columns.iter().map(|column| column.kind).collect();
        assert_eq!(kinds, vec![ColumnType::Varchar, ColumnType::Varchar, ColumnType::Varchar]);
    }

    #[test]
    fn values_convert_or_fail_with_reference() {
        let table = table(vec![
            vec![Some(CellValue::text("amount"))],
            vec![Some(CellValue::new(CellType::Number, "12"))],
            vec![None],
            vec![Some(CellValue::new(CellType::Error, "#DIV/0!"))],
        ]);
        let columns = vec![Column { name: "amount".to_owned(), kind: ColumnType::BigInt }];

        let data = bind_data(table.clone(), columns.clone(), 1, false);
        assert_eq!(data.row_count(), 3);
        assert_eq!(data.value(0, 0).unwrap(), Some(TypedValue::BigInt(12)));
        assert_eq!(data.value(1, 0).unwrap(), None);
        assert_eq!(
            data.value(2, 0).unwrap_err().to_string(),
            "Invalid cell value in 'report.xlsx' sheet 'Report' at A4: 'parse '#DIV/0!' to bigint failed'",
        );

        let data = bind_data(table, columns, 1, true);
        assert_eq!(data.value(2, 0).unwrap(), None);
    }

    #[test]
    fn far_future_serial_follows_error_as_null() {
        let table = table(vec![
            vec![Some(CellValue::text("due"))],
            vec![Some(CellValue::new(CellType::NumberDateTime1900, "99999999999"))],
        ]);
        let columns = vec![Column { name: "due".to_owned(), kind: ColumnType::Timestamp }];

        let data = bind_data(table.clone(), columns.clone(), 1, false);
        assert_eq!(
            data.value(0, 0).unwrap_err().to_string(),
            "Invalid cell value in 'report.xlsx' sheet 'Report' at A2: 'date serial '99999999999' out of range'",
        );
        assert_eq!(bind_data(table, columns, 1, true).value(0, 0).unwrap(), None);
    }
}
