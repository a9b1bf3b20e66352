use crate::error::ResultMessage;
use crate::error::SheetTablesError;
use crate::extension::writer::write_primitive;
use crate::extension::FileParam;
use crate::extension::Param;
use crate::extension::SheetTables;
use crate::extension::TableSource;
use duckdb::core::DataChunkHandle;
use duckdb::core::Inserter;
use duckdb::core::LogicalTypeHandle;
use duckdb::core::LogicalTypeId;
use duckdb::vtab::BindInfo;
use duckdb::vtab::InitInfo;
use duckdb::vtab::TableFunctionInfo;
use duckdb::vtab::VTab;
use std::error::Error;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

/// One non-empty cell of an extracted table.
#[derive(Debug, PartialEq)]
struct TableCell {
    sheet_name: String,
    table_index: u64,
    /// Position inside the table, not the sheet
    row_index: u64,
    column_index: u64,
    /// Source reference in the sheet, e.g. `C4`
    reference: String,
    value: String,
}

/// Flattens every table into one record per non-empty cell, row by row.
fn flatten(sheets: &[SheetTables]) -> Vec<TableCell> {
    let mut cells = Vec::<TableCell>::new();
    for sheet in sheets {
        for (table_index, table) in sheet.tables.iter().enumerate() {
            for (row, record) in table.cells.iter().enumerate() {
                for (col, value) in record.iter().enumerate() {
                    if let Some(value) = value {
                        cells.push(TableCell {
                            sheet_name: sheet.name.to_owned(),
                            table_index: table_index as u64,
                            row_index: row as u64,
                            column_index: col as u64,
                            reference: table.reference(row, col),
                            value: value.to_string(),
                        });
                    }
                }
            }
        }
    }
    cells
}

#[repr(C)]
pub(crate) struct ExtractTablesBindData {
    cells: Vec<TableCell>,
}

impl TryFrom<&TableSource> for ExtractTablesBindData {
    type Error = SheetTablesError;

    fn try_from(source: &TableSource) -> Result<Self, Self::Error> {
        let sheets = source.load(false).with_prefix(&source.file_name)?;
        Ok(ExtractTablesBindData {
            cells: flatten(&sheets),
        })
    }
}

#[repr(C)]
pub(crate) struct ExtractTablesInitData {
    index: AtomicUsize,
}

/// `extract_tables(file)`: every table of the selected sheets in long form.
pub(crate) struct ExtractTablesTableFunction;

impl VTab for ExtractTablesTableFunction {
    type InitData = ExtractTablesInitData;
    type BindData = ExtractTablesBindData;

    fn bind(bind: &BindInfo) -> Result<Self::BindData, Box<dyn Error>> {
        let source = TableSource::try_from(bind)?;
        let data = ExtractTablesBindData::try_from(&source)?;
        bind.add_result_column("sheet_name", LogicalTypeHandle::from(LogicalTypeId::Varchar));
        bind.add_result_column("table_index", LogicalTypeHandle::from(LogicalTypeId::UBigint));
        bind.add_result_column("row_index", LogicalTypeHandle::from(LogicalTypeId::UBigint));
        bind.add_result_column("column_index", LogicalTypeHandle::from(LogicalTypeId::UBigint));
        bind.add_result_column("reference", LogicalTypeHandle::from(LogicalTypeId::Varchar));
        bind.add_result_column("value", LogicalTypeHandle::from(LogicalTypeId::Varchar));
        Ok(data)
    }

    fn init(_: &InitInfo) -> Result<Self::InitData, Box<dyn Error>> {
        Ok(ExtractTablesInitData {
            index: AtomicUsize::new(0),
        })
    }

    fn func(
        func: &TableFunctionInfo<Self>,
        output: &mut DataChunkHandle,
    ) -> Result<(), Box<dyn Error>> {
        let init = func.get_init_data();
        let bind = func.get_bind_data();
        let lower = init.index.fetch_add(2048, Ordering::Relaxed);
        let upper = bind.cells.len().min(lower + 2048);
        if lower < upper {
            let sheets = output.flat_vector(0);
            let mut tables = output.flat_vector(1);
            let mut rows = output.flat_vector(2);
            let mut columns = output.flat_vector(3);
            let references = output.flat_vector(4);
            let values = output.flat_vector(5);
            for index in lower..upper {
                let cell = &bind.cells[index];
                sheets.insert(index - lower, cell.sheet_name.as_str());
                write_primitive(&mut tables, index - lower, cell.table_index);
                write_primitive(&mut rows, index - lower, cell.row_index);
                write_primitive(&mut columns, index - lower, cell.column_index);
                references.insert(index - lower, cell.reference.as_str());
                values.insert(index - lower, cell.value.as_str());
            }
            output.set_len(upper - lower);
        } else {
            output.set_len(0);
        }
        Ok(())
    }

    fn parameters() -> Option<Vec<LogicalTypeHandle>> {
        Some(vec![FileParam::kind()])
    }

    fn named_parameters() -> Option<Vec<(String, LogicalTypeHandle)>> {
        Some(TableSource::definitions())
    }
}
