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

/// Shape and rendering of one extracted table
#[derive(Debug)]
struct TableSummary {
    sheet_name: String,
    table_index: u64,
    range: String,
    row_count: u64,
    column_count: u64,
    markdown: String,
}

fn summarize(sheets: &[SheetTables]) -> Vec<TableSummary> {
    sheets
        .iter()
        .flat_map(|sheet| {
            sheet.tables.iter().enumerate().map(|(index, table)| TableSummary {
                sheet_name: sheet.name.to_owned(),
                table_index: index as u64,
                range: table.range(),
                row_count: table.row_count() as u64,
                column_count: table.col_count() as u64,
                markdown: table.to_markdown(),
            })
        })
        .collect()
}

#[repr(C)]
pub(crate) struct AnalyzeTablesBindData {
    tables: Vec<TableSummary>,
}

impl TryFrom<&TableSource> for AnalyzeTablesBindData {
    type Error = SheetTablesError;

    fn try_from(source: &TableSource) -> Result<Self, Self::Error> {
        let sheets = source.load(false).with_prefix(&source.file_name)?;
        Ok(AnalyzeTablesBindData {
            tables: summarize(&sheets),
        })
    }
}

#[repr(C)]
pub(crate) struct AnalyzeTablesInitData {
    index: AtomicUsize,
}

/// `analyze_tables(file)`: one row per extracted table with its range, size and markdown.
pub(crate) struct AnalyzeTablesTableFunction;

impl VTab for AnalyzeTablesTableFunction {
    type InitData = AnalyzeTablesInitData;
    type BindData = AnalyzeTablesBindData;

    fn bind(bind: &BindInfo) -> Result<Self::BindData, Box<dyn Error>> {
        let source = TableSource::try_from(bind)?;
        let data = AnalyzeTablesBindData::try_from(&source)?;
        bind.add_result_column("sheet_name", LogicalTypeHandle::from(LogicalTypeId::Varchar));
        bind.add_result_column("table_index", LogicalTypeHandle::from(LogicalTypeId::UBigint));
        bind.add_result_column("range", LogicalTypeHandle::from(LogicalTypeId::Varchar));
        bind.add_result_column("row_count", LogicalTypeHandle::from(LogicalTypeId::UBigint));
        bind.add_result_column("column_count", LogicalTypeHandle::from(LogicalTypeId::UBigint));
        bind.add_result_column("markdown", LogicalTypeHandle::from(LogicalTypeId::Varchar));
        Ok(data)
    }

    fn init(_: &InitInfo) -> Result<Self::InitData, Box<dyn Error>> {
        Ok(AnalyzeTablesInitData {
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
        let upper = bind.tables.len().min(lower + 2048);
        if lower < upper {
            let sheets = output.flat_vector(0);
            let mut indexes = output.flat_vector(1);
            let ranges = output.flat_vector(2);
            let mut rows = output.flat_vector(3);
            let mut columns = output.flat_vector(4);
            let markdowns = output.flat_vector(5);
            for index in lower..upper {
                let table = &bind.tables[index];
                sheets.insert(index - lower, table.sheet_name.as_str());
                write_primitive(&mut indexes, index - lower, table.table_index);
                ranges.insert(index - lower, table.range.as_str());
                write_primitive(&mut rows, index - lower, table.row_count);
                write_primitive(&mut columns, index - lower, table.column_count);
                markdowns.insert(index - lower, table.markdown.as_str());
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
