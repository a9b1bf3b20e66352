//! # Worksheet Readers
//!
//! Readers for Office Open XML (`.xlsx`, `.xlsm`, `.xlam`) and OpenDocument
//! (`.ods`) workbooks. A reader streams the cells of the selected sheets in
//! row-major order and records every merged region, producing [`Sheet`]s that
//! can be turned into a dense grid for table extraction.
pub(crate) mod cell;
pub(crate) mod criteria;
pub(crate) mod excel;
pub(crate) mod ods;
pub(crate) mod reference;
pub(crate) mod sheet;
pub(crate) mod xlsx;

use crate::error::SheetTablesError;
use crate::helpers::reader::UnifiedReader;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::ods::OdsSpreadsheet;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum SpreadsheetError {
    #[error("Missing part '{0}' in workbook")]
    FileError(String),

    #[error("Unsupported file format '{0}', expected .xlsx, .xlsm, .xlam or .ods")]
    FileFormatError(String),

    #[error("Spreadsheet '{0}' is password protected")]
    SpreadsheetPasswordProtectedError(String),

    #[error("Spreadsheet '{0}' has no sheets")]
    SpreadsheetEmptyError(String),

    #[error("Shared string #{1} not found in '{0}'")]
    SharedStringError(String, usize),

    #[error("Invalid cell value in '{0}' sheet '{1}' at {2}: '{3}'")]
    CellValueError(String, String, String, String),
}

/// A workbook opened for reading.
pub(crate) trait Spreadsheet {
    /// Returns the file name or URL the workbook was opened from.
    fn name(&self) -> String;

    /// Returns the sheet names in workbook order.
    fn sheet_names(&self) -> Vec<String>;

    /// Reads every sheet accepted by `criteria`, in workbook order.
    fn read_sheets(&mut self, criteria: &Criteria) -> Result<Vec<Sheet>, SheetTablesError>;
}

/// Opens a workbook, choosing the reader from the file extension.
pub(crate) fn open_spreadsheet(file_name: &str) -> Result<Box<dyn Spreadsheet>, SheetTablesError> {
    let extension = Path::new(file_name.split(['?', '#']).next().unwrap_or(file_name))
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.to_ascii_lowercase())
        .unwrap_or_default();
    tracing::debug!(file_name, extension, "opening workbook");
    match extension.as_str() {
        "xlsx" | "xlsm" | "xlam" => {
            let reader = UnifiedReader::new(file_name)?;
            Ok(Box::new(XlsxSpreadsheet::from_reader(file_name, reader)?))
        }
        "ods" => {
            let reader = UnifiedReader::new(file_name)?;
            Ok(Box::new(OdsSpreadsheet::from_reader(file_name, reader)?))
        }
        _ => Err(SpreadsheetError::FileFormatError(file_name.to_owned()))?,
    }
}
