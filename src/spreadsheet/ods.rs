use crate::error::SheetTablesError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::sheet::MAX_COLS;
use crate::spreadsheet::sheet::MAX_ROWS;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use crate::table::MergeRegion;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::io::Read;
use thiserror::Error;
use zip::ZipArchive;

/// ODS file MIME type identifier
const MIME_TYPE: &[u8] = b"application/vnd.oasis.opendocument.spreadsheet";
const SPREADSHEET: QName = QName(b"office:spreadsheet");
const TABLE: QName = QName(b"table:table");
const TABLE_ROW: QName = QName(b"table:table-row");
const TABLE_CELL: QName = QName(b"table:table-cell");
/// Cell hidden under a spanned (merged) cell
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
/// Comments attached to a cell
const ANNOTATION: QName = QName(b"office:annotation");
const PARAGRAPH: QName = QName(b"text:p");
/// Run of spaces, `text:c` long
const STRING: QName = QName(b"text:s");
const FILE_ENTRY: QName = QName(b"manifest:file-entry");
const ENCRYPTION_DATA: QName = QName(b"manifest:encryption-data");

#[derive(Error, Debug)]
pub(crate) enum OdsError {
    #[error("Invalid ODS MIME type")]
    MimeTypeError,
}

/// An OpenDocument spreadsheet (`.ods`).
pub(crate) struct OdsSpreadsheet {
    pub(crate) name: String,
    zip: ZipArchive<UnifiedReader>,
    /// Sheet names in document order
    sheets: Vec<String>,
}

impl OdsSpreadsheet {
    pub(crate) fn from_reader(file_name: &str, reader: UnifiedReader) -> Result<Self, SheetTablesError> {
        let mut zip = ZipArchive::new(reader)?;
        check_mime(&mut zip)?;
        if is_password_protected(&mut zip)? {
            Err(SpreadsheetError::SpreadsheetPasswordProtectedError(file_name.to_owned()))?;
        }
        let sheets = load_sheet_names(&mut zip)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()))?;
        }
        tracing::debug!(file_name, sheets = sheets.len(), "loaded ods structure");
        Ok(OdsSpreadsheet {
            name: file_name.to_owned(),
            zip,
            sheets,
        })
    }
}

impl Spreadsheet for OdsSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.to_owned()
    }

    /// Reads the accepted tables of `content.xml`.
    ///
    /// Repeated rows and columns are expanded, a cell spanning several rows or
    /// columns becomes a merged region, and covered cells contribute no value.
    fn read_sheets(&mut self, criteria: &Criteria) -> Result<Vec<Sheet>, SheetTablesError> {
        let mut sheets = Vec::<Sheet>::new();
        let mut sheet_name = String::new();
        let mut reader = self.zip
            .xml_reader("content.xml")?
            .ok_or_else(|| SpreadsheetError::FileError("content.xml".to_owned()))?;
        'sheets: loop {
            if criteria.is_full(sheets.len()) {
                break;
            }
            let mut found = false;
            match_xml_events!(reader => {
                Event::End(event) if event.name() == SPREADSHEET => break 'sheets,
                Event::Start(event) if event.name() == TABLE => {
                    sheet_name.clear();
                    if let Some(table_name) = event.get_attribute_value("table:name")? {
                        sheet_name.push_str(&table_name);
                    }
                    if criteria.accept(&sheet_name) {
                        found = true;
                        break;
                    }
                }
            });
            if !found {
                break;
            }

            let mut sheet = Sheet::new(&self.name, &sheet_name, criteria.range);
            let mut row = 0usize;
            let mut col = 0usize;
            let mut row_count = 0usize;
            let mut col_count = 0usize;
            let mut kind = CellType::default();
            let mut value = String::new();
            let mut element_context = false; // reading a string cell's paragraphs
            let mut comment_context = false; // inside an annotation
            let mut depth = 0usize; // nested tables
            match_xml_events!(reader => {
                Event::Start(event) if event.name() == TABLE => depth += 1,
                Event::End(event) if event.name() == TABLE => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                Event::Start(event) if event.name() == TABLE_ROW => {
                    row_count = event.parse_attribute_value("table:number-rows-repeated")?.unwrap_or(1);
                    col = 0;
                }
                Event::End(event) if event.name() == TABLE_ROW => row = row.saturating_add(row_count),
                Event::Start(event) if event.name() == TABLE_COVERED_CELL => {
                    col_count = event.parse_attribute_value::<usize>("table:number-columns-repeated")?.unwrap_or(1);
                    kind = CellType::Empty;
                    element_context = false;
                }
                Event::Start(event) if event.name() == TABLE_CELL => {
                    value.clear();
                    col_count = event.parse_attribute_value::<usize>("table:number-columns-repeated")?.unwrap_or(1);

                    if criteria.merge_cells {
                        let rows_spanned = event.parse_attribute_value::<usize>("table:number-rows-spanned")?.unwrap_or(1);
                        let cols_spanned = event.parse_attribute_value::<usize>("table:number-columns-spanned")?.unwrap_or(1);
                        if rows_spanned > 1 || cols_spanned > 1 {
                            sheet.push_merge(MergeRegion::new(
                                row,
                                col,
                                row.saturating_add(rows_spanned - 1),
                                col.saturating_add(cols_spanned - 1),
                            ));
                        }
                    }

                    let value_type = event.get_attribute_value("office:value-type")?;
                    let is_error = event.get_attribute_value("calcext:value-type")?
                        .map(|cow| cow == "error")
                        .unwrap_or(false);
                    kind = match value_type.as_deref() {
                        None => CellType::Empty,
                        Some("boolean") => CellType::Boolean,
                        Some("date") => CellType::IsoDateTime,
                        Some("time") => CellType::IsoDuration,
                        Some("string") if is_error && criteria.error_as_null => CellType::Empty,
                        Some("string") if is_error => CellType::Error,
                        Some("string") => CellType::Text,
                        Some(_) => CellType::Number,
                    };

                    match value_type.as_deref() {
                        Some("string") => element_context = kind != CellType::Empty,
                        Some("boolean") => {
                            let is_true = event.get_attribute_value("office:boolean-value")?
                                .map(|cow| cow != "false" && cow != "0")
                                .unwrap_or(false);
                            value.push_str(if is_true { "1" } else { "0" });
                        }
                        Some("date") => if let Some(data) = event.get_attribute_value("office:date-value")? {
                            value.push_str(&data);
                        }
                        Some("time") => if let Some(data) = event.get_attribute_value("office:time-value")? {
                            value.push_str(&data);
                        }
                        Some(_) => if let Some(data) = event.get_attribute_value("office:value")? {
                            value.push_str(&data);
                        }
                        None => (),
                    }
                }
                Event::End(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                    if kind != CellType::Empty && !value.is_empty() && !criteria.is_null(&value) {
                        for row_number in (row..row.saturating_add(row_count)).take(MAX_ROWS) {
                            if row_number >= MAX_ROWS || sheet.after_row_upper_bound(row_number) {
                                break;
                            }
                            for col_number in (col..col.saturating_add(col_count)).take_while(|col| *col < MAX_COLS) {
                                sheet.push(Cell {
                                    row: row_number,
                                    col: col_number,
                                    value: CellValue::new(kind, value.to_owned()),
                                });
                            }
                        }
                    }
                    col = col.saturating_add(col_count);
                    kind = CellType::Empty;
                    element_context = false;
                    comment_context = false;
                }
                Event::Start(event) if element_context && event.name() == ANNOTATION => comment_context = true,
                Event::End(event) if element_context && comment_context && event.name() == ANNOTATION => comment_context = false,
                Event::Start(event) if element_context && !comment_context && event.name() == PARAGRAPH => {
                    if !value.is_empty() {
                        value.push('\n');
                    }
                }
                Event::Start(event) if element_context && !comment_context && event.name() == STRING => {
                    let count = event.parse_attribute_value("text:c")?.unwrap_or(1);
                    for _ in 0..count {
                        value.push(' ');
                    }
                }
                Event::Text(event) if element_context && !comment_context => value.push_bytes_text(&event)?,
                Event::GeneralRef(event) if element_context && !comment_context => value.push_bytes_ref(&event)?,
            });
            tracing::debug!(
                file_name = self.name.as_str(),
                sheet = sheet_name.as_str(),
                cells = sheet.cells.len(),
                merges = sheet.merges.len(),
                "read ods sheet"
            );
            sheets.push(sheet);
        }

        Ok(sheets)
    }
}

/// Rejects archives whose `mimetype` member names another document type.
fn check_mime(zip: &mut ZipArchive<UnifiedReader>) -> Result<(), SheetTablesError> {
    if let Some(file) = &mut zip.file("mimetype")? {
        let mut buffer = Vec::<u8>::new();
        file.read_to_end(&mut buffer)?;
        if buffer.trim_ascii() != MIME_TYPE {
            Err(OdsError::MimeTypeError)?;
        }
    }
    Ok(())
}

/// Checks the manifest for encryption data on any file entry.
fn is_password_protected(zip: &mut ZipArchive<UnifiedReader>) -> Result<bool, SheetTablesError> {
    let mut reader = match zip.xml_reader("META-INF/manifest.xml")? {
        Some(reader) => reader,
        None => return Ok(false),
    };
    let mut in_file_entry = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == FILE_ENTRY => in_file_entry = true,
        Event::End(event) if event.name() == FILE_ENTRY => in_file_entry = false,
        Event::Start(event) if in_file_entry && event.name() == ENCRYPTION_DATA => return Ok(true),
    });
    Ok(false)
}

/// Lists the top-level table names of `content.xml`.
fn load_sheet_names(zip: &mut ZipArchive<UnifiedReader>) -> Result<Vec<String>, SheetTablesError> {
    let mut reader = zip
        .xml_reader("content.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("content.xml".to_owned()))?;
    let mut sheets = Vec::<String>::new();
    let mut depth = 0usize;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TABLE => {
            if depth == 0 {
                let name = event.get_attribute_value("table:name")?.unwrap_or_default();
                sheets.push(name.to_string());
            }
            depth += 1;
        }
        Event::End(event) if event.name() == TABLE => depth = depth.saturating_sub(1),
        Event::End(event) if event.name() == SPREADSHEET => break,
    });
    Ok(sheets)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::helpers::zip::tests::build_zip;
    use glob::Pattern;
    use std::collections::HashSet;
    use std::io::Cursor;

    const MANIFEST: &str = r#"<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0">
  <manifest:file-entry manifest:full-path="/" manifest:media-type="application/vnd.oasis.opendocument.spreadsheet"/>
  <manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml"/>
</manifest:manifest>"#;

    const ENCRYPTED_MANIFEST: &str = r#"<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0">
  <manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml">
    <manifest:encryption-data manifest:checksum-type="SHA1/1K"/>
  </manifest:file-entry>
</manifest:manifest>"#;

    const CONTENT: &str = r#"<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" xmlns:calcext="urn:org:documentfoundation:names:experimental:calc:xmlns:calcext:1.0">
<office:body><office:spreadsheet>
<table:table table:name="Report">
  <table:table-row>
    <table:table-cell table:number-columns-spanned="3" table:number-rows-spanned="2" office:value-type="string"><text:p>Monthly report</text:p></table:table-cell>
    <table:covered-table-cell table:number-columns-repeated="2"/>
  </table:table-row>
  <table:table-row>
    <table:covered-table-cell table:number-columns-repeated="3"/>
  </table:table-row>
  <table:table-row table:number-rows-repeated="2"><table:table-cell table:number-columns-repeated="4"/></table:table-row>
  <table:table-row>
    <table:table-cell office:value-type="string"><text:p>Name</text:p><office:annotation><text:p>note</text:p></office:annotation></table:table-cell>
    <table:table-cell office:value-type="float" office:value="12"><text:p>12</text:p></table:table-cell>
    <table:table-cell office:value-type="date" office:date-value="2024-09-19"><text:p>09/19/24</text:p></table:table-cell>
    <table:table-cell office:value-type="boolean" office:boolean-value="true"><text:p>TRUE</text:p></table:table-cell>
  </table:table-row>
  <table:table-row>
    <table:table-cell office:value-type="string" calcext:value-type="error"><text:p>#DIV/0!</text:p></table:table-cell>
    <table:table-cell office:value-type="string"><text:p>two<text:s text:c="2"/>spaces</text:p><text:p>&amp; lines</text:p></table:table-cell>
    <table:table-cell office:value-type="time" office:time-value="PT08H30M00S"/>
    <table:table-cell office:value-type="string"><text:p>N/A</text:p></table:table-cell>
  </table:table-row>
</table:table>
<table:table table:name="Summary">
  <table:table-row table:number-rows-repeated="2">
    <table:table-cell table:number-columns-repeated="2" office:value-type="float" office:value="1"/>
  </table:table-row>
</table:table>
</office:spreadsheet></office:body></office:document-content>"#;

    pub(crate) fn ods_bytes(manifest: &str) -> Vec<u8> {
        package(manifest, CONTENT)
    }

    fn package(manifest: &str, content: &str) -> Vec<u8> {
        build_zip(&[
            ("mimetype", "application/vnd.oasis.opendocument.spreadsheet"),
            ("META-INF/manifest.xml", manifest),
            ("content.xml", content),
        ])
    }

    fn open(manifest: &str) -> Result<OdsSpreadsheet, SheetTablesError> {
        OdsSpreadsheet::from_reader("report.ods", UnifiedReader::Remote(Cursor::new(ods_bytes(manifest))))
    }

    fn criteria() -> Criteria {
        Criteria {
            sheet_limit: Some(1),
            nulls: HashSet::from([String::new()]),
            merge_cells: true,
            ..Criteria::default()
        }
    }

    #[test]
    fn huge_spans_and_repeats_stop_at_sheet_limits() {
        let content = r#"<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0">
<office:body><office:spreadsheet>
<table:table table:name="Wide">
  <table:table-row><table:table-cell/></table:table-row>
  <table:table-row>
    <table:table-cell table:number-rows-spanned="18446744073709551615" table:number-columns-spanned="2" office:value-type="string"><text:p>banner</text:p></table:table-cell>
    <table:table-cell table:number-columns-repeated="18446744073709551615" office:value-type="float" office:value="7"/>
  </table:table-row>
</table:table>
</office:spreadsheet></office:body></office:document-content>"#;
        let reader = UnifiedReader::Remote(Cursor::new(package(MANIFEST, content)));
        let mut spreadsheet = OdsSpreadsheet::from_reader("wide.ods", reader).unwrap();
        let sheets = spreadsheet.read_sheets(&criteria()).unwrap();

        assert_eq!(sheets[0].merges, vec![MergeRegion::new(1, 0, MAX_ROWS - 1, 1)]);
        assert_eq!(sheets[0].cells.len(), MAX_COLS);
        assert_eq!(sheets[0].cells.last().map(|cell| cell.col), Some(MAX_COLS - 1));
    }

    #[test]
    fn sheet_names() {
        assert_eq!(open(MANIFEST).unwrap().sheet_names(), vec!["Report", "Summary"]);
    }

    #[test]
    fn read_cells_and_spans() {
        let mut spreadsheet = open(MANIFEST).unwrap();
        let sheets = spreadsheet.read_sheets(&criteria()).unwrap();
        assert_eq!(sheets.len(), 1);
        let sheet = &sheets[0];
        let cells: Vec<(String, CellType, String)> = sheet.cells
            .iter()
            .map(|cell| (cell.reference(), cell.value.kind, cell.value.value.to_owned()))
            .collect();
        assert_eq!(cells, vec![
            ("A1".to_owned(), CellType::Text, "Monthly report".to_owned()),
            ("A5".to_owned(), CellType::Text, "Name".to_owned()),
            ("B5".to_owned(), CellType::Number, "12".to_owned()),
            ("C5".to_owned(), CellType::IsoDateTime, "2024-09-19".to_owned()),
            ("D5".to_owned(), CellType::Boolean, "1".to_owned()),
            ("A6".to_owned(), CellType::Error, "#DIV/0!".to_owned()),
            ("B6".to_owned(), CellType::Text, "two  spaces\n& lines".to_owned()),
            ("C6".to_owned(), CellType::IsoDuration, "PT08H30M00S".to_owned()),
            ("D6".to_owned(), CellType::Text, "N/A".to_owned()),
        ]);
        assert_eq!(sheet.merges, vec![MergeRegion::new(0, 0, 1, 2)]);
    }

    #[test]
    fn criteria_filters_values() {
        let mut spreadsheet = open(MANIFEST).unwrap();
        let criteria = Criteria {
            nulls: HashSet::from([String::new(), "N/A".to_owned()]),
            error_as_null: true,
            merge_cells: false,
            ..criteria()
        };
        let sheets = spreadsheet.read_sheets(&criteria).unwrap();
        let references: Vec<String> = sheets[0].cells.iter().map(Cell::reference).collect();
        assert_eq!(references, vec!["A1", "A5", "B5", "C5", "D5", "B6", "C6"]);
        assert!(sheets[0].merges.is_empty());
    }

    #[test]
    fn repeated_cells_expand() {
        let mut spreadsheet = open(MANIFEST).unwrap();
        let criteria = Criteria {
            sheet_name_patterns: Some(vec![Pattern::new("Summ*").unwrap()]),
            ..criteria()
        };
        let sheets = spreadsheet.read_sheets(&criteria).unwrap();
        assert_eq!(sheets.len(), 1);
        let references: Vec<String> = sheets[0].cells.iter().map(Cell::reference).collect();
        assert_eq!(references, vec!["A1", "B1", "A2", "B2"]);
    }

    #[test]
    fn all_matching_sheets_without_limit() {
        let mut spreadsheet = open(MANIFEST).unwrap();
        let criteria = Criteria {
            sheet_name_patterns: Some(vec![Pattern::new("*").unwrap()]),
            sheet_limit: None,
            ..criteria()
        };
        let names: Vec<String> = spreadsheet.read_sheets(&criteria).unwrap().into_iter().map(|sheet| sheet.name).collect();
        assert_eq!(names, vec!["Report", "Summary"]);
    }

    #[test]
    fn encrypted_manifest_is_rejected() {
        let error = open(ENCRYPTED_MANIFEST).err().map(|error| error.to_string());
        assert_eq!(error, Some("Spreadsheet 'report.ods' is password protected".to_owned()));
    }

    #[test]
    fn wrong_mime_type_is_rejected() {
        let bytes = build_zip(&[("mimetype", "application/vnd.oasis.opendocument.text"), ("content.xml", CONTENT)]);
        let result = OdsSpreadsheet::from_reader("letter.ods", UnifiedReader::Remote(Cursor::new(bytes)));
        assert!(matches!(result, Err(SheetTablesError::OdsError(OdsError::MimeTypeError))));
    }
}
