use crate::error::ResultMessage;
use crate::error::SheetTablesError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::excel;
use crate::spreadsheet::excel::load_relationships;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use crate::table::MergeRegion;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::BufReader;
use zip::read::ZipFile;
use zip::ZipArchive;

// XML tag names for parsing Excel XLSX format
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts"); // Custom number formats container
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");   // Individual custom number format
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");  // Cell format indexes container
const TAG_FORMAT_INDEX: QName = QName(b"xf");         // Individual cell format index
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");   // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");       // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t");                  // Text content within strings
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_SHEET: QName = QName(b"sheet");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");
const TAG_MERGE_CELL: QName = QName(b"mergeCell");    // Merged region, `ref="A1:C2"`

/// An Office Open XML workbook (`.xlsx`, `.xlsm`, `.xlam`).
pub(crate) struct XlsxSpreadsheet {
    pub(crate) name: String,
    zip: ZipArchive<UnifiedReader>,
    /// Cell type of every style index
    number_formats: Vec<CellType>,
    /// Worksheets as (name, zip_path) pairs
    sheets: Vec<(String, String)>,
    /// Shared string table, loaded on first read
    shared_strings: Option<Vec<String>>,
}

impl XlsxSpreadsheet {
    pub(crate) fn from_reader(file_name: &str, reader: UnifiedReader) -> Result<XlsxSpreadsheet, SheetTablesError> {
        let (zip, number_formats, sheets) = excel::open(file_name, reader, load_workbook, load_number_formats)?;
        Ok(XlsxSpreadsheet {
            name: file_name.to_owned(),
            zip,
            number_formats,
            sheets,
            shared_strings: None,
        })
    }
}

impl Spreadsheet for XlsxSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// Reads the accepted worksheets.
    ///
    /// Shared strings are resolved while reading, so every [`Cell`] holds its
    /// final text. Error cells are kept as text unless `error_as_null` is set,
    /// and `<mergeCell>` entries become the sheet's merged regions.
    fn read_sheets(&mut self, criteria: &Criteria) -> Result<Vec<Sheet>, SheetTablesError> {
        if self.shared_strings.is_none() {
            self.shared_strings = Some(load_shared_strings(&mut self.zip)?);
        }
        let shared_strings = self.shared_strings.as_deref().unwrap_or_default();

        let mut sheets = Vec::<Sheet>::new();
        for (sheet_name, zip_path) in &self.sheets {
            if criteria.is_full(sheets.len()) {
                break;
            } else if !criteria.accept(sheet_name) {
                continue;
            }

            let mut sheet = Sheet::new(&self.name, sheet_name, criteria.range);
            let mut row_count = 0usize;
            let mut col_count = 0usize;
            let mut row = 0usize;
            let mut col = 0usize;
            let mut kind = CellType::default();
            let mut is_shared_string = false;
            let mut value = String::new();
            let mut reader = self.zip.xml_reader(zip_path)?
                .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
            match_xml_events!(reader => {
                Event::Start(event) if event.name() == TAG_ROW => {
                    if let Some(number) = event.parse_attribute_value::<usize>("r")? {
                        row_count = number.saturating_sub(1);
                    }
                    col_count = 0;
                }
                Event::End(event) if event.name() == TAG_ROW => {
                    row_count = row_count.saturating_add(1);
                    col_count = 0;
                }
                Event::Start(event) if event.name() == TAG_CELL => {
                    (row, col) = event.get_attribute_value("r")?
                        .and_then(|reference| reference_to_index(&reference))
                        .unwrap_or((row_count, col_count));
                    col_count = col.saturating_add(1);
                    value.clear();
                    is_shared_string = false;
                    kind = if sheet.contains(row, col) {
                        let t = event.get_attribute_value("t")?;
                        match t.as_deref() {
                            Some("inlineStr") | Some("str") => CellType::Text,
                            Some("s") => {
                                is_shared_string = true;
                                CellType::Text
                            }
                            Some("d") => CellType::IsoDateTime,
                            Some("b") => CellType::Boolean,
                            Some("e") if criteria.error_as_null => CellType::Empty,
                            Some("e") => CellType::Error,
                            _ => match event.get_attribute_value("s")? {
                                Some(format_id) if !format_id.is_empty() => {
                                    let index = format_id.parse::<usize>()?;
                                    self.number_formats.get(index).copied().unwrap_or(CellType::Number)
                                }
                                _ => CellType::Number,
                            },
                        }
                    } else {
                        CellType::Empty
                    };
                }
                Event::Start(event) if kind != CellType::Empty && event.name() == TAG_INLINE_STRING => {
                    value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
                }
                Event::Start(event) if kind != CellType::Empty && event.name() == TAG_VALUE => {
                    value = read_string_value(&mut reader, TAG_VALUE, true)?;
                }
                Event::End(event) if event.name() == TAG_CELL => {
                    if kind != CellType::Empty && !value.is_empty() {
                        if is_shared_string {
                            let index = value.trim().parse::<usize>()?;
                            value = shared_strings
                                .get(index)
                                .cloned()
                                .ok_or_else(|| SpreadsheetError::SharedStringError(self.name.to_owned(), index))?;
                        }
                        if !value.is_empty() && !criteria.is_null(&value) {
                            sheet.push(Cell {
                                row,
                                col,
                                value: CellValue::new(kind, value.to_owned()),
                            });
                        }
                    }
                    kind = CellType::Empty;
                }
                Event::Start(event) if criteria.merge_cells && event.name() == TAG_MERGE_CELL => {
                    if let Some(reference) = event.get_attribute_value("ref")? {
                        let region = MergeRegion::try_from(&*reference)
                            .with_prefix(&format!("Invalid merged cell in sheet '{sheet_name}'"))?;
                        sheet.push_merge(region);
                    }
                }
            });
            tracing::debug!(
                file_name = self.name.as_str(),
                sheet = sheet_name.as_str(),
                cells = sheet.cells.len(),
                merges = sheet.merges.len(),
                "read xlsx sheet"
            );
            sheets.push(sheet);
        }

        Ok(sheets)
    }
}

/// Reads sheet names, their part paths and the date system from `xl/workbook.xml`.
fn load_workbook(zip: &mut ZipArchive<UnifiedReader>) -> Result<(Vec<(String, String)>, bool), SheetTablesError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.xml".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value.eq("1") || value.eq("true"))
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Reads `xl/styles.xml` and returns the cell type of every style index.
fn load_number_formats(zip: &mut ZipArchive<UnifiedReader>, is_1904: bool) -> Result<Vec<CellType>, SheetTablesError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                let style = CellType::parse_custom_number_format(&format, is_1904);
                custom_formats.insert(id.to_string(), style);
            }
        }
        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            let id = event.get_attribute_value("numFmtId")?.unwrap_or(Cow::Borrowed("0"));
            format_indexes.push(id.to_string());
        }
    });

    Ok(excel::load_number_formats(format_indexes, custom_formats, is_1904))
}

/// Reads the whole shared string table; a workbook without one has no shared strings.
fn load_shared_strings(zip: &mut ZipArchive<UnifiedReader>) -> Result<Vec<String>, SheetTablesError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Collects the text up to `end_tag`, skipping phonetic runs.
/// With `is_text_content` the element's own text counts, otherwise only `<t>` runs do.
fn read_string_value(
    reader: &mut XmlReader<BufReader<ZipFile<'_, UnifiedReader>>>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, SheetTablesError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_bytes_text(&event)?,
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}
