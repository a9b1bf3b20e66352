//! Office Open XML package helpers shared by the `.xlsx` family.
use crate::error::SheetTablesError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::HashMap;
use zip::ZipArchive;

const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// Leading bytes of an OLE compound file, the container Office uses for encrypted packages.
const OLE_SIGNATURE: &[u8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";

/// Opens the package and loads its sheet list and number formats.
///
/// Returns the archive, the cell type of every style index and the
/// `(sheet name, part path)` pairs in workbook order.
pub(super) fn open<W, F>(file_name: &str, mut reader: UnifiedReader, load_workbook: W, load_number_formats: F) -> Result<(
    ZipArchive<UnifiedReader>,
    Vec<CellType>,
    Vec<(String, String)>
), SheetTablesError>
where
    W: Fn(&mut ZipArchive<UnifiedReader>) -> Result<(Vec<(String, String)>, bool), SheetTablesError>,
    F: Fn(&mut ZipArchive<UnifiedReader>, bool) -> Result<Vec<CellType>, SheetTablesError>,
{
    if reader.starts_with(OLE_SIGNATURE)? {
        Err(SpreadsheetError::SpreadsheetPasswordProtectedError(file_name.to_owned()))?;
    }

    let mut zip = ZipArchive::new(reader)?;
    let (sheets, is_1904) = load_workbook(&mut zip)?;
    if sheets.is_empty() {
        Err(SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()))?
    }

    let number_formats = load_number_formats(&mut zip, is_1904)?;
    tracing::debug!(file_name, sheets = sheets.len(), is_1904, "loaded workbook structure");
    Ok((zip, number_formats, sheets))
}

/// Maps relationship ids to worksheet part paths.
pub(super) fn load_relationships(zip: &mut ZipArchive<UnifiedReader>, path: &str) -> Result<HashMap<String, String>, SheetTablesError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_string()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Resolves each style's number format id to a cell type, custom formats first.
pub(super) fn load_number_formats(format_indexes: Vec<String>, custom_formats: HashMap<String, CellType>, is_1904: bool) -> Vec<CellType> {
    format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect()
}

/// Normalizes a relationship target to a path inside the archive.
pub(crate) fn to_zip_path(path: Cow<'_, str>) -> String {
    if let Some(path) = path.strip_prefix('/') {
        path.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}
