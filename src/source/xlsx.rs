//! Office Open XML workbook reader (`.xlsx`, `.xlsm`).
//!
//! Only cell values are read. Number cells whose style carries a date or
//! datetime format are handed over as [`CellValue::DateLike`] so the
//! detectors see them the way a user sees them in the sheet.
use crate::source::xml::{attribute, for_each_xml_event, push_reference, XmlReader};
use crate::source::SourceError;
use crate::spreadsheet::cell::serial_to_datetime;
use crate::spreadsheet::{cell_position, parse_cell_position, CellValue, Grid, Workbook};
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::collections::HashMap;
use std::io::{BufReader, Read, Seek};
use tracing::{debug, warn};
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const RELATIONSHIPS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const STYLES_PART: &str = "xl/styles.xml";

const TAG_RELATIONSHIP: &[u8] = b"Relationship";
const TAG_SHEET: QName = QName(b"sheet");
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts");
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");
const TAG_FORMAT_INDEX: QName = QName(b"xf");
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");
const TAG_TEXT: QName = QName(b"t");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");

/// How a numeric cell should be presented, derived from its style.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
enum NumberFormat {
    #[default]
    Number,
    Date,
    DateTime,
    Time,
}

impl NumberFormat {
    fn from_builtin_id(id: &str) -> Option<Self> {
        match id {
            "14" | "15" | "16" | "17" => Some(NumberFormat::Date),
            "22" => Some(NumberFormat::DateTime),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(NumberFormat::Time),
            _ => None,
        }
    }

    /// Looks for date and time tokens outside quoted literals, brackets and escapes.
    fn from_format_code(code: &str) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in code.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,
                '"' => is_literal = !is_literal,
                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),
                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }
        match (is_date, is_time) {
            (true, true) => NumberFormat::DateTime,
            (true, false) => NumberFormat::Date,
            (false, true) => NumberFormat::Time,
            (false, false) => NumberFormat::Number,
        }
    }

    /// Renders a numeric cell value.
    fn cell_value(self, number: f64, is_1904: bool) -> CellValue {
        let datetime = match self {
            NumberFormat::Number => None,
            _ => serial_to_datetime(number, is_1904),
        };
        match (self, datetime) {
            (NumberFormat::Date, Some(datetime)) => CellValue::DateLike(datetime.format("%Y-%m-%d").to_string()),
            (NumberFormat::DateTime, Some(datetime)) => {
                CellValue::DateLike(datetime.format("%Y-%m-%d %H:%M:%S").to_string())
            }
            (NumberFormat::Time, Some(datetime)) => CellValue::Text(datetime.format("%H:%M:%S").to_string()),
            _ if number.fract() == 0.0 && number.abs() < 1e15 => CellValue::Integer(number as i64),
            _ => CellValue::Number(number),
        }
    }
}

/// Value type announced by a cell's `t` attribute.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum CellType {
    Number,
    SharedString,
    InlineString,
    Boolean,
    IsoDate,
    Error,
}

impl CellType {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("s") => CellType::SharedString,
            Some("inlineStr" | "str") => CellType::InlineString,
            Some("b") => CellType::Boolean,
            Some("d") => CellType::IsoDate,
            Some("e") => CellType::Error,
            _ => CellType::Number,
        }
    }
}

/// Reads every worksheet of a workbook archive, in workbook order.
///
/// # Arguments
///
/// * `reader` - Seekable source of the zip archive
///
/// # Returns
///
/// * `Result<Workbook, SourceError>` - One grid per worksheet; error cells read as empty
pub fn read_xlsx<R: Read + Seek>(reader: R) -> Result<Workbook, SourceError> {
    let mut zip = ZipArchive::new(reader)?;
    let relationships = load_relationships(&mut zip)?;
    let (sheets, is_1904) = load_workbook(&mut zip, &relationships)?;
    let shared_strings = load_shared_strings(&mut zip)?;
    let number_formats = load_number_formats(&mut zip)?;
    debug!(
        "Workbook has {} sheets and {} shared strings",
        sheets.len(),
        shared_strings.len()
    );

    let mut workbook = Workbook::default();
    for (name, path) in sheets {
        let grid = read_worksheet(&mut zip, &path, &shared_strings, &number_formats, is_1904)?;
        workbook.sheets.push((name, grid));
    }
    Ok(workbook)
}

/// Finds an archive entry ignoring case and path separator style.
fn zip_file<'a, R: Read + Seek>(zip: &'a mut ZipArchive<R>, name: &str) -> Result<Option<ZipFile<'a, R>>, SourceError> {
    let pattern = name.replace('\\', "/");
    let path = zip
        .file_names()
        .find(|file_name| pattern.eq_ignore_ascii_case(file_name))
        .map(str::to_owned);
    match path.map(|file_name| zip.by_name(&file_name)).transpose() {
        Ok(file) => Ok(file),
        Err(ZipError::FileNotFound) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

fn xml_reader<'a, R: Read + Seek>(
    zip: &'a mut ZipArchive<R>,
    name: &str,
) -> Result<Option<XmlReader<BufReader<ZipFile<'a, R>>>>, SourceError> {
    Ok(zip_file(zip, name)?.map(|file| XmlReader::new(BufReader::new(file))))
}

/// Relationship targets must live under `xl/` inside the archive.
fn to_zip_path(target: &str) -> String {
    if let Some(path) = target.strip_prefix('/') {
        path.to_owned()
    } else if target.starts_with("xl/") {
        target.to_owned()
    } else {
        format!("xl/{target}")
    }
}

/// Maps relationship ids to worksheet parts.
fn load_relationships<R: Read + Seek>(zip: &mut ZipArchive<R>) -> Result<HashMap<String, String>, SourceError> {
    let mut reader = xml_reader(zip, RELATIONSHIPS_PART)?
        .ok_or_else(|| SourceError::MissingPart(RELATIONSHIPS_PART.to_owned()))?;
    let mut relationships = HashMap::new();
    for_each_xml_event!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let is_worksheet = attribute(&event, "Type")?.is_none_or(|kind| kind.ends_with("/worksheet"));
            let id = attribute(&event, "Id")?;
            let target = attribute(&event, "Target")?;
            if let (true, Some(id), Some(target)) = (is_worksheet, id, target) {
                relationships.insert(id.into_owned(), to_zip_path(&target));
            }
        }
    });
    Ok(relationships)
}

/// Lists `(sheet name, part path)` pairs and the workbook's date system.
fn load_workbook<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    relationships: &HashMap<String, String>,
) -> Result<(Vec<(String, String)>, bool), SourceError> {
    let mut reader = xml_reader(zip, WORKBOOK_PART)?.ok_or_else(|| SourceError::MissingPart(WORKBOOK_PART.to_owned()))?;
    let mut sheets = vec![];
    let mut is_1904 = false;
    for_each_xml_event!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None;
            let mut id = None;
            for result in event.attributes() {
                let attribute = result?;
                match attribute.key.local_name().as_ref() {
                    b"name" => name = Some(attribute.unescape_value()?.into_owned()),
                    b"id" => id = Some(attribute.unescape_value()?.into_owned()),
                    _ => (),
                }
            }
            match (name, id.and_then(|id| relationships.get(&id))) {
                (Some(name), Some(path)) => sheets.push((name, path.to_owned())),
                (name, _) => warn!("Skipping sheet {name:?} without a worksheet part"),
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = attribute(&event, "date1904")?.is_some_and(|value| value == "1" || value == "true");
        }
    });
    Ok((sheets, is_1904))
}

fn load_shared_strings<R: Read + Seek>(zip: &mut ZipArchive<R>) -> Result<Vec<String>, SourceError> {
    let mut shared_strings = vec![];
    let Some(mut reader) = xml_reader(zip, SHARED_STRINGS_PART)? else {
        return Ok(shared_strings);
    };
    for_each_xml_event!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Resolves each cell style (`xf` index) to the number format it applies.
fn load_number_formats<R: Read + Seek>(zip: &mut ZipArchive<R>) -> Result<Vec<NumberFormat>, SourceError> {
    let Some(mut reader) = xml_reader(zip, STYLES_PART)? else {
        return Ok(vec![]);
    };
    let mut custom_formats = HashMap::<String, NumberFormat>::new();
    let mut format_ids = Vec::<String>::new();
    let mut custom_formats_context = false;
    let mut format_indexes_context = false;
    for_each_xml_event!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = attribute(&event, "numFmtId")?;
            let code = attribute(&event, "formatCode")?;
            if let (Some(id), Some(code)) = (id, code) {
                custom_formats.insert(id.into_owned(), NumberFormat::from_format_code(&code));
            }
        }
        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            format_ids.push(attribute(&event, "numFmtId")?.map(|id| id.into_owned()).unwrap_or_default());
        }
    });

    Ok(format_ids
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| NumberFormat::from_builtin_id(id))
                .unwrap_or_default()
        })
        .collect())
}

/// Collects the text of a string item, skipping phonetic runs.
fn read_string_value<R: Read + Seek>(
    reader: &mut XmlReader<BufReader<ZipFile<'_, R>>>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, SourceError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    for_each_xml_event!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => push_reference(&mut text, &event)?,
    });
    Ok(text)
}

/// Places a value into the ragged row layout, growing rows as needed.
fn place(rows: &mut Vec<Vec<CellValue>>, row: usize, col: usize, value: CellValue) {
    if rows.len() <= row {
        rows.resize_with(row + 1, Vec::new);
    }
    let cells = &mut rows[row];
    if cells.len() <= col {
        cells.resize(col + 1, CellValue::Empty);
    }
    cells[col] = value;
}

fn read_worksheet<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    path: &str,
    shared_strings: &[String],
    number_formats: &[NumberFormat],
    is_1904: bool,
) -> Result<Grid, SourceError> {
    let mut reader = xml_reader(zip, path)?.ok_or_else(|| SourceError::MissingPart(path.to_owned()))?;
    let mut rows = Vec::<Vec<CellValue>>::new();
    let mut row_count = 0usize;
    let mut col_count = 0usize;
    let (mut row, mut col) = (0usize, 0usize);
    let mut kind = CellType::Number;
    let mut format = NumberFormat::Number;
    let mut value = None::<String>;
    for_each_xml_event!(reader => {
        Event::End(event) if event.name() == TAG_ROW => {
            row_count += 1;
            col_count = 0;
        }
        Event::Start(event) if event.name() == TAG_CELL => {
            (row, col) = attribute(&event, "r")?
                .and_then(|reference| parse_cell_position(&reference))
                .unwrap_or((row_count, col_count));
            row_count = row;
            col_count = col + 1;
            kind = CellType::parse(attribute(&event, "t")?.as_deref());
            format = match attribute(&event, "s")? {
                Some(style) => style
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| number_formats.get(index))
                    .copied()
                    .unwrap_or_default(),
                None => NumberFormat::Number,
            };
            value = None;
        }
        Event::Start(event) if event.name() == TAG_INLINE_STRING => {
            value = Some(read_string_value(&mut reader, TAG_INLINE_STRING, false)?);
        }
        Event::Start(event) if event.name() == TAG_VALUE => {
            value = Some(read_string_value(&mut reader, TAG_VALUE, true)?);
        }
        Event::End(event) if event.name() == TAG_CELL => {
            if let Some(raw) = value.take() {
                let cell = cell_value(kind, format, &raw, shared_strings, is_1904, row, col)?;
                if cell != CellValue::Empty {
                    place(&mut rows, row, col, cell);
                }
            }
        }
    });
    Ok(Grid::new(rows))
}

/// Converts the raw text of a cell according to its type and style.
fn cell_value(
    kind: CellType,
    format: NumberFormat,
    raw: &str,
    shared_strings: &[String],
    is_1904: bool,
    row: usize,
    col: usize,
) -> Result<CellValue, SourceError> {
    let invalid = || SourceError::InvalidCellValue {
        position: cell_position(row, col),
        value: raw.to_owned(),
    };
    let value = match kind {
        CellType::Error => CellValue::Empty,
        CellType::InlineString => CellValue::Text(raw.to_owned()),
        CellType::IsoDate => CellValue::DateLike(raw.to_owned()),
        CellType::Boolean => CellValue::Boolean(raw.trim() == "1" || raw.trim().eq_ignore_ascii_case("true")),
        CellType::SharedString => {
            let index = raw.trim().parse::<usize>().map_err(|_| invalid())?;
            CellValue::Text(shared_strings.get(index).ok_or_else(invalid)?.to_owned())
        }
        CellType::Number if raw.trim().is_empty() => CellValue::Empty,
        CellType::Number => {
            let number = raw.trim().parse::<f64>().map_err(|_| invalid())?;
            format.cell_value(number, is_1904)
        }
    };
    Ok(value)
}
