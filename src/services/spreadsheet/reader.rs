use super::{CellValue, MAX_COLUMNS, Row, Sheet, SpreadsheetError, column_index, is_blank_row};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const DEFAULT_SHEET_PART: &str = "xl/worksheets/sheet1.xml";
const DEFAULT_SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const DEFAULT_STYLES_PART: &str = "xl/styles.xml";

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// Read the first worksheet (in workbook order) of an xlsx payload.
///
/// Blank rows are dropped, so the first row of the result is the header.
/// Only cached cell values are read. Formulas are ignored and styles only
/// decide whether a number is a date.
pub fn read_first_sheet(bytes: &[u8]) -> Result<Sheet, SpreadsheetError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let parts = workbook_parts(&mut archive)?;
    let context = CellContext {
        shared_strings: match read_part(&mut archive, &parts.shared_strings)? {
            Some(xml) => parse_shared_strings(&xml, &parts.shared_strings)?,
            None => Vec::new(),
        },
        date_styles: match read_part(&mut archive, &parts.styles)? {
            Some(xml) => parse_date_styles(&xml, &parts.styles)?,
            None => Vec::new(),
        },
    };

    let xml = read_part(&mut archive, &parts.sheet)?
        .ok_or_else(|| SpreadsheetError::MissingPart(parts.sheet.clone()))?;
    parse_worksheet(&xml, &parts.sheet, &context)
}

fn read_part(archive: &mut Archive<'_>, name: &str) -> Result<Option<String>, SpreadsheetError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|e| SpreadsheetError::Archive(format!("{}: {}", name, e)))?;
    Ok(Some(xml))
}

/// Archive paths of the parts the first worksheet depends on.
struct WorkbookParts {
    sheet: String,
    shared_strings: String,
    styles: String,
}

/// A `<Relationship>` of the workbook.
struct Relationship {
    kind: String,
    target: String,
}

/// Parts are located through the workbook relationships. Archives without
/// them fall back to the conventional part names.
fn workbook_parts(archive: &mut Archive<'_>) -> Result<WorkbookParts, SpreadsheetError> {
    let workbook = read_part(archive, WORKBOOK_PART)?
        .ok_or_else(|| SpreadsheetError::MissingPart(WORKBOOK_PART.to_string()))?;
    let rel_id = first_sheet_rel_id(&workbook)?.ok_or(SpreadsheetError::NoWorksheet)?;

    let relationships = match read_part(archive, WORKBOOK_RELS_PART)? {
        Some(rels) => parse_relationships(&rels)?,
        None => HashMap::new(),
    };
    let by_kind = |suffix: &str, default: &str| {
        relationships
            .values()
            .find(|rel| rel.kind.ends_with(suffix))
            .map(|rel| resolve_target(&rel.target))
            .unwrap_or_else(|| default.to_string())
    };

    Ok(WorkbookParts {
        sheet: relationships
            .get(&rel_id)
            .map(|rel| resolve_target(&rel.target))
            .unwrap_or_else(|| DEFAULT_SHEET_PART.to_string()),
        shared_strings: by_kind("/sharedStrings", DEFAULT_SHARED_STRINGS_PART),
        styles: by_kind("/styles", DEFAULT_STYLES_PART),
    })
}

/// Relationship targets are relative to `xl/` unless absolute.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}

fn xml_error(part: &str, e: impl std::fmt::Display) -> SpreadsheetError {
    SpreadsheetError::Xml {
        part: part.to_string(),
        message: e.to_string(),
    }
}

fn attribute(
    e: &BytesStart<'_>,
    part: &str,
    local: &[u8],
) -> Result<Option<String>, SpreadsheetError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| xml_error(part, err))?;
        if attr.key.local_name().as_ref() == local {
            return Ok(Some(String::from_utf8_lossy(&attr.value).into_owned()));
        }
    }
    Ok(None)
}

/// Text behind a general entity reference (`&amp;`, `&#10;`, ...).
fn resolve_entity(name: &[u8]) -> Option<String> {
    let name = std::str::from_utf8(name).ok()?;
    if let Some(code) = name.strip_prefix('#') {
        let code = match code.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => code.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    let text = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        _ => return None,
    };
    Some(text.to_string())
}

fn first_sheet_rel_id(xml: &str) -> Result<Option<String>, SpreadsheetError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sheet" => {
                return attribute(&e, WORKBOOK_PART, b"id");
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(xml_error(WORKBOOK_PART, e)),
            _ => (),
        }
    }
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, Relationship>, SpreadsheetError> {
    let mut reader = Reader::from_str(xml);
    let mut relationships = HashMap::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let id = attribute(&e, WORKBOOK_RELS_PART, b"Id")?;
                let target = attribute(&e, WORKBOOK_RELS_PART, b"Target")?;
                let kind = attribute(&e, WORKBOOK_RELS_PART, b"Type")?.unwrap_or_default();
                if let (Some(id), Some(target)) = (id, target) {
                    relationships.insert(id, Relationship { kind, target });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(WORKBOOK_RELS_PART, e)),
            _ => (),
        }
    }
    Ok(relationships)
}

/// Built-in number formats that render dates or times. 14-22 and 45-47 exist
/// in every locale, the others only in East Asian ones.
fn is_builtin_date_format(id: u32) -> bool {
    matches!(id, 14..=22 | 27..=36 | 45..=47 | 50..=58)
}

/// Whether the positive section of a custom format code has a date or time
/// token outside quoted text, escapes and bracketed modifiers.
fn is_date_format_code(code: &str) -> bool {
    let mut chars = code.chars();
    while let Some(c) = chars.next() {
        match c {
            ';' => return false,
            '"' => {
                for quoted in chars.by_ref() {
                    if quoted == '"' {
                        break;
                    }
                }
            }
            '\\' | '_' | '*' => {
                chars.next();
            }
            '[' => {
                let inner: String = chars.by_ref().take_while(|&c| c != ']').collect();
                // elapsed time: [h], [mm], [ss]
                if !inner.is_empty()
                    && inner
                        .chars()
                        .all(|c| matches!(c.to_ascii_lowercase(), 'h' | 'm' | 's'))
                {
                    return true;
                }
            }
            'd' | 'D' | 'm' | 'M' | 'y' | 'Y' | 'h' | 'H' | 's' | 'S' => return true,
            _ => (),
        }
    }
    false
}

/// One flag per `cellXfs` entry: does that cell style format numbers as dates.
fn parse_date_styles(xml: &str, part: &str) -> Result<Vec<bool>, SpreadsheetError> {
    let mut reader = Reader::from_str(xml);
    let mut custom_formats: HashMap<u32, String> = HashMap::new();
    let mut format_ids: Vec<u32> = Vec::new();
    let mut in_cell_xfs = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"numFmt" => {
                    let id = attribute(&e, part, b"numFmtId")?
                        .and_then(|v| v.trim().parse().ok());
                    let code = attribute(&e, part, b"formatCode")?;
                    if let (Some(id), Some(code)) = (id, code) {
                        let code = match unescape(&code) {
                            Ok(unescaped) => unescaped.into_owned(),
                            Err(_) => code,
                        };
                        custom_formats.insert(id, code);
                    }
                }
                b"xf" if in_cell_xfs => {
                    let id = attribute(&e, part, b"numFmtId")?
                        .and_then(|v| v.trim().parse().ok())
                        .unwrap_or(0);
                    format_ids.push(id);
                }
                _ => (),
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(part, e)),
            _ => (),
        }
    }

    Ok(format_ids
        .into_iter()
        .map(|id| match custom_formats.get(&id) {
            Some(code) => is_date_format_code(code),
            None => is_builtin_date_format(id),
        })
        .collect())
}

/// Collects character data of `<t>` elements, skipping phonetic runs (`<rPh>`).
#[derive(Default)]
struct TextCapture {
    text: Option<String>,
    phonetic_depth: usize,
}

impl TextCapture {
    fn start(&mut self) {
        if self.phonetic_depth == 0 {
            self.text.get_or_insert_with(String::new);
        }
    }

    fn push(&mut self, s: &str) {
        if let Some(text) = self.text.as_mut() {
            text.push_str(s);
        }
    }
}

fn parse_shared_strings(xml: &str, part: &str) -> Result<Vec<String>, SpreadsheetError> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut capture = TextCapture::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" if current.is_some() => capture.start(),
                b"rPh" => capture.phonetic_depth += 1,
                _ => (),
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => {
                    if let (Some(text), Some(s)) = (capture.text.take(), current.as_mut()) {
                        s.push_str(&text);
                    }
                }
                b"rPh" => capture.phonetic_depth = capture.phonetic_depth.saturating_sub(1),
                b"si" => strings.extend(current.take()),
                _ => (),
            },
            Ok(Event::Text(e)) => capture.push(&String::from_utf8_lossy(&e)),
            Ok(Event::CData(e)) => capture.push(&String::from_utf8_lossy(&e)),
            Ok(Event::GeneralRef(e)) => {
                let text = resolve_entity(&e).ok_or_else(|| {
                    xml_error(part, format!("unknown entity &{};", String::from_utf8_lossy(&e)))
                })?;
                capture.push(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(part, e)),
            _ => (),
        }
    }
    Ok(strings)
}

/// Workbook-level tables cells refer to by index.
struct CellContext {
    shared_strings: Vec<String>,
    date_styles: Vec<bool>,
}

impl CellContext {
    fn is_date_style(&self, style: Option<usize>) -> bool {
        style
            .and_then(|s| self.date_styles.get(s).copied())
            .unwrap_or(false)
    }
}

/// A `<c>` element being read.
struct PendingCell {
    reference: String,
    column: usize,
    kind: String,
    style: Option<usize>,
    value: Option<String>,
    inline: Option<String>,
}

impl PendingCell {
    fn from_start(
        e: &BytesStart<'_>,
        part: &str,
        next_column: usize,
    ) -> Result<Self, SpreadsheetError> {
        let reference = attribute(e, part, b"r")?;
        let column = match reference.as_deref() {
            Some(r) => column_index(r).ok_or_else(|| SpreadsheetError::InvalidCell {
                reference: r.to_string(),
                message: "bad cell reference".to_string(),
            })?,
            None => next_column,
        };
        if column >= MAX_COLUMNS {
            return Err(SpreadsheetError::InvalidCell {
                reference: format!("column {}", column + 1),
                message: "beyond the last worksheet column".to_string(),
            });
        }

        Ok(Self {
            reference: reference.unwrap_or_else(|| super::column_name(column)),
            column,
            kind: attribute(e, part, b"t")?.unwrap_or_default(),
            style: attribute(e, part, b"s")?.and_then(|s| s.trim().parse().ok()),
            value: None,
            inline: None,
        })
    }

    fn resolve(self, context: &CellContext) -> Result<Option<CellValue>, SpreadsheetError> {
        let invalid = |message: String| SpreadsheetError::InvalidCell {
            reference: self.reference.clone(),
            message,
        };

        let value = match (self.kind.as_str(), self.value.as_deref()) {
            ("inlineStr", _) => self.inline.clone().map(CellValue::Text),
            (_, None) => None,
            ("s", Some(v)) => {
                let index: usize = v
                    .trim()
                    .parse()
                    .map_err(|_| invalid(format!("bad shared string index {:?}", v)))?;
                let text = context
                    .shared_strings
                    .get(index)
                    .ok_or_else(|| invalid(format!("shared string {} does not exist", index)))?;
                Some(CellValue::Text(text.clone()))
            }
            ("str" | "d", Some(v)) => Some(CellValue::Text(v.to_string())),
            ("b", Some(v)) => Some(CellValue::Bool(matches!(v.trim(), "1" | "true"))),
            ("e", Some(v)) => Some(CellValue::Error(v.to_string())),
            ("n" | "", Some(v)) => {
                let v = v.trim();
                if v.parse::<f64>().is_err() {
                    return Err(invalid(format!("bad number {:?}", v)));
                }
                if context.is_date_style(self.style) {
                    Some(CellValue::Date(v.to_string()))
                } else {
                    Some(CellValue::Number(v.to_string()))
                }
            }
            (other, Some(_)) => return Err(invalid(format!("unknown cell type {:?}", other))),
        };
        Ok(value)
    }
}

fn parse_worksheet(
    xml: &str,
    part: &str,
    context: &CellContext,
) -> Result<Sheet, SpreadsheetError> {
    let mut reader = Reader::from_str(xml);
    let mut rows = Vec::new();
    let mut row: Option<Row> = None;
    let mut cell: Option<PendingCell> = None;
    let mut capture = TextCapture::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => row = Some(Vec::new()),
                b"c" => {
                    let next_column = row.as_ref().map_or(0, Vec::len);
                    cell = Some(PendingCell::from_start(&e, part, next_column)?);
                }
                b"v" | b"t" if cell.is_some() => capture.start(),
                b"rPh" => capture.phonetic_depth += 1,
                _ => (),
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"c" => {
                // a bare <c/> holds no value but still advances the column
                let next_column = row.as_ref().map_or(0, Vec::len);
                let empty = PendingCell::from_start(&e, part, next_column)?;
                if let Some(row) = row.as_mut() {
                    place(row, empty.column, None);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" => {
                    if let Some(cell) = cell.as_mut() {
                        cell.value = capture.text.take().filter(|v| !v.is_empty());
                    }
                }
                b"t" => {
                    if let (Some(text), Some(cell)) = (capture.text.take(), cell.as_mut()) {
                        cell.inline.get_or_insert_with(String::new).push_str(&text);
                    }
                }
                b"rPh" => capture.phonetic_depth = capture.phonetic_depth.saturating_sub(1),
                b"c" => {
                    if let Some(done) = cell.take() {
                        let column = done.column;
                        let value = done.resolve(context)?;
                        if let Some(row) = row.as_mut() {
                            place(row, column, value);
                        }
                    }
                }
                b"row" => rows.extend(row.take()),
                _ => (),
            },
            Ok(Event::Text(e)) => capture.push(&String::from_utf8_lossy(&e)),
            Ok(Event::CData(e)) => capture.push(&String::from_utf8_lossy(&e)),
            Ok(Event::GeneralRef(e)) => {
                let text = resolve_entity(&e).ok_or_else(|| {
                    xml_error(part, format!("unknown entity &{};", String::from_utf8_lossy(&e)))
                })?;
                capture.push(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(part, e)),
            _ => (),
        }
    }

    rows.retain(|r| !is_blank_row(r));
    for row in rows.iter_mut() {
        while matches!(row.last(), Some(None)) {
            row.pop();
        }
    }
    Ok(Sheet { rows })
}

fn place(row: &mut Row, column: usize, value: Option<CellValue>) {
    if row.len() <= column {
        row.resize(column + 1, None);
    }
    row[column] = value;
}
