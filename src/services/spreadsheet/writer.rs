use super::{CellValue, Sheet, SpreadsheetError, column_name};
use quick_xml::escape::escape;
use std::fmt::Write as _;
use std::io::{Cursor, Write};
use zip::CompressionMethod;
use zip::write::FileOptions;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

// Style 0 is the default, 1 the bold header, 2 a date and 3 a date with time.
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="4"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/><xf numFmtId="22" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

const SPREADSHEETML_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Encode `sheet` as a single-worksheet xlsx workbook. The first row is
/// written in bold as the header; dates below it get a date format.
pub fn write_workbook(sheet: &Sheet, sheet_name: &str) -> Result<Vec<u8>, SpreadsheetError> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", workbook_xml(sheet_name)),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/styles.xml", STYLES.to_string()),
        ("xl/worksheets/sheet1.xml", worksheet_xml(sheet)),
    ];

    for (name, content) in parts {
        zip.start_file(name, options)
            .map_err(|e| SpreadsheetError::Write(format!("{}: {}", name, e)))?;
        zip.write_all(content.as_bytes())
            .map_err(|e| SpreadsheetError::Write(format!("{}: {}", name, e)))?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| SpreadsheetError::Write(e.to_string()))?;
    Ok(cursor.into_inner())
}

fn workbook_xml(sheet_name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="{}" xmlns:r="{}"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        SPREADSHEETML_NS,
        RELATIONSHIPS_NS,
        escape(sheet_name)
    )
}

fn worksheet_xml(sheet: &Sheet) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="{}"><sheetData>"#,
        SPREADSHEETML_NS
    );

    for (row_index, row) in sheet.rows.iter().enumerate() {
        let row_number = row_index + 1;
        let style = if row_index == 0 { r#" s="1""# } else { "" };
        let _ = write!(xml, r#"<row r="{}">"#, row_number);

        for (column, value) in row.iter().enumerate() {
            let Some(value) = value else { continue };
            let reference = format!("{}{}", column_name(column), row_number);
            let _ = match value {
                CellValue::Text(text) => write!(
                    xml,
                    r#"<c r="{}"{} t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                    reference,
                    style,
                    escape(text.as_str())
                ),
                CellValue::Number(n) => {
                    write!(xml, r#"<c r="{}"{}><v>{}</v></c>"#, reference, style, n)
                }
                CellValue::Date(serial) => {
                    let style = if row_index == 0 { style } else { date_style(serial) };
                    write!(xml, r#"<c r="{}"{}><v>{}</v></c>"#, reference, style, serial)
                }
                CellValue::Bool(b) => write!(
                    xml,
                    r#"<c r="{}"{} t="b"><v>{}</v></c>"#,
                    reference,
                    style,
                    u8::from(*b)
                ),
                CellValue::Error(e) => write!(
                    xml,
                    r#"<c r="{}"{} t="e"><v>{}</v></c>"#,
                    reference,
                    style,
                    escape(e.as_str())
                ),
            };
        }

        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Whole serials are calendar dates; a fractional part carries a time of day.
fn date_style(serial: &str) -> &'static str {
    match serial.parse::<f64>() {
        Ok(days) if days.fract() != 0.0 => r#" s="3""#,
        _ => r#" s="2""#,
    }
}
