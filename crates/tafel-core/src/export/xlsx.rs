//! Minimal `.xlsx` writer: a zip archive of SpreadsheetML parts with every
//! cell stored as an inline string.

use crate::error::TafelError;
use crate::model::{ExtractionRun, Outcome};
use quick_xml::escape::escape;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Excel's limit on sheet name length.
const MAX_SHEET_NAME: usize = 31;
const INVALID_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    name: String,
    rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    pub fn blank_row(&mut self) {
        self.rows.push(Vec::new());
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Workbook::default()
    }

    /// Append a sheet. The name is sanitized and made unique.
    pub fn add_sheet(&mut self, name: &str) -> &mut Sheet {
        let existing: Vec<&str> = self.sheets.iter().map(|s| s.name.as_str()).collect();
        let name = unique_sheet_name(name, &existing);
        self.sheets.push(Sheet {
            name,
            rows: Vec::new(),
        });
        let last = self.sheets.len() - 1;
        &mut self.sheets[last]
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn save(&self, path: &Path) -> Result<(), TafelError> {
        let file = File::create(path)?;
        let mut writer = self.write_to(BufWriter::new(file))?;
        writer.flush()?;
        tracing::info!(path = %path.display(), sheets = self.sheets.len(), "wrote workbook");
        Ok(())
    }

    /// Write the workbook as a zip archive and return the inner writer.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W, TafelError> {
        // A workbook must contain at least one sheet.
        let placeholder = [Sheet {
            name: "result".into(),
            rows: Vec::new(),
        }];
        let sheets = if self.sheets.is_empty() {
            &placeholder[..]
        } else {
            &self.sheets[..]
        };

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(writer);

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(content_types(sheets.len()).as_bytes())?;
        zip.start_file("_rels/.rels", options)?;
        zip.write_all(ROOT_RELS.as_bytes())?;
        zip.start_file("xl/workbook.xml", options)?;
        zip.write_all(workbook_xml(sheets).as_bytes())?;
        zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        zip.write_all(workbook_rels(sheets.len()).as_bytes())?;

        for (idx, sheet) in sheets.iter().enumerate() {
            zip.start_file(format!("xl/worksheets/sheet{}.xml", idx + 1), options)?;
            zip.write_all(sheet_xml(sheet).as_bytes())?;
        }

        Ok(zip.finish()?)
    }
}

/// One sheet per engine: each table under a `Table N` row followed by a
/// blank row, `No tables found` for an empty result, `Error` and the message
/// for a failed engine.
pub fn run_to_workbook(run: &ExtractionRun) -> Workbook {
    let mut workbook = Workbook::new();

    if let Some(error) = &run.error {
        workbook.add_sheet("result").push_row(["Error", error.as_str()]);
        return workbook;
    }

    for result in &run.results {
        let sheet = workbook.add_sheet(result.engine.as_str());
        match &result.outcome {
            Outcome::Tables(tables) if tables.is_empty() => sheet.push_row(["No tables found"]),
            Outcome::Tables(tables) => {
                for (idx, table) in tables.iter().enumerate() {
                    sheet.push_row([format!("Table {}", idx + 1)]);
                    for row in &table.rows {
                        sheet.push_row(row.iter().map(String::as_str));
                    }
                    sheet.blank_row();
                }
            }
            Outcome::Error(e) => sheet.push_row(["Error", e.as_str()]),
        }
    }
    workbook
}

/// Sanitize `base` into a valid sheet name not already in `existing`.
/// Names are compared case-insensitively, as Excel does.
pub fn unique_sheet_name(base: &str, existing: &[&str]) -> String {
    let cleaned: String = base
        .chars()
        .map(|c| {
            if INVALID_SHEET_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('\'').trim();
    let name: String = if cleaned.is_empty() {
        "result".into()
    } else {
        cleaned.chars().take(MAX_SHEET_NAME).collect()
    };

    let taken = |candidate: &str| {
        let lower = candidate.to_lowercase();
        existing.iter().any(|e| e.to_lowercase() == lower)
    };
    let mut candidate = name.clone();
    let mut suffix = 1;
    while taken(&candidate) {
        let suffix_str = format!("_{suffix}");
        let keep = MAX_SHEET_NAME - suffix_str.len();
        candidate = format!("{}{suffix_str}", name.chars().take(keep).collect::<String>());
        suffix += 1;
    }
    candidate
}

/// Spreadsheet column letters: 0 -> A, 25 -> Z, 26 -> AA.
fn column_name(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Drop characters that are not allowed in XML 1.0 documents.
fn xml_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || c >= ' ')
        .collect();
    escape(cleaned.as_str()).into_owned()
}

fn sheet_xml(sheet: &Sheet) -> String {
    let mut xml = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        "\n",
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#
    ));
    for (r, row) in sheet.rows.iter().enumerate() {
        if row.iter().all(|c| c.is_empty()) {
            continue;
        }
        let row_num = r + 1;
        xml.push_str(&format!(r#"<row r="{row_num}">"#));
        for (c, cell) in row.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            xml.push_str(&format!(
                r#"<c r="{}{row_num}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                column_name(c),
                xml_text(cell)
            ));
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn content_types(sheet_count: usize) -> String {
    let mut xml = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        "\n",
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
        r#"<Default Extension="xml" ContentType="application/xml"/>"#,
        r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#
    ));
    for n in 1..=sheet_count {
        xml.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
    }
    xml.push_str("</Types>");
    xml
}

const ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
    "</Relationships>"
);

fn workbook_xml(sheets: &[Sheet]) -> String {
    let mut xml = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        "\n",
        r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
        r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#
    ));
    for (idx, sheet) in sheets.iter().enumerate() {
        let n = idx + 1;
        xml.push_str(&format!(
            r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
            xml_text(&sheet.name)
        ));
    }
    xml.push_str("</sheets></workbook>");
    xml
}

fn workbook_rels(sheet_count: usize) -> String {
    let mut xml = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        "\n",
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#
    ));
    for n in 1..=sheet_count {
        xml.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{n}.xml"/>"#
        ));
    }
    xml.push_str("</Relationships>");
    xml
}
