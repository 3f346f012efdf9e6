use crate::engines::tool::{numbered_files, Tool};
use crate::engines::{non_empty, TableEngine, POPPLER_HINT, TESSERACT};
use crate::error::TafelError;
use crate::model::Table;
use std::ffi::OsString;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct TesseractSettings {
    /// Tesseract language codes, joined with `+` on the command line.
    pub languages: Vec<String>,
    /// Rasterization resolution passed to pdftoppm.
    pub dpi: u32,
    /// Words below this confidence (0.0 - 1.0) are ignored.
    pub min_confidence: f32,
    /// Words whose top edges are within this many pixels share a row.
    pub row_tolerance: f32,
}

impl Default for TesseractSettings {
    fn default() -> Self {
        TesseractSettings {
            languages: vec!["nld".into(), "eng".into()],
            dpi: 144,
            min_confidence: 0.5,
            row_tolerance: 25.0,
        }
    }
}

/// OCR-based extraction: every page is rasterized with pdftoppm, read with
/// tesseract, and its words grouped into rows by vertical position.
///
/// Produces one table per page that has any confident words. Rows are as
/// wide as the words found on them, so tables are usually ragged.
pub struct TesseractEngine {
    pdftoppm: Tool,
    tesseract: Tool,
    settings: TesseractSettings,
}

impl TesseractEngine {
    pub fn new(settings: TesseractSettings) -> Result<Self, TafelError> {
        let pdftoppm = Tool::new("pdftoppm", TESSERACT, POPPLER_HINT);
        let tesseract = Tool::new(
            "tesseract",
            TESSERACT,
            "Install tesseract: brew install tesseract (macOS) or apt install tesseract-ocr (Linux)",
        );
        pdftoppm.ensure_available("-v")?;
        tesseract.ensure_available("--version")?;
        Ok(TesseractEngine {
            pdftoppm,
            tesseract,
            settings,
        })
    }
}

impl TableEngine for TesseractEngine {
    fn id(&self) -> &str {
        TESSERACT
    }

    fn extract(&self, pdf: &Path) -> Result<Vec<Table>, TafelError> {
        self.run(pdf, None)
    }

    fn extract_until(&self, pdf: &Path, deadline: Instant) -> Result<Vec<Table>, TafelError> {
        self.run(pdf, Some(deadline))
    }
}

impl TesseractEngine {
    /// Rasterize, then OCR page by page; the deadline covers every step.
    fn run(&self, pdf: &Path, deadline: Option<Instant>) -> Result<Vec<Table>, TafelError> {
        let workdir = tempfile::tempdir()?;
        let prefix = workdir.path().join("page");

        let dpi = self.settings.dpi.to_string();
        let args = [
            OsString::from("-r"),
            OsString::from(&dpi),
            OsString::from("-png"),
            pdf.as_os_str().to_os_string(),
            prefix.into_os_string(),
        ];
        self.pdftoppm.run(args, deadline)?;

        let languages = self.settings.languages.join("+");
        let mut tables = Vec::new();
        for image in numbered_files(workdir.path(), "png")? {
            let args = [
                image.into_os_string(),
                OsString::from("stdout"),
                OsString::from("-l"),
                OsString::from(&languages),
                OsString::from("tsv"),
            ];
            let tsv = self.tesseract.run_stdout(args, deadline)?;
            let words = parse_tsv(&tsv, self.settings.min_confidence);
            if !words.is_empty() {
                tables.push(group_words(words, self.settings.row_tolerance));
            }
        }

        Ok(non_empty(tables))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct OcrWord {
    left: f32,
    top: f32,
    text: String,
}

/// Parse tesseract TSV output, keeping word-level entries above the
/// confidence threshold.
fn parse_tsv(tsv: &str, min_confidence: f32) -> Vec<OcrWord> {
    let mut words = Vec::new();
    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 || fields[0] != "5" {
            continue;
        }
        let (Ok(left), Ok(top), Ok(conf)) = (
            fields[6].parse::<f32>(),
            fields[7].parse::<f32>(),
            fields[10].parse::<f32>(),
        ) else {
            continue;
        };
        if conf / 100.0 < min_confidence {
            continue;
        }
        let text = fields[11..].join("\t").trim().to_string();
        if text.is_empty() {
            continue;
        }
        words.push(OcrWord { left, top, text });
    }
    words
}

/// Group words into rows. A word joins the current row when its top edge is
/// within `tolerance` of the row's running average; each row is then read
/// left to right.
fn group_words(mut words: Vec<OcrWord>, tolerance: f32) -> Table {
    words.sort_by(|a, b| a.top.total_cmp(&b.top).then(a.left.total_cmp(&b.left)));

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<OcrWord> = Vec::new();
    let mut last_y: Option<f32> = None;

    for word in words {
        last_y = match last_y {
            Some(y) if (word.top - y).abs() > tolerance => {
                rows.push(finish_row(std::mem::take(&mut current)));
                Some(word.top)
            }
            Some(y) => Some((y + word.top) / 2.0),
            None => Some(word.top),
        };
        current.push(word);
    }
    if !current.is_empty() {
        rows.push(finish_row(current));
    }

    Table::new(rows)
}

fn finish_row(mut row: Vec<OcrWord>) -> Vec<String> {
    row.sort_by(|a, b| a.left.total_cmp(&b.left));
    row.into_iter().map(|w| w.text).collect()
}
