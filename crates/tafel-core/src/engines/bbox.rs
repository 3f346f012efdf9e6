use crate::engines::tool::Tool;
use crate::engines::{non_empty, TableEngine, PDFTOTEXT_BBOX, POPPLER_HINT};
use crate::error::TafelError;
use crate::model::Table;
use quick_xml::escape::unescape;
use std::ffi::OsStr;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BboxSettings {
    /// Words closer than this (in points) belong to the same cell.
    pub cell_gap: f32,
    /// Cell left edges within this distance (in points) share a column.
    pub column_tolerance: f32,
    /// Minimum number of cells for a visual row to count as a table row.
    pub min_columns: usize,
}

impl Default for BboxSettings {
    fn default() -> Self {
        BboxSettings {
            cell_gap: 6.0,
            column_tolerance: 10.0,
            min_columns: 2,
        }
    }
}

/// Table detection from word bounding boxes (`pdftotext -bbox-layout`).
///
/// Words are grouped into visual rows by vertical position, rows into cells
/// by horizontal gaps, and cell left edges are clustered into columns so the
/// resulting grid is aligned. Columns that are empty in every row are dropped.
pub struct BboxEngine {
    tool: Tool,
    settings: BboxSettings,
}

impl BboxEngine {
    pub fn new(settings: BboxSettings) -> Result<Self, TafelError> {
        let tool = Tool::new("pdftotext", PDFTOTEXT_BBOX, POPPLER_HINT);
        tool.ensure_available("-v")?;
        Ok(BboxEngine { tool, settings })
    }
}

impl TableEngine for BboxEngine {
    fn id(&self) -> &str {
        PDFTOTEXT_BBOX
    }

    fn extract(&self, pdf: &Path) -> Result<Vec<Table>, TafelError> {
        self.run(pdf, None)
    }

    fn extract_until(&self, pdf: &Path, deadline: Instant) -> Result<Vec<Table>, TafelError> {
        self.run(pdf, Some(deadline))
    }
}

impl BboxEngine {
    fn run(&self, pdf: &Path, deadline: Option<Instant>) -> Result<Vec<Table>, TafelError> {
        let xml = self.tool.run_stdout(
            [OsStr::new("-bbox-layout"), pdf.as_os_str(), OsStr::new("-")],
            deadline,
        )?;
        let words = parse_words(&xml);
        tracing::debug!(words = words.len(), "parsed word boxes");
        Ok(tables_from_words(&words, &self.settings))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct BBox {
    x_min: f32,
    y_min: f32,
    x_max: f32,
    y_max: f32,
}

impl BBox {
    fn center_y(&self) -> f32 {
        (self.y_min + self.y_max) / 2.0
    }

    fn height(&self) -> f32 {
        self.y_max - self.y_min
    }
}

#[derive(Debug, Clone)]
struct Word {
    page: usize,
    text: String,
    bbox: BBox,
}

#[derive(Debug, Clone)]
struct Cell {
    x_min: f32,
    x_max: f32,
    text: String,
}

fn tables_from_words(words: &[Word], settings: &BboxSettings) -> Vec<Table> {
    let mut tables = Vec::new();
    let last_page = words.iter().map(|w| w.page).max().unwrap_or(0);

    for page in 1..=last_page {
        let page_words: Vec<&Word> = words.iter().filter(|w| w.page == page).collect();
        let mut block: Vec<Vec<Cell>> = Vec::new();

        for row in group_rows(&page_words) {
            let cells = merge_cells(&row, settings.cell_gap);
            if cells.len() >= settings.min_columns {
                block.push(cells);
            } else {
                finish_block(&mut block, settings, &mut tables);
            }
        }
        finish_block(&mut block, settings, &mut tables);
    }

    non_empty(tables)
}

fn finish_block(block: &mut Vec<Vec<Cell>>, settings: &BboxSettings, tables: &mut Vec<Table>) {
    if block.len() >= 2 {
        let table = remove_empty_columns(align_columns(block, settings.column_tolerance));
        let wide_enough = table.rows.iter().any(|row| {
            row.iter().filter(|c| !c.trim().is_empty()).count() >= settings.min_columns
        });
        if wide_enough {
            tables.push(table);
        }
    }
    block.clear();
}

/// Group words into visual rows, top to bottom, each row sorted left to right.
fn group_rows<'a>(words: &[&'a Word]) -> Vec<Vec<&'a Word>> {
    let mut sorted = words.to_vec();
    sorted.sort_by(|a, b| {
        a.bbox
            .center_y()
            .total_cmp(&b.bbox.center_y())
            .then(a.bbox.x_min.total_cmp(&b.bbox.x_min))
    });

    let mut rows: Vec<Vec<&Word>> = Vec::new();
    let mut row_center = 0.0f32;

    for word in sorted {
        let center = word.bbox.center_y();
        let tolerance = word.bbox.height().max(1.0) * 0.5;
        match rows.last_mut() {
            Some(row) if (center - row_center).abs() <= tolerance => {
                let n = row.len() as f32;
                row_center = (row_center * n + center) / (n + 1.0);
                row.push(word);
            }
            _ => {
                row_center = center;
                rows.push(vec![word]);
            }
        }
    }

    for row in &mut rows {
        row.sort_by(|a, b| a.bbox.x_min.total_cmp(&b.bbox.x_min));
    }
    rows
}

fn merge_cells(row: &[&Word], cell_gap: f32) -> Vec<Cell> {
    let mut cells: Vec<Cell> = Vec::new();
    for word in row {
        match cells.last_mut() {
            Some(cell) if word.bbox.x_min - cell.x_max <= cell_gap => {
                cell.text.push(' ');
                cell.text.push_str(&word.text);
                cell.x_max = cell.x_max.max(word.bbox.x_max);
            }
            _ => cells.push(Cell {
                x_min: word.bbox.x_min,
                x_max: word.bbox.x_max,
                text: word.text.clone(),
            }),
        }
    }
    cells
}

/// Place cells into a grid whose columns are clusters of cell left edges.
fn align_columns(block: &[Vec<Cell>], tolerance: f32) -> Table {
    let mut starts: Vec<f32> = block.iter().flatten().map(|c| c.x_min).collect();
    starts.sort_by(f32::total_cmp);

    let mut columns: Vec<(f32, f32)> = Vec::new();
    for x in starts {
        match columns.last_mut() {
            Some(col) if x - col.1 <= tolerance => col.1 = x,
            _ => columns.push((x, x)),
        }
    }

    let width = columns.len();
    let rows = block
        .iter()
        .map(|cells| {
            let mut out = vec![String::new(); width];
            for cell in cells {
                let idx = columns
                    .iter()
                    .position(|(lo, hi)| cell.x_min >= *lo && cell.x_min <= *hi)
                    .unwrap_or(width.saturating_sub(1));
                if out[idx].is_empty() {
                    out[idx] = cell.text.clone();
                } else {
                    out[idx].push(' ');
                    out[idx].push_str(&cell.text);
                }
            }
            out
        })
        .collect();

    Table::new(rows)
}

/// Drop columns that are blank in every row. Ragged rows are fine.
pub fn remove_empty_columns(table: Table) -> Table {
    let width = table.column_count();
    let keep: Vec<usize> = (0..width)
        .filter(|&idx| {
            table
                .rows
                .iter()
                .any(|row| row.get(idx).is_some_and(|c| !c.trim().is_empty()))
        })
        .collect();

    if keep.len() == width {
        return table;
    }

    Table::new(
        table
            .rows
            .into_iter()
            .map(|row| {
                keep.iter()
                    .filter_map(|&idx| row.get(idx).cloned())
                    .collect()
            })
            .collect(),
    )
}

fn parse_words(xml: &str) -> Vec<Word> {
    let mut out = Vec::new();
    let mut page = 0usize;

    for raw in xml.lines() {
        let line = raw.trim();

        if line.starts_with("<page ") || line == "<page>" {
            page += 1;
            continue;
        }

        if line.starts_with("<word ") {
            let (Some(bbox), Some(text)) = (parse_bbox(line), parse_word_text(line)) else {
                continue;
            };
            let text = decode_xml_entities(&text).trim().to_string();
            if !text.is_empty() {
                out.push(Word {
                    page: page.max(1),
                    text,
                    bbox,
                });
            }
        }
    }

    out
}

fn parse_attr_f32(tag: &str, name: &str) -> Option<f32> {
    parse_attr(tag, name)?.parse().ok()
}

fn parse_attr<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("{}=\"", name);
    let start = tag.find(&needle)? + needle.len();
    let rest = &tag[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}

fn parse_bbox(tag: &str) -> Option<BBox> {
    Some(BBox {
        x_min: parse_attr_f32(tag, "xMin")?,
        y_min: parse_attr_f32(tag, "yMin")?,
        x_max: parse_attr_f32(tag, "xMax")?,
        y_max: parse_attr_f32(tag, "yMax")?,
    })
}

fn parse_word_text(word_tag: &str) -> Option<String> {
    let start = word_tag.find('>')? + 1;
    let end = word_tag.rfind("</word>")?;
    Some(word_tag.get(start..end)?.to_string())
}

/// Unescape entities in word text. Malformed escapes are kept as written.
fn decode_xml_entities(s: &str) -> String {
    match unescape(s) {
        Ok(text) => text.into_owned(),
        Err(_) => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(x_min: f32, y_min: f32, x_max: f32, text: &str) -> String {
        format!(
            r#"<word xMin="{x_min:.6}" yMin="{y_min:.6}" xMax="{x_max:.6}" yMax="{:.6}">{text}</word>"#,
            y_min + 10.0
        )
    }

    fn sample_xml() -> String {
        let words = [
            word(50.0, 50.0, 90.0, "Annual"),
            word(93.0, 50.0, 130.0, "figures"),
            word(50.0, 100.0, 80.0, "Name"),
            word(200.0, 100.0, 220.0, "Qty"),
            word(300.0, 100.0, 330.0, "Price"),
            word(50.0, 115.0, 80.0, "Green"),
            word(83.0, 115.0, 110.0, "apple"),
            word(205.0, 115.0, 210.0, "4"),
            word(300.0, 115.0, 320.0, "1.20"),
            word(50.0, 130.0, 75.0, "Pear"),
            word(205.0, 130.0, 210.0, "2"),
        ];
        format!(
            "<doc>\n  <page width=\"612.000000\" height=\"792.000000\">\n    <flow>\n      <block>\n        <line>\n{}\n        </line>\n      </block>\n    </flow>\n  </page>\n</doc>\n",
            words.join("\n")
        )
    }

    #[test]
    fn test_parse_words() {
        let words = parse_words(&sample_xml());
        assert_eq!(words.len(), 11);
        assert_eq!(words[0].page, 1);
        assert_eq!(words[0].text, "Annual");
        assert_eq!(words[0].bbox.x_min, 50.0);
    }

    #[test]
    fn test_decode_entities_once() {
        assert_eq!(decode_xml_entities("R&amp;D &amp;lt;"), "R&D &lt;");
    }

    #[test]
    fn test_tables_from_words_aligns_columns() {
        let words = parse_words(&sample_xml());
        let tables = tables_from_words(&words, &BboxSettings::default());
        assert_eq!(tables.len(), 1);
        assert_eq!(
            tables[0],
            Table::from_strs(&[
                &["Name", "Qty", "Price"],
                &["Green apple", "4", "1.20"],
                &["Pear", "2", ""],
            ])
        );
    }

    #[test]
    fn test_pages_are_separate() {
        let xml = sample_xml();
        let two_pages = format!("{xml}{xml}");
        let words = parse_words(&two_pages);
        assert_eq!(words.iter().filter(|w| w.page == 2).count(), 11);
        let tables = tables_from_words(&words, &BboxSettings::default());
        assert_eq!(tables.len(), 2);
    }

    #[test]
    fn test_remove_empty_columns_ragged() {
        let table = Table::from_strs(&[&["a", " ", "c"], &["d"]]);
        assert_eq!(
            remove_empty_columns(table),
            Table::from_strs(&[&["a", "c"], &["d"]])
        );
    }
}
