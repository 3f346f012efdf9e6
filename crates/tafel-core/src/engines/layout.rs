use crate::engines::tool::Tool;
use crate::engines::{non_empty, LayoutSource, TableEngine, PDFTOTEXT, POPPLER_HINT};
use crate::error::TafelError;
use crate::model::Table;
use std::ffi::OsStr;
use std::path::Path;
use std::time::Instant;

/// Knobs for splitting `pdftotext -layout` output into tables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutSettings {
    /// Minimum run of spaces (in characters) that separates two cells.
    pub gap: f32,
    /// Minimum number of cells for a line to count as a table row.
    pub min_words: usize,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        LayoutSettings {
            gap: 2.0,
            min_words: 2,
        }
    }
}

/// Table extraction from the pdftotext text layer.
///
/// `pdftotext -layout` keeps column alignment with spaces, so wide runs of
/// whitespace are treated as cell boundaries and runs of consecutive
/// multi-cell lines as tables.
pub struct LayoutEngine {
    tool: Tool,
    settings: LayoutSettings,
}

impl LayoutEngine {
    pub fn new(settings: LayoutSettings) -> Result<Self, TafelError> {
        let tool = Tool::new("pdftotext", PDFTOTEXT, POPPLER_HINT);
        tool.ensure_available("-v")?;
        Ok(LayoutEngine { tool, settings })
    }

    pub fn settings(&self) -> LayoutSettings {
        self.settings
    }
}

impl LayoutSource for LayoutEngine {
    /// Raw layout text, pages separated by form feeds.
    fn layout_text(&self, pdf: &Path, deadline: Option<Instant>) -> Result<String, TafelError> {
        self.tool.run_stdout(
            [OsStr::new("-layout"), pdf.as_os_str(), OsStr::new("-")],
            deadline,
        )
    }
}

impl TableEngine for LayoutEngine {
    fn id(&self) -> &str {
        PDFTOTEXT
    }

    fn extract(&self, pdf: &Path) -> Result<Vec<Table>, TafelError> {
        let text = self.layout_text(pdf, None)?;
        Ok(parse_layout(&text, &self.settings))
    }

    fn extract_until(&self, pdf: &Path, deadline: Instant) -> Result<Vec<Table>, TafelError> {
        let text = self.layout_text(pdf, Some(deadline))?;
        Ok(parse_layout(&text, &self.settings))
    }

    fn layout_source(&self) -> Option<&dyn LayoutSource> {
        Some(self)
    }
}

/// Split layout text into tables.
///
/// A table is a run of at least two consecutive lines that each split into
/// `min_words` or more cells. Blank lines, single-cell lines and page breaks
/// end a table.
pub fn parse_layout(text: &str, settings: &LayoutSettings) -> Vec<Table> {
    let mut tables = Vec::new();

    for page in text.split('\x0c') {
        let mut rows: Vec<Vec<String>> = Vec::new();

        for line in page.lines() {
            let cells = split_columns(line, settings.gap);
            if !cells.is_empty() && cells.len() >= settings.min_words {
                rows.push(cells);
            } else {
                finish_table(&mut rows, &mut tables);
            }
        }
        finish_table(&mut rows, &mut tables);
    }

    non_empty(tables)
}

fn finish_table(rows: &mut Vec<Vec<String>>, tables: &mut Vec<Table>) {
    if rows.len() >= 2 {
        tables.push(Table::new(std::mem::take(rows)));
    }
    rows.clear();
}

/// Split one line on whitespace runs of at least `gap` characters. A
/// fractional gap needs the next whole run, so 2.5 splits on three spaces.
fn split_columns(line: &str, gap: f32) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut spaces = 0usize;

    for ch in line.trim().chars() {
        if ch == ' ' || ch == '\t' {
            spaces += 1;
            continue;
        }
        if spaces > 0 {
            if spaces as f32 >= gap {
                cells.push(std::mem::take(&mut current));
            } else {
                current.extend(std::iter::repeat(' ').take(spaces));
            }
            spaces = 0;
        }
        current.push(ch);
    }

    if !current.is_empty() {
        cells.push(current);
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Quarterly report\n\
\n\
  Region        Q1      Q2\n\
  North West    120     98\n\
  South         75      101\n\
\n\
Some closing prose that spans the page.\n\
\x0c\
  Item    Price\n\
  Apple   1.20\n";

    #[test]
    fn test_split_columns() {
        assert_eq!(
            split_columns("  North West    120     98", 2.0),
            vec!["North West", "120", "98"]
        );
        assert_eq!(
            split_columns("North West 120", 1.0),
            vec!["North", "West", "120"]
        );
        assert!(split_columns("   ", 2.0).is_empty());
    }

    #[test]
    fn test_fractional_gap_is_not_rounded() {
        assert_eq!(split_columns("a  b", 2.5), vec!["a  b"]);
        assert_eq!(split_columns("a   b", 2.5), vec!["a", "b"]);
        // 6.4 must not behave like 6.
        assert_eq!(split_columns("a      b", 6.4), vec!["a      b"]);
        assert_eq!(split_columns("a       b", 6.4), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_layout_finds_tables_per_page() {
        let tables = parse_layout(SAMPLE, &LayoutSettings::default());
        assert_eq!(tables.len(), 2);
        assert_eq!(
            tables[0],
            Table::from_strs(&[
                &["Region", "Q1", "Q2"],
                &["North West", "120", "98"],
                &["South", "75", "101"],
            ])
        );
        assert_eq!(tables[1].row_count(), 2);
    }

    #[test]
    fn test_wider_gap_drops_narrow_columns() {
        let settings = LayoutSettings {
            gap: 4.0,
            min_words: 2,
        };
        // "Apple   1.20" is only three spaces apart, so page two keeps one row.
        let tables = parse_layout(SAMPLE, &settings);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].row_count(), 3);

        let settings = LayoutSettings {
            gap: 10.0,
            min_words: 2,
        };
        assert!(parse_layout(SAMPLE, &settings).is_empty());
    }

    #[test]
    fn test_min_words_filters_rows() {
        let settings = LayoutSettings {
            gap: 2.0,
            min_words: 3,
        };
        let tables = parse_layout(SAMPLE, &settings);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].column_count(), 3);
    }

    #[test]
    fn test_single_multi_cell_line_is_not_a_table() {
        let tables = parse_layout("a    b\n\nplain\n", &LayoutSettings::default());
        assert!(tables.is_empty());
    }
}
