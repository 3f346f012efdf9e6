//! Markdown pipe tables: parsing converter output into [`Table`]s and
//! rendering a [`Table`] back to markdown.

use crate::error::TafelError;
use crate::model::Table;

/// Collect every pipe table in `markdown`.
///
/// Separator rows (`| --- | :-: |`) are skipped and any non-table line ends
/// the current table. Tables where no row reaches `min_columns` cells are
/// discarded.
pub fn parse_markdown_tables(markdown: &str, min_columns: usize) -> Vec<Table> {
    let mut tables = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();

    for raw in markdown.lines().chain(std::iter::once("")) {
        let line = raw.trim();
        if line.starts_with('|') && line[1..].contains('|') {
            let cells: Vec<String> = line
                .trim_matches('|')
                .split('|')
                .map(|c| c.trim().to_string())
                .collect();
            if cells.is_empty() || is_separator_row(&cells) {
                continue;
            }
            rows.push(cells);
        } else if !rows.is_empty() {
            finish_table(std::mem::take(&mut rows), min_columns, &mut tables);
        }
    }

    tables
}

fn finish_table(mut rows: Vec<Vec<String>>, min_columns: usize, tables: &mut Vec<Table>) {
    if rows.iter().any(|r| r.len() >= min_columns) {
        repair_header_row(&mut rows);
        tables.push(Table::new(rows));
    }
}

fn is_separator_row(cells: &[String]) -> bool {
    cells
        .iter()
        .all(|c| !c.is_empty() && c.chars().all(|ch| matches!(ch, '-' | ':' | ' ')))
}

fn is_placeholder(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    match lower.strip_prefix("col") {
        Some(rest) => !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Converters sometimes put the whole header in the first cell and fill the
/// rest with `Col2`, `Col3`, ... placeholders. Split the first cell back out
/// when it has enough tokens.
fn repair_header_row(rows: &mut [Vec<String>]) {
    let Some(header) = rows.first_mut() else {
        return;
    };
    if !header.iter().skip(1).any(|c| is_placeholder(c)) {
        return;
    }

    let raw = header[0].replace("<br>", " ");
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.len() < header.len() {
        return;
    }

    *header = tokens[..header.len()].iter().map(|t| t.to_string()).collect();
}

/// Render a table as markdown, using the first row as the header and padding
/// short rows with empty cells.
pub fn table_to_markdown(table: &Table) -> Result<String, TafelError> {
    let Some(header) = table.rows.first() else {
        return Err(TafelError::Extraction(
            "an empty table cannot be rendered as markdown".into(),
        ));
    };
    let width = table.column_count();

    let format_row = |row: &[String]| {
        let mut cells: Vec<&str> = row.iter().map(String::as_str).collect();
        cells.resize(width.max(cells.len()), "");
        format!("| {} |", cells.join(" | "))
    };

    let mut lines = vec![
        format_row(header),
        format!("| {} |", vec!["---"; width].join(" | ")),
    ];
    for row in &table.rows[1..] {
        lines.push(format_row(row));
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_table() {
        let md = "# Report\n\n| Name | Qty |\n|------|:---:|\n| Apple | 3 |\n| Pear | 5\n\nAfter.\n";
        let tables = parse_markdown_tables(md, 2);
        assert_eq!(tables.len(), 1);
        assert_eq!(
            tables[0],
            Table::from_strs(&[&["Name", "Qty"], &["Apple", "3"], &["Pear", "5"]])
        );
    }

    #[test]
    fn test_table_at_end_of_input_is_kept() {
        let tables = parse_markdown_tables("| a | b |\n| c | d |", 2);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].row_count(), 2);
    }

    #[test]
    fn test_narrow_tables_discarded() {
        let tables = parse_markdown_tables("| only |\n| one |\n\n| x | y |\n", 2);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows[0], vec!["x", "y"]);
    }

    #[test]
    fn test_placeholder_header_repaired() {
        let md = "| Year<br>Revenue Cost | Col2 | Col3 |\n| 2023 | 10 | 4 |\n";
        let tables = parse_markdown_tables(md, 2);
        assert_eq!(tables[0].rows[0], vec!["Year", "Revenue", "Cost"]);
    }

    #[test]
    fn test_placeholder_header_left_alone_without_tokens() {
        let md = "| Year | Col2 | Col3 |\n| 2023 | 10 | 4 |\n";
        let tables = parse_markdown_tables(md, 2);
        assert_eq!(tables[0].rows[0], vec!["Year", "Col2", "Col3"]);
    }

    #[test]
    fn test_table_to_markdown_pads_ragged_rows() {
        let table = Table::from_strs(&[&["a", "b", "c"], &["1"], &["2", "3"]]);
        assert_eq!(
            table_to_markdown(&table).unwrap(),
            "| a | b | c |\n| --- | --- | --- |\n| 1 |  |  |\n| 2 | 3 |  |"
        );
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(table_to_markdown(&Table::default()).is_err());
    }
}
