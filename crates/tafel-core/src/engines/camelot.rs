use crate::engines::tool::{numbered_files, Tool};
use crate::engines::{non_empty, TableEngine, CAMELOT};
use crate::error::TafelError;
use crate::model::Table;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::time::Instant;

/// Camelot parsing mode: `lattice` follows ruling lines, `stream` uses
/// whitespace between words.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CamelotFlavor {
    #[default]
    Lattice,
    Stream,
}

impl fmt::Display for CamelotFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CamelotFlavor::Lattice => write!(f, "lattice"),
            CamelotFlavor::Stream => write!(f, "stream"),
        }
    }
}

impl CamelotFlavor {
    pub fn parse(s: &str) -> Option<CamelotFlavor> {
        match s.trim().to_lowercase().as_str() {
            "lattice" => Some(CamelotFlavor::Lattice),
            "stream" => Some(CamelotFlavor::Stream),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CamelotSettings {
    pub binary: String,
    pub flavor: CamelotFlavor,
}

impl CamelotSettings {
    pub fn new(flavor: CamelotFlavor) -> Self {
        CamelotSettings {
            binary: "camelot".into(),
            flavor,
        }
    }
}

impl Default for CamelotSettings {
    fn default() -> Self {
        CamelotSettings::new(CamelotFlavor::default())
    }
}

/// Runs the camelot CLI with CSV export and reads the per-table CSV files back.
pub struct CamelotEngine {
    tool: Tool,
    settings: CamelotSettings,
}

impl CamelotEngine {
    pub fn new(settings: CamelotSettings) -> Result<Self, TafelError> {
        let tool = Tool::new(
            settings.binary.clone(),
            CAMELOT,
            "Install camelot: pip install camelot-py",
        );
        tool.ensure_available("--version")?;
        Ok(CamelotEngine { tool, settings })
    }
}

impl TableEngine for CamelotEngine {
    fn id(&self) -> &str {
        CAMELOT
    }

    fn extract(&self, pdf: &Path) -> Result<Vec<Table>, TafelError> {
        self.run(pdf, None)
    }

    fn extract_until(&self, pdf: &Path, deadline: Instant) -> Result<Vec<Table>, TafelError> {
        self.run(pdf, Some(deadline))
    }
}

impl CamelotEngine {
    fn run(&self, pdf: &Path, deadline: Option<Instant>) -> Result<Vec<Table>, TafelError> {
        let workdir = tempfile::tempdir()?;
        let output = workdir.path().join("tables.csv");
        let args = [
            OsString::from("--pages"),
            OsString::from("all"),
            OsString::from("--format"),
            OsString::from("csv"),
            OsString::from("--output"),
            output.into_os_string(),
            OsString::from(self.settings.flavor.to_string()),
            pdf.as_os_str().to_os_string(),
        ];
        self.tool.run(args, deadline)?;

        let mut tables = Vec::new();
        for path in numbered_files(workdir.path(), "csv")? {
            tables.push(read_csv_table(&path)?);
        }
        Ok(non_empty(tables))
    }
}

/// Read a headerless CSV file into a table, keeping ragged rows as they are.
pub fn read_csv_table(path: &Path) -> Result<Table, TafelError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|c| c.trim().to_string()).collect());
    }
    Ok(Table::new(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flavor_parse() {
        assert_eq!(CamelotFlavor::parse("Stream"), Some(CamelotFlavor::Stream));
        assert_eq!(CamelotFlavor::parse("lattice"), Some(CamelotFlavor::Lattice));
        assert_eq!(CamelotFlavor::parse("grid"), None);
        assert_eq!(CamelotFlavor::default().to_string(), "lattice");
    }

    #[test]
    fn test_read_csv_table_ragged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables-page-1-table-1.csv");
        std::fs::write(&path, "\"Name\",\"Qty\"\n\"Apple, green\",\"3\"\n\"Total\"\n").unwrap();

        let table = read_csv_table(&path).unwrap();
        assert_eq!(
            table,
            Table::from_strs(&[&["Name", "Qty"], &["Apple, green", "3"], &["Total"]])
        );
    }
}
