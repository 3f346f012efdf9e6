use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Stable identifier of an extraction engine (e.g. `"pdftotext"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineId(String);

impl EngineId {
    pub fn new(id: impl Into<String>) -> Self {
        EngineId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EngineId {
    fn from(s: &str) -> Self {
        EngineId(s.to_string())
    }
}

impl From<String> for EngineId {
    fn from(s: String) -> Self {
        EngineId(s)
    }
}

impl PartialEq<str> for EngineId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for EngineId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A grid of text cells. Rows may have different lengths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Table { rows }
    }

    pub fn from_strs(rows: &[&[&str]]) -> Self {
        Table {
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    pub fn is_rectangular(&self) -> bool {
        let width = self.column_count();
        self.rows.iter().all(|r| r.len() == width)
    }
}

/// Either the tables an engine produced or the reason it failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Tables(Vec<Table>),
    Error(String),
}

/// Outcome of running one engine on one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResult {
    pub engine: EngineId,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl EngineResult {
    pub fn success(engine: EngineId, tables: Vec<Table>) -> Self {
        EngineResult {
            engine,
            outcome: Outcome::Tables(tables),
        }
    }

    pub fn failure(engine: EngineId, error: impl Into<String>) -> Self {
        EngineResult {
            engine,
            outcome: Outcome::Error(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Tables(_))
    }

    pub fn tables(&self) -> Option<&[Table]> {
        match &self.outcome {
            Outcome::Tables(t) => Some(t),
            Outcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Tables(_) => None,
            Outcome::Error(e) => Some(e),
        }
    }
}

/// All engine outcomes for a single document, in request order.
///
/// When the document itself could not be read, `error` is set and `results`
/// is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRun {
    pub document: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub results: Vec<EngineResult>,
}

impl ExtractionRun {
    pub fn result(&self, engine: &str) -> Option<&EngineResult> {
        self.results.iter().find(|r| r.engine == engine)
    }

    pub fn engines(&self) -> Vec<&EngineId> {
        self.results.iter().map(|r| &r.engine).collect()
    }

    pub fn is_document_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-engine figures used for side-by-side comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineSummary {
    Extracted {
        table_count: usize,
        first_table_rows: Option<usize>,
    },
    Failed {
        error: String,
    },
}

impl EngineSummary {
    pub fn from_result(result: &EngineResult) -> Self {
        match &result.outcome {
            Outcome::Tables(tables) => EngineSummary::Extracted {
                table_count: tables.len(),
                first_table_rows: tables.first().map(Table::row_count),
            },
            Outcome::Error(e) => EngineSummary::Failed { error: e.clone() },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparedEngine {
    pub engine: EngineId,
    #[serde(flatten)]
    pub summary: EngineSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub document: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub engines: Vec<ComparedEngine>,
}

impl Comparison {
    pub fn summary(&self, engine: &str) -> Option<&EngineSummary> {
        self.engines
            .iter()
            .find(|c| c.engine == engine)
            .map(|c| &c.summary)
    }
}

/// Render tables as plain text: a `Table N:` header, then one `a | b` line per row.
pub fn summarize_tables(tables: &[Table]) -> String {
    let mut lines = Vec::new();
    for (idx, table) in tables.iter().enumerate() {
        lines.push(format!("Table {}:", idx + 1));
        for row in &table.rows {
            lines.push(row.join(" | "));
        }
        lines.push(String::new());
    }
    lines.join("\n").trim().to_string()
}
