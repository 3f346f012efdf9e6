//! Import the first usable table of a document, trying engines in order.

use crate::discover_pdfs;
use crate::engines::{PDFTOTEXT, PDFTOTEXT_BBOX};
use crate::error::TafelError;
use crate::export::Workbook;
use crate::markdown::table_to_markdown;
use crate::model::{EngineId, Outcome, Table};
use crate::orchestrator::Orchestrator;
use std::path::{Path, PathBuf};

/// Engines tried when no order is configured.
pub const DEFAULT_FALLBACK_ORDER: [&str; 2] = [PDFTOTEXT_BBOX, PDFTOTEXT];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FallbackOptions {
    /// Engines to try, first to last. Empty means [`DEFAULT_FALLBACK_ORDER`].
    pub order: Vec<String>,
    /// Minimum number of rows the first table must have.
    pub min_rows: Option<usize>,
}

impl FallbackOptions {
    fn order(&self) -> Vec<&str> {
        if self.order.is_empty() {
            DEFAULT_FALLBACK_ORDER.to_vec()
        } else {
            self.order.iter().map(String::as_str).collect()
        }
    }
}

/// The engine that was accepted and what it found.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackImport {
    pub engine: EngineId,
    pub tables: Vec<Table>,
    /// The first table rendered as markdown.
    pub markdown: String,
}

#[derive(Debug)]
pub struct DocumentImport {
    pub document: PathBuf,
    pub outcome: Result<FallbackImport, TafelError>,
}

/// Run each engine in order and accept the first that returns at least one
/// table whose first table has enough rows.
///
/// Failing engines are skipped. Unknown engines in the order are rejected
/// before anything runs.
pub fn import_with_fallback(
    orchestrator: &Orchestrator,
    document: &Path,
    options: &FallbackOptions,
) -> Result<FallbackImport, TafelError> {
    let order = orchestrator.select(&options.order())?;

    for id in &order {
        let run = orchestrator.run(document, &[id.as_str()])?;
        if let Some(reason) = run.error {
            return Err(TafelError::Document {
                path: document.to_path_buf(),
                reason,
            });
        }
        let Some(result) = run.results.into_iter().next() else {
            continue;
        };

        let tables = match result.outcome {
            Outcome::Tables(tables) => tables,
            Outcome::Error(e) => {
                tracing::debug!(engine = %id, error = %e, "fallback: engine failed, trying next");
                continue;
            }
        };
        let Some(first) = tables.first() else {
            tracing::debug!(engine = %id, "fallback: no tables, trying next");
            continue;
        };
        if let Some(min_rows) = options.min_rows {
            if first.row_count() < min_rows {
                tracing::debug!(
                    engine = %id,
                    rows = first.row_count(),
                    min_rows,
                    "fallback: first table too short, trying next"
                );
                continue;
            }
        }

        let markdown = table_to_markdown(first)?;
        tracing::info!(document = %document.display(), engine = %id, "imported table");
        return Ok(FallbackImport {
            engine: result.engine,
            tables,
            markdown,
        });
    }

    Err(TafelError::NoSuitableEngine {
        tried: order.iter().map(EngineId::to_string).collect(),
    })
}

/// Import every PDF in `dir` and write one sheet per document to `workbook`.
pub fn import_directory(
    orchestrator: &Orchestrator,
    dir: &Path,
    workbook: &Path,
    options: &FallbackOptions,
) -> Result<Vec<DocumentImport>, TafelError> {
    orchestrator.select(&options.order())?;
    let documents = discover_pdfs(dir)?;

    let mut imports = Vec::with_capacity(documents.len());
    for document in documents {
        let outcome = match import_with_fallback(orchestrator, &document, options) {
            Err(e) if e.is_configuration() => return Err(e),
            other => other,
        };
        if let Err(e) = &outcome {
            tracing::warn!(document = %document.display(), error = %e, "import failed");
        }
        imports.push(DocumentImport { document, outcome });
    }

    imports_to_workbook(&imports).save(workbook)?;
    Ok(imports)
}

/// One sheet per document, named after the file stem: an `Engine` row, a
/// blank row, then each table under a `Table N` row. Failed documents get an
/// `Error` row instead.
pub fn imports_to_workbook(imports: &[DocumentImport]) -> Workbook {
    let mut workbook = Workbook::new();
    for import in imports {
        let stem = import
            .document
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let sheet = workbook.add_sheet(&stem);

        match &import.outcome {
            Ok(found) => {
                sheet.push_row(["Engine", found.engine.as_str()]);
                sheet.blank_row();
                for (idx, table) in found.tables.iter().enumerate() {
                    sheet.push_row([format!("Table {}", idx + 1)]);
                    for row in &table.rows {
                        sheet.push_row(row.iter().map(String::as_str));
                    }
                    sheet.blank_row();
                }
            }
            Err(e) => sheet.push_row(["Error".to_string(), e.to_string()]),
        }
    }
    workbook
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order() {
        let options = FallbackOptions::default();
        assert_eq!(options.order(), vec!["pdftotext-bbox", "pdftotext"]);
    }

    #[test]
    fn test_workbook_layout() {
        let imports = vec![
            DocumentImport {
                document: "in/report.pdf".into(),
                outcome: Ok(FallbackImport {
                    engine: "pdftotext".into(),
                    tables: vec![Table::from_strs(&[&["a", "b"], &["1", "2"]])],
                    markdown: String::new(),
                }),
            },
            DocumentImport {
                document: "in/scan.pdf".into(),
                outcome: Err(TafelError::NoSuitableEngine {
                    tried: vec!["pdftotext".into()],
                }),
            },
        ];

        let workbook = imports_to_workbook(&imports);
        let sheets = workbook.sheets();
        assert_eq!(sheets[0].name(), "report");
        assert_eq!(sheets[0].rows()[0], vec!["Engine", "pdftotext"]);
        assert!(sheets[0].rows()[1].is_empty());
        assert_eq!(sheets[0].rows()[2], vec!["Table 1"]);
        assert_eq!(sheets[0].rows()[4], vec!["1", "2"]);
        assert_eq!(sheets[1].name(), "scan");
        assert_eq!(sheets[1].rows()[0][0], "Error");
        assert!(sheets[1].rows()[0][1].contains("tried: pdftotext"));
    }
}
