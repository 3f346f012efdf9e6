pub mod config;
pub mod engines;
pub mod error;
pub mod export;
pub mod fallback;
pub mod markdown;
pub mod model;
pub mod orchestrator;
pub mod registry;
pub mod tuning;

use error::TafelError;
use std::path::{Path, PathBuf};

pub use engines::TableEngine;
pub use model::{EngineId, EngineResult, ExtractionRun, Outcome, Table};
pub use orchestrator::Orchestrator;
pub use registry::Registry;

/// PDF files directly inside `dir`, sorted by file name.
///
/// The extension check is case-insensitive. Subdirectories are not searched.
pub fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>, TafelError> {
    let mut pdfs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();

    if pdfs.is_empty() {
        return Err(TafelError::NoDocuments(dir.to_path_buf()));
    }
    pdfs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(pdfs)
}
