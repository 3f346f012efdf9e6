pub mod bbox;
pub mod camelot;
pub mod docling;
pub mod layout;
pub mod tesseract;
pub mod tool;

use crate::error::TafelError;
use crate::model::Table;
use std::path::Path;
use std::time::Instant;

pub const PDFTOTEXT: &str = "pdftotext";
pub const PDFTOTEXT_BBOX: &str = "pdftotext-bbox";
pub const TESSERACT: &str = "tesseract";
pub const DOCLING: &str = "docling";
pub const CAMELOT: &str = "camelot";

/// Identifiers of the built-in engines, in registration order.
pub const BUILTIN: &[&str] = &[PDFTOTEXT, TESSERACT, PDFTOTEXT_BBOX, DOCLING, CAMELOT];

pub(crate) const POPPLER_HINT: &str =
    "Install poppler: brew install poppler (macOS) or apt install poppler-utils (Linux)";

/// A table extraction technique.
///
/// Constructing an engine is the fail-fast step: constructors check that the
/// external tools they wrap are present. `extract` either returns every table
/// it found (possibly none) or an error; it never returns a partial table.
/// Engines must not keep any reference to the document after returning.
pub trait TableEngine: Send + Sync {
    /// Identifier this engine is registered under.
    fn id(&self) -> &str;

    /// Extract all tables from the PDF at `pdf`, in document order.
    fn extract(&self, pdf: &Path) -> Result<Vec<Table>, TafelError>;

    /// Like `extract`, but external programs still running at `deadline`
    /// are stopped. Engines without child processes need not override it.
    fn extract_until(&self, pdf: &Path, _deadline: Instant) -> Result<Vec<Table>, TafelError> {
        self.extract(pdf)
    }

    /// The engine's raw layout text, for engines that have one.
    fn layout_source(&self) -> Option<&dyn LayoutSource> {
        None
    }
}

/// Produces `pdftotext -layout` style text that tuning can re-split.
pub trait LayoutSource {
    fn layout_text(&self, pdf: &Path, deadline: Option<Instant>) -> Result<String, TafelError>;
}

/// Drop empty tables so that every returned table has at least one row.
pub(crate) fn non_empty(tables: Vec<Table>) -> Vec<Table> {
    tables.into_iter().filter(|t| !t.is_empty()).collect()
}
