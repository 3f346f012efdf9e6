use crate::engines::tool::{numbered_files, Tool};
use crate::engines::{non_empty, TableEngine, DOCLING};
use crate::error::TafelError;
use crate::markdown::parse_markdown_tables;
use crate::model::Table;
use std::ffi::OsString;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct DoclingSettings {
    pub binary: String,
    pub min_columns: usize,
}

impl Default for DoclingSettings {
    fn default() -> Self {
        DoclingSettings {
            binary: "docling".into(),
            min_columns: 2,
        }
    }
}

/// Runs the docling converter to markdown and collects its pipe tables.
pub struct DoclingEngine {
    tool: Tool,
    settings: DoclingSettings,
}

impl DoclingEngine {
    pub fn new(settings: DoclingSettings) -> Result<Self, TafelError> {
        let tool = Tool::new(
            settings.binary.clone(),
            DOCLING,
            "Install docling: pip install docling",
        );
        tool.ensure_available("--version")?;
        Ok(DoclingEngine { tool, settings })
    }
}

impl TableEngine for DoclingEngine {
    fn id(&self) -> &str {
        DOCLING
    }

    fn extract(&self, pdf: &Path) -> Result<Vec<Table>, TafelError> {
        self.run(pdf, None)
    }

    fn extract_until(&self, pdf: &Path, deadline: Instant) -> Result<Vec<Table>, TafelError> {
        self.run(pdf, Some(deadline))
    }
}

impl DoclingEngine {
    fn run(&self, pdf: &Path, deadline: Option<Instant>) -> Result<Vec<Table>, TafelError> {
        let workdir = tempfile::tempdir()?;
        let args = [
            OsString::from("--to"),
            OsString::from("md"),
            OsString::from("--output"),
            workdir.path().as_os_str().to_os_string(),
            pdf.as_os_str().to_os_string(),
        ];
        self.tool.run(args, deadline)?;

        let outputs = numbered_files(workdir.path(), "md")?;
        if outputs.is_empty() {
            return Err(TafelError::Extraction(
                "docling produced no markdown output".into(),
            ));
        }

        let mut tables = Vec::new();
        for path in outputs {
            let markdown = std::fs::read_to_string(&path)?;
            tables.extend(parse_markdown_tables(&markdown, self.settings.min_columns));
        }
        Ok(non_empty(tables))
    }
}
