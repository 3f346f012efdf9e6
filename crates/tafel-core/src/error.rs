use std::path::PathBuf;
use std::time::Duration;

/// Broad classification of a [`TafelError`].
///
/// The orchestrator only lets `Configuration` errors escape; `Engine` and
/// `Document` errors are recorded in the extraction results instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Engine,
    Document,
    Output,
}

#[derive(Debug, thiserror::Error)]
pub enum TafelError {
    #[error("unknown engine '{name}'. Available: {}", available.join(", "))]
    UnknownEngine { name: String, available: Vec<String> },

    #[error("no engines selected and none are registered")]
    NoEngines,

    #[error("engine '{0}' is already registered")]
    DuplicateEngine(String),

    #[error("{tool} not found (required by engine '{engine}'). {hint}")]
    MissingDependency {
        engine: String,
        tool: String,
        hint: String,
    },

    #[error("failed to load config from {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    #[error("invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("{tool} failed with exit code {code}: {stderr}")]
    ToolFailed {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("engine '{engine}' timed out after {limit:?}")]
    Timeout { engine: String, limit: Duration },

    #[error("engine '{engine}' is still busy with an earlier timed-out extraction")]
    Busy { engine: String },

    #[error("{tool} was stopped at the deadline (engine '{engine}')")]
    DeadlineExceeded { engine: String, tool: String },

    #[error("engine '{engine}' panicked: {message}")]
    Panicked { engine: String, message: String },

    #[error("no suitable engine extracted a table with enough rows (tried: {})", tried.join(", "))]
    NoSuitableEngine { tried: Vec<String> },

    #[error("cannot read document {path}: {reason}")]
    Document { path: PathBuf, reason: String },

    #[error("no PDF files found in {0}")]
    NoDocuments(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("spreadsheet error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl TafelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TafelError::UnknownEngine { .. }
            | TafelError::NoEngines
            | TafelError::DuplicateEngine(_)
            | TafelError::MissingDependency { .. }
            | TafelError::ConfigLoad { .. }
            | TafelError::InvalidSetting { .. } => ErrorKind::Configuration,
            TafelError::ToolFailed { .. }
            | TafelError::Extraction(_)
            | TafelError::Timeout { .. }
            | TafelError::Busy { .. }
            | TafelError::DeadlineExceeded { .. }
            | TafelError::Panicked { .. }
            | TafelError::NoSuitableEngine { .. } => ErrorKind::Engine,
            TafelError::Document { .. } | TafelError::NoDocuments(_) => ErrorKind::Document,
            TafelError::Io(_) | TafelError::Json(_) | TafelError::Zip(_) | TafelError::Csv(_) => {
                ErrorKind::Output
            }
        }
    }

    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}
