pub mod compare;
pub mod engines;
pub mod extract;
pub mod extract_dir;
pub mod import;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tafel_core::config::{self, Settings};
use tafel_core::error::TafelError;
use tafel_core::{EngineId, Orchestrator, Registry};

/// Resolved settings and the orchestrator built from them.
pub struct Context {
    pub settings: Settings,
    pub orchestrator: Orchestrator,
}

impl Context {
    pub fn load(config_file: Option<&Path>, timeout_secs: Option<u64>) -> Result<Self, TafelError> {
        let file = match config_file {
            Some(path) => config::load_explicit(path)?,
            None => config::load_config()?,
        };
        let mut settings = Settings::from_config(&file)?;
        if let Some(secs) = timeout_secs {
            settings.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        let registry = Arc::new(Registry::builtin(&settings));
        let orchestrator = Orchestrator::new(registry)
            .with_timeout(settings.timeout)
            .with_compare_pair(
                settings
                    .compare_engines
                    .iter()
                    .cloned()
                    .map(EngineId::from)
                    .collect(),
            );

        Ok(Context {
            settings,
            orchestrator,
        })
    }

    /// Engines from the command line, else the configured default selection.
    pub fn engine_ids<'a>(&'a self, requested: &'a [String]) -> Vec<&'a str> {
        let ids = if requested.is_empty() {
            &self.settings.engines[..]
        } else {
            requested
        };
        ids.iter().map(String::as_str).collect()
    }
}
