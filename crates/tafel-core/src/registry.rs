use crate::config::Settings;
use crate::engines::bbox::BboxEngine;
use crate::engines::camelot::CamelotEngine;
use crate::engines::docling::DoclingEngine;
use crate::engines::layout::LayoutEngine;
use crate::engines::tesseract::TesseractEngine;
use crate::engines::{TableEngine, CAMELOT, DOCLING, PDFTOTEXT, PDFTOTEXT_BBOX, TESSERACT};
use crate::error::TafelError;
use crate::model::EngineId;
use std::sync::{Arc, Mutex};

/// Builds an engine on first use.
pub type EngineFactory = Box<dyn Fn() -> Result<Arc<dyn TableEngine>, TafelError> + Send + Sync>;

struct Entry {
    id: EngineId,
    factory: EngineFactory,
    instance: Mutex<Option<Arc<dyn TableEngine>>>,
}

/// Ordered set of engine factories keyed by identifier.
///
/// Engines are constructed lazily on the first `resolve` and the instance is
/// reused afterwards. A factory error is returned to the caller and not
/// remembered, so a later call may succeed once the tool is installed.
#[derive(Default)]
pub struct Registry {
    entries: Vec<Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Registry with the five built-in engines, configured from `settings`.
    pub fn builtin(settings: &Settings) -> Self {
        let mut registry = Registry::new();

        let layout = settings.layout;
        let tesseract = settings.tesseract.clone();
        let bbox = settings.bbox;
        let docling = settings.docling.clone();
        let camelot = settings.camelot.clone();

        // Built-in ids are distinct constants, so these cannot collide.
        registry.push(PDFTOTEXT, Box::new(move || {
            Ok(Arc::new(LayoutEngine::new(layout)?) as Arc<dyn TableEngine>)
        }));
        registry.push(TESSERACT, Box::new(move || {
            Ok(Arc::new(TesseractEngine::new(tesseract.clone())?) as Arc<dyn TableEngine>)
        }));
        registry.push(PDFTOTEXT_BBOX, Box::new(move || {
            Ok(Arc::new(BboxEngine::new(bbox)?) as Arc<dyn TableEngine>)
        }));
        registry.push(DOCLING, Box::new(move || {
            Ok(Arc::new(DoclingEngine::new(docling.clone())?) as Arc<dyn TableEngine>)
        }));
        registry.push(CAMELOT, Box::new(move || {
            Ok(Arc::new(CamelotEngine::new(camelot.clone())?) as Arc<dyn TableEngine>)
        }));
        registry
    }

    /// Add an engine factory. Fails if `id` is already registered.
    pub fn register<F>(&mut self, id: impl Into<EngineId>, factory: F) -> Result<(), TafelError>
    where
        F: Fn() -> Result<Arc<dyn TableEngine>, TafelError> + Send + Sync + 'static,
    {
        let id = id.into();
        if self.contains(id.as_str()) {
            return Err(TafelError::DuplicateEngine(id.to_string()));
        }
        self.push(id, Box::new(factory));
        Ok(())
    }

    fn push(&mut self, id: impl Into<EngineId>, factory: EngineFactory) {
        self.entries.push(Entry {
            id: id.into(),
            factory,
            instance: Mutex::new(None),
        });
    }

    /// Registered identifiers in registration order. Never constructs engines.
    pub fn list(&self) -> Vec<EngineId> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Error for an identifier that is not registered.
    pub fn unknown(&self, id: &str) -> TafelError {
        TafelError::UnknownEngine {
            name: id.to_string(),
            available: self.entries.iter().map(|e| e.id.to_string()).collect(),
        }
    }

    /// Return the engine for `id`, constructing it on first use.
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn TableEngine>, TafelError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| self.unknown(id))?;

        // A poisoned lock only means a factory panicked; the slot is still valid.
        let mut slot = entry
            .instance
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(engine) = slot.as_ref() {
            return Ok(Arc::clone(engine));
        }

        tracing::debug!(engine = id, "constructing engine");
        let engine = (entry.factory)()?;
        *slot = Some(Arc::clone(&engine));
        Ok(engine)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("engines", &self.list())
            .finish()
    }
}
