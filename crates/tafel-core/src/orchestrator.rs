use crate::engines::{TableEngine, PDFTOTEXT, PDFTOTEXT_BBOX};
use crate::error::TafelError;
use crate::model::{
    ComparedEngine, Comparison, EngineId, EngineResult, EngineSummary, ExtractionRun, Table,
};
use crate::registry::Registry;
use std::any::Any;
use std::collections::HashMap;
use std::io::Read;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Engines compared when `compare` is called without a selection.
pub const DEFAULT_COMPARE_PAIR: [&str; 2] = [PDFTOTEXT, PDFTOTEXT_BBOX];

const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// How far into the file the signature may appear.
const SIGNATURE_WINDOW: u64 = 1024;

/// Runs engines from a [`Registry`] over documents.
///
/// Only configuration problems (an unknown engine, an empty registry) are
/// returned as errors. Everything that goes wrong while reading a document or
/// running an engine is recorded in the returned [`ExtractionRun`] so that one
/// failure never hides the results of the other engines or documents.
///
/// With a timeout, each engine has at most one worker in flight. A call that
/// finds the previous worker for the same engine still running is recorded
/// as `Busy` instead of starting a second one.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    registry: Arc<Registry>,
    timeout: Option<Duration>,
    compare_pair: Vec<EngineId>,
    in_flight: Arc<Mutex<HashMap<EngineId, Arc<AtomicBool>>>>,
}

impl Orchestrator {
    pub fn new(registry: Arc<Registry>) -> Self {
        Orchestrator {
            registry,
            timeout: None,
            compare_pair: DEFAULT_COMPARE_PAIR.iter().map(|id| EngineId::from(*id)).collect(),
            in_flight: Arc::default(),
        }
    }

    /// Stop waiting for an engine after `timeout`. External programs the
    /// engine started are killed at the same deadline.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Engines used by `compare` when none are requested.
    pub fn with_compare_pair(mut self, engines: Vec<EngineId>) -> Self {
        self.compare_pair = engines;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn list_engines(&self) -> Vec<EngineId> {
        self.registry.list()
    }

    /// Validate a selection of engine identifiers.
    ///
    /// An empty selection means every registered engine. Repeated identifiers
    /// keep their first position.
    pub fn select(&self, ids: &[&str]) -> Result<Vec<EngineId>, TafelError> {
        if ids.is_empty() {
            let all = self.registry.list();
            if all.is_empty() {
                return Err(TafelError::NoEngines);
            }
            return Ok(all);
        }

        let mut selected: Vec<EngineId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !self.registry.contains(id) {
                return Err(self.registry.unknown(id));
            }
            if !selected.iter().any(|s| s == id) {
                selected.push(EngineId::from(*id));
            }
        }
        Ok(selected)
    }

    /// Run the selected engines on one document.
    pub fn run(&self, document: &Path, ids: &[&str]) -> Result<ExtractionRun, TafelError> {
        let selected = self.select(ids)?;
        Ok(self.run_selected(document, &selected))
    }

    /// Run the selected engines on each document in turn.
    pub fn run_batch<P: AsRef<Path>>(
        &self,
        documents: &[P],
        ids: &[&str],
    ) -> Result<Vec<ExtractionRun>, TafelError> {
        let selected = self.select(ids)?;
        tracing::info!(
            documents = documents.len(),
            engines = selected.len(),
            "starting batch"
        );
        Ok(documents
            .iter()
            .map(|d| self.run_selected(d.as_ref(), &selected))
            .collect())
    }

    /// Run the engines once and summarize their results side by side.
    pub fn compare(&self, document: &Path, ids: &[&str]) -> Result<Comparison, TafelError> {
        let pair: Vec<&str> = self.compare_pair.iter().map(EngineId::as_str).collect();
        let ids = if ids.is_empty() { &pair[..] } else { ids };
        let run = self.run(document, ids)?;

        Ok(Comparison {
            document: run.document,
            error: run.error,
            engines: run
                .results
                .iter()
                .map(|r| ComparedEngine {
                    engine: r.engine.clone(),
                    summary: EngineSummary::from_result(r),
                })
                .collect(),
        })
    }

    fn run_selected(&self, document: &Path, selected: &[EngineId]) -> ExtractionRun {
        tracing::info!(document = %document.display(), engines = selected.len(), "extracting");

        if let Err(e) = check_document(document) {
            tracing::warn!(document = %document.display(), error = %e, "skipping document");
            return ExtractionRun {
                document: document.to_path_buf(),
                error: Some(e.to_string()),
                results: Vec::new(),
            };
        }

        let results = selected
            .iter()
            .map(|id| match self.run_engine(document, id) {
                Ok(tables) => {
                    tracing::debug!(engine = %id, tables = tables.len(), "engine finished");
                    EngineResult::success(id.clone(), tables)
                }
                Err(e) => {
                    tracing::warn!(engine = %id, error = %e, "engine failed");
                    EngineResult::failure(id.clone(), e.to_string())
                }
            })
            .collect();

        ExtractionRun {
            document: document.to_path_buf(),
            error: None,
            results,
        }
    }

    fn run_engine(&self, document: &Path, id: &EngineId) -> Result<Vec<Table>, TafelError> {
        tracing::debug!(engine = %id, "running engine");
        let path = document.to_path_buf();
        self.with_engine(id, move |engine, deadline| match deadline {
            Some(deadline) => engine.extract_until(&path, deadline),
            None => engine.extract(&path),
        })
    }

    /// Call `job` on the engine registered as `id` under the same isolation
    /// as an extraction: panics become errors and, with a timeout, the job
    /// runs on a worker thread and receives the deadline.
    pub fn with_engine<T, F>(&self, id: &EngineId, job: F) -> Result<T, TafelError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn TableEngine, Option<Instant>) -> Result<T, TafelError> + Send + 'static,
    {
        let engine = self.registry.resolve(id.as_str())?;
        let Some(limit) = self.timeout else {
            return catch_unwind(AssertUnwindSafe(|| job(engine.as_ref(), None)))
                .unwrap_or_else(|payload| Err(panicked(id, payload)));
        };

        let Some(guard) = InFlight::acquire(&self.in_flight_flag(id)) else {
            tracing::warn!(engine = %id, "previous worker still running");
            return Err(TafelError::Busy {
                engine: id.to_string(),
            });
        };
        let deadline = Instant::now() + limit;

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name(format!("tafel-{id}"))
            .spawn(move || {
                let outcome = catch_unwind(AssertUnwindSafe(|| job(engine.as_ref(), Some(deadline))));
                // Release before reporting so the next call never sees a
                // finished worker as busy.
                drop(guard);
                let _ = tx.send(outcome);
            })?;

        match rx.recv_timeout(limit) {
            Ok(Ok(result)) => result,
            Ok(Err(payload)) => Err(panicked(id, payload)),
            Err(RecvTimeoutError::Timeout) => Err(TafelError::Timeout {
                engine: id.to_string(),
                limit,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(TafelError::Panicked {
                engine: id.to_string(),
                message: "worker exited without a result".into(),
            }),
        }
    }

    fn in_flight_flag(&self, id: &EngineId) -> Arc<AtomicBool> {
        let mut flags = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(flags.entry(id.clone()).or_default())
    }
}

/// Marks an engine as having a worker in flight until dropped.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<InFlight> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(Arc::clone(flag)))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn panicked(id: &EngineId, payload: Box<dyn Any + Send>) -> TafelError {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    TafelError::Panicked {
        engine: id.to_string(),
        message,
    }
}

/// The document must be a readable regular file with the `%PDF-` signature
/// somewhere in its first kilobyte, as PDF readers accept leading junk.
pub fn check_document(path: &Path) -> Result<(), TafelError> {
    let fail = |reason: String| TafelError::Document {
        path: path.to_path_buf(),
        reason,
    };

    let meta = std::fs::metadata(path).map_err(|e| fail(e.to_string()))?;
    if !meta.is_file() {
        return Err(fail("not a regular file".into()));
    }

    let file = std::fs::File::open(path).map_err(|e| fail(e.to_string()))?;
    let mut head = Vec::with_capacity(SIGNATURE_WINDOW as usize);
    file.take(SIGNATURE_WINDOW)
        .read_to_end(&mut head)
        .map_err(|e| fail(e.to_string()))?;

    if head.is_empty() {
        return Err(fail("file is empty".into()));
    }
    if !head.windows(PDF_SIGNATURE.len()).any(|w| w == PDF_SIGNATURE) {
        return Err(fail("missing %PDF- signature".into()));
    }
    Ok(())
}
