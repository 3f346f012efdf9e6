//! Search `pdftotext` layout settings so its table count matches a reference
//! engine on the same document.

use crate::engines::layout::{parse_layout, LayoutSettings};
use crate::engines::{PDFTOTEXT, PDFTOTEXT_BBOX};
use crate::error::TafelError;
use crate::model::{EngineId, EngineResult, ExtractionRun, Table};
use crate::orchestrator::Orchestrator;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct TuningOptions {
    /// Engine whose table count is the target.
    pub reference: String,
    /// Extra `min_words` values to try besides the base setting.
    pub min_words: Vec<usize>,
    /// Maximum bisection steps per `min_words` candidate.
    pub max_depth: u32,
    /// Gap interval searched, in characters.
    pub gap_range: (f32, f32),
}

impl Default for TuningOptions {
    fn default() -> Self {
        TuningOptions {
            reference: PDFTOTEXT_BBOX.to_string(),
            min_words: Vec::new(),
            max_depth: 4,
            gap_range: (1.0, 12.0),
        }
    }
}

/// Best settings found and the tables they produce.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuned {
    pub settings: LayoutSettings,
    pub tables: Vec<Table>,
    /// Absolute difference from the reference table count.
    pub score: usize,
}

impl Tuned {
    pub fn label(&self) -> String {
        format!(
            "{PDFTOTEXT} (tuned) [gap={:.2}, min_words={}]",
            self.settings.gap, self.settings.min_words
        )
    }
}

/// Fetch the layout text once and tune against `reference_tables` tables.
///
/// The text comes from the registered `pdftotext` engine and is fetched
/// under the orchestrator's panic isolation and timeout.
pub fn tune_layout(
    orchestrator: &Orchestrator,
    document: &Path,
    base: LayoutSettings,
    reference_tables: usize,
    options: &TuningOptions,
) -> Result<Tuned, TafelError> {
    let path = document.to_path_buf();
    let text = orchestrator.with_engine(&EngineId::from(PDFTOTEXT), move |engine, deadline| {
        let source = engine.layout_source().ok_or_else(|| {
            TafelError::Extraction(format!("engine '{PDFTOTEXT}' does not provide layout text"))
        })?;
        source.layout_text(&path, deadline)
    })?;
    Ok(tune_text(&text, base, reference_tables, options))
}

/// Tune against already extracted layout text.
///
/// Every `min_words` candidate starts from the base gap, so the result never
/// scores worse than `base` itself.
pub fn tune_text(
    text: &str,
    base: LayoutSettings,
    reference_tables: usize,
    options: &TuningOptions,
) -> Tuned {
    let mut candidates = options.min_words.clone();
    candidates.push(base.min_words);
    candidates.sort_unstable();
    candidates.dedup();

    let mut best: Option<Tuned> = None;
    for min_words in candidates {
        let initial = LayoutSettings { min_words, ..base };
        let start = evaluate(text, initial, reference_tables);
        let candidate = bisect_gap(text, initial, reference_tables, options, start);
        tracing::debug!(
            min_words,
            gap = candidate.settings.gap,
            score = candidate.score,
            "tuning candidate"
        );
        if best.as_ref().map_or(true, |b| candidate.score < b.score) {
            best = Some(candidate);
        }
    }

    best.unwrap_or_else(|| evaluate(text, base, reference_tables))
}

fn evaluate(text: &str, settings: LayoutSettings, reference_tables: usize) -> Tuned {
    let tables = parse_layout(text, &settings);
    Tuned {
        score: tables.len().abs_diff(reference_tables),
        settings,
        tables,
    }
}

/// Too many tables means cells are being split too eagerly, so move the gap
/// up; otherwise move it down.
fn bisect_gap(
    text: &str,
    settings: LayoutSettings,
    reference_tables: usize,
    options: &TuningOptions,
    mut best: Tuned,
) -> Tuned {
    let (mut low, mut high) = options.gap_range;
    let mut depth = 0;

    loop {
        let mid = (low + high) / 2.0;
        let trial = evaluate(text, LayoutSettings { gap: mid, ..settings }, reference_tables);
        let count = trial.tables.len();
        let score = trial.score;
        if score < best.score {
            best = trial;
        }

        if score == 0 || depth >= options.max_depth || high - low < 0.25 {
            return best;
        }
        if count > reference_tables {
            low = mid;
        } else {
            high = mid;
        }
        depth += 1;
    }
}

/// Extraction with tuning: the reference engine's result, the tuned
/// `pdftotext` result (labelled with its settings), then the remaining
/// selected engines. The reference engine is not run twice.
pub fn run_tuned(
    orchestrator: &Orchestrator,
    document: &Path,
    ids: &[&str],
    base: LayoutSettings,
    options: &TuningOptions,
) -> Result<ExtractionRun, TafelError> {
    let selected = orchestrator.select(ids)?;
    let mut run = orchestrator.run(document, &[options.reference.as_str()])?;
    if run.is_document_failure() {
        return Ok(run);
    }

    let tuned = match run.results.first().and_then(EngineResult::tables) {
        Some(reference) => match tune_layout(orchestrator, document, base, reference.len(), options) {
            Ok(tuned) => {
                tracing::info!(label = %tuned.label(), score = tuned.score, "tuned layout settings");
                EngineResult::success(EngineId::new(tuned.label()), tuned.tables)
            }
            Err(e) => {
                tracing::warn!(error = %e, "layout tuning failed");
                EngineResult::failure(untuned_label(), e.to_string())
            }
        },
        None => EngineResult::failure(
            untuned_label(),
            format!("reference engine '{}' failed", options.reference),
        ),
    };
    run.results.push(tuned);

    let rest: Vec<&str> = selected
        .iter()
        .map(EngineId::as_str)
        .filter(|id| *id != options.reference)
        .collect();
    if !rest.is_empty() {
        run.results.extend(orchestrator.run(document, &rest)?.results);
    }
    Ok(run)
}

fn untuned_label() -> EngineId {
    EngineId::new(format!("{PDFTOTEXT} (tuned)"))
}
