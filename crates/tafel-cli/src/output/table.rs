use tafel_core::model::{summarize_tables, Comparison, EngineSummary, ExtractionRun, Outcome};

/// Plain-text rendering of one run: a header per engine followed by its
/// tables, `No tables found`, or the error.
pub fn format_run(run: &ExtractionRun) -> String {
    let mut out = format!("=== {} ===\n\n", run.document.display());

    if let Some(error) = &run.error {
        out.push_str(&format!("  Error: {error}\n"));
        return out;
    }

    for result in &run.results {
        out.push_str(&format!("--- {} ---\n", result.engine));
        match &result.outcome {
            Outcome::Tables(tables) if tables.is_empty() => out.push_str("No tables found\n"),
            Outcome::Tables(tables) => {
                out.push_str(&summarize_tables(tables));
                out.push('\n');
            }
            Outcome::Error(e) => out.push_str(&format!("Error: {e}\n")),
        }
        out.push('\n');
    }
    out
}

pub fn format_comparison(comparison: &Comparison) -> String {
    let mut out = format!("=== {} ===\n\n", comparison.document.display());

    if let Some(error) = &comparison.error {
        out.push_str(&format!("  Error: {error}\n"));
        return out;
    }

    let width = comparison
        .engines
        .iter()
        .map(|c| c.engine.as_str().len())
        .max()
        .unwrap_or(6)
        .max("Engine".len());

    out.push_str(&format!(
        "  {:<width$}  {:>6}  {:>10}\n",
        "Engine", "Tables", "First rows"
    ));
    for entry in &comparison.engines {
        let line = match &entry.summary {
            EngineSummary::Extracted {
                table_count,
                first_table_rows,
            } => format!(
                "  {:<width$}  {:>6}  {:>10}",
                entry.engine.as_str(),
                table_count,
                first_table_rows.map_or("-".to_string(), |r| r.to_string())
            ),
            EngineSummary::Failed { error } => {
                format!("  {:<width$}  error: {error}", entry.engine.as_str())
            }
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}
