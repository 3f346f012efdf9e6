use std::path::Path;
use tafel_core::discover_pdfs;
use tafel_core::error::TafelError;
use tafel_core::export::{self, run_to_workbook};

use super::Context;

pub fn run(
    ctx: &Context,
    input_dir: &Path,
    output_dir: &Path,
    engines: &[String],
    excel: bool,
) -> Result<(), TafelError> {
    let pdfs = discover_pdfs(input_dir)?;
    std::fs::create_dir_all(output_dir)?;

    let runs = ctx.orchestrator.run_batch(&pdfs, &ctx.engine_ids(engines))?;

    let mut failed = 0;
    for run in &runs {
        let stem = run
            .document
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".into());

        if let Some(error) = &run.error {
            failed += 1;
            eprintln!("  {}: {error}", run.document.display());
        }

        let json_path = output_dir.join(format!("{stem}.json"));
        export::write_json(&json_path, std::slice::from_ref(run))?;
        if excel {
            run_to_workbook(run).save(&output_dir.join(format!("{stem}.xlsx")))?;
        }
        tracing::info!(document = %run.document.display(), "results written");
    }

    eprintln!(
        "Processed {} document(s), {} unreadable, results in {}",
        runs.len(),
        failed,
        output_dir.display()
    );
    Ok(())
}
