use std::path::{Path, PathBuf};
use tafel_core::error::TafelError;
use tafel_core::export::{self, run_to_workbook};
use tafel_core::tuning::{self, TuningOptions};

use super::Context;
use crate::output;

pub fn run(
    ctx: &Context,
    pdf_file: &Path,
    engines: &[String],
    output_format: &str,
    out: Option<PathBuf>,
    excel: Option<PathBuf>,
    tuning: Option<TuningOptions>,
) -> Result<(), TafelError> {
    let ids = ctx.engine_ids(engines);
    let run = match &tuning {
        Some(options) => tuning::run_tuned(
            &ctx.orchestrator,
            pdf_file,
            &ids,
            ctx.settings.layout,
            options,
        )?,
        None => ctx.orchestrator.run(pdf_file, &ids)?,
    };
    let runs = std::slice::from_ref(&run);

    match output_format {
        "json" => output::json::print_runs(runs)?,
        _ => print!("{}", output::table::format_run(&run)),
    }

    if let Some(path) = out {
        export::write_json(&path, runs)?;
        eprintln!("JSON written to {}", path.display());
    }
    if let Some(path) = excel {
        run_to_workbook(&run).save(&path)?;
        eprintln!("Excel workbook written to {}", path.display());
    }

    Ok(())
}
