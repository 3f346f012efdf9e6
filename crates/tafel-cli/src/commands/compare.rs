use std::path::Path;
use tafel_core::error::TafelError;

use super::Context;
use crate::output;

pub fn run(
    ctx: &Context,
    pdf_file: &Path,
    engines: &[String],
    output_format: &str,
) -> Result<(), TafelError> {
    let ids: Vec<&str> = engines.iter().map(String::as_str).collect();
    let comparison = ctx.orchestrator.compare(pdf_file, &ids)?;

    match output_format {
        "json" => output::json::print_comparison(&comparison)?,
        _ => print!("{}", output::table::format_comparison(&comparison)),
    }
    Ok(())
}
