use tafel_core::error::TafelError;
use tafel_core::export::json::to_string_pretty;
use tafel_core::model::{Comparison, ExtractionRun};

pub fn print_runs(runs: &[ExtractionRun]) -> Result<(), TafelError> {
    println!("{}", to_string_pretty(runs)?);
    Ok(())
}

pub fn print_comparison(comparison: &Comparison) -> Result<(), TafelError> {
    let json = serde_json::to_string_pretty(comparison)?;
    println!("{json}");
    Ok(())
}
