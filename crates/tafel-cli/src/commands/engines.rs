use tafel_core::error::TafelError;

use super::Context;

pub fn run(ctx: &Context, check: bool) -> Result<(), TafelError> {
    let ids = ctx.orchestrator.list_engines();
    if !check {
        for id in &ids {
            println!("{id}");
        }
        return Ok(());
    }

    let width = ids.iter().map(|id| id.as_str().len()).max().unwrap_or(0);
    for id in &ids {
        let status = match ctx.orchestrator.registry().resolve(id.as_str()) {
            Ok(_) => "ok".to_string(),
            Err(e) => e.to_string(),
        };
        println!("{:<width$}  {status}", id.as_str());
    }
    Ok(())
}
