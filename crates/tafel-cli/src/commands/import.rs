use std::path::{Path, PathBuf};
use tafel_core::error::TafelError;
use tafel_core::fallback::{
    import_directory, import_with_fallback, imports_to_workbook, DocumentImport, FallbackOptions,
};

use super::Context;

pub fn run(
    ctx: &Context,
    input: &Path,
    order: Vec<String>,
    min_rows: Option<usize>,
    excel: Option<PathBuf>,
) -> Result<(), TafelError> {
    let options = FallbackOptions {
        order: if order.is_empty() {
            ctx.settings.fallback_order.clone()
        } else {
            order
        },
        min_rows: min_rows.or(ctx.settings.fallback_min_rows),
    };

    if input.is_dir() {
        let Some(workbook) = excel else {
            return Err(TafelError::InvalidSetting {
                key: "--excel".into(),
                reason: "required when importing a directory".into(),
            });
        };
        let imports = import_directory(&ctx.orchestrator, input, &workbook, &options)?;
        for import in &imports {
            let name = import.document.display();
            match &import.outcome {
                Ok(found) => println!("{name}: {} table(s) via {}", found.tables.len(), found.engine),
                Err(e) => println!("{name}: {e}"),
            }
        }
        eprintln!("Excel workbook written to {}", workbook.display());
        return Ok(());
    }

    let found = import_with_fallback(&ctx.orchestrator, input, &options)?;
    println!("Engine: {}\n", found.engine);
    println!("{}", found.markdown);

    if let Some(path) = excel {
        let imports = [DocumentImport {
            document: input.to_path_buf(),
            outcome: Ok(found),
        }];
        imports_to_workbook(&imports).save(&path)?;
        eprintln!("Excel workbook written to {}", path.display());
    }
    Ok(())
}
