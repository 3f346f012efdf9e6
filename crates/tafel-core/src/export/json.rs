use crate::error::TafelError;
use crate::model::{EngineId, EngineResult, ExtractionRun, Outcome};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Build `{document: {engine: {"tables": ...} | {"error": ...}}}`.
///
/// A document that could not be read maps to `{"error": message}` directly.
/// A document that appears more than once keeps every run; later keys get a
/// ` #2`, ` #3`, ... suffix.
pub fn to_value(runs: &[ExtractionRun]) -> Result<Value, TafelError> {
    let mut documents = Map::new();
    for run in runs {
        let key = document_key(&documents, &run.document.display().to_string());
        documents.insert(key, run_value(run)?);
    }
    Ok(Value::Object(documents))
}

fn document_key(documents: &Map<String, Value>, name: &str) -> String {
    if !documents.contains_key(name) {
        return name.to_string();
    }
    let key = (2..)
        .map(|n| format!("{name} #{n}"))
        .find(|candidate| !documents.contains_key(candidate))
        .unwrap_or_else(|| name.to_string());
    tracing::warn!(document = name, key = %key, "document exported more than once");
    key
}

/// The per-engine object for a single run.
pub fn run_value(run: &ExtractionRun) -> Result<Value, TafelError> {
    if let Some(error) = &run.error {
        let mut map = Map::new();
        map.insert("error".into(), Value::String(error.clone()));
        return Ok(Value::Object(map));
    }

    let mut engines = Map::new();
    for result in &run.results {
        engines.insert(result.engine.to_string(), serde_json::to_value(&result.outcome)?);
    }
    Ok(Value::Object(engines))
}

pub fn to_string_pretty(runs: &[ExtractionRun]) -> Result<String, TafelError> {
    Ok(serde_json::to_string_pretty(&to_value(runs)?)?)
}

pub fn write_json(path: &Path, runs: &[ExtractionRun]) -> Result<(), TafelError> {
    std::fs::write(path, to_string_pretty(runs)?)?;
    tracing::info!(path = %path.display(), documents = runs.len(), "wrote JSON");
    Ok(())
}

/// Parse the structure produced by [`to_value`] back into runs.
pub fn read_json_document(json: &str) -> Result<Vec<ExtractionRun>, TafelError> {
    let value: Value = serde_json::from_str(json)?;
    let Value::Object(documents) = value else {
        return Err(invalid("expected an object keyed by document"));
    };

    let mut runs = Vec::with_capacity(documents.len());
    for (document, entry) in documents {
        let Value::Object(engines) = entry else {
            return Err(invalid(&format!("entry for {document} is not an object")));
        };

        // A document-level failure is the only place a bare string appears.
        if let Some(Value::String(error)) = engines.get("error") {
            runs.push(ExtractionRun {
                document: PathBuf::from(document),
                error: Some(error.clone()),
                results: Vec::new(),
            });
            continue;
        }

        let mut results = Vec::with_capacity(engines.len());
        for (engine, outcome) in engines {
            let outcome: Outcome = serde_json::from_value(outcome)?;
            results.push(EngineResult {
                engine: EngineId::new(engine),
                outcome,
            });
        }
        runs.push(ExtractionRun {
            document: PathBuf::from(document),
            error: None,
            results,
        });
    }
    Ok(runs)
}

fn invalid(message: &str) -> TafelError {
    TafelError::Json(<serde_json::Error as serde::de::Error>::custom(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Table;

    #[test]
    fn test_shape() {
        let runs = vec![
            ExtractionRun {
                document: "a.pdf".into(),
                error: None,
                results: vec![
                    EngineResult::success("pdftotext".into(), vec![Table::from_strs(&[&["x", "y"]])]),
                    EngineResult::failure("camelot".into(), "camelot not found"),
                ],
            },
            ExtractionRun {
                document: "b.pdf".into(),
                error: Some("missing %PDF- signature".into()),
                results: vec![],
            },
        ];

        let value = to_value(&runs).unwrap();
        assert_eq!(value["a.pdf"]["pdftotext"]["tables"][0][0][1], "y");
        assert_eq!(value["a.pdf"]["camelot"]["error"], "camelot not found");
        assert_eq!(value["b.pdf"]["error"], "missing %PDF- signature");

        let keys: Vec<&String> = value["a.pdf"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["pdftotext", "camelot"]);
    }

    #[test]
    fn test_repeated_document_keeps_every_run() {
        let run = |table: &str| ExtractionRun {
            document: "same.pdf".into(),
            error: None,
            results: vec![EngineResult::success(
                "pdftotext".into(),
                vec![Table::from_strs(&[&[table]])],
            )],
        };
        let runs = vec![run("first"), run("second"), run("third")];

        let value = to_value(&runs).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["same.pdf", "same.pdf #2", "same.pdf #3"]);
        assert_eq!(value["same.pdf #2"]["pdftotext"]["tables"][0][0][0], "second");

        let back = read_json_document(&to_string_pretty(&runs).unwrap()).unwrap();
        assert_eq!(back.len(), 3);
    }

    #[test]
    fn test_read_rejects_non_object() {
        assert!(read_json_document("[1, 2]").is_err());
        assert!(read_json_document("{\"a.pdf\": 3}").is_err());
    }
}
