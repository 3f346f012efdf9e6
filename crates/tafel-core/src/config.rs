use crate::engines::bbox::BboxSettings;
use crate::engines::camelot::{CamelotFlavor, CamelotSettings};
use crate::engines::docling::DoclingSettings;
use crate::engines::layout::LayoutSettings;
use crate::engines::tesseract::TesseractSettings;
use crate::error::TafelError;
use crate::fallback::DEFAULT_FALLBACK_ORDER;
use crate::orchestrator::DEFAULT_COMPARE_PAIR;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// On-disk TOML configuration.
/// All fields are optional so partial configs work (merged with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub run: Option<RunConfig>,
    pub compare: Option<CompareConfig>,
    pub fallback: Option<FallbackConfig>,
    pub pdftotext: Option<PdftotextConfig>,
    #[serde(rename = "pdftotext-bbox")]
    pub bbox: Option<BboxConfig>,
    pub tesseract: Option<TesseractConfig>,
    pub docling: Option<DoclingConfig>,
    pub camelot: Option<CamelotConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    pub engines: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompareConfig {
    pub engines: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackConfig {
    pub order: Option<Vec<String>>,
    pub min_rows: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PdftotextConfig {
    pub gap: Option<f32>,
    pub min_words: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BboxConfig {
    pub cell_gap: Option<f32>,
    pub column_tolerance: Option<f32>,
    pub min_columns: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TesseractConfig {
    pub languages: Option<Vec<String>>,
    pub dpi: Option<u32>,
    pub min_confidence: Option<f32>,
    pub row_tolerance: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoclingConfig {
    pub binary: Option<String>,
    pub min_columns: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamelotConfig {
    pub binary: Option<String>,
    pub flavor: Option<String>,
}

/// Platform config path: `<config_dir>/tafel/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tafel").join("config.toml"))
}

/// Load config by cascading CWD `.tafel.toml` over the platform config.
/// CWD values override platform values field by field.
pub fn load_config() -> Result<ConfigFile, TafelError> {
    let platform = match config_path() {
        Some(p) => load_from_path(&p)?,
        None => None,
    };
    let cwd = load_from_path(Path::new(".tafel.toml"))?;

    Ok(match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    })
}

/// Load a config file. A missing file is `Ok(None)`; a file that exists but
/// cannot be read or parsed is an error.
pub fn load_from_path(path: &Path) -> Result<Option<ConfigFile>, TafelError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(TafelError::ConfigLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    };
    parse_config(&content, path).map(Some)
}

/// Load a config file the user named explicitly; it must exist.
pub fn load_explicit(path: &Path) -> Result<ConfigFile, TafelError> {
    load_from_path(path)?.ok_or_else(|| TafelError::ConfigLoad {
        path: path.to_path_buf(),
        reason: "file not found".into(),
    })
}

pub fn parse_config(toml_str: &str, source: &Path) -> Result<ConfigFile, TafelError> {
    toml::from_str(toml_str).map_err(|e| TafelError::ConfigLoad {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        run: section(base.run, overlay.run, |b, o| RunConfig {
            engines: o.engines.or(b.engines),
            timeout_secs: o.timeout_secs.or(b.timeout_secs),
        }),
        compare: section(base.compare, overlay.compare, |b, o| CompareConfig {
            engines: o.engines.or(b.engines),
        }),
        fallback: section(base.fallback, overlay.fallback, |b, o| FallbackConfig {
            order: o.order.or(b.order),
            min_rows: o.min_rows.or(b.min_rows),
        }),
        pdftotext: section(base.pdftotext, overlay.pdftotext, |b, o| PdftotextConfig {
            gap: o.gap.or(b.gap),
            min_words: o.min_words.or(b.min_words),
        }),
        bbox: section(base.bbox, overlay.bbox, |b, o| BboxConfig {
            cell_gap: o.cell_gap.or(b.cell_gap),
            column_tolerance: o.column_tolerance.or(b.column_tolerance),
            min_columns: o.min_columns.or(b.min_columns),
        }),
        tesseract: section(base.tesseract, overlay.tesseract, |b, o| TesseractConfig {
            languages: o.languages.or(b.languages),
            dpi: o.dpi.or(b.dpi),
            min_confidence: o.min_confidence.or(b.min_confidence),
            row_tolerance: o.row_tolerance.or(b.row_tolerance),
        }),
        docling: section(base.docling, overlay.docling, |b, o| DoclingConfig {
            binary: o.binary.or(b.binary),
            min_columns: o.min_columns.or(b.min_columns),
        }),
        camelot: section(base.camelot, overlay.camelot, |b, o| CamelotConfig {
            binary: o.binary.or(b.binary),
            flavor: o.flavor.or(b.flavor),
        }),
    }
}

fn section<T>(base: Option<T>, overlay: Option<T>, combine: impl FnOnce(T, T) -> T) -> Option<T> {
    match (base, overlay) {
        (None, None) => None,
        (Some(b), None) => Some(b),
        (None, Some(o)) => Some(o),
        (Some(b), Some(o)) => Some(combine(b, o)),
    }
}

/// Fully resolved settings with defaults applied.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Engines used when the caller selects none. Empty means all registered.
    pub engines: Vec<String>,
    pub timeout: Option<Duration>,
    pub compare_engines: Vec<String>,
    pub fallback_order: Vec<String>,
    pub fallback_min_rows: Option<usize>,
    pub layout: LayoutSettings,
    pub bbox: BboxSettings,
    pub tesseract: TesseractSettings,
    pub docling: DoclingSettings,
    pub camelot: CamelotSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            engines: Vec::new(),
            timeout: None,
            compare_engines: DEFAULT_COMPARE_PAIR.iter().map(|s| s.to_string()).collect(),
            fallback_order: DEFAULT_FALLBACK_ORDER.iter().map(|s| s.to_string()).collect(),
            fallback_min_rows: None,
            layout: LayoutSettings::default(),
            bbox: BboxSettings::default(),
            tesseract: TesseractSettings::default(),
            docling: DoclingSettings::default(),
            camelot: CamelotSettings::default(),
        }
    }
}

impl Settings {
    pub fn from_config(config: &ConfigFile) -> Result<Settings, TafelError> {
        let mut s = Settings::default();

        if let Some(run) = &config.run {
            if let Some(engines) = &run.engines {
                s.engines = engines.clone();
            }
            s.timeout = match run.timeout_secs {
                Some(0) | None => None,
                Some(secs) => Some(Duration::from_secs(secs)),
            };
        }
        if let Some(engines) = config.compare.as_ref().and_then(|c| c.engines.clone()) {
            s.compare_engines = engines;
        }
        if let Some(fallback) = &config.fallback {
            if let Some(order) = &fallback.order {
                s.fallback_order = order.clone();
            }
            s.fallback_min_rows = fallback.min_rows;
        }

        if let Some(c) = &config.pdftotext {
            if let Some(gap) = c.gap {
                s.layout.gap = positive("pdftotext.gap", gap)?;
            }
            if let Some(min_words) = c.min_words {
                s.layout.min_words = at_least_one("pdftotext.min_words", min_words)?;
            }
        }
        if let Some(c) = &config.bbox {
            if let Some(gap) = c.cell_gap {
                s.bbox.cell_gap = positive("pdftotext-bbox.cell_gap", gap)?;
            }
            if let Some(tol) = c.column_tolerance {
                s.bbox.column_tolerance = positive("pdftotext-bbox.column_tolerance", tol)?;
            }
            if let Some(min) = c.min_columns {
                s.bbox.min_columns = at_least_one("pdftotext-bbox.min_columns", min)?;
            }
        }
        if let Some(c) = &config.tesseract {
            if let Some(languages) = &c.languages {
                if languages.is_empty() {
                    return Err(invalid("tesseract.languages", "must not be empty"));
                }
                s.tesseract.languages = languages.clone();
            }
            if let Some(dpi) = c.dpi {
                if dpi == 0 {
                    return Err(invalid("tesseract.dpi", "must be greater than zero"));
                }
                s.tesseract.dpi = dpi;
            }
            if let Some(conf) = c.min_confidence {
                if !(0.0..=1.0).contains(&conf) {
                    return Err(invalid("tesseract.min_confidence", "must be between 0 and 1"));
                }
                s.tesseract.min_confidence = conf;
            }
            if let Some(tol) = c.row_tolerance {
                s.tesseract.row_tolerance = positive("tesseract.row_tolerance", tol)?;
            }
        }
        if let Some(c) = &config.docling {
            if let Some(binary) = &c.binary {
                s.docling.binary = binary.clone();
            }
            if let Some(min) = c.min_columns {
                s.docling.min_columns = at_least_one("docling.min_columns", min)?;
            }
        }
        if let Some(c) = &config.camelot {
            if let Some(binary) = &c.binary {
                s.camelot.binary = binary.clone();
            }
            if let Some(flavor) = &c.flavor {
                s.camelot.flavor = CamelotFlavor::parse(flavor).ok_or_else(|| {
                    invalid(
                        "camelot.flavor",
                        &format!("'{flavor}' (expected 'lattice' or 'stream')"),
                    )
                })?;
            }
        }

        Ok(s)
    }
}

fn invalid(key: &str, reason: &str) -> TafelError {
    TafelError::InvalidSetting {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn positive(key: &str, value: f32) -> Result<f32, TafelError> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(invalid(key, "must be a positive number"))
    }
}

fn at_least_one(key: &str, value: usize) -> Result<usize, TafelError> {
    if value >= 1 {
        Ok(value)
    } else {
        Err(invalid(key, "must be at least 1"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> ConfigFile {
        parse_config(s, Path::new("test.toml")).unwrap()
    }

    #[test]
    fn test_empty_config_gives_defaults() {
        let settings = Settings::from_config(&ConfigFile::default()).unwrap();
        assert!(settings.engines.is_empty());
        assert!(settings.timeout.is_none());
        assert_eq!(settings.compare_engines, vec!["pdftotext", "pdftotext-bbox"]);
        assert_eq!(settings.fallback_order, vec!["pdftotext-bbox", "pdftotext"]);
        assert_eq!(settings.layout, LayoutSettings::default());
    }

    #[test]
    fn test_sections_resolve() {
        let cfg = parse(
            r#"
[run]
engines = ["camelot"]
timeout_secs = 30

[pdftotext]
gap = 4.0

[pdftotext-bbox]
min_columns = 3

[tesseract]
languages = ["eng"]
dpi = 300

[camelot]
flavor = "stream"
"#,
        );
        let s = Settings::from_config(&cfg).unwrap();
        assert_eq!(s.engines, vec!["camelot"]);
        assert_eq!(s.timeout, Some(Duration::from_secs(30)));
        assert_eq!(s.layout.gap, 4.0);
        assert_eq!(s.layout.min_words, 2);
        assert_eq!(s.bbox.min_columns, 3);
        assert_eq!(s.tesseract.languages, vec!["eng"]);
        assert_eq!(s.tesseract.dpi, 300);
        assert_eq!(s.camelot.flavor, CamelotFlavor::Stream);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cfg = parse("[camelot]\nflavor = \"grid\"\n");
        let err = Settings::from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("camelot.flavor"));
        assert!(err.is_configuration());

        let cfg = parse("[tesseract]\nmin_confidence = 1.5\n");
        assert!(Settings::from_config(&cfg).is_err());

        let cfg = parse("[pdftotext]\nmin_words = 0\n");
        assert!(Settings::from_config(&cfg).is_err());
    }

    #[test]
    fn test_merge_field_level() {
        let base = parse("[pdftotext]\ngap = 3.0\nmin_words = 4\n[run]\ntimeout_secs = 10\n");
        let overlay = parse("[pdftotext]\ngap = 5.0\n");
        let merged = merge(base, overlay);
        let pdftotext = merged.pdftotext.unwrap();
        assert_eq!(pdftotext.gap, Some(5.0));
        assert_eq!(pdftotext.min_words, Some(4));
        assert_eq!(merged.run.unwrap().timeout_secs, Some(10));
    }

    #[test]
    fn test_load_from_path_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_from_path(&dir.path().join("nope.toml")).unwrap().is_none());
        assert!(load_explicit(&dir.path().join("nope.toml")).is_err());
    }

    #[test]
    fn test_load_from_path_malformed_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[run\nengines = ").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, TafelError::ConfigLoad { .. }));
    }
}
