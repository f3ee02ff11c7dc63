use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::assembler::{DEFAULT_LINEWIDTH, MAX_LINEWIDTH};
use crate::domain::{RecordOrder, SourceFormat};
use crate::error::NmrError;
use crate::pipeline::InputSpec;
use crate::registry::SCREENING_PLACEHOLDER_TITLE;
use crate::sink::OutputKind;

pub const DEFAULT_CONFIG_FILE: &str = "nmr-normalize.json";
pub const DEFAULT_DATABASE: &str = "nmr_metabolites.db";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub inputs: Vec<InputEntry>,
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub companion_dir: Option<String>,
    #[serde(default)]
    pub output: Option<OutputEntry>,
    #[serde(default)]
    pub order: Option<RecordOrder>,
    #[serde(default)]
    pub default_linewidth: Option<f64>,
    #[serde(default)]
    pub max_linewidth: Option<f64>,
    #[serde(default)]
    pub placeholder_titles: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum InputEntry {
    Shorthand(String),
    Detailed(InputEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct InputEntryObject {
    pub path: String,
    #[serde(default)]
    pub format: Option<SourceFormat>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OutputEntry {
    #[serde(default)]
    pub kind: Option<OutputKind>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputTarget {
    pub kind: OutputKind,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub inputs: Vec<InputSpec>,
    pub catalog: Option<PathBuf>,
    pub companion_dir: Option<PathBuf>,
    pub output: OutputTarget,
    pub order: RecordOrder,
    pub default_linewidth: f64,
    pub max_linewidth: f64,
    pub placeholder_titles: Vec<String>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            inputs: Vec::new(),
            catalog: None,
            companion_dir: None,
            output: default_output(None),
            order: RecordOrder::default(),
            default_linewidth: DEFAULT_LINEWIDTH,
            max_linewidth: MAX_LINEWIDTH,
            placeholder_titles: default_placeholder_titles(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, NmrError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(NmrError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| NmrError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| NmrError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, NmrError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let inputs = config
            .inputs
            .into_iter()
            .map(|entry| match entry {
                InputEntry::Shorthand(value) => InputSpec {
                    path: PathBuf::from(value),
                    format: None,
                },
                InputEntry::Detailed(obj) => InputSpec {
                    path: PathBuf::from(obj.path),
                    format: obj.format,
                },
            })
            .collect();

        let default_linewidth = config.default_linewidth.unwrap_or(DEFAULT_LINEWIDTH);
        let max_linewidth = config.max_linewidth.unwrap_or(MAX_LINEWIDTH);
        if !(default_linewidth > 0.0 && default_linewidth <= max_linewidth) {
            return Err(NmrError::ConfigParse(format!(
                "default_linewidth {default_linewidth} must be positive and not above max_linewidth {max_linewidth}"
            )));
        }

        Ok(ResolvedConfig {
            schema_version,
            inputs,
            catalog: config.catalog.map(PathBuf::from),
            companion_dir: config.companion_dir.map(PathBuf::from),
            output: default_output(config.output),
            order: config.order.unwrap_or_default(),
            default_linewidth,
            max_linewidth,
            placeholder_titles: config
                .placeholder_titles
                .unwrap_or_else(default_placeholder_titles),
        })
    }
}

fn default_output(entry: Option<OutputEntry>) -> OutputTarget {
    let (kind, path) = match entry {
        Some(entry) => (entry.kind.unwrap_or_default(), entry.path),
        None => (OutputKind::default(), None),
    };
    let path = path.map(PathBuf::from).unwrap_or_else(|| match kind {
        OutputKind::Sqlite => PathBuf::from(DEFAULT_DATABASE),
        OutputKind::Json => PathBuf::from("nmr_tables"),
    });
    OutputTarget { kind, path }
}

pub fn default_placeholder_titles() -> Vec<String> {
    vec![SCREENING_PLACEHOLDER_TITLE.to_string()]
}
