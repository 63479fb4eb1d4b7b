//! Run configuration.
//!
//! Loaded once from a JSON file, patched by command-line overrides, then
//! passed by reference through the pipeline and never mutated again.
//!
//! ```json
//! {
//!   "version": "20250407",
//!   "input": { "directory": "input", "template": "template/tmt-codesystem-template.json" },
//!   "output": { "directory": "output", "fileName": "TMT-CodeSystem-{version}.json" },
//!   "validation": { "cleanupInvalidReferences": true, "generateReport": true }
//! }
//! ```
//!
//! Every key is optional. A missing or corrupt file is not fatal: the run
//! continues on defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_VERSION: &str = "20250407";

/// Placeholder replaced by the release version in file names.
const VERSION_PLACEHOLDER: &str = "{version}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Release date `YYYYMMDD`; selects `TMTRF<version>.zip`.
    pub version: String,
    pub input: InputConfig,
    pub output: OutputConfig,
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InputConfig {
    /// Directory holding the release archives.
    pub directory: PathBuf,
    /// CodeSystem template with the `TEMPLATE` seed concept.
    pub template: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationConfig {
    pub cleanup_invalid_references: bool,
    pub generate_report: bool,
    pub report_file_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            input: InputConfig::default(),
            output: OutputConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("input"),
            template: PathBuf::from("template/tmt-codesystem-template.json"),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            file_name: "TMT-CodeSystem-{version}.json".to_string(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            cleanup_invalid_references: true,
            generate_report: true,
            report_file_name: "validation-report-{version}.json".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// [`AppConfig::load`], falling back to defaults (with a warning) when the
    /// file is missing or unusable.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded configuration");
                config
            }
            Err(err) => {
                tracing::warn!("{err:#}; using default configuration");
                Self::default()
            }
        }
    }

    pub fn archive_path(&self) -> PathBuf {
        self.input
            .directory
            .join(tmt_ingest::archive_file_name(&self.version))
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .directory
            .join(self.with_version(&self.output.file_name))
    }

    pub fn report_path(&self) -> PathBuf {
        self.output
            .directory
            .join(self.with_version(&self.validation.report_file_name))
    }

    fn with_version(&self, name: &str) -> String {
        name.replace(VERSION_PLACEHOLDER, &self.version)
    }
}
