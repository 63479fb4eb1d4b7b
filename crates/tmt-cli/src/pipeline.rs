//! The conversion run.
//!
//! ```text
//! template ─┐
//! archive ──► extract ──► locate ──► assemble ──► dedupe ──► validate ──► finalize ──► write
//!              (temp dir, removed on every exit path)
//! ```
//!
//! Nothing is written until every stage has succeeded.

use crate::config::AppConfig;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tmt_codesystem::{
    dedupe_concepts, finalize_document, validate_references, CodeSystemDocument, EntityKind,
    ValidationOutcome, ValidationReport,
};
use tmt_ingest::{
    assemble_concepts, extract_archive, resolve_all_sources, DistributionLayout, KindSummary,
    TabularSource,
};

/// Where the extracted release lives for the duration of one run.
///
/// When the archive had to be unpacked, the temporary directory is deleted
/// when this value is dropped, whether the run succeeded or not.
pub struct ExtractionWorkspace {
    root: PathBuf,
    temp: Option<TempDir>,
}

impl ExtractionWorkspace {
    /// Unpacks `archive` into a fresh temporary directory.
    pub fn extract(archive: &Path) -> Result<Self> {
        let temp = tempfile::Builder::new()
            .prefix("tmt-extract-")
            .tempdir()
            .context("failed to create temporary extraction directory")?;
        let root = temp.path().to_path_buf();
        // Own the directory before extracting so a failed extraction is cleaned too.
        let workspace = Self {
            root,
            temp: Some(temp),
        };
        extract_archive(archive, &workspace.root)?;
        Ok(workspace)
    }

    /// Uses an already extracted release; nothing is deleted afterwards.
    pub fn existing(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(anyhow!(
                "extracted release directory not found: {}",
                root.display()
            ));
        }
        Ok(Self {
            root: root.to_path_buf(),
            temp: None,
        })
    }

    pub fn open(config: &AppConfig, extracted_dir: Option<&Path>) -> Result<Self> {
        match extracted_dir {
            Some(dir) => Self::existing(dir),
            None => Self::extract(&config.archive_path()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }
}

impl Drop for ExtractionWorkspace {
    fn drop(&mut self) {
        let Some(temp) = self.temp.take() else {
            return;
        };
        let path = temp.path().to_path_buf();
        match temp.close() {
            Ok(()) => tracing::debug!(path = %path.display(), "removed extraction directory"),
            Err(err) => tracing::warn!(
                path = %path.display(),
                "failed to remove extraction directory: {err}"
            ),
        }
    }
}

/// What a successful build produced.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub output_path: PathBuf,
    pub report_path: Option<PathBuf>,
    pub summaries: Vec<KindSummary>,
    pub duplicates_removed: usize,
    pub concept_count: usize,
    pub validation: ValidationOutcome,
}

/// Writes `value` as pretty JSON via a sibling temp file and a rename, so a
/// reader never sees a half-written document.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    write_text_atomic(path, &json)
}

/// Temp file + rename. The temp file is removed again if either step fails.
fn write_text_atomic(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    let written = fs::write(&tmp, text)
        .with_context(|| format!("failed to write {}", tmp.display()))
        .and_then(|()| {
            fs::rename(&tmp, path).with_context(|| format!("failed to write {}", path.display()))
        });
    if written.is_err() && tmp.exists() {
        if let Err(err) = fs::remove_file(&tmp) {
            tracing::warn!(path = %tmp.display(), "failed to remove temp file: {err}");
        }
    }
    written
}

fn load_template(config: &AppConfig) -> Result<CodeSystemDocument> {
    let path = &config.input.template;
    if !path.is_file() {
        return Err(anyhow!("template not found: {}", path.display()));
    }
    Ok(CodeSystemDocument::load(path)?)
}

/// Full conversion of one release.
pub fn run_build(
    config: &AppConfig,
    reader: &dyn TabularSource,
    extracted_dir: Option<&Path>,
) -> Result<BuildOutcome> {
    let template = load_template(config)?;

    let workspace = ExtractionWorkspace::open(config, extracted_dir)?;
    let layout = DistributionLayout::discover(workspace.root(), &config.version)?;
    let assembly = assemble_concepts(&layout, reader)
        .with_context(|| format!("failed to assemble release {}", config.version))?;
    drop(workspace);

    let mut concepts = assembly.concepts;
    let duplicates_removed = dedupe_concepts(&mut concepts);
    let validation = validate_references(
        &mut concepts,
        config.validation.cleanup_invalid_references,
    );
    let concept_count = concepts.len();
    let document = finalize_document(template, &config.version, concepts);

    // Both documents are serialized before either is written.
    let report = if config.validation.generate_report && !validation.valid {
        let report = ValidationReport::new(&config.version, validation.clone());
        Some((config.report_path(), serde_json::to_string_pretty(&report)?))
    } else {
        None
    };
    let output_json = document.to_json_pretty()?;

    let report_path = match report {
        Some((path, json)) => {
            write_text_atomic(&path, &json)?;
            tracing::info!(path = %path.display(), "wrote validation report");
            Some(path)
        }
        None => None,
    };

    let output_path = config.output_path();
    if let Err(err) = write_text_atomic(&output_path, &output_json) {
        if let Some(path) = &report_path {
            if let Err(remove_err) = fs::remove_file(path) {
                tracing::warn!(path = %path.display(), "failed to remove report: {remove_err}");
            }
        }
        return Err(err);
    }
    tracing::info!(path = %output_path.display(), concepts = concept_count, "wrote CodeSystem");

    Ok(BuildOutcome {
        output_path,
        report_path,
        summaries: assembly.summaries,
        duplicates_removed,
        concept_count,
        validation,
    })
}

/// Source files resolved for one kind, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocateEntry {
    pub kind: EntityKind,
    /// `(role, file name)` pairs, or the error explaining what is missing.
    pub files: std::result::Result<Vec<(String, String)>, String>,
}

/// Reports which file would be used for every role of every kind.
pub fn run_locate(config: &AppConfig, extracted_dir: Option<&Path>) -> Result<Vec<LocateEntry>> {
    let workspace = ExtractionWorkspace::open(config, extracted_dir)?;
    let layout = DistributionLayout::discover(workspace.root(), &config.version)?;

    let file_name = |p: &Path| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    };
    let entries = EntityKind::PROCESSING_ORDER
        .into_iter()
        .zip(resolve_all_sources(&layout))
        .map(|(kind, resolved)| LocateEntry {
            kind,
            files: resolved
                .map(|sources| {
                    let mut files = vec![("entity table".to_string(), file_name(sources.entity.as_path()))];
                    files.extend(
                        sources
                            .relationships
                            .iter()
                            .map(|(rel, path)| (rel.role(), file_name(path.as_path()))),
                    );
                    files
                })
                .map_err(|e| e.to_string()),
        })
        .collect();
    Ok(entries)
}

/// Re-validates an existing CodeSystem document.
///
/// With cleanup enabled the cleaned document is written back to `document`;
/// the report (when enabled and needed) goes next to it.
pub fn run_validate(config: &AppConfig, document: &Path) -> Result<(ValidationOutcome, Option<PathBuf>)> {
    let mut doc = CodeSystemDocument::load(document)?;
    let cleanup = config.validation.cleanup_invalid_references;
    let outcome = validate_references(&mut doc.concept, cleanup);

    let report_path = if config.validation.generate_report && !outcome.valid {
        let name = config
            .validation
            .report_file_name
            .replace("{version}", &doc.version);
        let path = document.parent().unwrap_or(Path::new(".")).join(name);
        write_json_atomic(&path, &ValidationReport::new(&doc.version, outcome.clone()))?;
        Some(path)
    } else {
        None
    };

    if cleanup && outcome.stats.removed_count > 0 {
        write_json_atomic(document, &doc)?;
        tracing::info!(
            path = %document.display(),
            removed = outcome.stats.removed_count,
            "rewrote document without dangling references"
        );
    }
    Ok((outcome, report_path))
}
