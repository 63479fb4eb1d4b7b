//! Release archive handling.
//!
//! A release `TMTRF<version>.zip` unpacks to:
//!
//! ```text
//! TMTRF20250407/
//!   TMTRF20250407_SNAPSHOT.xls        (TPU rows)
//! TMTRF20250407_BONUS/
//!   Concept/        SUBS20250407.xls, VTM20250407.xls, ...
//!   Relationship/   ...GPtoTP20250407.xls, ...TPUtoTPP20250407.xls, ...
//! ```
//!
//! Some releases wrap both folders in one more directory, so the two release
//! folders are searched for anywhere below the extraction root.

use crate::locate::{find_file, list_dir_names, list_file_names, resolve_subdir, FileRule};
use crate::{IngestError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const CONCEPT_DIR: &str = "Concept";
pub const RELATIONSHIP_DIR: &str = "Relationship";

/// Name of the TPU snapshot table in the release folder.
pub const SNAPSHOT_PATTERN: &str = r"^.*_SNAPSHOT\.xls$";

pub fn archive_file_name(version: &str) -> String {
    format!("TMTRF{version}.zip")
}

pub fn release_dir_name(version: &str) -> String {
    format!("TMTRF{version}")
}

pub fn bonus_dir_name(version: &str) -> String {
    format!("TMTRF{version}_BONUS")
}

/// Unpacks `archive` into `dest` (created if needed).
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    if !archive.is_file() {
        let parent = archive.parent().unwrap_or(Path::new("."));
        return Err(IngestError::ArchiveNotFound {
            path: archive.to_path_buf(),
            present: list_file_names(parent)?.unwrap_or_default(),
        });
    }

    std::fs::create_dir_all(dest)?;
    let file = File::open(archive)?;
    let archive_err = |source| IngestError::Archive {
        path: archive.to_path_buf(),
        source,
    };
    let mut zip = zip::ZipArchive::new(file).map_err(archive_err)?;
    let entries = zip.len();
    zip.extract(dest).map_err(archive_err)?;
    tracing::info!(
        archive = %archive.display(),
        dest = %dest.display(),
        entries,
        "extracted release archive"
    );
    Ok(())
}

/// The two release folders inside an extracted archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionLayout {
    /// `TMTRF<version>/`, holding the `*_SNAPSHOT.xls`.
    pub tmt_root: PathBuf,
    /// `TMTRF<version>_BONUS/`, holding `Concept/` and `Relationship/`.
    pub bonus_root: PathBuf,
}

impl DistributionLayout {
    pub fn new(tmt_root: impl Into<PathBuf>, bonus_root: impl Into<PathBuf>) -> Self {
        Self {
            tmt_root: tmt_root.into(),
            bonus_root: bonus_root.into(),
        }
    }

    /// Finds both release folders for `version` below `extracted_root`.
    ///
    /// A wrapper folder may carry the same name as the release folder
    /// (`TMTRF<v>/TMTRF<v>/...`), so among same-named candidates the one
    /// holding the `*_SNAPSHOT.xls` wins, and for the bonus folder the one
    /// holding `Concept/`. Otherwise the shallowest candidate is used.
    pub fn discover(extracted_root: &Path, version: &str) -> Result<Self> {
        let tmt_name = release_dir_name(version);
        let bonus_name = bonus_dir_name(version);

        let mut tmt_candidates: Vec<PathBuf> = Vec::new();
        let mut bonus_candidates: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(extracted_root)
            .min_depth(1)
            .max_depth(3)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|source| IngestError::Walk {
                path: extracted_root.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name.eq_ignore_ascii_case(&tmt_name) {
                tmt_candidates.push(entry.path().to_path_buf());
            } else if name.eq_ignore_ascii_case(&bonus_name) {
                bonus_candidates.push(entry.path().to_path_buf());
            }
        }
        // shallowest first; walkdir yields depth-first
        tmt_candidates.sort_by_key(|p| p.components().count());
        bonus_candidates.sort_by_key(|p| p.components().count());

        let snapshot_rule = FileRule::Pattern(SNAPSHOT_PATTERN.to_string());
        let mut tmt_root = None;
        for candidate in &tmt_candidates {
            if find_file(candidate, &snapshot_rule)?.is_some() {
                tmt_root = Some(candidate.clone());
                break;
            }
        }
        let tmt_root = tmt_root.or_else(|| tmt_candidates.first().cloned());

        let mut bonus_root = None;
        for candidate in &bonus_candidates {
            if resolve_subdir(candidate, CONCEPT_DIR)?.is_dir() {
                bonus_root = Some(candidate.clone());
                break;
            }
        }
        let bonus_root = bonus_root.or_else(|| bonus_candidates.first().cloned());

        let missing = |expected: String| -> Result<IngestError> {
            Ok(IngestError::MissingDirectory {
                expected,
                root: extracted_root.to_path_buf(),
                present: list_dir_names(extracted_root)?.unwrap_or_default(),
            })
        };
        let tmt_root = match tmt_root {
            Some(p) => p,
            None => return Err(missing(tmt_name)?),
        };
        let bonus_root = match bonus_root {
            Some(p) => p,
            None => return Err(missing(bonus_name)?),
        };

        tracing::debug!(
            tmt_root = %tmt_root.display(),
            bonus_root = %bonus_root.display(),
            "found release folders"
        );
        Ok(Self {
            tmt_root,
            bonus_root,
        })
    }

    pub fn concept_dir(&self) -> Result<PathBuf> {
        resolve_subdir(&self.bonus_root, CONCEPT_DIR)
    }

    pub fn relationship_dir(&self) -> Result<PathBuf> {
        resolve_subdir(&self.bonus_root, RELATIONSHIP_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    #[test]
    fn names_follow_release_convention() {
        assert_eq!(archive_file_name("20250407"), "TMTRF20250407.zip");
        assert_eq!(bonus_dir_name("20250407"), "TMTRF20250407_BONUS");
    }

    #[test]
    fn extract_then_discover_layout() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("TMTRF20250407.zip");
        {
            let mut zip = zip::ZipWriter::new(File::create(&archive).unwrap());
            let opts = SimpleFileOptions::default();
            zip.start_file("TMTRF20250407/TMTRF20250407_SNAPSHOT.xls", opts)
                .unwrap();
            zip.write_all(b"snapshot").unwrap();
            zip.start_file("TMTRF20250407_BONUS/Concept/GP20250407.xls", opts)
                .unwrap();
            zip.write_all(b"gp").unwrap();
            zip.start_file("TMTRF20250407_BONUS/Relationship/GPtoTP20250407.xls", opts)
                .unwrap();
            zip.write_all(b"gptotp").unwrap();
            zip.finish().unwrap();
        }

        let out = dir.path().join("extracted");
        extract_archive(&archive, &out).unwrap();
        let layout = DistributionLayout::discover(&out, "20250407").unwrap();
        assert_eq!(layout.tmt_root, out.join("TMTRF20250407"));
        assert_eq!(layout.bonus_root, out.join("TMTRF20250407_BONUS"));
        assert!(layout.concept_dir().unwrap().join("GP20250407.xls").is_file());
        assert!(layout
            .relationship_dir()
            .unwrap()
            .join("GPtoTP20250407.xls")
            .is_file());
    }

    #[test]
    fn wrapped_release_folders_are_found() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("release/tmtrf20250407")).unwrap();
        fs::create_dir_all(dir.path().join("release/TMTRF20250407_BONUS/Concept")).unwrap();
        let layout = DistributionLayout::discover(dir.path(), "20250407").unwrap();
        assert_eq!(layout.tmt_root, dir.path().join("release/tmtrf20250407"));
    }

    #[test]
    fn same_named_wrapper_is_skipped_for_the_snapshot_folder() {
        let dir = tempdir().unwrap();
        let outer = dir.path().join("TMTRF20250407");
        let inner = outer.join("TMTRF20250407");
        fs::create_dir_all(&inner).unwrap();
        fs::write(inner.join("TMTRF20250407_SNAPSHOT.xls"), b"").unwrap();
        fs::create_dir_all(outer.join("TMTRF20250407_BONUS/Concept")).unwrap();

        let layout = DistributionLayout::discover(dir.path(), "20250407").unwrap();
        assert_eq!(layout.tmt_root, inner);
        assert_eq!(layout.bonus_root, outer.join("TMTRF20250407_BONUS"));
    }

    #[test]
    fn shallowest_folder_wins_without_a_snapshot() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("TMTRF20250407/TMTRF20250407")).unwrap();
        fs::create_dir_all(dir.path().join("TMTRF20250407_BONUS")).unwrap();
        let layout = DistributionLayout::discover(dir.path(), "20250407").unwrap();
        assert_eq!(layout.tmt_root, dir.path().join("TMTRF20250407"));
    }

    #[test]
    fn missing_bonus_folder_is_reported_with_listing() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("TMTRF20250407")).unwrap();
        fs::create_dir_all(dir.path().join("TMTRF20240101_BONUS")).unwrap();
        let err = DistributionLayout::discover(dir.path(), "20250407").unwrap_err();
        match err {
            IngestError::MissingDirectory {
                expected, present, ..
            } => {
                assert_eq!(expected, "TMTRF20250407_BONUS");
                assert!(present.contains(&"TMTRF20240101_BONUS".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_archive_lists_siblings() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("TMTRF20240101.zip"), b"").unwrap();
        let err = extract_archive(&dir.path().join("TMTRF20250407.zip"), &dir.path().join("x"))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("TMTRF20250407.zip"));
        assert!(msg.contains("TMTRF20240101.zip"));
    }
}
