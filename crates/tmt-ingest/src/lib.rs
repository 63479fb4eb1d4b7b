//! TMT release ingestion
//!
//! Turns an extracted TMT distribution into CodeSystem concepts:
//! - [`archive`]: unzip `TMTRF<version>.zip` and find the release folders
//! - [`tabular`]: spreadsheet → rows of cell text
//! - [`locate`]: file-name rules for entity and relationship tables
//! - [`kinds`]: per-kind table of entity source + relationship links
//! - [`processor`]: the generic per-kind concept builder
//! - [`assemble`]: runs every kind in release order
//!
//! **Error policy**: a missing source file is fatal (a corrupted distribution
//! must not produce partial output); an empty row or a self reference is not.

use std::fmt;
use std::path::PathBuf;
use tmt_codesystem::EntityKind;

pub mod archive;
pub mod assemble;
pub mod kinds;
pub mod locate;
pub mod processor;
pub mod tabular;

pub use archive::*;
pub use assemble::*;
pub use kinds::*;
pub use locate::*;
pub use processor::*;
pub use tabular::*;

/// A required source file that could not be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingFile {
    /// What the file is for, e.g. `entity table` or `relationship gptotp`.
    pub role: String,
    /// The matching rule that found nothing.
    pub rule: String,
    pub directory: PathBuf,
    /// File names actually present in `directory` (`None` if it does not exist).
    pub present: Option<Vec<String>>,
}

impl fmt::Display for MissingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (rule `{}`) in {}",
            self.role,
            self.rule,
            self.directory.display()
        )?;
        match &self.present {
            None => write!(f, " [directory does not exist]"),
            Some(names) if names.is_empty() => write!(f, " [directory is empty]"),
            Some(names) => write!(f, " [present: {}]", names.join(", ")),
        }
    }
}

fn format_missing(missing: &[MissingFile]) -> String {
    missing
        .iter()
        .map(|m| format!("\n  - {m}"))
        .collect::<String>()
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("release archive not found: {path} [present: {}]", .present.join(", "))]
    ArchiveNotFound { path: PathBuf, present: Vec<String> },

    #[error("failed to extract {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("required directory `{expected}` not found under {root} [present: {}]", .present.join(", "))]
    MissingDirectory {
        expected: String,
        root: PathBuf,
        present: Vec<String>,
    },

    #[error("{kind}: required source file(s) not found:{}", format_missing(.missing))]
    MissingFiles {
        kind: EntityKind,
        missing: Vec<MissingFile>,
    },

    #[error("invalid file pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to read spreadsheet {path}: {message}")]
    Spreadsheet { path: PathBuf, message: String },

    #[error("failed to list {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;
