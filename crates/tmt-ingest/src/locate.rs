//! File location inside an extracted release.
//!
//! Release folders are not perfectly consistent about case, so every rule is
//! matched case-insensitively against bare file names. Directory entries are
//! visited in sorted order so that "first match" is deterministic.

use crate::{IngestError, MissingFile, Result};
use regex::RegexBuilder;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// How a required file is recognized by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRule {
    /// Case-insensitive regex over the whole file name.
    Pattern(String),
    /// Case-insensitive substring of the file name.
    Contains(String),
}

impl FileRule {
    pub fn describe(&self) -> String {
        match self {
            FileRule::Pattern(p) => p.clone(),
            FileRule::Contains(s) => format!("*{s}*"),
        }
    }

    fn matcher(&self) -> Result<Box<dyn Fn(&str) -> bool>> {
        match self {
            FileRule::Pattern(pattern) => {
                let re = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| IngestError::Pattern {
                        pattern: pattern.clone(),
                        source,
                    })?;
                Ok(Box::new(move |name| re.is_match(name)))
            }
            FileRule::Contains(needle) => {
                let needle = needle.to_lowercase();
                Ok(Box::new(move |name| name.to_lowercase().contains(&needle)))
            }
        }
    }
}

/// Sorted file names directly inside `dir`, or `None` if `dir` is not a
/// directory.
pub fn list_file_names(dir: &Path) -> Result<Option<Vec<String>>> {
    list_entries(dir, |entry| entry.file_type().is_file())
}

/// Sorted sub-directory names directly inside `dir`.
pub fn list_dir_names(dir: &Path) -> Result<Option<Vec<String>>> {
    list_entries(dir, |entry| entry.file_type().is_dir())
}

fn list_entries(
    dir: &Path,
    keep: impl Fn(&walkdir::DirEntry) -> bool,
) -> Result<Option<Vec<String>>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut names = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| IngestError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        if keep(&entry) {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    Ok(Some(names))
}

/// First file in `dir` whose name satisfies `rule`.
///
/// A missing directory is reported as "not found", not as an error.
pub fn find_file(dir: &Path, rule: &FileRule) -> Result<Option<PathBuf>> {
    let Some(names) = list_file_names(dir)? else {
        return Ok(None);
    };
    let matches = rule.matcher()?;
    let hits: Vec<&String> = names.iter().filter(|n| matches(n)).collect();
    if hits.len() > 1 {
        tracing::warn!(
            dir = %dir.display(),
            rule = %rule.describe(),
            candidates = ?hits,
            "several files match; using the first"
        );
    }
    Ok(hits.first().map(|name| dir.join(name.as_str())))
}

/// Like [`find_file`], but describes the failure for error reporting.
pub fn require_file(
    dir: &Path,
    rule: &FileRule,
    role: &str,
) -> Result<std::result::Result<PathBuf, MissingFile>> {
    if let Some(path) = find_file(dir, rule)? {
        return Ok(Ok(path));
    }
    Ok(Err(MissingFile {
        role: role.to_string(),
        rule: rule.describe(),
        directory: dir.to_path_buf(),
        present: list_file_names(dir)?,
    }))
}

/// `root/name`, matching `name` case-insensitively against existing
/// sub-directories. Falls back to the literal join when nothing matches.
pub fn resolve_subdir(root: &Path, name: &str) -> Result<PathBuf> {
    let found = list_dir_names(root)?
        .unwrap_or_default()
        .into_iter()
        .find(|d| d.eq_ignore_ascii_case(name));
    Ok(root.join(found.as_deref().unwrap_or(name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn entity_pattern_does_not_confuse_prefix_kinds() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "GPP20250407.xls");
        touch(dir.path(), "GPU20250407.xls");
        touch(dir.path(), "gp20250407.XLS");

        let rule = FileRule::Pattern(r"^GP\d{8}\.xls$".to_string());
        let found = find_file(dir.path(), &rule).unwrap().unwrap();
        assert_eq!(found.file_name().unwrap(), "gp20250407.XLS");
    }

    #[test]
    fn substring_rule_is_case_insensitive() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "TMT_GPtoTP20250407.xls");
        touch(dir.path(), "TMT_GPtoGPU20250407.xls");

        let found = find_file(dir.path(), &FileRule::Contains("gptotp".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(found.file_name().unwrap(), "TMT_GPtoTP20250407.xls");
    }

    #[test]
    fn first_sorted_match_wins() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "b_vtmtogp.xls");
        touch(dir.path(), "a_VTMtoGP.xls");

        let found = find_file(dir.path(), &FileRule::Contains("vtmtogp".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(found.file_name().unwrap(), "a_VTMtoGP.xls");
    }

    #[test]
    fn missing_file_lists_directory_contents() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "unrelated.xls");

        let missing = require_file(
            dir.path(),
            &FileRule::Contains("tputotpp".to_string()),
            "relationship tputotpp",
        )
        .unwrap()
        .unwrap_err();
        assert_eq!(missing.present, Some(vec!["unrelated.xls".to_string()]));
        assert!(missing.to_string().contains("unrelated.xls"));
    }

    #[test]
    fn missing_directory_is_not_found() {
        let dir = tempdir().unwrap();
        let gone = dir.path().join("Relationship");
        assert_eq!(
            find_file(&gone, &FileRule::Contains("gptotp".to_string())).unwrap(),
            None
        );
        let missing = require_file(&gone, &FileRule::Contains("gptotp".to_string()), "x")
            .unwrap()
            .unwrap_err();
        assert_eq!(missing.present, None);
    }

    #[test]
    fn subdir_resolution_ignores_case() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("CONCEPT")).unwrap();
        assert_eq!(
            resolve_subdir(dir.path(), "Concept").unwrap(),
            dir.path().join("CONCEPT")
        );
        assert_eq!(
            resolve_subdir(dir.path(), "Relationship").unwrap(),
            dir.path().join("Relationship")
        );
    }
}
