pub mod walk;

use glob::Pattern;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{default_reserved_dir_names, AppConfig, UnreadablePolicy};
use crate::error::{Error, Result};
use crate::record::FileRecord;

/// Rules deciding which parts of a root belong to the collection.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub exclusion_marker: String,
    pub reserved_dir_names: Vec<String>,
    pub ignore_patterns: Vec<Pattern>,
    pub on_unreadable: UnreadablePolicy,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            exclusion_marker: "_".to_string(),
            reserved_dir_names: default_reserved_dir_names(),
            ignore_patterns: Vec::new(),
            on_unreadable: UnreadablePolicy::Skip,
        }
    }
}

impl ScanOptions {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let ignore_patterns = config
            .ignore_patterns
            .iter()
            .map(|glob| {
                Pattern::new(glob).map_err(|source| Error::Pattern {
                    pattern: glob.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            exclusion_marker: config.exclusion_marker.clone(),
            reserved_dir_names: config.reserved_dir_names.clone(),
            ignore_patterns,
            on_unreadable: config.on_unreadable,
        })
    }

    /// Whether an immediate child directory of a root is a collection entry.
    pub fn is_collection_entry(&self, dir_name: &str) -> bool {
        if !self.exclusion_marker.is_empty() && dir_name.starts_with(&self.exclusion_marker) {
            return false;
        }
        !self
            .reserved_dir_names
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(dir_name))
    }

    pub fn is_ignored(&self, relative: &Path) -> bool {
        self.ignore_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative))
    }
}

/// A subtree that could not be read under [`UnreadablePolicy::Skip`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Sorted by relative path.
    pub records: Vec<FileRecord>,
    pub failures: Vec<ScanFailure>,
}

/// Lists the collection entries (immediate child directories) of `root`.
/// Loose files, excluded and reserved directories, and symlinks are left out.
pub fn collection_entries(root: &Path, options: &ScanOptions) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(root).map_err(|e| Error::io(root, e))? {
        let entry = entry.map_err(|e| Error::io(root, e))?;
        let file_type = entry.file_type().map_err(|e| Error::io(entry.path(), e))?;
        if !file_type.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !options.is_collection_entry(&name) {
            debug!("Skipping excluded directory {}", entry.path().display());
            continue;
        }
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

/// Collects every regular file inside the collection entries of `root`.
/// Entries are walked in parallel; the merged list is sorted by relative path.
pub fn scan(root: &Path, options: &ScanOptions) -> Result<ScanOutcome> {
    let entries = collection_entries(root, options)?;
    debug!(
        "Scanning {} collection entries under {}",
        entries.len(),
        root.display()
    );

    let walked = entries
        .par_iter()
        .map(|entry| walk::walk_entry(root, entry, options))
        .collect::<Result<Vec<_>>>()?;

    let mut outcome = ScanOutcome::default();
    for (records, failures) in walked {
        outcome.records.extend(records);
        outcome.failures.extend(failures);
    }
    outcome.records.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(outcome)
}
