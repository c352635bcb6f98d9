use std::io;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};
use walkdir::WalkDir;

use super::{ScanFailure, ScanOptions};
use crate::config::UnreadablePolicy;
use crate::copy::is_partial_artifact;
use crate::error::{Error, Result};
use crate::record::FileRecord;

/// Recursively collects regular files under one collection entry.
/// Symlinks are not followed. Unreadable paths are handled per
/// [`ScanOptions::on_unreadable`].
pub fn walk_entry(
    root: &Path,
    entry: &Path,
    options: &ScanOptions,
) -> Result<(Vec<FileRecord>, Vec<ScanFailure>)> {
    let mut records = Vec::new();
    let mut failures = Vec::new();
    let mut walker = WalkDir::new(entry).follow_links(false).into_iter();

    while let Some(item) = walker.next() {
        let dirent = match item {
            Ok(dirent) => dirent,
            Err(err) => {
                let path = err.path().unwrap_or(entry).to_path_buf();
                unreadable(options, path, err.into(), &mut failures)?;
                continue;
            }
        };

        let relative = match dirent.path().strip_prefix(root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => continue,
        };

        if options.is_ignored(&relative) {
            trace!("Ignoring {}", relative.display());
            if dirent.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }

        if !dirent.file_type().is_file() {
            continue;
        }
        if is_partial_artifact(dirent.file_name()) {
            continue;
        }

        let metadata = match dirent.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                unreadable(options, dirent.path().to_path_buf(), err.into(), &mut failures)?;
                continue;
            }
        };

        records.push(FileRecord::new(
            relative,
            dirent.path().to_path_buf(),
            metadata.len(),
        ));
    }

    Ok((records, failures))
}

fn unreadable(
    options: &ScanOptions,
    path: PathBuf,
    err: io::Error,
    failures: &mut Vec<ScanFailure>,
) -> Result<()> {
    match options.on_unreadable {
        UnreadablePolicy::Abort => Err(Error::io(path, err)),
        UnreadablePolicy::Skip => {
            warn!("Skipping unreadable path {}: {}", path.display(), err);
            failures.push(ScanFailure {
                path,
                message: err.to_string(),
            });
            Ok(())
        }
    }
}
