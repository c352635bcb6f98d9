use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::matcher::{self, MatchError};
use crate::progress::ProgressReporter;
use crate::record::FileRecord;
use crate::scanner::{self, ScanOptions, ScanOutcome};
use crate::session::{RenameOperation, Session};

#[derive(Debug, Default)]
pub struct RenameReport {
    pub checked: usize,
    /// Primary files whose relative path already exists in backup.
    pub identical_already: usize,
    pub renamed: usize,
    /// No datetime token, so no way to correlate.
    pub undetermined: usize,
    pub no_match: usize,
    pub ambiguous: usize,
    /// One line per unmatched or ambiguous file.
    pub diagnostics: Vec<String>,
    pub errors: Vec<String>,
    pub cancelled: bool,
}

impl RenameReport {
    pub fn ambiguous_or_no_match(&self) -> usize {
        self.ambiguous + self.no_match
    }
}

/// Backup files still available as rename sources, grouped by relative parent.
struct BackupIndex {
    paths: HashSet<PathBuf>,
    by_parent: HashMap<PathBuf, Vec<FileRecord>>,
}

impl BackupIndex {
    /// Backup files whose relative path also exists in primary are already
    /// claimed and never offered as candidates.
    fn build(backup: Vec<FileRecord>, primary: &[FileRecord]) -> Self {
        let primary_paths: HashSet<&Path> = primary.iter().map(|r| r.relative.as_path()).collect();
        let paths = backup.iter().map(|r| r.relative.clone()).collect();

        let mut by_parent: HashMap<PathBuf, Vec<FileRecord>> = HashMap::new();
        for record in backup {
            if primary_paths.contains(record.relative.as_path()) {
                continue;
            }
            by_parent
                .entry(record.relative_parent().to_path_buf())
                .or_default()
                .push(record);
        }

        Self { paths, by_parent }
    }

    fn candidates(&self, parent: &Path) -> &[FileRecord] {
        self.by_parent
            .get(parent)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn moved(&mut self, from: &FileRecord, to: &Path) {
        self.paths.remove(&from.relative);
        self.paths.insert(to.to_path_buf());
        if let Some(bucket) = self.by_parent.get_mut(from.relative_parent()) {
            bucket.retain(|r| r.relative != from.relative);
        }
    }
}

/// Renames backup files after their renamed primary counterparts.
pub struct RenamePropagator {
    options: ScanOptions,
}

impl RenamePropagator {
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    /// For every primary file missing from backup under the same relative path,
    /// looks for exactly one identical backup file with the same datetime token in
    /// the same directory and renames it. Each rename is recorded in `session`.
    pub fn propagate(
        &self,
        session: &mut Session,
        primary_root: &Path,
        backup_root: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<RenameReport> {
        let primary = self.scan(primary_root, reporter)?;
        let backup = self.scan(backup_root, reporter)?;

        let mut report = RenameReport::default();
        for failure in primary.failures.iter().chain(backup.failures.iter()) {
            report.errors.push(format!(
                "Error: unreadable {}: {}",
                failure.path.display(),
                failure.message
            ));
        }

        let mut index = BackupIndex::build(backup.records, &primary.records);
        let total = primary.records.len();
        reporter.on_pass_start("rename", total);

        for record in &primary.records {
            if session.is_cancelled() {
                warn!("Rename pass cancelled after {} of {} files", report.checked, total);
                report.cancelled = true;
                report.errors.push(Error::Cancelled.to_string());
                break;
            }
            report.checked += 1;
            self.propagate_one(session, record, backup_root, &mut index, &mut report);
            reporter.on_file_done(report.checked, total);
        }
        reporter.on_pass_complete("rename");

        info!(
            "Rename pass: {} checked, {} same, {} undetermined, {} renamed, {} no match, {} ambiguous, {} errors",
            report.checked,
            report.identical_already,
            report.undetermined,
            report.renamed,
            report.no_match,
            report.ambiguous,
            report.errors.len()
        );
        Ok(report)
    }

    fn propagate_one(
        &self,
        session: &mut Session,
        record: &FileRecord,
        backup_root: &Path,
        index: &mut BackupIndex,
        report: &mut RenameReport,
    ) {
        if index.paths.contains(&record.relative) {
            report.identical_already += 1;
            return;
        }

        let target = backup_root.join(&record.relative);
        let candidates = index.candidates(record.relative_parent());
        let matched = match matcher::find_unique_match(session.comparator(), record, candidates) {
            Ok(found) => found.clone(),
            Err(MatchError::NoToken) => {
                debug!("Undetermined: {}", record.relative.display());
                report.undetermined += 1;
                return;
            }
            Err(err @ MatchError::NoMatch { .. }) => {
                report.no_match += 1;
                report
                    .diagnostics
                    .push(format!("No exact file match: {} ({})", target.display(), err));
                return;
            }
            Err(MatchError::Ambiguous { token, candidates }) => {
                report.ambiguous += 1;
                let names: Vec<String> = candidates
                    .iter()
                    .map(|c| c.display().to_string())
                    .collect();
                report.diagnostics.push(format!(
                    "Ambiguous match for {} (token '{}'): {}",
                    target.display(),
                    token,
                    names.join(", ")
                ));
                return;
            }
            Err(MatchError::Io(err)) => {
                error!("{}", err);
                report.errors.push(format!(
                    "Error: {} while matching {}",
                    err,
                    record.path.display()
                ));
                return;
            }
        };

        match rename_no_clobber(&matched.path, &target) {
            Ok(()) => {
                info!(
                    "Renamed: {} -> {}",
                    matched.path.display(),
                    target.display()
                );
                session.comparator().forget(&matched.path);
                session.record_rename(RenameOperation {
                    old_path: matched.path.clone(),
                    new_path: target,
                });
                index.moved(&matched, &record.relative);
                report.renamed += 1;
            }
            Err(err) => {
                error!("Backup file not renamed: {}: {}", matched.path.display(), err);
                report.errors.push(format!(
                    "Error: Backup file not renamed: {}: {}",
                    matched.path.display(),
                    err
                ));
            }
        }
    }

    fn scan(&self, root: &Path, reporter: &dyn ProgressReporter) -> Result<ScanOutcome> {
        reporter.on_scan_start(root);
        let start = Instant::now();
        let outcome = scanner::scan(root, &self.options)?;
        reporter.on_scan_complete(root, outcome.records.len(), start.elapsed().as_secs_f64());
        Ok(outcome)
    }
}

/// `fs::rename` that refuses to replace anything already at `to`.
fn rename_no_clobber(from: &Path, to: &Path) -> io::Result<()> {
    if fs::symlink_metadata(to).is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", to.display()),
        ));
    }
    fs::rename(from, to)
}
