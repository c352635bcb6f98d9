//! Collision-safe verified copying.
//!
//! Bytes land in a hidden `.collsync-<n>.partial` sibling first and only take
//! the destination name once a BLAKE3 comparison against the source has passed,
//! so an interrupted or corrupted copy never occupies the destination path.

use std::ffi::OsStr;
use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{CopyError, Error, Result};
use crate::hasher::Tier;
use crate::progress::ProgressReporter;
use crate::record::FileRecord;
use crate::scanner::{self, ScanOptions};
use crate::session::Session;

const PARTIAL_PREFIX: &str = ".collsync-";
const PARTIAL_SUFFIX: &str = ".partial";

/// Writes the bytes of one file to another path.
pub trait FileCopier: Send + Sync {
    fn copy(&self, src: &Path, dest: &Path) -> io::Result<u64>;
}

/// Copies bytes, modification time and permissions.
///
/// Permissions are applied last: a read-only source would otherwise leave a
/// copy whose times can no longer be set.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdCopier;

impl FileCopier for StdCopier {
    fn copy(&self, src: &Path, dest: &Path) -> io::Result<u64> {
        let mut reader = File::open(src)?;
        let metadata = reader.metadata()?;

        let mut writer = File::create(dest)?;
        let bytes = io::copy(&mut reader, &mut writer)?;
        writer.set_times(FileTimes::new().set_modified(metadata.modified()?))?;
        writer.sync_all()?;
        drop(writer);

        fs::set_permissions(dest, metadata.permissions())?;
        Ok(bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// Destination already held identical content.
    Skipped,
    CopiedFresh,
    /// A different file occupied the destination and was moved to `moved_to`.
    CopiedAfterRenamingExisting { moved_to: PathBuf },
}

#[derive(Debug, Default)]
pub struct CopyReport {
    pub checked: usize,
    pub copied: usize,
    pub renamed_existing: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub halted_on_disk_full: bool,
    pub cancelled: bool,
}

pub struct CopyEngine {
    copier: Box<dyn FileCopier>,
    collision_suffix: String,
    parallel_hashing: bool,
}

impl Default for CopyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CopyEngine {
    pub fn new() -> Self {
        Self {
            copier: Box::new(StdCopier),
            collision_suffix: "_".to_string(),
            parallel_hashing: false,
        }
    }

    pub fn with_copier(mut self, copier: impl FileCopier + 'static) -> Self {
        self.copier = Box::new(copier);
        self
    }

    pub fn with_collision_suffix(mut self, suffix: &str) -> Self {
        self.collision_suffix = suffix.to_string();
        self
    }

    pub fn with_parallel_hashing(mut self, enabled: bool) -> Self {
        self.parallel_hashing = enabled;
        self
    }

    /// Copies `src` to `dest_root/relative`:
    /// 1. Identical destination (at `mode`) ⇒ [`CopyOutcome::Skipped`]
    /// 2. Different destination ⇒ moved aside to a free `<stem><suffix><n><ext>` name
    /// 3. Copy, then verify at [`Tier::StrongHash`] whatever `mode` is
    /// 4. Failed verification ⇒ written bytes removed, [`CopyError::VerificationFailed`]
    pub fn copy_verified(
        &self,
        session: &Session,
        src: &FileRecord,
        dest_root: &Path,
        relative: &Path,
        mode: Tier,
    ) -> std::result::Result<CopyOutcome, CopyError> {
        let dest = dest_root.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| CopyError::from_io(parent, e))?;
        }

        let comparator = session.comparator();
        let mut outcome = CopyOutcome::CopiedFresh;

        match fs::symlink_metadata(&dest) {
            Ok(metadata) => {
                if !metadata.is_file() {
                    return Err(CopyError::Io(Error::io(
                        &dest,
                        io::Error::new(
                            io::ErrorKind::AlreadyExists,
                            "destination exists and is not a regular file",
                        ),
                    )));
                }
                let existing = FileRecord::new(relative, &dest, metadata.len());
                if comparator.identical(src, &existing, mode)? {
                    debug!("Same ({}): {}", mode, relative.display());
                    return Ok(CopyOutcome::Skipped);
                }

                let moved_to = unique_sibling(&dest, &self.collision_suffix);
                fs::rename(&dest, &moved_to).map_err(|e| CopyError::from_io(&dest, e))?;
                comparator.forget(&dest);
                info!(
                    "Moved non-identical destination aside: {} -> {}",
                    dest.display(),
                    moved_to.display()
                );
                outcome = CopyOutcome::CopiedAfterRenamingExisting { moved_to };
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(CopyError::from_io(&dest, e)),
        }

        let partial = partial_path(&dest);
        if let Err(e) = self.copier.copy(&src.path, &partial) {
            discard(&partial);
            return Err(CopyError::from_io(&partial, e));
        }

        match comparator.verify_copy(src, &partial) {
            Ok(true) => {}
            Ok(false) => {
                discard(&partial);
                error!(
                    "Copy verification failed, copy deleted: {}",
                    src.path.display()
                );
                return Err(CopyError::VerificationFailed {
                    src: src.path.clone(),
                    dest,
                });
            }
            Err(e) => {
                discard(&partial);
                return Err(e.into());
            }
        }

        if let Err(e) = fs::rename(&partial, &dest) {
            discard(&partial);
            return Err(CopyError::from_io(&dest, e));
        }
        comparator.forget(&dest);
        debug!("Copied: {}", relative.display());
        Ok(outcome)
    }

    /// Copies every file of the primary collection into the backup, one at a
    /// time in scan order. A full disk stops the batch; other failures are
    /// recorded and the batch moves on.
    pub fn copy_collection(
        &self,
        session: &Session,
        options: &ScanOptions,
        primary_root: &Path,
        backup_root: &Path,
        mode: Tier,
        reporter: &dyn ProgressReporter,
    ) -> Result<CopyReport> {
        reporter.on_scan_start(primary_root);
        let scan_start = Instant::now();
        let scanned = scanner::scan(primary_root, options)?;
        reporter.on_scan_complete(
            primary_root,
            scanned.records.len(),
            scan_start.elapsed().as_secs_f64(),
        );

        let mut report = CopyReport::default();
        for failure in &scanned.failures {
            report.errors.push(format!(
                "Error: unreadable {}: {}",
                failure.path.display(),
                failure.message
            ));
        }

        // Every copied file is verified against the source's strong digest.
        if self.parallel_hashing {
            for err in session
                .comparator()
                .prehash(&scanned.records, Tier::StrongHash)
            {
                warn!("Prehash failed: {}", err);
            }
        }

        let total = scanned.records.len();
        reporter.on_pass_start("copy", total);
        for src in &scanned.records {
            if session.is_cancelled() {
                warn!("Copy cancelled after {} of {} files", report.checked, total);
                report.cancelled = true;
                report.errors.push(Error::Cancelled.to_string());
                break;
            }

            report.checked += 1;
            match self.copy_verified(session, src, backup_root, &src.relative, mode) {
                Ok(CopyOutcome::Skipped) => report.skipped += 1,
                Ok(CopyOutcome::CopiedFresh) => report.copied += 1,
                Ok(CopyOutcome::CopiedAfterRenamingExisting { .. }) => {
                    report.renamed_existing += 1
                }
                Err(err) => {
                    let disk_full = matches!(err, CopyError::DiskFull { .. });
                    error!("{} (source: {})", err, src.path.display());
                    report
                        .errors
                        .push(format!("Error: {}, current SrcFile: {}", err, src.path.display()));
                    if disk_full {
                        report.halted_on_disk_full = true;
                        reporter.on_file_done(report.checked, total);
                        break;
                    }
                }
            }
            reporter.on_file_done(report.checked, total);
        }
        reporter.on_pass_complete("copy");

        info!(
            "Copy pass: {} checked, {} copied, {} dest-renamed, {} same-{}, {} errors",
            report.checked,
            report.copied,
            report.renamed_existing,
            report.skipped,
            mode,
            report.errors.len()
        );
        Ok(report)
    }
}

/// True for the temporary files `copy_verified` writes before verification.
pub fn is_partial_artifact(file_name: &OsStr) -> bool {
    let name = file_name.to_string_lossy();
    name.strip_prefix(PARTIAL_PREFIX)
        .and_then(|rest| rest.strip_suffix(PARTIAL_SUFFIX))
        .is_some_and(|counter| {
            !counter.is_empty() && counter.bytes().all(|b| b.is_ascii_digit())
        })
}

/// First free `.collsync-<n>.partial` next to `dest`. The name length does not
/// depend on the destination name, so it never outgrows the filesystem limit.
fn partial_path(dest: &Path) -> PathBuf {
    let mut counter = 1usize;
    loop {
        let candidate =
            dest.with_file_name(format!("{}{}{}", PARTIAL_PREFIX, counter, PARTIAL_SUFFIX));
        if fs::symlink_metadata(&candidate).is_err() {
            return candidate;
        }
        counter += 1;
    }
}

/// First free `<stem><suffix><n><ext>` next to `dest`, counting from 1.
pub fn unique_sibling(dest: &Path, suffix: &str) -> PathBuf {
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = dest
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1usize;
    loop {
        let candidate = dest.with_file_name(format!("{}{}{}{}", stem, suffix, counter, ext));
        if fs::symlink_metadata(&candidate).is_err() {
            return candidate;
        }
        counter += 1;
    }
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            error!("Could not remove {}: {}", path.display(), e);
        }
    }
}
