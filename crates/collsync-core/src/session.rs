use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::hasher::Comparator;

/// A committed rename, reversible by renaming `new_path` back to `old_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameOperation {
    pub old_path: PathBuf,
    pub new_path: PathBuf,
}

#[derive(Debug, Default)]
pub struct UndoReport {
    pub restored: usize,
    pub failures: Vec<String>,
}

/// State for one run: digest cache, undo log and cancellation token.
/// Nothing here outlives the session.
#[derive(Debug, Default)]
pub struct Session {
    comparator: Comparator,
    undo_log: Vec<RenameOperation>,
    cancel_token: Arc<AtomicBool>,
}

impl Session {
    pub fn new(comparator: Comparator) -> Self {
        Self {
            comparator,
            undo_log: Vec::new(),
            cancel_token: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(Comparator::new(config.effective_chunk_size()))
    }

    pub fn comparator(&self) -> &Comparator {
        &self.comparator
    }

    /// Setting the token stops the running pass after the current file.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_token)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.load(Ordering::Relaxed)
    }

    pub fn record_rename(&mut self, operation: RenameOperation) {
        self.undo_log.push(operation);
    }

    /// Renames committed so far, oldest first.
    pub fn renames(&self) -> &[RenameOperation] {
        &self.undo_log
    }

    /// Reverts every recorded rename, newest first. A restore that cannot be
    /// done safely is reported and skipped; the rest still run.
    pub fn undo(&mut self) -> UndoReport {
        let mut report = UndoReport::default();

        while let Some(op) = self.undo_log.pop() {
            if fs::symlink_metadata(&op.new_path).is_err() {
                let msg = format!(
                    "Undo error: renamed file no longer exists ({})",
                    op.new_path.display()
                );
                warn!("{}", msg);
                report.failures.push(msg);
                continue;
            }
            if fs::symlink_metadata(&op.old_path).is_ok() {
                let msg = format!(
                    "Undo error: original name is occupied ({})",
                    op.old_path.display()
                );
                warn!("{}", msg);
                report.failures.push(msg);
                continue;
            }

            match fs::rename(&op.new_path, &op.old_path) {
                Ok(()) => {
                    self.comparator.forget(&op.new_path);
                    self.comparator.forget(&op.old_path);
                    info!(
                        "Restored: {} -> {}",
                        op.new_path.display(),
                        op.old_path.display()
                    );
                    report.restored += 1;
                }
                Err(e) => {
                    let msg = format!("Undo error: {} ({})", e, op.new_path.display());
                    warn!("{}", msg);
                    report.failures.push(msg);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_undo_reverses_in_order() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        let c = dir.path().join("c");
        fs::write(&a, "payload").unwrap();

        // a -> b, then b -> c; undo must go c -> b -> a.
        let mut session = Session::default();
        fs::rename(&a, &b).unwrap();
        session.record_rename(RenameOperation {
            old_path: a.clone(),
            new_path: b.clone(),
        });
        fs::rename(&b, &c).unwrap();
        session.record_rename(RenameOperation {
            old_path: b.clone(),
            new_path: c.clone(),
        });

        let report = session.undo();
        assert_eq!(report.restored, 2);
        assert!(report.failures.is_empty());
        assert!(a.exists() && !b.exists() && !c.exists());
        assert!(session.renames().is_empty());
    }

    #[test]
    fn test_undo_continues_past_failures() {
        let dir = tempdir().unwrap();
        let mut session = Session::default();

        let kept_old = dir.path().join("kept_old");
        let kept_new = dir.path().join("kept_new");
        fs::write(&kept_new, "x").unwrap();
        session.record_rename(RenameOperation {
            old_path: kept_old.clone(),
            new_path: kept_new.clone(),
        });

        // Renamed file was deleted afterwards.
        session.record_rename(RenameOperation {
            old_path: dir.path().join("gone_old"),
            new_path: dir.path().join("gone_new"),
        });

        // Original name was reused afterwards.
        let busy_old = dir.path().join("busy_old");
        let busy_new = dir.path().join("busy_new");
        fs::write(&busy_old, "someone else").unwrap();
        fs::write(&busy_new, "ours").unwrap();
        session.record_rename(RenameOperation {
            old_path: busy_old.clone(),
            new_path: busy_new.clone(),
        });

        let report = session.undo();
        assert_eq!(report.restored, 1);
        assert_eq!(report.failures.len(), 2);
        assert!(kept_old.exists());
        assert_eq!(fs::read_to_string(&busy_old).unwrap(), "someone else");
        assert!(busy_new.exists());
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let session = Session::default();
        assert!(!session.is_cancelled());
        session.cancel_token().store(true, Ordering::Relaxed);
        assert!(session.is_cancelled());
    }
}
