use std::path::Path;

/// Trait for reporting pass progress.
///
/// The CLI implements it with indicatif bars. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self, _root: &Path) {}
    fn on_scan_complete(&self, _root: &Path, _total_files: usize, _duration_secs: f64) {}
    fn on_pass_start(&self, _pass: &str, _total_files: usize) {}
    fn on_file_done(&self, _checked: usize, _total_files: usize) {}
    fn on_pass_complete(&self, _pass: &str) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
