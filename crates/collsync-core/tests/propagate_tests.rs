use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

use collsync_core::{
    Error, ProgressReporter, RenamePropagator, ScanOptions, Session, SilentReporter,
};

fn write(root: &Path, relative: &str, contents: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn propagator() -> RenamePropagator {
    RenamePropagator::new(ScanOptions::default())
}

#[test]
fn test_renamed_primary_file_is_propagated() {
    let primary = tempdir().unwrap();
    let backup = tempdir().unwrap();
    write(primary.path(), "A/2020-01-02 trip.jpg", b"jpeg bytes");
    write(backup.path(), "A/2020-01-02 trip_old.jpg", b"jpeg bytes");

    let mut session = Session::default();
    let report = propagator()
        .propagate(&mut session, primary.path(), backup.path(), &SilentReporter)
        .unwrap();

    assert_eq!(report.checked, 1);
    assert_eq!(report.renamed, 1);
    assert_eq!(report.ambiguous_or_no_match(), 0);
    assert!(report.errors.is_empty());
    assert!(backup.path().join("A/2020-01-02 trip.jpg").exists());
    assert!(!backup.path().join("A/2020-01-02 trip_old.jpg").exists());
    assert_eq!(session.renames().len(), 1);
}

#[test]
fn test_undo_restores_every_rename() {
    let primary = tempdir().unwrap();
    let backup = tempdir().unwrap();
    write(primary.path(), "A/2020-01-02 10-00 beach.jpg", b"beach");
    write(primary.path(), "A/2020-01-02 11-00 dinner.jpg", b"dinner");
    write(primary.path(), "B/sub/2019-05-05 12-30-00 hike.mp4", b"hike video");
    write(backup.path(), "A/2020-01-02 10-00 IMG_001.jpg", b"beach");
    write(backup.path(), "A/2020-01-02 11-00 IMG_002.jpg", b"dinner");
    write(backup.path(), "B/sub/2019-05-05 12-30-00 VID_9.mp4", b"hike video");

    let mut session = Session::default();
    let report = propagator()
        .propagate(&mut session, primary.path(), backup.path(), &SilentReporter)
        .unwrap();
    assert_eq!(report.renamed, 3);
    assert!(backup.path().join("B/sub/2019-05-05 12-30-00 hike.mp4").exists());

    let undo = session.undo();
    assert_eq!(undo.restored, 3);
    assert!(undo.failures.is_empty());
    for original in [
        "A/2020-01-02 10-00 IMG_001.jpg",
        "A/2020-01-02 11-00 IMG_002.jpg",
        "B/sub/2019-05-05 12-30-00 VID_9.mp4",
    ] {
        assert!(backup.path().join(original).exists(), "{} not restored", original);
    }
    assert!(!backup.path().join("A/2020-01-02 10-00 beach.jpg").exists());
}

#[test]
fn test_existing_names_are_left_alone() {
    let primary = tempdir().unwrap();
    let backup = tempdir().unwrap();
    write(primary.path(), "A/2020-01-02 trip.jpg", b"new edit");
    write(backup.path(), "A/2020-01-02 trip.jpg", b"old edit");

    let mut session = Session::default();
    let report = propagator()
        .propagate(&mut session, primary.path(), backup.path(), &SilentReporter)
        .unwrap();

    assert_eq!(report.identical_already, 1);
    assert_eq!(report.renamed, 0);
    assert_eq!(
        fs::read(backup.path().join("A/2020-01-02 trip.jpg")).unwrap(),
        b"old edit"
    );
}

#[test]
fn test_files_without_token_are_undetermined() {
    let primary = tempdir().unwrap();
    let backup = tempdir().unwrap();
    write(primary.path(), "A/trip.jpg", b"bytes");
    write(backup.path(), "A/trip_old.jpg", b"bytes");

    let mut session = Session::default();
    let report = propagator()
        .propagate(&mut session, primary.path(), backup.path(), &SilentReporter)
        .unwrap();

    assert_eq!(report.undetermined, 1);
    assert_eq!(report.renamed, 0);
    assert!(backup.path().join("A/trip_old.jpg").exists());
}

#[test]
fn test_ambiguous_candidates_are_reported_not_renamed() {
    let primary = tempdir().unwrap();
    let backup = tempdir().unwrap();
    write(primary.path(), "A/2020-01-02 trip.jpg", b"same");
    write(backup.path(), "A/2020-01-02 copy one.jpg", b"same");
    write(backup.path(), "A/2020-01-02 copy two.jpg", b"same");

    let mut session = Session::default();
    let report = propagator()
        .propagate(&mut session, primary.path(), backup.path(), &SilentReporter)
        .unwrap();

    assert_eq!(report.ambiguous, 1);
    assert_eq!(report.renamed, 0);
    assert_eq!(report.diagnostics.len(), 1);
    assert!(session.renames().is_empty());
    assert!(backup.path().join("A/2020-01-02 copy one.jpg").exists());
    assert!(backup.path().join("A/2020-01-02 copy two.jpg").exists());
}

#[test]
fn test_no_match_when_content_differs() {
    let primary = tempdir().unwrap();
    let backup = tempdir().unwrap();
    write(primary.path(), "A/2020-01-02 trip.jpg", b"edited!");
    write(backup.path(), "A/2020-01-02 trip_old.jpg", b"original");

    let mut session = Session::default();
    let report = propagator()
        .propagate(&mut session, primary.path(), backup.path(), &SilentReporter)
        .unwrap();

    assert_eq!(report.no_match, 1);
    assert_eq!(report.ambiguous_or_no_match(), 1);
    assert!(report.diagnostics[0].contains("No exact file match"));
}

#[test]
fn test_candidates_only_come_from_the_same_directory() {
    let primary = tempdir().unwrap();
    let backup = tempdir().unwrap();
    write(primary.path(), "A/2020-01-02 trip.jpg", b"bytes");
    write(backup.path(), "B/2020-01-02 trip_old.jpg", b"bytes");

    let mut session = Session::default();
    let report = propagator()
        .propagate(&mut session, primary.path(), backup.path(), &SilentReporter)
        .unwrap();

    assert_eq!(report.no_match, 1);
    assert!(backup.path().join("B/2020-01-02 trip_old.jpg").exists());
}

#[test]
fn test_correctly_named_backup_is_never_taken_by_a_duplicate() {
    let primary = tempdir().unwrap();
    let backup = tempdir().unwrap();
    // Two primary files with the same content; backup only has the first.
    write(primary.path(), "A/2020-01-02 a.jpg", b"dup");
    write(primary.path(), "A/2020-01-02 b.jpg", b"dup");
    write(backup.path(), "A/2020-01-02 a.jpg", b"dup");

    let mut session = Session::default();
    let report = propagator()
        .propagate(&mut session, primary.path(), backup.path(), &SilentReporter)
        .unwrap();

    assert_eq!(report.identical_already, 1);
    assert_eq!(report.no_match, 1);
    assert_eq!(report.renamed, 0);
    assert!(backup.path().join("A/2020-01-02 a.jpg").exists());
}

#[test]
fn test_excluded_directories_are_ignored() {
    let primary = tempdir().unwrap();
    let backup = tempdir().unwrap();
    write(primary.path(), "_inbox/2020-01-02 trip.jpg", b"bytes");
    write(backup.path(), "_inbox/2020-01-02 trip_old.jpg", b"bytes");
    write(primary.path(), "loose 2020-01-02.txt", b"root file");

    let mut session = Session::default();
    let report = propagator()
        .propagate(&mut session, primary.path(), backup.path(), &SilentReporter)
        .unwrap();

    assert_eq!(report.checked, 0);
    assert!(backup.path().join("_inbox/2020-01-02 trip_old.jpg").exists());
}

#[test]
fn test_cancelled_session_stops_before_first_file() {
    let primary = tempdir().unwrap();
    let backup = tempdir().unwrap();
    write(primary.path(), "A/2020-01-02 trip.jpg", b"bytes");
    write(backup.path(), "A/2020-01-02 trip_old.jpg", b"bytes");

    let mut session = Session::default();
    session.cancel_token().store(true, Ordering::Relaxed);
    let report = propagator()
        .propagate(&mut session, primary.path(), backup.path(), &SilentReporter)
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.checked, 0);
    assert_eq!(report.errors, vec!["Operation cancelled".to_string()]);
    assert!(backup.path().join("A/2020-01-02 trip_old.jpg").exists());
}

#[test]
fn test_missing_backup_root_fails() {
    let primary = tempdir().unwrap();
    let backup = tempdir().unwrap();
    write(primary.path(), "A/2020-01-02 trip.jpg", b"bytes");

    let mut session = Session::default();
    let result = propagator().propagate(
        &mut session,
        primary.path(),
        &backup.path().join("unmounted"),
        &SilentReporter,
    );
    assert!(matches!(result, Err(Error::Io { .. })));
}

/// Raises the cancel flag once the first file is done, as an interrupt would.
struct InterruptAfterFirst(Arc<AtomicBool>);

impl ProgressReporter for InterruptAfterFirst {
    fn on_file_done(&self, checked: usize, _total_files: usize) {
        if checked == 1 {
            self.0.store(true, Ordering::SeqCst);
        }
    }
}

#[test]
fn test_interrupted_pass_keeps_committed_renames_undoable() {
    let primary = tempdir().unwrap();
    let backup = tempdir().unwrap();
    write(primary.path(), "A/2020-01-02 first.jpg", b"first bytes");
    write(primary.path(), "B/2020-01-03 second.jpg", b"second bytes");
    write(backup.path(), "A/2020-01-02 first_old.jpg", b"first bytes");
    write(backup.path(), "B/2020-01-03 second_old.jpg", b"second bytes");

    let mut session = Session::default();
    let reporter = InterruptAfterFirst(session.cancel_token());
    let report = propagator()
        .propagate(&mut session, primary.path(), backup.path(), &reporter)
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.checked, 1);
    assert_eq!(report.renamed, 1);
    assert_eq!(session.renames().len(), 1);
    assert!(backup.path().join("A/2020-01-02 first.jpg").exists());
    assert!(backup.path().join("B/2020-01-03 second_old.jpg").exists());

    let undo = session.undo();
    assert_eq!(undo.restored, 1);
    assert!(undo.failures.is_empty());
    assert!(backup.path().join("A/2020-01-02 first_old.jpg").exists());
}
