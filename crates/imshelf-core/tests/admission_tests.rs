//! Admission guard integration tests: heuristic, locks, negotiation.

mod common;

use std::fs;
use std::time::Duration;

use common::fixtures::{write_bib, RecordingPrompter};
use imshelf_core::lockfile;
use imshelf_core::{
    AdmissionDecision, FileAdmissionGuard, LockConfig, OpenError, RejectReason, UserPrompt,
};

fn fast_lock_config() -> LockConfig {
    LockConfig {
        critical_age_secs: 3600,
        wait_retries: 3,
        poll_interval_ms: 1,
    }
}

#[test]
fn missing_file_is_rejected_terminally() {
    let guard = FileAdmissionGuard::new(LockConfig::default());
    let prompter = RecordingPrompter::proceeding();

    let err = guard
        .negotiate(std::path::Path::new("/no/such/library.bib"), &prompter)
        .unwrap_err();
    assert!(matches!(err, OpenError::NotFound { .. }));
    // Nothing to confirm: rejection never reaches the user.
    assert!(prompter.asked_kinds().is_empty());
}

#[test]
fn zero_matching_lines_is_trivially_compatible() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_bib(
        dir.path(),
        "plain.bib",
        "@article{a,\n  author = {Someone},\n  year = {2020},\n}\n",
    );
    let guard = FileAdmissionGuard::new(LockConfig::default());
    assert_eq!(guard.evaluate(&path), AdmissionDecision::Admit);
}

#[test]
fn escape_dominated_file_defers_and_decline_cancels() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_bib(
        dir.path(),
        "exported.bib",
        "title = {A \\{B\\} C}\nbooktitle = {D \\{E\\} F}\n",
    );
    let guard = FileAdmissionGuard::new(LockConfig::default());

    match guard.evaluate(&path) {
        AdmissionDecision::DeferToUser(UserPrompt::IncompatibleFormat { .. }) => {}
        other => panic!("expected incompatibility prompt, got {other:?}"),
    }

    let decliner = RecordingPrompter::aborting();
    let err = guard.negotiate(&path, &decliner).unwrap_err();
    assert!(matches!(
        err,
        OpenError::Cancelled {
            prompt: "incompatible_format",
            ..
        }
    ));

    // Overriding the warning admits the file as-is.
    let overrider = RecordingPrompter::proceeding();
    guard.negotiate(&path, &overrider).unwrap();
    assert_eq!(overrider.asked_kinds(), vec!["incompatible_format"]);
}

#[test]
fn unescaped_braces_are_the_compatible_case() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_bib(
        dir.path(),
        "native.bib",
        "title = {The {Rust} {Book} of {Braces}}\n",
    );
    let guard = FileAdmissionGuard::new(LockConfig::default());
    assert_eq!(guard.evaluate(&path), AdmissionDecision::Admit);
}

#[test]
fn fresh_lock_rejects_after_bounded_wait() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_bib(dir.path(), "locked.bib", "@article{a, title = {T}}\n");
    fs::write(lockfile::lock_path(&path), "").unwrap();

    let guard = FileAdmissionGuard::new(fast_lock_config());
    assert_eq!(
        guard.evaluate(&path),
        AdmissionDecision::Reject(RejectReason::Locked)
    );

    let prompter = RecordingPrompter::proceeding();
    let err = guard.negotiate(&path, &prompter).unwrap_err();
    assert!(matches!(err, OpenError::Locked { .. }));
    assert!(prompter.asked_kinds().is_empty());
}

#[test]
fn stale_lock_is_offered_for_breaking() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_bib(dir.path(), "stale.bib", "@article{a, title = {T}}\n");
    fs::write(lockfile::lock_path(&path), "").unwrap();

    // Any lock is stale at a zero critical age.
    let guard = FileAdmissionGuard::new(LockConfig {
        critical_age_secs: 0,
        wait_retries: 3,
        poll_interval_ms: 1,
    });
    std::thread::sleep(Duration::from_millis(5));

    match guard.evaluate(&path) {
        AdmissionDecision::DeferToUser(UserPrompt::BreakStaleLock { .. }) => {}
        other => panic!("expected stale-lock prompt, got {other:?}"),
    }

    // Accepting removes the marker and admission proceeds.
    let prompter = RecordingPrompter::proceeding();
    guard.negotiate(&path, &prompter).unwrap();
    assert!(!lockfile::has_lock(&path));
    assert_eq!(prompter.asked_kinds(), vec!["break_stale_lock"]);
}

#[test]
fn declined_stale_lock_cancels_without_breaking() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_bib(dir.path(), "stale.bib", "@article{a, title = {T}}\n");
    fs::write(lockfile::lock_path(&path), "").unwrap();

    let guard = FileAdmissionGuard::new(LockConfig {
        critical_age_secs: 0,
        wait_retries: 3,
        poll_interval_ms: 1,
    });
    std::thread::sleep(Duration::from_millis(5));

    let prompter = RecordingPrompter::aborting();
    let err = guard.negotiate(&path, &prompter).unwrap_err();
    assert!(matches!(
        err,
        OpenError::Cancelled {
            prompt: "break_stale_lock",
            ..
        }
    ));
    assert!(lockfile::has_lock(&path), "declined break leaves the lock");
}

#[test]
fn released_lock_clears_within_the_wait_budget() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_bib(dir.path(), "racing.bib", "@article{a, title = {T}}\n");
    let lock = lockfile::lock_path(&path);
    fs::write(&lock, "").unwrap();

    let guard = FileAdmissionGuard::new(LockConfig {
        critical_age_secs: 3600,
        wait_retries: 200,
        poll_interval_ms: 5,
    });

    let remover = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        fs::remove_file(&lock).unwrap();
    });
    assert_eq!(guard.evaluate(&path), AdmissionDecision::Admit);
    remover.join().unwrap();
}
