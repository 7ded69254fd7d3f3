//! Integration tests for the lockout tracker wired into the open
//! pipeline.

use std::path::Path;

use coffer::errors::CofferError;
use coffer::{Session, Settings};
use tempfile::TempDir;

fn settings_with_lockout(dir: &Path, max_attempts: u32, lockout_secs: u64) -> Settings {
    Settings {
        staging_root: dir.join("staging"),
        lockout_file: dir.join("lockout.json"),
        max_attempts,
        lockout_secs,
        argon2_memory_kib: 8_192,
        argon2_iterations: 1,
        argon2_parallelism: 1,
        close_timeout_secs: 10,
    }
}

// ---------------------------------------------------------------------------
// Attempt accounting
// ---------------------------------------------------------------------------

#[test]
fn each_wrong_attempt_decrements_the_budget_once() {
    let dir = TempDir::new().unwrap();
    let settings = settings_with_lockout(dir.path(), 3, 300);
    let path = dir.path().join("a.vault");

    Session::create(&path, "right", &settings).unwrap().close().unwrap();

    match Session::open(&path, "wrong", &settings).unwrap_err() {
        CofferError::WrongPassword { attempts_remaining } => {
            assert_eq!(attempts_remaining, Some(2));
        }
        other => panic!("expected WrongPassword, got {other:?}"),
    }

    match Session::open(&path, "wrong", &settings).unwrap_err() {
        CofferError::WrongPassword { attempts_remaining } => {
            assert_eq!(attempts_remaining, Some(1));
        }
        other => panic!("expected WrongPassword, got {other:?}"),
    }
}

#[test]
fn exhausting_the_budget_locks_even_the_correct_password() {
    let dir = TempDir::new().unwrap();
    let settings = settings_with_lockout(dir.path(), 3, 300);
    let path = dir.path().join("b.vault");

    Session::create(&path, "right", &settings).unwrap().close().unwrap();

    for _ in 0..2 {
        let _ = Session::open(&path, "wrong", &settings).unwrap_err();
    }
    // Third failure starts the window.
    assert!(matches!(
        Session::open(&path, "wrong", &settings).unwrap_err(),
        CofferError::LockedOut { .. }
    ));

    // Correct password is refused while the window is live.
    match Session::open(&path, "right", &settings).unwrap_err() {
        CofferError::LockedOut { remaining_seconds } => {
            assert!(remaining_seconds > 0 && remaining_seconds <= 300);
        }
        other => panic!("expected LockedOut, got {other:?}"),
    }
}

#[test]
fn window_elapse_allows_success_and_resets_the_counter() {
    let dir = TempDir::new().unwrap();
    let settings = settings_with_lockout(dir.path(), 2, 1);
    let path = dir.path().join("c.vault");

    Session::create(&path, "right", &settings).unwrap().close().unwrap();

    let _ = Session::open(&path, "wrong", &settings).unwrap_err();
    assert!(matches!(
        Session::open(&path, "wrong", &settings).unwrap_err(),
        CofferError::LockedOut { .. }
    ));

    std::thread::sleep(std::time::Duration::from_millis(1_200));

    // The window has elapsed: the correct password succeeds...
    Session::open(&path, "right", &settings)
        .unwrap()
        .close()
        .unwrap();

    // ...and the counter is back at zero: a fresh failure reports the
    // full budget again.
    match Session::open(&path, "wrong", &settings).unwrap_err() {
        CofferError::WrongPassword { attempts_remaining } => {
            assert_eq!(attempts_remaining, Some(1));
        }
        other => panic!("expected WrongPassword, got {other:?}"),
    }
}

#[test]
fn successful_open_resets_the_counter() {
    let dir = TempDir::new().unwrap();
    let settings = settings_with_lockout(dir.path(), 3, 300);
    let path = dir.path().join("d.vault");

    Session::create(&path, "right", &settings).unwrap().close().unwrap();

    let _ = Session::open(&path, "wrong", &settings).unwrap_err();
    let _ = Session::open(&path, "wrong", &settings).unwrap_err();

    Session::open(&path, "right", &settings)
        .unwrap()
        .close()
        .unwrap();

    // Full budget restored.
    match Session::open(&path, "wrong", &settings).unwrap_err() {
        CofferError::WrongPassword { attempts_remaining } => {
            assert_eq!(attempts_remaining, Some(2));
        }
        other => panic!("expected WrongPassword, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Persistence across "restarts"
// ---------------------------------------------------------------------------

#[test]
fn lockout_state_survives_a_new_settings_instance() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("e.vault");

    {
        let settings = settings_with_lockout(dir.path(), 2, 300);
        Session::create(&path, "right", &settings).unwrap().close().unwrap();
        let _ = Session::open(&path, "wrong", &settings).unwrap_err();
    }

    // A fresh Settings (same lockout file) simulates a process restart.
    let settings = settings_with_lockout(dir.path(), 2, 300);
    assert!(matches!(
        Session::open(&path, "wrong", &settings).unwrap_err(),
        CofferError::LockedOut { .. }
    ));
}
