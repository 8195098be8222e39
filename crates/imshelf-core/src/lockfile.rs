//! Lock-marker probing and negotiation helpers.
//!
//! A sibling `<file>.lock` marker signals that another instance currently
//! holds the bibliography file. The admission guard decides what to do with
//! one; this module only probes, waits, and removes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

pub const LOCK_SUFFIX: &str = ".lock";

/// Path of the lock marker for a bibliography file.
pub fn lock_path(file: &Path) -> PathBuf {
    let mut os = file.as_os_str().to_os_string();
    os.push(LOCK_SUFFIX);
    PathBuf::from(os)
}

pub fn has_lock(file: &Path) -> bool {
    lock_path(file).exists()
}

/// Age of the lock marker, if one exists and its mtime is readable.
pub fn lock_age(file: &Path) -> Option<Duration> {
    let meta = fs::metadata(lock_path(file)).ok()?;
    let modified = meta.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}

/// Remove the lock marker. Already gone counts as removed.
pub fn remove_lock(file: &Path) -> io::Result<()> {
    match fs::remove_file(lock_path(file)) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Wait for a fresh lock to clear, polling up to `retries` times.
///
/// Returns true once the lock is gone, false when the budget ran out.
pub fn wait_for_release(file: &Path, retries: u32, poll_interval: Duration) -> bool {
    for _ in 0..retries {
        if !has_lock(file) {
            return true;
        }
        thread::sleep(poll_interval);
    }
    !has_lock(file)
}
