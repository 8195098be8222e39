//! File admission: existence, format-compatibility heuristic, and lock
//! negotiation.
//!
//! The guard gates every open before the parser runs. It answers with a
//! tri-state [`AdmissionDecision`]; [`FileAdmissionGuard::negotiate`] drives
//! that to a terminal yes/no through the host's prompter.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use tracing::{info, warn};

use crate::config::LockConfig;
use crate::error::OpenError;
use crate::lockfile;
use crate::prompt::{PromptResponse, Prompter, UserPrompt};

/// Why a file was rejected outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotFound,
    Locked,
}

/// Tri-state admission outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    Admit,
    Reject(RejectReason),
    DeferToUser(UserPrompt),
}

/// Field-name prefixes whose values the compatibility heuristic scans.
/// Free-text fields are where exporters hide unescaped braces.
const FREE_TEXT_FIELDS: [&str; 3] = ["journal", "title", "booktitle"];

/// Characters that compose diacritics when placed before a brace; a brace
/// following one of these is never counted as unescaped.
const DIACRITIC_MARKERS: [char; 5] = ['"', '\'', '`', '^', '~'];

/// Literal escaped-path-separator pattern on a `file` line that marks the
/// whole file as decisively incompatible (Windows path escaping).
const ESCAPED_SEPARATOR: &str = "backslash$:";

pub struct FileAdmissionGuard {
    lock: LockConfig,
}

impl FileAdmissionGuard {
    pub fn new(lock: LockConfig) -> Self {
        Self { lock }
    }

    /// Single-shot admission decision for a path.
    ///
    /// Blocks only for the bounded fresh-lock wait; never prompts on its
    /// own.
    pub fn evaluate(&self, path: &Path) -> AdmissionDecision {
        if !path.exists() {
            return AdmissionDecision::Reject(RejectReason::NotFound);
        }

        if lockfile::has_lock(path) {
            match lockfile::lock_age(path) {
                Some(age) if age > self.lock.critical_age() => {
                    // Old enough to offer stealing the file.
                    return AdmissionDecision::DeferToUser(UserPrompt::BreakStaleLock {
                        path: path.to_path_buf(),
                        age,
                    });
                }
                _ => {
                    if !lockfile::wait_for_release(
                        path,
                        self.lock.wait_retries,
                        self.lock.poll_interval(),
                    ) {
                        return AdmissionDecision::Reject(RejectReason::Locked);
                    }
                }
            }
        }

        match is_compatible(path) {
            Ok(true) => AdmissionDecision::Admit,
            Ok(false) => AdmissionDecision::DeferToUser(UserPrompt::IncompatibleFormat {
                path: path.to_path_buf(),
            }),
            Err(error) => {
                // Scan trouble is not grounds for rejection; the parser gets
                // the final word on the file.
                warn!(path = %path.display(), %error, "compatibility scan failed, admitting");
                AdmissionDecision::Admit
            }
        }
    }

    /// Drive admission to a terminal answer, resolving `DeferToUser`
    /// decisions through the host's prompter.
    ///
    /// A declined prompt cancels this open attempt; accepting a stale-lock
    /// offer removes the marker and re-evaluates, accepting an
    /// incompatibility warning admits the file as-is.
    pub fn negotiate(&self, path: &Path, prompter: &dyn Prompter) -> Result<(), OpenError> {
        loop {
            match self.evaluate(path) {
                AdmissionDecision::Admit => return Ok(()),
                AdmissionDecision::Reject(RejectReason::NotFound) => {
                    return Err(OpenError::NotFound {
                        path: path.to_path_buf(),
                    });
                }
                AdmissionDecision::Reject(RejectReason::Locked) => {
                    return Err(OpenError::Locked {
                        path: path.to_path_buf(),
                    });
                }
                AdmissionDecision::DeferToUser(prompt) => match prompter.ask(&prompt) {
                    PromptResponse::Abort => {
                        return Err(OpenError::Cancelled {
                            path: path.to_path_buf(),
                            prompt: prompt.kind(),
                        });
                    }
                    PromptResponse::Proceed => match prompt {
                        UserPrompt::BreakStaleLock { .. } => {
                            lockfile::remove_lock(path).map_err(|source| OpenError::Io {
                                path: path.to_path_buf(),
                                source,
                            })?;
                            info!(path = %path.display(), "stale lock broken on user request");
                            // Re-evaluate: the file still has to pass the
                            // remaining checks.
                        }
                        // The user chose to open despite the warning.
                        _ => return Ok(()),
                    },
                },
            }
        }
    }
}

/// Brace-count format-compatibility heuristic.
///
/// Scans free-text field lines and weighs unescaped opening braces
/// (`all_count`) against explicitly escaped ones (`escape_count`). Formats
/// that escape their braces do not round-trip through hosts that never
/// escape them, so an escape-dominated file is judged incompatible:
/// compatible iff `all_count / 2 >= escape_count` (integer division). A file
/// with no matching lines is trivially compatible.
///
/// This is a heuristic, not a parse: nested braces and fields spanning
/// multiple lines are counted line by line. A read error mid-scan keeps the
/// counts seen so far.
pub fn is_compatible(path: &Path) -> io::Result<bool> {
    let reader = BufReader::new(File::open(path)?);
    let mut all_count: u32 = 0;
    let mut escape_count: u32 = 0;

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(error) => {
                warn!(path = %path.display(), %error, "compatibility scan stopped early");
                break;
            }
        };
        let normalized = line.trim().to_lowercase();

        if cfg!(windows)
            && normalized.starts_with("file")
            && normalized.contains(ESCAPED_SEPARATOR)
        {
            return Ok(false);
        }

        if !FREE_TEXT_FIELDS
            .iter()
            .any(|field| normalized.starts_with(field))
        {
            continue;
        }
        let Some(eq) = normalized.find('=') else {
            continue;
        };
        let value: Vec<char> = normalized[eq + 1..].trim().chars().collect();

        // Skip the delimiter run of opening braces.
        let mut start = 0;
        while start < value.len() && value[start] == '{' {
            start += 1;
        }
        for i in start..value.len() {
            if value[i] != '{' {
                continue;
            }
            if i > 0 && DIACRITIC_MARKERS.contains(&value[i - 1]) {
                continue;
            }
            all_count += 1;
        }

        for i in 1..value.len() {
            if value[i] == '{' && value[i - 1] == '\\' {
                escape_count += 1;
            }
        }
    }

    Ok(all_count / 2 >= escape_count)
}
