//! User-confirmation seam.
//!
//! The core never shows a dialog. Questions it cannot answer on its own are
//! handed to the host's [`Prompter`], which renders them however it likes
//! (dialog, TUI, fixed policy) and returns a [`PromptResponse`].

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A question requiring user intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserPrompt {
    /// The compatibility heuristic flagged the file; open it anyway?
    IncompatibleFormat { path: PathBuf },
    /// A stale lock marker can be broken; break it and proceed?
    BreakStaleLock { path: PathBuf, age: Duration },
    /// Entries carry legacy pdf/ps link fields; migrate them to `file`
    /// triples?
    LegacyFileLinks { path: PathBuf, entry_count: usize },
    /// Duplicate cite keys were found and automatic resolution is off.
    DuplicateKeys { path: PathBuf, keys: Vec<String> },
}

impl UserPrompt {
    /// Stable kind tag used in errors and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            UserPrompt::IncompatibleFormat { .. } => "incompatible_format",
            UserPrompt::BreakStaleLock { .. } => "break_stale_lock",
            UserPrompt::LegacyFileLinks { .. } => "legacy_file_links",
            UserPrompt::DuplicateKeys { .. } => "duplicate_keys",
        }
    }

    /// The file this prompt is about.
    pub fn path(&self) -> &PathBuf {
        match self {
            UserPrompt::IncompatibleFormat { path }
            | UserPrompt::BreakStaleLock { path, .. }
            | UserPrompt::LegacyFileLinks { path, .. }
            | UserPrompt::DuplicateKeys { path, .. } => path,
        }
    }
}

impl fmt::Display for UserPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserPrompt::IncompatibleFormat { path } => write!(
                f,
                "'{}' looks like it was exported with escaped braces and may not round-trip. Open it anyway?",
                path.display()
            ),
            UserPrompt::BreakStaleLock { path, age } => write!(
                f,
                "'{}' is locked by another instance ({}s old). Override the file lock?",
                path.display(),
                age.as_secs()
            ),
            UserPrompt::LegacyFileLinks { path, entry_count } => write!(
                f,
                "{} entries in '{}' use legacy pdf/ps link fields. Migrate them to file links?",
                entry_count,
                path.display()
            ),
            UserPrompt::DuplicateKeys { path, keys } => write!(
                f,
                "'{}' contains duplicate cite keys: {}",
                path.display(),
                keys.join(", ")
            ),
        }
    }
}

/// Answer to a [`UserPrompt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptResponse {
    Proceed,
    Abort,
}

/// Host collaborator answering prompts.
pub trait Prompter: Send + Sync {
    fn ask(&self, prompt: &UserPrompt) -> PromptResponse;
}

/// Declines every prompt. The safe headless default.
#[derive(Debug, Default)]
pub struct DeclineAll;

impl Prompter for DeclineAll {
    fn ask(&self, _prompt: &UserPrompt) -> PromptResponse {
        PromptResponse::Abort
    }
}

/// Accepts every prompt. For scripted or batch hosts.
#[derive(Debug, Default)]
pub struct AcceptAll;

impl Prompter for AcceptAll {
    fn ask(&self, _prompt: &UserPrompt) -> PromptResponse {
        PromptResponse::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        let prompt = UserPrompt::IncompatibleFormat {
            path: PathBuf::from("/refs/library.bib"),
        };
        assert_eq!(prompt.kind(), "incompatible_format");
        assert!(prompt.to_string().contains("library.bib"));
    }

    #[test]
    fn fixed_policies() {
        let prompt = UserPrompt::BreakStaleLock {
            path: PathBuf::from("/refs/library.bib"),
            age: Duration::from_secs(120),
        };
        assert_eq!(DeclineAll.ask(&prompt), PromptResponse::Abort);
        assert_eq!(AcceptAll.ask(&prompt), PromptResponse::Proceed);
    }
}
