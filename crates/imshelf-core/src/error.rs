//! Error types for imshelf-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from an open attempt (admission, parse, registration).
///
/// Every terminal failure carries the originating path so the host can show
/// it to the user.
#[derive(Error, Debug)]
pub enum OpenError {
    /// The path does not exist. Terminal, no retry.
    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    /// A fresh lock marker did not clear within the bounded wait. Terminal.
    #[error("File is locked by another instance: {path}")]
    Locked { path: PathBuf },

    /// The user declined a prompt (lock override, incompatibility warning).
    /// Cancels only this open attempt.
    #[error("Open of '{path}' cancelled at prompt '{prompt}'")]
    Cancelled { path: PathBuf, prompt: &'static str },

    /// The parser failed on every attempt up to the configured bound.
    #[error("Could not parse '{path}' after {attempts} attempts: {message}")]
    ParseFailure {
        path: PathBuf,
        attempts: u32,
        message: String,
    },

    /// Filesystem trouble outside the parser (lock removal, normalization).
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of a single post-open action. The pipeline logs it and moves on.
#[derive(Error, Debug)]
#[error("Post-open action '{action}' failed: {message}")]
pub struct ActionError {
    pub action: &'static str,
    pub message: String,
}

impl ActionError {
    pub fn new(action: &'static str, message: impl Into<String>) -> Self {
        ActionError {
            action,
            message: message.into(),
        }
    }
}

/// Failure of a save workflow, reported upward as an abort signal at
/// shutdown.
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("I/O error while saving '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Save of '{path}' rejected: {message}")]
    Rejected { path: PathBuf, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_errors_name_the_path() {
        let err = OpenError::NotFound {
            path: PathBuf::from("/refs/library.bib"),
        };
        assert!(err.to_string().contains("/refs/library.bib"));

        let err = OpenError::ParseFailure {
            path: PathBuf::from("/refs/library.bib"),
            attempts: 5,
            message: "unbalanced braces".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("5 attempts"));
        assert!(msg.contains("unbalanced braces"));
    }

    #[test]
    fn action_error_names_the_action() {
        let err = ActionError::new("resolve_duplicate_keys", "boom");
        assert!(err.to_string().contains("resolve_duplicate_keys"));
    }
}
