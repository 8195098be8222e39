//! Parser seam. The bibliography grammar lives behind this trait.

use std::path::Path;

use thiserror::Error;

use crate::database::ParsedDatabase;

/// Failure to produce a parsed database.
///
/// Distinct from an empty database, which is a successful parse with zero
/// entries.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// External parser collaborator.
pub trait DatabaseLoader: Send + Sync {
    /// Parse the file at `path`.
    ///
    /// `encoding` is the character encoding to read with and `source_hint`
    /// names the exporter variant the file is expected to come from.
    fn load(
        &self,
        path: &Path,
        encoding: &str,
        source_hint: &str,
    ) -> Result<ParsedDatabase, LoadError>;
}
