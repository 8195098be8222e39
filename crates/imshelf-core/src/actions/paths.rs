//! Linked-file path fix-up and validation passes.
//!
//! The `file` field holds `description:path:type` triples separated by `;`,
//! one per linked file.

use std::path::{Path, MAIN_SEPARATOR};

use tracing::{info, warn};

use crate::database::{BibEntry, ParsedDatabase};
use crate::error::ActionError;
use crate::pipeline::PostOpenAction;
use crate::registry::DatabaseHandle;

pub const FILE_FIELD: &str = "file";

fn triples(value: &str) -> impl Iterator<Item = &str> {
    value.split(';').filter(|triple| !triple.is_empty())
}

/// Path component of one `description:path:type` triple.
fn triple_path(triple: &str) -> Option<&str> {
    triple.splitn(3, ':').nth(1)
}

fn rebuild_triple(triple: &str, new_path: &str) -> String {
    let mut parts = triple.splitn(3, ':');
    let description = parts.next().unwrap_or("");
    let _old = parts.next();
    let kind = parts.next().unwrap_or("");
    format!("{description}:{new_path}:{kind}")
}

/// A relative-looking path that becomes an existing file once the leading
/// separator is restored was an absolute path whose marker the exporter
/// dropped.
fn restored(path: &str) -> Option<String> {
    if path.is_empty() || path.starts_with(MAIN_SEPARATOR) {
        return None;
    }
    let candidate = format!("{MAIN_SEPARATOR}{path}");
    Path::new(&candidate).exists().then_some(candidate)
}

fn entry_needs_restoration(entry: &BibEntry) -> bool {
    entry.get_field(FILE_FIELD).is_some_and(|value| {
        triples(value).any(|triple| triple_path(triple).and_then(restored).is_some())
    })
}

/// Restores the leading separator on linked-file paths written by exporters
/// that omit absolute-path markers, so later passes (and the host) see real
/// paths.
pub struct NormalizePathMarkers;

impl PostOpenAction for NormalizePathMarkers {
    fn name(&self) -> &'static str {
        "normalize_path_markers"
    }

    fn is_necessary(&self, parsed: &ParsedDatabase) -> bool {
        parsed.database.entries().iter().any(entry_needs_restoration)
    }

    fn apply(&self, handle: &DatabaseHandle, _parsed: &ParsedDatabase) -> Result<(), ActionError> {
        let fixed = handle.with_database(|database| {
            let mut fixed = 0usize;
            for entry in database.entries_mut() {
                let Some(value) = entry.get_field(FILE_FIELD).map(str::to_owned) else {
                    continue;
                };
                let mut changed = false;
                let rebuilt: Vec<String> = triples(&value)
                    .map(|triple| match triple_path(triple).and_then(restored) {
                        Some(path) => {
                            changed = true;
                            rebuild_triple(triple, &path)
                        }
                        None => triple.to_string(),
                    })
                    .collect();
                if changed {
                    entry.set_field(FILE_FIELD, rebuilt.join(";"));
                    fixed += 1;
                }
            }
            fixed
        });
        if fixed > 0 {
            handle.mark_dirty();
            info!(path = %handle.source(), fixed, "restored absolute-path markers on linked files");
        }
        Ok(())
    }
}

/// Flags linked files that resolve nowhere, neither as absolute paths nor
/// relative to the bibliography file's directory. Runs after
/// [`NormalizePathMarkers`] so restored paths are not reported as dangling.
pub struct ValidateLinkedPaths;

fn resolves(path: &str, base: Option<&Path>) -> bool {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return candidate.exists();
    }
    base.map(|base| base.join(candidate).exists()).unwrap_or(false)
}

impl PostOpenAction for ValidateLinkedPaths {
    fn name(&self) -> &'static str {
        "validate_linked_paths"
    }

    fn is_necessary(&self, parsed: &ParsedDatabase) -> bool {
        parsed
            .database
            .entries()
            .iter()
            .any(|entry| entry.has_field(FILE_FIELD))
    }

    fn apply(&self, handle: &DatabaseHandle, _parsed: &ParsedDatabase) -> Result<(), ActionError> {
        let base = handle.source().parent().map(Path::to_path_buf);
        let dangling = handle.with_database(|database| {
            let mut dangling = Vec::new();
            for entry in database.entries() {
                let Some(value) = entry.get_field(FILE_FIELD) else {
                    continue;
                };
                for triple in triples(value) {
                    let Some(path) = triple_path(triple) else {
                        continue;
                    };
                    if !path.is_empty() && !resolves(path, base.as_deref()) {
                        dangling.push((entry.cite_key.clone(), path.to_string()));
                    }
                }
            }
            dangling
        });
        for (cite_key, path) in dangling {
            warn!(path = %handle.source(), cite_key, linked = %path, "linked file not found");
            handle.push_warning(format!("linked file not found for '{cite_key}': {path}"));
        }
        Ok(())
    }
}
