//! Detection of entry types the host does not know about.

use std::collections::BTreeSet;

use tracing::info;

use crate::database::ParsedDatabase;
use crate::error::ActionError;
use crate::pipeline::PostOpenAction;
use crate::registry::DatabaseHandle;

/// The standard entry types every host understands.
pub const STANDARD_ENTRY_TYPES: [&str; 14] = [
    "article",
    "book",
    "booklet",
    "conference",
    "inbook",
    "incollection",
    "inproceedings",
    "manual",
    "mastersthesis",
    "misc",
    "phdthesis",
    "proceedings",
    "techreport",
    "unpublished",
];

fn unknown_types(parsed: &ParsedDatabase) -> BTreeSet<String> {
    parsed
        .database
        .entries()
        .iter()
        .map(|entry| entry.entry_type.to_lowercase())
        .filter(|entry_type| !STANDARD_ENTRY_TYPES.contains(&entry_type.as_str()))
        .collect()
}

/// Registers custom entry types found in the file on the handle's metadata,
/// so the host can offer to import their definitions.
pub struct DetectNewEntryTypes;

impl PostOpenAction for DetectNewEntryTypes {
    fn name(&self) -> &'static str {
        "detect_new_entry_types"
    }

    fn is_necessary(&self, parsed: &ParsedDatabase) -> bool {
        !unknown_types(parsed).is_empty()
    }

    fn apply(&self, handle: &DatabaseHandle, parsed: &ParsedDatabase) -> Result<(), ActionError> {
        let found = unknown_types(parsed);
        info!(
            path = %handle.source(),
            types = ?found,
            "registering custom entry types"
        );
        handle.with_meta(|meta| meta.custom_entry_types.extend(found));
        Ok(())
    }
}
