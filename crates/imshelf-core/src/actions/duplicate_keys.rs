//! Duplicate cite-key handling: automatic resolution or interactive warning.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::database::{BibDatabase, ParsedDatabase};
use crate::error::ActionError;
use crate::pipeline::PostOpenAction;
use crate::prompt::{Prompter, UserPrompt};
use crate::registry::DatabaseHandle;

/// Cite keys that occur more than once, in sorted order.
pub fn duplicate_keys(database: &BibDatabase) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for entry in database.entries() {
        if !seen.insert(entry.cite_key.clone()) {
            duplicates.insert(entry.cite_key.clone());
        }
    }
    duplicates.into_iter().collect()
}

fn unique_key(base: &str, taken: &BTreeSet<String>) -> String {
    for suffix in 'a'..='z' {
        let candidate = format!("{base}{suffix}");
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Renames later occurrences of a duplicated cite key by appending `a`,
/// `b`, … until unique. Runs last in the standard chain, against
/// already-normalized data.
pub struct ResolveDuplicateKeys;

impl PostOpenAction for ResolveDuplicateKeys {
    fn name(&self) -> &'static str {
        "resolve_duplicate_keys"
    }

    fn is_necessary(&self, parsed: &ParsedDatabase) -> bool {
        !duplicate_keys(&parsed.database).is_empty()
    }

    fn apply(&self, handle: &DatabaseHandle, _parsed: &ParsedDatabase) -> Result<(), ActionError> {
        let renamed = handle.with_database(|database| {
            let mut taken: BTreeSet<String> = database
                .entries()
                .iter()
                .map(|entry| entry.cite_key.clone())
                .collect();
            let mut seen = BTreeSet::new();
            let mut renamed = 0usize;
            for entry in database.entries_mut() {
                if seen.insert(entry.cite_key.clone()) {
                    continue;
                }
                let fresh = unique_key(&entry.cite_key, &taken);
                entry.cite_key = fresh.clone();
                taken.insert(fresh.clone());
                seen.insert(fresh);
                renamed += 1;
            }
            renamed
        });
        if renamed > 0 {
            handle.mark_dirty();
            info!(path = %handle.source(), renamed, "resolved duplicate cite keys");
        }
        Ok(())
    }
}

/// Reports duplicate cite keys to the user without touching the database.
pub struct WarnDuplicateKeys {
    prompter: Arc<dyn Prompter>,
}

impl WarnDuplicateKeys {
    pub fn new(prompter: Arc<dyn Prompter>) -> Self {
        Self { prompter }
    }
}

impl PostOpenAction for WarnDuplicateKeys {
    fn name(&self) -> &'static str {
        "warn_duplicate_keys"
    }

    fn is_necessary(&self, parsed: &ParsedDatabase) -> bool {
        !duplicate_keys(&parsed.database).is_empty()
    }

    fn apply(&self, handle: &DatabaseHandle, parsed: &ParsedDatabase) -> Result<(), ActionError> {
        let keys = duplicate_keys(&parsed.database);
        warn!(path = %handle.source(), keys = ?keys, "duplicate cite keys found");
        // Informational: the answer does not change the database.
        self.prompter.ask(&UserPrompt::DuplicateKeys {
            path: handle.source().path().to_path_buf(),
            keys,
        });
        Ok(())
    }
}
