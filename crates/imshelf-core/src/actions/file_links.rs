//! Migration of legacy pdf/ps link fields to `file` triples.

use std::sync::Arc;

use tracing::{debug, info};

use crate::actions::FILE_FIELD;
use crate::database::{BibEntry, ParsedDatabase};
use crate::error::ActionError;
use crate::pipeline::PostOpenAction;
use crate::prompt::{PromptResponse, Prompter, UserPrompt};
use crate::registry::DatabaseHandle;

/// Fields from the old external-file handling, superseded by `file` triples.
pub const LEGACY_LINK_FIELDS: [&str; 2] = ["pdf", "ps"];

fn needs_migration(entry: &BibEntry) -> bool {
    !entry.has_field(FILE_FIELD)
        && LEGACY_LINK_FIELDS
            .iter()
            .any(|field| entry.has_field(field))
}

/// Rewrites legacy `pdf`/`ps` link fields into `file` triples once the user
/// confirms. Declining leaves the entries untouched.
pub struct MigrateLegacyFileLinks {
    prompter: Arc<dyn Prompter>,
}

impl MigrateLegacyFileLinks {
    pub fn new(prompter: Arc<dyn Prompter>) -> Self {
        Self { prompter }
    }
}

impl PostOpenAction for MigrateLegacyFileLinks {
    fn name(&self) -> &'static str {
        "migrate_legacy_file_links"
    }

    fn is_necessary(&self, parsed: &ParsedDatabase) -> bool {
        parsed.database.entries().iter().any(needs_migration)
    }

    fn apply(&self, handle: &DatabaseHandle, parsed: &ParsedDatabase) -> Result<(), ActionError> {
        let affected = parsed
            .database
            .entries()
            .iter()
            .filter(|entry| needs_migration(entry))
            .count();
        let prompt = UserPrompt::LegacyFileLinks {
            path: handle.source().path().to_path_buf(),
            entry_count: affected,
        };
        if self.prompter.ask(&prompt) == PromptResponse::Abort {
            debug!(path = %handle.source(), "legacy file-link migration declined");
            return Ok(());
        }

        let migrated = handle.with_database(|database| {
            let mut migrated = 0usize;
            for entry in database.entries_mut() {
                if !needs_migration(entry) {
                    continue;
                }
                let mut links = Vec::new();
                for field in LEGACY_LINK_FIELDS {
                    if let Some(path) = entry.remove_field(field) {
                        links.push(format!(":{path}:{}", field.to_uppercase()));
                    }
                }
                if !links.is_empty() {
                    entry.set_field(FILE_FIELD, links.join(";"));
                    migrated += 1;
                }
            }
            migrated
        });
        if migrated > 0 {
            handle.mark_dirty();
            info!(path = %handle.source(), migrated, "migrated legacy file links");
        }
        Ok(())
    }
}
