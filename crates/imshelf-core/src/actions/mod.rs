//! The standard post-open reconciliation passes.
//!
//! Each pass is a [`PostOpenAction`](crate::pipeline::PostOpenAction):
//! necessity is read off the frozen parse outcome, effects go to the live
//! handle. The canonical order lives in
//! [`PostLoadPipeline::standard`](crate::pipeline::PostLoadPipeline::standard).

mod duplicate_keys;
mod entry_types;
mod file_links;
mod paths;

pub use duplicate_keys::{duplicate_keys, ResolveDuplicateKeys, WarnDuplicateKeys};
pub use entry_types::{DetectNewEntryTypes, STANDARD_ENTRY_TYPES};
pub use file_links::{MigrateLegacyFileLinks, LEGACY_LINK_FIELDS};
pub use paths::{NormalizePathMarkers, ValidateLinkedPaths, FILE_FIELD};
