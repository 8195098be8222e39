//! End-of-process reconciliation sweep over the open-handle registry.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::SaveError;
use crate::registry::{DatabaseHandle, HandleRegistry};

/// Per-entry marker field used for cross-application hand-off. Transient:
/// stripped from every entry before shutdown saves anything.
pub const TRANSIENT_HANDOFF_FIELD: &str = "x-pending-link";

/// Outcome of one save request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The user backed out of the save workflow.
    Cancelled,
}

/// Host-side save workflow. May be interactive (encoding prompts, conflict
/// dialogs) and therefore cancellable.
pub trait SaveWorkflow: Send + Sync {
    fn save(&self, handle: &DatabaseHandle) -> Result<SaveOutcome, SaveError>;
}

/// What the sweep found.
///
/// `aborted` is the upstream signal that shutdown must not proceed silently:
/// a save was cancelled or failed, so closing now would lose data.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub aborted: bool,
    pub reconciled: usize,
    pub failures: Vec<(PathBuf, String)>,
}

/// Walks every open handle once at teardown: strips transient markers, then
/// persists or discards depending on external-modification state.
pub struct ShutdownReconciler {
    saver: Arc<dyn SaveWorkflow>,
}

impl ShutdownReconciler {
    pub fn new(saver: Arc<dyn SaveWorkflow>) -> Self {
        Self { saver }
    }

    /// Best-effort sweep over a snapshot of the registry.
    ///
    /// One handle's failure never blocks the rest; it is logged, recorded in
    /// the report, and flagged as an abort signal.
    pub fn reconcile_all(&self, registry: &HandleRegistry) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        for handle in registry.snapshot() {
            match self.reconcile(&handle) {
                Ok(cancelled) => {
                    report.reconciled += 1;
                    if cancelled {
                        report.aborted = true;
                    }
                }
                Err(error) => {
                    warn!(path = %handle.source(), %error, "shutdown reconciliation failed for handle");
                    report.aborted = true;
                    report
                        .failures
                        .push((handle.source().path().to_path_buf(), error.to_string()));
                }
            }
        }
        report
    }

    /// Returns whether the user cancelled this handle's save.
    fn reconcile(&self, handle: &Arc<DatabaseHandle>) -> Result<bool, SaveError> {
        let stripped = handle.with_database(|database| {
            let mut stripped = 0usize;
            for entry in database.entries_mut() {
                if entry.remove_field(TRANSIENT_HANDOFF_FIELD).is_some() {
                    stripped += 1;
                }
            }
            stripped
        });
        if stripped > 0 {
            handle.mark_dirty();
            info!(path = %handle.source(), stripped, "stripped transient hand-off markers");
        }

        if handle.is_externally_modified() {
            // The backing store moved underneath us; the host's save
            // workflow decides, and the user may cancel.
            match self.saver.save(handle)? {
                SaveOutcome::Saved => {
                    handle.clear_dirty();
                    Ok(false)
                }
                SaveOutcome::Cancelled => {
                    warn!(path = %handle.source(), "save cancelled, shutdown aborts");
                    Ok(true)
                }
            }
        } else if handle.is_dirty() {
            match self.saver.save(handle)? {
                SaveOutcome::Saved => {
                    handle.clear_dirty();
                    Ok(false)
                }
                SaveOutcome::Cancelled => Ok(true),
            }
        } else {
            Ok(false)
        }
    }
}
