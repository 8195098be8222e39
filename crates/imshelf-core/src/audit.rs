//! Audit-log seam: open/change/close events for the host's event logger.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventKind {
    FileOpened,
    FileChanged,
    FileClosed,
}

/// One audit record: who did what to which file, and how many entries it
/// held at the time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub actor: String,
    pub kind: AuditEventKind,
    pub path: PathBuf,
    pub entry_count: usize,
}

/// External audit sink collaborator.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Drops every event.
#[derive(Debug, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: AuditEvent) {}
}

/// Bridges audit events onto the tracing subscriber.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        info!(
            actor = %event.actor,
            kind = ?event.kind,
            path = %event.path.display(),
            entries = event.entry_count,
            "audit"
        );
    }
}
