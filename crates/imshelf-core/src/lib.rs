//! imshelf-core: bibliography-database admission and post-load reconciliation
//!
//! The open-database core of the imshelf reference shelf:
//! - admission: existence check, format-compatibility heuristic, and
//!   lock-file negotiation before a file may be opened
//! - registry: at most one refcounted handle per normalized path
//! - pipeline: a fixed ordered chain of post-open reconciliation passes over
//!   freshly parsed data
//! - shutdown: a best-effort sweep that strips transient markers and saves
//!   or discards each open handle
//!
//! Parsing, views, prompts, saving, and audit logging belong to the host and
//! sit behind trait seams: [`DatabaseLoader`], [`ViewHost`], [`Prompter`],
//! [`SaveWorkflow`], and [`AuditSink`].

pub mod actions;
pub mod admission;
pub mod audit;
pub mod config;
pub mod database;
pub mod error;
pub mod loader;
pub mod lockfile;
pub mod pipeline;
pub mod prompt;
pub mod registry;
pub mod shutdown;
pub mod view;

// Re-export main types for convenience
pub use admission::{AdmissionDecision, FileAdmissionGuard, RejectReason};
pub use audit::{AuditEvent, AuditEventKind, AuditSink, NullAuditSink, TracingAuditSink};
pub use config::{ConfigError, LockConfig, ShelfConfig};
pub use database::{BibDatabase, BibEntry, BibSource, DatabaseMeta, ParsedDatabase};
pub use error::{ActionError, OpenError, SaveError};
pub use loader::{DatabaseLoader, LoadError};
pub use pipeline::{PostLoadPipeline, PostOpenAction};
pub use prompt::{AcceptAll, DeclineAll, PromptResponse, Prompter, UserPrompt};
pub use registry::{DatabaseHandle, HandleRegistry};
pub use shutdown::{
    SaveOutcome, SaveWorkflow, ShutdownReconciler, ShutdownReport, TRANSIENT_HANDOFF_FIELD,
};
pub use view::{NullViewHost, ViewEventAdapter, ViewHost, ViewId, ViewLifecycleListener};
