//! Ordered post-open reconciliation passes.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::actions;
use crate::config::ShelfConfig;
use crate::database::ParsedDatabase;
use crate::error::ActionError;
use crate::prompt::Prompter;
use crate::registry::DatabaseHandle;
use crate::view::ViewHost;

/// One corrective pass over a freshly parsed database.
///
/// `is_necessary` must be idempotent and side-effect-free: it reads the
/// frozen parse outcome only, so the pipeline can be dry-run against a parse
/// without touching the live handle.
pub trait PostOpenAction: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_necessary(&self, parsed: &ParsedDatabase) -> bool;

    fn apply(&self, handle: &DatabaseHandle, parsed: &ParsedDatabase) -> Result<(), ActionError>;
}

/// Fixed, ordered chain of post-open actions, assembled once at startup.
///
/// Order is significant: path normalization runs before the path validator,
/// and duplicate-key handling runs last, against already-normalized data.
pub struct PostLoadPipeline {
    actions: Vec<Box<dyn PostOpenAction>>,
}

impl PostLoadPipeline {
    /// The standard five-pass chain.
    ///
    /// Duplicate-key handling is automatic when `resolve_duplicate_keys` is
    /// set, interactive otherwise.
    pub fn standard(config: &ShelfConfig, prompter: Arc<dyn Prompter>) -> Self {
        let mut list: Vec<Box<dyn PostOpenAction>> = vec![
            // Some exporters omit the leading separator on absolute paths.
            Box::new(actions::NormalizePathMarkers),
            Box::new(actions::ValidateLinkedPaths),
            Box::new(actions::DetectNewEntryTypes),
            Box::new(actions::MigrateLegacyFileLinks::new(prompter.clone())),
        ];
        if config.resolve_duplicate_keys {
            list.push(Box::new(actions::ResolveDuplicateKeys));
        } else {
            list.push(Box::new(actions::WarnDuplicateKeys::new(prompter)));
        }
        PostLoadPipeline { actions: list }
    }

    /// A pipeline over a caller-supplied action list.
    pub fn with_actions(actions: Vec<Box<dyn PostOpenAction>>) -> Self {
        PostLoadPipeline { actions }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn action_names(&self) -> Vec<&'static str> {
        self.actions.iter().map(|action| action.name()).collect()
    }

    /// Run every action, in order, against one freshly opened handle.
    ///
    /// Every action's necessity is evaluated on every run — no
    /// short-circuiting. The handle's view is raised before an action
    /// applies only when `must_activate_view` is set. A failing action is
    /// logged and skipped; already-applied actions stay applied.
    pub fn run(
        &self,
        handle: &DatabaseHandle,
        parsed: &ParsedDatabase,
        must_activate_view: bool,
        views: &dyn ViewHost,
    ) {
        for action in &self.actions {
            if !action.is_necessary(parsed) {
                debug!(action = action.name(), "post-open action not necessary");
                continue;
            }
            if must_activate_view {
                if let Some(view) = handle.view() {
                    views.activate(view);
                }
            }
            if let Err(error) = action.apply(handle, parsed) {
                warn!(action = action.name(), %error, "post-open action failed, continuing");
            }
        }
    }
}
