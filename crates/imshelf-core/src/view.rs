//! View-host seam and the narrow view-lifecycle adapter.
//!
//! The core never touches a widget. It asks the host's [`ViewHost`] to
//! attach, raise, and dispose views, and consumes the host's view-lifecycle
//! notifications through [`ViewLifecycleListener`] — a four-method capability
//! set, not a host base class.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::database::BibSource;
use crate::registry::HandleRegistry;

/// Opaque identifier of one host view component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(pub u64);

/// Host-side view management.
pub trait ViewHost: Send + Sync {
    /// Create a view for a freshly opened database and return its id.
    fn attach(&self, source: &BibSource, entry_count: usize) -> ViewId;

    /// Raise/activate an existing view.
    fn activate(&self, view: ViewId);

    /// Dispose of a view.
    fn close(&self, view: ViewId);
}

/// Headless host: allocates ids and ignores activation.
#[derive(Debug, Default)]
pub struct NullViewHost {
    next: AtomicU64,
}

impl NullViewHost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ViewHost for NullViewHost {
    fn attach(&self, _source: &BibSource, _entry_count: usize) -> ViewId {
        ViewId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    fn activate(&self, _view: ViewId) {}

    fn close(&self, _view: ViewId) {}
}

/// View-lifecycle notifications consumed from the host.
pub trait ViewLifecycleListener: Send + Sync {
    fn before_view_change(&self, _old: Option<ViewId>, _new: Option<ViewId>) {}
    fn after_view_change(&self, _old: Option<ViewId>, _new: Option<ViewId>) {}
    fn after_view_created(&self, _view: ViewId) {}
    fn after_view_close(&self, _view: ViewId) {}
}

/// Keeps per-view state (the host's selection/mouse wiring) attached to live
/// views by composing over the registry.
pub struct ViewEventAdapter {
    registry: Arc<HandleRegistry>,
}

impl ViewEventAdapter {
    pub fn new(registry: Arc<HandleRegistry>) -> Self {
        Self { registry }
    }
}

impl ViewLifecycleListener for ViewEventAdapter {
    fn after_view_created(&self, view: ViewId) {
        self.registry.attach_view_state(view);
    }

    fn after_view_close(&self, view: ViewId) {
        self.registry.detach_view_state(view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn null_host_allocates_distinct_ids() {
        let host = NullViewHost::new();
        let source = BibSource::normalize(Path::new("/refs/library.bib")).unwrap();
        let a = host.attach(&source, 0);
        let b = host.attach(&source, 0);
        assert_ne!(a, b);
    }
}
