//! The open-handle registry: at most one handle per normalized path,
//! refcounted for shared consumers.
//!
//! Locking discipline: the slot map has a single mutex, and every public
//! operation is a mutation point on it — nothing else touches the map.
//! Admission prompts and parsing never run under that lock; a `Loading` slot
//! plus a condvar park concurrent opens of the same path until the first one
//! finishes, so each path costs exactly one parse. Connection counts change
//! only while the lock is held, so the count and the slot map never disagree.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::admission::FileAdmissionGuard;
use crate::audit::{AuditEvent, AuditEventKind, AuditSink};
use crate::config::ShelfConfig;
use crate::database::{BibDatabase, BibSource, DatabaseMeta, ParsedDatabase};
use crate::error::OpenError;
use crate::loader::{DatabaseLoader, LoadError};
use crate::pipeline::PostLoadPipeline;
use crate::prompt::Prompter;
use crate::view::{ViewHost, ViewId};

/// Actor name on registry-originated audit events.
const AUDIT_ACTOR: &str = "handle-registry";

/// One open, in-memory bibliography database plus its host view.
///
/// Created exactly once per distinct [`BibSource`]; shared consumers hold
/// connections, and the registry disposes of the handle only when the last
/// connection releases.
#[derive(Debug)]
pub struct DatabaseHandle {
    source: BibSource,
    database: Mutex<BibDatabase>,
    meta: Mutex<DatabaseMeta>,
    encoding: String,
    view: Mutex<Option<ViewId>>,
    connections: AtomicUsize,
    dirty: AtomicBool,
    loaded_modified: Option<SystemTime>,
    warnings: Mutex<Vec<String>>,
}

impl DatabaseHandle {
    /// Wrap a parse outcome in a handle not owned by any registry.
    ///
    /// Hosts embedding only the pipeline (and tests) use this; the registry
    /// builds its own handles through the same path.
    pub fn from_parse(source: BibSource, parsed: &ParsedDatabase) -> Arc<Self> {
        let loaded_modified = std::fs::metadata(source.path())
            .and_then(|meta| meta.modified())
            .ok();
        Arc::new(DatabaseHandle {
            source,
            database: Mutex::new(parsed.database.clone()),
            meta: Mutex::new(parsed.meta.clone()),
            encoding: parsed.encoding.clone(),
            view: Mutex::new(None),
            connections: AtomicUsize::new(1),
            dirty: AtomicBool::new(false),
            loaded_modified,
            warnings: Mutex::new(parsed.warnings.clone()),
        })
    }

    pub fn source(&self) -> &BibSource {
        &self.source
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn view(&self) -> Option<ViewId> {
        *self.view.lock().expect("view mutex poisoned")
    }

    pub(crate) fn set_view(&self, view: ViewId) {
        *self.view.lock().expect("view mutex poisoned") = Some(view);
    }

    pub fn entry_count(&self) -> usize {
        self.database
            .lock()
            .expect("database mutex poisoned")
            .entry_count()
    }

    /// Run `f` against the live database under its lock.
    pub fn with_database<R>(&self, f: impl FnOnce(&mut BibDatabase) -> R) -> R {
        let mut database = self.database.lock().expect("database mutex poisoned");
        f(&mut database)
    }

    /// Run `f` against the handle metadata under its lock.
    pub fn with_meta<R>(&self, f: impl FnOnce(&mut DatabaseMeta) -> R) -> R {
        let mut meta = self.meta.lock().expect("meta mutex poisoned");
        f(&mut meta)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn push_warning(&self, warning: String) {
        self.warnings
            .lock()
            .expect("warnings mutex poisoned")
            .push(warning);
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .expect("warnings mutex poisoned")
            .clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::Acquire)
    }

    /// True while consumers besides the caller still hold this handle.
    pub fn has_more_connections(&self) -> bool {
        self.connections() > 1
    }

    fn add_connection(&self) {
        self.connections.fetch_add(1, Ordering::AcqRel);
    }

    /// Release one connection, returning how many remain. Saturates at zero.
    fn release_connection(&self) -> usize {
        let mut current = self.connections.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return 0;
            }
            match self.connections.compare_exchange(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return current - 1,
                Err(actual) => current = actual,
            }
        }
    }

    /// Whether the backing file changed on disk since this handle loaded it.
    pub fn is_externally_modified(&self) -> bool {
        let Some(loaded) = self.loaded_modified else {
            return false;
        };
        match std::fs::metadata(self.source.path()).and_then(|meta| meta.modified()) {
            Ok(current) => current > loaded,
            Err(_) => false,
        }
    }
}

enum Slot {
    /// An open is in flight on another caller; wait for it.
    Loading,
    Ready(Arc<DatabaseHandle>),
}

/// Registry of open database handles, keyed by normalized path.
pub struct HandleRegistry {
    slots: Mutex<HashMap<BibSource, Slot>>,
    loaded: Condvar,
    guard: FileAdmissionGuard,
    config: ShelfConfig,
    loader: Arc<dyn DatabaseLoader>,
    prompter: Arc<dyn Prompter>,
    views: Arc<dyn ViewHost>,
    audit: Arc<dyn AuditSink>,
    pipeline: PostLoadPipeline,
    view_state: Mutex<HashSet<ViewId>>,
}

impl HandleRegistry {
    /// Registry with the standard post-open pipeline for `config`.
    pub fn new(
        config: ShelfConfig,
        loader: Arc<dyn DatabaseLoader>,
        prompter: Arc<dyn Prompter>,
        views: Arc<dyn ViewHost>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let pipeline = PostLoadPipeline::standard(&config, prompter.clone());
        Self::with_pipeline(config, loader, prompter, views, audit, pipeline)
    }

    /// Registry with a caller-assembled pipeline.
    pub fn with_pipeline(
        config: ShelfConfig,
        loader: Arc<dyn DatabaseLoader>,
        prompter: Arc<dyn Prompter>,
        views: Arc<dyn ViewHost>,
        audit: Arc<dyn AuditSink>,
        pipeline: PostLoadPipeline,
    ) -> Self {
        HandleRegistry {
            slots: Mutex::new(HashMap::new()),
            loaded: Condvar::new(),
            guard: FileAdmissionGuard::new(config.lock.clone()),
            config,
            loader,
            prompter,
            views,
            audit,
            pipeline,
            view_state: Mutex::new(HashSet::new()),
        }
    }

    /// Open (or re-surface) the database at `path` with the configured
    /// fallback encoding.
    pub fn open(&self, path: &Path, raise_view: bool) -> Result<Arc<DatabaseHandle>, OpenError> {
        self.open_with_encoding(path, None, raise_view)
    }

    /// Open with a per-source encoding override.
    ///
    /// If a handle already exists for the normalized path it is returned
    /// (and its view raised when asked) without re-parsing.
    pub fn open_with_encoding(
        &self,
        path: &Path,
        encoding: Option<&str>,
        raise_view: bool,
    ) -> Result<Arc<DatabaseHandle>, OpenError> {
        let source = BibSource::normalize(path).map_err(|source_err| OpenError::Io {
            path: path.to_path_buf(),
            source: source_err,
        })?;

        loop {
            let mut slots = self.slots.lock().expect("registry mutex poisoned");
            match slots.get(&source) {
                Some(Slot::Ready(handle)) => {
                    let handle = handle.clone();
                    // Count the connection under the lock, so a concurrent
                    // close of the last connection cannot unregister the
                    // handle between lookup and increment.
                    handle.add_connection();
                    drop(slots);
                    if raise_view {
                        if let Some(view) = handle.view() {
                            self.views.activate(view);
                        }
                    }
                    debug!(path = %source, connections = handle.connections(), "reusing open handle");
                    self.audit.record(AuditEvent {
                        actor: AUDIT_ACTOR.into(),
                        kind: AuditEventKind::FileChanged,
                        path: source.path().to_path_buf(),
                        entry_count: handle.entry_count(),
                    });
                    return Ok(handle);
                }
                Some(Slot::Loading) => {
                    // Another caller is opening this path; park until it
                    // resolves, then look again.
                    let _slots = self.loaded.wait(slots).expect("registry mutex poisoned");
                    continue;
                }
                None => {
                    slots.insert(source.clone(), Slot::Loading);
                }
            }
            break;
        }

        // This caller owns the load. Admission, prompts, and parsing all run
        // without the registry lock.
        let result = self.load(&source, encoding, raise_view);

        let mut slots = self.slots.lock().expect("registry mutex poisoned");
        match &result {
            Ok(handle) => {
                slots.insert(source.clone(), Slot::Ready(handle.clone()));
            }
            Err(_) => {
                slots.remove(&source);
            }
        }
        drop(slots);
        self.loaded.notify_all();

        if let Ok(handle) = &result {
            self.audit.record(AuditEvent {
                actor: AUDIT_ACTOR.into(),
                kind: AuditEventKind::FileOpened,
                path: source.path().to_path_buf(),
                entry_count: handle.entry_count(),
            });
        }
        result
    }

    fn load(
        &self,
        source: &BibSource,
        encoding: Option<&str>,
        raise_view: bool,
    ) -> Result<Arc<DatabaseHandle>, OpenError> {
        let path = source.path();
        self.guard.negotiate(path, self.prompter.as_ref())?;

        let encoding = encoding.unwrap_or(&self.config.bibtex_encoding);
        info!(path = %source, encoding, "opening bibliography database");

        let mut last_error: Option<LoadError> = None;
        let mut parsed: Option<ParsedDatabase> = None;
        for attempt in 1..=self.config.max_open_attempts {
            match self
                .loader
                .load(path, encoding, &self.config.bibtex_source)
            {
                Ok(outcome) => {
                    parsed = Some(outcome);
                    break;
                }
                Err(error) => {
                    warn!(path = %source, attempt, %error, "parse attempt failed");
                    last_error = Some(error);
                }
            }
        }
        let Some(parsed) = parsed else {
            return Err(OpenError::ParseFailure {
                path: path.to_path_buf(),
                attempts: self.config.max_open_attempts,
                message: last_error
                    .map(|error| error.to_string())
                    .unwrap_or_default(),
            });
        };

        let handle = DatabaseHandle::from_parse(source.clone(), &parsed);
        let view = self.views.attach(source, handle.entry_count());
        handle.set_view(view);
        if raise_view {
            self.views.activate(view);
        }
        info!(path = %source, entries = handle.entry_count(), "opened database");

        // Reconciliation runs against the frozen parse outcome and the live
        // handle. A GUI host schedules this call onto its event thread.
        self.pipeline
            .run(&handle, &parsed, raise_view, self.views.as_ref());

        Ok(handle)
    }

    /// Handle for `path` if one is open. A load in flight does not count.
    pub fn lookup(&self, path: &Path) -> Option<Arc<DatabaseHandle>> {
        let source = BibSource::normalize(path).ok()?;
        let slots = self.slots.lock().expect("registry mutex poisoned");
        match slots.get(&source) {
            Some(Slot::Ready(handle)) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Release one connection on `handle`.
    ///
    /// The registry entry and the view go away only when no connections
    /// remain; closing a handle that is still shared is a no-op, not an
    /// error.
    pub fn close(&self, handle: &Arc<DatabaseHandle>) {
        // Decrement and remove under one lock acquisition; a reuse on the
        // open path counts its connection under the same lock, so the count
        // and the slot map never disagree.
        let mut slots = self.slots.lock().expect("registry mutex poisoned");
        let remaining = handle.release_connection();
        if remaining > 0 {
            debug!(path = %handle.source(), remaining, "handle still shared, keeping open");
            return;
        }
        slots.remove(handle.source());
        drop(slots);
        self.dispose(handle);
    }

    /// Release every open handle unconditionally, ignoring connection
    /// counts. Full-registry teardown, distinct from shutdown
    /// reconciliation.
    pub fn close_all(&self) {
        let drained: Vec<Arc<DatabaseHandle>> = {
            let mut slots = self.slots.lock().expect("registry mutex poisoned");
            slots
                .drain()
                .filter_map(|(_, slot)| match slot {
                    Slot::Ready(handle) => Some(handle),
                    Slot::Loading => None,
                })
                .collect()
        };
        for handle in drained {
            self.dispose(&handle);
        }
    }

    fn dispose(&self, handle: &Arc<DatabaseHandle>) {
        if let Some(view) = handle.view() {
            self.views.close(view);
        }
        self.audit.record(AuditEvent {
            actor: AUDIT_ACTOR.into(),
            kind: AuditEventKind::FileClosed,
            path: handle.source().path().to_path_buf(),
            entry_count: handle.entry_count(),
        });
        info!(path = %handle.source(), "closed database");
    }

    /// Snapshot of the open handles at this moment.
    pub fn snapshot(&self) -> Vec<Arc<DatabaseHandle>> {
        let slots = self.slots.lock().expect("registry mutex poisoned");
        slots
            .values()
            .filter_map(|slot| match slot {
                Slot::Ready(handle) => Some(handle.clone()),
                Slot::Loading => None,
            })
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.snapshot().len()
    }

    pub(crate) fn attach_view_state(&self, view: ViewId) {
        self.view_state
            .lock()
            .expect("view state mutex poisoned")
            .insert(view);
    }

    pub(crate) fn detach_view_state(&self, view: ViewId) {
        self.view_state
            .lock()
            .expect("view state mutex poisoned")
            .remove(&view);
    }

    pub fn view_state_attached(&self, view: ViewId) -> bool {
        self.view_state
            .lock()
            .expect("view state mutex poisoned")
            .contains(&view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{BibDatabase, BibEntry};
    use crate::prompt::AcceptAll;
    use crate::view::NullViewHost;
    use std::fs;
    use std::sync::atomic::AtomicU32;

    struct CountingLoader {
        calls: AtomicU32,
    }

    impl CountingLoader {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
            }
        }
    }

    impl DatabaseLoader for CountingLoader {
        fn load(
            &self,
            _path: &Path,
            encoding: &str,
            _source_hint: &str,
        ) -> Result<ParsedDatabase, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut database = BibDatabase::new();
            database.push(BibEntry::new("smith2024", "article"));
            Ok(ParsedDatabase::new(database, encoding))
        }
    }

    fn registry(loader: Arc<CountingLoader>) -> HandleRegistry {
        HandleRegistry::new(
            ShelfConfig::default(),
            loader,
            Arc::new(AcceptAll),
            Arc::new(NullViewHost::new()),
            Arc::new(crate::audit::NullAuditSink),
        )
    }

    fn write_bib(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("library.bib");
        fs::write(&path, "@article{smith2024, title = {T}}\n").unwrap();
        path
    }

    #[test]
    fn reopen_returns_same_handle_without_reparsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_bib(&dir);
        let loader = Arc::new(CountingLoader::new());
        let registry = registry(loader.clone());

        let first = registry.open(&path, false).unwrap();
        let second = registry.open(&path, false).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.connections(), 2);
    }

    #[test]
    fn close_is_refcounted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_bib(&dir);
        let registry = registry(Arc::new(CountingLoader::new()));

        let handle = registry.open(&path, false).unwrap();
        let again = registry.open(&path, false).unwrap();
        assert!(again.has_more_connections());

        registry.close(&again);
        assert!(registry.lookup(&path).is_some(), "entry stays while shared");

        registry.close(&handle);
        assert!(registry.lookup(&path).is_none());
    }

    #[test]
    fn lookup_uses_normalized_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_bib(&dir);
        let registry = registry(Arc::new(CountingLoader::new()));
        registry.open(&path, false).unwrap();

        let dotted = dir.path().join(".").join("library.bib");
        assert!(registry.lookup(&dotted).is_some());
    }

    #[test]
    fn close_all_ignores_connection_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_bib(&dir);
        let registry = registry(Arc::new(CountingLoader::new()));
        registry.open(&path, false).unwrap();
        registry.open(&path, false).unwrap();
        assert_eq!(registry.open_count(), 1);

        registry.close_all();
        assert_eq!(registry.open_count(), 0);
    }

    #[test]
    fn loader_warnings_land_on_the_handle() {
        let mut parsed = ParsedDatabase::new(BibDatabase::new(), "UTF-8");
        parsed
            .warnings
            .push("line 12: skipped malformed entry".to_string());
        let source = BibSource::normalize(Path::new("/refs/library.bib")).unwrap();
        let handle = DatabaseHandle::from_parse(source, &parsed);
        assert_eq!(handle.warnings(), vec!["line 12: skipped malformed entry"]);
    }

    #[test]
    fn view_state_follows_lifecycle() {
        let registry = Arc::new(registry(Arc::new(CountingLoader::new())));
        let adapter = crate::view::ViewEventAdapter::new(registry.clone());
        use crate::view::ViewLifecycleListener;

        let view = ViewId(7);
        adapter.after_view_created(view);
        assert!(registry.view_state_attached(view));
        adapter.after_view_close(view);
        assert!(!registry.view_state_attached(view));
    }
}
