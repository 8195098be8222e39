//! Core data model: sources, entries, databases, and parse outcomes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Identity of one bibliography file on disk: the normalized absolute path.
///
/// The registry keys handles by this identity, so two requests for the same
/// file must normalize to the same `BibSource`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BibSource(PathBuf);

impl BibSource {
    /// Normalize a path into a registry identity.
    ///
    /// Relative paths are resolved against the current working directory and
    /// `.` components are stripped. The file does not have to exist —
    /// existence is the admission guard's question, not an identity question.
    pub fn normalize(path: &Path) -> io::Result<Self> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        let mut normalized = PathBuf::new();
        for component in absolute.components() {
            match component {
                Component::CurDir => {}
                other => normalized.push(other.as_os_str()),
            }
        }
        Ok(BibSource(normalized))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Directory containing the source file, for resolving relative links.
    pub fn parent(&self) -> Option<&Path> {
        self.0.parent()
    }
}

impl fmt::Display for BibSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// One bibliography entry: a cite key, an entry type, and free-form fields.
///
/// Field names are case-insensitive and stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibEntry {
    pub cite_key: String,
    pub entry_type: String,
    fields: BTreeMap<String, String>,
}

impl BibEntry {
    pub fn new(cite_key: impl Into<String>, entry_type: impl Into<String>) -> Self {
        BibEntry {
            cite_key: cite_key.into(),
            entry_type: entry_type.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn get_field(&self, name: &str) -> Option<&str> {
        self.fields.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_lowercase(), value.into());
    }

    pub fn remove_field(&mut self, name: &str) -> Option<String> {
        self.fields.remove(&name.to_lowercase())
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(&name.to_lowercase())
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// An in-memory bibliography database: an ordered list of entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BibDatabase {
    entries: Vec<BibEntry>,
}

impl BibDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<BibEntry>) -> Self {
        BibDatabase { entries }
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BibEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [BibEntry] {
        &mut self.entries
    }

    pub fn push(&mut self, entry: BibEntry) {
        self.entries.push(entry);
    }
}

/// Metadata carried alongside a database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseMeta {
    /// Entry types found in the file that are not in the standard set.
    pub custom_entry_types: BTreeSet<String>,
}

/// Outcome of a successful parse.
///
/// Immutable once produced: post-open actions read their necessity off this
/// frozen snapshot and apply changes to the live handle, which keeps a
/// dry-run of the pipeline side-effect free. A parse failure is a
/// [`LoadError`](crate::loader::LoadError), never an empty `ParsedDatabase`.
#[derive(Debug, Clone)]
pub struct ParsedDatabase {
    pub database: BibDatabase,
    pub meta: DatabaseMeta,
    /// Character encoding the file was read with.
    pub encoding: String,
    /// Non-fatal notes from the loader, carried onto the handle at open.
    pub warnings: Vec<String>,
}

impl ParsedDatabase {
    pub fn new(database: BibDatabase, encoding: impl Into<String>) -> Self {
        ParsedDatabase {
            database,
            meta: DatabaseMeta::default(),
            encoding: encoding.into(),
            warnings: Vec::new(),
        }
    }

    pub fn entry_count(&self) -> usize {
        self.database.entry_count()
    }
}
