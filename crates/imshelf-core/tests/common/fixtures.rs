//! Shared stubs and fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use imshelf_core::{
    AuditEvent, AuditSink, BibDatabase, BibEntry, DatabaseLoader, LoadError, ParsedDatabase,
    PromptResponse, Prompter, UserPrompt,
};

/// Loader returning a fixed entry set, failing the first `fail_times` calls.
pub struct StubLoader {
    pub entries: Vec<BibEntry>,
    pub fail_times: u32,
    pub calls: AtomicU32,
}

impl StubLoader {
    pub fn with_entries(entries: Vec<BibEntry>) -> Self {
        StubLoader {
            entries,
            fail_times: 0,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing(fail_times: u32) -> Self {
        StubLoader {
            entries: vec![entry("smith2024", "article")],
            fail_times,
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DatabaseLoader for StubLoader {
    fn load(
        &self,
        _path: &Path,
        encoding: &str,
        _source_hint: &str,
    ) -> Result<ParsedDatabase, LoadError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.fail_times {
            return Err(LoadError::InvalidFormat {
                message: format!("stub failure {call}"),
            });
        }
        Ok(ParsedDatabase::new(
            BibDatabase::from_entries(self.entries.clone()),
            encoding,
        ))
    }
}

/// Collects every audit event it sees.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<AuditEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl AuditSink for RecordingSink {
    fn record(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Answers every prompt with a fixed response and remembers what was asked.
pub struct RecordingPrompter {
    pub response: PromptResponse,
    pub asked: Mutex<Vec<String>>,
}

impl RecordingPrompter {
    pub fn proceeding() -> Self {
        RecordingPrompter {
            response: PromptResponse::Proceed,
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn aborting() -> Self {
        RecordingPrompter {
            response: PromptResponse::Abort,
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked_kinds(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

impl Prompter for RecordingPrompter {
    fn ask(&self, prompt: &UserPrompt) -> PromptResponse {
        self.asked.lock().unwrap().push(prompt.kind().to_string());
        self.response
    }
}

pub fn entry(cite_key: &str, entry_type: &str) -> BibEntry {
    BibEntry::new(cite_key, entry_type)
}

/// Write a bibliography file into `dir` and return its path.
pub fn write_bib(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}
