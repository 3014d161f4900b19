/*
 * archive.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * The archive container contract and the exported blob type.
 */

//! Archive containers.
//!
//! The synchronization engine only needs a small contract from the
//! container holding a document's markup parts: list, read, remove and add
//! entries, then export everything as one binary object. [`Archive`] is that
//! contract; [`crate::ZipContainer`] implements it for zip files and
//! [`MemoryArchive`] keeps entries as plain text.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::progress::ProgressSink;

/// MIME type of exported Word documents.
pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// A container of named entries.
#[async_trait]
pub trait Archive: Send + Sync {
    /// Entry paths in archive order.
    fn entry_names(&self) -> Vec<String>;

    /// Read an entry as UTF-8 text. `Ok(None)` when there is no such entry.
    fn read_text(&self, path: &str) -> Result<Option<String>>;

    /// Remove an entry. Returns whether it existed.
    fn remove(&mut self, path: &str) -> bool;

    /// Add a text entry. An existing entry at `path` should be removed first.
    fn add_text(&mut self, path: &str, text: String);

    /// Export every entry as one binary object.
    ///
    /// Reports a monotonically increasing counter through `progress`. Must
    /// not modify the in-memory entries, so a failed export can be retried.
    async fn export(&self, progress: &dyn ProgressSink) -> Result<Vec<u8>>;
}

/// An exported document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl Blob {
    /// Wrap exported bytes as a Word document.
    pub fn docx(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: DOCX_MIME_TYPE,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// An archive whose entries are held as text in memory.
///
/// Export writes the entries as a JSON array of `[path, text]` pairs. A
/// number of upcoming exports can be made to fail with
/// [`MemoryArchive::fail_next_exports`].
#[derive(Debug, Default)]
pub struct MemoryArchive {
    entries: Vec<(String, String)>,
    exports: AtomicUsize,
    failures: AtomicUsize,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<P, T>(entries: impl IntoIterator<Item = (P, T)>) -> Self
    where
        P: Into<String>,
        T: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(p, t)| (p.into(), t.into()))
                .collect(),
            ..Default::default()
        }
    }

    /// Make the next `count` exports fail with [`Error::Export`].
    pub fn fail_next_exports(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Number of successful exports so far.
    pub fn export_count(&self) -> usize {
        self.exports.load(Ordering::SeqCst)
    }

    /// Decode bytes produced by [`Archive::export`] back into entries.
    pub fn decode(bytes: &[u8]) -> Result<Vec<(String, String)>> {
        serde_json::from_slice(bytes).map_err(|e| Error::Archive(e.to_string()))
    }
}

#[derive(Serialize)]
struct EntryRef<'a>(&'a str, &'a str);

#[async_trait]
impl Archive for MemoryArchive {
    fn entry_names(&self) -> Vec<String> {
        self.entries.iter().map(|(p, _)| p.clone()).collect()
    }

    fn read_text(&self, path: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, t)| t.clone()))
    }

    fn remove(&mut self, path: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(p, _)| p != path);
        self.entries.len() != before
    }

    fn add_text(&mut self, path: &str, text: String) {
        self.entries.push((path.to_string(), text));
    }

    async fn export(&self, progress: &dyn ProgressSink) -> Result<Vec<u8>> {
        // Let concurrent callers pile up behind an in-flight export.
        tokio::task::yield_now().await;

        let pending = self.failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures.store(pending - 1, Ordering::SeqCst);
            return Err(Error::Export("simulated export failure".to_string()));
        }

        let mut out = Vec::with_capacity(self.entries.len());
        for (index, (path, text)) in self.entries.iter().enumerate() {
            out.push(EntryRef(path, text));
            progress.emit(&format!("Progress {}", index + 1));
        }
        let bytes = serde_json::to_vec(&out).map_err(|e| Error::Export(e.to_string()))?;
        self.exports.fetch_add(1, Ordering::SeqCst);
        Ok(bytes)
    }
}
