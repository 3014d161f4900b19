/*
 * zip_container.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Zip-backed implementation of the Archive contract.
 */

use std::io::{Cursor, Read, Write};

use async_trait::async_trait;
use tracing::debug;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::progress::ProgressSink;

#[derive(Debug, Clone)]
struct Entry {
    path: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    is_dir: bool,
}

/// A `.docx` (zip) archive held fully in memory.
///
/// Entries are decompressed on open and recompressed on export, keeping
/// their original order and compression method. Added entries are deflated.
#[derive(Debug, Clone, Default)]
pub struct ZipContainer {
    entries: Vec<Entry>,
}

impl ZipContainer {
    /// Open an archive from its bytes.
    ///
    /// Decompression runs on the blocking pool.
    pub async fn open(bytes: Vec<u8>) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::read(&bytes))
            .await
            .map_err(|e| Error::Archive(e.to_string()))?
    }

    /// Open an archive from its bytes on the current thread.
    pub fn read(bytes: &[u8]) -> Result<Self> {
        let mut zip =
            zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| Error::Archive(e.to_string()))?;

        let mut entries = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let mut file = zip
                .by_index(index)
                .map_err(|e| Error::Archive(e.to_string()))?;
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            entries.push(Entry {
                path: file.name().to_string(),
                data,
                compression: file.compression(),
                is_dir: file.is_dir(),
            });
        }

        debug!(entries = entries.len(), "Opened archive");
        Ok(Self { entries })
    }

    /// Build an archive from `(path, bytes)` pairs.
    pub fn from_entries<P, D>(entries: impl IntoIterator<Item = (P, D)>) -> Self
    where
        P: Into<String>,
        D: Into<Vec<u8>>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(path, data)| Entry {
                    path: path.into(),
                    data: data.into(),
                    compression: CompressionMethod::Deflated,
                    is_dir: false,
                })
                .collect(),
        }
    }

    /// Raw bytes of an entry.
    pub fn entry_bytes(&self, path: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.path == path)
            .map(|e| e.data.as_slice())
    }

    /// Compress every entry, calling `written` with the count after each one.
    fn write_zip(&self, mut written: impl FnMut(usize)) -> Result<Vec<u8>> {
        let export_err = |e: zip::result::ZipError| Error::Export(e.to_string());
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));

        for (index, entry) in self.entries.iter().enumerate() {
            let options = SimpleFileOptions::default().compression_method(entry.compression);
            if entry.is_dir {
                writer
                    .add_directory(entry.path.as_str(), options)
                    .map_err(export_err)?;
            } else {
                writer
                    .start_file(entry.path.as_str(), options)
                    .map_err(export_err)?;
                writer
                    .write_all(&entry.data)
                    .map_err(|e| Error::Export(e.to_string()))?;
            }
            written(index + 1);
        }

        let cursor = writer.finish().map_err(export_err)?;
        Ok(cursor.into_inner())
    }
}

#[async_trait]
impl Archive for ZipContainer {
    fn entry_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }

    fn read_text(&self, path: &str) -> Result<Option<String>> {
        let Some(bytes) = self.entry_bytes(path) else {
            return Ok(None);
        };
        String::from_utf8(bytes.to_vec())
            .map(Some)
            .map_err(|e| Error::Archive(format!("{} is not UTF-8: {}", path, e)))
    }

    fn remove(&mut self, path: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.path != path);
        self.entries.len() != before
    }

    fn add_text(&mut self, path: &str, text: String) {
        self.entries.push(Entry {
            path: path.to_string(),
            data: text.into_bytes(),
            compression: CompressionMethod::Deflated,
            is_dir: false,
        });
    }

    /// Compression runs on the blocking pool; progress is relayed back to
    /// `progress` from the calling task as entries are written.
    async fn export(&self, progress: &dyn ProgressSink) -> Result<Vec<u8>> {
        let container = self.clone();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let task = tokio::task::spawn_blocking(move || {
            container.write_zip(|count| {
                let _ = tx.send(count);
            })
        });

        // The channel closes once the blocking closure (and its sender) is done.
        while let Some(count) = rx.recv().await {
            progress.emit(&format!("Progress {}", count));
        }

        let bytes = task.await.map_err(|e| Error::Export(e.to_string()))??;
        debug!(bytes = bytes.len(), "Exported archive");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgress;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_export_then_open_round_trips() {
        let archive = ZipContainer::from_entries([
            ("[Content_Types].xml", "<Types/>"),
            ("word/document.xml", "<w:document/>"),
        ]);

        let bytes = archive.export(&NoopProgress).await.unwrap();
        let reopened = ZipContainer::open(bytes).await.unwrap();

        assert_eq!(
            reopened.entry_names(),
            vec!["[Content_Types].xml", "word/document.xml"]
        );
        assert_eq!(
            reopened.read_text("word/document.xml").unwrap().as_deref(),
            Some("<w:document/>")
        );
    }

    #[tokio::test]
    async fn test_export_reports_increasing_progress() {
        let archive = ZipContainer::from_entries([("a", "1"), ("b", "2"), ("c", "3")]);
        let seen = Mutex::new(Vec::new());
        let sink = |m: &str| seen.lock().unwrap().push(m.to_string());

        archive.export(&sink).await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Progress 1", "Progress 2", "Progress 3"]
        );
    }

    #[tokio::test]
    async fn test_export_leaves_container_usable() {
        let mut archive = ZipContainer::from_entries([("a", "1")]);
        let first = archive.export(&NoopProgress).await.unwrap();

        archive.add_text("b", "2".to_string());
        let second = archive.export(&NoopProgress).await.unwrap();

        assert_eq!(ZipContainer::read(&first).unwrap().entry_names(), vec!["a"]);
        assert_eq!(
            ZipContainer::read(&second).unwrap().entry_names(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_write_zip_counts_every_entry() {
        let archive = ZipContainer::from_entries([("a", "1"), ("b", "2")]);
        let mut counts = Vec::new();
        archive.write_zip(|n| counts.push(n)).unwrap();
        assert_eq!(counts, vec![1, 2]);
    }

    #[test]
    fn test_remove_and_add_moves_entry_to_end() {
        let mut archive = ZipContainer::from_entries([("a", "1"), ("b", "2")]);
        assert!(archive.remove("a"));
        assert!(!archive.remove("missing"));
        archive.add_text("a", "updated".to_string());

        assert_eq!(archive.entry_names(), vec!["b", "a"]);
        assert_eq!(archive.read_text("a").unwrap().as_deref(), Some("updated"));
        assert_eq!(archive.read_text("zzz").unwrap(), None);
    }

    #[test]
    fn test_read_rejects_non_zip() {
        assert!(matches!(
            ZipContainer::read(b"not a zip"),
            Err(Error::Archive(_))
        ));
    }
}
