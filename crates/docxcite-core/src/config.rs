/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Configuration for a synchronization run.
 */

use serde::{Deserialize, Serialize};

/// Markup parts that may hold citation fields, in lookup order.
pub const DEFAULT_PARTS: &[&str] = &[
    "word/document.xml",
    "word/footnotes.xml",
    "word/endnotes.xml",
];

/// Configuration for a synchronization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Archive paths of the markup parts to scan for citation fields.
    pub parts: Vec<String>,

    /// Number of citations formatted or rewritten between yield points.
    /// Default: 20.
    pub chunk_size: usize,

    /// Number of item keys per request to the bibliographic API.
    /// Default: 50.
    pub page_size: usize,

    /// Languages whose locale data is handed to the citation engine.
    pub locales: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            parts: DEFAULT_PARTS.iter().map(|p| p.to_string()).collect(),
            chunk_size: 20,
            page_size: 50,
            locales: vec!["en-GB".to_string(), "en-US".to_string()],
        }
    }
}

impl SyncConfig {
    /// Chunk size, never zero.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }

    /// Page size, never zero.
    pub fn page_size(&self) -> usize {
        self.page_size.max(1)
    }

    /// Whether `path` is one of the configured markup parts.
    pub fn is_markup_part(&self, path: &str) -> bool {
        self.parts.iter().any(|p| p == path)
    }
}
