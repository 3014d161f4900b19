/*
 * engine.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Contract of the citation formatting engine.
 */

//! The citation formatting engine contract.
//!
//! The engine is stateful: clusters are appended one at a time and the
//! bibliography is built from everything appended so far. Each document
//! gets a fresh engine from an [`EngineFactory`], fed through
//! [`EngineSources`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::records::RecordMap;

/// One cited item within a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterItem {
    pub id: String,
    pub locator: Option<String>,
    pub label: Option<String>,
}

/// Items rendered together at one placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationCluster {
    pub citation_items: Vec<ClusterItem>,
    pub note_index: u32,
}

/// A rendered bibliography.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bibliography {
    pub bibstart: String,
    pub entries: Vec<String>,
    pub bibend: String,
}

impl Bibliography {
    /// `bibstart + entries + bibend`.
    pub fn render(&self) -> String {
        let mut out = self.bibstart.clone();
        for entry in &self.entries {
            out.push_str(entry);
        }
        out.push_str(&self.bibend);
        out
    }
}

/// A stateful citation formatter.
pub trait CitationEngine: Send {
    /// Append a cluster.
    ///
    /// Returns `(cluster index, formatted text)` pairs for every cluster
    /// whose text changed, which includes the appended one. Indices count
    /// appended clusters from zero.
    fn append_citation_cluster(&mut self, cluster: &CitationCluster)
    -> Result<Vec<(usize, String)>>;

    /// Build the bibliography of every item cited so far.
    fn make_bibliography(&mut self) -> Result<Bibliography>;
}

/// Record and locale data handed to a new engine.
#[derive(Debug, Clone, Default)]
pub struct EngineSources {
    pub records: Arc<RecordMap>,

    /// Locale XML keyed by language tag (`en-US`).
    pub locales: Arc<HashMap<String, String>>,
}

impl EngineSources {
    pub fn retrieve_item(&self, id: &str) -> Option<&Value> {
        self.records.get(id)
    }

    pub fn retrieve_locale(&self, lang: &str) -> Option<&str> {
        self.locales.get(lang).map(String::as_str)
    }
}

/// Builds a fresh engine per formatting pass.
pub trait EngineFactory: Send + Sync {
    fn create(&self, sources: EngineSources) -> Result<Box<dyn CitationEngine>>;
}

impl<F> EngineFactory for F
where
    F: Fn(EngineSources) -> Result<Box<dyn CitationEngine>> + Send + Sync,
{
    fn create(&self, sources: EngineSources) -> Result<Box<dyn CitationEngine>> {
        self(sources)
    }
}
