/*
 * run.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Orchestrates a synchronization run over a batch of documents.
 */

//! Synchronization runs.
//!
//! A run loads every document, fetches the records cited anywhere in the
//! batch once, then formats and rewrites each document independently:
//!
//! ```text
//! load + extract ──► merge ids ──► fetch records ──► per document:
//!                                                     format (fresh engine)
//!                                                     rewrite fields
//!                                                     DocumentHandle
//! ```
//!
//! Failures confined to a document (a missing part, a citation with no
//! records) become that document's outcome. A failed fetch or a cancelled
//! run fails the whole run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::archive::Archive;
use crate::cancellation::Cancellation;
use crate::config::SyncConfig;
use crate::document::{DocumentHandle, SourceDocument};
use crate::engine::{EngineFactory, EngineSources};
use crate::error::{Result, Warning};
use crate::format::format_citations;
use crate::progress::{NoopProgress, ProgressSink};
use crate::records::{Credentials, RecordMap, RecordSource};

/// A document handed to a run.
pub struct DocumentInput {
    pub name: String,
    pub archive: Box<dyn Archive>,
}

impl DocumentInput {
    pub fn new(name: impl Into<String>, archive: impl Archive + 'static) -> Self {
        Self {
            name: name.into(),
            archive: Box::new(archive),
        }
    }
}

/// What happened to one document.
#[derive(Debug)]
pub struct DocumentOutcome {
    pub name: String,
    /// Recovered anomalies. Also available on a successful handle.
    pub warnings: Vec<Warning>,
    pub result: Result<DocumentHandle>,
}

impl DocumentOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of a run.
#[derive(Debug)]
pub struct RunOutput {
    /// One outcome per input, in input order.
    pub documents: Vec<DocumentOutcome>,
    /// Bibliographies of the successful documents, concatenated.
    pub bibliography: String,
    pub records: Arc<RecordMap>,
}

impl RunOutput {
    pub fn failed(&self) -> impl Iterator<Item = &DocumentOutcome> {
        self.documents.iter().filter(|d| !d.is_ok())
    }
}

/// Runs batches of documents through extraction, formatting and rewriting.
pub struct Synchronizer {
    config: SyncConfig,
    source: Arc<dyn RecordSource>,
    engine: Arc<dyn EngineFactory>,
    locales: Arc<HashMap<String, String>>,
    progress: Arc<dyn ProgressSink>,
    cancellation: Cancellation,
}

impl Synchronizer {
    pub fn new(source: Arc<dyn RecordSource>, engine: Arc<dyn EngineFactory>) -> Self {
        Self {
            config: SyncConfig::default(),
            source,
            engine,
            locales: Arc::new(HashMap::new()),
            progress: Arc::new(NoopProgress),
            cancellation: Cancellation::new(),
        }
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Locale XML keyed by language tag.
    pub fn with_locales(mut self, locales: HashMap<String, String>) -> Self {
        self.locales = Arc::new(locales);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Process a batch of documents.
    pub async fn run(
        &self,
        credentials: &Credentials,
        inputs: Vec<DocumentInput>,
    ) -> Result<RunOutput> {
        let progress = self.progress.as_ref();
        progress.emit("extracting XML ...");

        let loaded: Vec<(String, Result<SourceDocument>)> = inputs
            .into_iter()
            .map(|input| {
                let result = SourceDocument::load(input.name.clone(), input.archive, &self.config);
                (input.name, result)
            })
            .collect();

        let ids = unique_ids(loaded.iter().filter_map(|(_, r)| r.as_ref().ok()));
        let records = Arc::new(self.fetch_records(credentials, &ids).await?);
        info!(requested = ids.len(), found = records.len(), "Fetched records");

        let documents = join_all(
            loaded
                .into_iter()
                .map(|(name, loaded)| self.process(name, loaded, records.clone())),
        )
        .await;

        // Documents that were being rewritten have finished by now.
        self.cancellation.check()?;

        let bibliography = documents
            .iter()
            .filter_map(|d| d.result.as_ref().ok())
            .map(|handle| handle.bibliography())
            .collect::<String>();

        Ok(RunOutput {
            documents,
            bibliography,
            records,
        })
    }

    async fn fetch_records(&self, credentials: &Credentials, ids: &[String]) -> Result<RecordMap> {
        if ids.is_empty() {
            return Ok(RecordMap::new());
        }
        self.progress.emit("fetching from zotero ...");
        let items = self.source.fetch(credentials, ids).await?;
        Ok(RecordMap::from_items(items))
    }

    async fn process(
        &self,
        name: String,
        loaded: Result<SourceDocument>,
        records: Arc<RecordMap>,
    ) -> DocumentOutcome {
        let mut document = match loaded {
            Ok(document) => document,
            Err(error) => {
                warn!(document = %name, %error, "Failed to load document");
                return DocumentOutcome {
                    name,
                    warnings: Vec::new(),
                    result: Err(error),
                };
            }
        };

        let sources = EngineSources {
            records,
            locales: self.locales.clone(),
        };
        let formatted = match format_citations(
            &document.citations,
            self.engine.as_ref(),
            sources,
            self.config.chunk_size(),
            &self.cancellation,
            self.progress.as_ref(),
        )
        .await
        {
            Ok(formatted) => formatted,
            Err(error) => {
                warn!(document = %name, %error, "Failed to format citations");
                return DocumentOutcome {
                    name,
                    warnings: document.warnings,
                    result: Err(error),
                };
            }
        };

        document
            .apply_formatted(&formatted, self.config.chunk_size())
            .await;
        let warnings = document.warnings.clone();
        info!(
            document = %name,
            citations = document.citations.len(),
            warnings = warnings.len(),
            "Rewrote citation fields"
        );

        DocumentOutcome {
            name,
            warnings,
            result: Ok(document.into_handle(formatted.bibliography)),
        }
    }
}

/// Every cited identifier across `documents`, once, in first-use order.
fn unique_ids<'a>(documents: impl Iterator<Item = &'a SourceDocument>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for document in documents {
        for id in document.cited_ids() {
            if seen.insert(id) {
                ids.push(id.to_string());
            }
        }
    }
    ids
}
