/*
 * format.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Runs a document's citations through a fresh citation engine.
 */

use std::collections::HashMap;

use docxcite_xml::NodeId;
use tracing::debug;

use crate::cancellation::Cancellation;
use crate::engine::{EngineFactory, EngineSources};
use crate::error::Result;
use crate::extract::Citation;
use crate::progress::ProgressSink;

/// Identifies a placeholder within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placeholder {
    pub part: usize,
    pub node: NodeId,
}

impl Placeholder {
    pub fn of(citation: &Citation) -> Self {
        Self {
            part: citation.part,
            node: citation.node,
        }
    }
}

/// Output of one document's formatting pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormattedResult {
    pub formatted: HashMap<Placeholder, String>,
    /// `bibstart + entries + bibend`.
    pub bibliography: String,
}

impl FormattedResult {
    pub fn get(&self, citation: &Citation) -> Option<&str> {
        self.formatted
            .get(&Placeholder::of(citation))
            .map(String::as_str)
    }
}

/// Format every citation of a document, then build its bibliography.
///
/// Citations are appended in chunks of `chunk_size`. Before each chunk the
/// cancellation token is checked and, after the first, the task yields. A
/// citation none of whose items has a record aborts the pass with
/// [`crate::Error::NoResolvableCitationItems`].
pub async fn format_citations(
    citations: &[Citation],
    factory: &dyn EngineFactory,
    sources: EngineSources,
    chunk_size: usize,
    cancellation: &Cancellation,
    progress: &dyn ProgressSink,
) -> Result<FormattedResult> {
    let records = sources.records.clone();
    let mut engine = factory.create(sources)?;
    let total = citations.len();
    let mut texts: Vec<Option<String>> = vec![None; total];

    for (chunk_index, chunk) in citations.chunks(chunk_size.max(1)).enumerate() {
        cancellation.check()?;
        if chunk_index > 0 {
            tokio::task::yield_now().await;
        }
        let offset = chunk_index * chunk_size.max(1);
        progress.emit(&format!("Citing {}/{} ...", offset, total));

        for citation in chunk {
            let cluster = citation.cluster(&records)?;
            for (index, text) in engine.append_citation_cluster(&cluster)? {
                if let Some(slot) = texts.get_mut(index) {
                    *slot = Some(text);
                }
            }
        }
    }
    cancellation.check()?;

    progress.emit("makeBibliography ...");
    let bibliography = engine.make_bibliography()?.render();

    let formatted: HashMap<Placeholder, String> = citations
        .iter()
        .zip(texts)
        .filter_map(|(citation, text)| Some((Placeholder::of(citation), text?)))
        .collect();

    debug!(
        citations = total,
        formatted = formatted.len(),
        "Formatted citations"
    );
    Ok(FormattedResult {
        formatted,
        bibliography,
    })
}
