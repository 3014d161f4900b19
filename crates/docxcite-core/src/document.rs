/*
 * document.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Per-document state: parsed markup parts, citations and the output handle.
 */

use std::sync::Arc;

use docxcite_xml::XmlDocument;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

use crate::archive::{Archive, Blob};
use crate::assemble::assemble;
use crate::config::SyncConfig;
use crate::error::{Error, Result, Warning};
use crate::extract::{Citation, extract_citations};
use crate::format::FormattedResult;
use crate::progress::ProgressSink;
use crate::rewrite::rewrite_field;

/// A parsed markup part of an archive.
#[derive(Debug, Clone)]
pub struct MarkupPart {
    /// Archive path, e.g. `word/document.xml`.
    pub path: String,
    pub doc: XmlDocument,
    /// Whether any field in this part was rewritten.
    pub modified: bool,
}

/// A document loaded for synchronization.
pub struct SourceDocument {
    pub name: String,
    pub archive: Box<dyn Archive>,
    pub parts: Vec<MarkupPart>,
    pub citations: Vec<Citation>,
    pub warnings: Vec<Warning>,
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("name", &self.name)
            .field("parts", &self.parts.len())
            .field("citations", &self.citations.len())
            .field("warnings", &self.warnings)
            .finish()
    }
}

impl SourceDocument {
    /// Parse the configured markup parts of `archive` and extract their
    /// citations.
    ///
    /// Parts are taken in archive entry order. Parts that are absent are
    /// skipped; an archive with none of them fails with
    /// [`Error::MissingPart`].
    pub fn load(
        name: impl Into<String>,
        archive: Box<dyn Archive>,
        config: &SyncConfig,
    ) -> Result<Self> {
        let name = name.into();
        let mut parts = Vec::new();
        let mut citations = Vec::new();
        let mut warnings = Vec::new();

        for path in archive.entry_names() {
            if !config.is_markup_part(&path) {
                continue;
            }
            let Some(text) = archive.read_text(&path)? else {
                continue;
            };
            let doc = docxcite_xml::parse(&text).map_err(|source| Error::Xml {
                part: path.clone(),
                source,
            })?;

            let extraction = extract_citations(&doc, parts.len(), &path);
            citations.extend(extraction.citations);
            warnings.extend(extraction.warnings);
            parts.push(MarkupPart {
                path,
                doc,
                modified: false,
            });
        }

        if parts.is_empty() {
            return Err(Error::MissingPart(config.parts.clone()));
        }

        debug!(
            document = %name,
            parts = parts.len(),
            citations = citations.len(),
            "Loaded document"
        );
        Ok(Self {
            name,
            archive,
            parts,
            citations,
            warnings,
        })
    }

    /// Short identifiers cited anywhere in the document, in first-use order.
    pub fn cited_ids(&self) -> impl Iterator<Item = &str> {
        self.citations
            .iter()
            .flat_map(|c| c.ids.iter().map(String::as_str))
    }

    /// Rewrite every field that has formatted text.
    ///
    /// Works in chunks of `chunk_size`, yielding between chunks. Unresolved
    /// fields stay as they were and are recorded as warnings.
    pub async fn apply_formatted(&mut self, formatted: &FormattedResult, chunk_size: usize) {
        let chunk_size = chunk_size.max(1);
        let mut done = 0;

        for citation in self.citations.iter_mut() {
            if done > 0 && done % chunk_size == 0 {
                tokio::task::yield_now().await;
            }
            done += 1;

            let part = &mut self.parts[citation.part];
            let Some(text) = formatted.get(citation) else {
                warn!(part = %part.path, citation = %citation.label(), "No formatted text for citation");
                self.warnings.push(Warning::unresolved_field(
                    part.path.clone(),
                    format!("no formatted text for citation {}", citation.label()),
                ));
                continue;
            };

            match rewrite_field(&mut part.doc, citation, text) {
                Ok(()) => part.modified = true,
                Err(reason) => self.warnings.push(Warning::unresolved_field(
                    part.path.clone(),
                    format!("citation {}: {}", citation.label(), reason),
                )),
            }
        }
    }

    /// Hand the document over to an output handle.
    pub fn into_handle(self, bibliography: String) -> DocumentHandle {
        DocumentHandle {
            name: self.name,
            warnings: self.warnings,
            bibliography,
            state: Mutex::new(AssemblyState {
                archive: self.archive,
                parts: self.parts,
            }),
            blob: OnceCell::new(),
        }
    }
}

struct AssemblyState {
    archive: Box<dyn Archive>,
    parts: Vec<MarkupPart>,
}

/// A rewritten document, exported on demand.
///
/// The first [`DocumentHandle::generate`] call assembles and exports the
/// archive; concurrent calls wait for it and get the same blob. A failed
/// export is not remembered, so the next call tries again.
pub struct DocumentHandle {
    name: String,
    warnings: Vec<Warning>,
    bibliography: String,
    state: Mutex<AssemblyState>,
    blob: OnceCell<Arc<Blob>>,
}

impl std::fmt::Debug for DocumentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentHandle")
            .field("name", &self.name)
            .field("warnings", &self.warnings)
            .field("generated", &self.blob.initialized())
            .finish()
    }
}

impl DocumentHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Recovered anomalies met while extracting and rewriting.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// The document's bibliography, `bibstart + entries + bibend`.
    pub fn bibliography(&self) -> &str {
        &self.bibliography
    }

    /// Serialized text of a markup part as it will be exported.
    pub async fn part_xml(&self, path: &str) -> Result<Option<String>> {
        let state = self.state.lock().await;
        let Some(part) = state.parts.iter().find(|p| p.path == path) else {
            return Ok(None);
        };
        part.doc
            .to_xml_string()
            .map(Some)
            .map_err(|source| Error::Xml {
                part: path.to_string(),
                source,
            })
    }

    /// Assemble and export the document, at most once.
    pub async fn generate(&self, progress: &dyn ProgressSink) -> Result<Arc<Blob>> {
        let blob = self
            .blob
            .get_or_try_init(|| async {
                let mut state = self.state.lock().await;
                let AssemblyState { archive, parts } = &mut *state;
                let bytes = assemble(archive.as_mut(), parts, progress).await?;
                Ok::<_, Error>(Arc::new(Blob::docx(bytes)))
            })
            .await?;
        Ok(Arc::clone(blob))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryArchive;
    use crate::format::Placeholder;
    use crate::progress::NoopProgress;

    const DOCUMENT: &str = concat!(
        r#"<w:document xmlns:w="urn:w"><w:body><w:p>"#,
        r#"<w:r><w:fldChar w:fldCharType="begin"/></w:r>"#,
        r#"<w:r><w:instrText> ADDIN ZOTERO_ITEM CSL_CITATION {"citationItems":[{"uris":["u/items/A"]}]}</w:instrText></w:r>"#,
        r#"<w:r><w:fldChar w:fldCharType="separate"/></w:r>"#,
        r#"<w:r><w:t>old</w:t></w:r>"#,
        r#"<w:r><w:fldChar w:fldCharType="end"/></w:r>"#,
        "</w:p>",
        "<w:p>",
        r#"<w:r><w:instrText> ADDIN ZOTERO_ITEM CSL_CITATION {"citationItems":[{"uris":["u/items/B"]}]}</w:instrText></w:r>"#,
        r#"<w:r><w:fldChar w:fldCharType="separate"/></w:r>"#,
        r#"<w:r><w:t>broken</w:t></w:r>"#,
        "</w:p></w:body></w:document>"
    );

    fn load() -> SourceDocument {
        let archive = MemoryArchive::from_entries([
            ("word/styles.xml", "<styles/>"),
            ("word/endnotes.xml", "<w:endnotes xmlns:w=\"urn:w\"/>"),
            ("word/document.xml", DOCUMENT),
        ]);
        SourceDocument::load("paper.docx", Box::new(archive), &SyncConfig::default()).unwrap()
    }

    fn formatted(doc: &SourceDocument, text: &str) -> FormattedResult {
        FormattedResult {
            formatted: doc
                .citations
                .iter()
                .map(|c| (Placeholder::of(c), text.to_string()))
                .collect(),
            bibliography: String::new(),
        }
    }

    #[test]
    fn test_load_follows_archive_order() {
        let doc = load();
        let paths: Vec<&str> = doc.parts.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["word/endnotes.xml", "word/document.xml"]);
        assert_eq!(doc.citations.len(), 2);
        assert!(doc.citations.iter().all(|c| c.part == 1));
        assert_eq!(doc.cited_ids().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn test_load_without_markup_parts() {
        let archive = MemoryArchive::from_entries([("word/styles.xml", "<styles/>")]);
        let err = SourceDocument::load("x", Box::new(archive), &SyncConfig::default()).unwrap_err();
        assert!(matches!(err, Error::MissingPart(_)));
    }

    #[test]
    fn test_load_reports_parse_errors_with_part() {
        let archive = MemoryArchive::from_entries([("word/document.xml", "<w:document>")]);
        let err = SourceDocument::load("x", Box::new(archive), &SyncConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Xml { ref part, .. } if part == "word/document.xml"));
    }

    #[tokio::test]
    async fn test_apply_rewrites_resolvable_fields_only() {
        let mut doc = load();
        let result = formatted(&doc, "(A 2001)");

        doc.apply_formatted(&result, 20).await;

        assert!(doc.parts[1].modified);
        assert!(!doc.parts[0].modified);
        assert_eq!(doc.warnings.len(), 1);
        assert_eq!(doc.warnings[0].kind, crate::error::WarningKind::UnresolvedField);

        let handle = doc.into_handle(String::new());
        let xml = handle.part_xml("word/document.xml").await.unwrap().unwrap();
        assert!(xml.contains("<w:t>(A 2001)</w:t>"));
        assert!(xml.contains("<w:t>broken</w:t>"));
    }

    #[tokio::test]
    async fn test_generate_is_shared() {
        let mut doc = load();
        let result = formatted(&doc, "(A 2001)");
        doc.apply_formatted(&result, 20).await;
        let handle = doc.into_handle("<div/>".to_string());

        let (a, b) = tokio::join!(handle.generate(&NoopProgress), handle.generate(&NoopProgress));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.mime_type, crate::archive::DOCX_MIME_TYPE);
        assert!(Arc::ptr_eq(&a, &handle.generate(&NoopProgress).await.unwrap()));
        assert_eq!(handle.bibliography(), "<div/>");
    }
}
