/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Citation field synchronization for `.docx` documents.
//!
//! Word documents edited with the Zotero plugin carry their citations as
//! complex fields: a field code holding the citation data as JSON, and the
//! displayed text. This crate finds those fields, formats them through a
//! citation engine and rewrites the displayed text in place, keeping the
//! field code (with updated `formattedCitation`/`plainCitation`) so the
//! document stays editable by the plugin.
//!
//! The pieces, leaf first:
//!
//! - [`extract`]: placeholders → [`Citation`]s
//! - [`walker`]: the run structure of one field
//! - [`rewrite`]: apply formatted text to one field
//! - [`format`](mod@format): run a document's citations through a [`CitationEngine`]
//! - [`assemble`]: write parts back and export the archive
//! - [`run`]: the batch pipeline, [`Synchronizer`]
//!
//! Collaborators sit behind traits: [`Archive`] (with [`ZipContainer`] and
//! [`MemoryArchive`]), [`RecordSource`] (with [`ZoteroClient`] and
//! [`StaticRecords`]), [`EngineFactory`] (with [`AuthorDateFactory`]) and
//! [`ProgressSink`].

pub mod archive;
pub mod assemble;
pub mod author_date;
pub mod cancellation;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod extract;
pub mod format;
pub mod progress;
pub mod records;
pub mod rewrite;
pub mod run;
pub mod style;
pub mod walker;
pub mod zip_container;
pub mod zotero;

pub use archive::{Archive, Blob, DOCX_MIME_TYPE, MemoryArchive};
pub use author_date::{AuthorDateEngine, AuthorDateFactory};
pub use cancellation::Cancellation;
pub use config::SyncConfig;
pub use document::{DocumentHandle, MarkupPart, SourceDocument};
pub use engine::{
    Bibliography, CitationCluster, CitationEngine, ClusterItem, EngineFactory, EngineSources,
};
pub use error::{Error, Result, Warning, WarningKind};
pub use extract::{Citation, FIELD_MARKER, extract_citations};
pub use format::{FormattedResult, Placeholder, format_citations};
pub use progress::{NoopProgress, ProgressSink, TracingProgress};
pub use records::{Credentials, Library, RecordMap, RecordSource, StaticRecords};
pub use rewrite::rewrite_field;
pub use run::{DocumentInput, DocumentOutcome, RunOutput, Synchronizer};
pub use style::StyleInfo;
pub use walker::{FieldBoundary, UnresolvedReason, WalkState, walk_field};
pub use zip_container::ZipContainer;
pub use zotero::ZoteroClient;
