/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Error and warning types for citation field synchronization.
 */

//! Error types for docxcite-core.
//!
//! Errors escalate to the document or the run. Anomalies confined to a
//! single placeholder never become errors; they are recorded as
//! [`Warning`]s and processing continues.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to parse {part}: {source}")]
    Xml {
        part: String,
        #[source]
        source: docxcite_xml::Error,
    },

    /// A [`Warning`] escalated by a caller that treats it as fatal. The run
    /// itself only records these as warnings.
    #[error("Malformed citation payload in {part}: {message}")]
    MalformedPayload { part: String, message: String },

    /// See [`Error::MalformedPayload`].
    #[error("Unresolved citation field in {part}: {reason}")]
    UnresolvedField { part: String, reason: String },

    #[error("Failed to find anything in the bibliographic records for citation: {citation}")]
    NoResolvableCitationItems { citation: String },

    #[error("Document has none of the expected markup parts: {}", .0.join(", "))]
    MissingPart(Vec<String>),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Citation engine error: {0}")]
    Engine(String),

    #[error("Processing was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// What kind of placeholder-level anomaly a [`Warning`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// A placeholder's payload could not be parsed; the placeholder was skipped.
    MalformedPayload,
    /// A field's display node or end marker could not be found; the field
    /// was left untouched.
    UnresolvedField,
}

/// A recovered, placeholder-level anomaly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    /// Archive path of the markup part the placeholder lives in.
    pub part: String,
    pub message: String,
}

impl Warning {
    pub fn malformed_payload(part: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::MalformedPayload,
            part: part.into(),
            message: message.into(),
        }
    }

    pub fn unresolved_field(part: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::UnresolvedField,
            part: part.into(),
            message: message.into(),
        }
    }
}

impl From<Warning> for Error {
    fn from(warning: Warning) -> Self {
        match warning.kind {
            WarningKind::MalformedPayload => Error::MalformedPayload {
                part: warning.part,
                message: warning.message,
            },
            WarningKind::UnresolvedField => Error::UnresolvedField {
                part: warning.part,
                reason: warning.message,
            },
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.kind {
            WarningKind::MalformedPayload => "malformed citation payload",
            WarningKind::UnresolvedField => "unresolved citation field",
        };
        write!(f, "{} in {}: {}", label, self.part, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display() {
        let w = Warning::unresolved_field("word/document.xml", "no end marker");
        assert_eq!(
            w.to_string(),
            "unresolved citation field in word/document.xml: no end marker"
        );
    }

    #[test]
    fn test_warning_escalates_to_matching_error() {
        let err = Error::from(Warning::malformed_payload("word/document.xml", "bad JSON"));
        assert!(matches!(
            err,
            Error::MalformedPayload { ref part, ref message }
                if part == "word/document.xml" && message == "bad JSON"
        ));

        let err = Error::from(Warning::unresolved_field("word/endnotes.xml", "no field end marker"));
        assert_eq!(
            err.to_string(),
            "Unresolved citation field in word/endnotes.xml: no field end marker"
        );
    }

    #[test]
    fn test_missing_part_lists_paths() {
        let err = Error::MissingPart(vec![
            "word/document.xml".to_string(),
            "word/footnotes.xml".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Document has none of the expected markup parts: word/document.xml, word/footnotes.xml"
        );
    }
}
