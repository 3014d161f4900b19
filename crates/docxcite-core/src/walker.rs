/*
 * walker.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Locates the boundaries of a complex field around a placeholder.
 */

//! Field boundary walking.
//!
//! A WordprocessingML complex field is a sequence of sibling runs:
//!
//! ```text
//! <w:r><w:fldChar w:fldCharType="begin"/></w:r>
//! <w:r><w:instrText> ADDIN ZOTERO_ITEM CSL_CITATION {...}</w:instrText></w:r>
//! <w:r><w:fldChar w:fldCharType="separate"/></w:r>
//! <w:r><w:t>(Smith 2001)</w:t></w:r>
//! <w:r><w:fldChar w:fldCharType="end"/></w:r>
//! ```
//!
//! [`walk_field`] starts at the run holding the placeholder and classifies
//! each later element sibling. It never mutates the tree.

use docxcite_xml::{NodeId, XmlDocument};

/// Walker state. Every sibling is inspected in exactly one state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    /// Looking for the separator. Non-run siblings are extraneous.
    SeekSeparator,
    /// Separator seen, looking for the first run with a `t` element.
    AwaitDisplay,
    /// Display chosen. Everything up to the end marker is extraneous.
    Done,
    /// End marker reached or siblings exhausted.
    Terminal,
}

/// Why a field's boundaries could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The placeholder is no longer attached or has no parent element.
    Detached,
    /// No end marker among the following siblings.
    MissingEnd,
    /// The end marker came before any separator.
    MissingSeparator,
    /// The end marker came before any run with a `t` element.
    MissingDisplay,
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            UnresolvedReason::Detached => "placeholder is detached from the tree",
            UnresolvedReason::MissingEnd => "no field end marker",
            UnresolvedReason::MissingSeparator => "no field separator before the end marker",
            UnresolvedReason::MissingDisplay => "no display text before the end marker",
        };
        f.write_str(text)
    }
}

/// The resolved parts of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBoundary {
    /// The run holding the placeholder.
    pub field_run: NodeId,
    pub separator: NodeId,
    /// The run holding the displayed text.
    pub display_run: NodeId,
    /// The first `t` element in the display run.
    pub display_text: NodeId,
    /// Siblings to delete, in document order.
    pub extraneous: Vec<NodeId>,
    pub end: NodeId,
}

/// Whether `node` contains a `fldChar` of the given type.
pub fn has_field_char(doc: &XmlDocument, node: NodeId, field_type: &str) -> bool {
    doc.find_descendant(node, |doc, d| {
        doc.is_element_named(d, "fldChar") && doc.get_attribute(d, "fldCharType") == Some(field_type)
    })
    .is_some()
}

fn first_text(doc: &XmlDocument, node: NodeId) -> Option<NodeId> {
    doc.find_descendant(node, |doc, d| doc.is_element_named(d, "t"))
}

/// Walk forward from the placeholder's run and resolve the field.
pub fn walk_field(
    doc: &XmlDocument,
    placeholder: NodeId,
) -> Result<FieldBoundary, UnresolvedReason> {
    if !doc.is_attached(placeholder) {
        return Err(UnresolvedReason::Detached);
    }
    let field_run = doc
        .parent_element(placeholder)
        .ok_or(UnresolvedReason::Detached)?;

    let siblings = doc.element_siblings_from(field_run);

    let mut state = WalkState::SeekSeparator;
    let mut separator = None;
    let mut display = None;
    let mut extraneous = Vec::new();
    let mut end = None;
    let mut index = 0;

    while state != WalkState::Terminal {
        let Some(&node) = siblings.get(index) else {
            state = WalkState::Terminal;
            continue;
        };
        index += 1;

        if has_field_char(doc, node, "end") {
            end = Some(node);
            state = WalkState::Terminal;
            continue;
        }

        state = match state {
            WalkState::SeekSeparator => {
                if has_field_char(doc, node, "separate") {
                    separator = Some(node);
                    WalkState::AwaitDisplay
                } else {
                    if !doc.is_element_named(node, "r") {
                        extraneous.push(node);
                    }
                    WalkState::SeekSeparator
                }
            }
            WalkState::AwaitDisplay => match first_text(doc, node) {
                Some(text) => {
                    display = Some((node, text));
                    WalkState::Done
                }
                None => WalkState::AwaitDisplay,
            },
            WalkState::Done => {
                extraneous.push(node);
                WalkState::Done
            }
            WalkState::Terminal => WalkState::Terminal,
        };
    }

    let end = end.ok_or(UnresolvedReason::MissingEnd)?;
    let separator = separator.ok_or(UnresolvedReason::MissingSeparator)?;
    let (display_run, display_text) = display.ok_or(UnresolvedReason::MissingDisplay)?;

    Ok(FieldBoundary {
        field_run,
        separator,
        display_run,
        display_text,
        extraneous,
        end,
    })
}
