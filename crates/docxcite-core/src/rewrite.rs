/*
 * rewrite.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Applies formatted citation text to a field in place.
 */

use docxcite_xml::{NodeId, XmlDocument};
use tracing::{debug, warn};

use crate::extract::Citation;
use crate::walker::{UnresolvedReason, walk_field};

/// Rewrite one citation field.
///
/// Resolves the field first and only mutates once resolution succeeded:
/// the payload's `formattedCitation`/`plainCitation` are set, the payload is
/// written back into the placeholder, the display text is replaced and the
/// extraneous siblings are removed. On failure neither the tree nor the
/// citation's payload changes.
pub fn rewrite_field(
    doc: &mut XmlDocument,
    citation: &mut Citation,
    formatted: &str,
) -> Result<(), UnresolvedReason> {
    let boundary = match walk_field(doc, citation.node) {
        Ok(boundary) => boundary,
        Err(reason) => {
            warn!(node = citation.node.index(), %reason, "Leaving citation field unchanged");
            return Err(reason);
        }
    };

    citation.set_formatted(formatted);
    set_preserved_text(doc, citation.node, &citation.field_code());
    set_preserved_text(doc, boundary.display_text, formatted);

    for node in &boundary.extraneous {
        doc.remove(*node);
    }

    debug!(
        node = citation.node.index(),
        removed = boundary.extraneous.len(),
        "Rewrote citation field"
    );
    Ok(())
}

/// Set an element's text, marking it `xml:space="preserve"` when the text
/// has leading or trailing whitespace.
fn set_preserved_text(doc: &mut XmlDocument, node: NodeId, text: &str) {
    if text.trim() != text {
        doc.set_attribute(node, Some("xml"), "space", "preserve");
    }
    doc.set_text_content(node, text);
}
