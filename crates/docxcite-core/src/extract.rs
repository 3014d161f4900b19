/*
 * extract.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Finds citation placeholders in markup parts and parses their payloads.
 */

//! Placeholder extraction.
//!
//! A placeholder is a `w:instrText` element whose text starts with the
//! Zotero field marker and carries a CSL citation payload as a JSON object:
//!
//! ```text
//!  ADDIN ZOTERO_ITEM CSL_CITATION {"citationID":"a1","citationItems":[...],"properties":{...}}
//! ```
//!
//! Each placeholder becomes a [`Citation`]. A placeholder whose payload does
//! not parse is skipped with a [`Warning`]; the rest of the part is still
//! extracted.

use docxcite_xml::{NodeId, XmlDocument};
use hashlink::LinkedHashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::engine::{CitationCluster, ClusterItem};
use crate::error::{Error, Result, Warning};
use crate::records::RecordMap;

/// The field instruction that marks a Zotero citation.
pub const FIELD_MARKER: &str = "ADDIN ZOTERO_ITEM CSL_CITATION";

static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*ADDIN ZOTERO_ITEM CSL_CITATION").unwrap());

static PAYLOAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*ADDIN ZOTERO_ITEM CSL_CITATION\s*(\{.*\})\s*$").unwrap());

/// One citation placeholder and its parsed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Citation {
    /// Short identifiers of the cited items, unique, in payload order.
    pub ids: Vec<String>,

    /// Short identifier to raw citation item, in payload order.
    pub id_map: LinkedHashMap<String, Value>,

    /// The placeholder (`instrText`) node in the owning part's tree.
    pub node: NodeId,

    /// The parsed payload. Always a JSON object.
    pub payload: Value,

    /// Index of the owning markup part within the document.
    pub part: usize,
}

impl Citation {
    /// Build the cluster handed to the citation engine.
    ///
    /// Items whose identifier has no record are left out. A citation with
    /// no remaining items fails with [`Error::NoResolvableCitationItems`].
    pub fn cluster(&self, records: &RecordMap) -> Result<CitationCluster> {
        let citation_items: Vec<ClusterItem> = self
            .id_map
            .iter()
            .filter(|(id, _)| records.contains(id))
            .map(|(id, item)| ClusterItem {
                id: id.clone(),
                locator: non_empty_string(item.get("locator")),
                label: non_empty_string(item.get("label")),
            })
            .collect();

        if citation_items.is_empty() {
            return Err(Error::NoResolvableCitationItems {
                citation: self.label(),
            });
        }

        Ok(CitationCluster {
            citation_items,
            note_index: 0,
        })
    }

    /// Record the formatted text in `properties.formattedCitation` and
    /// `properties.plainCitation`. Existing keys keep their position.
    pub fn set_formatted(&mut self, text: &str) {
        let Some(payload) = self.payload.as_object_mut() else {
            return;
        };
        let properties = payload
            .entry("properties")
            .or_insert_with(|| Value::Object(Map::new()));
        if !properties.is_object() {
            *properties = Value::Object(Map::new());
        }
        if let Some(properties) = properties.as_object_mut() {
            properties.insert(
                "formattedCitation".to_string(),
                Value::String(text.to_string()),
            );
            properties.insert("plainCitation".to_string(), Value::String(text.to_string()));
        }
    }

    /// The field code text for the placeholder node.
    pub fn field_code(&self) -> String {
        format!(" {} {}", FIELD_MARKER, self.payload)
    }

    /// A short human-readable name for messages.
    pub fn label(&self) -> String {
        match self.payload.get("citationID").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => format!("[{}]", self.ids.join(", ")),
        }
    }
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The short identifier of a record URI: its final, non-empty path segment.
///
/// `http://zotero.org/users/12/items/ABCD` gives `ABCD`.
pub fn short_id(uri: &str) -> Option<&str> {
    let (_, last) = uri.rsplit_once('/')?;
    (!last.is_empty()).then_some(last)
}

/// Citations found in one markup part.
#[derive(Debug, Default)]
pub struct Extraction {
    pub citations: Vec<Citation>,
    pub warnings: Vec<Warning>,
}

/// Find every citation placeholder in `doc`, in document order.
pub fn extract_citations(doc: &XmlDocument, part: usize, part_path: &str) -> Extraction {
    let mut extraction = Extraction::default();

    for node in doc.descendants_by_local_name(doc.document_node(), "instrText") {
        let text = doc.text_content(node);
        if !MARKER_RE.is_match(&text) {
            continue;
        }

        match parse_placeholder(&text) {
            Ok((payload, id_map)) => {
                let ids: Vec<String> = id_map.keys().cloned().collect();
                debug!(part = part_path, ids = ?ids, "Found citation placeholder");
                extraction.citations.push(Citation {
                    ids,
                    id_map,
                    node,
                    payload,
                    part,
                });
            }
            Err(message) => {
                warn!(part = part_path, node = node.index(), %message, "Skipping malformed citation payload");
                extraction
                    .warnings
                    .push(Warning::malformed_payload(part_path, message));
            }
        }
    }

    extraction
}

fn parse_placeholder(
    text: &str,
) -> std::result::Result<(Value, LinkedHashMap<String, Value>), String> {
    let json = PAYLOAD_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .ok_or_else(|| "field code does not end in a JSON object".to_string())?
        .as_str();

    let payload: Value = serde_json::from_str(json).map_err(|e| e.to_string())?;
    let items = payload
        .get("citationItems")
        .and_then(Value::as_array)
        .ok_or_else(|| "payload has no citationItems array".to_string())?;

    let mut id_map: LinkedHashMap<String, Value> = LinkedHashMap::new();
    for item in items {
        for uri in item_uris(item) {
            let Some(id) = short_id(uri) else {
                continue;
            };
            match id_map.get_mut(id) {
                Some(existing) => *existing = item.clone(),
                None => {
                    id_map.insert(id.to_string(), item.clone());
                }
            }
        }
    }

    Ok((payload, id_map))
}

/// `uris`, or the legacy single `uri`.
fn item_uris(item: &Value) -> Vec<&str> {
    if let Some(uris) = item.get("uris").and_then(Value::as_array) {
        return uris.iter().filter_map(Value::as_str).collect();
    }
    item.get("uri").and_then(Value::as_str).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn part(fields: &[&str]) -> XmlDocument {
        let body: String = fields
            .iter()
            .map(|code| {
                format!(
                    r#"<w:p><w:r><w:instrText xml:space="preserve">{}</w:instrText></w:r></w:p>"#,
                    code
                )
            })
            .collect();
        docxcite_xml::parse(&format!(
            r#"<w:document xmlns:w="urn:w"><w:body>{}</w:body></w:document>"#,
            body
        ))
        .unwrap()
    }

    fn code(payload: &Value) -> String {
        let text = format!(" {} {}", FIELD_MARKER, payload);
        text.replace('&', "&amp;").replace('<', "&lt;")
    }

    #[test]
    fn test_extracts_ids_from_uris() {
        let payload = json!({
            "citationID": "c1",
            "citationItems": [
                {"id": 1, "uris": ["http://zotero.org/users/1/items/AAA"], "locator": "12"},
                {"id": 2, "uri": "http://zotero.org/users/1/items/BBB"}
            ]
        });
        let doc = part(&[&code(&payload)]);

        let extraction = extract_citations(&doc, 0, "word/document.xml");

        assert!(extraction.warnings.is_empty());
        assert_eq!(extraction.citations.len(), 1);
        let citation = &extraction.citations[0];
        assert_eq!(citation.ids, vec!["AAA", "BBB"]);
        assert_eq!(citation.id_map["AAA"]["locator"], "12");
        assert_eq!(citation.payload, payload);
    }

    #[test]
    fn test_malformed_payload_is_skipped_with_warning() {
        let good = json!({"citationItems": [{"uris": ["u/items/X"]}]});
        let doc = part(&[
            " ADDIN ZOTERO_ITEM CSL_CITATION {not json}",
            &code(&good),
        ]);

        let extraction = extract_citations(&doc, 1, "word/footnotes.xml");

        assert_eq!(extraction.citations.len(), 1);
        assert_eq!(extraction.citations[0].ids, vec!["X"]);
        assert_eq!(extraction.citations[0].part, 1);
        assert_eq!(extraction.warnings.len(), 1);
        assert_eq!(
            extraction.warnings[0].kind,
            crate::error::WarningKind::MalformedPayload
        );
    }

    #[test]
    fn test_other_fields_are_ignored() {
        let doc = part(&[" PAGEREF _Toc1 \\h ", " ADDIN ZOTERO_BIBL {} CSL_BIBLIOGRAPHY "]);
        let extraction = extract_citations(&doc, 0, "word/document.xml");
        assert!(extraction.citations.is_empty());
        assert!(extraction.warnings.is_empty());
    }

    #[test]
    fn test_unparseable_uris_are_dropped() {
        let payload = json!({"citationItems": [
            {"uris": ["no-slash", "http://x/items/", "http://x/items/OK"]},
            {"itemData": {}}
        ]});
        let doc = part(&[&code(&payload)]);

        let extraction = extract_citations(&doc, 0, "p");

        assert_eq!(extraction.citations[0].ids, vec!["OK"]);
    }

    #[test]
    fn test_repeated_id_keeps_position_takes_later_item() {
        let payload = json!({"citationItems": [
            {"uris": ["u/A"], "locator": "1"},
            {"uris": ["u/B"]},
            {"uris": ["u/A"], "locator": "2"}
        ]});
        let doc = part(&[&code(&payload)]);

        let citation = &extract_citations(&doc, 0, "p").citations[0];

        assert_eq!(citation.ids, vec!["A", "B"]);
        assert_eq!(citation.id_map["A"]["locator"], "2");
    }

    #[test]
    fn test_cluster_filters_missing_records() {
        let payload = json!({"citationItems": [
            {"uris": ["u/A"], "locator": 5, "label": "page"},
            {"uris": ["u/MISSING"]}
        ]});
        let doc = part(&[&code(&payload)]);
        let citation = &extract_citations(&doc, 0, "p").citations[0];
        let records = RecordMap::from_items([json!({"id": "http://zotero.org/users/1/items/A"})]);

        let cluster = citation.cluster(&records).unwrap();

        assert_eq!(
            cluster.citation_items,
            vec![ClusterItem {
                id: "A".to_string(),
                locator: Some("5".to_string()),
                label: Some("page".to_string()),
            }]
        );
    }

    #[test]
    fn test_cluster_without_records_fails() {
        let payload = json!({"citationID": "cit9", "citationItems": [{"uris": ["u/idX"]}]});
        let doc = part(&[&code(&payload)]);
        let citation = &extract_citations(&doc, 0, "p").citations[0];

        let err = citation.cluster(&RecordMap::default()).unwrap_err();

        assert!(
            matches!(err, Error::NoResolvableCitationItems { ref citation } if citation == "cit9")
        );
    }

    #[test]
    fn test_set_formatted_keeps_key_order() {
        let mut citation = Citation {
            ids: vec![],
            id_map: LinkedHashMap::new(),
            node: doc_root(),
            payload: json!({
                "citationID": "c",
                "properties": {"formattedCitation": "old", "plainCitation": "old", "noteIndex": 0},
                "schema": "s"
            }),
            part: 0,
        };

        citation.set_formatted("(Smith 2001)");

        assert_eq!(
            citation.field_code(),
            r#" ADDIN ZOTERO_ITEM CSL_CITATION {"citationID":"c","properties":{"formattedCitation":"(Smith 2001)","plainCitation":"(Smith 2001)","noteIndex":0},"schema":"s"}"#
        );
    }

    fn doc_root() -> NodeId {
        docxcite_xml::parse("<a/>").unwrap().root()
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("http://zotero.org/groups/9/items/K1"), Some("K1"));
        assert_eq!(short_id("http://zotero.org/groups/9/items/"), None);
        assert_eq!(short_id("K1"), None);
    }
}
