//! XML parser that builds editable XmlDocument trees.

use crate::{Error, NodeId, NodeKind, Result, XmlAttribute, XmlDeclaration, XmlDocument, XmlElement};
use quick_xml::Reader;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

/// Parse XML from a string, producing an editable [`XmlDocument`].
///
/// All content is kept: whitespace-only text, comments, processing
/// instructions and the declaration survive a parse/serialize round trip.
///
/// # Example
///
/// ```rust
/// use docxcite_xml::parse;
///
/// let doc = parse("<root><child/></root>").unwrap();
/// assert_eq!(doc.local_name(doc.root()), Some("root"));
/// ```
///
/// # Errors
///
/// Returns an error if the XML is malformed.
pub fn parse(content: &str) -> Result<XmlDocument> {
    let mut parser = XmlParser::new(content);
    parser.parse()
}

/// Internal parser state.
struct XmlParser<'a> {
    /// The quick-xml reader.
    reader: Reader<&'a [u8]>,

    /// The document being built.
    doc: XmlDocument,

    /// Stack of open elements. Empty while outside the root.
    stack: Vec<NodeId>,

    /// Set once the root element has been opened.
    root: Option<NodeId>,
}

impl<'a> XmlParser<'a> {
    fn new(source: &'a str) -> Self {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;

        Self {
            reader,
            doc: XmlDocument::empty(),
            stack: Vec::new(),
            root: None,
        }
    }

    fn parse(&mut self) -> Result<XmlDocument> {
        loop {
            match self.reader.read_event() {
                Ok(Event::Start(e)) => {
                    let id = self.handle_start(&e, false)?;
                    self.stack.push(id);
                }
                Ok(Event::End(e)) => {
                    self.handle_end(&e)?;
                }
                Ok(Event::Empty(e)) => {
                    self.handle_start(&e, true)?;
                }
                Ok(Event::Text(e)) => {
                    self.handle_text(&e)?;
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    self.push_leaf(NodeKind::CData(text));
                }
                Ok(Event::Comment(e)) => {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    self.push_leaf(NodeKind::Comment(text));
                }
                Ok(Event::PI(e)) => {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    self.push_leaf(NodeKind::ProcessingInstruction(text));
                }
                Ok(Event::DocType(e)) => {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    self.push_leaf(NodeKind::DocType(text));
                }
                Ok(Event::Decl(e)) => {
                    self.doc.declaration = Some(declaration(&e));
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlSyntax {
                        message: e.to_string(),
                        position: Some(self.reader.error_position()),
                    });
                }
            }
        }

        // Check for unclosed elements
        if let Some(open) = self.stack.last() {
            let name = self
                .doc
                .element(*open)
                .map(XmlElement::qualified_name)
                .unwrap_or_default();
            return Err(Error::UnexpectedEof {
                expected: format!("closing tag </{}>", name),
            });
        }

        let root = self.root.ok_or(Error::EmptyDocument)?;
        let mut doc = std::mem::replace(&mut self.doc, XmlDocument::empty());
        doc.root = root;
        Ok(doc)
    }

    /// The node new content is appended to.
    fn current_parent(&self) -> NodeId {
        self.stack
            .last()
            .copied()
            .unwrap_or_else(|| self.doc.document_node())
    }

    fn handle_start(&mut self, e: &BytesStart<'_>, self_closing: bool) -> Result<NodeId> {
        if self.stack.is_empty() && self.root.is_some() {
            return Err(Error::MultipleRoots);
        }

        let (name, prefix) = split_name(e.name().as_ref());
        let attributes = parse_attributes(e)?;
        let parent = self.current_parent();
        let id = self.doc.append(
            parent,
            NodeKind::Element(XmlElement {
                name,
                prefix,
                attributes,
                self_closing,
            }),
        );

        if self.stack.is_empty() {
            self.root = Some(id);
        }
        Ok(id)
    }

    fn handle_end(&mut self, e: &BytesEnd<'_>) -> Result<()> {
        let end_name = String::from_utf8_lossy(e.name().as_ref()).to_string();

        let node = self
            .stack
            .pop()
            .ok_or_else(|| Error::InvalidStructure(format!("Unexpected closing tag </{}>", end_name)))?;

        // Verify tag names match
        let open_name = self
            .doc
            .element(node)
            .map(XmlElement::qualified_name)
            .unwrap_or_default();
        if open_name != end_name {
            return Err(Error::MismatchedEndTag {
                expected: open_name,
                found: end_name,
            });
        }
        Ok(())
    }

    fn handle_text(&mut self, e: &BytesText<'_>) -> Result<()> {
        let position = self.reader.buffer_position();
        let text = e.unescape().map_err(|err| Error::XmlSyntax {
            message: format!("Invalid text content: {}", err),
            position: Some(position as u64),
        })?;
        if text.is_empty() {
            return Ok(());
        }
        self.push_leaf(NodeKind::Text(text.into_owned()));
        Ok(())
    }

    fn push_leaf(&mut self, kind: NodeKind) {
        let parent = self.current_parent();
        self.doc.append(parent, kind);
    }
}

fn declaration(e: &BytesDecl<'_>) -> XmlDeclaration {
    let lossy = |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned();
    XmlDeclaration {
        version: e
            .version()
            .map(|v| lossy(&v))
            .unwrap_or_else(|_| "1.0".to_string()),
        encoding: e.encoding().and_then(|r| r.ok()).map(|v| lossy(&v)),
        standalone: e.standalone().and_then(|r| r.ok()).map(|v| lossy(&v)),
    }
}

fn split_name(raw: &[u8]) -> (String, Option<String>) {
    let full_name = String::from_utf8_lossy(raw).to_string();

    if let Some(pos) = full_name.find(':') {
        let prefix = full_name[..pos].to_string();
        let local_name = full_name[pos + 1..].to_string();
        (local_name, Some(prefix))
    } else {
        (full_name, None)
    }
}

fn parse_attributes(e: &BytesStart<'_>) -> Result<Vec<XmlAttribute>> {
    let mut attributes = Vec::new();

    for attr_result in e.attributes() {
        let attr = attr_result?;
        let (name, prefix) = split_name(attr.key.as_ref());

        let value = attr.unescape_value().map_err(|err| Error::XmlSyntax {
            message: format!("Invalid attribute value: {}", err),
            position: None,
        })?;

        attributes.push(XmlAttribute {
            name,
            prefix,
            value: value.into_owned(),
        });
    }

    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_element() {
        let doc = parse("<root/>").unwrap();
        assert_eq!(doc.local_name(doc.root()), Some("root"));
        assert!(doc.children(doc.root()).is_empty());
        assert!(doc.element(doc.root()).unwrap().self_closing);
    }

    #[test]
    fn test_parse_nested_elements() {
        let doc = parse("<root><child/></root>").unwrap();
        let children = doc.element_children(doc.root());
        assert_eq!(children.len(), 1);
        assert_eq!(doc.local_name(children[0]), Some("child"));
        assert_eq!(doc.parent_element(children[0]), Some(doc.root()));
    }

    #[test]
    fn test_parse_text_content_unescaped() {
        let doc = parse("<root>a &amp; b &quot;c&quot;</root>").unwrap();
        assert_eq!(doc.text_content(doc.root()), "a & b \"c\"");
    }

    #[test]
    fn test_parse_attributes_and_prefixes() {
        let doc = parse(r#"<w:fldChar xmlns:w="urn:w" w:fldCharType="separate"/>"#).unwrap();
        let el = doc.element(doc.root()).unwrap();
        assert_eq!(el.name, "fldChar");
        assert_eq!(el.prefix.as_deref(), Some("w"));
        assert_eq!(doc.get_attribute(doc.root(), "fldCharType"), Some("separate"));

        let attr = &el.attributes[1];
        assert_eq!(attr.prefix.as_deref(), Some("w"));
        assert_eq!(attr.qualified_name(), "w:fldCharType");
    }

    #[test]
    fn test_whitespace_text_is_kept() {
        let doc = parse("<root>\n  <a/>\n</root>").unwrap();
        let kinds: Vec<_> = doc
            .children(doc.root())
            .iter()
            .map(|c| doc.kind(*c).clone())
            .collect();
        assert_eq!(kinds.len(), 3);
        assert_eq!(kinds[0], NodeKind::Text("\n  ".to_string()));
    }

    #[test]
    fn test_declaration_is_recorded() {
        let doc =
            parse(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><root/>"#).unwrap();
        let decl = doc.declaration.unwrap();
        assert_eq!(decl.version, "1.0");
        assert_eq!(decl.encoding.as_deref(), Some("UTF-8"));
        assert_eq!(decl.standalone.as_deref(), Some("yes"));
    }

    #[test]
    fn test_empty_document_error() {
        let result = parse("");
        assert!(matches!(result, Err(Error::EmptyDocument)));
    }

    #[test]
    fn test_unclosed_element_error() {
        let result = parse("<root>");
        assert!(
            matches!(result, Err(Error::UnexpectedEof { .. } | Error::XmlSyntax { .. })),
            "got {:?}",
            result
        );
    }

    #[test]
    fn test_multiple_roots_error() {
        let result = parse("<root/><another/>");
        assert!(matches!(result, Err(Error::MultipleRoots)));
    }

    #[test]
    fn test_mismatched_tags_error() {
        let result = parse("<root></wrong>");
        // quick-xml catches mismatched tags itself when check_end_names is enabled
        assert!(
            matches!(
                result,
                Err(Error::MismatchedEndTag { .. } | Error::XmlSyntax { .. })
            ),
            "Expected MismatchedEndTag or XmlSyntax error, got: {:?}",
            result
        );
    }

    #[test]
    fn test_syntax_error() {
        let result = parse("<root attr=unquoted/>");
        assert!(matches!(result, Err(Error::XmlSyntax { .. })));
    }
}
