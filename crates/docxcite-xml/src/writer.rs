//! Serialization of XmlDocument trees back to markup.

use crate::{Error, NodeId, NodeKind, Result, XmlDocument};
use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};

impl XmlDocument {
    /// Serialize the attached part of the tree to a string.
    ///
    /// Detached nodes are not written. Elements without children are written
    /// as `<x/>` when they were self-closing in the source and as `<x></x>`
    /// otherwise.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());

        if let Some(decl) = &self.declaration {
            emit(
                &mut writer,
                Event::Decl(BytesDecl::new(
                    &decl.version,
                    decl.encoding.as_deref(),
                    decl.standalone.as_deref(),
                )),
            )?;
        }

        for child in self.children(self.document_node()) {
            self.write_node(&mut writer, *child)?;
        }

        String::from_utf8(writer.into_inner()).map_err(|e| Error::Write(e.to_string()))
    }

    fn write_node(&self, writer: &mut Writer<Vec<u8>>, id: NodeId) -> Result<()> {
        match self.kind(id) {
            NodeKind::Document => {
                for child in self.children(id) {
                    self.write_node(writer, *child)?;
                }
            }
            NodeKind::Element(element) => {
                let name = element.qualified_name();
                let mut start = BytesStart::new(name.as_str());
                for attr in &element.attributes {
                    let key = attr.qualified_name();
                    start.push_attribute((key.as_str(), attr.value.as_str()));
                }

                let children = self.children(id);
                if children.is_empty() && element.self_closing {
                    emit(writer, Event::Empty(start))?;
                } else {
                    emit(writer, Event::Start(start))?;
                    for child in children {
                        self.write_node(writer, *child)?;
                    }
                    emit(writer, Event::End(BytesEnd::new(name.as_str())))?;
                }
            }
            // Quotes stay literal in text content.
            NodeKind::Text(text) => {
                emit(writer, Event::Text(BytesText::from_escaped(partial_escape(text))))?
            }
            NodeKind::CData(text) => emit(writer, Event::CData(BytesCData::new(text.as_str())))?,
            NodeKind::Comment(text) => {
                emit(writer, Event::Comment(BytesText::from_escaped(text.as_str())))?
            }
            NodeKind::ProcessingInstruction(text) => {
                emit(writer, Event::PI(BytesPI::new(text.as_str())))?
            }
            NodeKind::DocType(text) => {
                emit(writer, Event::DocType(BytesText::from_escaped(text.as_str())))?
            }
        }
        Ok(())
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::Write(e.to_string()))
}
