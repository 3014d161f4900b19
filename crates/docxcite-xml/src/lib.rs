//! Editable XML trees for the markup parts of `.docx` archives.
//!
//! This crate wraps [`quick-xml`] to provide an [`XmlDocument`]: an arena of
//! nodes addressed by [`NodeId`] handles. Unlike a read-only parse tree, the
//! document can be queried, mutated (text replaced, nodes removed) and written
//! back out. Everything the parser reads is kept, including whitespace text,
//! comments and the XML declaration, so an untouched document serializes back
//! to equivalent markup.
//!
//! Handles stay valid for the life of the document. Removing a node only
//! detaches it from its parent; the handle can still be inspected, and
//! [`XmlDocument::is_attached`] reports whether it is still part of the tree.
//!
//! # Example
//!
//! ```rust
//! use docxcite_xml::parse;
//!
//! let mut doc = parse(r#"<w:p xmlns:w="urn:w"><w:r><w:t>old</w:t></w:r></w:p>"#).unwrap();
//!
//! let t = doc.descendants_by_local_name(doc.root(), "t")[0];
//! doc.set_text_content(t, "new");
//!
//! assert_eq!(
//!     doc.to_xml_string().unwrap(),
//!     r#"<w:p xmlns:w="urn:w"><w:r><w:t>new</w:t></w:r></w:p>"#
//! );
//! ```

pub mod error;
pub mod parser;
pub mod types;
pub mod writer;

// Re-export main types
pub use error::{Error, Result};
pub use parser::parse;
pub use types::{Node, NodeId, NodeKind, XmlAttribute, XmlDeclaration, XmlDocument, XmlElement};
