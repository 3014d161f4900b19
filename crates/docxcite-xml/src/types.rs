//! Core types for editable XML documents.

/// Handle to a node inside an [`XmlDocument`].
///
/// Handles are indices into the document's node arena. They never dangle:
/// a removed node keeps its slot and can still be inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The arena index of this node.
    pub fn index(self) -> usize {
        self.0
    }
}

/// The `<?xml ... ?>` declaration at the top of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

/// An XML element: qualified name and attributes.
///
/// Children live in the owning [`Node`], not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// The local name of the element (without namespace prefix).
    pub name: String,

    /// Namespace prefix, if any (e.g., "w" in `<w:t>`).
    pub prefix: Option<String>,

    /// Attributes in source order.
    pub attributes: Vec<XmlAttribute>,

    /// Whether the element was written as `<x/>` in the source.
    ///
    /// Only consulted when the element has no children at write time.
    pub self_closing: bool,
}

/// An XML attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// The local name of the attribute (without namespace prefix).
    pub name: String,

    /// Namespace prefix, if any.
    pub prefix: Option<String>,

    /// The attribute value (after unescaping XML entities).
    pub value: String,
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The synthetic document node. Always at index 0.
    Document,
    Element(XmlElement),
    /// Text content, unescaped.
    Text(String),
    CData(String),
    /// Comment body, kept as it appeared in the source.
    Comment(String),
    ProcessingInstruction(String),
    DocType(String),
}

/// A node in the arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            parent,
            children: Vec::new(),
        }
    }
}

/// A parsed, editable XML document.
///
/// Produced by [`crate::parse`] and written back with
/// [`XmlDocument::to_xml_string`].
#[derive(Debug, Clone)]
pub struct XmlDocument {
    /// The XML declaration, if the source had one.
    pub declaration: Option<XmlDeclaration>,

    pub(crate) nodes: Vec<Node>,

    pub(crate) root: NodeId,
}

const DOCUMENT: NodeId = NodeId(0);

impl XmlElement {
    /// The name as written, including the prefix (e.g. `w:t`).
    pub fn qualified_name(&self) -> String {
        qualify(self.prefix.as_deref(), &self.name)
    }

    /// Get an attribute value by local name.
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

impl XmlAttribute {
    /// The name as written, including the prefix (e.g. `w:fldCharType`).
    pub fn qualified_name(&self) -> String {
        qualify(self.prefix.as_deref(), &self.name)
    }
}

fn qualify(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, name),
        None => name.to_string(),
    }
}

impl XmlDocument {
    /// An empty document holding only the document node.
    pub(crate) fn empty() -> Self {
        Self {
            declaration: None,
            nodes: vec![Node::new(NodeKind::Document, None)],
            root: DOCUMENT,
        }
    }

    /// Allocate a node and append it to `parent`'s children.
    pub(crate) fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(kind, Some(parent)));
        self.nodes[parent.0].children.push(id);
        id
    }

    /// The synthetic node holding the root element and any top-level
    /// comments, processing instructions and whitespace.
    pub fn document_node(&self) -> NodeId {
        DOCUMENT
    }

    /// The root element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// The kind of a node.
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    /// The element data of a node, if it is an element.
    pub fn element(&self, id: NodeId) -> Option<&XmlElement> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Mutable element data of a node, if it is an element.
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut XmlElement> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Local name of an element node (`None` for non-elements).
    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.name.as_str())
    }

    /// Whether `id` is an element with the given local name.
    pub fn is_element_named(&self, id: NodeId, name: &str) -> bool {
        self.local_name(id) == Some(name)
    }

    /// Get an attribute value of an element node by local name.
    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.get_attribute(name))
    }

    /// Set an attribute on an element node, replacing an existing attribute
    /// with the same prefix and local name. Does nothing on non-elements.
    pub fn set_attribute(&mut self, id: NodeId, prefix: Option<&str>, name: &str, value: &str) {
        let Some(element) = self.element_mut(id) else {
            return;
        };
        match element
            .attributes
            .iter_mut()
            .find(|a| a.name == name && a.prefix.as_deref() == prefix)
        {
            Some(attr) => attr.value = value.to_string(),
            None => element.attributes.push(XmlAttribute {
                name: name.to_string(),
                prefix: prefix.map(str::to_string),
                value: value.to_string(),
            }),
        }
    }

    /// Parent of a node. `None` for the document node and detached nodes.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Parent of a node if that parent is an element.
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.element(*p).is_some())
    }

    /// All children of a node, in order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Element children of a node, in order.
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.element(*c).is_some())
            .collect()
    }

    /// The next sibling of `id` that is an element.
    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|s| *s == id)?;
        siblings[pos + 1..]
            .iter()
            .copied()
            .find(|s| self.element(*s).is_some())
    }

    /// `id` followed by every later element sibling, materialized.
    pub fn element_siblings_from(&self, id: NodeId) -> Vec<NodeId> {
        let Some(parent) = self.parent(id) else {
            return vec![id];
        };
        let siblings = self.children(parent);
        let Some(pos) = siblings.iter().position(|s| *s == id) else {
            return vec![id];
        };
        std::iter::once(id)
            .chain(
                siblings[pos + 1..]
                    .iter()
                    .copied()
                    .filter(|s| self.element(*s).is_some()),
            )
            .collect()
    }

    /// All descendants of `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Descendant elements of `id` with the given local name, in document order.
    pub fn descendants_by_local_name(&self, id: NodeId, name: &str) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|d| self.is_element_named(*d, name))
            .collect()
    }

    /// First descendant of `id` (in document order) matching `pred`.
    pub fn find_descendant(
        &self,
        id: NodeId,
        pred: impl Fn(&XmlDocument, NodeId) -> bool,
    ) -> Option<NodeId> {
        self.descendants(id).into_iter().find(|d| pred(self, *d))
    }

    /// Whether `id` is `ancestor` or lies below it.
    pub fn is_inclusive_descendant(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Whether `id` is still reachable from the document node.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.is_inclusive_descendant(id, DOCUMENT)
    }

    /// Concatenated text of `id` and its descendants (text and CDATA only).
    pub fn text_content(&self, id: NodeId) -> String {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) | NodeKind::CData(text) => text.clone(),
            NodeKind::Comment(text)
            | NodeKind::ProcessingInstruction(text)
            | NodeKind::DocType(text) => text.clone(),
            NodeKind::Document | NodeKind::Element(_) => {
                let mut out = String::new();
                for d in self.descendants(id) {
                    if let NodeKind::Text(text) | NodeKind::CData(text) = &self.nodes[d.0].kind {
                        out.push_str(text);
                    }
                }
                out
            }
        }
    }

    /// Replace the text of a node.
    ///
    /// For elements every child is detached and replaced by a single text
    /// node (none when `text` is empty). For character data nodes the content
    /// is replaced in place.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        if let NodeKind::Text(content)
        | NodeKind::CData(content)
        | NodeKind::Comment(content)
        | NodeKind::ProcessingInstruction(content)
        | NodeKind::DocType(content) = &mut self.nodes[id.0].kind
        {
            *content = text.to_string();
            return;
        }

        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
        if !text.is_empty() {
            self.append(id, NodeKind::Text(text.to_string()));
        }
    }

    /// Detach a node from its parent.
    ///
    /// The node and its subtree stay in the arena, so handles into it remain
    /// usable. Removing the document node or an already detached node is a
    /// no-op.
    pub fn remove(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id.0].parent.take() else {
            return;
        };
        self.nodes[parent.0].children.retain(|c| *c != id);
        if id == self.root {
            self.root = DOCUMENT;
        }
    }

    /// Number of nodes ever allocated, including detached ones.
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }
}
