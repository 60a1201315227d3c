//! Element Tree
//!
//! Minimal in-memory XML element tree used to assemble query filters.
//! Nodes live in an arena and are addressed by [`NodeId`], which keeps
//! parent lookups (needed by the leaf-content rule) trivial.

use std::io;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

/// Index of a node inside an [`ElementTree`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A single element: tag name, ordered children, optional text
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementNode {
    /// Element tag name
    pub tag: String,
    /// Text content (rendered before any children)
    pub text: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl ElementNode {
    fn new(tag: impl Into<String>, parent: Option<NodeId>) -> Self {
        Self {
            tag: tag.into(),
            text: None,
            parent,
            children: Vec::new(),
        }
    }

    /// Parent of this node (`None` for the root)
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Arena-backed element tree with a single root
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementTree {
    nodes: Vec<ElementNode>,
}

impl ElementTree {
    /// Create a tree containing only a root element
    pub fn new(root_tag: impl Into<String>) -> Self {
        Self {
            nodes: vec![ElementNode::new(root_tag, None)],
        }
    }

    /// The root node
    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Append a new child element under `parent` and return its id
    pub fn append_child(&mut self, parent: NodeId, tag: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(ElementNode::new(tag, Some(parent)));
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Borrow a node
    #[must_use]
    pub fn node(&self, id: NodeId) -> &ElementNode {
        &self.nodes[id.0]
    }

    /// Replace the text content of a node
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        self.nodes[id.0].text = Some(text.into());
    }

    /// Parent of a node
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Find the first child of `parent` with the given tag
    #[must_use]
    pub fn find_child(&self, parent: NodeId, tag: &str) -> Option<NodeId> {
        self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .find(|c| self.nodes[c.0].tag == tag)
    }

    /// Number of nodes in the tree
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a tree has at least its root
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Serialize compactly, children in insertion order
    ///
    /// Text is escaped; a node with neither text nor children self-closes.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut writer = Writer::new(Vec::new());
        if let Err(e) = self.write_node(self.root(), &mut writer) {
            // writes into a Vec<u8> do not fail
            tracing::error!(error = %e, "Element serialization failed");
        }
        String::from_utf8_lossy(&writer.into_inner()).into_owned()
    }

    fn write_node(&self, id: NodeId, writer: &mut Writer<Vec<u8>>) -> io::Result<()> {
        let node = &self.nodes[id.0];
        if node.text.is_none() && node.children.is_empty() {
            return writer.write_event(Event::Empty(BytesStart::new(node.tag.as_str())));
        }

        writer.write_event(Event::Start(BytesStart::new(node.tag.as_str())))?;
        if let Some(text) = &node.text {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        for child in &node.children {
            self.write_node(*child, writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(node.tag.as_str())))
    }
}

/// Whether `tag` is usable as an XML element name
///
/// Accepts a letter or underscore first, then letters, digits, `-`, `_`
/// or `.`. Namespace prefixes are not supported.
#[must_use]
pub fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    if tag
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("xml"))
    {
        return false;
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_element_self_closes() {
        let tree = ElementTree::new("get");
        assert_eq!(tree.to_xml(), "<get/>");
    }

    #[test]
    fn test_children_keep_insertion_order() {
        let mut tree = ElementTree::new("root");
        let root = tree.root();
        tree.append_child(root, "b");
        tree.append_child(root, "a");
        assert_eq!(tree.to_xml(), "<root><b/><a/></root>");
    }

    #[test]
    fn test_text_renders_before_children() {
        let mut tree = ElementTree::new("A");
        let root = tree.root();
        tree.append_child(root, "B");
        tree.set_text(root, "3");
        assert_eq!(tree.to_xml(), "<A>3<B/></A>");
    }

    #[test]
    fn test_text_is_escaped() {
        let mut tree = ElementTree::new("A");
        let root = tree.root();
        tree.set_text(root, "a<b&c>");
        assert_eq!(tree.to_xml(), "<A>a&lt;b&amp;c&gt;</A>");
    }

    #[test]
    fn test_nested_empty_leaves() {
        let mut tree = ElementTree::new("get");
        let filter = tree.append_child(tree.root(), "filter");
        let op = tree.append_child(filter, "Operational");
        let rsvp = tree.append_child(op, "RSVP");
        tree.append_child(rsvp, "InterfaceSummaryTable");
        assert_eq!(
            tree.to_xml(),
            "<get><filter><Operational><RSVP><InterfaceSummaryTable/></RSVP>\
             </Operational></filter></get>"
        );
    }

    #[test]
    fn test_parent_links() {
        let mut tree = ElementTree::new("get");
        let filter = tree.append_child(tree.root(), "filter");
        let op = tree.append_child(filter, "Operational");
        assert_eq!(tree.parent(op), Some(filter));
        assert_eq!(tree.parent(filter), Some(tree.root()));
        assert_eq!(tree.parent(tree.root()), None);
        assert_eq!(tree.find_child(filter, "Operational"), Some(op));
    }

    #[test]
    fn test_tag_validation() {
        assert!(is_valid_tag("InterfaceTable"));
        assert!(is_valid_tag("_private"));
        assert!(is_valid_tag("bgp-neighbor.v2"));
        assert!(!is_valid_tag(""));
        assert!(!is_valid_tag("3"));
        assert!(!is_valid_tag("-dash"));
        assert!(!is_valid_tag("two words"));
        assert!(!is_valid_tag("a<b"));
        assert!(!is_valid_tag("xmlThing"));
    }
}
