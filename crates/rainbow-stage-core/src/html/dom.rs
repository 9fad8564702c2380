//! Arena-backed parse DOM.
//!
//! This is the raw document the tree builder produces. The node tree is a
//! uid-addressed projection of it; the document itself is what gets
//! serialized for rendering.

use smol_str::SmolStr;

use crate::types::{Attribs, SourceLocation};

/// Index of a node in a [`Document`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomNodeId(usize);

impl DomNodeId {
    pub const DOCUMENT: DomNodeId = DomNodeId(0);

    pub fn index(self) -> usize {
        self.0
    }

    pub(crate) fn from_index(index: usize) -> Self {
        DomNodeId(index)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomNodeKind {
    Document,
    Doctype { name: SmolStr },
    Element { name: SmolStr, attrs: Attribs },
    Text(String),
    Comment(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomNode {
    pub kind: DomNodeKind,
    pub parent: Option<DomNodeId>,
    pub children: Vec<DomNodeId>,
    /// `None` for nodes the builder inserted without source syntax.
    pub location: Option<SourceLocation>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<DomNode>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![DomNode {
                kind: DomNodeKind::Document,
                parent: None,
                children: Vec::new(),
                location: None,
            }],
        }
    }

    pub fn root(&self) -> DomNodeId {
        DomNodeId::DOCUMENT
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn node(&self, id: DomNodeId) -> &DomNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: DomNodeId) -> &mut DomNode {
        &mut self.nodes[id.0]
    }

    /// Allocate a detached node.
    pub fn create(&mut self, kind: DomNodeKind, location: Option<SourceLocation>) -> DomNodeId {
        let id = DomNodeId(self.nodes.len());
        self.nodes.push(DomNode {
            kind,
            parent: None,
            children: Vec::new(),
            location,
        });
        id
    }

    pub fn append_child(&mut self, parent: DomNodeId, child: DomNodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn children(&self, id: DomNodeId) -> &[DomNodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: DomNodeId) -> Option<DomNodeId> {
        self.nodes[id.0].parent
    }

    pub fn last_child(&self, id: DomNodeId) -> Option<DomNodeId> {
        self.nodes[id.0].children.last().copied()
    }

    pub fn element_name(&self, id: DomNodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            DomNodeKind::Element { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn attrs(&self, id: DomNodeId) -> Option<&Attribs> {
        match &self.nodes[id.0].kind {
            DomNodeKind::Element { attrs, .. } => Some(attrs),
            _ => None,
        }
    }

    /// Set an attribute on an element, replacing any existing value.
    ///
    /// No-op on non-elements.
    pub fn set_attribute(&mut self, id: DomNodeId, name: &str, value: impl Into<String>) {
        if let DomNodeKind::Element { attrs, .. } = &mut self.nodes[id.0].kind {
            attrs.insert(name, value);
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: DomNodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let DomNodeKind::Text(text) = &self.nodes[current.0].kind {
                out.push_str(text);
            }
            stack.extend(self.nodes[current.0].children.iter().rev().copied());
        }
        out
    }

    /// First element named `name` in document order.
    pub fn find_element(&self, name: &str) -> Option<DomNodeId> {
        let mut stack = vec![self.root()];
        while let Some(current) = stack.pop() {
            if self.element_name(current) == Some(name) {
                return Some(current);
            }
            stack.extend(self.nodes[current.0].children.iter().rev().copied());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(doc: &mut Document, name: &str) -> DomNodeId {
        doc.create(
            DomNodeKind::Element {
                name: name.into(),
                attrs: Attribs::new(),
            },
            None,
        )
    }

    #[test]
    fn test_append_and_find() {
        let mut doc = Document::new();
        let html = element(&mut doc, "html");
        let body = element(&mut doc, "body");
        let text = doc.create(DomNodeKind::Text("hi".into()), None);
        doc.append_child(doc.root(), html);
        doc.append_child(html, body);
        doc.append_child(body, text);

        assert_eq!(doc.parent(text), Some(body));
        assert_eq!(doc.find_element("body"), Some(body));
        assert_eq!(doc.text_content(html), "hi");
        assert!(!doc.is_empty());
    }

    #[test]
    fn test_set_attribute_replaces() {
        let mut doc = Document::new();
        let div = element(&mut doc, "div");
        doc.set_attribute(div, "id", "a");
        doc.set_attribute(div, "id", "b");
        let attrs = doc.attrs(div).unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get("id"), Some("b"));
    }
}
