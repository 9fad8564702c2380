//! Core node types: uids, source locations, attributes, and node payloads.
//!
//! These types are produced by the parser and consumed by every other layer.
//! They carry semantic and location data only; no live parser handles.

use serde::Serialize;
use smol_str::SmolStr;

/// Identifier of a node within one parse generation.
///
/// Generated uids are decimal strings ("1", "2", ...). The root is always
/// [`ROOT_NODE_UID`].
pub type NodeUid = SmolStr;

/// The fixed uid of the synthetic root node.
pub const ROOT_NODE_UID: &str = "ROOT";

/// A point in source text.
///
/// Lines and columns are 1-based, columns count chars. The offset is a
/// UTF-8 byte offset into the parsed source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Position {
    pub line: usize,
    pub col: usize,
    pub offset: usize,
}

impl Position {
    pub const fn new(line: usize, col: usize, offset: usize) -> Self {
        Self { line, col, offset }
    }
}

/// Location of a single tag (or any flat span) in the source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TagLocation {
    pub start_line: usize,
    pub start_col: usize,
    pub start_offset: usize,
    pub end_line: usize,
    pub end_col: usize,
    pub end_offset: usize,
}

impl TagLocation {
    pub fn new(start: Position, end: Position) -> Self {
        Self {
            start_line: start.line,
            start_col: start.col,
            start_offset: start.offset,
            end_line: end.line,
            end_col: end.col,
            end_offset: end.offset,
        }
    }

    pub fn start(&self) -> Position {
        Position::new(self.start_line, self.start_col, self.start_offset)
    }

    pub fn end(&self) -> Position {
        Position::new(self.end_line, self.end_col, self.end_offset)
    }
}

/// Full source span of a node.
///
/// `start_tag`/`end_tag` are only present on elements whose tags were
/// actually written in the source; they locate just the tag syntax.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub start_line: usize,
    pub start_col: usize,
    pub start_offset: usize,
    pub end_line: usize,
    pub end_col: usize,
    pub end_offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_tag: Option<TagLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_tag: Option<TagLocation>,
}

impl SourceLocation {
    /// The zero-width location carried by the synthetic root.
    pub const ZEROED: SourceLocation = SourceLocation {
        start_line: 0,
        start_col: 0,
        start_offset: 0,
        end_line: 0,
        end_col: 0,
        end_offset: 0,
        start_tag: None,
        end_tag: None,
    };

    /// Location spanning `start..end` with no tag information.
    pub fn span(start: Position, end: Position) -> Self {
        Self {
            start_line: start.line,
            start_col: start.col,
            start_offset: start.offset,
            end_line: end.line,
            end_col: end.col,
            end_offset: end.offset,
            start_tag: None,
            end_tag: None,
        }
    }

    /// Location of an element opened by `start_tag`, ending where the tag ends.
    pub fn from_start_tag(start_tag: TagLocation) -> Self {
        Self {
            start_tag: Some(start_tag),
            ..Self::span(start_tag.start(), start_tag.end())
        }
    }

    pub fn start(&self) -> Position {
        Position::new(self.start_line, self.start_col, self.start_offset)
    }

    pub fn end(&self) -> Position {
        Position::new(self.end_line, self.end_col, self.end_offset)
    }

    pub fn set_end(&mut self, end: Position) {
        self.end_line = end.line;
        self.end_col = end.col;
        self.end_offset = end.offset;
    }

    /// Byte range covered in the source.
    pub fn byte_range(&self) -> std::ops::Range<usize> {
        self.start_offset..self.end_offset
    }

    /// Both tags are present (the element has separate open/close syntax).
    pub fn has_tag_pair(&self) -> bool {
        self.start_tag.is_some() && self.end_tag.is_some()
    }

    /// Whether `other`'s byte range lies within this one.
    pub fn contains(&self, other: &SourceLocation) -> bool {
        self.start_offset <= other.start_offset && other.end_offset <= self.end_offset
    }
}

/// Ordered attribute list.
///
/// Names are unique; inserting an existing name replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Attribs(Vec<(SmolStr, String)>);

impl Attribs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|(n, _)| n == name)
    }

    /// Insert or replace. Returns the previous value, if any.
    pub fn insert(&mut self, name: impl Into<SmolStr>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.0.push((name, value));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.0.iter().position(|(n, _)| n == name)?;
        Some(self.0.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N: Into<SmolStr>, V: Into<String>> FromIterator<(N, V)> for Attribs {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut attribs = Attribs::new();
        for (name, value) in iter {
            attribs.insert(name, value);
        }
        attribs
    }
}

/// Payload of an element node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ElementData {
    pub tag_name: SmolStr,
    pub attribs: Attribs,
    pub location: Option<SourceLocation>,
}

/// Payload of a text or comment node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TextData {
    pub content: String,
    pub location: Option<SourceLocation>,
}

/// Payload of a doctype node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DoctypeData {
    pub name: SmolStr,
    pub location: Option<SourceLocation>,
}

/// Per-kind node payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeData {
    Root,
    Element(ElementData),
    Text(TextData),
    Comment(TextData),
    Doctype(DoctypeData),
}

static EMPTY_ATTRIBS: Attribs = Attribs(Vec::new());

impl NodeData {
    /// False exactly for text and doctype nodes.
    ///
    /// Invalid nodes can't be selected on their own; the code selection
    /// resolver uses a looser containment test for them.
    pub fn valid(&self) -> bool {
        !matches!(self, NodeData::Text(_) | NodeData::Doctype(_))
    }

    pub fn node_name(&self) -> &str {
        match self {
            NodeData::Root => "",
            NodeData::Element(el) => el.tag_name.as_str(),
            NodeData::Text(_) => "#text",
            NodeData::Comment(_) => "#comment",
            NodeData::Doctype(_) => "#documentType",
        }
    }

    /// Tag name for elements, empty otherwise.
    pub fn tag_name(&self) -> &str {
        match self {
            NodeData::Element(el) => el.tag_name.as_str(),
            _ => "",
        }
    }

    /// Text of text and comment nodes, empty otherwise.
    pub fn text_content(&self) -> &str {
        match self {
            NodeData::Text(t) | NodeData::Comment(t) => t.content.as_str(),
            _ => "",
        }
    }

    pub fn attribs(&self) -> &Attribs {
        match self {
            NodeData::Element(el) => &el.attribs,
            _ => &EMPTY_ATTRIBS,
        }
    }

    pub fn source_location(&self) -> Option<&SourceLocation> {
        match self {
            NodeData::Root => Some(&SourceLocation::ZEROED),
            NodeData::Element(el) => el.location.as_ref(),
            NodeData::Text(t) | NodeData::Comment(t) => t.location.as_ref(),
            NodeData::Doctype(d) => d.location.as_ref(),
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self, NodeData::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, NodeData::Text(_))
    }
}

/// A node in the tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Node {
    pub uid: NodeUid,
    pub parent_uid: Option<NodeUid>,
    pub display_name: SmolStr,
    /// Construction-time leaf marker: cleared when the first child attaches.
    pub is_entity: bool,
    /// Child uids in document order.
    pub children: Vec<NodeUid>,
    pub data: NodeData,
}

impl Node {
    /// The synthetic root.
    pub fn root() -> Self {
        Self {
            uid: NodeUid::new_static(ROOT_NODE_UID),
            parent_uid: None,
            display_name: SmolStr::new_static(ROOT_NODE_UID),
            is_entity: true,
            children: Vec::new(),
            data: NodeData::Root,
        }
    }

    /// A detached node; `parent_uid` is filled in when it is attached.
    pub fn new(uid: NodeUid, data: NodeData) -> Self {
        Self {
            uid,
            parent_uid: None,
            display_name: data.node_name().into(),
            is_entity: true,
            children: Vec::new(),
            data,
        }
    }

    pub fn is_root(&self) -> bool {
        self.uid == ROOT_NODE_UID
    }

    pub fn valid(&self) -> bool {
        self.data.valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribs_insert_replaces_in_place() {
        let mut attribs = Attribs::new();
        attribs.insert("class", "a");
        attribs.insert("id", "x");
        assert_eq!(attribs.insert("class", "b"), Some("a".to_string()));

        let pairs: Vec<_> = attribs.iter().collect();
        assert_eq!(pairs, vec![("class", "b"), ("id", "x")]);
    }

    #[test]
    fn test_attribs_remove() {
        let mut attribs: Attribs = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(attribs.remove("a"), Some("1".to_string()));
        assert_eq!(attribs.remove("a"), None);
        assert_eq!(attribs.len(), 1);
    }

    #[test]
    fn test_validity_by_kind() {
        let text = NodeData::Text(TextData {
            content: "hi".into(),
            location: None,
        });
        let doctype = NodeData::Doctype(DoctypeData {
            name: "html".into(),
            location: None,
        });
        let comment = NodeData::Comment(TextData {
            content: "c".into(),
            location: None,
        });
        assert!(!text.valid());
        assert!(!doctype.valid());
        assert!(comment.valid());
        assert!(NodeData::Root.valid());
    }

    #[test]
    fn test_root_location_is_zeroed() {
        let root = Node::root();
        assert!(root.is_root());
        assert_eq!(root.data.source_location(), Some(&SourceLocation::ZEROED));
        assert_eq!(root.display_name, ROOT_NODE_UID);
    }

    #[test]
    fn test_location_contains() {
        let outer = SourceLocation::span(Position::new(1, 1, 0), Position::new(1, 13, 12));
        let inner = SourceLocation::span(Position::new(1, 4, 3), Position::new(1, 9, 8));
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
    }
}
