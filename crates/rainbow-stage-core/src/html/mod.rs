//! HTML parsing into a uid-addressed node tree.
//!
//! [`parse`] runs the error-tolerant tree builder, then walks the resulting
//! document breadth-first, allocating a uid per node and writing it back onto
//! every element as [`STAGE_NODE_ID_ATTR`]. The serialized document with
//! those identifiers is what the stage renders.

mod builder;
pub mod dom;
pub mod entities;
pub mod lines;
pub mod serialize;
pub mod tokenizer;

#[cfg(test)]
mod tests;

use std::collections::VecDeque;

use smol_str::{SmolStr, ToSmolStr};

use crate::config::StageConfig;
use crate::error::ParseDiagnostic;
use crate::ids::STAGE_NODE_ID_ATTR;
use crate::tree::NodeTree;
use crate::types::{
    Attribs, DoctypeData, ElementData, Node, NodeData, NodeUid, ROOT_NODE_UID, TextData,
};

use self::builder::TreeBuilder;
use self::dom::{Document, DomNodeId, DomNodeKind};
use self::serialize::{SerializeOptions, serialize};

/// Title used when the document has no non-empty `<title>`.
pub const DEFAULT_TITLE: &str = "Rainbow";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseConfig {
    pub fallback_title: SmolStr,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            fallback_title: SmolStr::new_static(DEFAULT_TITLE),
        }
    }
}

impl From<&StageConfig> for ParseConfig {
    fn from(config: &StageConfig) -> Self {
        Self {
            fallback_title: config.fallback_title.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ParseOutput {
    /// Serialized document with stage identifiers injected.
    pub content_in_app: String,
    pub tree: NodeTree,
    /// The underlying parse document, identifiers included.
    pub document: Document,
    pub title: SmolStr,
    /// Problems the parser recovered from.
    pub diagnostics: Vec<ParseDiagnostic>,
}

/// Parse with the default configuration.
pub fn parse(content: &str) -> ParseOutput {
    parse_with(content, &ParseConfig::default(), None)
}

/// Parse `content`, optionally reporting the document title to `on_title`.
///
/// Never fails: malformed input is recovered and reported in
/// [`ParseOutput::diagnostics`].
#[tracing::instrument(level = "debug", skip_all, fields(len = content.len()))]
pub fn parse_with(
    content: &str,
    config: &ParseConfig,
    on_title: Option<&mut dyn FnMut(&str)>,
) -> ParseOutput {
    let (mut document, diagnostics) = TreeBuilder::new(content).build();
    if !diagnostics.is_empty() {
        tracing::debug!(count = diagnostics.len(), "recovered parse errors");
    }

    let mut tree = NodeTree::with_root(Node::root());
    let mut title: Option<SmolStr> = None;
    let mut next_uid: u64 = 0;

    let mut queue: VecDeque<(NodeUid, DomNodeId)> = VecDeque::new();
    queue.push_back((NodeUid::new_static(ROOT_NODE_UID), document.root()));

    while let Some((parent_uid, parent_id)) = queue.pop_front() {
        for child in document.children(parent_id).to_vec() {
            next_uid += 1;
            let uid = next_uid.to_smolstr();

            if title.is_none() && document.element_name(child) == Some("title") {
                title = Some(document.text_content(child).into());
            }

            let data = node_data(&document, child, &uid);
            tree.attach(&parent_uid, Node::new(uid.clone(), data));
            document.set_attribute(child, STAGE_NODE_ID_ATTR, uid.as_str());
            queue.push_back((uid, child));
        }
    }

    let title = title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| config.fallback_title.clone());
    if let Some(on_title) = on_title {
        on_title(&title);
    }

    let content_in_app = serialize(&document, SerializeOptions { stage_ids: true });
    tracing::debug!(nodes = tree.len(), %title, "parsed document");

    ParseOutput {
        content_in_app,
        tree,
        document,
        title,
        diagnostics,
    }
}

/// Tree payload for one parse node. Element attributes lead with the
/// identifier; a stale identifier from earlier output is dropped.
fn node_data(document: &Document, id: DomNodeId, uid: &NodeUid) -> NodeData {
    let node = document.node(id);
    match &node.kind {
        DomNodeKind::Element { name, attrs } => {
            let mut attribs = Attribs::new();
            attribs.insert(STAGE_NODE_ID_ATTR, uid.as_str());
            for (attr, value) in attrs.iter() {
                if attr != STAGE_NODE_ID_ATTR {
                    attribs.insert(attr, value);
                }
            }
            NodeData::Element(ElementData {
                tag_name: name.clone(),
                attribs,
                location: node.location,
            })
        }
        DomNodeKind::Text(content) => NodeData::Text(TextData {
            content: content.clone(),
            location: node.location,
        }),
        DomNodeKind::Comment(content) => NodeData::Comment(TextData {
            content: content.clone(),
            location: node.location,
        }),
        DomNodeKind::Doctype { name } => NodeData::Doctype(DoctypeData {
            name: name.clone(),
            location: node.location,
        }),
        DomNodeKind::Document => NodeData::Root,
    }
}
