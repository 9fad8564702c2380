//! Mapping code editor selections onto tree nodes.

use serde::{Deserialize, Serialize};

use crate::tree::{NodeTree, subtree_uids_bfs};
use crate::types::{NodeUid, Position, ROOT_NODE_UID, SourceLocation, TagLocation};

/// A selection in the code editor. Lines and columns are 1-based.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSelection {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl CodeSelection {
    pub fn new(start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// A collapsed selection (a cursor).
    pub fn caret(line: usize, col: usize) -> Self {
        Self::new(line, col, line, col)
    }

    /// The selection covering exactly `location`.
    pub fn from_location(location: &SourceLocation) -> Self {
        Self::new(
            location.start_line,
            location.start_col,
            location.end_line,
            location.end_col,
        )
    }

    /// Whether this selection lies inside `location`.
    ///
    /// `strict` excludes the location's own boundaries on both sides.
    fn within(&self, location: &SourceLocation, strict: bool) -> bool {
        let front = if self.start_line == location.start_line {
            if strict {
                self.start_col > location.start_col
            } else {
                self.start_col >= location.start_col
            }
        } else {
            self.start_line > location.start_line
        };
        let back = if self.end_line == location.end_line {
            if strict {
                self.end_col < location.end_col
            } else {
                self.end_col <= location.end_col
            }
        } else {
            self.end_line < location.end_line
        };
        front && back
    }
}

/// A range of source text to replace. 1-based, end exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRange {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl CodeRange {
    pub fn new(start: Position, end: Position) -> Self {
        Self {
            start_line: start.line,
            start_col: start.col,
            end_line: end.line,
            end_col: end.col,
        }
    }

    /// The content between an element's start and end tags.
    pub fn between_tags(start_tag: &TagLocation, end_tag: &TagLocation) -> Self {
        Self::new(start_tag.end(), end_tag.start())
    }
}

/// The node a code selection focuses.
///
/// Scans nodes deepest-first (reverse breadth-first order) and takes the
/// first whose span contains the selection. Element, comment and root spans
/// must contain it strictly; text and doctype spans inclusively. A text or
/// doctype match resolves to its parent, unless that parent has other
/// selectable children in `valid_tree`, in which case nothing is focused.
pub fn resolve_uid_for_selection(
    selection: &CodeSelection,
    tree: &NodeTree,
    valid_tree: &NodeTree,
) -> Option<NodeUid> {
    let mut uids = subtree_uids_bfs(ROOT_NODE_UID, tree);
    uids.reverse();

    for uid in &uids {
        let Some(node) = tree.get(uid) else {
            continue;
        };
        let Some(location) = node.data.source_location() else {
            continue;
        };
        let valid = node.valid();
        if !selection.within(location, valid) {
            continue;
        }

        tracing::trace!(%uid, valid, "code selection matched node");
        if valid {
            return Some(uid.clone());
        }
        let parent_uid = node.parent_uid.as_ref()?;
        let parent = valid_tree.get(parent_uid)?;
        return if parent.children.is_empty() {
            Some(parent_uid.clone())
        } else {
            None
        };
    }
    None
}
