//! Explicit application store for stage state.
//!
//! The coordinator never mutates shared state directly; it emits
//! [`StoreAction`]s, and whatever owns the state applies them. [`StageState`]
//! is the reference reducer and [`MemoryStore`] a minimal store around it.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::tree::NodeTree;
use crate::types::NodeUid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    #[default]
    None,
    Stage,
    Code,
    NodeTree,
    FileTree,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StoreAction {
    SetNodeTree(NodeTree),
    /// `None` clears the hover.
    SetHoveredNodeUid(Option<NodeUid>),
    FocusNodeTreeNode(NodeUid),
    SelectNodeTreeNodes(Vec<NodeUid>),
    ExpandNodeTreeNodes(Vec<NodeUid>),
    CollapseNodeTreeNodes(Vec<NodeUid>),
    SetSelectedNodeUids(Vec<NodeUid>),
    SetContentEditableUid(Option<NodeUid>),
    SetCurrentFileUid(NodeUid),
    FocusFileTreeNode(NodeUid),
    SelectFileTreeNodes(Vec<NodeUid>),
    ExpandFileTreeNodes(Vec<NodeUid>),
    CollapseFileTreeNodes(Vec<NodeUid>),
    SetCurrentFileContent(String),
    /// Code editor language id of the current file.
    SetCurrentFileLanguage(String),
    SetActivePanel(Panel),
    /// Carry tree view state across a structural edit: forget deleted uids
    /// and move state from each old uid to its replacement.
    UpdateTreeViewState {
        deleted_uids: Vec<NodeUid>,
        converted_uids: Vec<(NodeUid, NodeUid)>,
    },
    ClearTreeViewState,
}

/// Focus, expansion and selection of a tree view.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TreeViewState {
    pub focused: Option<NodeUid>,
    pub expanded: BTreeSet<NodeUid>,
    pub selected: BTreeSet<NodeUid>,
}

impl TreeViewState {
    fn forget(&mut self, uid: &NodeUid) {
        if self.focused.as_ref() == Some(uid) {
            self.focused = None;
        }
        self.expanded.remove(uid);
        self.selected.remove(uid);
    }

    fn convert(&mut self, prev: &NodeUid, cur: &NodeUid) {
        if self.expanded.remove(prev) {
            self.expanded.insert(cur.clone());
        }
        if self.selected.remove(prev) {
            self.selected.insert(cur.clone());
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StageState {
    pub node_tree: NodeTree,
    pub tree_view: TreeViewState,
    pub hovered: Option<NodeUid>,
    pub selected_uids: Vec<NodeUid>,
    pub content_editable: Option<NodeUid>,
    pub current_file_uid: Option<NodeUid>,
    pub file_tree_view: TreeViewState,
    pub current_file_content: String,
    pub current_file_language: String,
    pub active_panel: Panel,
}

impl StageState {
    pub fn reduce(&mut self, action: StoreAction) {
        tracing::trace!(?action, "reduce");
        match action {
            StoreAction::SetNodeTree(tree) => {
                self.node_tree = tree;
                self.reconcile();
            }
            StoreAction::SetHoveredNodeUid(uid) => self.hovered = uid,
            StoreAction::FocusNodeTreeNode(uid) => self.tree_view.focused = Some(uid),
            StoreAction::SelectNodeTreeNodes(uids) => {
                self.tree_view.selected = uids.into_iter().collect();
            }
            StoreAction::ExpandNodeTreeNodes(uids) => self.tree_view.expanded.extend(uids),
            StoreAction::CollapseNodeTreeNodes(uids) => {
                for uid in &uids {
                    self.tree_view.expanded.remove(uid);
                }
            }
            StoreAction::SetSelectedNodeUids(uids) => self.selected_uids = uids,
            StoreAction::SetContentEditableUid(uid) => self.content_editable = uid,
            StoreAction::SetCurrentFileUid(uid) => self.current_file_uid = Some(uid),
            StoreAction::FocusFileTreeNode(uid) => self.file_tree_view.focused = Some(uid),
            StoreAction::SelectFileTreeNodes(uids) => {
                self.file_tree_view.selected = uids.into_iter().collect();
            }
            StoreAction::ExpandFileTreeNodes(uids) => self.file_tree_view.expanded.extend(uids),
            StoreAction::CollapseFileTreeNodes(uids) => {
                for uid in &uids {
                    self.file_tree_view.expanded.remove(uid);
                }
            }
            StoreAction::SetCurrentFileContent(content) => self.current_file_content = content,
            StoreAction::SetCurrentFileLanguage(language) => {
                self.current_file_language = language;
            }
            StoreAction::SetActivePanel(panel) => self.active_panel = panel,
            StoreAction::UpdateTreeViewState {
                deleted_uids,
                converted_uids,
            } => {
                for uid in &deleted_uids {
                    self.tree_view.forget(uid);
                }
                for (prev, cur) in &converted_uids {
                    self.tree_view.convert(prev, cur);
                }
            }
            StoreAction::ClearTreeViewState => self.tree_view = TreeViewState::default(),
        }
    }

    /// Drop every uid that no longer names a node in `node_tree`.
    ///
    /// Uids are only stable within one parse; after a rebuild, state that
    /// points at vanished nodes is forgotten rather than misapplied.
    pub fn reconcile(&mut self) {
        let tree = &self.node_tree;
        let keep = |uid: &NodeUid| tree.contains(uid);

        if self.tree_view.focused.as_ref().is_some_and(|uid| !keep(uid)) {
            self.tree_view.focused = None;
        }
        self.tree_view.expanded.retain(keep);
        self.tree_view.selected.retain(keep);
        self.selected_uids.retain(keep);
        if self.hovered.as_ref().is_some_and(|uid| !keep(uid)) {
            self.hovered = None;
        }
        if self.content_editable.as_ref().is_some_and(|uid| !keep(uid)) {
            self.content_editable = None;
        }
    }
}

/// Something that accepts store actions.
pub trait Store {
    fn dispatch(&mut self, action: StoreAction);

    fn state(&self) -> &StageState;
}

/// In-memory store that also records every dispatched action.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: StageState,
    log: Vec<StoreAction>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every action dispatched so far, oldest first.
    pub fn actions(&self) -> &[StoreAction] {
        &self.log
    }

    pub fn clear_actions(&mut self) {
        self.log.clear();
    }
}

impl Store for MemoryStore {
    fn dispatch(&mut self, action: StoreAction) {
        self.log.push(action.clone());
        self.state.reduce(action);
    }

    fn state(&self) -> &StageState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse;

    fn uids(list: &[&str]) -> Vec<NodeUid> {
        list.iter().map(|u| NodeUid::from(*u)).collect()
    }

    #[test]
    fn test_select_replaces_tree_selection() {
        let mut state = StageState::default();
        state.reduce(StoreAction::SelectNodeTreeNodes(uids(&["1", "2"])));
        state.reduce(StoreAction::SelectNodeTreeNodes(uids(&["3"])));
        assert_eq!(state.tree_view.selected, uids(&["3"]).into_iter().collect());
    }

    #[test]
    fn test_expand_and_collapse() {
        let mut state = StageState::default();
        state.reduce(StoreAction::ExpandNodeTreeNodes(uids(&["1", "2", "3"])));
        state.reduce(StoreAction::CollapseNodeTreeNodes(uids(&["2"])));
        assert_eq!(state.tree_view.expanded, uids(&["1", "3"]).into_iter().collect());
    }

    #[test]
    fn test_file_tree_state_is_separate() {
        let mut state = StageState::default();
        state.reduce(StoreAction::FocusFileTreeNode("src".into()));
        state.reduce(StoreAction::ExpandFileTreeNodes(uids(&["src"])));
        state.reduce(StoreAction::SelectFileTreeNodes(uids(&["src/a.html", "src/b.html"])));
        state.reduce(StoreAction::CollapseFileTreeNodes(uids(&["src"])));

        assert_eq!(state.file_tree_view.focused.as_deref(), Some("src"));
        assert!(state.file_tree_view.expanded.is_empty());
        assert_eq!(state.file_tree_view.selected.len(), 2);
        assert_eq!(state.tree_view, TreeViewState::default());

        // A new node tree leaves the file tree alone.
        state.reduce(StoreAction::SetNodeTree(parse("<p>x</p>").tree));
        assert_eq!(state.file_tree_view.selected.len(), 2);
    }

    #[test]
    fn test_update_tree_view_state() {
        let mut state = StageState::default();
        state.reduce(StoreAction::FocusNodeTreeNode("1".into()));
        state.reduce(StoreAction::ExpandNodeTreeNodes(uids(&["1", "2"])));
        state.reduce(StoreAction::SelectNodeTreeNodes(uids(&["1", "2"])));
        state.reduce(StoreAction::UpdateTreeViewState {
            deleted_uids: uids(&["1"]),
            converted_uids: vec![("2".into(), "9".into())],
        });
        assert_eq!(state.tree_view.focused, None);
        assert_eq!(state.tree_view.expanded, uids(&["9"]).into_iter().collect());
        assert_eq!(state.tree_view.selected, uids(&["9"]).into_iter().collect());
    }

    #[test]
    fn test_new_tree_reconciles_stale_uids() {
        let mut store = MemoryStore::new();
        store.dispatch(StoreAction::SetSelectedNodeUids(uids(&["2", "500"])));
        store.dispatch(StoreAction::SetHoveredNodeUid(Some("500".into())));
        store.dispatch(StoreAction::SetContentEditableUid(Some("2".into())));
        store.dispatch(StoreAction::SetNodeTree(parse("<p>x</p>").tree));

        let state = store.state();
        assert_eq!(state.selected_uids, uids(&["2"]));
        assert_eq!(state.hovered, None);
        assert_eq!(state.content_editable.as_deref(), Some("2"));
        assert_eq!(store.actions().len(), 4);
    }
}
