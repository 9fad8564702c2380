//! Hover, selection and content-editable state for the stage.
//!
//! The coordinator is driven by the host: pointer events arrive as live
//! elements, code editor selections as [`CodeSelection`]s, and time as the
//! `now` passed to the methods that schedule or drain deferred work. Every
//! change to shared state leaves as a [`StoreAction`] dispatched through the
//! [`StageHost`].

use std::time::Duration;

use tracing::{debug, trace, warn};
use web_time::Instant;

use crate::code_selection::{CodeRange, CodeSelection, resolve_uid_for_selection};
use crate::config::StageConfig;
use crate::element::{StageElement, resolve_stage_element, resolve_stage_uid};
use crate::error::StageError;
use crate::ids::strip_reserved_attributes;
use crate::platform::StageHost;
use crate::schedule::Debouncer;
use crate::store::{Panel, StoreAction};
use crate::tree::{NodeTree, valid_uids};
use crate::types::NodeUid;
use crate::workspace::{FileNode, WorkspaceFiles, has_unsaved_changes, language_from_extension};

/// Where the stage interaction currently is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionState {
    Idle,
    SingleSelected(NodeUid),
    MultiSelected(Vec<NodeUid>),
    /// Text editing inside the rendered element.
    ContentEditable(NodeUid),
}

/// Modifier keys held during a pointer event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PointerModifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub alt: bool,
}

impl PointerModifiers {
    pub const NONE: PointerModifiers = PointerModifiers {
        shift: false,
        ctrl: false,
        meta: false,
        alt: false,
    };

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::NONE
        }
    }

    /// Ctrl or meta: the user asked for the exact element under the pointer.
    pub fn precise(&self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TaskKey {
    SelectAll,
    AutoExpand,
    Reselect,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum DeferredTask {
    SelectAllText(NodeUid),
    ExpandNode(NodeUid),
    SelectNode(NodeUid),
}

/// Interaction state machine for one rendered document.
#[derive(Debug)]
pub struct StageCoordinator {
    config: StageConfig,
    tree: NodeTree,
    valid_tree: NodeTree,
    hovered: Option<NodeUid>,
    focused: Option<NodeUid>,
    selected: Vec<NodeUid>,
    editing: Option<NodeUid>,
    last_clicked: Option<NodeUid>,
    /// The stage shows the file open in the code view.
    parse_file: bool,
    tasks: Debouncer<TaskKey, DeferredTask>,
}

impl Default for StageCoordinator {
    fn default() -> Self {
        Self::new(StageConfig::default())
    }
}

impl StageCoordinator {
    pub fn new(config: StageConfig) -> Self {
        Self {
            config,
            tree: NodeTree::default(),
            valid_tree: NodeTree::default(),
            hovered: None,
            focused: None,
            selected: Vec::new(),
            editing: None,
            last_clicked: None,
            parse_file: true,
            tasks: Debouncer::new(),
        }
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    pub fn state(&self) -> InteractionState {
        if let Some(uid) = &self.editing {
            return InteractionState::ContentEditable(uid.clone());
        }
        match self.selected.as_slice() {
            [] => InteractionState::Idle,
            [uid] => InteractionState::SingleSelected(uid.clone()),
            uids => InteractionState::MultiSelected(uids.to_vec()),
        }
    }

    pub fn hovered(&self) -> Option<&NodeUid> {
        self.hovered.as_ref()
    }

    pub fn focused(&self) -> Option<&NodeUid> {
        self.focused.as_ref()
    }

    pub fn selected(&self) -> &[NodeUid] {
        &self.selected
    }

    pub fn editing(&self) -> Option<&NodeUid> {
        self.editing.as_ref()
    }

    /// Record whether the code view shows the file rendered on the stage.
    pub fn set_parse_file(&mut self, parse_file: bool) {
        self.parse_file = parse_file;
    }

    /// When the next deferred task falls due, for arming a host timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.tasks.next_deadline()
    }

    /// Install a freshly parsed tree.
    ///
    /// Uids only hold within one parse, so local state naming nodes that are
    /// gone is dropped. An edit session on a vanished node ends without a
    /// flush: its element was replaced by the re-render.
    pub fn set_tree<H: StageHost>(&mut self, host: &mut H, tree: NodeTree) {
        self.valid_tree = tree.valid_tree();
        self.tree = tree;

        let tree = &self.tree;
        let stale = |uid: &Option<NodeUid>| uid.as_ref().is_some_and(|uid| !tree.contains(uid));
        if stale(&self.hovered) {
            self.hovered = None;
        }
        if stale(&self.focused) {
            self.focused = None;
        }
        if stale(&self.last_clicked) {
            self.last_clicked = None;
        }
        if stale(&self.editing) {
            self.editing = None;
            self.tasks.cancel(&TaskKey::SelectAll);
        }
        self.selected.retain(|uid| tree.contains(uid));

        debug!(nodes = self.tree.len(), "stage tree replaced");
        host.dispatch(StoreAction::SetNodeTree(self.tree.clone()));
    }

    pub fn on_mouse_move<H: StageHost>(&mut self, host: &mut H, target: &H::Element) {
        let Some(uid) = resolve_stage_uid(target) else {
            return;
        };
        if self.hovered.as_ref() == Some(&uid) {
            return;
        }
        trace!(%uid, "hover");
        self.hovered = Some(uid.clone());
        host.dispatch(StoreAction::SetHoveredNodeUid(Some(uid)));
    }

    pub fn on_mouse_leave<H: StageHost>(&mut self, host: &mut H) {
        self.hovered = None;
        host.dispatch(StoreAction::SetHoveredNodeUid(None));
    }

    pub fn on_click<H: StageHost>(
        &mut self,
        host: &mut H,
        target: &H::Element,
        modifiers: PointerModifiers,
        now: Instant,
    ) {
        let resolved = resolve_stage_uid(target);

        if !self.parse_file {
            self.switch_to_renderable_file(host, resolved, modifiers, now);
        } else if let Some(uid) = resolved {
            self.last_clicked = Some(uid.clone());

            let inside_edit = self.editing.as_ref().is_some_and(|editing| {
                *editing == uid || self.tree.is_descendant_of(&uid, editing)
            });
            if !inside_edit {
                if let Err(err) = self.flush_edit_session(host) {
                    warn!(error = %err, %uid, "edit flush failed, click ignored");
                    return;
                }
                self.select(host, uid, modifiers);
            }
        }

        host.dispatch(StoreAction::SetActivePanel(Panel::Stage));
    }

    pub fn on_dbl_click<H: StageHost>(&mut self, host: &mut H, target: &H::Element, now: Instant) {
        let Some((uid, element)) = resolve_stage_element(target) else {
            self.open_last_clicked_sub_document(host);
            return;
        };
        let Some(node) = self.tree.get(&uid) else {
            trace!(%uid, "double click on a node outside the tree");
            return;
        };

        let tag = node.data.tag_name();
        if self.config.is_whole_tag(tag) {
            trace!(%uid, tag, "whole tag, not editable");
            return;
        }
        if !self.tree.has_text_child(&uid) {
            return;
        }
        if self
            .tree
            .any_descendant(&uid, |n| self.config.is_web_component(n.data.tag_name()))
        {
            trace!(%uid, "contains a web component, not editable");
            return;
        }
        if !node.data.source_location().is_some_and(|loc| loc.has_tag_pair()) {
            return;
        }
        if self.editing.as_ref() == Some(&uid) {
            return;
        }

        if let Err(err) = self.flush_edit_session(host) {
            warn!(error = %err, %uid, "edit flush failed, not entering edit mode");
            return;
        }

        element.set_content_editable(true);
        element.focus();
        self.editing = Some(uid.clone());
        host.dispatch(StoreAction::SetContentEditableUid(Some(uid.clone())));
        // Selecting has to wait for the editable flag to reach the surface.
        self.tasks.schedule(
            TaskKey::SelectAll,
            DeferredTask::SelectAllText(uid.clone()),
            self.config.select_all_delay(),
            now,
        );
        debug!(%uid, "content editable");
    }

    /// Focus the node a code editor selection falls in.
    ///
    /// Returns the resolved uid, `None` if the selection doesn't pick one.
    pub fn on_code_selection<H: StageHost>(
        &mut self,
        host: &mut H,
        selection: &CodeSelection,
    ) -> Option<NodeUid> {
        let uid = resolve_uid_for_selection(selection, &self.tree, &self.valid_tree)?;
        if self.focused.as_ref() != Some(&uid) {
            self.commit_selection(host, uid.clone(), vec![uid.clone()]);
        }
        Some(uid)
    }

    /// A dragged tree item hovers `uid`; expand it if the hover lasts.
    ///
    /// Hovering another item restarts the wait for that one. Leaves and
    /// nodes already expanded cancel it.
    pub fn on_tree_item_drag_over<H: StageHost>(&mut self, host: &H, uid: &str, now: Instant) {
        let Some(node) = self.valid_tree.get(uid) else {
            return;
        };
        if node.children.is_empty() || host.state().tree_view.expanded.contains(uid) {
            self.tasks.cancel(&TaskKey::AutoExpand);
            return;
        }
        self.tasks.schedule(
            TaskKey::AutoExpand,
            DeferredTask::ExpandNode(node.uid.clone()),
            self.config.auto_expand_delay(),
            now,
        );
    }

    /// A click on `uid` in the workspace file tree.
    ///
    /// With autosave on, the current file's unsaved edits are saved first.
    /// The tree's focus and selection then follow the click, and the file
    /// opens in the code view unless the save failed.
    pub fn on_file_click<H: StageHost, W: WorkspaceFiles>(
        &mut self,
        host: &mut H,
        files: &W,
        uid: &str,
        modifiers: PointerModifiers,
    ) {
        let Some(file) = files.file(uid) else {
            trace!(uid, "click on a file outside the workspace");
            return;
        };

        let current = host
            .state()
            .current_file_uid
            .as_deref()
            .and_then(|current| files.file(current));
        let saved = match current {
            Some(current) if self.config.auto_save && has_unsaved_changes(Some(current)) => {
                debug!(file = %current.uid, "autosave");
                host.save_file(&current.uid)
            }
            _ => Ok(()),
        };

        let view = &host.state().file_tree_view;
        let anchor = view.focused.clone();
        let expanded = view.expanded.contains(uid);
        let mut selected: Vec<NodeUid> = view.selected.iter().cloned().collect();

        if anchor.as_deref() != Some(uid) {
            host.dispatch(StoreAction::FocusFileTreeNode(file.uid.clone()));
        }
        if modifiers.shift {
            let range = anchor
                .map(|anchor| files.range(&anchor, uid))
                .filter(|range| !range.is_empty())
                .unwrap_or_else(|| vec![file.uid.clone()]);
            host.dispatch(StoreAction::SelectFileTreeNodes(range));
        } else if modifiers.precise() {
            match selected.iter().position(|s| s == uid) {
                Some(index) => {
                    selected.remove(index);
                }
                None => selected.push(file.uid.clone()),
            }
            host.dispatch(StoreAction::SelectFileTreeNodes(selected));
        } else {
            host.dispatch(StoreAction::SelectFileTreeNodes(vec![file.uid.clone()]));
            if file.is_folder {
                let uids = vec![file.uid.clone()];
                host.dispatch(if expanded {
                    StoreAction::CollapseFileTreeNodes(uids)
                } else {
                    StoreAction::ExpandFileTreeNodes(uids)
                });
            }
        }
        host.dispatch(StoreAction::SetActivePanel(Panel::FileTree));

        if let Err(err) = saved {
            warn!(error = %err, file = uid, "autosave failed, file not opened");
            return;
        }
        if !file.is_folder {
            let renderable = files.renderable_file_uid() == Some(&file.uid);
            self.open_file(host, file, renderable);
        }
    }

    pub fn on_tree_drag_end(&mut self) {
        self.tasks.cancel(&TaskKey::AutoExpand);
    }

    /// Run every deferred task due at `now`.
    pub fn run_due_tasks<H: StageHost>(&mut self, host: &mut H, now: Instant) {
        for task in self.tasks.take_due(now) {
            trace!(?task, "deferred task");
            match task {
                DeferredTask::SelectAllText(uid) => {
                    if self.editing.as_ref() != Some(&uid) {
                        continue;
                    }
                    if let Some(element) = host.element_by_uid(&uid) {
                        element.select_all_text();
                    }
                }
                DeferredTask::ExpandNode(uid) => {
                    if self.tree.contains(&uid) {
                        host.dispatch(StoreAction::ExpandNodeTreeNodes(vec![uid]));
                    }
                }
                DeferredTask::SelectNode(uid) => {
                    if self.tree.contains(&uid) {
                        self.commit_selection(host, uid.clone(), vec![uid]);
                    }
                }
            }
        }
    }

    fn normalize(&self, uid: NodeUid, modifiers: PointerModifiers) -> NodeUid {
        if modifiers.precise() {
            return uid;
        }
        self.tree.body_level_uid(&uid).unwrap_or(uid)
    }

    fn select<H: StageHost>(&mut self, host: &mut H, uid: NodeUid, modifiers: PointerModifiers) {
        let target = self.normalize(uid, modifiers);

        if modifiers.shift {
            let mut next = self.selected.clone();
            match next.iter().position(|u| *u == target) {
                Some(index) => {
                    next.remove(index);
                }
                None => next.push(target.clone()),
            }
            let next = valid_uids(&self.tree, &next);
            self.commit_selection(host, target, next);
        } else if self.focused.as_ref() != Some(&target) || self.selected != [target.clone()] {
            self.commit_selection(host, target.clone(), vec![target]);
        }
    }

    fn commit_selection<H: StageHost>(
        &mut self,
        host: &mut H,
        focus: NodeUid,
        selected: Vec<NodeUid>,
    ) {
        debug!(%focus, count = selected.len(), "selection");
        self.focused = Some(focus.clone());
        self.selected = selected.clone();
        host.dispatch(StoreAction::FocusNodeTreeNode(focus));
        host.dispatch(StoreAction::SelectNodeTreeNodes(selected.clone()));
        host.dispatch(StoreAction::SetSelectedNodeUids(selected));
    }

    /// Write the edited element's markup back into the source and end the
    /// edit session. A no-op when nothing is being edited.
    ///
    /// On error nothing has changed: the session stays open and the source
    /// is untouched.
    fn flush_edit_session<H: StageHost>(&mut self, host: &mut H) -> Result<(), StageError> {
        let Some(uid) = self.editing.clone() else {
            return Ok(());
        };
        let node = self
            .tree
            .get(&uid)
            .ok_or_else(|| StageError::NodeNotFound(uid.clone()))?;
        let (start_tag, end_tag) = node
            .data
            .source_location()
            .and_then(|loc| loc.start_tag.zip(loc.end_tag))
            .ok_or_else(|| StageError::MissingTagLocation(uid.clone()))?;
        let element = host
            .element_by_uid(&uid)
            .ok_or_else(|| StageError::ElementNotFound(uid.clone()))?;

        let markup = strip_reserved_attributes(&element.inner_html());
        let model = host.code_model().ok_or(StageError::CodeModelUnavailable)?;
        model.replace_range(CodeRange::between_tags(&start_tag, &end_tag), &markup)?;

        element.set_content_editable(false);
        self.editing = None;
        self.tasks.cancel(&TaskKey::SelectAll);
        host.dispatch(StoreAction::SetContentEditableUid(None));
        debug!(%uid, bytes = markup.len(), "edit flushed");
        Ok(())
    }

    /// The click landed while another file is open in the code view: bring
    /// the rendered file back and select the node once it has loaded.
    fn switch_to_renderable_file<H: StageHost>(
        &mut self,
        host: &mut H,
        resolved: Option<NodeUid>,
        modifiers: PointerModifiers,
        now: Instant,
    ) {
        let Some(file) = host.renderable_file().cloned() else {
            warn!("no renderable file to switch back to");
            return;
        };
        debug!(file = %file.uid, "switching back to the rendered file");
        host.dispatch(StoreAction::FocusFileTreeNode(file.uid.clone()));
        host.dispatch(StoreAction::SelectFileTreeNodes(vec![file.uid.clone()]));
        self.open_file(host, &file, true);

        if let Some(uid) = resolved {
            let target = self.normalize(uid, modifiers);
            self.tasks.schedule(
                TaskKey::Reselect,
                DeferredTask::SelectNode(target),
                self.config.reselect_after_switch(),
                now,
            );
        }
    }

    /// Load `file` into the code view. Nothing is dispatched when it is
    /// already the current file.
    fn open_file<H: StageHost>(&mut self, host: &mut H, file: &FileNode, renderable: bool) {
        self.parse_file = renderable;
        if host.state().current_file_uid.as_ref() == Some(&file.uid) {
            return;
        }
        debug!(file = %file.uid, renderable, "open file");
        let language = language_from_extension(file.extension()).to_string();
        host.dispatch(StoreAction::SetCurrentFileUid(file.uid.clone()));
        host.dispatch(StoreAction::SetCurrentFileContent(file.content_in_app.clone()));
        host.dispatch(StoreAction::SetCurrentFileLanguage(language));
    }

    fn open_last_clicked_sub_document<H: StageHost>(&mut self, host: &mut H) {
        let Some(uid) = &self.last_clicked else {
            return;
        };
        let Some(node) = self.tree.get(uid) else {
            return;
        };
        let tag = node.data.tag_name();
        if self.config.is_web_component(tag) {
            debug!(%uid, tag, "opening web component");
            host.open_sub_document(uid, tag);
        }
    }
}

/// Delay helper for hosts converting a deadline into a timer.
pub fn delay_until(deadline: Instant, now: Instant) -> Duration {
    deadline.saturating_duration_since(now)
}
