//! Test doubles for the host side of the stage.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::element::StageElement;
use crate::html::ParseOutput;
use crate::html::dom::{DomNodeId, DomNodeKind};
use crate::html::serialize::{SerializeOptions, serialize_children};
use crate::ids::STAGE_NODE_ID_ATTR;
use crate::platform::{CodeEditorModel, PlatformError, StageHost};
use crate::store::{MemoryStore, StageState, Store, StoreAction};
use crate::text::SourceText;
use crate::types::NodeUid;
use crate::workspace::FileNode;

/// Observable state of a [`MockElement`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MockState {
    pub tag_name: String,
    pub attrs: Vec<(String, String)>,
    pub editable: bool,
    pub focus_count: usize,
    pub select_all_count: usize,
    pub inner_html: String,
}

#[derive(Debug, Default)]
struct MockNode {
    state: RefCell<MockState>,
    parent: RefCell<Option<MockElement>>,
}

/// A shared-handle element, like a DOM reference.
#[derive(Clone, Debug, Default)]
pub struct MockElement(Rc<MockNode>);

impl MockElement {
    pub fn new(tag_name: &str) -> Self {
        let el = MockElement::default();
        el.0.state.borrow_mut().tag_name = tag_name.to_string();
        el
    }

    pub fn with_attr(self, name: &str, value: &str) -> Self {
        self.0
            .state
            .borrow_mut()
            .attrs
            .push((name.to_string(), value.to_string()));
        self
    }

    pub fn set_parent(&self, parent: &MockElement) {
        *self.0.parent.borrow_mut() = Some(parent.clone());
    }

    pub fn set_inner_html(&self, html: &str) {
        self.0.state.borrow_mut().inner_html = html.to_string();
    }

    pub fn snapshot(&self) -> MockState {
        self.0.state.borrow().clone()
    }

    pub fn is_editable(&self) -> bool {
        self.0.state.borrow().editable
    }
}

impl StageElement for MockElement {
    fn attribute(&self, name: &str) -> Option<String> {
        self.0
            .state
            .borrow()
            .attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn parent(&self) -> Option<Self> {
        self.0.parent.borrow().clone()
    }

    fn tag_name(&self) -> String {
        self.0.state.borrow().tag_name.clone()
    }

    fn set_content_editable(&self, editable: bool) {
        self.0.state.borrow_mut().editable = editable;
    }

    fn focus(&self) {
        self.0.state.borrow_mut().focus_count += 1;
    }

    fn select_all_text(&self) {
        self.0.state.borrow_mut().select_all_count += 1;
    }

    fn inner_html(&self) -> String {
        self.0.state.borrow().inner_html.clone()
    }
}

/// A stage rendered from a parse, with a store and a code model.
pub struct MockHost {
    pub store: MemoryStore,
    pub code: Option<SourceText>,
    pub elements: HashMap<NodeUid, MockElement>,
    pub opened: Vec<(NodeUid, String)>,
    pub renderable: Option<FileNode>,
    /// Uids passed to `save_file`, failed attempts included.
    pub saved: Vec<NodeUid>,
    pub fail_saves: bool,
}

impl MockHost {
    /// Mirror every element of `output.document` as a [`MockElement`].
    pub fn from_parse(source: &str, output: &ParseOutput) -> Self {
        let doc = &output.document;
        let mut elements = HashMap::new();
        let mut stack: Vec<(DomNodeId, Option<MockElement>)> = vec![(doc.root(), None)];
        while let Some((id, parent)) = stack.pop() {
            let mut next_parent = parent.clone();
            if let DomNodeKind::Element { name, attrs } = &doc.node(id).kind {
                let mut el = MockElement::new(name);
                for (attr, value) in attrs.iter() {
                    el = el.with_attr(attr, value);
                }
                el.set_inner_html(&serialize_children(doc, id, SerializeOptions::default()));
                if let Some(parent) = &parent {
                    el.set_parent(parent);
                }
                if let Some(uid) = attrs.get(STAGE_NODE_ID_ATTR) {
                    elements.insert(NodeUid::from(uid), el.clone());
                }
                next_parent = Some(el);
            }
            for child in doc.children(id) {
                stack.push((*child, next_parent.clone()));
            }
        }
        Self {
            store: MemoryStore::new(),
            code: Some(SourceText::new(source)),
            elements,
            opened: Vec::new(),
            renderable: None,
            saved: Vec::new(),
            fail_saves: false,
        }
    }

    pub fn element(&self, uid: &str) -> MockElement {
        self.elements[uid].clone()
    }

    pub fn actions(&self) -> &[StoreAction] {
        self.store.actions()
    }
}

impl StageHost for MockHost {
    type Element = MockElement;

    fn dispatch(&mut self, action: StoreAction) {
        self.store.dispatch(action);
    }

    fn state(&self) -> &StageState {
        self.store.state()
    }

    fn code_model(&mut self) -> Option<&mut dyn CodeEditorModel> {
        self.code.as_mut().map(|code| code as &mut dyn CodeEditorModel)
    }

    fn element_by_uid(&self, uid: &str) -> Option<MockElement> {
        self.elements.get(uid).cloned()
    }

    fn open_sub_document(&mut self, uid: &NodeUid, tag_name: &str) {
        self.opened.push((uid.clone(), tag_name.to_string()));
    }

    fn renderable_file(&self) -> Option<&FileNode> {
        self.renderable.as_ref()
    }

    fn save_file(&mut self, uid: &NodeUid) -> Result<(), PlatformError> {
        self.saved.push(uid.clone());
        if self.fail_saves {
            return Err(PlatformError::Unavailable("file system"));
        }
        Ok(())
    }
}
