//! The browser host and the DOM event bindings for a rendered stage.
//!
//! [`StageBindings`] owns a [`Stage`] (coordinator plus [`BrowserHost`])
//! behind a `RefCell` and listens on the stage document. Deferred work is
//! driven by a single timeout, rearmed for the coordinator's next deadline
//! after every event.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use gloo_events::EventListener;
use gloo_timers::callback::Timeout;
use rainbow_stage_core::coordinator::delay_until;
use rainbow_stage_core::{
    CodeEditorModel, CodeSelection, FileNode, NodeTree, NodeUid, PlatformError, PointerModifiers,
    STAGE_NODE_ID_ATTR, StageCoordinator, StageHost, StageState, Store, StoreAction,
    WorkspaceFiles,
};
use wasm_bindgen::JsCast;
use web_time::Instant;

use crate::element::DomElement;
use crate::events::{event_target_element, pointer_modifiers};

type SubDocumentOpener = Box<dyn FnMut(&NodeUid, &str)>;
type FileSaver = Box<dyn FnMut(&NodeUid) -> Result<(), PlatformError>>;

/// `StageHost` over a rendered stage document.
pub struct BrowserHost<S, M> {
    document: web_sys::Document,
    store: S,
    code: Option<M>,
    renderable: Option<FileNode>,
    open_sub_document: Option<SubDocumentOpener>,
    save_file: Option<FileSaver>,
}

impl<S: Store, M: CodeEditorModel> BrowserHost<S, M> {
    pub fn new(document: web_sys::Document, store: S) -> Self {
        Self {
            document,
            store,
            code: None,
            renderable: None,
            open_sub_document: None,
            save_file: None,
        }
    }

    /// A host for the page's own document.
    pub fn for_window(store: S) -> Self {
        Self::new(gloo_utils::document(), store)
    }

    pub fn document(&self) -> &web_sys::Document {
        &self.document
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mount or unmount the code editor model.
    pub fn set_code_model(&mut self, model: Option<M>) {
        self.code = model;
    }

    pub fn code(&self) -> Option<&M> {
        self.code.as_ref()
    }

    pub fn set_renderable_file(&mut self, file: Option<FileNode>) {
        self.renderable = file;
    }

    pub fn on_open_sub_document(&mut self, opener: impl FnMut(&NodeUid, &str) + 'static) {
        self.open_sub_document = Some(Box::new(opener));
    }

    /// Install the callback that writes a file's edits to storage.
    pub fn on_save_file(
        &mut self,
        saver: impl FnMut(&NodeUid) -> Result<(), PlatformError> + 'static,
    ) {
        self.save_file = Some(Box::new(saver));
    }
}

impl<S: Store, M: CodeEditorModel> StageHost for BrowserHost<S, M> {
    type Element = DomElement;

    fn dispatch(&mut self, action: StoreAction) {
        self.store.dispatch(action);
    }

    fn state(&self) -> &StageState {
        self.store.state()
    }

    fn code_model(&mut self) -> Option<&mut dyn CodeEditorModel> {
        self.code.as_mut().map(|code| code as &mut dyn CodeEditorModel)
    }

    fn element_by_uid(&self, uid: &str) -> Option<DomElement> {
        let selector = format!("[{}=\"{}\"]", STAGE_NODE_ID_ATTR, uid);
        self.document
            .query_selector(&selector)
            .ok()
            .flatten()
            .map(DomElement)
    }

    fn open_sub_document(&mut self, uid: &NodeUid, tag_name: &str) {
        match self.open_sub_document.as_mut() {
            Some(open) => open(uid, tag_name),
            None => tracing::debug!(%uid, tag_name, "no sub-document opener installed"),
        }
    }

    fn renderable_file(&self) -> Option<&FileNode> {
        self.renderable.as_ref()
    }

    fn save_file(&mut self, uid: &NodeUid) -> Result<(), PlatformError> {
        match self.save_file.as_mut() {
            Some(save) => save(uid),
            None => Err(PlatformError::Unavailable("file saver")),
        }
    }
}

/// Coordinator and host, borrowed together by every event.
pub struct Stage<S, M> {
    pub coordinator: StageCoordinator,
    pub host: BrowserHost<S, M>,
}

struct Shared<S, M> {
    stage: RefCell<Stage<S, M>>,
    timer: RefCell<Option<Timeout>>,
}

impl<S: Store + 'static, M: CodeEditorModel + 'static> Shared<S, M> {
    /// Run `f` on the stage. Events arriving while it is already borrowed
    /// (a store subscriber reacting synchronously) are dropped.
    fn with_stage<R>(&self, f: impl FnOnce(&mut Stage<S, M>) -> R) -> Option<R> {
        match self.stage.try_borrow_mut() {
            Ok(mut stage) => Some(f(&mut stage)),
            Err(_) => {
                tracing::warn!("stage busy, event dropped");
                None
            }
        }
    }
}

/// Arm the timeout for the coordinator's next deadline, replacing any
/// timeout already armed.
fn arm_timer<S: Store + 'static, M: CodeEditorModel + 'static>(shared: &Rc<Shared<S, M>>) {
    let Some(deadline) = shared
        .stage
        .try_borrow()
        .ok()
        .and_then(|stage| stage.coordinator.next_deadline())
    else {
        shared.timer.replace(None);
        return;
    };

    let delay = delay_until(deadline, Instant::now());
    let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
    let weak: Weak<Shared<S, M>> = Rc::downgrade(shared);
    let timeout = Timeout::new(millis, move || {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        // The running timeout can't be dropped from inside its own callback.
        if let Some(running) = shared.timer.borrow_mut().take() {
            let _ = running.forget();
        }
        shared.with_stage(|stage| {
            stage
                .coordinator
                .run_due_tasks(&mut stage.host, Instant::now())
        });
        arm_timer(&shared);
    });
    shared.timer.replace(Some(timeout));
}

/// DOM listeners driving a [`Stage`]. Dropping the bindings detaches them.
pub struct StageBindings<S: Store + 'static, M: CodeEditorModel + 'static> {
    shared: Rc<Shared<S, M>>,
    _listeners: Vec<EventListener>,
}

impl<S: Store + 'static, M: CodeEditorModel + 'static> StageBindings<S, M> {
    /// Listen for pointer events on the host's document.
    pub fn attach(coordinator: StageCoordinator, host: BrowserHost<S, M>) -> Self {
        let document = host.document.clone();
        let shared = Rc::new(Shared {
            stage: RefCell::new(Stage { coordinator, host }),
            timer: RefCell::new(None),
        });

        let mut listeners = Vec::with_capacity(4);

        let s = shared.clone();
        listeners.push(EventListener::new(&document, "mousemove", move |event| {
            let Some(target) = event_target_element(event) else {
                return;
            };
            s.with_stage(|stage| stage.coordinator.on_mouse_move(&mut stage.host, &target));
        }));

        let s = shared.clone();
        listeners.push(EventListener::new(&document, "click", move |event| {
            let Some(mouse) = event.dyn_ref::<web_sys::MouseEvent>() else {
                return;
            };
            let Some(target) = event_target_element(event) else {
                return;
            };
            let modifiers = pointer_modifiers(mouse);
            s.with_stage(|stage| {
                stage
                    .coordinator
                    .on_click(&mut stage.host, &target, modifiers, Instant::now())
            });
            arm_timer(&s);
        }));

        let s = shared.clone();
        listeners.push(EventListener::new(&document, "dblclick", move |event| {
            let Some(target) = event_target_element(event) else {
                return;
            };
            s.with_stage(|stage| {
                stage
                    .coordinator
                    .on_dbl_click(&mut stage.host, &target, Instant::now())
            });
            arm_timer(&s);
        }));

        if let Some(root) = document.document_element() {
            let s = shared.clone();
            listeners.push(EventListener::new(&root, "mouseleave", move |_| {
                s.with_stage(|stage| stage.coordinator.on_mouse_leave(&mut stage.host));
            }));
        }

        tracing::debug!(listeners = listeners.len(), "stage bindings attached");
        Self {
            shared,
            _listeners: listeners,
        }
    }

    /// Run `f` on the stage, then rearm the timer for whatever it scheduled.
    pub fn with_stage<R>(&self, f: impl FnOnce(&mut Stage<S, M>) -> R) -> Option<R> {
        let out = self.shared.with_stage(f);
        arm_timer(&self.shared);
        out
    }

    pub fn set_tree(&self, tree: NodeTree) {
        self.with_stage(|stage| stage.coordinator.set_tree(&mut stage.host, tree));
    }

    pub fn set_parse_file(&self, parse_file: bool) {
        self.with_stage(|stage| stage.coordinator.set_parse_file(parse_file));
    }

    /// The code editor selection moved.
    pub fn code_selection_changed(&self, selection: CodeSelection) -> Option<NodeUid> {
        self.with_stage(|stage| {
            stage
                .coordinator
                .on_code_selection(&mut stage.host, &selection)
        })
        .flatten()
    }

    pub fn tree_item_drag_over(&self, uid: &str) {
        self.with_stage(|stage| {
            stage
                .coordinator
                .on_tree_item_drag_over(&stage.host, uid, Instant::now())
        });
    }

    /// A workspace file tree item was clicked.
    pub fn file_clicked<W: WorkspaceFiles>(
        &self,
        files: &W,
        uid: &str,
        modifiers: PointerModifiers,
    ) {
        self.with_stage(|stage| {
            stage
                .coordinator
                .on_file_click(&mut stage.host, files, uid, modifiers)
        });
    }

    pub fn tree_drag_end(&self) {
        self.with_stage(|stage| stage.coordinator.on_tree_drag_end());
    }
}
