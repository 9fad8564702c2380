//! Host abstraction traits for stage operations.
//!
//! These traits define the interface between the stage logic and whatever
//! hosts it (the browser DOM, a native webview, tests). The coordinator never
//! reaches into ambient globals; everything it reads or mutates outside its
//! own state goes through a `StageHost`.

use crate::code_selection::CodeRange;
use crate::element::StageElement;
use crate::store::{StageState, StoreAction};
use crate::types::NodeUid;
use crate::workspace::FileNode;

/// Errors raised by host-side operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlatformError {
    /// A 1-based line/column that does not exist in the text.
    #[error("position {line}:{col} is outside the text")]
    OutsideText { line: usize, col: usize },

    #[error("range ends before it starts")]
    ReversedRange,

    /// Something the host was asked to use is not installed or reachable.
    #[error("{0} is not available")]
    Unavailable(&'static str),

    /// A DOM call threw.
    #[error("{operation} failed: {message}")]
    Dom {
        operation: &'static str,
        message: String,
    },
}

/// The code editor's text model.
///
/// Treated as a black box keyed by line/column; see `SourceText` for a
/// ropey-backed implementation.
pub trait CodeEditorModel {
    /// Current full text.
    fn text(&self) -> String;

    /// Replace the text inside `range` (1-based, end exclusive).
    fn replace_range(&mut self, range: CodeRange, text: &str) -> Result<(), PlatformError>;
}

/// Everything the coordinator needs from its surroundings.
pub trait StageHost {
    /// Live rendered element type.
    type Element: StageElement + Clone;

    /// Send an update to the external store.
    fn dispatch(&mut self, action: StoreAction);

    /// The store's state after every action dispatched so far.
    fn state(&self) -> &StageState;

    /// The code editor model, if one is mounted.
    fn code_model(&mut self) -> Option<&mut dyn CodeEditorModel>;

    /// Find the rendered element carrying `uid`.
    fn element_by_uid(&self, uid: &str) -> Option<Self::Element>;

    /// Open an embedded sub-document (web component) for editing.
    fn open_sub_document(&mut self, uid: &NodeUid, tag_name: &str);

    /// The file whose parsed tree is rendered on the stage.
    fn renderable_file(&self) -> Option<&FileNode>;

    /// Persist the unsaved edits of file `uid`.
    fn save_file(&mut self, uid: &NodeUid) -> Result<(), PlatformError>;
}
