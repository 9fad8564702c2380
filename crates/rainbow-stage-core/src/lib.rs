//! rainbow-stage-core: Pure Rust node-tree synchronization for the rainbow stage.
//!
//! This crate provides:
//! - `html::parse` - error-tolerant HTML parsing into a uid-addressed `NodeTree`
//! - `ids` - the stage identifier attributes injected into rendered markup
//! - `tree` - breadth-first and ancestry queries over a `NodeTree`
//! - `element` - recovering node uids from live rendered elements
//! - `code_selection` - mapping code editor selections onto tree nodes
//! - `StageCoordinator` - hover/selection/content-editable state for the stage
//! - `workspace` - the file listing the file tree click flow reads
//!
//! Everything is framework-agnostic; the browser layer lives in
//! `rainbow-stage-browser`.

pub mod code_selection;
pub mod config;
pub mod coordinator;
pub mod element;
pub mod error;
pub mod html;
pub mod ids;
pub mod platform;
pub mod schedule;
pub mod store;
pub mod text;
pub mod tree;
pub mod types;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

pub use code_selection::{CodeRange, CodeSelection, resolve_uid_for_selection};
pub use config::StageConfig;
pub use coordinator::{InteractionState, PointerModifiers, StageCoordinator};
pub use element::{StageElement, resolve_stage_element, resolve_stage_uid};
pub use error::{ConfigError, ParseDiagnostic, ParseErrorKind, StageError};
pub use html::{ParseConfig, ParseOutput, parse, parse_with};
pub use ids::{STAGE_NODE_ID_ATTR, STAGE_NODE_SEQUENCE_ATTR, is_reserved_attribute};
pub use platform::{CodeEditorModel, PlatformError, StageHost};
pub use schedule::Debouncer;
pub use smol_str::SmolStr;
pub use store::{MemoryStore, Panel, StageState, Store, StoreAction, TreeViewState};
pub use text::SourceText;
pub use tree::{NodeTree, subtree_uids_bfs, valid_uids};
pub use types::{
    Attribs, DoctypeData, ElementData, Node, NodeData, NodeUid, Position, ROOT_NODE_UID,
    SourceLocation, TagLocation, TextData,
};
pub use workspace::{
    FileNode, Workspace, WorkspaceFiles, has_unsaved_changes, language_from_extension,
};
