//! Error and diagnostic types for the stage core.

use miette::{Diagnostic, SourceSpan};
use smol_str::SmolStr;

use crate::platform::PlatformError;
use crate::types::{NodeUid, Position};

/// A recovered parse problem.
///
/// The parser never fails; these are collected alongside the tree so callers
/// can tell a clean parse from a recovered one.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
#[error("{kind} at {line}:{col}")]
#[diagnostic(code(rainbow::parse))]
pub struct ParseDiagnostic {
    pub kind: ParseErrorKind,
    #[label("here")]
    pub span: SourceSpan,
    pub line: usize,
    pub col: usize,
}

impl ParseDiagnostic {
    pub fn new(kind: ParseErrorKind, at: Position, len: usize) -> Self {
        Self {
            kind,
            span: SourceSpan::new(at.offset.into(), len),
            line: at.line,
            col: at.col,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseErrorKind {
    #[error("unexpected end of input inside a tag")]
    EofInTag,
    #[error("unexpected end of input inside a comment")]
    EofInComment,
    #[error("unexpected end of input inside <{0}>")]
    EofInRawText(SmolStr),
    #[error("end tag without a name")]
    MissingEndTagName,
    #[error("bogus comment")]
    BogusComment,
    #[error("doctype in an unexpected place")]
    MisplacedDoctype,
    #[error("duplicate attribute `{0}`")]
    DuplicateAttribute(SmolStr),
    #[error("self-closing syntax on non-void element <{0}>")]
    NonVoidSelfClosing(SmolStr),
    #[error("start tag <{0}> in an unexpected place")]
    MisplacedStartTag(SmolStr),
    #[error("end tag </{0}> does not match any open element")]
    UnexpectedEndTag(SmolStr),
    #[error("element <{0}> was not closed")]
    UnclosedElement(SmolStr),
    #[error("content after the end of the body")]
    ContentAfterBody,
}

/// Failures of stage operations that talk to the host.
///
/// The coordinator logs these and aborts the transition that raised them,
/// leaving its state as it was.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum StageError {
    #[error("code editor model is not available")]
    #[diagnostic(
        code(rainbow::stage::code_model),
        help("content-editable edits are flushed through the code editor model")
    )]
    CodeModelUnavailable,

    #[error("node {0} is not in the current tree")]
    #[diagnostic(code(rainbow::stage::node_not_found))]
    NodeNotFound(NodeUid),

    #[error("node {0} has no start/end tag location")]
    #[diagnostic(code(rainbow::stage::tag_location))]
    MissingTagLocation(NodeUid),

    #[error("no rendered element for node {0}")]
    #[diagnostic(code(rainbow::stage::element_not_found))]
    ElementNotFound(NodeUid),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Configuration loading errors.
#[derive(thiserror::Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid stage configuration: {0}")]
    #[diagnostic(code(rainbow::config))]
    Json(#[from] serde_json::Error),
}
