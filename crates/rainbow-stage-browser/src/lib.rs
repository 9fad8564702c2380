//! Browser DOM layer for the rainbow stage.
//!
//! Wires DOM pointer events on the rendered stage document into a
//! `StageCoordinator`, and implements the host side of the core traits over
//! `web_sys`. It assumes a `wasm32-unknown-unknown` target environment.
//!
//! # Architecture
//!
//! - `element`: `StageElement` over `web_sys::Element`
//! - `events`: target and modifier extraction from DOM events
//! - `stage`: the browser `StageHost` and the event listener bindings
//! - `logging`: console tracing setup
//!
//! # Re-exports
//!
//! This crate re-exports `rainbow-stage-core` for convenience, so consumers
//! only need to depend on `rainbow-stage-browser`.

// Re-export core crate
pub use rainbow_stage_core;
pub use rainbow_stage_core::*;

pub mod element;
pub mod events;
pub mod logging;
pub mod stage;

pub use element::DomElement;
pub use events::{event_target_element, pointer_modifiers};
pub use logging::init_logging;
pub use stage::{BrowserHost, Stage, StageBindings};
