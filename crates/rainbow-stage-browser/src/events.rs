//! Extraction of stage-relevant data from DOM events.

use rainbow_stage_core::PointerModifiers;
use wasm_bindgen::JsCast;

use crate::element::DomElement;

/// Modifier keys held during `event`.
pub fn pointer_modifiers(event: &web_sys::MouseEvent) -> PointerModifiers {
    PointerModifiers {
        shift: event.shift_key(),
        ctrl: event.ctrl_key(),
        meta: event.meta_key(),
        alt: event.alt_key(),
    }
}

/// The element an event landed on.
///
/// A text node target resolves to its parent element.
pub fn event_target_element(event: &web_sys::Event) -> Option<DomElement> {
    let target = event.target()?;
    match target.dyn_into::<web_sys::Element>() {
        Ok(element) => Some(DomElement(element)),
        Err(target) => target
            .dyn_into::<web_sys::Node>()
            .ok()?
            .parent_element()
            .map(DomElement),
    }
}
