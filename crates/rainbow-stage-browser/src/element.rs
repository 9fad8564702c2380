//! `StageElement` for live DOM elements.

use rainbow_stage_core::{PlatformError, StageElement};
use wasm_bindgen::JsValue;

/// A rendered stage element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomElement(pub web_sys::Element);

impl From<web_sys::Element> for DomElement {
    fn from(element: web_sys::Element) -> Self {
        DomElement(element)
    }
}

impl StageElement for DomElement {
    fn attribute(&self, name: &str) -> Option<String> {
        self.0.get_attribute(name)
    }

    fn parent(&self) -> Option<Self> {
        self.0.parent_element().map(DomElement)
    }

    fn tag_name(&self) -> String {
        // HTML elements report upper case.
        self.0.tag_name().to_ascii_lowercase()
    }

    fn set_content_editable(&self, editable: bool) {
        let result = if editable {
            self.0.set_attribute("contenteditable", "true")
        } else {
            self.0.remove_attribute("contenteditable")
        };
        if let Err(e) = result {
            tracing::warn!(error = ?e, editable, "contenteditable toggle failed");
        }
    }

    fn focus(&self) {
        use wasm_bindgen::JsCast;

        let Some(html) = self.0.dyn_ref::<web_sys::HtmlElement>() else {
            return;
        };
        if let Err(e) = html.focus() {
            tracing::warn!(error = ?e, "focus failed");
        }
    }

    fn select_all_text(&self) {
        if let Err(e) = select_contents(&self.0) {
            tracing::warn!(error = %e, "select all failed");
        }
    }

    fn inner_html(&self) -> String {
        self.0.inner_html()
    }
}

/// Replace the document selection with the contents of `element`.
fn select_contents(element: &web_sys::Element) -> Result<(), PlatformError> {
    let document = element
        .owner_document()
        .ok_or(PlatformError::Unavailable("owner document"))?;
    let window = document
        .default_view()
        .ok_or(PlatformError::Unavailable("window"))?;

    let selection = window
        .get_selection()
        .map_err(dom_error("get_selection"))?
        .ok_or(PlatformError::Unavailable("selection"))?;
    let range = document.create_range().map_err(dom_error("create_range"))?;
    range
        .select_node_contents(element)
        .map_err(dom_error("select_node_contents"))?;

    selection
        .remove_all_ranges()
        .map_err(dom_error("remove_all_ranges"))?;
    selection.add_range(&range).map_err(dom_error("add_range"))?;
    Ok(())
}

fn dom_error(operation: &'static str) -> impl FnOnce(JsValue) -> PlatformError {
    move |e| PlatformError::Dom {
        operation,
        message: format!("{:?}", e),
    }
}
