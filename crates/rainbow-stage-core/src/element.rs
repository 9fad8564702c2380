//! Recovering node uids from live rendered elements.
//!
//! The stage is an arbitrary DOM; a pointer event lands on whatever element
//! is under the cursor, which may be a deep descendant or something the
//! user's own scripts created. The owning node is the nearest
//! ancestor-or-self carrying [`STAGE_NODE_ID_ATTR`].

use crate::ids::STAGE_NODE_ID_ATTR;
use crate::types::NodeUid;

/// What the coordinator needs from a rendered element.
///
/// Implemented for `web_sys::Element` in the browser crate and by mocks in
/// tests.
pub trait StageElement: Sized {
    fn attribute(&self, name: &str) -> Option<String>;

    /// Parent element, `None` at the top of the document.
    fn parent(&self) -> Option<Self>;

    fn tag_name(&self) -> String;

    fn set_content_editable(&self, editable: bool);

    fn focus(&self);

    /// Select every character of the element's text.
    fn select_all_text(&self);

    fn inner_html(&self) -> String;
}

/// Uid of the nearest identified ancestor-or-self of `element`.
pub fn resolve_stage_uid<E: StageElement + Clone>(element: &E) -> Option<NodeUid> {
    resolve_stage_element(element).map(|(uid, _)| uid)
}

/// Like [`resolve_stage_uid`], also returning the element that carries the id.
pub fn resolve_stage_element<E: StageElement + Clone>(element: &E) -> Option<(NodeUid, E)> {
    let mut current = element.clone();
    let mut depth = 0usize;
    loop {
        if let Some(uid) = current.attribute(STAGE_NODE_ID_ATTR) {
            tracing::trace!(%uid, depth, "resolved stage element");
            return Some((uid.into(), current));
        }
        current = current.parent()?;
        depth += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockElement;

    #[test]
    fn test_element_with_id_resolves_to_itself() {
        let el = MockElement::new("div").with_attr(STAGE_NODE_ID_ATTR, "7");
        assert_eq!(resolve_stage_uid(&el).as_deref(), Some("7"));
    }

    #[test]
    fn test_walks_up_to_nearest_identified_ancestor() {
        let outer = MockElement::new("section").with_attr(STAGE_NODE_ID_ATTR, "2");
        let inner = MockElement::new("div").with_attr(STAGE_NODE_ID_ATTR, "5");
        inner.set_parent(&outer);
        let span = MockElement::new("span");
        span.set_parent(&inner);
        let leaf = MockElement::new("i");
        leaf.set_parent(&span);

        let (uid, owner) = resolve_stage_element(&leaf).unwrap();
        assert_eq!(uid, "5");
        assert_eq!(owner.tag_name(), "div");
    }

    #[test]
    fn test_no_identified_ancestor() {
        let root = MockElement::new("html");
        let child = MockElement::new("div");
        child.set_parent(&root);
        assert_eq!(resolve_stage_uid(&child), None);
    }

    #[test]
    fn test_resolution_has_no_side_effects() {
        let el = MockElement::new("p").with_attr(STAGE_NODE_ID_ATTR, "3");
        let before = el.snapshot();
        resolve_stage_uid(&el);
        assert_eq!(el.snapshot(), before);
    }
}
