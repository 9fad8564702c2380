//! Stage identifier attributes.
//!
//! Every rendered element carries its node uid in [`STAGE_NODE_ID_ATTR`],
//! which is how pointer events on the stage find their way back to the
//! tree. Both reserved attributes are hidden from users and stripped before
//! markup goes back into the source.

use crate::html::tokenizer::{TokenKind, Tokenizer};
use crate::types::Attribs;

/// Attribute carrying the owning node uid on rendered elements.
pub const STAGE_NODE_ID_ATTR: &str = "data-rnbw-stage-node-id";

/// Attribute reserved for ordering rendered siblings.
pub const STAGE_NODE_SEQUENCE_ATTR: &str = "data-rnbw-stage-node-sequence";

pub fn is_reserved_attribute(name: &str) -> bool {
    name.eq_ignore_ascii_case(STAGE_NODE_ID_ATTR)
        || name.eq_ignore_ascii_case(STAGE_NODE_SEQUENCE_ATTR)
}

/// The attributes a user can see and edit.
pub fn editable_attributes(attribs: &Attribs) -> impl Iterator<Item = (&str, &str)> {
    attribs.iter().filter(|(name, _)| !is_reserved_attribute(name))
}

/// Remove reserved attributes from `markup`, leaving every other byte as is.
///
/// Whitespace directly before a removed attribute goes with it, so
/// `<p data-rnbw-stage-node-id="3" class="a">` becomes `<p class="a">`.
pub fn strip_reserved_attributes(markup: &str) -> String {
    let mut cuts: Vec<std::ops::Range<usize>> = Vec::new();
    for token in Tokenizer::new(markup) {
        let TokenKind::StartTag(tag) = token.kind else {
            continue;
        };
        let reserved = tag
            .attrs
            .iter()
            .chain(&tag.duplicates)
            .filter(|a| is_reserved_attribute(&a.name));
        for attr in reserved {
            let lead = markup[..attr.span.start]
                .bytes()
                .rev()
                .take_while(u8::is_ascii_whitespace)
                .count();
            cuts.push(attr.span.start - lead..attr.span.end);
        }
    }
    if cuts.is_empty() {
        return markup.to_string();
    }
    cuts.sort_by_key(|cut| cut.start);

    let mut out = String::with_capacity(markup.len());
    let mut last = 0;
    for cut in cuts {
        out.push_str(&markup[last..cut.start]);
        last = cut.end;
    }
    out.push_str(&markup[last..]);
    out
}
