//! Markup serialization of a parse [`Document`].

use crate::html::builder::VOID_ELEMENTS;
use crate::html::dom::{Document, DomNodeId, DomNodeKind};
use crate::ids::is_reserved_attribute;

/// Elements whose text children are written without escaping.
const RAW_TEXT_PARENTS: &[&str] = &[
    "style", "script", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Write the stage identifier attributes. Off for export.
    pub stage_ids: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self { stage_ids: true }
    }
}

/// Serialize the children of the document root.
pub fn serialize(doc: &Document, options: SerializeOptions) -> String {
    let mut out = String::new();
    for child in doc.children(doc.root()) {
        write_node(doc, *child, options, &mut out);
    }
    out
}

/// Serialize the children of one node (its "inner HTML").
pub fn serialize_children(doc: &Document, id: DomNodeId, options: SerializeOptions) -> String {
    let mut out = String::new();
    for child in doc.children(id) {
        write_node(doc, *child, options, &mut out);
    }
    out
}

fn write_node(doc: &Document, id: DomNodeId, options: SerializeOptions, out: &mut String) {
    let node = doc.node(id);
    match &node.kind {
        DomNodeKind::Document => {
            for child in &node.children {
                write_node(doc, *child, options, out);
            }
        }
        DomNodeKind::Doctype { name } => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            out.push('>');
        }
        DomNodeKind::Element { name, attrs } => {
            out.push('<');
            out.push_str(name);
            for (attr, value) in attrs.iter() {
                if !options.stage_ids && is_reserved_attribute(attr) {
                    continue;
                }
                out.push(' ');
                out.push_str(attr);
                out.push_str("=\"");
                escape_into(value, true, out);
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&name.as_str()) {
                return;
            }
            for child in &node.children {
                write_node(doc, *child, options, out);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        DomNodeKind::Text(text) => {
            let raw = node
                .parent
                .and_then(|parent| doc.element_name(parent))
                .is_some_and(|parent| RAW_TEXT_PARENTS.contains(&parent));
            if raw {
                out.push_str(text);
            } else {
                escape_into(text, false, out);
            }
        }
        DomNodeKind::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::builder::TreeBuilder;

    fn roundtrip(input: &str, stage_ids: bool) -> String {
        let (doc, _) = TreeBuilder::new(input).build();
        serialize(&doc, SerializeOptions { stage_ids })
    }

    #[test]
    fn test_implicit_structure_is_written() {
        assert_eq!(
            roundtrip("<p>hi", true),
            "<html><head></head><body><p>hi</p></body></html>"
        );
    }

    #[test]
    fn test_escaping() {
        let anchor = r#"<a title="say &quot;hi&quot; &amp; go">1 &lt; 2&nbsp;</a>"#;
        assert_eq!(
            roundtrip(&format!("<!DOCTYPE html>{anchor}"), true),
            format!("<!DOCTYPE html><html><head></head><body>{anchor}</body></html>")
        );
    }

    #[test]
    fn test_raw_text_not_escaped() {
        let out = roundtrip("<script>if (a < b && c) {}</script>", true);
        assert!(out.contains("<script>if (a < b && c) {}</script>"));
    }

    #[test]
    fn test_void_elements_have_no_end_tag() {
        let out = roundtrip("<p>a<br>b<img src=x></p>", true);
        assert!(out.contains(r#"<p>a<br>b<img src="x"></p>"#));
    }

    #[test]
    fn test_stage_ids_omitted_on_export() {
        let input = r#"<div data-rnbw-stage-node-id="4" class="c">x</div>"#;
        let kept = roundtrip(input, true);
        let stripped = roundtrip(input, false);
        assert!(kept.contains(r#"<div data-rnbw-stage-node-id="4" class="c">"#));
        assert!(stripped.contains(r#"<div class="c">"#));
    }
}
