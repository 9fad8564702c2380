//! Parser tests: tree shape, uid allocation, locations, recovery.

use std::collections::HashSet;

use serde::Serialize;

use super::*;
use crate::error::ParseErrorKind;
use crate::types::SourceLocation;

/// Nested view of a tree for snapshots.
#[derive(Serialize)]
struct Shape {
    node: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<Shape>,
}

fn shape(tree: &NodeTree, uid: &str) -> Shape {
    let node = tree.get(uid).unwrap();
    let label = match &node.data {
        NodeData::Root => ROOT_NODE_UID.to_string(),
        NodeData::Element(el) => el.tag_name.to_string(),
        NodeData::Text(text) => format!("text({})", text.content),
        NodeData::Comment(text) => format!("comment({})", text.content),
        NodeData::Doctype(doctype) => format!("doctype({})", doctype.name),
    };
    Shape {
        node: label,
        children: node.children.iter().map(|child| shape(tree, child)).collect(),
    }
}

/// One line per node: depth-indented name and uid.
fn outline(tree: &NodeTree) -> String {
    fn walk(tree: &NodeTree, uid: &str, depth: usize, out: &mut String) {
        let node = tree.get(uid).unwrap();
        out.push_str(&"  ".repeat(depth));
        out.push_str(&node.display_name);
        if !node.is_root() {
            out.push(' ');
            out.push_str(&node.uid);
        }
        out.push('\n');
        for child in &node.children {
            walk(tree, child, depth + 1, out);
        }
    }
    let mut out = String::new();
    walk(tree, ROOT_NODE_UID, 0, &mut out);
    out
}

fn find(tree: &NodeTree, tag: &str) -> Node {
    tree.iter()
        .find(|node| node.data.tag_name() == tag)
        .cloned()
        .unwrap_or_else(|| panic!("no <{tag}> in tree"))
}

fn location(tree: &NodeTree, tag: &str) -> Option<SourceLocation> {
    find(tree, tag).data.source_location().copied()
}

fn kinds(output: &ParseOutput) -> Vec<ParseErrorKind> {
    output.diagnostics.iter().map(|d| d.kind.clone()).collect()
}

const MESSY: &[&str] = &[
    "",
    "plain text",
    "<!DOCTYPE html><p>hi</p><!-- c -->",
    "<ul><li>a<li>b<li>c</ul><p>x<p>y",
    "<table><tr><td>1<td>2</table>",
    "<div><span></div></span><b>",
    "<body><p>a</p></body><div>late</div><!-- tail -->",
    "<title>t</title><script>if (a < b) {}</script><style>p{}</style>",
    "<svg><rect/><circle></circle></svg><br/></br>",
    "<p <a =b c='d' c=e>&amp;&nbsp;&#x41;</p",
];

#[test]
fn test_tree_shape() {
    let output = parse("<!DOCTYPE html><p>hi</p><!-- c -->");
    insta::assert_yaml_snapshot!(shape(&output.tree, ROOT_NODE_UID));
}

#[test]
fn test_table_shape() {
    let output = parse("<table><tr><td>1<td>2</table>");
    insta::assert_yaml_snapshot!(shape(&output.tree, ROOT_NODE_UID));
}

#[test]
fn test_uids_are_breadth_first() {
    let output = parse("<!DOCTYPE html><p>hi</p><!-- c -->");
    assert_eq!(
        outline(&output.tree),
        "ROOT
  #documentType 1
  html 2
    head 3
    body 4
      p 5
        #text 7
      #comment 6
"
    );
}

#[test]
fn test_siblings_numbered_in_order() {
    let output = parse("<div><a/><b/></div>");
    let num = |tag: &str| find(&output.tree, tag).uid.parse::<u64>().unwrap();
    assert!(num("div") < num("a"));
    assert!(num("div") < num("b"));
    assert!(num("a") < num("b"));
}

#[test]
fn test_uids_unique_and_links_symmetric() {
    for input in MESSY {
        let output = parse(input);
        let tree = &output.tree;
        assert_eq!(tree.root().map(|r| r.uid.as_str()), Some(ROOT_NODE_UID), "{input:?}");

        let uids: HashSet<_> = tree.iter().map(|n| n.uid.clone()).collect();
        assert_eq!(uids.len(), tree.len(), "{input:?}");

        for node in tree.iter().filter(|n| !n.is_root()) {
            let parent_uid = node.parent_uid.as_ref().unwrap();
            let parent = tree.get(parent_uid).unwrap();
            let count = parent.children.iter().filter(|c| **c == node.uid).count();
            assert_eq!(count, 1, "{input:?}: {} under {}", node.uid, parent_uid);
            assert!(!parent.is_entity);
            for child in &node.children {
                assert_eq!(tree.get(child).unwrap().parent_uid.as_ref(), Some(&node.uid));
            }
        }
    }
}

#[test]
fn test_every_document_has_html_head_body() {
    for input in MESSY {
        let tree = parse(input).tree;
        for tag in ["html", "head", "body"] {
            assert_eq!(
                tree.iter().filter(|n| n.data.tag_name() == tag).count(),
                1,
                "{input:?} <{tag}>"
            );
        }
    }
}

#[test]
fn test_validity_classification() {
    let output = parse("<!DOCTYPE html><p>hi</p>");
    let p = find(&output.tree, "p");
    assert!(p.valid());
    let text = output.tree.get(&p.children[0]).unwrap();
    assert!(text.data.is_text());
    assert!(!text.valid());
    let doctype = output
        .tree
        .iter()
        .find(|n| matches!(n.data, NodeData::Doctype(_)))
        .unwrap();
    assert!(!doctype.valid());
}

#[test]
fn test_ids_written_once_per_element() {
    let output = parse(r#"<div class="a"><p>x</p><img src=y></div>"#);
    let elements: Vec<_> = output.tree.iter().filter(|n| n.data.is_element()).collect();
    for node in &elements {
        let attr = format!(r#"{STAGE_NODE_ID_ATTR}="{}""#, node.uid);
        assert_eq!(output.content_in_app.matches(&attr).count(), 1, "{attr}");
        assert_eq!(node.data.attribs().get(STAGE_NODE_ID_ATTR), Some(node.uid.as_str()));
    }
    assert_eq!(
        output.content_in_app.matches(STAGE_NODE_ID_ATTR).count(),
        elements.len()
    );
}

#[test]
fn test_reparse_of_rendered_output_is_stable() {
    let first = parse(r#"<div class="a"><p>x</p><img src=y></div>"#);
    let second = parse(&first.content_in_app);
    assert_eq!(second.content_in_app, first.content_in_app);
    assert_eq!(outline(&second.tree), outline(&first.tree));
    assert!(second.diagnostics.is_empty());
}

#[test]
fn test_stale_ids_are_replaced() {
    let output = parse(&format!(r#"<p {STAGE_NODE_ID_ATTR}="99" id="x">a</p>"#));
    let p = find(&output.tree, "p");
    let attribs: Vec<_> = p.data.attribs().iter().collect();
    assert_eq!(attribs, vec![(STAGE_NODE_ID_ATTR, p.uid.as_str()), ("id", "x")]);
    assert!(!output.content_in_app.contains("\"99\""));
}

#[test]
fn test_title_reported_through_callback() {
    let mut seen = Vec::new();
    let mut on_title = |title: &str| seen.push(title.to_string());
    let output = parse_with(
        "<title>Home &amp; away</title><title>Second</title>",
        &ParseConfig::default(),
        Some(&mut on_title),
    );
    assert_eq!(output.title, "Home & away");
    assert_eq!(seen, vec!["Home & away".to_string()]);
}

#[test]
fn test_title_falls_back() {
    assert_eq!(parse("<p>no title</p>").title, DEFAULT_TITLE);
    assert_eq!(parse("<title></title>").title, DEFAULT_TITLE);

    let config = ParseConfig {
        fallback_title: "Untitled".into(),
    };
    assert_eq!(parse_with("<title></title>", &config, None).title, "Untitled");
}

#[test]
fn test_element_locations() {
    let output = parse("<p>hi</p>");
    let p = location(&output.tree, "p").unwrap();
    let start_tag = p.start_tag.unwrap();
    let end_tag = p.end_tag.unwrap();
    assert_eq!((start_tag.start_col, start_tag.end_col), (1, 4));
    assert_eq!((end_tag.start_offset, end_tag.end_offset), (5, 9));
    assert_eq!((end_tag.start_col, end_tag.end_col), (6, 10));
    assert_eq!((p.start_offset, p.end_offset), (0, 9));

    let text = output.tree.get(&find(&output.tree, "p").children[0]).unwrap();
    let text = text.data.source_location().unwrap();
    assert_eq!((text.start_col, text.end_col), (4, 6));
    assert!(p.contains(text));
}

#[test]
fn test_locations_span_lines() {
    let output = parse("<div>\n  <span>é</span>\n</div>");
    let span = location(&output.tree, "span").unwrap();
    assert_eq!((span.start_line, span.start_col), (2, 3));
    // Columns count chars; offsets count bytes.
    assert_eq!((span.end_line, span.end_col), (2, 17));
    assert_eq!(span.end_offset - span.start_offset, 15);
    let div = location(&output.tree, "div").unwrap();
    assert_eq!(div.end_tag.unwrap().start_line, 3);
}

#[test]
fn test_implied_elements_have_no_location() {
    let output = parse("<p>x</p>");
    for tag in ["html", "head", "body"] {
        assert_eq!(location(&output.tree, tag), None, "<{tag}>");
    }
    let output = parse("<table><tr><td>1</td></tr></table>");
    assert_eq!(location(&output.tree, "tbody"), None);
    assert!(location(&output.tree, "tr").is_some());
}

#[test]
fn test_implicitly_closed_element_ends_at_next_token() {
    let output = parse("<ul><li>a<li>b</ul>");
    let mut items: Vec<_> = output
        .tree
        .iter()
        .filter(|n| n.data.tag_name() == "li")
        .filter_map(|n| n.data.source_location().copied())
        .collect();
    items.sort_by_key(|loc| loc.start_offset);

    assert_eq!(items[0].end_offset, 9);
    assert_eq!(items[0].end_tag, None);
    assert_eq!(items[1].end_offset, 14);
    let ul = location(&output.tree, "ul").unwrap();
    assert_eq!(ul.end_tag.map(|t| t.start_offset), Some(14));
    assert!(output.diagnostics.is_empty());
}

#[test]
fn test_children_within_parent_span() {
    for input in MESSY {
        let tree = parse(input).tree;
        for node in tree.iter().filter(|n| !n.is_root()) {
            let Some(loc) = node.data.source_location() else {
                continue;
            };
            let Some(parent_loc) = node
                .parent_uid
                .as_ref()
                .and_then(|p| tree.get(p))
                .filter(|p| !p.is_root())
                .and_then(|p| p.data.source_location())
            else {
                continue;
            };
            assert!(parent_loc.contains(loc), "{input:?}: {}", node.uid);
        }
    }
}

#[test]
fn test_content_after_body() {
    let output = parse("<body><p>a</p></body><div>late</div>");
    assert_eq!(kinds(&output), vec![ParseErrorKind::ContentAfterBody]);

    let body = find(&output.tree, "body");
    let div = find(&output.tree, "div");
    assert_eq!(div.parent_uid.as_ref(), Some(&body.uid));
    let (body, div) = (
        body.data.source_location().unwrap(),
        div.data.source_location().unwrap(),
    );
    assert!(body.end_tag.is_some());
    assert_eq!(body.end_offset, div.end_offset);
}

#[test]
fn test_recovered_errors_are_reported() {
    let output = parse("<div><p>a</span>");
    assert_eq!(
        kinds(&output),
        vec![
            ParseErrorKind::UnclosedElement("div".into()),
            ParseErrorKind::UnexpectedEndTag("span".into()),
        ]
    );
    let stray = &output.diagnostics[1];
    assert_eq!((stray.line, stray.col), (1, 10));
    assert_eq!(stray.span.offset(), 9);
    assert_eq!(stray.span.len(), 7);
}

#[test]
fn test_clean_document_has_no_diagnostics() {
    let output = parse(
        "<!DOCTYPE html><html><head><title>x</title></head><body><p>ok</p></body></html>",
    );
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert_eq!(output.title, "x");
}

#[test]
fn test_raw_text_kept_verbatim() {
    let output = parse("<script>if (a < b) { x = '</div>'; }</script>");
    let script = find(&output.tree, "script");
    let text = output.tree.get(&script.children[0]).unwrap();
    assert_eq!(text.data.text_content(), "if (a < b) { x = '</div>'; }");
}

#[test]
fn test_entities_decoded_in_text() {
    let output = parse("<p>&amp;&lt;&#x41;</p>");
    let p = find(&output.tree, "p");
    assert_eq!(output.tree.get(&p.children[0]).unwrap().data.text_content(), "&<A");
}

#[test]
fn test_named_references_render_as_characters() {
    let output = parse("<p>&hearts; &frac12; &alpha; &check; &copy 2024</p>");
    let p = find(&output.tree, "p");
    assert_eq!(
        output.tree.get(&p.children[0]).unwrap().data.text_content(),
        "\u{2665} \u{bd} \u{3b1} \u{2713} \u{a9} 2024"
    );
    assert!(
        output
            .content_in_app
            .contains("\u{2665} \u{bd} \u{3b1} \u{2713} \u{a9} 2024</p>"),
        "{}",
        output.content_in_app
    );
    assert!(!output.content_in_app.contains("&amp;"));
}

#[test]
fn test_attribute_keeps_query_string_references() {
    let output = parse(r#"<a href="/s?a=1&copy=2">x</a>"#);
    let a = find(&output.tree, "a");
    let NodeData::Element(el) = &a.data else {
        panic!("not an element");
    };
    assert_eq!(el.attribs.get("href"), Some("/s?a=1&copy=2"));
}
