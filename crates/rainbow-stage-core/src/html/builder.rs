//! Tree construction over the token stream.
//!
//! A pragmatic subset of the HTML tree construction rules: implicit
//! `html`/`head`/`body`, head-only elements routed into `head`, optional end
//! tags closed by the usual siblings, implicit `tbody`/`tr` in tables, void
//! elements, stray end tags ignored, everything closed at EOF. Formatting
//! element reconstruction (the adoption agency) is not performed.
//!
//! Source locations follow the usual conventions: an element closed by its
//! own end tag gets `end_tag` and ends after it; an element closed
//! implicitly ends where the token that closed it starts.

use std::ops::Range;

use smol_str::SmolStr;

use crate::error::{ParseDiagnostic, ParseErrorKind};
use crate::html::dom::{Document, DomNodeId, DomNodeKind};
use crate::html::lines::LineIndex;
use crate::html::tokenizer::{StartTag, Token, TokenKind, Tokenizer, raw_text_mode};
use crate::types::{Attribs, Position, SourceLocation, TagLocation};

pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "hr", "img", "input", "keygen",
    "link", "meta", "param", "source", "track", "wbr",
];

const HEAD_ELEMENTS: &[&str] = &[
    "base", "basefont", "bgsound", "link", "meta", "noframes", "script", "style", "template",
    "title",
];

/// Start tags that close an open `p` in button scope.
const CLOSES_P: &[&str] = &[
    "address", "article", "aside", "blockquote", "center", "details", "dialog", "dir", "div",
    "dl", "fieldset", "figcaption", "figure", "footer", "form", "header", "hgroup", "hr",
    "listing", "main", "menu", "nav", "ol", "p", "pre", "search", "section", "summary", "table",
    "ul", "xmp", "h1", "h2", "h3", "h4", "h5", "h6",
];

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

const IMPLIED_END: &[&str] = &[
    "dd", "dt", "li", "optgroup", "option", "p", "rb", "rp", "rt", "rtc",
];

const SPECIAL: &[&str] = &[
    "address", "applet", "area", "article", "aside", "base", "basefont", "bgsound",
    "blockquote", "body", "br", "button", "caption", "center", "col", "colgroup", "dd",
    "details", "dir", "div", "dl", "dt", "embed", "fieldset", "figcaption", "figure", "footer",
    "form", "frame", "frameset", "h1", "h2", "h3", "h4", "h5", "h6", "head", "header",
    "hgroup", "hr", "html", "iframe", "img", "input", "keygen", "li", "link", "listing",
    "main", "marquee", "menu", "meta", "nav", "noembed", "noframes", "noscript", "object",
    "ol", "p", "param", "plaintext", "pre", "script", "search", "section", "select", "source",
    "style", "summary", "table", "tbody", "td", "template", "textarea", "tfoot", "th",
    "thead", "title", "tr", "track", "ul", "wbr", "xmp",
];

/// Elements whose end tag may be omitted without a diagnostic at EOF.
const OPTIONAL_END: &[&str] = &[
    "html", "head", "body", "p", "li", "dd", "dt", "option", "optgroup", "tbody", "thead",
    "tfoot", "tr", "td", "th", "colgroup", "caption", "rb", "rp", "rt", "rtc",
];

const TABLE_SECTIONS: &[&str] = &["tbody", "thead", "tfoot"];

/// Elements that bound the default scope.
const SCOPE_BOUNDARIES: &[&str] = &[
    "html", "table", "template", "td", "th", "caption", "marquee", "object", "applet",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    Default,
    Button,
    ListItem,
    Table,
}

impl Scope {
    fn is_boundary(self, name: &str) -> bool {
        let base = SCOPE_BOUNDARIES.contains(&name);
        match self {
            Scope::Default => base,
            Scope::Button => base || name == "button",
            Scope::ListItem => base || name == "ol" || name == "ul",
            Scope::Table => matches!(name, "html" | "table" | "template"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InsertionMode {
    Initial,
    BeforeHtml,
    BeforeHead,
    InHead,
    AfterHead,
    InBody,
    AfterBody,
    AfterAfterBody,
}

pub(crate) struct TreeBuilder<'a> {
    source: &'a str,
    lines: LineIndex<'a>,
    doc: Document,
    open: Vec<DomNodeId>,
    mode: InsertionMode,
    html: Option<DomNodeId>,
    head: Option<DomNodeId>,
    body: Option<DomNodeId>,
    skip_leading_newline: bool,
    diagnostics: Vec<ParseDiagnostic>,
}

impl<'a> TreeBuilder<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            source,
            lines: LineIndex::new(source),
            doc: Document::new(),
            open: Vec::new(),
            mode: InsertionMode::Initial,
            html: None,
            head: None,
            body: None,
            skip_leading_newline: false,
            diagnostics: Vec::new(),
        }
    }

    /// Tokenize and build the whole document.
    pub(crate) fn build(mut self) -> (Document, Vec<ParseDiagnostic>) {
        let mut tokenizer = Tokenizer::new(self.source);
        for token in tokenizer.by_ref() {
            self.process(token);
        }
        let token_errors = tokenizer.take_errors();
        for (kind, span) in token_errors {
            self.diagnose(kind, span);
        }
        self.finish();
        self.diagnostics
            .sort_by_key(|d| (d.span.offset(), d.span.len()));
        (self.doc, self.diagnostics)
    }

    fn pos(&self, offset: usize) -> Position {
        self.lines.position(offset)
    }

    fn diagnose(&mut self, kind: ParseErrorKind, span: Range<usize>) {
        tracing::trace!(?kind, start = span.start, "tree builder: recovered error");
        let at = self.pos(span.start);
        self.diagnostics
            .push(ParseDiagnostic::new(kind, at, span.end.saturating_sub(span.start)));
    }

    fn current(&self) -> DomNodeId {
        self.open.last().copied().unwrap_or(DomNodeId::DOCUMENT)
    }

    fn current_name(&self) -> Option<&str> {
        self.open.last().and_then(|id| self.doc.element_name(*id))
    }

    fn name_of(&self, id: DomNodeId) -> &str {
        self.doc.element_name(id).unwrap_or_default()
    }

    fn in_scope(&self, names: &[&str], scope: Scope) -> bool {
        for id in self.open.iter().rev() {
            let name = self.name_of(*id);
            if names.contains(&name) {
                return true;
            }
            if scope.is_boundary(name) {
                return false;
            }
        }
        false
    }

    fn in_foreign_content(&self) -> bool {
        self.open
            .iter()
            .any(|id| matches!(self.name_of(*id), "svg" | "math"))
    }

    // --- locations ---

    fn tag_location(&self, span: &Range<usize>) -> TagLocation {
        TagLocation::new(self.pos(span.start), self.pos(span.end))
    }

    /// End an element where the token at `at` starts, unless it already has
    /// an explicit end tag.
    fn close_implicitly(&mut self, id: DomNodeId, at: usize) {
        let end = self.pos(at);
        if let Some(loc) = self.doc.node_mut(id).location.as_mut() {
            if loc.end_tag.is_none() {
                loc.set_end(end);
            }
        }
    }

    fn close_with_end_tag(&mut self, id: DomNodeId, span: &Range<usize>) {
        let tag = self.tag_location(span);
        if let Some(loc) = self.doc.node_mut(id).location.as_mut() {
            if loc.end_tag.is_none() {
                loc.end_tag = Some(tag);
                loc.set_end(tag.end());
            }
        }
    }

    /// Widen every element so it encloses its children.
    ///
    /// Only content that follows an explicit `</body>` or `</html>` can end
    /// up outside its parent's span. Children are allocated after their
    /// parents, so a reverse arena walk sees children first.
    fn enclose_children(&mut self) {
        for index in (0..self.doc.len()).rev() {
            let id = DomNodeId::from_index(index);
            let child_end = self
                .doc
                .children(id)
                .iter()
                .filter_map(|child| self.doc.node(*child).location)
                .map(|loc| loc.end())
                .max_by_key(|end| end.offset);
            let Some(child_end) = child_end else {
                continue;
            };
            if let Some(loc) = self.doc.node_mut(id).location.as_mut() {
                if loc.end_offset < child_end.offset {
                    loc.set_end(child_end);
                }
            }
        }
    }

    // --- stack operations ---

    fn pop_implicitly(&mut self, at: usize) -> Option<DomNodeId> {
        let id = self.open.pop()?;
        self.close_implicitly(id, at);
        Some(id)
    }

    /// Pop up to and including the nearest element named in `names`.
    ///
    /// That element gets the explicit end tag when `end_tag` names it;
    /// everything above it is closed implicitly at `span.start`.
    fn pop_until(&mut self, names: &[&str], end_tag: Option<&str>, span: &Range<usize>) {
        while let Some(id) = self.open.pop() {
            let name = self.name_of(id);
            let matched = names.contains(&name);
            if matched && end_tag == Some(name) {
                self.close_with_end_tag(id, span);
            } else {
                self.close_implicitly(id, span.start);
            }
            if matched {
                return;
            }
        }
    }

    fn generate_implied_end_tags(&mut self, except: Option<&str>, at: usize) {
        while let Some(name) = self.current_name() {
            if !IMPLIED_END.contains(&name) || Some(name) == except {
                break;
            }
            self.pop_implicitly(at);
        }
    }

    fn close_p_in_button_scope(&mut self, at: usize) {
        if self.in_scope(&["p"], Scope::Button) {
            self.generate_implied_end_tags(Some("p"), at);
            self.pop_until(&["p"], None, &(at..at));
        }
    }

    // --- insertion ---

    fn insert_element(&mut self, tag: StartTag, span: &Range<usize>) -> DomNodeId {
        let location = SourceLocation::from_start_tag(self.tag_location(span));
        let attrs: Attribs = tag.attrs.into_iter().map(|a| (a.name, a.value)).collect();
        let void = VOID_ELEMENTS.contains(&tag.name.as_str());
        let foreign = self.in_foreign_content() || matches!(tag.name.as_str(), "svg" | "math");
        let push = !(void || (foreign && tag.self_closing));
        if tag.self_closing && push {
            self.diagnose(ParseErrorKind::NonVoidSelfClosing(tag.name.clone()), span.clone());
        }
        if matches!(tag.name.as_str(), "pre" | "listing" | "textarea") {
            self.skip_leading_newline = true;
        }

        let parent = self.current();
        let id = self.doc.create(
            DomNodeKind::Element {
                name: tag.name,
                attrs,
            },
            Some(location),
        );
        self.doc.append_child(parent, id);
        if push {
            self.open.push(id);
        }
        id
    }

    fn insert_implicit(&mut self, name: &'static str) -> DomNodeId {
        tracing::trace!(name, "tree builder: implicit element");
        let parent = self.current();
        let id = self.doc.create(
            DomNodeKind::Element {
                name: SmolStr::new_static(name),
                attrs: Attribs::new(),
            },
            None,
        );
        self.doc.append_child(parent, id);
        self.open.push(id);
        id
    }

    fn insert_text(&mut self, content: String, span: Range<usize>) {
        if content.is_empty() {
            return;
        }
        let parent = self.current();
        if let Some(last) = self.doc.last_child(parent) {
            let end = self.pos(span.end);
            let node = self.doc.node_mut(last);
            if let DomNodeKind::Text(existing) = &mut node.kind {
                existing.push_str(&content);
                if let Some(loc) = node.location.as_mut() {
                    loc.set_end(end);
                }
                return;
            }
        }
        let location = SourceLocation::span(self.pos(span.start), self.pos(span.end));
        let id = self.doc.create(DomNodeKind::Text(content), Some(location));
        self.doc.append_child(parent, id);
    }

    fn insert_comment(&mut self, parent: DomNodeId, content: String, span: &Range<usize>) {
        let location = SourceLocation::span(self.pos(span.start), self.pos(span.end));
        let id = self.doc.create(DomNodeKind::Comment(content), Some(location));
        self.doc.append_child(parent, id);
    }

    fn merge_attributes(&mut self, target: Option<DomNodeId>, tag: &StartTag, span: &Range<usize>) {
        self.diagnose(ParseErrorKind::MisplacedStartTag(tag.name.clone()), span.clone());
        let Some(target) = target else {
            return;
        };
        for attr in &tag.attrs {
            let present = self
                .doc
                .attrs(target)
                .is_some_and(|attrs| attrs.contains(&attr.name));
            if !present {
                self.doc.set_attribute(target, &attr.name, attr.value.clone());
            }
        }
    }

    // --- dispatch ---

    fn process(&mut self, token: Token) {
        let Some(token) = self.strip_leading_newline(token) else {
            return;
        };

        // Raw text content and its end tag belong to the element that
        // opened it, whatever the insertion mode.
        let raw_parent = self
            .current_name()
            .filter(|name| raw_text_mode(name).is_some())
            .map(SmolStr::from);
        let token = match raw_parent {
            Some(parent) => match token.kind {
                TokenKind::Text(content) => {
                    self.insert_text(content, token.span);
                    return;
                }
                TokenKind::EndTag { name } if name == parent => {
                    self.pop_until(&[name.as_str()], Some(name.as_str()), &token.span);
                    return;
                }
                kind => Token {
                    kind,
                    span: token.span,
                },
            },
            None => token,
        };

        match self.mode {
            InsertionMode::Initial => self.initial(token),
            InsertionMode::BeforeHtml => self.before_html(token),
            InsertionMode::BeforeHead => self.before_head(token),
            InsertionMode::InHead => self.in_head(token),
            InsertionMode::AfterHead => self.after_head(token),
            InsertionMode::InBody => self.in_body(token),
            InsertionMode::AfterBody | InsertionMode::AfterAfterBody => self.after_body(token),
        }
    }

    /// `pre`, `listing` and `textarea` drop a newline directly after the
    /// start tag.
    fn strip_leading_newline(&mut self, token: Token) -> Option<Token> {
        if !std::mem::take(&mut self.skip_leading_newline) {
            return Some(token);
        }
        match token.kind {
            TokenKind::Text(content) if content.starts_with('\n') => {
                let rest = content[1..].to_string();
                if rest.is_empty() {
                    return None;
                }
                Some(Token {
                    kind: TokenKind::Text(rest),
                    span: token.span.start + 1..token.span.end,
                })
            }
            kind => Some(Token {
                kind,
                span: token.span,
            }),
        }
    }

    /// Split a text token into its leading whitespace and the rest.
    fn split_whitespace(
        &self,
        content: String,
        span: Range<usize>,
    ) -> (Option<(String, Range<usize>)>, Option<Token>) {
        let raw = &self.source[span.clone()];
        // Whitespace bytes precede any `&`, so the raw and decoded prefixes match.
        let ws = raw.len() - raw.trim_start_matches(is_html_whitespace).len();
        let ws = ws.min(content.len());
        let (lead, rest) = content.split_at(ws);
        let lead = (!lead.is_empty()).then(|| (lead.to_string(), span.start..span.start + ws));
        let rest = (!rest.is_empty()).then(|| Token {
            kind: TokenKind::Text(rest.to_string()),
            span: span.start + ws..span.end,
        });
        (lead, rest)
    }

    fn initial(&mut self, token: Token) {
        match token.kind {
            TokenKind::Doctype { name } => {
                let location =
                    SourceLocation::span(self.pos(token.span.start), self.pos(token.span.end));
                let id = self.doc.create(DomNodeKind::Doctype { name }, Some(location));
                self.doc.append_child(DomNodeId::DOCUMENT, id);
                self.mode = InsertionMode::BeforeHtml;
            }
            TokenKind::Comment(content) => {
                self.insert_comment(DomNodeId::DOCUMENT, content, &token.span);
            }
            TokenKind::Text(content) => {
                let (_, rest) = self.split_whitespace(content, token.span);
                if let Some(rest) = rest {
                    self.mode = InsertionMode::BeforeHtml;
                    self.process(rest);
                }
            }
            kind => {
                self.mode = InsertionMode::BeforeHtml;
                self.process(Token {
                    kind,
                    span: token.span,
                });
            }
        }
    }

    fn ensure_html(&mut self) {
        let html = self.insert_implicit("html");
        self.html = Some(html);
        self.mode = InsertionMode::BeforeHead;
    }

    fn before_html(&mut self, token: Token) {
        match token.kind {
            TokenKind::Doctype { .. } => {
                self.diagnose(ParseErrorKind::MisplacedDoctype, token.span)
            }
            TokenKind::Comment(content) => {
                self.insert_comment(DomNodeId::DOCUMENT, content, &token.span);
            }
            TokenKind::Text(content) => {
                let (_, rest) = self.split_whitespace(content, token.span);
                if let Some(rest) = rest {
                    self.ensure_html();
                    self.process(rest);
                }
            }
            TokenKind::StartTag(tag) if tag.name == "html" => {
                let html = self.insert_element(tag, &token.span);
                self.html = Some(html);
                self.mode = InsertionMode::BeforeHead;
            }
            TokenKind::EndTag { name }
                if !matches!(name.as_str(), "head" | "body" | "html" | "br") =>
            {
                self.diagnose(ParseErrorKind::UnexpectedEndTag(name), token.span);
            }
            kind => {
                self.ensure_html();
                self.process(Token {
                    kind,
                    span: token.span,
                });
            }
        }
    }

    fn before_head(&mut self, token: Token) {
        match token.kind {
            TokenKind::Doctype { .. } => {
                self.diagnose(ParseErrorKind::MisplacedDoctype, token.span)
            }
            TokenKind::Comment(content) => {
                let parent = self.current();
                self.insert_comment(parent, content, &token.span);
            }
            TokenKind::Text(content) => {
                let (_, rest) = self.split_whitespace(content, token.span);
                if let Some(rest) = rest {
                    self.head = Some(self.insert_implicit("head"));
                    self.mode = InsertionMode::InHead;
                    self.process(rest);
                }
            }
            TokenKind::StartTag(tag) if tag.name == "html" => {
                self.merge_attributes(self.html, &tag, &token.span);
            }
            TokenKind::StartTag(tag) if tag.name == "head" => {
                self.head = Some(self.insert_element(tag, &token.span));
                self.mode = InsertionMode::InHead;
            }
            TokenKind::EndTag { name }
                if !matches!(name.as_str(), "head" | "body" | "html" | "br") =>
            {
                self.diagnose(ParseErrorKind::UnexpectedEndTag(name), token.span);
            }
            kind => {
                self.head = Some(self.insert_implicit("head"));
                self.mode = InsertionMode::InHead;
                self.process(Token {
                    kind,
                    span: token.span,
                });
            }
        }
    }

    /// Close `head` and anything still open inside it.
    fn leave_head(&mut self, at: usize) {
        if self.in_scope(&["head"], Scope::Default) {
            self.pop_until(&["head"], None, &(at..at));
        }
        self.mode = InsertionMode::AfterHead;
    }

    fn in_head(&mut self, token: Token) {
        match token.kind {
            TokenKind::Text(content) => {
                let (lead, rest) = self.split_whitespace(content, token.span);
                if let Some((ws, span)) = lead {
                    self.insert_text(ws, span);
                }
                if let Some(rest) = rest {
                    self.leave_head(rest.span.start);
                    self.process(rest);
                }
            }
            TokenKind::Comment(content) => {
                let parent = self.current();
                self.insert_comment(parent, content, &token.span);
            }
            TokenKind::Doctype { .. } => {
                self.diagnose(ParseErrorKind::MisplacedDoctype, token.span)
            }
            TokenKind::StartTag(tag) if tag.name == "html" => {
                self.merge_attributes(self.html, &tag, &token.span);
            }
            TokenKind::StartTag(tag)
                if HEAD_ELEMENTS.contains(&tag.name.as_str()) || tag.name == "noscript" =>
            {
                self.insert_element(tag, &token.span);
            }
            TokenKind::StartTag(tag) if tag.name == "head" => {
                self.diagnose(ParseErrorKind::MisplacedStartTag(tag.name), token.span);
            }
            TokenKind::EndTag { name } if name == "head" => {
                self.pop_until(&["head"], Some("head"), &token.span);
                self.mode = InsertionMode::AfterHead;
            }
            TokenKind::EndTag { name }
                if matches!(name.as_str(), "template" | "noscript")
                    && self.current_name() == Some(name.as_str()) =>
            {
                self.pop_until(&[name.as_str()], Some(name.as_str()), &token.span);
            }
            TokenKind::EndTag { name } if !matches!(name.as_str(), "body" | "html" | "br") => {
                self.diagnose(ParseErrorKind::UnexpectedEndTag(name), token.span);
            }
            kind => {
                self.leave_head(token.span.start);
                self.process(Token {
                    kind,
                    span: token.span,
                });
            }
        }
    }

    fn start_body(&mut self) {
        self.body = Some(self.insert_implicit("body"));
        self.mode = InsertionMode::InBody;
    }

    fn after_head(&mut self, token: Token) {
        match token.kind {
            TokenKind::Text(content) => {
                let (lead, rest) = self.split_whitespace(content, token.span);
                if let Some((ws, span)) = lead {
                    self.insert_text(ws, span);
                }
                if let Some(rest) = rest {
                    self.start_body();
                    self.process(rest);
                }
            }
            TokenKind::Comment(content) => {
                let parent = self.current();
                self.insert_comment(parent, content, &token.span);
            }
            TokenKind::Doctype { .. } => {
                self.diagnose(ParseErrorKind::MisplacedDoctype, token.span)
            }
            TokenKind::StartTag(tag) if tag.name == "html" => {
                self.merge_attributes(self.html, &tag, &token.span);
            }
            TokenKind::StartTag(tag) if tag.name == "body" => {
                self.body = Some(self.insert_element(tag, &token.span));
                self.mode = InsertionMode::InBody;
            }
            TokenKind::StartTag(tag) if HEAD_ELEMENTS.contains(&tag.name.as_str()) => {
                // Late head content still goes into head.
                self.diagnose(
                    ParseErrorKind::MisplacedStartTag(tag.name.clone()),
                    token.span.clone(),
                );
                match self.head {
                    Some(head) => {
                        self.open.push(head);
                        self.insert_element(tag, &token.span);
                        // Keeps a raw text element open for its content.
                        self.open.retain(|open| *open != head);
                    }
                    None => {
                        self.start_body();
                        self.insert_element(tag, &token.span);
                    }
                }
            }
            TokenKind::StartTag(tag) if tag.name == "head" => {
                self.diagnose(ParseErrorKind::MisplacedStartTag(tag.name), token.span);
            }
            TokenKind::EndTag { name } if !matches!(name.as_str(), "body" | "html" | "br") => {
                self.diagnose(ParseErrorKind::UnexpectedEndTag(name), token.span);
            }
            kind => {
                self.start_body();
                self.process(Token {
                    kind,
                    span: token.span,
                });
            }
        }
    }

    fn in_body(&mut self, token: Token) {
        match token.kind {
            TokenKind::Text(content) => self.insert_text(content, token.span),
            TokenKind::Comment(content) => {
                let parent = self.current();
                self.insert_comment(parent, content, &token.span);
            }
            TokenKind::Doctype { .. } => {
                self.diagnose(ParseErrorKind::MisplacedDoctype, token.span)
            }
            TokenKind::StartTag(tag) => self.start_tag_in_body(tag, token.span),
            TokenKind::EndTag { name } => self.end_tag_in_body(name, token.span),
        }
    }

    fn start_tag_in_body(&mut self, tag: StartTag, span: Range<usize>) {
        let at = span.start;
        match tag.name.as_str() {
            "html" => self.merge_attributes(self.html, &tag, &span),
            "body" => self.merge_attributes(self.body, &tag, &span),
            "head" => self.diagnose(ParseErrorKind::MisplacedStartTag(tag.name), span),
            "li" => {
                self.close_list_item(&["li"], at);
                self.close_p_in_button_scope(at);
                self.insert_element(tag, &span);
            }
            "dd" | "dt" => {
                self.close_list_item(&["dd", "dt"], at);
                self.close_p_in_button_scope(at);
                self.insert_element(tag, &span);
            }
            name if HEADINGS.contains(&name) => {
                self.close_p_in_button_scope(at);
                if self.current_name().is_some_and(|c| HEADINGS.contains(&c)) {
                    self.diagnose(
                        ParseErrorKind::MisplacedStartTag(tag.name.clone()),
                        span.clone(),
                    );
                    self.pop_implicitly(at);
                }
                self.insert_element(tag, &span);
            }
            name if CLOSES_P.contains(&name) => {
                self.close_p_in_button_scope(at);
                self.insert_element(tag, &span);
            }
            "button" => {
                if self.in_scope(&["button"], Scope::Default) {
                    self.diagnose(
                        ParseErrorKind::MisplacedStartTag(tag.name.clone()),
                        span.clone(),
                    );
                    self.generate_implied_end_tags(None, at);
                    self.pop_until(&["button"], None, &span);
                }
                self.insert_element(tag, &span);
            }
            "option" => {
                if self.current_name() == Some("option") {
                    self.pop_implicitly(at);
                }
                self.insert_element(tag, &span);
            }
            "optgroup" => {
                if self.current_name() == Some("option") {
                    self.pop_implicitly(at);
                }
                if self.current_name() == Some("optgroup") {
                    self.pop_implicitly(at);
                }
                self.insert_element(tag, &span);
            }
            "tbody" | "thead" | "tfoot" => {
                if self.in_scope(&["table"], Scope::Table) {
                    self.clear_to_table(at);
                }
                self.insert_element(tag, &span);
            }
            "tr" => {
                if self.in_scope(&["tr"], Scope::Table) {
                    self.pop_until(&["tr"], None, &span);
                } else if self.in_scope(&["td", "th"], Scope::Table) {
                    self.pop_until(&["td", "th"], None, &span);
                    if self.current_name() == Some("tr") {
                        self.pop_implicitly(at);
                    }
                }
                if self.current_name() == Some("table") {
                    self.insert_implicit("tbody");
                }
                self.insert_element(tag, &span);
            }
            "td" | "th" => {
                if self.in_scope(&["td", "th"], Scope::Table) {
                    self.pop_until(&["td", "th"], None, &span);
                }
                if self.current_name() == Some("table") {
                    self.insert_implicit("tbody");
                }
                if self
                    .current_name()
                    .is_some_and(|c| TABLE_SECTIONS.contains(&c))
                {
                    self.insert_implicit("tr");
                }
                self.insert_element(tag, &span);
            }
            _ => {
                self.insert_element(tag, &span);
            }
        }
    }

    /// Close an open `li` (or `dd`/`dt`) before a sibling starts.
    fn close_list_item(&mut self, names: &[&str], at: usize) {
        let mut target = None;
        for id in self.open.iter().rev() {
            let name = self.name_of(*id);
            if names.contains(&name) {
                target = Some(SmolStr::from(name));
                break;
            }
            if SPECIAL.contains(&name) && !matches!(name, "address" | "div" | "p") {
                break;
            }
        }
        if let Some(name) = target {
            self.generate_implied_end_tags(Some(name.as_str()), at);
            self.pop_until(names, None, &(at..at));
        }
    }

    fn clear_to_table(&mut self, at: usize) {
        while let Some(name) = self.current_name() {
            if matches!(name, "table" | "html" | "template") {
                break;
            }
            self.pop_implicitly(at);
        }
    }

    fn end_tag_in_body(&mut self, name: SmolStr, span: Range<usize>) {
        let at = span.start;
        match name.as_str() {
            "body" | "html" => {
                if !self.in_scope(&["body"], Scope::Default) {
                    self.diagnose(ParseErrorKind::UnexpectedEndTag(name), span);
                    return;
                }
                while self.current_name().is_some_and(|n| n != "body") {
                    self.report_unclosed();
                    self.pop_implicitly(at);
                }
                self.pop_until(&["body"], Some(name.as_str()), &span);
                self.mode = InsertionMode::AfterBody;
                if name == "html" {
                    self.after_body(Token {
                        kind: TokenKind::EndTag { name },
                        span,
                    });
                }
            }
            "p" => {
                if !self.in_scope(&["p"], Scope::Button) {
                    self.diagnose(ParseErrorKind::UnexpectedEndTag(name), span);
                    return;
                }
                self.generate_implied_end_tags(Some("p"), at);
                self.pop_until(&["p"], Some("p"), &span);
            }
            "li" => {
                if !self.in_scope(&["li"], Scope::ListItem) {
                    self.diagnose(ParseErrorKind::UnexpectedEndTag(name), span);
                    return;
                }
                self.generate_implied_end_tags(Some("li"), at);
                self.pop_until(&["li"], Some("li"), &span);
            }
            "br" => {
                // `</br>` is treated as `<br>`.
                self.diagnose(ParseErrorKind::UnexpectedEndTag(name), span.clone());
                let tag = StartTag {
                    name: SmolStr::new_static("br"),
                    attrs: Vec::new(),
                    duplicates: Vec::new(),
                    self_closing: false,
                };
                self.insert_element(tag, &span);
            }
            n if HEADINGS.contains(&n) => {
                if !self.in_scope(HEADINGS, Scope::Default) {
                    self.diagnose(ParseErrorKind::UnexpectedEndTag(name), span);
                    return;
                }
                self.generate_implied_end_tags(None, at);
                self.pop_until(HEADINGS, Some(n), &span);
            }
            n if matches!(
                n,
                "table" | "tbody" | "thead" | "tfoot" | "tr" | "td" | "th" | "caption" | "colgroup"
            ) =>
            {
                if !self.in_scope(&[n], Scope::Table) {
                    self.diagnose(ParseErrorKind::UnexpectedEndTag(name), span);
                    return;
                }
                self.pop_until(&[n], Some(n), &span);
            }
            n if SPECIAL.contains(&n) => {
                if !self.in_scope(&[n], Scope::Default) {
                    self.diagnose(ParseErrorKind::UnexpectedEndTag(name), span);
                    return;
                }
                self.generate_implied_end_tags(Some(n), at);
                self.pop_until(&[n], Some(n), &span);
            }
            _ => self.any_other_end_tag(name, span),
        }
    }

    fn any_other_end_tag(&mut self, name: SmolStr, span: Range<usize>) {
        let mut found = false;
        for id in self.open.iter().rev() {
            let open_name = self.name_of(*id);
            if open_name == name.as_str() {
                found = true;
                break;
            }
            if SPECIAL.contains(&open_name) {
                break;
            }
        }
        if !found {
            self.diagnose(ParseErrorKind::UnexpectedEndTag(name), span);
            return;
        }
        self.generate_implied_end_tags(Some(name.as_str()), span.start);
        self.pop_until(&[name.as_str()], Some(name.as_str()), &span);
    }

    fn after_body(&mut self, token: Token) {
        match token.kind {
            TokenKind::Text(content) => {
                let (lead, rest) = self.split_whitespace(content, token.span);
                if let Some((ws, span)) = lead {
                    self.insert_into_body(ws, span);
                }
                if let Some(rest) = rest {
                    self.resume_body(rest);
                }
            }
            TokenKind::Comment(content) => {
                let parent = match self.mode {
                    InsertionMode::AfterBody => self.html.unwrap_or(DomNodeId::DOCUMENT),
                    _ => DomNodeId::DOCUMENT,
                };
                self.insert_comment(parent, content, &token.span);
            }
            TokenKind::Doctype { .. } => {
                self.diagnose(ParseErrorKind::MisplacedDoctype, token.span)
            }
            TokenKind::StartTag(tag) if tag.name == "html" => {
                self.merge_attributes(self.html, &tag, &token.span);
            }
            TokenKind::EndTag { name }
                if name == "html" && self.mode == InsertionMode::AfterBody =>
            {
                self.pop_until(&["html"], Some("html"), &token.span);
                self.mode = InsertionMode::AfterAfterBody;
            }
            kind => self.resume_body(Token {
                kind,
                span: token.span,
            }),
        }
    }

    /// Whitespace after `</body>` is kept inside body.
    fn insert_into_body(&mut self, content: String, span: Range<usize>) {
        let Some(body) = self.body else {
            return;
        };
        self.open.push(body);
        self.insert_text(content, span);
        self.open.pop();
    }

    fn resume_body(&mut self, token: Token) {
        self.diagnose(ParseErrorKind::ContentAfterBody, token.span.clone());
        if self.open.is_empty() {
            if let Some(html) = self.html {
                self.open.push(html);
            }
        }
        if let Some(body) = self.body {
            if !self.open.contains(&body) {
                self.open.push(body);
            }
        }
        self.mode = InsertionMode::InBody;
        self.process(token);
    }

    fn finish(&mut self) {
        let eof = self.source.len();
        // Every document has html, head and body.
        loop {
            match self.mode {
                InsertionMode::Initial | InsertionMode::BeforeHtml => self.ensure_html(),
                InsertionMode::BeforeHead => {
                    self.head = Some(self.insert_implicit("head"));
                    self.mode = InsertionMode::InHead;
                }
                InsertionMode::InHead => {
                    while self.current_name().is_some_and(|n| n != "head") {
                        self.report_unclosed();
                        self.pop_implicitly(eof);
                    }
                    self.leave_head(eof);
                }
                InsertionMode::AfterHead => self.start_body(),
                _ => break,
            }
        }
        while !self.open.is_empty() {
            self.report_unclosed();
            self.pop_implicitly(eof);
        }
        self.enclose_children();
    }

    fn report_unclosed(&mut self) {
        let Some(id) = self.open.last().copied() else {
            return;
        };
        let name = self.name_of(id);
        if OPTIONAL_END.contains(&name) {
            return;
        }
        let name = SmolStr::from(name);
        let eof = self.source.len();
        let span = self
            .doc
            .node(id)
            .location
            .and_then(|loc| loc.start_tag)
            .map_or(eof..eof, |tag| tag.start_offset..tag.end_offset);
        self.diagnose(ParseErrorKind::UnclosedElement(name), span);
    }
}

fn is_html_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\u{c}')
}
