//! Span-tracking, error-tolerant HTML tokenizer.
//!
//! Every token carries the byte span it was read from, which is what lets the
//! tree builder attach exact source locations to nodes. Malformed input never
//! stops tokenization: problems are recorded and scanning continues the way a
//! browser would (unterminated tags at EOF are dropped, stray `<` is text,
//! `<?...>` and `<!...>` become bogus comments).
//!
//! Scanning is byte-based. Slices are only ever cut at ASCII structural bytes,
//! so every slice endpoint is a UTF-8 char boundary.

use std::ops::Range;

use memchr::memchr;
use smol_str::SmolStr;

use crate::error::ParseErrorKind;
use crate::html::entities::{decode_attribute, decode_entities};

/// Elements whose content is raw text up to the matching end tag.
pub(crate) fn raw_text_mode(tag: &str) -> Option<RawMode> {
    match tag {
        "script" | "style" | "xmp" | "iframe" | "noembed" | "noframes" | "noscript"
        | "plaintext" => Some(RawMode::RawText),
        "title" | "textarea" => Some(RawMode::EscapableRawText),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RawMode {
    /// Content is taken verbatim.
    RawText,
    /// Content has character references decoded.
    EscapableRawText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAttr {
    pub name: SmolStr,
    pub value: String,
    /// From the first byte of the name to the end of the value.
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    pub name: SmolStr,
    pub attrs: Vec<TokenAttr>,
    /// Repeats of an earlier attribute name. The first one wins; these are
    /// kept only for their source spans.
    pub duplicates: Vec<TokenAttr>,
    pub self_closing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Doctype { name: SmolStr },
    StartTag(StartTag),
    EndTag { name: SmolStr },
    Comment(String),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

/// Outcome of scanning at a `<`.
enum Markup {
    Token(Token),
    /// The `<` does not open markup; it is text.
    Literal,
    /// Input was consumed but produced no token.
    Skipped,
}

pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    raw: Option<(SmolStr, RawMode)>,
    errors: Vec<(ParseErrorKind, Range<usize>)>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            raw: None,
            errors: Vec::new(),
        }
    }

    /// Recovered problems seen so far, as (kind, byte span).
    pub fn take_errors(&mut self) -> Vec<(ParseErrorKind, Range<usize>)> {
        std::mem::take(&mut self.errors)
    }

    fn error(&mut self, kind: ParseErrorKind, span: Range<usize>) {
        tracing::trace!(?kind, ?span, "tokenizer: recovered error");
        self.errors.push((kind, span));
    }

    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    fn skip_whitespace(&self, mut i: usize) -> usize {
        let bytes = self.bytes();
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        i
    }

    /// Scan a tag or attribute name starting at `i`.
    fn scan_name(&self, mut i: usize, stop_at_eq: bool) -> usize {
        let bytes = self.bytes();
        while i < bytes.len() {
            let b = bytes[i];
            if b.is_ascii_whitespace() || b == b'/' || b == b'>' || (stop_at_eq && b == b'=') {
                break;
            }
            i += 1;
        }
        i
    }

    fn starts_markup(&self, i: usize) -> bool {
        let bytes = self.bytes();
        match bytes.get(i + 1) {
            Some(b) if b.is_ascii_alphabetic() => true,
            Some(b'/') => i + 2 < bytes.len(),
            Some(b'!') | Some(b'?') => true,
            _ => false,
        }
    }

    fn text(&mut self) -> Token {
        let start = self.pos;
        let bytes = self.bytes();
        // A `<` at `start` reached here is literal text.
        let mut search = start + 1;
        let end = loop {
            match memchr(b'<', &bytes[search.min(bytes.len())..]) {
                Some(rel) => {
                    let i = search + rel;
                    if self.starts_markup(i) {
                        break i;
                    }
                    search = i + 1;
                }
                None => break bytes.len(),
            }
        };
        self.pos = end;
        Token {
            kind: TokenKind::Text(decode_entities(&self.input[start..end]).into_owned()),
            span: start..end,
        }
    }

    fn raw_text(&mut self, tag: &SmolStr, mode: RawMode) -> Option<Token> {
        let start = self.pos;
        let end = match self.find_close_tag(start, tag) {
            Some(close) => close,
            None => {
                self.error(
                    ParseErrorKind::EofInRawText(tag.clone()),
                    start..self.input.len(),
                );
                self.input.len()
            }
        };
        self.pos = end;
        if end == start {
            return None;
        }
        let raw = &self.input[start..end];
        let content = match mode {
            RawMode::RawText => raw.to_string(),
            RawMode::EscapableRawText => decode_entities(raw).into_owned(),
        };
        Some(Token {
            kind: TokenKind::Text(content),
            span: start..end,
        })
    }

    /// Offset of the `</tag` that closes raw text starting at `from`.
    fn find_close_tag(&self, from: usize, tag: &str) -> Option<usize> {
        let bytes = self.bytes();
        let n = tag.len();
        let mut i = from;
        while i < bytes.len() {
            let rel = memchr(b'<', &bytes[i..])?;
            i += rel;
            let name_start = i + 2;
            if bytes.get(i + 1) == Some(&b'/')
                && bytes.len() >= name_start + n
                && bytes[name_start..name_start + n].eq_ignore_ascii_case(tag.as_bytes())
            {
                match bytes.get(name_start + n) {
                    None => return Some(i),
                    Some(b) if b.is_ascii_whitespace() || *b == b'/' || *b == b'>' => {
                        return Some(i);
                    }
                    _ => {}
                }
            }
            i += 1;
        }
        None
    }

    fn markup(&mut self) -> Markup {
        let start = self.pos;
        let rest = &self.input[start..];
        let bytes = self.bytes();

        if rest.starts_with("<!--") {
            return Markup::Token(self.comment());
        }
        if bytes.len() >= start + 9 && bytes[start..start + 9].eq_ignore_ascii_case(b"<!doctype") {
            return self.doctype();
        }
        match bytes.get(start + 1) {
            Some(b) if b.is_ascii_alphabetic() => self.start_tag(),
            Some(b'/') => match bytes.get(start + 2) {
                Some(b) if b.is_ascii_alphabetic() => self.end_tag(),
                Some(b'>') => {
                    self.error(ParseErrorKind::MissingEndTagName, start..start + 3);
                    self.pos = start + 3;
                    Markup::Skipped
                }
                Some(_) => Markup::Token(self.bogus_comment(start + 2)),
                None => Markup::Literal,
            },
            Some(b'!') => Markup::Token(self.bogus_comment(start + 2)),
            Some(b'?') => Markup::Token(self.bogus_comment(start + 1)),
            _ => Markup::Literal,
        }
    }

    fn comment(&mut self) -> Token {
        let start = self.pos;
        let body = start + 4;
        let rest = &self.input[body..];

        // `<!-->` and `<!--->` close immediately.
        for abrupt in [">", "->"] {
            if rest.starts_with(abrupt) {
                let end = body + abrupt.len();
                self.pos = end;
                return Token {
                    kind: TokenKind::Comment(String::new()),
                    span: start..end,
                };
            }
        }

        let (content_end, end) = match rest.find("-->") {
            Some(rel) => (body + rel, body + rel + 3),
            None => {
                self.error(ParseErrorKind::EofInComment, start..self.input.len());
                (self.input.len(), self.input.len())
            }
        };
        self.pos = end;
        Token {
            kind: TokenKind::Comment(self.input[body..content_end].to_string()),
            span: start..end,
        }
    }

    fn bogus_comment(&mut self, content_start: usize) -> Token {
        let start = self.pos;
        self.error(ParseErrorKind::BogusComment, start..content_start);
        let bytes = self.bytes();
        let (content_end, end) = match memchr(b'>', &bytes[content_start..]) {
            Some(rel) => (content_start + rel, content_start + rel + 1),
            None => (bytes.len(), bytes.len()),
        };
        self.pos = end;
        Token {
            kind: TokenKind::Comment(self.input[content_start..content_end].to_string()),
            span: start..end,
        }
    }

    fn doctype(&mut self) -> Markup {
        let start = self.pos;
        let body = start + 9;
        let bytes = self.bytes();
        let (body_end, end) = match memchr(b'>', &bytes[body..]) {
            Some(rel) => (body + rel, body + rel + 1),
            None => {
                self.error(ParseErrorKind::EofInTag, start..bytes.len());
                (bytes.len(), bytes.len())
            }
        };
        self.pos = end;
        let name = self.input[body..body_end]
            .split_ascii_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        Markup::Token(Token {
            kind: TokenKind::Doctype { name: name.into() },
            span: start..end,
        })
    }

    fn end_tag(&mut self) -> Markup {
        let start = self.pos;
        let name_start = start + 2;
        let name_end = self.scan_name(name_start, false);
        let name = self.input[name_start..name_end].to_ascii_lowercase();
        // Anything between the name and `>` is ignored.
        match memchr(b'>', &self.bytes()[name_end..]) {
            Some(rel) => {
                let end = name_end + rel + 1;
                self.pos = end;
                Markup::Token(Token {
                    kind: TokenKind::EndTag { name: name.into() },
                    span: start..end,
                })
            }
            None => {
                self.error(ParseErrorKind::EofInTag, start..self.input.len());
                self.pos = self.input.len();
                Markup::Skipped
            }
        }
    }

    fn start_tag(&mut self) -> Markup {
        let start = self.pos;
        let len = self.input.len();
        let name_end = self.scan_name(start + 1, false);
        let name: SmolStr = self.input[start + 1..name_end].to_ascii_lowercase().into();
        let mut attrs: Vec<TokenAttr> = Vec::new();
        let mut duplicates: Vec<TokenAttr> = Vec::new();
        let mut self_closing = false;
        let mut i = name_end;

        let end = loop {
            i = self.skip_whitespace(i);
            if i >= len {
                return self.eof_in_tag(start);
            }
            match self.bytes()[i] {
                b'>' => break i + 1,
                b'/' => {
                    if self.bytes().get(i + 1) == Some(&b'>') {
                        self_closing = true;
                        break i + 2;
                    }
                    i += 1;
                    continue;
                }
                _ => {}
            }

            let attr_start = i;
            // A leading `=` belongs to the name.
            let name_end = self.scan_name(i + 1, true);
            let attr_name: SmolStr = self.input[attr_start..name_end].to_ascii_lowercase().into();
            i = name_end;

            let mut value = String::new();
            let after_name = self.skip_whitespace(i);
            if after_name < len && self.bytes()[after_name] == b'=' {
                let v = self.skip_whitespace(after_name + 1);
                if v >= len {
                    return self.eof_in_tag(start);
                }
                match self.bytes()[v] {
                    quote @ (b'"' | b'\'') => match memchr(quote, &self.bytes()[v + 1..]) {
                        Some(rel) => {
                            let close = v + 1 + rel;
                            value = decode_attribute(&self.input[v + 1..close]).into_owned();
                            i = close + 1;
                        }
                        None => return self.eof_in_tag(start),
                    },
                    b'>' => i = v,
                    _ => {
                        let mut e = v;
                        while e < len
                            && !self.bytes()[e].is_ascii_whitespace()
                            && self.bytes()[e] != b'>'
                        {
                            e += 1;
                        }
                        value = decode_attribute(&self.input[v..e]).into_owned();
                        i = e;
                    }
                }
            }

            let attr = TokenAttr {
                name: attr_name,
                value,
                span: attr_start..i,
            };
            if attrs.iter().any(|a| a.name == attr.name) {
                self.error(
                    ParseErrorKind::DuplicateAttribute(attr.name.clone()),
                    attr.span.clone(),
                );
                duplicates.push(attr);
            } else {
                attrs.push(attr);
            }
        };

        self.pos = end;
        if let Some(mode) = raw_text_mode(&name) {
            self.raw = Some((name.clone(), mode));
        }
        Markup::Token(Token {
            kind: TokenKind::StartTag(StartTag {
                name,
                attrs,
                duplicates,
                self_closing,
            }),
            span: start..end,
        })
    }

    fn eof_in_tag(&mut self, start: usize) -> Markup {
        self.error(ParseErrorKind::EofInTag, start..self.input.len());
        self.pos = self.input.len();
        Markup::Skipped
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if self.pos >= self.input.len() {
                return None;
            }
            if let Some((tag, mode)) = self.raw.take() {
                if let Some(token) = self.raw_text(&tag, mode) {
                    return Some(token);
                }
                continue;
            }
            if self.bytes()[self.pos] == b'<' {
                match self.markup() {
                    Markup::Token(token) => return Some(token),
                    Markup::Skipped => continue,
                    Markup::Literal => {}
                }
            }
            return Some(self.text());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Tokenizer::new(input).map(|t| t.kind).collect()
    }

    fn start(name: &str, attrs: &[(&str, &str)]) -> TokenKind {
        TokenKind::StartTag(StartTag {
            name: name.into(),
            attrs: attrs
                .iter()
                .map(|(n, v)| TokenAttr {
                    name: (*n).into(),
                    value: (*v).to_string(),
                    span: 0..0,
                })
                .collect(),
            duplicates: Vec::new(),
            self_closing: false,
        })
    }

    fn strip_attr_spans(kind: TokenKind) -> TokenKind {
        match kind {
            TokenKind::StartTag(mut tag) => {
                for attr in &mut tag.attrs {
                    attr.span = 0..0;
                }
                TokenKind::StartTag(tag)
            }
            other => other,
        }
    }

    #[test]
    fn test_basic_element_spans() {
        let tokens: Vec<Token> = Tokenizer::new("<p>hello</p>").collect();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].span, 0..3);
        assert_eq!(tokens[1].kind, TokenKind::Text("hello".into()));
        assert_eq!(tokens[1].span, 3..8);
        assert_eq!(tokens[2].kind, TokenKind::EndTag { name: "p".into() });
        assert_eq!(tokens[2].span, 8..12);
    }

    #[test]
    fn test_attributes() {
        let kinds: Vec<_> = kinds(r#"<A Href="x&amp;y" data-x='1' hidden checked=yes>"#)
            .into_iter()
            .map(strip_attr_spans)
            .collect();
        assert_eq!(
            kinds,
            vec![start(
                "a",
                &[("href", "x&y"), ("data-x", "1"), ("hidden", ""), ("checked", "yes")]
            )]
        );
    }

    #[test]
    fn test_attribute_span_covers_value() {
        let input = r#"<div class="a b" id=x>"#;
        let token = Tokenizer::new(input).next().unwrap();
        let TokenKind::StartTag(tag) = token.kind else {
            panic!("expected start tag");
        };
        assert_eq!(&input[tag.attrs[0].span.clone()], r#"class="a b""#);
        assert_eq!(&input[tag.attrs[1].span.clone()], "id=x");
    }

    #[test]
    fn test_duplicate_attribute_keeps_first() {
        let input = r#"<b a="1" a="2">"#;
        let mut tokenizer = Tokenizer::new(input);
        let Some(TokenKind::StartTag(tag)) = tokenizer.next().map(|t| t.kind) else {
            panic!("expected start tag");
        };
        assert_eq!(tag.attrs.len(), 1);
        assert_eq!(tag.attrs[0].value, "1");
        assert_eq!(tag.duplicates.len(), 1);
        assert_eq!(&input[tag.duplicates[0].span.clone()], r#"a="2""#);
        let errors = tokenizer.take_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, ParseErrorKind::DuplicateAttribute("a".into()));
    }

    #[test]
    fn test_self_closing_flag() {
        let kinds = kinds("<br/><img src=a />");
        assert!(matches!(&kinds[0], TokenKind::StartTag(t) if t.self_closing && t.name == "br"));
        assert!(
            matches!(&kinds[1], TokenKind::StartTag(t) if t.self_closing && t.attrs[0].value == "a")
        );
    }

    #[test]
    fn test_comment_and_doctype() {
        assert_eq!(
            kinds("<!DOCTYPE html><!-- hi -->"),
            vec![
                TokenKind::Doctype { name: "html".into() },
                TokenKind::Comment(" hi ".into()),
            ]
        );
    }

    #[test]
    fn test_abrupt_comment() {
        assert_eq!(
            kinds("<!-->x"),
            vec![TokenKind::Comment(String::new()), TokenKind::Text("x".into())]
        );
    }

    #[test]
    fn test_unterminated_comment_runs_to_eof() {
        let mut tokenizer = Tokenizer::new("<!-- open");
        assert_eq!(
            tokenizer.next().map(|t| t.kind),
            Some(TokenKind::Comment(" open".into()))
        );
        assert_eq!(tokenizer.take_errors()[0].0, ParseErrorKind::EofInComment);
    }

    #[test]
    fn test_literal_less_than_is_text() {
        assert_eq!(kinds("a < b <3"), vec![TokenKind::Text("a < b <3".into())]);
    }

    #[test]
    fn test_raw_text_script() {
        let kinds = kinds("<script>if (a < b) { x = '</p>'; }</script>");
        assert_eq!(kinds[1], TokenKind::Text("if (a < b) { x = '</p>'; }".into()));
        assert_eq!(
            kinds[2],
            TokenKind::EndTag {
                name: "script".into()
            }
        );
    }

    #[test]
    fn test_title_decodes_entities() {
        let kinds = kinds("<title>A &amp; <b>B</b></title>");
        assert_eq!(kinds[1], TokenKind::Text("A & <b>B</b>".into()));
    }

    #[test]
    fn test_eof_in_tag_drops_token() {
        let mut tokenizer = Tokenizer::new("<p>x<div class=");
        let kinds: Vec<_> = tokenizer.by_ref().map(|t| t.kind).collect();
        assert_eq!(kinds.len(), 2);
        assert_eq!(tokenizer.take_errors()[0].0, ParseErrorKind::EofInTag);
    }

    #[test]
    fn test_processing_instruction_is_bogus_comment() {
        let mut tokenizer = Tokenizer::new("<?xml version=1?><a>");
        let first = tokenizer.next().map(|t| t.kind);
        assert_eq!(first, Some(TokenKind::Comment("?xml version=1?".into())));
        assert_eq!(tokenizer.take_errors()[0].0, ParseErrorKind::BogusComment);
    }

    #[test]
    fn test_multibyte_text_spans() {
        let input = "<p>héllo</p>";
        let tokens: Vec<Token> = Tokenizer::new(input).collect();
        assert_eq!(&input[tokens[1].span.clone()], "héllo");
    }
}
