//! Character reference decoding for text and attribute values.
//!
//! Numeric references (`&#123;`, `&#x1F4A9;`) must be `;`-terminated. Named
//! references use the full WHATWG table from the `entities` crate, including
//! the legacy names that browsers still accept without a semicolon
//! (`&copy 2024`), matched longest prefix first. Unknown or malformed
//! references pass through unchanged.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

use memchr::memchr;

const MAX_HEX_DIGITS: usize = 6;
const MAX_DEC_DIGITS: usize = 7;
/// `CounterClockwiseContourIntegral`.
const MAX_NAME_LEN: usize = 31;
/// Longest legacy name (`frac12`, `middot`, ...).
const MAX_LEGACY_LEN: usize = 6;

/// Names a browser decodes even without the trailing semicolon.
const LEGACY: &[&str] = &[
    "AElig", "AMP", "Aacute", "Acirc", "Agrave", "Aring", "Atilde", "Auml", "COPY", "Ccedil",
    "ETH", "Eacute", "Ecirc", "Egrave", "Euml", "GT", "Iacute", "Icirc", "Igrave", "Iuml", "LT",
    "Ntilde", "Oacute", "Ocirc", "Ograve", "Oslash", "Otilde", "Ouml", "QUOT", "REG", "THORN",
    "Uacute", "Ucirc", "Ugrave", "Uuml", "Yacute", "aacute", "acirc", "acute", "aelig", "agrave",
    "amp", "aring", "atilde", "auml", "brvbar", "ccedil", "cedil", "cent", "copy", "curren", "deg",
    "divide", "eacute", "ecirc", "egrave", "eth", "euml", "frac12", "frac14", "frac34", "gt",
    "iacute", "icirc", "iexcl", "igrave", "iquest", "iuml", "laquo", "lt", "macr", "micro",
    "middot", "nbsp", "not", "ntilde", "oacute", "ocirc", "ograve", "ordf", "ordm", "oslash",
    "otilde", "ouml", "para", "plusmn", "pound", "quot", "raquo", "reg", "sect", "shy", "sup1",
    "sup2", "sup3", "szlig", "thorn", "times", "uacute", "ucirc", "ugrave", "uml", "uuml",
    "yacute", "yen", "yuml",
];

/// Names keyed without the leading `&`. Semicolon forms keep their `;`, so
/// `"amp;"` and the legacy `"amp"` are separate entries.
fn named_table() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = HashMap::with_capacity(entities::ENTITIES.len() + LEGACY.len());
        for entity in entities::ENTITIES.iter() {
            let name = entity.entity.trim_start_matches('&');
            table.insert(name, entity.characters);
            if let Some(stem) = name.strip_suffix(';')
                && LEGACY.contains(&stem)
            {
                table.insert(stem, entity.characters);
            }
        }
        table
    })
}

/// Decode character references in text content.
///
/// Returns the input unchanged (borrowed) when it contains no `&`.
pub fn decode_entities(s: &str) -> Cow<'_, str> {
    decode(s, false)
}

/// Decode character references in an attribute value.
///
/// A legacy reference without its semicolon stays literal when followed by
/// `=` or an alphanumeric, so query strings like `?a=1&copy=2` survive.
pub fn decode_attribute(s: &str) -> Cow<'_, str> {
    decode(s, true)
}

fn decode(s: &str, in_attribute: bool) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    let Some(first) = memchr(b'&', bytes) else {
        return Cow::Borrowed(s);
    };

    let mut out = String::with_capacity(s.len());
    out.push_str(&s[..first]);
    let mut i = first;

    while i < bytes.len() {
        if bytes[i] != b'&' {
            let next = memchr(b'&', &bytes[i..]).map_or(bytes.len(), |rel| i + rel);
            out.push_str(&s[i..next]);
            i = next;
            continue;
        }

        let decoded = if bytes.get(i + 1) == Some(&b'#') {
            decode_numeric(s, i)
        } else {
            decode_named(s, i, in_attribute)
        };
        match decoded {
            Some((text, consumed)) => {
                out.push_str(&text);
                i += consumed;
            }
            None => {
                out.push('&');
                i += 1;
            }
        }
    }

    Cow::Owned(out)
}

/// Decode `&#...;` at `start`.
fn decode_numeric(s: &str, start: usize) -> Option<(Cow<'static, str>, usize)> {
    let rest = &s[start + 2..];
    let semi = rest
        .bytes()
        .take(MAX_HEX_DIGITS + 2)
        .position(|b| b == b';')?;
    let num = &rest[..semi];
    let (digits, radix, max) = match num.strip_prefix(['x', 'X']) {
        Some(hex) => (hex, 16, MAX_HEX_DIGITS),
        None => (num, 10, MAX_DEC_DIGITS),
    };
    if digits.is_empty() || digits.len() > max {
        return None;
    }
    let value = u32::from_str_radix(digits, radix).ok()?;
    let ch = match value {
        0 => '\u{fffd}',
        v => char::from_u32(v)?,
    };
    Some((Cow::Owned(ch.to_string()), 2 + semi + 1))
}

/// Decode a named reference at `start`, returning the replacement and the
/// bytes consumed (including `&`).
fn decode_named(
    s: &str,
    start: usize,
    in_attribute: bool,
) -> Option<(Cow<'static, str>, usize)> {
    let rest = &s.as_bytes()[start + 1..];
    let run = rest
        .iter()
        .take(MAX_NAME_LEN + 1)
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    if run == 0 {
        return None;
    }
    let table = named_table();

    if rest.get(run) == Some(&b';') {
        let name = &s[start + 1..start + 1 + run + 1];
        if let Some(value) = table.get(name) {
            return Some((Cow::Borrowed(*value), 1 + run + 1));
        }
    }

    // Legacy names, longest prefix first.
    let name = (2..=run.min(MAX_LEGACY_LEN))
        .rev()
        .map(|len| &s[start + 1..start + 1 + len])
        .find(|name| table.contains_key(*name))?;
    let value = table.get(name)?;
    let len = name.len();

    if let Some(&next) = rest.get(len) {
        if next == b';' {
            return Some((Cow::Borrowed(*value), 1 + len + 1));
        }
        if in_attribute && (next == b'=' || next.is_ascii_alphanumeric()) {
            return None;
        }
    }
    Some((Cow::Borrowed(*value), 1 + len))
}
