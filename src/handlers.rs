//! The standard handlers. All but `escape` work on the string form
//! of the value.

use pct_str::{Encoder, PctString};
use serde_json::Value;

use crate::runtime::Library;
use crate::value::js_string;

/// `& < > "` as numeric entities. Values other than strings are
/// passed through unchanged.
pub fn escape(value: &Value) -> Value {
    match value {
        Value::String(s) if s.contains(|c: char| matches!(c, '&' | '<' | '>' | '"')) => {
            let mut out = String::with_capacity(s.len() + 16);
            for c in s.chars() {
                match c {
                    '&' => out.push_str("&#38;"),
                    '<' => out.push_str("&#60;"),
                    '>' => out.push_str("&#62;"),
                    '"' => out.push_str("&#34;"),
                    c => out.push(c)
                }
            }
            Value::String(out)
        }
        value => value.clone()
    }
}

/// Whether `s` starts with an entity reference like `&amp;`.
fn is_entity(s: &str) -> bool {
    let rest = &s[1..];
    let end = rest.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    end > 0 && rest[end..].starts_with(';')
}

/// Named entities for `& < > "`, leaving existing entities alone.
pub fn html(value: &Value) -> Value {
    let s = js_string(value);
    let mut out = String::with_capacity(s.len() + 16);
    for (i, c) in s.char_indices() {
        match c {
            '&' if is_entity(&s[i..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c)
        }
    }
    Value::String(out)
}

pub fn lower(value: &Value) -> Value {
    Value::String(js_string(value).to_lowercase())
}

pub fn upper(value: &Value) -> Value {
    Value::String(js_string(value).to_uppercase())
}

pub fn nl2br(value: &Value) -> Value {
    Value::String(js_string(value).replace('\n', "<br />"))
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Upper-case the first letter of every word, lower-case the rest. A
/// word starts at a letter, digit or underscore and runs until the
/// next whitespace.
pub fn title(value: &Value) -> Value {
    let s = js_string(value);
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_whitespace() {
            in_word = false;
            out.push(c);
        } else if in_word {
            out.extend(c.to_lowercase());
        } else if is_word_char(c) {
            in_word = true;
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
    }
    Value::String(out)
}

/// Decode two-digit numeric entities like `&#39;`.
pub fn unescape(value: &Value) -> Value {
    let s = js_string(value);
    let mut out = String::with_capacity(s.len());
    let mut rest = s.as_str();
    while let Some(i) = rest.find("&#") {
        out.push_str(&rest[..i]);
        let candidate = &rest[i + 2..];
        let b = candidate.as_bytes();
        if b.len() >= 3 && b[0].is_ascii_digit() && b[1].is_ascii_digit() && b[2] == b';' {
            let code = u32::from(b[0] - b'0') * 10 + u32::from(b[1] - b'0');
            if let Some(c) = char::from_u32(code) {
                out.push(c);
            }
            rest = &candidate[3..];
        } else {
            out.push_str("&#");
            rest = candidate;
        }
    }
    out.push_str(rest);
    Value::String(out)
}

/// Everything except the characters `encodeURIComponent` leaves
/// alone.
struct UriComponent;

impl Encoder for UriComponent {
    fn encode(&self, c: char) -> bool {
        !(c.is_ascii_alphanumeric() || "-_.!~*'()".contains(c))
    }
}

pub fn url(value: &Value) -> Value {
    let s = js_string(value);
    Value::String(PctString::encode(s.chars(), UriComponent).to_string())
}

/// The standard handlers take no arguments besides the value and
/// ignore any that are passed.
pub fn install(library: &mut Library) {
    library.add_handler("escape", |v, _| escape(v));
    library.add_handler("html", |v, _| html(v));
    library.add_handler("lower", |v, _| lower(v));
    library.add_handler("upper", |v, _| upper(v));
    library.add_handler("nl2br", |v, _| nl2br(v));
    library.add_handler("title", |v, _| title(v));
    library.add_handler("unescape", |v, _| unescape(v));
    library.add_handler("url", |v, _| url(v));
}
