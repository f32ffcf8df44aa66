//! Splits template text into tokens: runs of text and whole tags
//! (opening, closing, comments, doctype). Byte offsets of every
//! token are kept, concatenating all token spans gives back the
//! input.

use kstring::KString;

/// Elements that never have content, even when written without
/// `/>`.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link",
    "meta", "param", "source", "track", "wbr",
];

/// Elements whose content is opaque text at the tag level.
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    TagOpen,
    TagClose,
    Comment,
    Doctype,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lower-cased.
    pub key: KString,
    /// Without the surrounding quotes; `None` for boolean-style
    /// attributes.
    pub value: Option<String>,
    pub quote: Option<char>,
    /// Whether the value's terminating quote was actually present.
    pub has_end_quote: bool,
    /// The attribute exactly as written.
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    /// Lower-cased, empty for non-tag kinds.
    pub name: KString,
    pub attributes: Vec<Attribute>,
    pub is_standalone: bool,
    /// Index of the matching token, set by the associator.
    pub association: Option<usize>,
}

impl Token {
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.start..self.end]
    }

    pub fn is_tag(&self) -> bool {
        matches!(self.kind, TokenKind::TagOpen | TokenKind::TagClose)
    }

    /// Turn into plain text, dropping the tag metadata.
    pub fn textify(&mut self) {
        self.kind = TokenKind::Text;
        self.name = KString::from_static("");
        self.attributes.clear();
        self.is_standalone = false;
        self.association = None;
    }
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

/// What kind of markup starts at `i` (which holds a `<`), if any.
fn markup_start(bytes: &[u8], i: usize) -> Option<TokenKind> {
    let rest = &bytes[i..];
    if rest.starts_with(b"<!--") {
        Some(TokenKind::Comment)
    } else if rest.len() >= 9 && rest[..9].eq_ignore_ascii_case(b"<!doctype") {
        Some(TokenKind::Doctype)
    } else if rest.len() >= 3 && rest[1] == b'/' && is_name_start(rest[2]) {
        Some(TokenKind::TagClose)
    } else if rest.len() >= 2 && is_name_start(rest[1]) {
        Some(TokenKind::TagOpen)
    } else {
        None
    }
}

/// The end (exclusive) of the element starting at `from`: after the
/// first `>` outside of quotes, or after `-->` for comments. Runs to
/// the end of the input if unterminated.
fn element_end(bytes: &[u8], from: usize, kind: TokenKind) -> usize {
    if kind == TokenKind::Comment {
        let mut i = from + 4;
        while i + 3 <= bytes.len() {
            if &bytes[i..i + 3] == b"-->" {
                return i + 3
            }
            i += 1;
        }
        return bytes.len()
    }
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate().skip(from + 1) {
        match quote {
            Some(q) => if b == q {
                quote = None
            },
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' => return i + 1,
                _ => ()
            }
        }
    }
    bytes.len()
}

/// Split the interior of an opening tag on unquoted whitespace,
/// except around an `=` (`key = "value"` is one attribute).
fn split_attributes(interior: &str) -> Vec<Attribute> {
    let mut attributes = Vec::new();
    let mut quote: Option<char> = None;
    let mut chunk_start: Option<usize> = None;
    // Where the current chunk ends, unless the whitespace from there
    // on turns out to precede or follow an `=`.
    let mut gap: Option<usize> = None;
    fn push(chunk: &str, attributes: &mut Vec<Attribute>) {
        if chunk != "/" {
            attributes.push(parse_attribute(chunk));
        }
    }
    for (i, c) in interior.char_indices() {
        if quote.is_none() && c.is_whitespace() {
            if chunk_start.is_some() && gap.is_none() {
                gap = Some(i);
            }
            continue;
        }
        if let (Some(s), Some(g)) = (chunk_start, gap.take()) {
            if c != '=' && !interior[s..g].ends_with('=') {
                push(&interior[s..g], &mut attributes);
                chunk_start = None;
            }
        }
        if chunk_start.is_none() {
            chunk_start = Some(i);
        }
        match quote {
            Some(q) => if c == q {
                quote = None
            },
            None => if c == '"' || c == '\'' {
                quote = Some(c)
            }
        }
    }
    if let Some(s) = chunk_start {
        push(&interior[s..gap.unwrap_or(interior.len())], &mut attributes);
    }
    attributes
}

/// Split one `key=value` chunk on the first `=`, stripping one layer
/// of quotes from the value. A missing end quote is tolerated.
pub fn parse_attribute(chunk: &str) -> Attribute {
    let raw = chunk.to_string();
    match chunk.find('=') {
        None => Attribute {
            key: KString::from_string(chunk.to_ascii_lowercase()),
            value: None,
            quote: None,
            has_end_quote: false,
            raw,
        },
        Some(i) => {
            let key = KString::from_string(chunk[..i].trim().to_ascii_lowercase());
            let mut value = chunk[i + 1..].trim_start();
            let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'');
            let mut has_end_quote = false;
            if let Some(q) = quote {
                value = &value[1..];
                if value.ends_with(q) {
                    value = &value[..value.len() - 1];
                    has_end_quote = true;
                }
            }
            Attribute { key, value: Some(value.to_string()), quote, has_end_quote, raw }
        }
    }
}

fn tag_token(source: &str, start: usize, end: usize, kind: TokenKind) -> Token {
    let text = &source[start..end];
    let bytes = text.as_bytes();
    let name_start = if kind == TokenKind::TagClose { 2 } else { 1 };
    let mut name_end = name_start;
    while name_end < bytes.len() && is_name_char(bytes[name_end]) {
        name_end += 1;
    }
    let name = KString::from_string(text[name_start..name_end].to_ascii_lowercase());
    let closed = text.ends_with('>');
    let mut token = Token {
        kind, start, end, name,
        attributes: Vec::new(),
        is_standalone: false,
        association: None,
    };
    if name_end == name_start || !closed {
        // Not a usable tag after all (e.g. unterminated at the end of
        // the input).
        token.textify();
        return token
    }
    if kind == TokenKind::TagOpen {
        let interior_end = if text.ends_with("/>") && text.len() - 2 >= name_end {
            text.len() - 2
        } else {
            text.len() - 1
        };
        let interior = &text[name_end..interior_end];
        token.attributes = split_attributes(interior);
        token.is_standalone = text.ends_with("/>")
            || VOID_ELEMENTS.contains(&token.name.as_str());
    }
    token
}

fn push_text(tokens: &mut Vec<Token>, start: usize, end: usize) {
    if start < end {
        tokens.push(Token {
            kind: TokenKind::Text, start, end,
            name: KString::from_static(""),
            attributes: Vec::new(),
            is_standalone: false,
            association: None,
        });
    }
}

/// Position of the next `</name` (case-insensitively) from `from`.
fn find_closing(bytes: &[u8], from: usize, name: &str) -> Option<usize> {
    let needle_len = name.len() + 2;
    (from..bytes.len()).find(|&i| {
        i + needle_len <= bytes.len()
            && bytes[i] == b'<'
            && bytes[i + 1] == b'/'
            && bytes[i + 2..i + needle_len].eq_ignore_ascii_case(name.as_bytes())
    })
}

pub fn lex(source: &str) -> Vec<Token> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut from = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'<' {
            if let Some(kind) = markup_start(bytes, i) {
                push_text(&mut tokens, from, i);
                let end = element_end(bytes, i, kind);
                let token = match kind {
                    TokenKind::TagOpen | TokenKind::TagClose =>
                        tag_token(source, i, end, kind),
                    _ => Token {
                        kind, start: i, end,
                        name: KString::from_static(""),
                        attributes: Vec::new(),
                        is_standalone: false,
                        association: None,
                    }
                };
                let raw_text = token.kind == TokenKind::TagOpen
                    && !token.is_standalone
                    && RAW_TEXT_ELEMENTS.contains(&token.name.as_str());
                let name = token.name.clone();
                tokens.push(token);
                from = end;
                i = end;
                if raw_text {
                    // Skip to the closing tag, leaving the content as
                    // one run of text.
                    i = find_closing(bytes, end, &name).unwrap_or(bytes.len());
                }
                continue;
            }
        }
        i += 1;
    }
    push_text(&mut tokens, from, bytes.len());
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn t_spans_cover_input() {
        let s = "<!DOCTYPE html>\n<p class=\"a\">x < y</p><!-- c --> tail";
        let tokens = lex(s);
        let joined: String = tokens.iter().map(|t| t.text(s)).collect();
        assert_eq!(joined, s);
        use TokenKind::*;
        assert_eq!(kinds(&tokens),
                   [Doctype, Text, TagOpen, Text, TagClose, Comment, Text]);
        assert_eq!(tokens[3].text(s), "x < y");
    }

    #[test]
    fn t_quoted_gt_does_not_end_tag() {
        let s = "<a title='1 > 0' href=\"x\">link</a>";
        let tokens = lex(s);
        assert_eq!(tokens[0].text(s), "<a title='1 > 0' href=\"x\">");
        assert_eq!(tokens[0].attributes.len(), 2);
        assert_eq!(tokens[0].attributes[0].value.as_deref(), Some("1 > 0"));
        assert_eq!(tokens[0].attributes[0].quote, Some('\''));
    }

    #[test]
    fn t_attributes() {
        let tokens = lex("<INPUT Disabled data-If=\"!x\" value=unquoted>");
        let t = &tokens[0];
        assert_eq!(t.name.as_str(), "input");
        assert!(t.is_standalone);
        let keys: Vec<&str> = t.attributes.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, ["disabled", "data-if", "value"]);
        assert_eq!(t.attributes[0].value, None);
        assert_eq!(t.attributes[1].value.as_deref(), Some("!x"));
        assert_eq!(t.attributes[1].raw, "data-If=\"!x\"");
        assert_eq!(t.attributes[2].value.as_deref(), Some("unquoted"));
        assert_eq!(t.attributes[2].quote, None);
    }

    #[test]
    fn t_spaces_around_equals() {
        let tokens = lex("<div data-if = \"x\" class= 'c'  id =y hidden>");
        let t = &tokens[0];
        let keys: Vec<&str> = t.attributes.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, ["data-if", "class", "id", "hidden"]);
        let values: Vec<Option<&str>> = t.attributes.iter().map(|a| a.value.as_deref()).collect();
        assert_eq!(values, [Some("x"), Some("c"), Some("y"), None]);
        assert_eq!(t.attributes[0].raw, "data-if = \"x\"");
        assert!(t.attributes[1].has_end_quote);
    }

    #[test]
    fn t_missing_end_quote_is_permitted() {
        let a = parse_attribute("title=\"open");
        assert_eq!(a.value.as_deref(), Some("open"));
        assert_eq!(a.quote, Some('"'));
        assert!(!a.has_end_quote);
        let a = parse_attribute("title=\"closed\"");
        assert!(a.has_end_quote);
    }

    #[test]
    fn t_self_closing() {
        let s = "<ins data-include=\"header\" /><br>";
        let tokens = lex(s);
        assert!(tokens[0].is_standalone);
        assert_eq!(tokens[0].attributes.len(), 1);
        assert!(tokens[1].is_standalone);
        let tokens = lex("<ins data-include=\"footer\"/>");
        assert_eq!(tokens[0].attributes[0].value.as_deref(), Some("footer"));
        assert!(tokens[0].attributes[0].has_end_quote);
    }

    #[test]
    fn t_stray_brackets_are_text() {
        let s = "1 < 2 and 3 > 2, <> < /x";
        let tokens = lex(s);
        assert_eq!(kinds(&tokens), [TokenKind::Text]);
    }

    #[test]
    fn t_unterminated_tag_is_text() {
        let s = "abc <div class=\"x\"";
        let tokens = lex(s);
        assert_eq!(kinds(&tokens), [TokenKind::Text, TokenKind::Text]);
        assert_eq!(tokens[1].text(s), "<div class=\"x\"");
    }

    #[test]
    fn t_script_content_is_one_text() {
        let s = "<SCRIPT>if (a<b) { x = '<div>'; }</script>";
        let tokens = lex(s);
        use TokenKind::*;
        assert_eq!(kinds(&tokens), [TagOpen, Text, TagClose]);
        assert_eq!(tokens[1].text(s), "if (a<b) { x = '<div>'; }");
    }

    #[test]
    fn t_comment_with_gt() {
        let s = "<!-- a > b -->x";
        let tokens = lex(s);
        assert_eq!(kinds(&tokens), [TokenKind::Comment, TokenKind::Text]);
        assert_eq!(tokens[0].text(s), "<!-- a > b -->");
    }
}
