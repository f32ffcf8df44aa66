//! Splits literal text into text and interpolations, `#{expr}`
//! (escaped) and `!{expr}` (raw), each with an optional trailing
//! handler list separated by `|` or `,`.

use kstring::KString;

use crate::instructions::{State, Variable};

/// Finds the next interpolation at or after `from`: returns its
/// start, end (exclusive), whether it escapes, and its content.
fn next_interpolation(literal: &str, from: usize) -> Option<(usize, usize, bool, &str)> {
    let bytes = literal.as_bytes();
    let mut i = from;
    while i + 1 < bytes.len() {
        if (bytes[i] == b'#' || bytes[i] == b'!') && bytes[i + 1] == b'{' {
            let content_start = i + 2;
            if let Some(len) = literal[content_start..].find('}') {
                if len > 0 {
                    let end = content_start + len + 1;
                    return Some((i, end, bytes[i] == b'#',
                                 &literal[content_start..content_start + len]))
                }
            }
        }
        i += 1;
    }
    None
}

/// Parse the content of an interpolation.
pub fn parse_variable(content: &str, escape: bool) -> Variable {
    let (expr, handlers) = match content.find(|c| c == '|' || c == ',') {
        Some(i) => {
            let handlers = content[i + 1..]
                .split(|c| c == '|' || c == ',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(KString::from_ref)
                .collect();
            (&content[..i], handlers)
        }
        None => (content, Vec::new())
    };
    let mut handlers: Vec<KString> = handlers;
    if escape {
        handlers.push(KString::from_static("escape"));
    }
    Variable { expr: expr.trim().to_string(), handlers }
}

pub fn compile_literal(state: &mut State, literal: &str) {
    let mut pos = 0;
    while let Some((start, end, escape, content)) = next_interpolation(literal, pos) {
        if start > pos {
            state.text(&literal[pos..start]);
        }
        state.variable(parse_variable(content, escape));
        pos = end;
    }
    if pos < literal.len() {
        state.text(&literal[pos..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::{Instr, Piece};

    fn var(expr: &str, handlers: &[&str]) -> Instr {
        Instr::Append(vec![Piece::Variable(Variable {
            expr: expr.into(),
            handlers: handlers.iter().map(|s| KString::from_ref(s)).collect(),
        })])
    }

    #[test]
    fn t_parse_variable() {
        let v = parse_variable("data.name|upper, title", true);
        assert_eq!(v.expr, "data.name");
        let names: Vec<&str> = v.handlers.iter().map(|h| h.as_str()).collect();
        assert_eq!(names, ["upper", "title", "escape"]);
        let v = parse_variable("x", false);
        assert!(v.handlers.is_empty());
    }

    #[test]
    fn t_compile_literal() {
        let mut state = State::new();
        compile_literal(&mut state, "Hi #{name|upper}! Raw: !{html} #{} #{open");
        assert_eq!(state.finish(), [
            Instr::text("Hi "),
            var("name", &["upper", "escape"]),
            Instr::text("! Raw: "),
            var("html", &[]),
            Instr::text(" #{} #{open"),
        ]);
    }

    #[test]
    fn t_plain_text() {
        let mut state = State::new();
        compile_literal(&mut state, "C# {not} a variable!");
        assert_eq!(state.finish(), [Instr::text("C# {not} a variable!")]);
    }
}
