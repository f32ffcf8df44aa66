//! From template text to the optimized instruction list: cleaning,
//! lexing, association and the emission of every element and its
//! directives.

use std::borrow::Cow;

use crate::associator::associate;
use crate::directive::{self, Claim};
use crate::instructions::{Instr, State};
use crate::lexer::{lex, Attribute, Token, TokenKind};
use crate::literal::compile_literal;
use crate::optimizer::optimize;
use crate::options::Options;
use crate::time_guard::StageTimes;
use crate::warn;

/// Remove comments (except conditional ones, `<!--[if ...]>`),
/// collapse whitespace runs into one space and drop whitespace
/// between tags.
pub fn clean(template: &str) -> String {
    let mut uncommented = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(i) = rest.find("<!--") {
        uncommented.push_str(&rest[..i]);
        let comment = &rest[i..];
        let end = comment[4..].find("-->").map(|j| j + 7).unwrap_or(comment.len());
        if comment[4..].starts_with('[') {
            uncommented.push_str(&comment[..end]);
        }
        rest = &comment[end..];
    }
    uncommented.push_str(rest);

    let mut out = String::with_capacity(uncommented.len());
    let mut chars = uncommented.chars().peekable();
    while let Some(c) = chars.next() {
        if !c.is_whitespace() {
            out.push(c);
            continue;
        }
        while chars.peek().map_or(false, |c| c.is_whitespace()) {
            chars.next();
        }
        let between_tags = out.ends_with('>') && chars.peek() == Some(&'<');
        if !between_tags {
            out.push(' ');
        }
    }
    out
}

fn is_conditional_comment(text: &str) -> bool {
    text.starts_with("<!--[")
}

/// Re-create an opening tag from the attributes left after removing
/// the directives.
fn synthesize_open_tag(token: &Token, source: &str, remaining: &[&Attribute]) -> String {
    let text = token.text(source);
    // `name` is the lower-cased spelling, same length as written
    let name = &text[1..1 + token.name.len()];
    let mut tag = format!("<{name}");
    for attribute in remaining {
        tag.push(' ');
        tag.push_str(&attribute.raw);
    }
    if text.ends_with("/>") {
        tag.push_str(" />");
    } else {
        tag.push('>');
    }
    tag
}

struct Emitter<'t> {
    source: &'t str,
    tokens: &'t [Token],
    options: &'t Options,
}

/// An element whose closing tag is still ahead.
struct Element {
    /// Index of the closing tag.
    end: usize,
    keep_tags: bool,
    /// Directives around the tags, and between them.
    outer: Vec<Claim>,
    inner: Vec<Claim>,
}

impl<'t> Emitter<'t> {
    /// Emit all tokens. Elements nest via an explicit stack, so deep
    /// markup costs no call depth.
    fn emit(&self, state: &mut State) {
        let mut open: Vec<Element> = Vec::new();
        for (i, token) in self.tokens.iter().enumerate() {
            if open.last().map_or(false, |el| el.end == i) {
                if let Some(el) = open.pop() {
                    self.close(state, el);
                }
                continue;
            }
            let text = token.text(self.source);
            match token.kind {
                TokenKind::Text | TokenKind::Doctype | TokenKind::TagClose =>
                    compile_literal(state, text),
                TokenKind::Comment => if is_conditional_comment(text) {
                    state.text(text)
                },
                TokenKind::TagOpen => {
                    let hi = open.last().map_or(self.tokens.len(), |el| el.end);
                    match token.association {
                        Some(e) if e > i && e < hi => {
                            let el = self.open(state, i, e);
                            open.push(el);
                        }
                        _ => self.lone_tag(state, i)
                    }
                }
            }
        }
    }

    /// The element's directives and its re-synthesized opening tag,
    /// `None` for the tag if it is to be dropped. `None` overall if
    /// there are no directives.
    fn claims(&self, token: &Token) -> Option<(Vec<Claim>, Option<String>)> {
        let (claims, remaining) = directive::claim(&token.attributes);
        if claims.is_empty() {
            return None
        }
        let suppressed = remaining.is_empty() && self.options.is_container(&token.name);
        let open_tag = if suppressed {
            None
        } else {
            Some(synthesize_open_tag(token, self.source, &remaining))
        };
        Some((claims, open_tag))
    }

    fn open(&self, state: &mut State, b: usize, e: usize) -> Element {
        let token = &self.tokens[b];
        let (claims, open_tag) = match self.claims(token) {
            Some(c) => c,
            None => {
                compile_literal(state, token.text(self.source));
                return Element { end: e, keep_tags: true, outer: Vec::new(), inner: Vec::new() }
            }
        };
        state.mark_element();
        let (outer, inner) = match &open_tag {
            Some(open_tag) => {
                let split = directive::split(claims, state.depth);
                compile_literal(state, open_tag);
                split
            }
            // Without tags there is nothing to go between.
            None => (claims, Vec::new())
        };
        directive::begin(state, &outer);
        state.unmark();
        directive::begin(state, &inner);
        Element { end: e, keep_tags: open_tag.is_some(), outer, inner }
    }

    fn close(&self, state: &mut State, el: Element) {
        directive::end(state, &el.inner);
        if el.keep_tags {
            compile_literal(state, self.tokens[el.end].text(self.source));
        }
        directive::end(state, &el.outer);
    }

    /// An opening tag without a closing partner: self-closing, void
    /// or unmatched.
    fn lone_tag(&self, state: &mut State, i: usize) {
        let token = &self.tokens[i];
        let (claims, open_tag) = match self.claims(token) {
            Some(c) => c,
            None => {
                compile_literal(state, token.text(self.source));
                return
            }
        };
        state.mark_element();
        directive::invoke(state, &claims, |state| {
            if let Some(open_tag) = &open_tag {
                compile_literal(state, open_tag);
            }
        });
    }
}

/// Compile a template into its optimized instruction list. Never
/// fails: markup problems are at most reported via `warn!`.
pub fn compile_instructions(template: &str, options: &Options) -> Vec<Instr> {
    let mut times = StageTimes::new("compile");
    let source: Cow<str> = if options.compress {
        Cow::Owned(times.stage("clean", || clean(template)))
    } else {
        Cow::Borrowed(template)
    };
    let mut tokens = times.stage("lex", || lex(&source));
    times.stage("associate", || associate(&mut tokens));
    let emitter = Emitter { source: &source, tokens: &tokens, options };
    let mut state = State::new();
    times.stage("emit", || emitter.emit(&mut state));
    if state.depth != 0 || !state.partials.is_empty() {
        warn!("unbalanced directive state after emission: depth {}, {} open partials",
              state.depth, state.partials.len());
    }
    let instructions = state.finish();
    times.stage("optimize", || optimize(instructions))
}
