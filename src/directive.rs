//! The `data-*` attributes that turn an element into control flow.
//!
//! Each directive has a begin hook, run when its element opens, an
//! end hook, run when it closes, and optionally an invoke hook, run
//! in place of both for elements without content. When an element
//! carries several directives they begin in `PRIORITY` order and end
//! in the reverse order.
//!
//! On an element whose tags are kept, conditions, loops and partial
//! registrations surround the tags, while includes and partial
//! lookups fill the element between them.

pub mod conditional;
pub mod include;
pub mod iteration;
pub mod partial;

use crate::instructions::State;
use crate::lexer::Attribute;

pub trait DirectiveHandler: Sync {
    fn begin(&self, state: &mut State, value: &str);

    fn end(&self, state: &mut State, value: &str);

    /// Handle an element that has no content. Returns false if the
    /// directive has no such form, in which case it wraps the
    /// element like any other.
    fn invoke(&self, _state: &mut State, _value: &str) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Include,
    Partial,
    Conditional,
    Iteration,
}

/// Begin order. Ends run in reverse.
pub const PRIORITY: [Directive; 4] = [
    Directive::Include,
    Directive::Partial,
    Directive::Conditional,
    Directive::Iteration,
];

impl Directive {
    /// `key` must already be lower-cased.
    pub fn from_key(key: &str) -> Option<Directive> {
        match key {
            "data-include" => Some(Directive::Include),
            "data-partial" => Some(Directive::Partial),
            "data-if" => Some(Directive::Conditional),
            "data-each" | "data-for" => Some(Directive::Iteration),
            _ => None
        }
    }

    pub fn priority(self) -> usize {
        PRIORITY.iter().position(|d| *d == self).unwrap_or(PRIORITY.len())
    }

    /// Whether the directive goes around its element's tags rather
    /// than between them. `depth` is the include depth at the element.
    pub fn wraps(self, depth: usize) -> bool {
        match self {
            Directive::Conditional | Directive::Iteration => true,
            Directive::Partial => depth > 0,
            Directive::Include => false,
        }
    }

    pub fn handler(self) -> &'static dyn DirectiveHandler {
        match self {
            Directive::Include => &include::Include,
            Directive::Partial => &partial::Partial,
            Directive::Conditional => &conditional::Conditional,
            Directive::Iteration => &iteration::Iteration,
        }
    }
}

/// A directive attribute found on an element, with its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub directive: Directive,
    pub value: String,
}

/// Separate the directive attributes of an element from the others.
/// The claims come back sorted by priority; attributes keep their
/// order.
pub fn claim(attributes: &[Attribute]) -> (Vec<Claim>, Vec<&Attribute>) {
    let mut claims = Vec::new();
    let mut remaining = Vec::new();
    for attribute in attributes {
        match Directive::from_key(&attribute.key) {
            Some(directive) => claims.push(Claim {
                directive,
                value: attribute.value.clone().unwrap_or_default(),
            }),
            None => remaining.push(attribute)
        }
    }
    claims.sort_by_key(|c| c.directive.priority());
    (claims, remaining)
}

/// Split claims into those wrapping the element and those working
/// inside it, both still in priority order.
pub fn split(claims: Vec<Claim>, depth: usize) -> (Vec<Claim>, Vec<Claim>) {
    claims.into_iter().partition(|c| c.directive.wraps(depth))
}

pub fn begin(state: &mut State, claims: &[Claim]) {
    for c in claims {
        c.directive.handler().begin(state, &c.value);
    }
}

pub fn end(state: &mut State, claims: &[Claim]) {
    for c in claims.iter().rev() {
        c.directive.handler().end(state, &c.value);
    }
}

/// For an element without content: directives that can be invoked
/// are, after the element; the rest wrap it. `emit_tag` writes the
/// element itself.
pub fn invoke(state: &mut State, claims: &[Claim], emit_tag: impl FnOnce(&mut State)) {
    let (invoking, wrapping): (Vec<&Claim>, Vec<&Claim>) = claims.iter().partition(
        |c| matches!(c.directive, Directive::Include | Directive::Partial));
    for c in &wrapping {
        c.directive.handler().begin(state, &c.value);
    }
    emit_tag(state);
    state.unmark();
    for c in &invoking {
        let invoked = c.directive.handler().invoke(state, &c.value);
        debug_assert!(invoked);
    }
    for c in wrapping.iter().rev() {
        c.directive.handler().end(state, &c.value);
    }
}
