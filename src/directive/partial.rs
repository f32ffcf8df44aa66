use crate::instructions::{Instr, State, Target};

use super::DirectiveHandler;

/// `data-partial="name|data"`. Inside an include the element's
/// content is handed to the included template as partial `name`.
/// Anywhere else the element is replaced by partial `name` of the
/// partials this template was rendered with, if there is one.
pub struct Partial;

impl DirectiveHandler for Partial {
    fn begin(&self, state: &mut State, value: &str) {
        if state.depth > 0 {
            // The body is a template of its own: partials inside it
            // are looked up, not registered.
            state.partials.push(Some(state.depth));
            state.depth = 0;
            state.open(Instr::PartialOpen { name: Target::parse(value).name });
        } else {
            state.partials.push(None);
        }
    }

    fn end(&self, state: &mut State, value: &str) {
        match state.partials.pop().flatten() {
            Some(depth) => {
                state.depth = depth;
                state.push(Instr::PartialClose);
            }
            None => {
                self.invoke(state, value);
            }
        }
    }

    fn invoke(&self, state: &mut State, value: &str) -> bool {
        state.push(Instr::PartialInvoke { target: Target::parse(value) });
        true
    }
}
