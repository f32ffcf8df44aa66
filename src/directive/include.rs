use crate::instructions::{Instr, State, Target};

use super::DirectiveHandler;

/// `data-include="name|data"`: render another template. Partials
/// declared inside the element are handed to it.
pub struct Include;

impl DirectiveHandler for Include {
    fn begin(&self, state: &mut State, _value: &str) {
        state.depth += 1;
        state.open(Instr::IncludeOpen);
    }

    fn end(&self, state: &mut State, value: &str) {
        state.depth = state.depth.saturating_sub(1);
        state.push(Instr::IncludeClose { target: Target::parse(value) });
    }

    fn invoke(&self, state: &mut State, value: &str) -> bool {
        state.push(Instr::IncludeInvoke { target: Target::parse(value) });
        true
    }
}
