use crate::instructions::{Instr, State};

use super::DirectiveHandler;

/// `data-if="expr"`: keep the element only if `expr` is truthy.
pub struct Conditional;

impl DirectiveHandler for Conditional {
    fn begin(&self, state: &mut State, value: &str) {
        state.open(Instr::IfOpen { expr: value.trim().to_string() });
    }

    fn end(&self, state: &mut State, _value: &str) {
        state.push(Instr::IfClose);
    }
}
