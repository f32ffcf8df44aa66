use crate::instructions::{Instr, State};

use super::DirectiveHandler;

/// `data-each="expr"` (or `data-for`): repeat the element for every
/// item of `expr`, with `data`, `parent`, `key` and `length` bound
/// per item and restored afterwards.
pub struct Iteration;

impl DirectiveHandler for Iteration {
    fn begin(&self, state: &mut State, value: &str) {
        let frame = state.push_frame();
        state.open(Instr::EachOpen { expr: value.trim().to_string(), frame });
    }

    fn end(&self, state: &mut State, _value: &str) {
        let frame = state.pop_frame();
        state.push(Instr::EachClose { frame });
    }
}
