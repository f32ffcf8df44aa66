//! Compiles HTML templates whose control flow lives in `data-*`
//! attributes (`data-if`, `data-each`, `data-include`,
//! `data-partial`) and whose values are interpolated with `#{...}`
//! (escaped) or `!{...}` (raw). Templates compile to the body of a
//! JavaScript function, or render natively against JSON data.

pub mod warn;
pub mod time_guard;
pub mod options;
pub mod error;
pub mod lexer;
pub mod associator;
pub mod instructions;
pub mod literal;
pub mod directive;
pub mod compiler;
pub mod optimizer;
pub mod expr;
pub mod value;
pub mod js;
pub mod runtime;
pub mod handlers;
pub mod filters;
pub mod vm;
pub mod engine;

pub use engine::Engine;
pub use error::{RenderError, RenderErrorKind};
pub use options::Options;
pub use runtime::{Library, Partial, Partials, Runtime};
pub use vm::Template;

/// Compile `template` into the body of a JavaScript function taking
/// `(runtime, root, inputPartials)`. With `compress`, comments and
/// insignificant whitespace are removed first.
pub fn compile(template: &str, compress: bool) -> String {
    let options = Options { compress, ..Options::default() };
    js::render(&compiler::compile_instructions(template, &options))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_compile_is_deterministic() {
        let t = "<ul>\n  <li data-each=\"items\">#{data|upper}</li>\n</ul>";
        assert_eq!(compile(t, false), compile(t, false));
        assert_ne!(compile(t, false), compile(t, true));
        assert!(compile(t, true).contains("result += '<ul>';"));
    }
}
