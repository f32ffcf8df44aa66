//! Renders instructions as the body of a JavaScript function
//! `(runtime, root, inputPartials)` returning the output string.
//! `runtime` provides `filters`, `handlers` and
//! `render(data, partials, name)`.

use itertools::Itertools;

use crate::expr::js_source;
use crate::instructions::{Instr, Piece, Target, Variable};

/// A single-quoted JavaScript string literal.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c)
        }
    }
    out.push('\'');
    out
}

fn variable(v: &Variable) -> String {
    let expr = js_source(&v.expr);
    let mut wrapped = expr.clone();
    for handler in &v.handlers {
        wrapped = format!("handlers.{handler}({wrapped})");
    }
    // `== null` also catches undefined
    format!("({expr} == null ? '' : {wrapped})")
}

fn render_call(target: &Target, partials: &str) -> String {
    format!("result += runtime.render({}, {partials}, {});",
            js_source(&target.data), quote(&target.name))
}

/// The lines for one instruction, each with its indentation relative
/// to the level inside the enclosing block.
fn lines(instr: &Instr) -> Vec<(i32, String)> {
    match instr {
        Instr::Append(pieces) => {
            let parts = pieces.iter().map(|p| match p {
                Piece::Text(t) => quote(t),
                Piece::Variable(v) => variable(v),
            }).join(" + ");
            vec![(0, format!("result += {parts};"))]
        }
        Instr::IfOpen { expr } => vec![(0, format!("if ({}) {{", js_source(expr)))],
        Instr::IfClose => vec![(-1, "}".into())],
        Instr::EachOpen { expr, frame: n } => vec![
            (0, format!("var t{n} = {}, d{n} = data, p{n} = parent, k{n} = key, l{n} = length;",
                        js_source(expr))),
            (0, format!("var e{n} = t{n} && typeof t{n} === 'object' ? (Array.isArray(t{n}) \
                         ? t{n}.map(function (v, i) {{ return i; }}) : Object.keys(t{n})) : [];")),
            (0, format!("for (var i{n} = 0; i{n} < e{n}.length; i{n} += 1) {{")),
            (1, format!("parent = d{n};")),
            (1, format!("key = e{n}[i{n}];")),
            (1, format!("length = e{n}.length;")),
            (1, format!("data = t{n}[key];")),
        ],
        Instr::EachClose { frame: n } => vec![
            (0, format!("data = d{n};")),
            (0, format!("parent = p{n};")),
            (0, format!("key = k{n};")),
            (0, format!("length = l{n};")),
            (-1, "}".into()),
        ],
        Instr::IncludeOpen => vec![(0, "(function (outputPartials) {".into())],
        Instr::IncludeClose { target } => vec![
            (0, render_call(target, "outputPartials")),
            (-1, "})({});".into()),
        ],
        Instr::IncludeInvoke { target } => vec![(0, render_call(target, "null"))],
        Instr::PartialOpen { name } => vec![
            (0, format!("outputPartials[{}] = function (data) {{", quote(name))),
            (1, "var result = '';".into()),
        ],
        Instr::PartialClose => vec![
            (0, "return result;".into()),
            (-1, "};".into()),
        ],
        Instr::PartialInvoke { target } => {
            let name = quote(&target.name);
            vec![(0, format!(
                "result += inputPartials && inputPartials[{name}] \
                 ? inputPartials[{name}]({}) : '';",
                js_source(&target.data)))]
        }
    }
}

pub fn render(instructions: &[Instr]) -> String {
    let mut out = String::new();
    let mut push = |level: i32, line: &str| {
        for _ in 0..level.max(0) {
            out.push('\t');
        }
        out.push_str(line);
        out.push('\n');
    };
    push(0, "var data = root;");
    push(0, "var filters = runtime.filters;");
    push(0, "var handlers = runtime.handlers;");
    push(0, "var parent, key, length;");
    push(0, "var result = '';");
    let mut level = 0;
    for instr in instructions {
        // Lines of closing instructions are relative to the body
        // they close.
        for (offset, line) in lines(instr) {
            push(level + offset, &line);
        }
        level += instr.indent();
    }
    push(0, "return result;");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_instructions;
    use crate::options::Options;

    fn js(template: &str) -> String {
        render(&compile_instructions(template, &Options::default()))
    }

    const PRELUDE: &str = "var data = root;\n\
                           var filters = runtime.filters;\n\
                           var handlers = runtime.handlers;\n\
                           var parent, key, length;\n\
                           var result = '';\n";

    #[test]
    fn t_quote() {
        assert_eq!(quote("it's a\\b\n\t\r\u{8}\u{c}"), "'it\\'s a\\\\b\\n\\t\\r\\b\\f'");
    }

    #[test]
    fn t_literal() {
        assert_eq!(js("<p>it's</p>"),
                   format!("{PRELUDE}result += '<p>it\\'s</p>';\nreturn result;\n"));
        assert_eq!(js(""), format!("{PRELUDE}return result;\n"));
    }

    #[test]
    fn t_variables() {
        assert_eq!(js("#{name|upper}!{raw}"), format!(
            "{PRELUDE}result += (data.name == null ? '' : \
             handlers.escape(handlers.upper(data.name))) + \
             (data.raw == null ? '' : data.raw);\nreturn result;\n"));
    }

    #[test]
    fn t_conditional_indents() {
        assert_eq!(js("<div data-if=\"ok\">x</div>"), format!(
            "{PRELUDE}if (data.ok) {{\n\tresult += 'x';\n}}\nreturn result;\n"));
    }

    #[test]
    fn t_iteration() {
        let out = js("<ul data-each=\"items\"></ul>");
        let expected = [
            "var t0 = data.items, d0 = data, p0 = parent, k0 = key, l0 = length;",
            "for (var i0 = 0; i0 < e0.length; i0 += 1) {",
            "\tparent = d0;",
            "\tdata = t0[key];",
            "\tresult += '<ul></ul>';",
            "\tdata = d0;",
            "\tlength = l0;",
            "}",
        ];
        let lines: Vec<&str> = out.lines().collect();
        let mut at = 0;
        for e in expected {
            at = lines[at..].iter().position(|l| *l == e)
                .map(|p| at + p)
                .unwrap_or_else(|| panic!("missing {e:?} after line {at} in:\n{out}"));
        }
    }

    #[test]
    fn t_include_and_partials() {
        let out = js(concat!("<div data-include=\"page|data.page\">",
                             "<div data-partial=\"body\">B</div></div>",
                             "<ins data-include=\"footer\"/>",
                             "<ins data-partial=\"extra\"/>"));
        assert_eq!(out, format!("{PRELUDE}{}", [
            "(function (outputPartials) {",
            "\toutputPartials['body'] = function (data) {",
            "\t\tvar result = '';",
            "\t\tresult += 'B';",
            "\t\treturn result;",
            "\t};",
            "\tresult += runtime.render(data.page, outputPartials, 'page');",
            "})({});",
            "result += runtime.render(data, null, 'footer');",
            "result += inputPartials && inputPartials['extra'] \
             ? inputPartials['extra'](data) : '';",
            "return result;",
            "",
        ].join("\n")));
    }
}
