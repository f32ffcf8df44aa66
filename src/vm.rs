//! Executes compiled templates natively: the instruction list is
//! turned into a `Program` with parsed expressions and resolved
//! block ends once, then run against JSON data.

use std::borrow::Cow;
use std::sync::Arc;

use kstring::KString;
use serde_json::Value;

use crate::compiler::compile_instructions;
use crate::error::{RenderError, RenderErrorKind};
use crate::expr::{Compiled, Scope};
use crate::instructions::{Instr, Piece, Target};
use crate::options::Options;
use crate::runtime::{Partial, Partials, Runtime};
use crate::value::{output_string, truthy};

#[derive(Debug)]
enum Part {
    Text(String),
    Variable { expr: Compiled, handlers: Vec<KString> },
}

#[derive(Debug)]
struct CompiledTarget {
    name: KString,
    data: Compiled,
}

impl From<&Target> for CompiledTarget {
    fn from(target: &Target) -> Self {
        CompiledTarget { name: KString::from_ref(&target.name), data: Compiled::new(&target.data) }
    }
}

/// Blocks (conditions, loops, includes, partials) nested deeper than
/// this are refused at render time, as they are run recursively.
pub const MAX_BLOCK_DEPTH: usize = 128;

/// `end` is the index of the matching closing op.
#[derive(Debug)]
enum Op {
    Append(Vec<Part>),
    If { cond: Compiled, end: usize },
    Each { items: Compiled, end: usize },
    Include { end: usize },
    IncludeClose(CompiledTarget),
    IncludeInvoke(CompiledTarget),
    Partial { name: KString, end: usize },
    PartialInvoke(CompiledTarget),
    Close,
}

#[derive(Debug)]
pub struct Program {
    ops: Vec<Op>,
    /// Deepest block nesting.
    depth: usize,
}

impl Program {
    pub fn new(instructions: &[Instr]) -> Program {
        let len = instructions.len();
        let mut ops = Vec::with_capacity(len);
        let mut open: Vec<usize> = Vec::new();
        let mut depth = 0;
        for (i, instr) in instructions.iter().enumerate() {
            let op = match instr {
                Instr::Append(pieces) => Op::Append(pieces.iter().map(|p| match p {
                    Piece::Text(t) => Part::Text(t.clone()),
                    Piece::Variable(v) => Part::Variable {
                        expr: Compiled::new(&v.expr),
                        handlers: v.handlers.clone(),
                    },
                }).collect()),
                Instr::IfOpen { expr } => {
                    open.push(i);
                    Op::If { cond: Compiled::new(expr), end: len }
                }
                Instr::EachOpen { expr, .. } => {
                    open.push(i);
                    Op::Each { items: Compiled::new(expr), end: len }
                }
                Instr::IncludeOpen => {
                    open.push(i);
                    Op::Include { end: len }
                }
                Instr::PartialOpen { name } => {
                    open.push(i);
                    Op::Partial { name: KString::from_ref(name), end: len }
                }
                Instr::IfClose | Instr::EachClose { .. } | Instr::PartialClose => {
                    close(&mut ops, &mut open, i);
                    Op::Close
                }
                Instr::IncludeClose { target } => {
                    close(&mut ops, &mut open, i);
                    Op::IncludeClose(target.into())
                }
                Instr::IncludeInvoke { target } => Op::IncludeInvoke(target.into()),
                Instr::PartialInvoke { target } => Op::PartialInvoke(target.into()),
            };
            ops.push(op);
            depth = depth.max(open.len());
        }
        Program { ops, depth }
    }
}

fn close(ops: &mut [Op], open: &mut Vec<usize>, at: usize) {
    if let Some(start) = open.pop() {
        match &mut ops[start] {
            Op::If { end, .. } | Op::Each { end, .. } | Op::Include { end }
            | Op::Partial { end, .. } => *end = at,
            _ => ()
        }
    }
}

/// One run of a program (or of a part of it, for partials).
struct Exec<'r> {
    program: &'r Arc<Program>,
    runtime: &'r dyn Runtime,
    /// The partials the template was rendered with.
    inputs: &'r Partials,
    /// Partials registered for the enclosing includes, innermost
    /// last.
    collectors: Vec<Partials>,
}

impl<'r> Exec<'r> {
    fn eval_owned(&self, expr: &Compiled, scope: &Scope) -> Result<Value, RenderError> {
        Ok(expr.eval(scope, self.runtime.library())?
           .map_or(Value::Null, Cow::into_owned))
    }

    fn append(&self, parts: &[Part], scope: &Scope, out: &mut String)
              -> Result<(), RenderError>
    {
        let library = self.runtime.library();
        for part in parts {
            match part {
                Part::Text(t) => out.push_str(t),
                Part::Variable { expr, handlers } => {
                    let mut value = match expr.eval(scope, library)? {
                        Some(v) if !v.is_null() => v,
                        _ => continue
                    };
                    for name in handlers {
                        let handler = library.handler(name).ok_or_else(
                            || RenderErrorKind::UnknownHandler(name.clone()))?;
                        value = Cow::Owned(handler(&*value, &[]));
                    }
                    out.push_str(&output_string(&value));
                }
            }
        }
        Ok(())
    }

    /// Items of an iteration target with their keys: array elements
    /// by index, object values by key, nothing for anything else.
    fn entries(target: Value) -> Vec<(Value, Value)> {
        match target {
            Value::Array(items) => items.into_iter().enumerate()
                .map(|(i, item)| (Value::from(i), item))
                .collect(),
            Value::Object(map) => map.into_iter()
                .map(|(k, item)| (Value::String(k), item))
                .collect(),
            _ => Vec::new()
        }
    }

    fn partial(&self, scope: &Scope, lo: usize, hi: usize) -> Partial {
        let program = Arc::clone(self.program);
        let scope = scope.clone();
        let inputs = self.inputs.clone();
        Partial::new(move |runtime, data| {
            let mut scope = scope.clone();
            scope.data = Arc::new(data.clone());
            let mut exec = Exec { program: &program, runtime, inputs: &inputs, collectors: Vec::new() };
            let mut out = String::new();
            exec.run(&mut scope, lo, hi, &mut out)?;
            Ok(out)
        })
    }

    fn run(&mut self, scope: &mut Scope, lo: usize, hi: usize, out: &mut String)
           -> Result<(), RenderError>
    {
        let program = self.program;
        let mut pc = lo;
        while pc < hi {
            match &program.ops[pc] {
                Op::Append(parts) => self.append(parts, scope, out)?,
                Op::If { cond, end } => {
                    if truthy(cond.eval(scope, self.runtime.library())?.as_deref()) {
                        self.run(scope, pc + 1, *end, out)?;
                    }
                    pc = *end;
                }
                Op::Each { items, end } => {
                    let entries = Self::entries(self.eval_owned(items, scope)?);
                    let saved = scope.clone();
                    let length = Value::from(entries.len());
                    for (key, item) in entries {
                        scope.parent = Some(saved.data.clone());
                        scope.key = Some(key);
                        scope.length = Some(length.clone());
                        scope.data = Arc::new(item);
                        self.run(scope, pc + 1, *end, out)?;
                    }
                    *scope = saved;
                    pc = *end;
                }
                Op::Include { end } => {
                    self.collectors.push(Partials::new());
                    self.run(scope, pc + 1, *end, out)?;
                    let partials = self.collectors.pop().unwrap_or_default();
                    if let Some(Op::IncludeClose(target)) = program.ops.get(*end) {
                        let data = self.eval_owned(&target.data, scope)?;
                        out.push_str(&self.runtime.render(&data, &partials, &target.name)?);
                    }
                    pc = *end;
                }
                Op::IncludeInvoke(target) => {
                    let data = self.eval_owned(&target.data, scope)?;
                    out.push_str(&self.runtime.render(&data, &Partials::new(), &target.name)?);
                }
                Op::Partial { name, end } => {
                    let partial = self.partial(scope, pc + 1, *end);
                    if let Some(collector) = self.collectors.last_mut() {
                        collector.insert(name.clone(), partial);
                    }
                    pc = *end;
                }
                Op::PartialInvoke(target) => {
                    if let Some(partial) = self.inputs.get(target.name.as_str()) {
                        let data = self.eval_owned(&target.data, scope)?;
                        out.push_str(&partial.call(self.runtime, &data)?);
                    }
                }
                Op::IncludeClose(_) | Op::Close => ()
            }
            pc += 1;
        }
        Ok(())
    }
}

/// A compiled template, ready to render any number of times.
#[derive(Debug, Clone)]
pub struct Template {
    instructions: Arc<Vec<Instr>>,
    program: Arc<Program>,
}

impl Template {
    pub fn compile(source: &str, options: &Options) -> Template {
        Template::from_instructions(compile_instructions(source, options))
    }

    pub fn from_instructions(instructions: Vec<Instr>) -> Template {
        let program = Arc::new(Program::new(&instructions));
        Template { instructions: Arc::new(instructions), program }
    }

    pub fn instructions(&self) -> &[Instr] {
        &self.instructions
    }

    /// The JavaScript function body for this template.
    pub fn to_js(&self) -> String {
        crate::js::render(&self.instructions)
    }

    pub fn render(&self, runtime: &dyn Runtime, data: &Value, partials: &Partials)
                  -> Result<String, RenderError>
    {
        if self.program.depth > MAX_BLOCK_DEPTH {
            return Err(RenderErrorKind::BlockDepth(MAX_BLOCK_DEPTH).into())
        }
        let mut scope = Scope::new(data.clone());
        let mut exec = Exec {
            program: &self.program,
            runtime,
            inputs: partials,
            collectors: Vec::new(),
        };
        let mut out = String::new();
        exec.run(&mut scope, 0, self.program.ops.len(), &mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use anyhow::Result;
    use serde_json::json;

    use super::*;
    use crate::runtime::Library;

    /// Templates by name, without caching or layouts.
    struct Templates {
        library: Library,
        templates: HashMap<&'static str, Template>,
    }

    impl Templates {
        fn new(sources: &[(&'static str, &str)]) -> Self {
            let templates = sources.iter()
                .map(|(name, s)| (*name, Template::compile(s, &Options::default())))
                .collect();
            Templates { library: Library::default(), templates }
        }
    }

    impl Runtime for Templates {
        fn library(&self) -> &Library {
            &self.library
        }

        fn render(&self, data: &Value, partials: &Partials, name: &str)
                  -> Result<String, RenderError>
        {
            match self.templates.get(name) {
                Some(t) => t.render(self, data, partials),
                None => Err(RenderErrorKind::UnknownTemplate(KString::from_ref(name)).into()),
            }
        }
    }

    fn render(source: &str, data: Value) -> Result<String, RenderError> {
        Template::compile(source, &Options::default())
            .render(&Library::default(), &data, &Partials::new())
    }

    #[test]
    fn t_literal_round_trip() -> Result<()> {
        let s = "<!DOCTYPE html>\n<html><body class=\"a\">\n<p>x < y & z</p>\n</body>";
        assert_eq!(render(s, json!({}))?, s);
        Ok(())
    }

    #[test]
    fn t_escaping() -> Result<()> {
        let data = json!({"x": "<b>\"hi\" & bye</b>"});
        assert_eq!(render("#{x}", data.clone())?,
                   "&#60;b&#62;&#34;hi&#34; &#38; bye&#60;/b&#62;");
        assert_eq!(render("!{x}", data)?, "<b>\"hi\" & bye</b>");
        Ok(())
    }

    #[test]
    fn t_handler_order() -> Result<()> {
        let mut library = Library::default();
        library.add_handler("a", |v, _| json!(format!("{}a", v.as_str().unwrap_or(""))));
        library.add_handler("lt", |v, _| json!(format!("{}<", v.as_str().unwrap_or(""))));
        let t = Template::compile("#{x|a|lt} !{x, lt, a}", &Options::default());
        assert_eq!(t.render(&library, &json!({"x": "x"}), &Partials::new())?,
                   "xa&#60; x<a");
        Ok(())
    }

    #[test]
    fn t_missing_and_null_render_empty() -> Result<()> {
        assert_eq!(render("[#{nope}][#{a.b.c}][!{n}][#{n|upper}]", json!({"n": null}))?,
                   "[][][][]");
        assert_eq!(render("#{n} #{f} #{list}", json!({"n": 0, "f": false, "list": [1, 2]}))?,
                   "0 false 1,2");
        Ok(())
    }

    #[test]
    fn t_null_renders_empty_in_both_backends() -> Result<()> {
        let t = Template::compile("[#{n}][!{n|upper}]", &Options::default());
        assert_eq!(t.render(&Library::default(), &json!({"n": null}), &Partials::new())?,
                   "[][]");
        let js = t.to_js();
        assert!(js.contains("(data.n == null ? '' : handlers.escape(data.n))"), "{js}");
        assert!(js.contains("(data.n == null ? '' : handlers.upper(data.n))"), "{js}");
        Ok(())
    }

    #[test]
    fn t_conditional() -> Result<()> {
        let t = "<div data-if=\"show\">X</div>|<p data-if=\"!show\">Y</p>";
        assert_eq!(render(t, json!({"show": true}))?, "X|");
        assert_eq!(render(t, json!({"show": 0}))?, "|<p>Y</p>");
        assert_eq!(render(t, json!({}))?, "|<p>Y</p>");
        Ok(())
    }

    #[test]
    fn t_iteration_restores_bindings() -> Result<()> {
        let t = "<ul><li data-each=\"items\">#{key}:#{data}/#{length}</li></ul>#{title}";
        assert_eq!(render(t, json!({"title": "T", "items": ["a", "b"]}))?,
                   "<ul><li>0:a/2</li><li>1:b/2</li></ul>T");
        Ok(())
    }

    #[test]
    fn t_nested_iteration() -> Result<()> {
        let t = concat!("<ins data-each=\"groups\"><b>#{name}</b>",
                        "<i data-for=\"data.items\">#{parent.name}.#{this}</i>",
                        "#{name}</ins>");
        let data = json!({"groups": [
            {"name": "g1", "items": [1, 2]},
            {"name": "g2", "items": []},
        ]});
        assert_eq!(render(t, data)?,
                   "<b>g1</b><i>g1.1</i><i>g1.2</i>g1<b>g2</b>g2");
        Ok(())
    }

    #[test]
    fn t_object_iteration_in_document_order() -> Result<()> {
        let t = "<span data-each=\"m\">#{key}=#{data};</span>";
        assert_eq!(render(t, json!({"m": {"z": 1, "a": 2}}))?, "z=1;a=2;");
        assert_eq!(render(t, json!({"m": "scalar"}))?, "");
        Ok(())
    }

    #[test]
    fn t_filters_in_directives() -> Result<()> {
        let t = concat!("<p data-if=\"filters.isEmpty(list)\">none</p>",
                        "<i data-each=\"filters.sort(list, true)\">#{data}</i>");
        assert_eq!(render(t, json!({"list": []}))?, "<p>none</p>");
        assert_eq!(render(t, json!({"list": ["a", "c", "b"]}))?, "<i>c</i><i>b</i><i>a</i>");
        Ok(())
    }

    #[test]
    fn t_include_with_partials() -> Result<()> {
        let runtime = Templates::new(&[
            ("layout", "<main><ins data-partial=\"body\"/></main><ins data-partial=\"missing\"/>"),
            ("page", concat!("<div data-include=\"layout\">",
                             "<div data-partial=\"body\">Hi #{name}</div>",
                             "</div>")),
            ("item", "<li>#{data}</li>"),
            ("list", "<ul><ins data-each=\"items\"><ins data-include=\"item\"/></ins></ul>"),
        ]);
        let page = &runtime.templates["page"];
        assert_eq!(page.render(&runtime, &json!({"name": "Ann"}), &Partials::new())?,
                   "<main>Hi Ann</main>");
        let list = &runtime.templates["list"];
        assert_eq!(list.render(&runtime, &json!({"items": [1, 2]}), &Partials::new())?,
                   "<ul><li>1</li><li>2</li></ul>");
        Ok(())
    }

    #[test]
    fn t_partial_with_data() -> Result<()> {
        let runtime = Templates::new(&[
            ("card", "<div class=\"card\"><ins data-partial=\"head|data.title\"/></div>"),
            ("page", concat!("<ins data-include=\"card|data.card\">",
                             "<b data-partial=\"head\">#{data}</b>",
                             "</ins>")),
        ]);
        let page = &runtime.templates["page"];
        assert_eq!(page.render(&runtime, &json!({"card": {"title": "T"}}), &Partials::new())?,
                   "<div class=\"card\"><b>T</b></div>");
        Ok(())
    }

    #[test]
    fn t_direct_partial() -> Result<()> {
        let t = Template::compile("[<div data-partial=\"content\">default</div>]",
                                  &Options::default());
        let library = Library::default();
        assert_eq!(t.render(&library, &json!({}), &Partials::new())?, "[default]");
        let mut partials = Partials::new();
        partials.insert(KString::from_static("content"),
                        Partial::new(|_, data| Ok(format!("<{}>", data["x"]))));
        assert_eq!(t.render(&library, &json!({"x": 1}), &partials)?, "[default<1>]");
        Ok(())
    }

    #[test]
    fn t_errors_surface_at_render() {
        let t = Template::compile("<p data-if=\"a +\">x</p>", &Options::default());
        let err = t.render(&Library::default(), &json!({}), &Partials::new()).unwrap_err();
        assert!(matches!(&*err, RenderErrorKind::Expression { expr, .. } if expr == "a +"));

        let err = render("#{x|nope}", json!({"x": 1})).unwrap_err();
        assert!(matches!(&*err, RenderErrorKind::UnknownHandler(n) if n.as_str() == "nope"));

        let err = render("<ins data-include=\"nope\"/>", json!({})).unwrap_err();
        assert!(matches!(&*err, RenderErrorKind::UnknownTemplate(n) if n.as_str() == "nope"));

        // not evaluated, hence no error
        assert_eq!(render("<p data-if=\"false\">#{a +}</p>", json!({})).unwrap(), "");
    }

    #[test]
    fn t_block_depth_limit() -> Result<()> {
        let nested = |n: usize| format!("{}x{}", "<ins data-if=\"a\">".repeat(n),
                                        "</ins>".repeat(n));
        let data = json!({"a": true});
        assert_eq!(render(&nested(MAX_BLOCK_DEPTH), data.clone())?, "x");
        let err = render(&nested(MAX_BLOCK_DEPTH + 1), data).unwrap_err();
        assert!(matches!(&*err, RenderErrorKind::BlockDepth(MAX_BLOCK_DEPTH)));
        Ok(())
    }

    #[test]
    fn t_program_block_ends() {
        let t = Template::compile("<i data-if=\"a\"><b data-each=\"b\">x</b></i>y",
                                  &Options::default());
        let ends: Vec<Option<usize>> = t.program.ops.iter().map(|op| match op {
            Op::If { end, .. } | Op::Each { end, .. } => Some(*end),
            _ => None
        }).collect();
        assert_eq!(ends, [Some(6), None, Some(4), None, None, None, None, None]);
    }
}
