//! The expressions found in directive values and interpolations.
//!
//! Supported: the bindings `data` (alias `this`), `parent`, `root`,
//! `key` and `length`; bare names, which are properties of `data`;
//! member access `a.b`, `a[0]`, `a['b']`, `a[b.c]`; string, number,
//! boolean, `null` and `undefined` literals; `!`; and calls of
//! `filters.name(...)` and `handlers.name(...)`.
//!
//! Parsing happens when a template is prepared for rendering, but a
//! parse error only surfaces once the expression is evaluated.

use std::borrow::Cow;
use std::sync::Arc;

use kstring::KString;
use serde_json::Value;

use crate::error::{RenderError, RenderErrorKind};
use crate::runtime::Library;
use crate::value::{js_string, truthy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Data,
    Parent,
    Root,
    Key,
    Length,
}

impl Binding {
    fn from_name(name: &str) -> Option<Binding> {
        match name {
            "data" | "this" => Some(Binding::Data),
            "parent" => Some(Binding::Parent),
            "root" => Some(Binding::Root),
            "key" => Some(Binding::Key),
            "length" => Some(Binding::Length),
            _ => None
        }
    }

    fn js_name(self) -> &'static str {
        match self {
            Binding::Data => "data",
            Binding::Parent => "parent",
            Binding::Root => "root",
            Binding::Key => "key",
            Binding::Length => "length",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Filters,
    Handlers,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Name(KString),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Undefined,
    Binding(Binding),
    Get(Box<Expr>, Member),
    Not(Box<Expr>),
    Call { table: Table, name: KString, args: Vec<Expr> },
}

/// The bindings an expression is evaluated against. Missing
/// bindings (`parent` outside of loops, for example) are `None`.
#[derive(Debug, Clone)]
pub struct Scope {
    pub root: Arc<Value>,
    pub data: Arc<Value>,
    pub parent: Option<Arc<Value>>,
    pub key: Option<Value>,
    pub length: Option<Value>,
}

impl Scope {
    pub fn new(root: Value) -> Scope {
        let root = Arc::new(root);
        Scope { data: root.clone(), root, parent: None, key: None, length: None }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

struct Parser<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.rest().chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), String> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("{c:?}")))
        }
    }

    fn unexpected(&mut self, wanted: &str) -> String {
        match self.peek() {
            Some(c) => format!("expected {wanted}, found {c:?} at offset {}", self.pos),
            None => format!("expected {wanted}, found end of expression"),
        }
    }

    fn ident(&mut self) -> Option<&'s str> {
        self.skip_ws();
        let rest = self.rest();
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, c)) if is_ident_start(c) => (),
            _ => return None
        }
        let end = chars.find(|(_, c)| !is_ident_char(*c)).map_or(rest.len(), |(i, _)| i);
        self.pos += end;
        Some(&rest[..end])
    }

    fn string(&mut self, quote: char) -> Result<Value, String> {
        self.pos += 1;
        let mut s = String::new();
        let mut chars = self.rest().char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, 'n')) => s.push('\n'),
                    Some((_, 't')) => s.push('\t'),
                    Some((_, 'r')) => s.push('\r'),
                    Some((_, c)) => s.push(c),
                    None => break
                },
                c if c == quote => {
                    self.pos += i + 1;
                    return Ok(Value::String(s))
                }
                c => s.push(c)
            }
        }
        Err("unterminated string literal".into())
    }

    fn number(&mut self) -> Result<Value, String> {
        let rest = self.rest();
        let end = rest.char_indices()
            .skip(1)
            .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
            .map_or(rest.len(), |(i, _)| i);
        let text = &rest[..end];
        self.pos += end;
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::from(i))
        }
        text.parse::<f64>().ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("invalid number {text:?}"))
    }

    fn args(&mut self) -> Result<Vec<Expr>, String> {
        self.expect('(')?;
        let mut args = Vec::new();
        if self.eat(')') {
            return Ok(args)
        }
        loop {
            args.push(self.unary()?);
            if self.eat(')') {
                return Ok(args)
            }
            self.expect(',')?;
        }
    }

    fn primary(&mut self) -> Result<Expr, String> {
        let c = match self.peek() {
            Some(c) => c,
            None => return Err(self.unexpected("an expression"))
        };
        if c == '(' {
            self.pos += 1;
            let inner = self.unary()?;
            self.expect(')')?;
            return Ok(inner)
        }
        if c == '\'' || c == '"' {
            return Ok(Expr::Literal(self.string(c)?))
        }
        let rest = self.rest();
        if c.is_ascii_digit() || (c == '-' && rest[1..].starts_with(|c: char| c.is_ascii_digit())) {
            return Ok(Expr::Literal(self.number()?))
        }
        let name = match self.ident() {
            Some(name) => name,
            None => return Err(self.unexpected("an expression"))
        };
        Ok(match name {
            "true" => Expr::Literal(Value::Bool(true)),
            "false" => Expr::Literal(Value::Bool(false)),
            "null" => Expr::Literal(Value::Null),
            "undefined" => Expr::Undefined,
            "filters" | "handlers" => {
                self.expect('.')?;
                let fname = self.ident().ok_or_else(|| self.unexpected("a function name"))?;
                let table = if name == "filters" { Table::Filters } else { Table::Handlers };
                Expr::Call { table, name: KString::from_ref(fname), args: self.args()? }
            }
            name => match Binding::from_name(name) {
                Some(b) => Expr::Binding(b),
                None => Expr::Get(Box::new(Expr::Binding(Binding::Data)),
                                  Member::Name(KString::from_ref(name))),
            }
        })
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;
        loop {
            if self.eat('.') {
                let name = self.ident().ok_or_else(|| self.unexpected("a property name"))?;
                expr = Expr::Get(Box::new(expr), Member::Name(KString::from_ref(name)));
            } else if self.eat('[') {
                let index = self.unary()?;
                self.expect(']')?;
                expr = Expr::Get(Box::new(expr), Member::Computed(Box::new(index)));
            } else {
                return Ok(expr)
            }
        }
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.eat('!') {
            Ok(Expr::Not(Box::new(self.unary()?)))
        } else {
            self.postfix()
        }
    }
}

pub fn parse(src: &str) -> Result<Expr, String> {
    let mut parser = Parser { src, pos: 0 };
    let expr = parser.unary()?;
    if parser.peek().is_some() {
        return Err(parser.unexpected("end of expression"))
    }
    Ok(expr)
}

/// A property key, after evaluating computed members.
enum Prop<'k> {
    Name(Cow<'k, str>),
    Index(usize),
}

impl<'k> Prop<'k> {
    fn from_value(v: &Value) -> Prop<'k> {
        match v {
            Value::Number(n) => match n.as_u64() {
                Some(i) => Prop::Index(i as usize),
                None => Prop::Name(Cow::Owned(js_string(v))),
            },
            v => Prop::Name(Cow::Owned(js_string(v))),
        }
    }

    fn as_str(&self) -> Cow<str> {
        match self {
            Prop::Name(s) => Cow::Borrowed(s.as_ref()),
            Prop::Index(i) => Cow::Owned(i.to_string()),
        }
    }
}

fn lookup<'a>(value: &'a Value, prop: &Prop) -> Option<Cow<'a, Value>> {
    match value {
        Value::Object(map) => map.get(prop.as_str().as_ref()).map(Cow::Borrowed),
        Value::Array(items) => match prop {
            Prop::Index(i) => items.get(*i).map(Cow::Borrowed),
            Prop::Name(s) if s == "length" => Some(Cow::Owned(Value::from(items.len()))),
            Prop::Name(s) => s.parse::<usize>().ok().and_then(|i| items.get(i)).map(Cow::Borrowed),
        },
        Value::String(s) => match prop {
            Prop::Name(n) if n == "length" => Some(Cow::Owned(Value::from(s.encode_utf16().count()))),
            Prop::Index(i) => s.chars().nth(*i).map(|c| Cow::Owned(Value::String(c.into()))),
            _ => None
        },
        _ => None
    }
}

fn member<'a>(base: Cow<'a, Value>, prop: &Prop) -> Option<Cow<'a, Value>> {
    match base {
        Cow::Borrowed(v) => lookup(v, prop),
        Cow::Owned(v) => lookup(&v, prop).map(|found| Cow::Owned(found.into_owned())),
    }
}

impl Expr {
    /// `None` means undefined. `source` is the expression text, for
    /// error messages.
    pub fn eval<'a>(&'a self, scope: &'a Scope, library: &Library, source: &str)
                    -> Result<Option<Cow<'a, Value>>, RenderError>
    {
        Ok(match self {
            Expr::Literal(v) => Some(Cow::Borrowed(v)),
            Expr::Undefined => None,
            Expr::Binding(b) => match b {
                Binding::Data => Some(Cow::Borrowed(&*scope.data)),
                Binding::Root => Some(Cow::Borrowed(&*scope.root)),
                Binding::Parent => scope.parent.as_deref().map(Cow::Borrowed),
                Binding::Key => scope.key.as_ref().map(Cow::Borrowed),
                Binding::Length => scope.length.as_ref().map(Cow::Borrowed),
            },
            Expr::Get(base, m) => {
                let base = match base.eval(scope, library, source)? {
                    Some(base) => base,
                    None => return Ok(None)
                };
                match m {
                    Member::Name(name) => member(base, &Prop::Name(Cow::Borrowed(name.as_str()))),
                    Member::Computed(index) => {
                        let prop = match index.eval(scope, library, source)? {
                            Some(v) => Prop::from_value(&v),
                            None => Prop::Name(Cow::Borrowed("undefined")),
                        };
                        member(base, &prop)
                    }
                }
            }
            Expr::Not(inner) => {
                let v = inner.eval(scope, library, source)?;
                Some(Cow::Owned(Value::Bool(!truthy(v.as_deref()))))
            }
            Expr::Call { table, name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.eval(scope, library, source)?
                                .map_or(Value::Null, Cow::into_owned));
                }
                let result = match table {
                    Table::Filters => {
                        let f = library.filter(name).ok_or_else(
                            || RenderErrorKind::UnknownFilter {
                                name: name.clone(),
                                expr: source.into(),
                            })?;
                        f(values.as_slice())
                    }
                    Table::Handlers => {
                        let h = library.handler(name).ok_or_else(
                            || RenderErrorKind::UnknownHandler(name.clone()))?;
                        match values.split_first() {
                            Some((value, rest)) => h(value, rest),
                            None => h(&Value::Null, &[]),
                        }
                    }
                };
                Some(Cow::Owned(result))
            }
        })
    }
}

/// Print as JavaScript operating on the variables of the generated
/// function.
pub fn to_js(expr: &Expr) -> String {
    match expr {
        Expr::Literal(v) => serde_json::to_string(v).unwrap_or_else(|_| "undefined".into()),
        Expr::Undefined => "undefined".into(),
        Expr::Binding(b) => b.js_name().into(),
        Expr::Get(base, Member::Name(name)) => format!("{}.{}", to_js(base), name),
        Expr::Get(base, Member::Computed(index)) =>
            format!("{}[{}]", to_js(base), to_js(index)),
        Expr::Not(inner) => format!("!{}", to_js(inner)),
        Expr::Call { table, name, args } => {
            let table = match table {
                Table::Filters => "filters",
                Table::Handlers => "handlers",
            };
            let args: Vec<String> = args.iter().map(to_js).collect();
            format!("{table}.{name}({})", args.join(", "))
        }
    }
}

/// An expression with its source text, parsed once.
#[derive(Debug, Clone)]
pub struct Compiled {
    source: String,
    parsed: Result<Expr, String>,
}

impl Compiled {
    pub fn new(source: &str) -> Compiled {
        Compiled { source: source.to_string(), parsed: parse(source) }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn eval<'a>(&'a self, scope: &'a Scope, library: &Library)
                    -> Result<Option<Cow<'a, Value>>, RenderError>
    {
        match &self.parsed {
            Ok(expr) => expr.eval(scope, library, &self.source),
            Err(msg) => Err(RenderError::expression(&self.source, msg.as_str())),
        }
    }
}

/// The JavaScript for expression text: the resolved form if it
/// parses, the text itself otherwise.
pub fn js_source(source: &str) -> String {
    match parse(source) {
        Ok(expr) => to_js(&expr),
        Err(_) => source.to_string(),
    }
}
