//! The intermediate instruction list and the mutable state the
//! compiler emits into.

use kstring::KString;

/// An interpolation: the raw expression text and the handlers to
/// pass its value through, in order (`escape` last for `#{...}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub expr: String,
    pub handlers: Vec<KString>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Text(String),
    Variable(Variable),
}

/// The value of an include or partial directive, `name[|dataExpr]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub data: String,
}

impl Target {
    pub fn parse(value: &str) -> Target {
        match value.split_once('|') {
            Some((name, data)) if !data.trim().is_empty() => Target {
                name: name.trim().to_string(),
                data: data.trim().to_string(),
            },
            Some((name, _)) => Target::with_default_data(name),
            None => Target::with_default_data(value),
        }
    }

    fn with_default_data(name: &str) -> Target {
        Target { name: name.trim().to_string(), data: "data".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    /// Append the concatenation of the pieces to the result.
    Append(Vec<Piece>),
    IfOpen { expr: String },
    IfClose,
    /// `frame` numbers the saved bindings, unique among the loops
    /// enclosing this one.
    EachOpen { expr: String, frame: usize },
    EachClose { frame: usize },
    /// Start collecting partials for the include closed by the
    /// matching `IncludeClose`.
    IncludeOpen,
    IncludeClose { target: Target },
    IncludeInvoke { target: Target },
    /// Register the body up to `PartialClose` as a partial of the
    /// enclosing include.
    PartialOpen { name: String },
    PartialClose,
    PartialInvoke { target: Target },
}

impl Instr {
    pub fn indent(&self) -> i32 {
        match self {
            Instr::IfOpen { .. }
            | Instr::EachOpen { .. }
            | Instr::IncludeOpen
            | Instr::PartialOpen { .. } => 1,
            Instr::IfClose
            | Instr::EachClose { .. }
            | Instr::IncludeClose { .. }
            | Instr::PartialClose => -1,
            Instr::Append(_)
            | Instr::IncludeInvoke { .. }
            | Instr::PartialInvoke { .. } => 0,
        }
    }

    pub fn text(s: impl Into<String>) -> Instr {
        Instr::Append(vec![Piece::Text(s.into())])
    }
}

/// Emission state of one compile run.
#[derive(Debug, Default)]
pub struct State {
    instructions: Vec<Instr>,
    /// Text not yet turned into an instruction.
    pending: String,
    /// Where directive instructions for the element being opened go:
    /// before its own, already emitted, opening tag fragments.
    insert: Option<usize>,
    /// Number of enclosing include scopes that can take partials.
    pub depth: usize,
    /// Per open partial directive: the include depth to restore if it
    /// registered a partial.
    pub partials: Vec<Option<usize>>,
    /// Frame numbers of the enclosing loops.
    frames: Vec<usize>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&mut self, s: &str) {
        self.pending.push_str(s);
    }

    pub fn variable(&mut self, variable: Variable) {
        self.flush();
        self.instructions.push(Instr::Append(vec![Piece::Variable(variable)]));
    }

    pub fn flush(&mut self) {
        if !self.pending.is_empty() {
            let text = std::mem::take(&mut self.pending);
            self.instructions.push(Instr::text(text));
        }
    }

    /// Enter an element boundary: what follows until `unmark` is the
    /// element's opening tag, and `open` puts directive instructions
    /// in front of it.
    pub fn mark_element(&mut self) {
        self.flush();
        self.insert = Some(self.instructions.len());
    }

    pub fn unmark(&mut self) {
        self.insert = None;
    }

    /// Emit an opening instruction at the insertion point if one is
    /// active, otherwise at the end.
    pub fn open(&mut self, instr: Instr) {
        self.flush();
        match self.insert {
            Some(at) => {
                self.instructions.insert(at, instr);
                self.insert = Some(at + 1);
            }
            None => self.instructions.push(instr)
        }
    }

    pub fn push(&mut self, instr: Instr) {
        self.flush();
        self.instructions.push(instr);
    }

    pub fn push_frame(&mut self) -> usize {
        let frame = self.frames.len();
        self.frames.push(frame);
        frame
    }

    pub fn pop_frame(&mut self) -> usize {
        // Unbalanced pops can't happen as begin and end hooks come in
        // pairs; 0 keeps the output well-formed regardless.
        self.frames.pop().unwrap_or(0)
    }

    pub fn finish(mut self) -> Vec<Instr> {
        self.flush();
        self.instructions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_target_parse() {
        assert_eq!(Target::parse("header"),
                   Target { name: "header".into(), data: "data".into() });
        assert_eq!(Target::parse("row|data.items"),
                   Target { name: "row".into(), data: "data.items".into() });
        assert_eq!(Target::parse("row|"),
                   Target { name: "row".into(), data: "data".into() });
    }

    #[test]
    fn t_open_splices_before_tag() {
        let mut state = State::new();
        state.text("before");
        state.mark_element();
        state.text("<li>");
        state.open(Instr::IfOpen { expr: "a".into() });
        state.open(Instr::EachOpen { expr: "b".into(), frame: 0 });
        state.unmark();
        state.text("</li>");
        state.push(Instr::EachClose { frame: 0 });
        state.push(Instr::IfClose);
        assert_eq!(state.finish(), [
            Instr::text("before"),
            Instr::IfOpen { expr: "a".into() },
            Instr::EachOpen { expr: "b".into(), frame: 0 },
            Instr::text("<li>"),
            Instr::text("</li>"),
            Instr::EachClose { frame: 0 },
            Instr::IfClose,
        ]);
    }

    #[test]
    fn t_no_insert_appends() {
        let mut state = State::new();
        state.text("a");
        state.open(Instr::IncludeOpen);
        assert_eq!(state.finish(), [Instr::text("a"), Instr::IncludeOpen]);
    }

    #[test]
    fn t_frames_nest() {
        let mut state = State::new();
        assert_eq!(state.push_frame(), 0);
        assert_eq!(state.push_frame(), 1);
        assert_eq!(state.pop_frame(), 1);
        assert_eq!(state.push_frame(), 1);
        assert_eq!(state.pop_frame(), 1);
        assert_eq!(state.pop_frame(), 0);
    }
}
