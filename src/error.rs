//! Errors happening while a compiled template is rendered. The
//! compiler itself never fails; anything wrong with an expression
//! or a template reference only shows up here.

use kstring::KString;

#[derive(thiserror::Error, Debug)]
pub enum RenderErrorKind {
    #[error("invalid expression {expr:?}: {msg}")]
    Expression { expr: String, msg: String },
    #[error("unknown handler \"{0}\"")]
    UnknownHandler(KString),
    #[error("unknown filter \"{name}\" in {expr:?}")]
    UnknownFilter { name: KString, expr: String },
    #[error("unknown template \"{0}\"")]
    UnknownTemplate(KString),
    #[error("includes nested too deeply (more than {0} levels)")]
    IncludeDepth(usize),
    #[error("directives nested too deeply (more than {0} levels)")]
    BlockDepth(usize),
    #[error("in template \"{name}\": {err}")]
    InTemplate { name: KString, err: RenderError },
}

/// Wrapper around a `Box<RenderErrorKind>`, to keep the `Result`s
/// of the render path small. Derefs to the kind, and anything that
/// converts into the kind converts into this, too.
#[derive(Debug)]
pub struct RenderError(Box<RenderErrorKind>);

impl std::ops::Deref for RenderError {
    type Target = RenderErrorKind;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl<E> From<E> for RenderError where RenderErrorKind: From<E> {
    fn from(err: E) -> Self {
        RenderError(Box::new(RenderErrorKind::from(err)))
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&*self.0, f)
    }
}

impl RenderError {
    pub fn expression(expr: &str, msg: impl Into<String>) -> Self {
        RenderErrorKind::Expression { expr: expr.into(), msg: msg.into() }.into()
    }

    /// Attach the name of the template the error happened in.
    pub fn in_template(self, name: &str) -> Self {
        RenderErrorKind::InTemplate { name: KString::from_ref(name), err: self }.into()
    }
}
