//! What a compiled template needs while rendering: the handler and
//! filter tables, other templates (for includes) and partials.

use std::collections::HashMap;
use std::sync::Arc;

use kstring::KString;
use serde_json::Value;

use crate::error::{RenderError, RenderErrorKind};

/// Transforms an interpolated value, e.g. `upper` in `#{name|upper}`.
/// The slice holds further arguments of an explicit
/// `handlers.name(value, args...)` call; interpolations pass none.
pub type Handler = Arc<dyn Fn(&Value, &[Value]) -> Value + Send + Sync>;

/// Callable from expressions as `filters.name(args...)`. Missing
/// arguments are passed as `null`.
pub type Filter = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// A piece of template handed from an including template to the
/// included one, rendered with data chosen by the latter.
#[derive(Clone)]
pub struct Partial(Arc<dyn Fn(&dyn Runtime, &Value) -> Result<String, RenderError> + Send + Sync>);

impl Partial {
    pub fn new(f: impl Fn(&dyn Runtime, &Value) -> Result<String, RenderError> + Send + Sync + 'static)
               -> Self
    {
        Partial(Arc::new(f))
    }

    pub fn call(&self, runtime: &dyn Runtime, data: &Value) -> Result<String, RenderError> {
        (self.0)(runtime, data)
    }
}

impl std::fmt::Debug for Partial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Partial(..)")
    }
}

pub type Partials = HashMap<KString, Partial>;

#[derive(Clone)]
pub struct Library {
    handlers: HashMap<KString, Handler>,
    filters: HashMap<KString, Filter>,
}

impl Library {
    /// Without any handlers or filters, not even `escape`.
    pub fn empty() -> Self {
        Library { handlers: HashMap::new(), filters: HashMap::new() }
    }

    pub fn add_handler(&mut self, name: &str,
                       f: impl Fn(&Value, &[Value]) -> Value + Send + Sync + 'static) {
        self.handlers.insert(KString::from_ref(name), Arc::new(f));
    }

    pub fn add_filter(&mut self, name: &str,
                      f: impl Fn(&[Value]) -> Value + Send + Sync + 'static) {
        self.filters.insert(KString::from_ref(name), Arc::new(f));
    }

    pub fn handler(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }

    pub fn filter(&self, name: &str) -> Option<&Filter> {
        self.filters.get(name)
    }
}

impl Default for Library {
    /// With the standard handlers and filters.
    fn default() -> Self {
        let mut library = Library::empty();
        crate::handlers::install(&mut library);
        crate::filters::install(&mut library);
        library
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut handlers: Vec<&str> = self.handlers.keys().map(|k| k.as_str()).collect();
        let mut filters: Vec<&str> = self.filters.keys().map(|k| k.as_str()).collect();
        handlers.sort();
        filters.sort();
        f.debug_struct("Library")
            .field("handlers", &handlers)
            .field("filters", &filters)
            .finish()
    }
}

/// The environment templates render in.
pub trait Runtime {
    fn library(&self) -> &Library;

    /// Render the template called `name`, on behalf of an include.
    fn render(&self, data: &Value, partials: &Partials, name: &str)
              -> Result<String, RenderError>;
}

/// A bare library as runtime: there are no other templates, every
/// include fails.
impl Runtime for Library {
    fn library(&self) -> &Library {
        self
    }

    fn render(&self, _data: &Value, _partials: &Partials, name: &str)
              -> Result<String, RenderError>
    {
        Err(RenderErrorKind::UnknownTemplate(KString::from_ref(name)).into())
    }
}
