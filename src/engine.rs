//! A registry of named templates, compiled on first use.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use kstring::KString;
use serde_json::Value;

use crate::error::{RenderError, RenderErrorKind};
use crate::options::Options;
use crate::runtime::{Library, Partial, Partials, Runtime};
use crate::vm::Template;

/// Includes nested deeper than this are taken to be a cycle.
pub const MAX_INCLUDE_DEPTH: usize = 64;

thread_local! {
    static INCLUDE_DEPTH: Cell<usize> = Cell::new(0);
}

/// Counts one level of include nesting in this thread while alive.
struct DepthGuard;

impl DepthGuard {
    fn enter() -> Result<DepthGuard, RenderError> {
        INCLUDE_DEPTH.with(|d| {
            if d.get() >= MAX_INCLUDE_DEPTH {
                Err(RenderErrorKind::IncludeDepth(MAX_INCLUDE_DEPTH).into())
            } else {
                d.set(d.get() + 1);
                Ok(DepthGuard)
            }
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        INCLUDE_DEPTH.with(|d| d.set(d.get().saturating_sub(1)))
    }
}

pub struct Engine {
    options: Options,
    library: Library,
    sources: RwLock<HashMap<KString, Arc<str>>>,
    cache: Mutex<HashMap<KString, Arc<Template>>>,
}

impl Engine {
    pub fn new(options: Options) -> Self {
        Engine::with_library(options, Library::default())
    }

    pub fn with_library(options: Options, library: Library) -> Self {
        Engine {
            options,
            library,
            sources: RwLock::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// For registering custom handlers and filters.
    pub fn library_mut(&mut self) -> &mut Library {
        &mut self.library
    }

    /// Register (or replace) the template `name`.
    pub fn add(&self, name: &str, source: &str) {
        let name = KString::from_ref(name);
        // Lock order is sources, then cache. Evicting while still
        // holding the sources lock means no compile of the old source
        // can be cached after this returns.
        let mut sources = self.sources.write().expect("die too if poisoned");
        sources.insert(name.clone(), Arc::from(source));
        self.cache.lock().expect("die too if poisoned").remove(&name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.read().expect("die too if poisoned").contains_key(name)
    }

    /// The compiled template `name`, from the cache if enabled.
    pub fn template(&self, name: &str) -> Result<Arc<Template>, RenderError> {
        if self.options.cache {
            if let Some(t) = self.cache.lock().expect("die too if poisoned").get(name) {
                return Ok(t.clone())
            }
        }
        let source = self.sources.read().expect("die too if poisoned").get(name).cloned()
            .ok_or_else(|| RenderErrorKind::UnknownTemplate(KString::from_ref(name)))?;
        let template = Arc::new(Template::compile(&source, &self.options));
        if self.options.cache {
            return Ok(self.cache_compiled(name, &source, template))
        }
        Ok(template)
    }

    /// Cache `template`, compiled from `source`, unless `name` was
    /// replaced in the meantime. If another thread compiled the same
    /// source meanwhile, theirs is kept and returned.
    fn cache_compiled(&self, name: &str, source: &Arc<str>, template: Arc<Template>)
                      -> Arc<Template>
    {
        let sources = self.sources.read().expect("die too if poisoned");
        match sources.get(name) {
            Some(current) if Arc::ptr_eq(current, source) => {
                let mut cache = self.cache.lock().expect("die too if poisoned");
                cache.entry(KString::from_ref(name)).or_insert(template).clone()
            }
            _ => template
        }
    }

    /// Render template `name`, inside the layout if one is configured.
    pub fn render(&self, name: &str, data: &Value) -> Result<String, RenderError> {
        self.render_with(name, data, &Partials::new())
    }

    pub fn render_with(&self, name: &str, data: &Value, partials: &Partials)
                       -> Result<String, RenderError>
    {
        match &self.options.layout {
            Some(layout) if layout.as_str() != name => {
                let page = self.template(name)?;
                let page_name = KString::from_ref(name);
                let page_partials = partials.clone();
                let mut layout_partials = partials.clone();
                layout_partials.insert(self.options.partial.clone(), Partial::new(
                    move |runtime, data| page.render(runtime, data, &page_partials)
                        .map_err(|e| e.in_template(&page_name))));
                Runtime::render(self, data, &layout_partials, layout)
            }
            _ => Runtime::render(self, data, partials, name)
        }
    }

    /// Compile and render a template that is not registered. It can
    /// include registered ones.
    pub fn render_source(&self, source: &str, data: &Value) -> Result<String, RenderError> {
        Template::compile(source, &self.options).render(self, data, &Partials::new())
    }
}

impl Runtime for Engine {
    fn library(&self) -> &Library {
        &self.library
    }

    fn render(&self, data: &Value, partials: &Partials, name: &str)
              -> Result<String, RenderError>
    {
        let _guard = DepthGuard::enter()?;
        self.template(name)?
            .render(self, data, partials)
            .map_err(|e| e.in_template(name))
    }
}
