//! Compiler and engine configuration.

use std::env::VarError;

use anyhow::{Result, bail};
use kstring::KString;

/// Tag names whose element disappears from the output when a
/// directive claims it and no other attribute is left on it.
pub const DEFAULT_CONTAINERS: &[&str] = &["ins", "div", "span"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Strip comments and collapse insignificant whitespace before
    /// lexing.
    pub compress: bool,
    /// Keep compiled templates in the engine after first use.
    pub cache: bool,
    /// Name of a template that wraps every template rendered via
    /// `Engine::render`.
    pub layout: Option<KString>,
    /// Name under which the layout sees the wrapped template.
    pub partial: KString,
    pub containers: Vec<KString>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            compress: false,
            cache: true,
            layout: None,
            partial: KString::from_static("content"),
            containers: DEFAULT_CONTAINERS.iter()
                .map(|s| KString::from_static(s)).collect(),
        }
    }
}

impl Options {
    /// The defaults, overridden by `GAIKAN_COMPRESS`, `GAIKAN_CACHE`,
    /// `GAIKAN_LAYOUT` and `GAIKAN_PARTIAL` where set.
    pub fn from_env() -> Result<Self> {
        let mut opts = Options::default();
        if let Some(v) = env_flag("GAIKAN_COMPRESS")? {
            opts.compress = v;
        }
        if let Some(v) = env_flag("GAIKAN_CACHE")? {
            opts.cache = v;
        }
        if let Some(v) = getenv("GAIKAN_LAYOUT")? {
            opts.layout = if v.is_empty() { None } else { Some(KString::from_string(v)) };
        }
        if let Some(v) = getenv("GAIKAN_PARTIAL")? {
            if v.is_empty() {
                bail!("GAIKAN_PARTIAL must not be empty");
            }
            opts.partial = KString::from_string(v);
        }
        Ok(opts)
    }

    pub fn is_container(&self, tag_name: &str) -> bool {
        self.containers.iter().any(|c| c.as_str() == tag_name)
    }
}

/// Get an env var as a String; decoding failures are reported as
/// errors.
pub fn getenv(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(s) => Ok(Some(s)),
        Err(e) => match e {
            VarError::NotPresent => Ok(None),
            VarError::NotUnicode(_) => bail!("{name:?} env var is not unicode"),
        }
    }
}

/// Get an env var as a boolean, `None` if not set.
pub fn env_flag(name: &str) -> Result<Option<bool>> {
    Ok(match getenv(name)? {
        Some(v) => Some(parse_flag(name, &v)?),
        None => None
    })
}

fn parse_flag(name: &str, v: &str) -> Result<bool> {
    match v {
        "0" | "" | "off" | "false" | "no" => Ok(false),
        "1" | "on" | "true" | "yes" => Ok(true),
        _ => bail!("{name:?} env var has invalid boolean value {v:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_parse_flag() {
        assert_eq!(parse_flag("X", "yes").unwrap(), true);
        assert_eq!(parse_flag("X", "off").unwrap(), false);
        assert_eq!(parse_flag("X", "").unwrap(), false);
        assert_eq!(parse_flag("X", "maybe").err().unwrap().to_string(),
                   "\"X\" env var has invalid boolean value \"maybe\"");
    }

    #[test]
    fn t_containers() {
        let opts = Options::default();
        assert!(opts.is_container("ins"));
        assert!(opts.is_container("div"));
        assert!(!opts.is_container("li"));
        assert_eq!(opts.partial.as_str(), "content");
    }
}
