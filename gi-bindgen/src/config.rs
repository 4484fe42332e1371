use crate::error::{Error, Result};
use crate::names::Prefixes;

/// Generator settings for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) prefixes: Prefixes,
    pub(crate) basename: String,
    pub(crate) signal_marshal_prefix: String,
    pub(crate) headers: Vec<String>,
    pub(crate) end_headers: Vec<String>,
    pub(crate) not_implemented_func: Option<String>,
    pub(crate) allow_unstable: bool,
}

impl Config {
    /// `prefix` must end with `_`, e.g. `Tp_Svc_`.
    pub fn new(prefix: &str) -> Result<Config> {
        if !prefix.ends_with('_') {
            return Err(Error::Prefix(prefix.to_string()));
        }
        let lower = prefix.to_lowercase();
        Ok(Config {
            prefixes: Prefixes::new(prefix),
            basename: format!("{lower}ginterfaces"),
            signal_marshal_prefix: lower.trim_end_matches('_').to_string(),
            headers: vec![],
            end_headers: vec![],
            not_implemented_func: None,
            allow_unstable: false,
        })
    }

    pub fn with_basename(mut self, basename: impl Into<String>) -> Self {
        self.basename = basename.into();
        self
    }

    pub fn with_signal_marshal_prefix(mut self, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        if prefix.ends_with('_') {
            return Err(Error::MarshalPrefix(prefix));
        }
        self.signal_marshal_prefix = prefix;
        Ok(self)
    }

    /// Include `header` near the top of the body, after the generated header.
    pub fn with_include(mut self, header: &str) -> Self {
        self.headers.push(include_spelling(header));
        self
    }

    /// Include `header` at the very end of the body.
    pub fn with_include_end(mut self, header: &str) -> Self {
        self.end_headers.push(include_spelling(header));
        self
    }

    /// Call `symbol (context);` instead of returning the stock
    /// "Method not implemented" error.
    pub fn with_not_implemented_func(mut self, symbol: impl Into<String>) -> Self {
        self.not_implemented_func = Some(symbol.into()).filter(|s: &String| !s.is_empty());
        self
    }

    pub fn with_allow_unstable(mut self, allow: bool) -> Self {
        self.allow_unstable = allow;
        self
    }

    pub fn prefixes(&self) -> &Prefixes {
        &self.prefixes
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    pub fn signal_marshal_prefix(&self) -> &str {
        &self.signal_marshal_prefix
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn end_headers(&self) -> &[String] {
        &self.end_headers
    }
}

/// `foo.h` becomes `"foo.h"`; `<foo.h>` and `"foo.h"` are kept.
fn include_spelling(header: &str) -> String {
    if header.starts_with('<') || header.starts_with('"') {
        header.to_string()
    } else {
        format!("\"{header}\"")
    }
}
