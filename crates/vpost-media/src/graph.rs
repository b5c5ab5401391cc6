//! Typed FFmpeg filter graph.
//!
//! Graphs are assembled from [`Filter`]s grouped into labelled
//! [`FilterChain`]s and only turned into `-filter_complex` text by
//! [`FilterGraph::render`].
//!
//! ```ignore
//! let graph = FilterGraph::new().chain(
//!     FilterChain::new()
//!         .input("1:v")
//!         .filter(Filter::new("scale").arg("1920").arg("1080"))
//!         .output("outro_scaled"),
//! );
//! assert_eq!(graph.render(), "[1:v]scale=1920:1080[outro_scaled]");
//! ```

use std::fmt;

/// One filter argument.
#[derive(Debug, Clone, PartialEq)]
enum FilterArg {
    Positional(String),
    Named(String, String),
    /// A path or other free text, quoted and escaped for the graph syntax.
    Quoted(String),
}

impl fmt::Display for FilterArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterArg::Positional(v) => write!(f, "{}", v),
            FilterArg::Named(k, v) => write!(f, "{}={}", k, v),
            FilterArg::Quoted(v) => write!(f, "'{}'", escape_filter_path(v)),
        }
    }
}

/// A single filter with its arguments, e.g. `concat=n=2:v=1:a=0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    name: String,
    args: Vec<FilterArg>,
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Add a positional argument.
    pub fn arg(mut self, value: impl ToString) -> Self {
        self.args.push(FilterArg::Positional(value.to_string()));
        self
    }

    /// Add a `key=value` argument.
    pub fn kv(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.args.push(FilterArg::Named(key.into(), value.to_string()));
        self
    }

    /// Add a quoted argument (file paths).
    pub fn quoted(mut self, value: impl Into<String>) -> Self {
        self.args.push(FilterArg::Quoted(value.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            write!(f, "{}{}", if i == 0 { "=" } else { ":" }, arg)?;
        }
        Ok(())
    }
}

/// Filters applied in sequence between input and output pads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    inputs: Vec<String>,
    filters: Vec<Filter>,
    outputs: Vec<String>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input pad label (without brackets).
    pub fn input(mut self, label: impl Into<String>) -> Self {
        self.inputs.push(label.into());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add an output pad label (without brackets).
    pub fn output(mut self, label: impl Into<String>) -> Self {
        self.outputs.push(label.into());
        self
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.inputs {
            write!(f, "[{}]", label)?;
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", filter)?;
        }
        for label in &self.outputs {
            write!(f, "[{}]", label)?;
        }
        Ok(())
    }
}

/// A complete `-filter_complex` graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    chains: Vec<FilterChain>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain(mut self, chain: FilterChain) -> Self {
        self.chains.push(chain);
        self
    }

    pub fn push(&mut self, chain: FilterChain) {
        self.chains.push(chain);
    }

    pub fn chains(&self) -> &[FilterChain] {
        &self.chains
    }

    /// Whether some chain produces `label`.
    pub fn defines(&self, label: &str) -> bool {
        self.chains
            .iter()
            .any(|c| c.outputs.iter().any(|o| o == label))
    }

    /// Render to filtergraph text.
    pub fn render(&self) -> String {
        self.chains
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Escape a path for use inside a quoted filter argument.
pub fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}
