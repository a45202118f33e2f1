use compact_str::CompactString;
use std::collections::HashMap;
use std::num::NonZeroUsize;

/// Static settings of a [`Compiler`](super::Compiler).
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub default_element_ns: Option<CompactString>,
    pub namespaces: HashMap<CompactString, CompactString>,
    /// Replace predicates by index lookups when an oracle is available.
    pub index_rewrite: bool,
    /// Replace `descendant::` steps by child chains proven by the summary.
    pub children_rewrite: bool,
    /// Allow the staircase join; otherwise every axis path is cached.
    pub streaming: bool,
    /// Results kept per constant-rooted path; `None` disables memoization.
    pub memo_capacity: Option<NonZeroUsize>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            default_element_ns: None,
            namespaces: HashMap::new(),
            index_rewrite: true,
            children_rewrite: true,
            streaming: true,
            memo_capacity: NonZeroUsize::new(16),
        }
    }
}

impl CompileOptions {
    pub fn builder() -> CompileOptionsBuilder {
        CompileOptionsBuilder::default()
    }

    pub fn namespace(&self, prefix: &str) -> Option<&str> {
        self.namespaces.get(prefix).map(CompactString::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompileOptionsBuilder {
    opts: CompileOptions,
}

impl CompileOptionsBuilder {
    pub fn with_default_element_namespace(mut self, uri: &str) -> Self {
        self.opts.default_element_ns = Some(uri.into());
        self
    }

    pub fn with_namespace(mut self, prefix: &str, uri: &str) -> Self {
        self.opts.namespaces.insert(prefix.into(), uri.into());
        self
    }

    pub fn with_index_rewrite(mut self, on: bool) -> Self {
        self.opts.index_rewrite = on;
        self
    }

    pub fn with_children_rewrite(mut self, on: bool) -> Self {
        self.opts.children_rewrite = on;
        self
    }

    pub fn with_streaming(mut self, on: bool) -> Self {
        self.opts.streaming = on;
        self
    }

    pub fn with_memo_capacity(mut self, cap: Option<NonZeroUsize>) -> Self {
        self.opts.memo_capacity = cap;
        self
    }

    pub fn build(self) -> CompileOptions {
        self.opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let opts = CompileOptions::builder().with_namespace("p", "urn:p").with_streaming(false).build();
        assert_eq!(opts.namespace("p"), Some("urn:p"));
        assert_eq!(opts.namespace("q"), None);
        assert!(!opts.streaming);
        assert!(opts.index_rewrite && opts.children_rewrite);
        assert_eq!(opts.memo_capacity.map(NonZeroUsize::get), Some(16));
    }
}
