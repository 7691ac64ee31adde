use std::collections::HashMap;

/// Static evaluation context: namespace prefix bindings used to resolve
/// prefixed name tests. Fixed at compile time and embedded into every
/// [`crate::query::CompiledPath`].
#[derive(Debug, Clone, Default)]
pub struct StaticContext {
    namespaces: HashMap<String, String>,
}

impl StaticContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }

    pub fn namespace_uri(&self, prefix: &str) -> Option<&str> {
        self.namespaces.get(prefix).map(String::as_str)
    }
}
