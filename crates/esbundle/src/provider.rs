//! Document graph provider interface
//!
//! The bundler never parses or fetches anything itself. A provider resolves
//! import specifiers to [`DocumentUrl`]s and loads the parsed form of a
//! document. [`InMemoryProvider`] is a map-backed implementation used by tests,
//! benches and embedders that have already analyzed their sources.

use anyhow::{Result, anyhow};

use crate::{
    ast::ParsedModule,
    types::FxIndexMap,
    url::{DocumentUrl, is_relative_specifier},
};

/// Source of documents and edge resolution for one bundling run
pub trait DocumentGraphProvider {
    /// Resolve `specifier` as written in `from`, or `None` if it names nothing
    fn resolve(&self, specifier: &str, from: &DocumentUrl) -> Option<DocumentUrl>;

    /// Load the parsed form of a resolved document
    fn load(&self, url: &DocumentUrl) -> Result<ParsedModule>;
}

impl<P: DocumentGraphProvider + ?Sized> DocumentGraphProvider for &P {
    fn resolve(&self, specifier: &str, from: &DocumentUrl) -> Option<DocumentUrl> {
        (**self).resolve(specifier, from)
    }

    fn load(&self, url: &DocumentUrl) -> Result<ParsedModule> {
        (**self).load(url)
    }
}

/// Provider backed by already-parsed modules keyed by URL
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    modules: FxIndexMap<DocumentUrl, ParsedModule>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module, replacing any previous module at the same URL
    pub fn add(&mut self, url: impl Into<DocumentUrl>, module: ParsedModule) -> &mut Self {
        self.modules.insert(url.into(), module);
        self
    }

    #[must_use]
    pub fn with(mut self, url: impl Into<DocumentUrl>, module: ParsedModule) -> Self {
        self.add(url, module);
        self
    }

    pub fn contains(&self, url: &DocumentUrl) -> bool {
        self.modules.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl DocumentGraphProvider for InMemoryProvider {
    fn resolve(&self, specifier: &str, from: &DocumentUrl) -> Option<DocumentUrl> {
        let url = if is_relative_specifier(specifier) || specifier.starts_with('/') {
            from.join(specifier)
        } else {
            DocumentUrl::new(specifier)
        };
        if self.modules.contains_key(&url) {
            Some(url)
        } else {
            log::trace!("'{specifier}' from {from} does not name a registered module");
            None
        }
    }

    fn load(&self, url: &DocumentUrl) -> Result<ParsedModule> {
        self.modules
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("no module registered at {url}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_resolution() {
        let provider = InMemoryProvider::new()
            .with("src/a.js", ParsedModule::default())
            .with("src/lib/b.js", ParsedModule::default())
            .with("vendor.js", ParsedModule::default());

        let a = DocumentUrl::new("src/a.js");
        assert_eq!(
            provider.resolve("./lib/b.js", &a),
            Some(DocumentUrl::new("src/lib/b.js"))
        );
        assert_eq!(
            provider.resolve("../vendor.js", &a),
            Some(DocumentUrl::new("vendor.js"))
        );
        assert_eq!(
            provider.resolve("vendor.js", &a),
            Some(DocumentUrl::new("vendor.js"))
        );
        assert_eq!(provider.resolve("./missing.js", &a), None);
    }

    #[test]
    fn test_load_unknown_module_fails() {
        let provider = InMemoryProvider::new();
        let err = provider
            .load(&DocumentUrl::new("nope.js"))
            .expect_err("unknown module should not load");
        assert!(err.to_string().contains("nope.js"));
    }
}
