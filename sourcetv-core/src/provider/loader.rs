//! Provider Loader
//!
//! Builds provider instances from manifests using factories registered per
//! manifest `kind`.

use std::collections::HashMap;
use std::sync::Arc;

use super::{HttpApiProvider, PluginProvider, Provider, ProviderError, ProviderManifest};

/// Factory function type for creating providers from a manifest
pub type ProviderFactory = Box<
    dyn Fn(&ProviderManifest, &reqwest::Client) -> Result<Arc<dyn Provider>, ProviderError>
        + Send
        + Sync,
>;

pub struct ProviderLoader {
    /// Registered factory functions (kind → factory)
    factories: HashMap<String, ProviderFactory>,
    http: reqwest::Client,
}

impl ProviderLoader {
    /// Create a loader with the built-in `http_api` and `plugin` kinds
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        let mut loader = Self::empty(http);
        loader.register_builtin_kinds();
        loader
    }

    /// Create a loader with no kinds registered
    #[must_use]
    pub fn empty(http: reqwest::Client) -> Self {
        Self {
            factories: HashMap::new(),
            http,
        }
    }

    fn register_builtin_kinds(&mut self) {
        self.register_factory(
            HttpApiProvider::KIND,
            Box::new(|manifest, http| {
                Ok(Arc::new(HttpApiProvider::from_manifest(manifest, http.clone())?)
                    as Arc<dyn Provider>)
            }),
        );

        self.register_factory(
            PluginProvider::KIND,
            Box::new(|manifest, _http| {
                Ok(Arc::new(PluginProvider::from_manifest(manifest)?) as Arc<dyn Provider>)
            }),
        );
    }

    /// Register (or replace) the factory for `kind`
    pub fn register_factory(&mut self, kind: &str, factory: ProviderFactory) {
        tracing::debug!(kind = %kind, "Registered provider factory");
        self.factories.insert(kind.to_string(), factory);
    }

    #[must_use]
    pub fn supports_kind(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    #[must_use]
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Validate a manifest and build its provider
    pub fn load(&self, manifest: &ProviderManifest) -> Result<Arc<dyn Provider>, ProviderError> {
        manifest.validate()?;

        let factory = self.factories.get(&manifest.kind).ok_or_else(|| {
            ProviderError::InvalidConfig(format!(
                "unknown provider kind '{}' (known: {})",
                manifest.kind,
                self.kinds().join(", ")
            ))
        })?;

        factory(manifest, &self.http)
    }
}

impl std::fmt::Debug for ProviderLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderLoader")
            .field("kinds", &self.kinds())
            .finish_non_exhaustive()
    }
}
