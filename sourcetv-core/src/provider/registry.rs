// Provider Registry
//
// Copy-on-write set of provider instances with priority ordering and a
// runtime enabled flag

use parking_lot::RwLock;
use std::sync::Arc;

use super::{Provider, ProviderExt, RegistryError};
use crate::models::{ContentType, ProviderDescriptor};

/// A registered provider plus its runtime state
#[derive(Clone)]
pub struct RegisteredProvider {
    pub provider: Arc<dyn Provider>,
    pub enabled: bool,
}

impl RegisteredProvider {
    #[must_use]
    pub fn id(&self) -> &str {
        self.provider.id()
    }

    #[must_use]
    pub fn descriptor(&self) -> ProviderDescriptor {
        self.provider.descriptor(self.enabled)
    }
}

impl std::fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("id", &self.provider.id())
            .field("priority", &self.provider.priority())
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Registration policy
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterOptions {
    /// Replace an existing provider with the same id (keeps its slot)
    pub overwrite: bool,
    /// Register in the disabled state
    pub disabled: bool,
}

/// Provider registry
///
/// Holds providers in priority order (descending, registration order on
/// ties). Every mutation builds a new list and swaps it in, so readers take
/// an `Arc` snapshot and never observe a half-applied change.
pub struct ProviderRegistry {
    entries: RwLock<Arc<Vec<RegisteredProvider>>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Register a provider, rejecting duplicate ids
    pub fn register(&self, provider: Arc<dyn Provider>) -> Result<(), RegistryError> {
        self.register_with(provider, RegisterOptions::default())
    }

    pub fn register_with(
        &self,
        provider: Arc<dyn Provider>,
        options: RegisterOptions,
    ) -> Result<(), RegistryError> {
        let id = provider.id().to_string();
        let entry = RegisteredProvider {
            provider,
            enabled: !options.disabled,
        };

        self.update(|entries| {
            if let Some(pos) = entries.iter().position(|e| e.id() == id) {
                if !options.overwrite {
                    return Err(RegistryError::DuplicateProvider(id.clone()));
                }
                entries[pos] = entry;
                // Priority may have changed; stable sort keeps the slot on ties
                entries.sort_by_key(|e| std::cmp::Reverse(e.provider.priority()));
                return Ok(());
            }

            // Insert after every entry with priority >= ours
            let priority = entry.provider.priority();
            let pos = entries
                .iter()
                .position(|e| e.provider.priority() < priority)
                .unwrap_or(entries.len());
            entries.insert(pos, entry);
            Ok(())
        })?;

        tracing::info!(provider_id = %id, overwrite = options.overwrite, "Registered provider");
        Ok(())
    }

    /// Remove a provider
    pub fn unregister(&self, id: &str) -> Result<Arc<dyn Provider>, RegistryError> {
        let removed = self.update(|entries| {
            let pos = entries
                .iter()
                .position(|e| e.id() == id)
                .ok_or_else(|| RegistryError::ProviderNotFound(id.to_string()))?;
            Ok(entries.remove(pos).provider)
        })?;

        tracing::info!(provider_id = %id, "Unregistered provider");
        Ok(removed)
    }

    pub fn enable(&self, id: &str) -> Result<(), RegistryError> {
        self.set_enabled(id, true)
    }

    pub fn disable(&self, id: &str) -> Result<(), RegistryError> {
        self.set_enabled(id, false)
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), RegistryError> {
        self.update(|entries| {
            let entry = entries
                .iter_mut()
                .find(|e| e.id() == id)
                .ok_or_else(|| RegistryError::ProviderNotFound(id.to_string()))?;
            entry.enabled = enabled;
            Ok(())
        })?;

        tracing::info!(provider_id = %id, enabled, "Provider state changed");
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn Provider>> {
        self.snapshot()
            .iter()
            .find(|e| e.id() == id)
            .map(|e| Arc::clone(&e.provider))
    }

    #[must_use]
    pub fn is_enabled(&self, id: &str) -> Option<bool> {
        self.snapshot().iter().find(|e| e.id() == id).map(|e| e.enabled)
    }

    /// Enabled providers supporting `content_type`, in merge order
    #[must_use]
    pub fn get_providers_for(&self, content_type: ContentType) -> Vec<Arc<dyn Provider>> {
        self.snapshot()
            .iter()
            .filter(|e| e.enabled && e.provider.supports(content_type))
            .map(|e| Arc::clone(&e.provider))
            .collect()
    }

    /// Every registered provider, disabled ones included
    #[must_use]
    pub fn all(&self) -> Vec<Arc<dyn Provider>> {
        self.snapshot()
            .iter()
            .map(|e| Arc::clone(&e.provider))
            .collect()
    }

    #[must_use]
    pub fn list(&self) -> Vec<ProviderDescriptor> {
        self.snapshot().iter().map(RegisteredProvider::descriptor).collect()
    }

    /// Consistent point-in-time view of the registry
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<RegisteredProvider>> {
        Arc::clone(&self.entries.read())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Apply `f` to a copy of the list and publish it on success
    fn update<T>(
        &self,
        f: impl FnOnce(&mut Vec<RegisteredProvider>) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let mut guard = self.entries.write();
        let mut next = Vec::clone(&guard);
        let out = f(&mut next)?;
        *guard = Arc::new(next);
        Ok(out)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.snapshot().iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaRequest, ProviderResult};
    use crate::provider::{ProviderContext, ProviderError};
    use std::collections::BTreeSet;

    struct MockProvider {
        id: String,
        priority: i32,
        capabilities: BTreeSet<ContentType>,
    }

    fn mock(id: &str, priority: i32) -> Arc<dyn Provider> {
        Arc::new(MockProvider {
            id: id.to_string(),
            priority,
            capabilities: ContentType::ALL.into_iter().collect(),
        })
    }

    #[async_trait::async_trait]
    impl Provider for MockProvider {
        fn id(&self) -> &str {
            &self.id
        }

        fn name(&self) -> &str {
            "Mock"
        }

        fn capabilities(&self) -> BTreeSet<ContentType> {
            self.capabilities.clone()
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn movie_sources(
            &self,
            _ctx: &ProviderContext<'_>,
            _media: &MediaRequest,
        ) -> Result<ProviderResult, ProviderError> {
            Ok(ProviderResult::empty())
        }

        async fn tv_sources(
            &self,
            _ctx: &ProviderContext<'_>,
            _media: &MediaRequest,
        ) -> Result<ProviderResult, ProviderError> {
            Ok(ProviderResult::empty())
        }
    }

    fn ids(providers: &[Arc<dyn Provider>]) -> Vec<String> {
        providers.iter().map(|p| p.id().to_string()).collect()
    }

    #[test]
    fn test_priority_then_registration_order() {
        let registry = ProviderRegistry::new();
        registry.register(mock("low", 1)).unwrap();
        registry.register(mock("high", 10)).unwrap();
        registry.register(mock("mid-a", 5)).unwrap();
        registry.register(mock("mid-b", 5)).unwrap();

        assert_eq!(
            ids(&registry.get_providers_for(ContentType::Movie)),
            vec!["high", "mid-a", "mid-b", "low"]
        );
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = ProviderRegistry::new();
        registry.register(mock("alpha", 0)).unwrap();

        let err = registry.register(mock("alpha", 3)).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateProvider(id) if id == "alpha"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("alpha").unwrap().priority(), 0);
    }

    #[test]
    fn test_overwrite_keeps_slot() {
        let registry = ProviderRegistry::new();
        registry.register(mock("a", 0)).unwrap();
        registry.register(mock("b", 0)).unwrap();
        registry.register(mock("c", 0)).unwrap();

        registry
            .register_with(
                mock("a", 0),
                RegisterOptions {
                    overwrite: true,
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(ids(&registry.all()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_disabled_excluded_but_listed() {
        let registry = ProviderRegistry::new();
        registry.register(mock("a", 0)).unwrap();
        registry.register(mock("b", 0)).unwrap();

        registry.disable("a").unwrap();
        assert_eq!(ids(&registry.get_providers_for(ContentType::Tv)), vec!["b"]);
        assert_eq!(registry.all().len(), 2);
        assert_eq!(registry.is_enabled("a"), Some(false));
        assert!(!registry.list()[0].enabled);

        registry.enable("a").unwrap();
        assert_eq!(ids(&registry.get_providers_for(ContentType::Tv)), vec!["a", "b"]);

        assert!(matches!(
            registry.disable("missing"),
            Err(RegistryError::ProviderNotFound(_))
        ));
    }

    #[test]
    fn test_capability_filter() {
        let registry = ProviderRegistry::new();
        registry
            .register(Arc::new(MockProvider {
                id: "tv-only".to_string(),
                priority: 0,
                capabilities: [ContentType::Tv].into_iter().collect(),
            }))
            .unwrap();

        assert!(registry.get_providers_for(ContentType::Movie).is_empty());
        assert_eq!(registry.get_providers_for(ContentType::Tv).len(), 1);
    }

    #[test]
    fn test_snapshot_unaffected_by_later_mutation() {
        let registry = ProviderRegistry::new();
        registry.register(mock("a", 0)).unwrap();

        let snapshot = registry.snapshot();
        registry.register(mock("b", 0)).unwrap();
        registry.unregister("a").unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), "a");
        assert_eq!(ids(&registry.all()), vec!["b"]);
    }

    #[test]
    fn test_concurrent_register_and_read() {
        let registry = Arc::new(ProviderRegistry::new());

        let writers: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for j in 0..25 {
                        registry.register(mock(&format!("p{i}-{j}"), j % 3)).unwrap();
                    }
                })
            })
            .collect();

        let reader = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let providers = registry.get_providers_for(ContentType::Movie);
                    let priorities: Vec<i32> = providers.iter().map(|p| p.priority()).collect();
                    assert!(priorities.windows(2).all(|w| w[0] >= w[1]));
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();
        assert_eq!(registry.len(), 200);
    }
}
