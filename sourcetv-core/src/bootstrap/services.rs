//! Service initialization and dependency injection

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::{
    cache::{CacheBackend, KeyBuilder, MemoryCache, RedisCache},
    config::CacheBackendKind,
    metadata::{MetadataLookup, TmdbClient},
    provider::{DiscoveryReport, ProviderLoader, ProviderRegistry},
    proxy::ProxyService,
    service::{HealthService, ResolutionConfig, SourceResolutionService},
    Config,
};

/// Container for all initialized services
#[derive(Clone)]
pub struct Services {
    /// Provider registry shared by resolution, health and the admin routes
    pub registry: Arc<ProviderRegistry>,
    /// Builds providers from manifests
    pub loader: Arc<ProviderLoader>,
    /// Response cache backend (memory or redis)
    pub cache: Arc<dyn CacheBackend>,
    /// Proxy token codec
    pub proxy: Arc<ProxyService>,
    /// Source resolution pipeline
    pub resolution: Arc<SourceResolutionService>,
    /// Provider reachability probes
    pub health: Arc<HealthService>,
    /// Metadata lookup (optional, requires an API key)
    pub metadata: Option<Arc<dyn MetadataLookup>>,
    /// Client for provider APIs and probes
    pub http: reqwest::Client,
    /// Client for streaming origin media (no overall request timeout)
    pub stream_http: reqwest::Client,
}

/// Initialize all core services
///
/// Providers are not registered here; see [`register_providers`].
pub fn init_services(config: &Config) -> Result<Services, anyhow::Error> {
    info!("Initializing services...");

    let http = reqwest::Client::builder()
        .user_agent(&config.proxy.user_agent)
        .timeout(Duration::from_secs(config.proxy.request_timeout_secs))
        .build()?;
    let stream_http = reqwest::Client::builder()
        .user_agent(&config.proxy.user_agent)
        .connect_timeout(Duration::from_secs(config.proxy.request_timeout_secs))
        .build()?;

    let cache: Arc<dyn CacheBackend> = match config.cache.backend {
        CacheBackendKind::Memory => {
            info!(max_entries = config.cache.memory_max_entries, "Using in-memory cache");
            Arc::new(MemoryCache::new(config.cache.memory_max_entries))
        }
        CacheBackendKind::Redis => {
            info!(
                host = %config.cache.redis.host,
                port = config.cache.redis.port,
                "Using Redis cache"
            );
            Arc::new(RedisCache::from_config(&config.cache.redis)?)
        }
    };

    let secret = match config.proxy.secret.as_deref().filter(|s| !s.is_empty()) {
        Some(secret) => secret.as_bytes().to_vec(),
        None => {
            warn!("proxy.secret is not set; using a random key, proxy URLs will not survive a restart");
            ProxyService::random_secret()
        }
    };
    let proxy = Arc::new(ProxyService::new(
        &config.public_base_url(),
        &secret,
        config.proxy.token_ttl(),
    )?);
    info!(base_url = %proxy.base_url(), "Proxy service initialized");

    let metadata = TmdbClient::from_config(&config.metadata, http.clone())
        .map(|client| Arc::new(client) as Arc<dyn MetadataLookup>);
    if metadata.is_none() {
        info!("Metadata lookup disabled (no metadata.api_key)");
    }

    let registry = Arc::new(ProviderRegistry::new());
    let loader = Arc::new(ProviderLoader::new(http.clone()));

    let mut resolution = SourceResolutionService::new(
        Arc::clone(&registry),
        Arc::clone(&cache),
        Arc::clone(&proxy),
        http.clone(),
        KeyBuilder::from_config(config),
        ResolutionConfig::from_config(config),
    );
    if let Some(metadata) = &metadata {
        resolution = resolution.with_metadata(Arc::clone(metadata));
    }

    let health = Arc::new(HealthService::new(
        Arc::clone(&registry),
        http.clone(),
        config.providers.health_timeout(),
    ));

    info!("Services initialized");

    Ok(Services {
        registry,
        loader,
        cache,
        proxy,
        resolution: Arc::new(resolution),
        health,
        metadata,
        http,
        stream_http,
    })
}

/// Register configured providers
///
/// Inline `providers.definitions` first, then the manifests found in
/// `providers.plugin_dir`; finally the ids in `providers.disabled` are
/// switched off. Load failures are reported, never fatal.
pub fn register_providers(services: &Services, config: &Config) -> DiscoveryReport {
    let mut report = services
        .registry
        .register_manifests(&config.providers.definitions, &services.loader);

    if let Some(dir) = config.providers.plugin_dir.as_deref() {
        match services.registry.discover_providers(dir, &services.loader) {
            Ok(found) => report.merge(found),
            Err(e) => warn!(dir = %dir, error = %e, "Provider discovery skipped"),
        }
    }

    for id in &config.providers.disabled {
        if let Err(e) = services.registry.disable(id) {
            warn!(provider_id = %id, error = %e, "Cannot disable provider");
        }
    }

    info!(
        registered = report.registered.len(),
        failed = report.diagnostics.len(),
        total = services.registry.len(),
        "Providers registered"
    );
    report
}
