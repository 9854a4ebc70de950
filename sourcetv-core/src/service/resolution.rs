//! Source resolution service
//!
//! Cache lookup, concurrent provider fan-out with per-provider timeouts,
//! deterministic merge and cache write-back.

use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

use crate::cache::{CacheBackend, CacheError, KeyBuilder};
use crate::config::Config;
use crate::metadata::MetadataLookup;
use crate::models::{
    Diagnostic, DiagnosticCode, MediaRequest, ProviderResult, Source, SourceResponse, Subtitle,
};
use crate::provider::{fetch_sources, Provider, ProviderContext, ProviderRegistry};
use crate::proxy::{HeaderMapping, ProxyError, ProxyService};
use crate::Result;

#[derive(Debug, Clone)]
pub struct ResolutionConfig {
    /// Upper bound for a single provider call
    pub provider_timeout: Duration,
    pub sources_ttl: Duration,
    pub subtitles_ttl: Duration,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(10),
            sources_ttl: Duration::from_secs(3_600),
            subtitles_ttl: Duration::from_secs(86_400),
        }
    }
}

impl ResolutionConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            provider_timeout: config.providers.timeout(),
            sources_ttl: Duration::from_secs(config.cache.ttl.sources_secs),
            subtitles_ttl: Duration::from_secs(config.cache.ttl.subtitles_secs),
        }
    }
}

/// Value stored under the sources key
///
/// Entries hold origin URLs, never proxy tokens. Every hit signs them again,
/// so cached results keep working after a key change or token expiry.
#[derive(Debug, Serialize, Deserialize)]
struct CachedSources {
    sources: Vec<CachedSource>,
    diagnostics: Vec<Diagnostic>,
    /// A subtitles entry was written alongside
    has_subtitles: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedSource {
    /// `url` is the origin URL
    #[serde(flatten)]
    source: Source,
    #[serde(default)]
    headers: HeaderMapping,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedSubtitle {
    #[serde(flatten)]
    subtitle: Subtitle,
    #[serde(default)]
    headers: HeaderMapping,
}

pub struct SourceResolutionService {
    registry: Arc<ProviderRegistry>,
    cache: Arc<dyn CacheBackend>,
    proxy: Arc<ProxyService>,
    http: reqwest::Client,
    keys: KeyBuilder,
    metadata: Option<Arc<dyn MetadataLookup>>,
    config: ResolutionConfig,
}

impl SourceResolutionService {
    #[must_use]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        cache: Arc<dyn CacheBackend>,
        proxy: Arc<ProxyService>,
        http: reqwest::Client,
        keys: KeyBuilder,
        config: ResolutionConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            proxy,
            http,
            keys,
            metadata: None,
            config,
        }
    }

    /// Fill missing title/year hints from `metadata` before fan-out
    #[must_use]
    pub fn with_metadata(mut self, metadata: Arc<dyn MetadataLookup>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    /// Resolve sources and subtitles for `request`
    ///
    /// Only a malformed request is an error. Provider and cache failures end
    /// up as diagnostics on an otherwise successful response.
    pub async fn resolve(&self, request: &MediaRequest) -> Result<SourceResponse> {
        request.validate()?;

        let fingerprint = request.fingerprint();
        let started = Instant::now();
        let mut cache_failure: Option<CacheError> = None;

        match self.read_cache(request).await {
            Ok(Some(hit)) => {
                tracing::debug!(fingerprint = %fingerprint, "Resolution served from cache");
                return Ok(hit);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(fingerprint = %fingerprint, backend = self.cache.name(), error = %e, "Cache read failed");
                cache_failure = Some(e);
            }
        }

        let request = self.enrich(request).await;
        let providers = self.registry.get_providers_for(request.content_type);

        let merged = if providers.is_empty() {
            ProviderResult::with_diagnostic(Diagnostic::warn(
                DiagnosticCode::NoProvidersAvailable,
                format!("No enabled provider supports {}", request.content_type),
            ))
        } else {
            let calls = providers
                .iter()
                .map(|provider| self.call_provider(Arc::clone(provider), &request, &fingerprint));
            let results = join_all(calls).await;
            merge(&providers, results)
        };

        if !merged.is_empty() {
            if let Err(e) = self.write_cache(&request, &merged).await {
                tracing::warn!(fingerprint = %fingerprint, backend = self.cache.name(), error = %e, "Cache write failed");
                cache_failure.get_or_insert(e);
            }
        }

        tracing::info!(
            fingerprint = %fingerprint,
            request = %request.identity(),
            providers = providers.len(),
            sources = merged.sources.len(),
            subtitles = merged.subtitles.len(),
            diagnostics = merged.diagnostics.len(),
            elapsed_ms = millis(started.elapsed()),
            "Resolved sources"
        );

        let mut response = SourceResponse {
            sources: merged.sources,
            subtitles: merged.subtitles,
            diagnostics: merged.diagnostics,
            cached: false,
        };
        if let Some(e) = cache_failure {
            response.diagnostics.push(Diagnostic::warn(
                DiagnosticCode::CacheUnavailable,
                format!("{} cache unavailable: {e}", self.cache.name()),
            ));
        }
        Ok(response)
    }

    /// One provider call, isolated from every other
    ///
    /// Timeouts, errors and panics all come back as a diagnostic; the call is
    /// dropped (cancelled) when its timeout fires.
    async fn call_provider(
        &self,
        provider: Arc<dyn Provider>,
        request: &MediaRequest,
        fingerprint: &str,
    ) -> ProviderResult {
        let id = provider.id().to_string();
        let span = tracing::info_span!("provider", provider_id = %id, fingerprint = %fingerprint);

        let result = async {
            let ctx = ProviderContext::new(&self.proxy, &self.http).with_fingerprint(fingerprint);
            let started = Instant::now();
            let call = AssertUnwindSafe(fetch_sources(provider.as_ref(), &ctx, request)).catch_unwind();

            let outcome = tokio::time::timeout(self.config.provider_timeout, call).await;
            let elapsed_ms = millis(started.elapsed());

            match outcome {
                Ok(Ok(Ok(mut result))) => {
                    tracing::debug!(
                        elapsed_ms,
                        sources = result.sources.len(),
                        subtitles = result.subtitles.len(),
                        "Provider answered"
                    );
                    if result.is_empty() && result.diagnostics.is_empty() {
                        result.diagnostics.push(
                            Diagnostic::info(
                                DiagnosticCode::ProviderEmpty,
                                format!("{} found no sources", provider.name()),
                            )
                            .with_field(id.clone()),
                        );
                    }
                    result
                }
                Ok(Ok(Err(e))) => {
                    tracing::warn!(elapsed_ms, error = %e, "Provider failed");
                    ProviderResult::with_diagnostic(
                        Diagnostic::error(
                            DiagnosticCode::ProviderError,
                            format!("{} failed: {e}", provider.name()),
                        )
                        .with_field(id.clone()),
                    )
                }
                Ok(Err(panic)) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(elapsed_ms, panic = %message, "Provider panicked");
                    ProviderResult::with_diagnostic(
                        Diagnostic::error(
                            DiagnosticCode::ProviderPanic,
                            format!("{} panicked: {message}", provider.name()),
                        )
                        .with_field(id.clone()),
                    )
                }
                Err(_) => {
                    tracing::warn!(
                        timeout_ms = millis(self.config.provider_timeout),
                        "Provider timed out"
                    );
                    ProviderResult::with_diagnostic(
                        Diagnostic::error(
                            DiagnosticCode::ProviderTimeout,
                            format!(
                                "{} timed out after {}ms",
                                provider.name(),
                                self.config.provider_timeout.as_millis()
                            ),
                        )
                        .with_field(id.clone()),
                    )
                }
            }
        }
        .instrument(span)
        .await;

        self.ensure_proxied(&id, result)
    }

    /// Wrap any raw origin URL a provider let through
    fn ensure_proxied(&self, provider_id: &str, mut result: ProviderResult) -> ProviderResult {
        let no_headers = HeaderMapping::new();
        let mut dropped = 0usize;

        result.sources.retain_mut(|source| {
            if self.proxy.is_proxy_url(&source.url) {
                return true;
            }
            match self.proxy.create_proxy_url(&source.url, &no_headers) {
                Ok(url) => {
                    source.url = url;
                    true
                }
                Err(_) => {
                    dropped += 1;
                    false
                }
            }
        });
        result.subtitles.retain_mut(|subtitle| {
            if self.proxy.is_proxy_url(&subtitle.url) {
                return true;
            }
            match self.proxy.create_proxy_url(&subtitle.url, &no_headers) {
                Ok(url) => {
                    subtitle.url = url;
                    true
                }
                Err(_) => {
                    dropped += 1;
                    false
                }
            }
        });

        if dropped > 0 {
            result.diagnostics.push(
                Diagnostic::warn(
                    DiagnosticCode::ProviderError,
                    format!("Dropped {dropped} entries with unusable URLs"),
                )
                .with_field(provider_id.to_string()),
            );
        }
        result
    }

    async fn enrich(&self, request: &MediaRequest) -> MediaRequest {
        let mut request = request.clone();
        let Some(metadata) = &self.metadata else {
            return request;
        };
        if request.title_hint.is_some() && request.year_hint.is_some() {
            return request;
        }

        match metadata
            .lookup(request.content_type, request.external_id.trim())
            .await
        {
            Ok(found) => {
                request.title_hint.get_or_insert(found.title);
                if let Some(year) = found.year {
                    request.year_hint.get_or_insert(year);
                }
            }
            Err(e) => {
                tracing::debug!(request = %request.identity(), error = %e, "Metadata lookup failed");
            }
        }
        request
    }

    async fn read_cache(
        &self,
        request: &MediaRequest,
    ) -> std::result::Result<Option<SourceResponse>, CacheError> {
        let Some(raw) = self.cache.get(&self.keys.sources(request)).await? else {
            return Ok(None);
        };
        let cached: CachedSources = match serde_json::from_str(&raw) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding undecodable cache entry");
                return Ok(None);
            }
        };

        let subtitles = if cached.has_subtitles {
            let Some(raw) = self.cache.get(&self.keys.subtitles(request)).await? else {
                // Subtitles expired first: recompute both
                return Ok(None);
            };
            match serde_json::from_str::<Vec<CachedSubtitle>>(&raw) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding undecodable cache entry");
                    return Ok(None);
                }
            }
        } else {
            Vec::new()
        };

        let attached = self.attach_sources(cached.sources).and_then(|sources| {
            self.attach_subtitles(subtitles)
                .map(|subtitles| (sources, subtitles))
        });
        let (sources, subtitles) = match attached {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot re-sign cached URLs, treating as miss");
                return Ok(None);
            }
        };

        Ok(Some(SourceResponse {
            sources,
            subtitles,
            diagnostics: cached.diagnostics,
            cached: true,
        }))
    }

    async fn write_cache(
        &self,
        request: &MediaRequest,
        result: &ProviderResult,
    ) -> std::result::Result<(), CacheError> {
        let (sources, subtitles) = match self.detach(result) {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!(error = %e, "Result holds URLs this proxy cannot decode, not caching");
                return Ok(());
            }
        };
        let has_subtitles = !subtitles.is_empty();

        // Subtitles first so a visible sources entry never points at a missing one
        if has_subtitles {
            let value = serde_json::to_string(&subtitles)
                .map_err(|e| CacheError::Serialization(e.to_string()))?;
            self.cache
                .set(&self.keys.subtitles(request), value, self.config.subtitles_ttl)
                .await?;
        }

        let entry = CachedSources {
            sources,
            diagnostics: result.diagnostics.clone(),
            has_subtitles,
        };
        let value =
            serde_json::to_string(&entry).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.cache
            .set(&self.keys.sources(request), value, self.config.sources_ttl)
            .await
    }

    /// Strip proxy tokens back to origin URL and headers
    fn detach(
        &self,
        result: &ProviderResult,
    ) -> std::result::Result<(Vec<CachedSource>, Vec<CachedSubtitle>), ProxyError> {
        let sources = result
            .sources
            .iter()
            .map(|source| {
                let target = self.proxy.resolve_proxy_url(&source.url)?;
                Ok(CachedSource {
                    source: Source {
                        url: target.url,
                        ..source.clone()
                    },
                    headers: target.headers,
                })
            })
            .collect::<std::result::Result<Vec<_>, ProxyError>>()?;

        let subtitles = result
            .subtitles
            .iter()
            .map(|subtitle| {
                let target = self.proxy.resolve_proxy_url(&subtitle.url)?;
                Ok(CachedSubtitle {
                    subtitle: Subtitle {
                        url: target.url,
                        ..subtitle.clone()
                    },
                    headers: target.headers,
                })
            })
            .collect::<std::result::Result<Vec<_>, ProxyError>>()?;

        Ok((sources, subtitles))
    }

    fn attach_sources(
        &self,
        cached: Vec<CachedSource>,
    ) -> std::result::Result<Vec<Source>, ProxyError> {
        cached
            .into_iter()
            .map(|entry| {
                let url = self.proxy.create_proxy_url(&entry.source.url, &entry.headers)?;
                Ok(Source { url, ..entry.source })
            })
            .collect()
    }

    fn attach_subtitles(
        &self,
        cached: Vec<CachedSubtitle>,
    ) -> std::result::Result<Vec<Subtitle>, ProxyError> {
        cached
            .into_iter()
            .map(|entry| {
                let url = self
                    .proxy
                    .create_proxy_url(&entry.subtitle.url, &entry.headers)?;
                Ok(Subtitle {
                    url,
                    ..entry.subtitle
                })
            })
            .collect()
    }
}

/// Merge per-provider results, `results[i]` belonging to `providers[i]`
///
/// Sources are ordered by provider priority (descending), then quality rank
/// (descending); the sort is stable, so registration order and each
/// provider's own order break remaining ties. Completion order plays no part.
fn merge(providers: &[Arc<dyn Provider>], results: Vec<ProviderResult>) -> ProviderResult {
    let mut ranked: Vec<(i32, Source)> = Vec::new();
    let mut merged = ProviderResult::default();

    for (provider, result) in providers.iter().zip(results) {
        let priority = provider.priority();
        ranked.extend(result.sources.into_iter().map(|s| (priority, s)));
        merged.subtitles.extend(result.subtitles);
        merged.diagnostics.extend(result.diagnostics);
    }

    ranked.sort_by_key(|(priority, source)| {
        (std::cmp::Reverse(*priority), std::cmp::Reverse(source.quality.rank()))
    });
    merged.sources = ranked.into_iter().map(|(_, s)| s).collect();
    merged
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl std::fmt::Debug for SourceResolutionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceResolutionService")
            .field("cache", &self.cache.name())
            .field("config", &self.config)
            .field("metadata", &self.metadata.is_some())
            .finish_non_exhaustive()
    }
}
