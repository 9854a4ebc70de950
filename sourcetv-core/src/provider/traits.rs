// Provider Traits
//
// Core interface every origin adapter implements

use async_trait::async_trait;
use std::collections::BTreeSet;

use super::{probe_reachability, ProviderContext, ProviderError};
use crate::models::{ContentType, MediaRequest, ProviderDescriptor, ProviderRef, ProviderResult};

/// Content provider trait
///
/// One implementation per origin site. Calls must be safe to run concurrently
/// for different requests; implementations keep no per-request mutable state.
///
/// A provider that finds nothing returns an empty [`ProviderResult`] with a
/// diagnostic explaining why. `Err` is reserved for unexpected failures, and the
/// resolution service converts it into a diagnostic anyway.
#[async_trait]
pub trait Provider: Send + Sync {
    // ========== Identity ==========

    /// Stable, unique provider id (e.g. "vidking")
    fn id(&self) -> &str;

    /// Display name
    fn name(&self) -> &str;

    /// Content types this provider can resolve
    fn capabilities(&self) -> BTreeSet<ContentType> {
        ContentType::ALL.into_iter().collect()
    }

    /// Merge priority; higher values come first
    fn priority(&self) -> i32 {
        0
    }

    /// Origin endpoint probed by the default [`Provider::health_check`]
    fn base_url(&self) -> Option<&str> {
        None
    }

    // ========== Resolution ==========

    async fn movie_sources(
        &self,
        ctx: &ProviderContext<'_>,
        media: &MediaRequest,
    ) -> Result<ProviderResult, ProviderError>;

    async fn tv_sources(
        &self,
        ctx: &ProviderContext<'_>,
        media: &MediaRequest,
    ) -> Result<ProviderResult, ProviderError>;

    // ========== Health ==========

    /// Reachability probe
    ///
    /// Default: unauthenticated request to [`Provider::base_url`]. Providers
    /// without a base URL are reported reachable.
    async fn health_check(&self, http: &reqwest::Client) -> bool {
        match self.base_url() {
            Some(url) => probe_reachability(http, url).await,
            None => true,
        }
    }
}

/// Convenience accessors available on every provider
pub trait ProviderExt: Provider {
    fn supports(&self, content_type: ContentType) -> bool {
        self.capabilities().contains(&content_type)
    }

    fn provider_ref(&self) -> ProviderRef {
        ProviderRef {
            id: self.id().to_string(),
            name: self.name().to_string(),
        }
    }

    fn descriptor(&self, enabled: bool) -> ProviderDescriptor {
        ProviderDescriptor {
            id: self.id().to_string(),
            name: self.name().to_string(),
            enabled,
            capabilities: self.capabilities(),
            priority: self.priority(),
        }
    }
}

impl<T: Provider + ?Sized> ProviderExt for T {}

/// Dispatch to the method matching the request's content type
pub async fn fetch_sources(
    provider: &dyn Provider,
    ctx: &ProviderContext<'_>,
    media: &MediaRequest,
) -> Result<ProviderResult, ProviderError> {
    match media.content_type {
        ContentType::Movie => provider.movie_sources(ctx, media).await,
        ContentType::Tv => provider.tv_sources(ctx, media).await,
    }
}
