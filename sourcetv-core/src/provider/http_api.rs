//! HTTP API provider
//!
//! Resolves sources through an origin JSON API answering with the common
//! [`SourcePayload`] schema.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{
    parse_settings, probe_reachability, Provider, ProviderContext, ProviderError, ProviderExt,
    ProviderManifest, SourcePayload,
};
use crate::models::{ContentType, Diagnostic, DiagnosticCode, MediaRequest, ProviderResult};
use crate::proxy::HeaderMapping;

/// Unreserved characters stay literal so ids and titles survive as one path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// `http_api` manifest settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpApiSettings {
    /// Path template for movies; `{id}`, `{title}` and `{year}` are substituted
    pub movie_path: String,
    /// Path template for episodes; adds `{season}` and `{episode}`
    pub tv_path: String,
    /// Path probed by the health check instead of the base URL
    pub health_path: Option<String>,
    /// Headers sent to the API itself
    pub headers: HeaderMapping,
    /// Headers the origin needs on every stream fetch (through the proxy)
    pub stream_headers: HeaderMapping,
}

impl Default for HttpApiSettings {
    fn default() -> Self {
        Self {
            movie_path: "/movie/{id}".to_string(),
            tv_path: "/tv/{id}/{season}/{episode}".to_string(),
            health_path: None,
            headers: HeaderMapping::new(),
            stream_headers: HeaderMapping::new(),
        }
    }
}

pub struct HttpApiProvider {
    id: String,
    name: String,
    priority: i32,
    capabilities: BTreeSet<ContentType>,
    base_url: String,
    settings: HttpApiSettings,
    http: reqwest::Client,
}

impl HttpApiProvider {
    pub const KIND: &'static str = "http_api";

    pub fn from_manifest(
        manifest: &ProviderManifest,
        http: reqwest::Client,
    ) -> Result<Self, ProviderError> {
        let base_url = manifest.base_url.as_deref().ok_or_else(|| {
            ProviderError::InvalidConfig(format!("provider '{}' needs a base_url", manifest.id))
        })?;
        let parsed = url::Url::parse(base_url)
            .map_err(|e| ProviderError::InvalidConfig(format!("invalid base_url: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProviderError::InvalidConfig(format!(
                "base_url must be http(s), got '{}'",
                parsed.scheme()
            )));
        }

        Ok(Self {
            id: manifest.id.clone(),
            name: manifest.name.clone(),
            priority: manifest.priority,
            capabilities: manifest.capabilities.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            settings: parse_settings(&manifest.settings, &manifest.id)?,
            http,
        })
    }

    fn endpoint(&self, media: &MediaRequest) -> String {
        let template = match media.content_type {
            ContentType::Movie => &self.settings.movie_path,
            ContentType::Tv => &self.settings.tv_path,
        };

        let encode = |s: &str| utf8_percent_encode(s, PATH_SEGMENT).to_string();
        let path = template
            .replace("{id}", &encode(&media.external_id))
            .replace("{season}", &media.season.unwrap_or_default().to_string())
            .replace("{episode}", &media.episode.unwrap_or_default().to_string())
            .replace("{title}", &encode(media.title_hint.as_deref().unwrap_or_default()))
            .replace(
                "{year}",
                &media.year_hint.map(|y| y.to_string()).unwrap_or_default(),
            );

        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn fetch(
        &self,
        ctx: &ProviderContext<'_>,
        media: &MediaRequest,
    ) -> Result<ProviderResult, ProviderError> {
        let url = self.endpoint(media);
        tracing::debug!(provider_id = %self.id, url = %url, "Querying provider API");

        let mut request = self.http.get(&url);
        for (name, value) in &self.settings.headers {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(ProviderResult::with_diagnostic(
                Diagnostic::info(
                    DiagnosticCode::ProviderEmpty,
                    format!("{} has no entry for {}", self.name, media.identity()),
                )
                .with_field(self.id.clone()),
            ));
        }
        if !status.is_success() {
            return Err(ProviderError::Api(format!("{url} answered {status}")));
        }

        let payload: SourcePayload = response.json().await?;
        Ok(payload.into_result(ctx, &self.provider_ref(), &self.settings.stream_headers))
    }
}

#[async_trait]
impl Provider for HttpApiProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> BTreeSet<ContentType> {
        self.capabilities.clone()
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn base_url(&self) -> Option<&str> {
        Some(&self.base_url)
    }

    async fn movie_sources(
        &self,
        ctx: &ProviderContext<'_>,
        media: &MediaRequest,
    ) -> Result<ProviderResult, ProviderError> {
        self.fetch(ctx, media).await
    }

    async fn tv_sources(
        &self,
        ctx: &ProviderContext<'_>,
        media: &MediaRequest,
    ) -> Result<ProviderResult, ProviderError> {
        self.fetch(ctx, media).await
    }

    async fn health_check(&self, http: &reqwest::Client) -> bool {
        match &self.settings.health_path {
            Some(path) => {
                let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
                probe_reachability(http, &url).await
            }
            None => probe_reachability(http, &self.base_url).await,
        }
    }
}

impl std::fmt::Debug for HttpApiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApiProvider")
            .field("id", &self.id)
            .field("base_url", &self.base_url)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
