//! Metadata lookup
//!
//! Resolves an external id to a title and release year. Used only to fill
//! request hints before provider fan-out; the result never changes the cache
//! fingerprint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::MetadataConfig;
use crate::models::ContentType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: String,
    pub year: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Metadata not found for {0}")]
    NotFound(String),

    #[error("Metadata request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Metadata API error: {0}")]
    Api(String),
}

#[async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn lookup(
        &self,
        content_type: ContentType,
        external_id: &str,
    ) -> Result<MediaMetadata, MetadataError>;
}

/// TMDB response fields we care about (movie and tv share one shape)
#[derive(Debug, Deserialize)]
struct TmdbDetails {
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
}

impl TmdbDetails {
    fn into_metadata(self) -> Option<MediaMetadata> {
        let title = self.title.or(self.name).filter(|t| !t.is_empty())?;
        let year = self
            .release_date
            .or(self.first_air_date)
            .and_then(|date| date.get(..4).and_then(|y| y.parse().ok()));
        Some(MediaMetadata { title, year })
    }
}

/// TMDB v3 client with an in-memory result cache
pub struct TmdbClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    cache: moka::future::Cache<(ContentType, String), MediaMetadata>,
}

impl TmdbClient {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        cache_ttl: Duration,
    ) -> Self {
        let mut builder = moka::future::CacheBuilder::new(10_000);
        if !cache_ttl.is_zero() {
            builder = builder.time_to_live(cache_ttl);
        }

        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            cache: builder.build(),
        }
    }

    /// Build from config; `None` when no API key is configured
    #[must_use]
    pub fn from_config(config: &MetadataConfig, http: reqwest::Client) -> Option<Self> {
        let api_key = config.api_key.as_deref().filter(|k| !k.trim().is_empty())?;
        Some(Self::new(
            http,
            &config.base_url,
            api_key,
            Duration::from_secs(config.cache_ttl_secs),
        ))
    }

    async fn fetch(
        &self,
        content_type: ContentType,
        external_id: &str,
    ) -> Result<MediaMetadata, MetadataError> {
        let url = format!("{}/{}/{}", self.base_url, content_type.as_str(), external_id);

        // v4 read tokens are JWTs sent as bearer; v3 keys go in the query
        let request = if self.api_key.starts_with("eyJ") {
            self.http.get(&url).bearer_auth(&self.api_key)
        } else {
            self.http.get(&url).query(&[("api_key", &self.api_key)])
        };

        let response = request.send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MetadataError::NotFound(format!("{content_type}:{external_id}")));
        }
        if !status.is_success() {
            return Err(MetadataError::Api(format!("TMDB answered {status}")));
        }

        response
            .json::<TmdbDetails>()
            .await?
            .into_metadata()
            .ok_or_else(|| MetadataError::NotFound(format!("{content_type}:{external_id}")))
    }
}

#[async_trait]
impl MetadataLookup for TmdbClient {
    async fn lookup(
        &self,
        content_type: ContentType,
        external_id: &str,
    ) -> Result<MediaMetadata, MetadataError> {
        let key = (content_type, external_id.to_string());
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }

        let metadata = self.fetch(content_type, external_id).await?;
        tracing::debug!(
            content_type = %content_type,
            external_id = %external_id,
            title = %metadata.title,
            "Fetched metadata"
        );
        self.cache.insert(key, metadata.clone()).await;
        Ok(metadata)
    }
}

impl std::fmt::Debug for TmdbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TmdbClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_movie_and_tv_lookup_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/550"))
            .and(query_param("api_key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "title": "Fight Club", "release_date": "1999-10-15"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tv/1399"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Game of Thrones", "first_air_date": "2011-04-17"
            })))
            .mount(&server)
            .await;

        let client = TmdbClient::new(
            reqwest::Client::new(),
            server.uri(),
            "k",
            Duration::from_secs(60),
        );

        let movie = client.lookup(ContentType::Movie, "550").await.unwrap();
        assert_eq!(movie.title, "Fight Club");
        assert_eq!(movie.year, Some(1999));
        // Served from cache; the mock expects exactly one call
        assert_eq!(client.lookup(ContentType::Movie, "550").await.unwrap(), movie);

        let tv = client.lookup(ContentType::Tv, "1399").await.unwrap();
        assert_eq!(tv.title, "Game of Thrones");
        assert_eq!(tv.year, Some(2011));
    }

    #[tokio::test]
    async fn test_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = TmdbClient::new(reqwest::Client::new(), server.uri(), "k", Duration::ZERO);
        assert!(matches!(
            client.lookup(ContentType::Movie, "0").await,
            Err(MetadataError::NotFound(_))
        ));
    }

    #[test]
    fn test_from_config_requires_key() {
        let mut config = MetadataConfig::default();
        assert!(TmdbClient::from_config(&config, reqwest::Client::new()).is_none());
        config.api_key = Some("k".to_string());
        assert!(TmdbClient::from_config(&config, reqwest::Client::new()).is_some());
    }
}
