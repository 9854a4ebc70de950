use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::cache::CacheError;
use crate::provider::ProviderManifest;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub providers: ProvidersConfig,
    pub proxy: ProxyConfig,
    pub metadata: MetadataConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server identity reported by the health endpoint
    pub name: String,
    pub version: String,
    pub host: String,
    pub port: u16,
    /// Externally visible URL used to build proxy URLs (e.g. behind a reverse proxy)
    pub base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "sourcetv".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub memory_max_entries: u64,
    pub key_prefix: String,
    pub redis: RedisConfig,
    pub ttl: CacheTtlConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            memory_max_entries: 10_000,
            key_prefix: "sourcetv".to_string(),
            redis: RedisConfig::default(),
            ttl: CacheTtlConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u32,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            db: 0,
        }
    }
}

impl RedisConfig {
    /// Build a `redis://` URL, percent-encoding the password
    pub fn connection_url(&self) -> Result<String, CacheError> {
        let mut url = url::Url::parse(&format!("redis://{}:{}/{}", self.host, self.port, self.db))
            .map_err(|e| CacheError::Backend(format!("Invalid Redis address: {e}")))?;

        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            url.set_password(Some(password))
                .map_err(|()| CacheError::Backend("Invalid Redis password".to_string()))?;
        }

        Ok(url.to_string())
    }
}

/// TTLs per cached artifact class, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtlConfig {
    pub sources_secs: u64,
    pub subtitles_secs: u64,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            sources_secs: 3600,
            subtitles_secs: 86_400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Per-provider resolution timeout
    pub timeout_ms: u64,
    /// Directory scanned for `*.toml` provider manifests
    pub plugin_dir: Option<String>,
    /// Provider ids disabled at startup
    pub disabled: Vec<String>,
    /// Background health probe interval (0 disables it)
    pub health_interval_secs: u64,
    pub health_timeout_ms: u64,
    /// Providers declared inline in the config file
    pub definitions: Vec<ProviderManifest>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            plugin_dir: None,
            disabled: Vec::new(),
            health_interval_secs: 300,
            health_timeout_ms: 5_000,
            definitions: Vec::new(),
        }
    }
}

impl ProvidersConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub const fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// HMAC secret for proxy tokens; random per process when unset
    pub secret: Option<String>,
    /// Token lifetime (0 = tokens never expire)
    pub token_ttl_secs: u64,
    /// User-Agent sent to origins that do not require a specific one
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            secret: None,
            token_ttl_secs: 6 * 3600,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl ProxyConfig {
    #[must_use]
    pub const fn token_ttl(&self) -> Option<Duration> {
        if self.token_ttl_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.token_ttl_secs))
        }
    }
}

/// Metadata lookup (TMDB) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Lookup is disabled when no key is configured
    pub api_key: Option<String>,
    pub base_url: String,
    pub cache_ttl_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.themoviedb.org/3".to_string(),
            cache_ttl_secs: 86_400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // SOURCETV__SERVER__PORT, SOURCETV__CACHE__BACKEND, ...
        builder = builder.add_source(
            Environment::with_prefix("SOURCETV")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Get HTTP bind address
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Externally visible base URL for proxy links
    #[must_use]
    pub fn public_base_url(&self) -> String {
        if let Some(base) = self.server.base_url.as_deref().filter(|b| !b.is_empty()) {
            return base.trim_end_matches('/').to_string();
        }

        let host = match self.server.host.as_str() {
            "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
            other => other,
        };
        format!("http://{host}:{}", self.server.port)
    }

    /// Check the configuration, collecting every problem found
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.name.trim().is_empty() {
            errors.push("server.name must not be empty".to_string());
        }
        if self.server.port == 0 {
            errors.push("server.port must be non-zero".to_string());
        }
        if let Err(e) = url::Url::parse(&self.public_base_url()) {
            errors.push(format!("server.base_url is not a valid URL: {e}"));
        }

        if self.cache.backend == CacheBackendKind::Redis && self.cache.redis.host.trim().is_empty() {
            errors.push("cache.redis.host is required for the redis backend".to_string());
        }
        if self.cache.backend == CacheBackendKind::Memory && self.cache.memory_max_entries == 0 {
            errors.push("cache.memory_max_entries must be non-zero".to_string());
        }

        if self.providers.timeout_ms == 0 {
            errors.push("providers.timeout_ms must be non-zero".to_string());
        }
        if self.providers.health_timeout_ms == 0 {
            errors.push("providers.health_timeout_ms must be non-zero".to_string());
        }

        let mut seen = HashSet::new();
        for manifest in &self.providers.definitions {
            if !seen.insert(manifest.id.as_str()) {
                errors.push(format!("duplicate provider definition '{}'", manifest.id));
            }
        }

        if self.proxy.secret.as_deref().is_some_and(str::is_empty) {
            errors.push("proxy.secret must not be empty when set".to_string());
        }

        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be 'json' or 'pretty', got '{}'",
                self.logging.format
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.http_address(), "0.0.0.0:8080");
        assert_eq!(config.public_base_url(), "http://127.0.0.1:8080");
        assert_eq!(config.providers.timeout(), Duration::from_secs(10));
        assert_eq!(config.cache.backend, CacheBackendKind::Memory);
    }

    #[test]
    fn test_explicit_base_url() {
        let mut config = Config::default();
        config.server.base_url = Some("https://tv.example.com/".to_string());
        assert_eq!(config.public_base_url(), "https://tv.example.com");
    }

    #[test]
    fn test_validate_collects_errors() {
        let mut config = Config::default();
        config.server.port = 0;
        config.providers.timeout_ms = 0;
        config.logging.format = "xml".to_string();

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_redis_url() {
        let redis = RedisConfig {
            host: "cache".to_string(),
            port: 6380,
            password: Some("p@ss word".to_string()),
            db: 2,
        };
        let url = redis.connection_url().unwrap();
        assert!(url.starts_with("redis://:p%40ss%20word@cache:6380/2"));

        let no_password = RedisConfig::default().connection_url().unwrap();
        assert_eq!(no_password, "redis://localhost:6379/0");
    }

    #[test]
    fn test_token_ttl() {
        let mut proxy = ProxyConfig::default();
        assert_eq!(proxy.token_ttl(), Some(Duration::from_secs(21_600)));
        proxy.token_ttl_secs = 0;
        assert_eq!(proxy.token_ttl(), None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "server:\n  name: test-node\n  port: 9000\ncache:\n  backend: redis\n  ttl:\n    sources_secs: 60\nproviders:\n  definitions:\n    - id: alpha\n      name: Alpha\n      kind: http_api\n      priority: 10\n      base_url: http://alpha.local\n"
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.name, "test-node");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.cache.backend, CacheBackendKind::Redis);
        assert_eq!(config.cache.ttl.sources_secs, 60);
        assert_eq!(config.cache.ttl.subtitles_secs, 86_400);
        assert_eq!(config.providers.definitions.len(), 1);
        assert_eq!(config.providers.definitions[0].priority, 10);
    }
}
