//! Cache key builder
//!
//! All cache keys are built here so that every backend shares one naming
//! scheme: `{prefix}:{artifact}:{fingerprint}`.

use crate::models::MediaRequest;
use crate::Config;

#[derive(Debug, Clone)]
pub struct KeyBuilder {
    prefix: String,
}

impl KeyBuilder {
    /// Create a new `KeyBuilder` with the given prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Create `KeyBuilder` from configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cache.key_prefix.clone())
    }

    /// Resolved sources (plus diagnostics) for a request
    ///
    /// Type: String + TTL (`cache.ttl.sources_secs`)
    #[must_use]
    pub fn sources(&self, request: &MediaRequest) -> String {
        format!("{}:sources:{}", self.prefix, request.fingerprint())
    }

    /// Resolved subtitles for a request
    ///
    /// Type: String + TTL (`cache.ttl.subtitles_secs`)
    #[must_use]
    pub fn subtitles(&self, request: &MediaRequest) -> String {
        format!("{}:subtitles:{}", self.prefix, request.fingerprint())
    }

    /// Metadata lookup result
    ///
    /// Type: String + TTL (`metadata.cache_ttl_secs`)
    #[must_use]
    pub fn metadata(&self, content_type: &str, external_id: &str) -> String {
        format!("{}:metadata:{content_type}:{external_id}", self.prefix)
    }
}

impl Default for KeyBuilder {
    fn default() -> Self {
        Self::new("sourcetv")
    }
}
