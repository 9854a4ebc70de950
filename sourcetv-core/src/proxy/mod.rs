//! Proxy URL codec
//!
//! Clients never talk to origin servers directly. Every stream URL handed out
//! is a proxy URL of the form `{base_url}/proxy/{token}`, where the token is
//! self-describing:
//!
//! ```text
//! base64url(json { u: origin_url, h: headers, e: expiry? }) "." base64url(HMAC-SHA256)
//! ```
//!
//! Nothing is stored server-side, so tokens survive restarts as long as the
//! signing secret is stable. The signature stops clients from forging tokens
//! that point the proxy at arbitrary hosts or with arbitrary headers.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Header name -> value mapping carried inside a token
pub type HeaderMapping = BTreeMap<String, String>;

/// Path segment under which proxy tokens are served
pub const PROXY_PATH: &str = "/proxy/";

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Malformed proxy token: {0}")]
    Malformed(String),

    #[error("Proxy token signature mismatch")]
    InvalidSignature,

    #[error("Proxy token expired")]
    Expired,

    #[error("Invalid origin URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid proxy signing key: {0}")]
    InvalidKey(String),
}

/// Decoded proxy token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    pub url: String,
    pub headers: HeaderMapping,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    u: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    h: HeaderMapping,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    e: Option<i64>,
}

/// Builds and resolves signed proxy URLs
#[derive(Clone)]
pub struct ProxyService {
    base_url: String,
    key: Vec<u8>,
    token_ttl: Option<Duration>,
}

impl ProxyService {
    /// Create a new proxy service
    ///
    /// # Arguments
    /// * `base_url` - Externally visible server URL (e.g. "https://tv.example.com")
    /// * `secret` - HMAC signing key
    /// * `token_ttl` - Lifetime of issued tokens; `None` issues non-expiring tokens
    pub fn new(base_url: &str, secret: &[u8], token_ttl: Option<Duration>) -> Result<Self, ProxyError> {
        if secret.is_empty() {
            return Err(ProxyError::InvalidKey("secret must not be empty".to_string()));
        }
        url::Url::parse(base_url).map_err(|e| ProxyError::InvalidUrl(format!("{base_url}: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            key: secret.to_vec(),
            token_ttl,
        })
    }

    /// Generate a random signing secret
    ///
    /// Tokens signed with it become invalid when the process restarts.
    #[must_use]
    pub fn random_secret() -> Vec<u8> {
        rand::random::<[u8; 32]>().to_vec()
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base_url}/proxy/`
    #[must_use]
    pub fn prefix(&self) -> String {
        format!("{}{}", self.base_url, PROXY_PATH)
    }

    /// Whether `url` is already a proxy URL issued by this server
    #[must_use]
    pub fn is_proxy_url(&self, url: &str) -> bool {
        url.strip_prefix(&self.base_url)
            .is_some_and(|rest| rest.starts_with(PROXY_PATH))
    }

    /// Wrap an origin URL and the headers it requires into a proxy URL
    pub fn create_proxy_url(&self, origin_url: &str, headers: &HeaderMapping) -> Result<String, ProxyError> {
        let token = self.encode_token(origin_url, headers)?;
        Ok(format!("{}{token}", self.prefix()))
    }

    /// Recover the origin URL and headers from a proxy URL (or a bare token)
    pub fn resolve_proxy_url(&self, proxy_url: &str) -> Result<ProxyTarget, ProxyError> {
        self.decode_token(extract_token(proxy_url))
    }

    /// Encode a token without the URL prefix
    pub fn encode_token(&self, origin_url: &str, headers: &HeaderMapping) -> Result<String, ProxyError> {
        let parsed = url::Url::parse(origin_url)
            .map_err(|e| ProxyError::InvalidUrl(format!("{origin_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProxyError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        let expires_at = self.token_ttl.map(|ttl| {
            chrono::Utc::now().timestamp() + i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX / 2)
        });

        let payload = TokenPayload {
            u: origin_url.to_string(),
            h: headers.clone(),
            e: expires_at,
        };
        let json = serde_json::to_vec(&payload)
            .map_err(|e| ProxyError::Malformed(format!("failed to encode payload: {e}")))?;
        let encoded = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac()?;
        mac.update(encoded.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{encoded}.{signature}"))
    }

    /// Verify and decode a bare token
    pub fn decode_token(&self, token: &str) -> Result<ProxyTarget, ProxyError> {
        let (encoded, signature) = token
            .split_once('.')
            .ok_or_else(|| ProxyError::Malformed("missing signature".to_string()))?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| ProxyError::Malformed(format!("signature is not base64url: {e}")))?;

        let mut mac = self.mac()?;
        mac.update(encoded.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| ProxyError::InvalidSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| ProxyError::Malformed(format!("payload is not base64url: {e}")))?;
        let payload: TokenPayload = serde_json::from_slice(&json)
            .map_err(|e| ProxyError::Malformed(format!("invalid payload: {e}")))?;

        if let Some(expires_at) = payload.e {
            if chrono::Utc::now().timestamp() > expires_at {
                return Err(ProxyError::Expired);
            }
        }

        Ok(ProxyTarget {
            url: payload.u,
            headers: payload.h,
        })
    }

    fn mac(&self) -> Result<HmacSha256, ProxyError> {
        HmacSha256::new_from_slice(&self.key).map_err(|e| ProxyError::InvalidKey(e.to_string()))
    }
}

impl std::fmt::Debug for ProxyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyService")
            .field("base_url", &self.base_url)
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}

/// Pull the token out of `.../proxy/{token}[/...][?...]`, or return the input as-is
fn extract_token(proxy_url: &str) -> &str {
    let without_query = proxy_url
        .split(['?', '#'])
        .next()
        .unwrap_or(proxy_url);

    match without_query.rfind(PROXY_PATH) {
        Some(idx) => {
            let rest = &without_query[idx + PROXY_PATH.len()..];
            rest.split('/').next().unwrap_or(rest)
        }
        None => without_query,
    }
}
