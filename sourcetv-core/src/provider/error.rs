// Provider Error Types

use crate::proxy::ProxyError;

/// Provider-specific errors
///
/// Never surfaced to API callers: the resolution service turns them into
/// diagnostics attached to the response.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("Unsupported content type: {0}")]
    Unsupported(String),

    #[error("Resource not found")]
    NotFound,

    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Provider '{0}' is already registered")]
    DuplicateProvider(String),

    #[error("Provider '{0}' is not registered")]
    ProviderNotFound(String),

    #[error("Provider discovery failed: {0}")]
    Discovery(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;
