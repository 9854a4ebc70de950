// Provider System
//
// Three layers:
//
// 1. Contract: `Provider` trait plus free helpers (`util`) composed into
//    every implementation
// 2. Adapters: `HttpApiProvider` (origin JSON API) and `PluginProvider`
//    (external executable), built from manifests by `ProviderLoader`
// 3. `ProviderRegistry`: the copy-on-write set of registered providers,
//    fed by explicit registration and directory discovery

pub mod context;
pub mod discovery;
pub mod error;
pub mod http_api;
pub mod loader;
pub mod manifest;
pub mod plugin;
pub mod registry;
pub mod traits;
pub mod util;

pub use context::*;
pub use discovery::{DiscoveryFailure, DiscoveryReport};
pub use error::*;
pub use loader::{ProviderFactory, ProviderLoader};
pub use manifest::ProviderManifest;
pub use registry::*;
pub use traits::*;
pub use util::{
    build_source, build_subtitle, infer_quality, infer_stream_type, infer_subtitle_format,
    probe_reachability, RawSource, RawSubtitle, SourcePayload,
};

pub use http_api::HttpApiProvider;
pub use plugin::PluginProvider;

/// Parse a manifest's `settings` value into a typed settings struct.
///
/// Common helper for the built-in loader factories.
pub fn parse_settings<T: serde::de::DeserializeOwned>(
    value: &serde_json::Value,
    provider_id: &str,
) -> std::result::Result<T, ProviderError> {
    // A manifest without a [settings] table deserializes as null
    let value = if value.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        value.clone()
    };
    serde_json::from_value(value).map_err(|e| {
        ProviderError::InvalidConfig(format!("Failed to parse settings for {provider_id}: {e}"))
    })
}
