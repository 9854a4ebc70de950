// Provider Manifest
//
// Declarative description of a provider, read from `*.toml` files in the
// plugin directory or from `providers.definitions` in the config file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

use super::ProviderError;
use crate::models::ContentType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderManifest {
    pub id: String,
    pub name: String,

    /// Loader kind (`http_api`, `plugin`)
    pub kind: String,

    #[serde(default)]
    pub priority: i32,

    #[serde(default = "default_capabilities")]
    pub capabilities: BTreeSet<ContentType>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub base_url: Option<String>,

    /// Kind-specific settings, parsed by the loader
    #[serde(default)]
    pub settings: serde_json::Value,

    /// Directory the manifest was read from (set by discovery)
    #[serde(skip)]
    pub source_dir: Option<PathBuf>,
}

fn default_capabilities() -> BTreeSet<ContentType> {
    ContentType::ALL.into_iter().collect()
}

const fn default_enabled() -> bool {
    true
}

impl ProviderManifest {
    /// Parse a TOML manifest
    pub fn from_toml(content: &str) -> Result<Self, ProviderError> {
        let manifest: Self = toml::from_str(content)
            .map_err(|e| ProviderError::InvalidConfig(format!("invalid manifest: {e}")))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.id.trim().is_empty() {
            return Err(ProviderError::InvalidConfig("manifest id is empty".to_string()));
        }
        if self
            .id
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        {
            return Err(ProviderError::InvalidConfig(format!(
                "manifest id '{}' may only contain [A-Za-z0-9_-]",
                self.id
            )));
        }
        if self.capabilities.is_empty() {
            return Err(ProviderError::InvalidConfig(format!(
                "provider '{}' declares no capabilities",
                self.id
            )));
        }
        Ok(())
    }
}
