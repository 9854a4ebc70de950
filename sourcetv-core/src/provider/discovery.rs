//! Provider discovery
//!
//! Scans a directory of `*.toml` manifests and registers every provider that
//! loads. A bad manifest yields a `DISCOVERY_LOAD_ERROR` diagnostic and the
//! scan moves on.

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::{
    ProviderError, ProviderLoader, ProviderManifest, ProviderRegistry, RegisterOptions,
    RegistryError,
};
use crate::models::{Diagnostic, DiagnosticCode};

/// Outcome of a discovery pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    /// Ids registered, in manifest file name order
    pub registered: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl DiscoveryReport {
    fn failed(&mut self, source: &str, message: impl std::fmt::Display) {
        tracing::warn!(source = %source, error = %message, "Failed to load provider");
        self.diagnostics.push(
            Diagnostic::error(
                DiagnosticCode::DiscoveryLoadError,
                format!("{source}: {message}"),
            )
            .with_field(source.to_string()),
        );
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: Self) {
        self.registered.extend(other.registered);
        self.diagnostics.extend(other.diagnostics);
    }
}

impl ProviderRegistry {
    /// Build and register the provider described by `manifest`
    ///
    /// `manifest.enabled = false` registers it in the disabled state.
    pub fn register_manifest(
        &self,
        manifest: &ProviderManifest,
        loader: &ProviderLoader,
    ) -> Result<String, DiscoveryFailure> {
        let provider = loader.load(manifest).map_err(DiscoveryFailure::Load)?;
        self.register_with(
            provider,
            RegisterOptions {
                overwrite: false,
                disabled: !manifest.enabled,
            },
        )
        .map_err(DiscoveryFailure::Register)?;
        Ok(manifest.id.clone())
    }

    /// Register every manifest declared inline (e.g. in the config file)
    pub fn register_manifests<'a>(
        &self,
        manifests: impl IntoIterator<Item = &'a ProviderManifest>,
        loader: &ProviderLoader,
    ) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        for manifest in manifests {
            match self.register_manifest(manifest, loader) {
                Ok(id) => report.registered.push(id),
                Err(e) => report.failed(&format!("definition '{}'", manifest.id), e),
            }
        }
        report
    }

    /// Scan `dir` for `*.toml` manifests and register each provider
    ///
    /// Only an unreadable directory is an error; per-file failures become
    /// diagnostics in the returned report.
    pub fn discover_providers(
        &self,
        dir: impl AsRef<Path>,
        loader: &ProviderLoader,
    ) -> Result<DiscoveryReport, RegistryError> {
        let dir = dir.as_ref();
        let mut report = DiscoveryReport::default();

        for path in manifest_files(dir)? {
            let source = path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

            let manifest = match read_manifest(&path) {
                Ok(m) => m,
                Err(e) => {
                    report.failed(&source, e);
                    continue;
                }
            };

            match self.register_manifest(&manifest, loader) {
                Ok(id) => {
                    tracing::info!(provider_id = %id, source = %source, "Discovered provider");
                    report.registered.push(id);
                }
                Err(e) => report.failed(&source, e),
            }
        }

        tracing::info!(
            dir = %dir.display(),
            registered = report.registered.len(),
            failed = report.diagnostics.len(),
            "Provider discovery finished"
        );
        Ok(report)
    }
}

/// Why a single manifest could not be registered
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryFailure {
    #[error("{0}")]
    Load(ProviderError),

    #[error("{0}")]
    Register(RegistryError),
}

/// `*.toml` files directly under `dir`, sorted by file name
fn manifest_files(dir: &Path) -> Result<Vec<PathBuf>, RegistryError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| RegistryError::Discovery(format!("cannot read {}: {e}", dir.display())))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    files.sort();
    Ok(files)
}

fn read_manifest(path: &Path) -> Result<ProviderManifest, ProviderError> {
    let content = std::fs::read_to_string(path)?;
    let mut manifest = ProviderManifest::from_toml(&content)?;
    manifest.source_dir = path.parent().map(Path::to_path_buf);
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentType, Severity};

    const VALID: &str = r#"
id = "alpha"
name = "Alpha"
kind = "http_api"
priority = 10
base_url = "https://alpha.example"
"#;

    fn loader() -> ProviderLoader {
        ProviderLoader::new(reqwest::Client::new())
    }

    #[test]
    fn test_one_valid_one_invalid() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a-valid.toml"), VALID).unwrap();
        // Loads as TOML but the http_api factory rejects it
        std::fs::write(
            dir.path().join("b-broken.toml"),
            "id = \"beta\"\nname = \"Beta\"\nkind = \"http_api\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "not a manifest").unwrap();

        let registry = ProviderRegistry::new();
        let report = registry.discover_providers(dir.path(), &loader()).unwrap();

        assert_eq!(report.registered, vec!["alpha"]);
        assert_eq!(report.diagnostics.len(), 1);
        let diag = &report.diagnostics[0];
        assert_eq!(diag.code, DiagnosticCode::DiscoveryLoadError);
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.field.as_deref(), Some("b-broken.toml"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get_providers_for(ContentType::Movie).len(), 1);
    }

    #[test]
    fn test_each_failure_kind_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.toml"), VALID).unwrap();
        std::fs::write(dir.path().join("2.toml"), "id = [broken").unwrap();
        std::fs::write(
            dir.path().join("3.toml"),
            "id = \"gamma\"\nname = \"G\"\nkind = \"scraper\"\n",
        )
        .unwrap();
        // Duplicate of 1.toml
        std::fs::write(dir.path().join("4.toml"), VALID).unwrap();
        std::fs::write(
            dir.path().join("5.toml"),
            "id = \"delta\"\nname = \"D\"\nkind = \"plugin\"\n[settings]\ncommand = \"./missing\"\n",
        )
        .unwrap();

        let registry = ProviderRegistry::new();
        let report = registry.discover_providers(dir.path(), &loader()).unwrap();

        assert_eq!(report.registered, vec!["alpha"]);
        let fields: Vec<_> = report
            .diagnostics
            .iter()
            .map(|d| d.field.clone().unwrap_or_default())
            .collect();
        assert_eq!(fields, vec!["2.toml", "3.toml", "4.toml", "5.toml"]);
        assert!(report.diagnostics[2].message.contains("already registered"));
    }

    #[test]
    fn test_disabled_manifest_registers_disabled() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("off.toml"),
            format!("{VALID}enabled = false\n"),
        )
        .unwrap();

        let registry = ProviderRegistry::new();
        let report = registry.discover_providers(dir.path(), &loader()).unwrap();
        assert_eq!(report.registered, vec!["alpha"]);
        assert_eq!(registry.is_enabled("alpha"), Some(false));
        assert!(registry.get_providers_for(ContentType::Movie).is_empty());
    }

    #[test]
    fn test_missing_directory() {
        let registry = ProviderRegistry::new();
        assert!(matches!(
            registry.discover_providers("/definitely/not/here", &loader()),
            Err(RegistryError::Discovery(_))
        ));
    }

    #[test]
    fn test_register_manifests_inline() {
        let mut ok = ProviderManifest::from_toml(VALID).unwrap();
        ok.id = "inline".to_string();
        let mut bad = ok.clone();
        bad.id = "bad".to_string();
        bad.base_url = None;

        let registry = ProviderRegistry::new();
        let report = registry.register_manifests([&ok, &bad], &loader());
        assert_eq!(report.registered, vec!["inline"]);
        assert_eq!(report.diagnostics.len(), 1);
    }
}
