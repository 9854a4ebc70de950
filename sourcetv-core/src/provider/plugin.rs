//! Plugin provider
//!
//! Runs an external executable per call. The plugin receives
//! `{"action": "movie"|"tv"|"health", "media": {...}}` on stdin and answers
//! with a [`SourcePayload`] (or `{"healthy": bool}` for `health`) on stdout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{
    parse_settings, Provider, ProviderContext, ProviderError, ProviderExt, ProviderManifest,
    SourcePayload,
};
use crate::models::{ContentType, MediaRequest, ProviderResult};
use crate::proxy::HeaderMapping;

/// `plugin` manifest settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PluginSettings {
    /// Executable path; relative paths resolve against the manifest's directory
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// Headers the origin needs on every stream fetch (through the proxy)
    pub stream_headers: HeaderMapping,
}

#[derive(Serialize)]
struct PluginInput<'a> {
    action: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    media: Option<&'a MediaRequest>,
}

#[derive(Deserialize)]
struct HealthOutput {
    healthy: bool,
}

pub struct PluginProvider {
    id: String,
    name: String,
    priority: i32,
    capabilities: BTreeSet<ContentType>,
    base_url: Option<String>,
    command: PathBuf,
    settings: PluginSettings,
}

impl PluginProvider {
    pub const KIND: &'static str = "plugin";

    pub fn from_manifest(manifest: &ProviderManifest) -> Result<Self, ProviderError> {
        let settings: PluginSettings = parse_settings(&manifest.settings, &manifest.id)?;
        if settings.command.trim().is_empty() {
            return Err(ProviderError::InvalidConfig(format!(
                "plugin '{}' has no command",
                manifest.id
            )));
        }

        let command = resolve_command(&settings.command, manifest.source_dir.as_deref())
            .ok_or_else(|| {
                ProviderError::Plugin(format!(
                    "plugin '{}' executable not found: {}",
                    manifest.id, settings.command
                ))
            })?;

        Ok(Self {
            id: manifest.id.clone(),
            name: manifest.name.clone(),
            priority: manifest.priority,
            capabilities: manifest.capabilities.clone(),
            base_url: manifest.base_url.clone(),
            command,
            settings,
        })
    }

    #[must_use]
    pub fn command(&self) -> &Path {
        &self.command
    }

    /// Spawn the plugin, feed it `input` and parse its stdout
    ///
    /// The child is killed if this future is dropped (e.g. on timeout).
    async fn invoke<T: serde::de::DeserializeOwned>(
        &self,
        input: &PluginInput<'_>,
    ) -> Result<T, ProviderError> {
        let payload = serde_json::to_vec(input)?;

        let mut child = Command::new(&self.command)
            .args(&self.settings.args)
            .envs(&self.settings.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProviderError::Plugin(format!("failed to spawn plugin '{}': {e}", self.id)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
            // Close stdin so the plugin sees EOF
            drop(stdin);
        }

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::Plugin(format!(
                "plugin '{}' exited with {}: {}",
                self.id,
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let preview: String = stdout.chars().take(200).collect();
            ProviderError::Parse(format!(
                "plugin '{}' returned invalid JSON ({e}): {preview}",
                self.id
            ))
        })
    }

    async fn resolve(
        &self,
        ctx: &ProviderContext<'_>,
        media: &MediaRequest,
    ) -> Result<ProviderResult, ProviderError> {
        let input = PluginInput {
            action: media.content_type.as_str(),
            media: Some(media),
        };
        let payload: SourcePayload = self.invoke(&input).await?;
        Ok(payload.into_result(ctx, &self.provider_ref(), &self.settings.stream_headers))
    }
}

/// Locate an executable: explicit paths relative to `base_dir`, bare names on `PATH`
fn resolve_command(command: &str, base_dir: Option<&Path>) -> Option<PathBuf> {
    let path = Path::new(command);

    if path.is_absolute() || command.contains(std::path::MAIN_SEPARATOR) || command.contains('/') {
        let resolved = match base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        };
        return resolved.is_file().then_some(resolved);
    }

    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(command))
            .find(|candidate| candidate.is_file())
    })
}

#[async_trait]
impl Provider for PluginProvider {
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
        self.base_url.as_deref()
    }

    async fn movie_sources(
        &self,
        ctx: &ProviderContext<'_>,
        media: &MediaRequest,
    ) -> Result<ProviderResult, ProviderError> {
        self.resolve(ctx, media).await
    }

    async fn tv_sources(
        &self,
        ctx: &ProviderContext<'_>,
        media: &MediaRequest,
    ) -> Result<ProviderResult, ProviderError> {
        self.resolve(ctx, media).await
    }

    /// Ask the plugin itself; a plugin that cannot answer is unhealthy
    async fn health_check(&self, _http: &reqwest::Client) -> bool {
        let input = PluginInput {
            action: "health",
            media: None,
        };
        match self.invoke::<HealthOutput>(&input).await {
            Ok(out) => out.healthy,
            Err(e) => {
                tracing::debug!(provider_id = %self.id, error = %e, "Plugin health check failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for PluginProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginProvider")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::proxy::ProxyService;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    const SCRIPT: &str = r#"#!/bin/sh
input=$(cat)
case "$input" in
  *'"health"'*) echo '{"healthy": true}' ;;
  *'"tv"'*) echo '{"sources": [], "diagnostics": [{"code": "PROVIDER_EMPTY", "message": "no episodes", "severity": "info"}]}' ;;
  *) echo '{"sources": [{"url": "https://cdn.example/550.mp4", "quality": "720p"}]}' ;;
esac
"#;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn manifest(dir: &Path, command: &str) -> ProviderManifest {
        ProviderManifest {
            id: "script".to_string(),
            name: "Script".to_string(),
            kind: PluginProvider::KIND.to_string(),
            priority: 0,
            capabilities: ContentType::ALL.into_iter().collect(),
            enabled: true,
            base_url: None,
            settings: serde_json::json!({ "command": command }),
            source_dir: Some(dir.to_path_buf()),
        }
    }

    #[tokio::test]
    async fn test_plugin_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "provider.sh", SCRIPT);

        let plugin = PluginProvider::from_manifest(&manifest(dir.path(), "./provider.sh")).unwrap();
        let proxy = ProxyService::new("http://localhost:8080", b"k", None).unwrap();
        let http = reqwest::Client::new();
        let ctx = ProviderContext::new(&proxy, &http);

        let movie = plugin
            .movie_sources(&ctx, &MediaRequest::movie("550"))
            .await
            .unwrap();
        assert_eq!(movie.sources.len(), 1);
        assert_eq!(movie.sources[0].provider.id, "script");
        assert!(proxy.is_proxy_url(&movie.sources[0].url));

        let tv = plugin
            .tv_sources(&ctx, &MediaRequest::tv("1399", 1, 1))
            .await
            .unwrap();
        assert!(tv.is_empty());
        assert_eq!(tv.diagnostics.len(), 1);

        assert!(plugin.health_check(&http).await);
    }

    #[tokio::test]
    async fn test_plugin_failure_modes() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "fail.sh", "#!/bin/sh\ncat >/dev/null\necho boom >&2\nexit 3\n");
        write_script(dir.path(), "garbage.sh", "#!/bin/sh\ncat >/dev/null\necho not-json\n");

        let proxy = ProxyService::new("http://localhost:8080", b"k", None).unwrap();
        let http = reqwest::Client::new();
        let ctx = ProviderContext::new(&proxy, &http);
        let media = MediaRequest::movie("1");

        let fail = PluginProvider::from_manifest(&manifest(dir.path(), "./fail.sh")).unwrap();
        let err = fail.movie_sources(&ctx, &media).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert!(!fail.health_check(&http).await);

        let garbage = PluginProvider::from_manifest(&manifest(dir.path(), "./garbage.sh")).unwrap();
        assert!(matches!(
            garbage.movie_sources(&ctx, &media).await,
            Err(ProviderError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_plugin_cancelled_by_timeout() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "slow.sh", "#!/bin/sh\ncat >/dev/null\nsleep 5\necho '{}'\n");

        let plugin = PluginProvider::from_manifest(&manifest(dir.path(), "./slow.sh")).unwrap();
        let proxy = ProxyService::new("http://localhost:8080", b"k", None).unwrap();
        let http = reqwest::Client::new();
        let ctx = ProviderContext::new(&proxy, &http);
        let media = MediaRequest::movie("1");

        let started = std::time::Instant::now();
        let res = tokio::time::timeout(
            Duration::from_millis(200),
            plugin.movie_sources(&ctx, &media),
        )
        .await;
        assert!(res.is_err());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_missing_executable() {
        let dir = tempfile::tempdir().unwrap();
        let err = PluginProvider::from_manifest(&manifest(dir.path(), "./nope.sh"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("executable not found"));

        let err = PluginProvider::from_manifest(&manifest(dir.path(), ""))
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::InvalidConfig(_)));
    }
}
