//! Configuration loading

use anyhow::Result;
use std::path::Path;
use tracing::info;

use crate::Config;

/// Load configuration from a config file or environment variables
///
/// Config file search order:
/// 1. `explicit_path` (the `--config` flag), which must exist
/// 2. `SOURCETV_CONFIG_PATH` environment variable
/// 3. ./config.yaml (current working directory)
/// 4. /config/config.yaml (container mount path)
/// 5. Fall back to environment variables only
pub fn load_config(explicit_path: Option<&str>) -> Result<Config> {
    if let Some(path) = explicit_path {
        if !Path::new(path).exists() {
            anyhow::bail!("Config file not found: {path}");
        }
    }

    let config_path = explicit_path
        .map(str::to_string)
        .or_else(|| {
            std::env::var("SOURCETV_CONFIG_PATH")
                .ok()
                .filter(|p| Path::new(p).exists())
        })
        .or_else(|| {
            ["config.yaml", "/config/config.yaml"]
                .into_iter()
                .find(|p| Path::new(p).exists())
                .map(str::to_string)
        });

    // Logging is not initialized yet, so report on stderr
    let config = if let Some(path) = config_path {
        eprintln!("Loading config from {path}");
        Config::from_file(&path).map_err(|e| anyhow::anyhow!("Failed to load {path}: {e}"))?
    } else {
        eprintln!("No config file found, using environment variables");
        Config::from_env()?
    };

    // Fail fast on misconfigurations
    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Config validation error: {error}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        ));
    }

    Ok(config)
}

/// Log the effective settings once logging is up
pub fn log_config_summary(config: &Config) {
    info!(
        name = %config.server.name,
        version = %config.server.version,
        http_address = %config.http_address(),
        base_url = %config.public_base_url(),
        cache_backend = ?config.cache.backend,
        provider_timeout_ms = config.providers.timeout_ms,
        "Configuration loaded and validated"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_path_must_exist() {
        assert!(load_config(Some("/no/such/config.yaml")).is_err());
    }

    #[test]
    fn test_explicit_path_loaded_and_validated() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "server:\n  port: 9100\n").unwrap();
        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.server.port, 9100);

        let mut bad = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(bad, "server:\n  port: 0\n").unwrap();
        assert!(load_config(bad.path().to_str()).is_err());
    }
}
