mod server;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use sourcetv_core::{
    bootstrap::{init_services, load_config, log_config_summary, register_providers},
    logging,
};

use server::SourceTvServer;

/// Streaming source aggregator
#[derive(Debug, Parser)]
#[command(name = "sourcetv", version, about)]
struct Cli {
    /// Path to a YAML/TOML/JSON config file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load and validate configuration
    let config = load_config(cli.config.as_deref())?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("SourceTV server starting...");
    log_config_summary(&config);

    // 3. Initialize services
    let services = init_services(&config)?;

    // 4. Register configured and discovered providers
    let report = register_providers(&services, &config);
    for diagnostic in &report.diagnostics {
        warn!(
            file = diagnostic.field.as_deref().unwrap_or_default(),
            "{}",
            diagnostic.message
        );
    }
    if services.registry.is_empty() {
        warn!("No providers registered; every resolution will come back empty");
    }

    // 5. Serve until shutdown
    SourceTvServer::new(config, services).start().await
}
