//! SourceTV server lifecycle
//!
//! Binds the HTTP listener, serves the API router and drains in-flight
//! requests on SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sourcetv_api::{create_router, AppState};
use sourcetv_core::{bootstrap::Services, Config};
use tokio::task::JoinHandle;
use tracing::{error, info};

pub struct SourceTvServer {
    config: Arc<Config>,
    services: Services,
    health_task: Option<JoinHandle<()>>,
}

impl SourceTvServer {
    pub fn new(config: Config, services: Services) -> Self {
        Self {
            config: Arc::new(config),
            services,
            health_task: None,
        }
    }

    /// Start serving and wait for a shutdown signal
    pub async fn start(mut self) -> anyhow::Result<()> {
        let interval = self.config.providers.health_interval_secs;
        if interval > 0 {
            info!(interval_secs = interval, "Starting periodic provider health checks");
            self.health_task = Some(
                Arc::clone(&self.services.health).start_periodic(Duration::from_secs(interval)),
            );
        } else {
            info!("Periodic provider health checks disabled");
        }

        let http_address = self.config.http_address();
        let http_addr: SocketAddr = http_address
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid HTTP address '{http_address}': {e}"))?;

        let listener = tokio::net::TcpListener::bind(http_addr).await.map_err(|e| {
            error!("Failed to bind HTTP address {}: {}", http_addr, e);
            anyhow::anyhow!("Failed to bind {http_addr}: {e}")
        })?;

        let router = create_router(AppState::new(
            self.services.clone(),
            Arc::clone(&self.config),
        ));

        info!("HTTP server listening on {}", http_addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {e}"))?;

        self.shutdown();
        Ok(())
    }

    fn shutdown(&mut self) {
        info!("Shutting down SourceTV server...");
        if let Some(task) = self.health_task.take() {
            task.abort();
        }
        info!("HTTP server shut down gracefully");
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }
}
