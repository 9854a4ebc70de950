//! Provider health service
//!
//! Checks every registered provider (enabled or not) concurrently, each under
//! its own timeout, and keeps the latest report for the health endpoint.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::resolution::{millis, panic_message};
use crate::provider::ProviderRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub providers: BTreeMap<String, bool>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    #[must_use]
    pub fn all_healthy(&self) -> bool {
        self.providers.values().all(|ok| *ok)
    }
}

pub struct HealthService {
    registry: Arc<ProviderRegistry>,
    http: reqwest::Client,
    timeout: Duration,
    last: RwLock<Option<HealthReport>>,
}

impl HealthService {
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>, http: reqwest::Client, timeout: Duration) -> Self {
        Self {
            registry,
            http,
            timeout,
            last: RwLock::new(None),
        }
    }

    /// Check all providers; a timeout counts as unreachable
    pub async fn check_all(&self) -> BTreeMap<String, bool> {
        let providers = self.registry.all();

        let checks = providers.iter().map(|provider| async {
            let check = AssertUnwindSafe(provider.health_check(&self.http)).catch_unwind();
            let healthy = match tokio::time::timeout(self.timeout, check).await {
                Ok(Ok(healthy)) => healthy,
                Ok(Err(panic)) => {
                    tracing::error!(
                        provider_id = %provider.id(),
                        panic = %panic_message(panic.as_ref()),
                        "Health check panicked"
                    );
                    false
                }
                Err(_) => {
                    tracing::warn!(
                        provider_id = %provider.id(),
                        timeout_ms = millis(self.timeout),
                        "Health check timed out"
                    );
                    false
                }
            };
            (provider.id().to_string(), healthy)
        });

        let providers: BTreeMap<String, bool> = join_all(checks).await.into_iter().collect();

        let unhealthy = providers.values().filter(|ok| !**ok).count();
        tracing::info!(total = providers.len(), unhealthy, "Provider health check finished");

        *self.last.write() = Some(HealthReport {
            providers: providers.clone(),
            checked_at: Utc::now(),
        });
        providers
    }

    /// Latest stored report, if any check has run
    #[must_use]
    pub fn last_report(&self) -> Option<HealthReport> {
        self.last.read().clone()
    }

    /// Latest report, running a check first when none exists yet
    pub async fn report(&self) -> HealthReport {
        if let Some(report) = self.last_report() {
            return report;
        }
        let providers = self.check_all().await;
        self.last_report().unwrap_or_else(|| HealthReport {
            providers,
            checked_at: Utc::now(),
        })
    }

    /// Run `check_all` every `interval` until the task is aborted
    pub fn start_periodic(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.check_all().await;
            }
        })
    }
}

impl std::fmt::Debug for HealthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthService")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaRequest, ProviderResult};
    use crate::provider::{Provider, ProviderContext, ProviderError};

    struct Checked {
        id: &'static str,
        delay: Duration,
        healthy: bool,
        panics: bool,
    }

    #[async_trait::async_trait]
    impl Provider for Checked {
        fn id(&self) -> &str {
            self.id
        }

        fn name(&self) -> &str {
            self.id
        }

        async fn movie_sources(
            &self,
            _ctx: &ProviderContext<'_>,
            _media: &MediaRequest,
        ) -> Result<ProviderResult, ProviderError> {
            Ok(ProviderResult::empty())
        }

        async fn tv_sources(
            &self,
            _ctx: &ProviderContext<'_>,
            _media: &MediaRequest,
        ) -> Result<ProviderResult, ProviderError> {
            Ok(ProviderResult::empty())
        }

        async fn health_check(&self, _http: &reqwest::Client) -> bool {
            tokio::time::sleep(self.delay).await;
            assert!(!self.panics, "health check of {} blew up", self.id);
            self.healthy
        }
    }

    fn registry() -> Arc<ProviderRegistry> {
        let registry = Arc::new(ProviderRegistry::new());
        for (id, delay_ms, healthy) in [("up", 0, true), ("down", 0, false), ("slow", 2_000, true)] {
            registry
                .register(Arc::new(Checked {
                    id,
                    delay: Duration::from_millis(delay_ms),
                    healthy,
                    panics: false,
                }))
                .unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_check_all_with_timeout() {
        let registry = registry();
        registry.disable("up").unwrap();
        let service = HealthService::new(registry, reqwest::Client::new(), Duration::from_millis(100));

        let started = std::time::Instant::now();
        let report = service.check_all().await;
        assert!(started.elapsed() < Duration::from_secs(1));

        // Disabled providers are still checked
        assert_eq!(report.get("up"), Some(&true));
        assert_eq!(report.get("down"), Some(&false));
        assert_eq!(report.get("slow"), Some(&false));

        let stored = service.last_report().unwrap();
        assert_eq!(stored.providers, report);
        assert!(!stored.all_healthy());
    }

    #[tokio::test]
    async fn test_panicking_check_reports_unhealthy() {
        let registry = registry();
        registry
            .register(Arc::new(Checked {
                id: "boom",
                delay: Duration::ZERO,
                healthy: true,
                panics: true,
            }))
            .unwrap();
        let service = Arc::new(HealthService::new(
            registry,
            reqwest::Client::new(),
            Duration::from_millis(100),
        ));

        let task = Arc::clone(&service);
        let report = tokio::spawn(async move { task.check_all().await })
            .await
            .unwrap();

        assert_eq!(report.get("boom"), Some(&false));
        assert_eq!(report.get("up"), Some(&true));
        assert_eq!(report.len(), 4);
        assert!(service.last_report().is_some());
    }

    #[tokio::test]
    async fn test_report_runs_on_demand() {
        let service = HealthService::new(registry(), reqwest::Client::new(), Duration::from_millis(50));
        assert!(service.last_report().is_none());
        let report = service.report().await;
        assert_eq!(report.providers.len(), 3);
        assert!(service.last_report().is_some());
    }

    #[tokio::test]
    async fn test_periodic_refresh() {
        let service = Arc::new(HealthService::new(
            registry(),
            reqwest::Client::new(),
            Duration::from_millis(20),
        ));
        let handle = Arc::clone(&service).start_periodic(Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.abort();
        assert!(service.last_report().is_some());
    }
}
