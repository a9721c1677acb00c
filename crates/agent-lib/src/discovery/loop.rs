//! Periodic discovery loop
//!
//! Drives `DiscoveryWorker` on a fixed interval until shutdown, recording
//! cycle metrics and reflecting the outcome in component health.

use super::worker::{DiscoveryResult, DiscoveryWorker};
use crate::cache::OwnershipCache;
use crate::cluster::{ClusterScraper, MetricsSource};
use crate::config::DiscoveryConfig;
use crate::dtofactory::ContainerSpecDtoBuilder;
use crate::health::{components, HealthRegistry};
use crate::observability::{DiscoveryMetrics, StructuredLogger};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Latest completed discovery result, shared with readers
pub type LatestDiscovery = Arc<RwLock<Option<Arc<DiscoveryResult>>>>;

/// Discovery loop that periodically runs a full discovery cycle
pub struct DiscoveryLoop {
    worker: Arc<DiscoveryWorker>,
    health: HealthRegistry,
    interval: Duration,
    logger: StructuredLogger,
    metrics: DiscoveryMetrics,
    latest: LatestDiscovery,
}

impl DiscoveryLoop {
    pub fn latest(&self) -> LatestDiscovery {
        self.latest.clone()
    }

    pub fn worker(&self) -> Arc<DiscoveryWorker> {
        self.worker.clone()
    }

    /// Run until a shutdown signal is received
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting discovery loop"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycle = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    cycle += 1;
                    self.run_cycle(cycle).await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down discovery loop");
                    break;
                }
            }
        }
    }

    /// Run a single cycle and publish its outcome
    pub async fn run_cycle(&self, cycle: u64) {
        let start = Instant::now();
        match self.worker.discover().await {
            Ok(result) => {
                let elapsed = start.elapsed();
                self.metrics.observe_cycle_duration(elapsed.as_secs_f64());
                self.logger.log_cycle_summary(
                    cycle,
                    result.instances.len(),
                    result.container_specs.len(),
                    result.resolution_errors,
                    result.aggregation_errors,
                    elapsed.as_millis(),
                );

                self.health.set_healthy(components::CLUSTER_SCRAPER).await;
                match &result.metrics_error {
                    Some(e) => {
                        self.health
                            .set_degraded(components::METRICS_SOURCE, e.clone())
                            .await
                    }
                    None => self.health.set_healthy(components::METRICS_SOURCE).await,
                }
                if result.resolution_errors > 0 || result.aggregation_errors > 0 {
                    self.health
                        .set_degraded(
                            components::DISCOVERY,
                            format!(
                                "{} pods and {} container specs omitted",
                                result.resolution_errors, result.aggregation_errors
                            ),
                        )
                        .await;
                } else {
                    self.health.set_healthy(components::DISCOVERY).await;
                }

                *self.latest.write().await = Some(Arc::new(result));
                self.health.record_cycle_completed().await;
            }
            Err(e) => {
                self.logger.log_cycle_failed(cycle, &format!("{:#}", e));
                self.health
                    .set_unhealthy(components::CLUSTER_SCRAPER, format!("{:#}", e))
                    .await;
                self.health
                    .set_degraded(components::DISCOVERY, "last discovery cycle failed")
                    .await;
                self.health.record_cycle_failed().await;
            }
        }
        debug!(cycle, "Discovery cycle finished");
    }
}

/// Builder for creating the discovery loop
pub struct DiscoveryLoopBuilder {
    scraper: Option<Arc<dyn ClusterScraper>>,
    metrics_source: Option<Arc<dyn MetricsSource>>,
    health: HealthRegistry,
    config: DiscoveryConfig,
    cache: Option<OwnershipCache>,
    node_name: String,
}

impl DiscoveryLoopBuilder {
    pub fn new() -> Self {
        Self {
            scraper: None,
            metrics_source: None,
            health: HealthRegistry::new(),
            config: DiscoveryConfig::default(),
            cache: None,
            node_name: "unknown".to_string(),
        }
    }

    /// Set the cluster scraper
    pub fn scraper(mut self, scraper: Arc<dyn ClusterScraper>) -> Self {
        self.scraper = Some(scraper);
        self
    }

    /// Set the container metrics source
    pub fn metrics_source(mut self, metrics_source: Arc<dyn MetricsSource>) -> Self {
        self.metrics_source = Some(metrics_source);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn config(mut self, config: DiscoveryConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing ownership cache instead of creating one from config
    pub fn cache(mut self, cache: OwnershipCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn node_name(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = node_name.into();
        self
    }

    /// Build the discovery loop
    pub fn build(self) -> Result<DiscoveryLoop> {
        self.config.validate()?;
        let scraper = self
            .scraper
            .ok_or_else(|| anyhow::anyhow!("Cluster scraper is required"))?;
        let metrics_source = self
            .metrics_source
            .ok_or_else(|| anyhow::anyhow!("Metrics source is required"))?;

        let cache = self
            .cache
            .unwrap_or_else(|| OwnershipCache::new(self.config.ownership_cache_ttl()));
        let dto_builder = ContainerSpecDtoBuilder::new(self.config.aggregation_engine()?);
        let logger = StructuredLogger::new(self.node_name);
        let worker = DiscoveryWorker::new(scraper, metrics_source, cache, dto_builder, logger.clone());

        Ok(DiscoveryLoop {
            worker: Arc::new(worker),
            health: self.health,
            interval: self.config.discovery_interval(),
            logger,
            metrics: DiscoveryMetrics::new(),
            latest: Arc::new(RwLock::new(None)),
        })
    }
}

impl Default for DiscoveryLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
