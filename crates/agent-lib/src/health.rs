//! Liveness and readiness of the mediation agent
//!
//! Components report into a shared registry together with the progress of
//! the discovery loop. The agent is live while no component is unhealthy.
//! It is ready once the supply chain is registered and at least one
//! discovery cycle has completed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still producing results, some of them partial
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        *self != ComponentStatus::Unhealthy
    }
}

/// Last reported state of one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ComponentHealth {
    pub fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            updated_at: Utc::now(),
        }
    }

    pub fn healthy() -> Self {
        Self::new(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::new(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::new(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Progress of supply chain registration and the discovery loop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryProgress {
    /// Number of templates in the registered supply chain, 0 before registration
    pub supply_chain_templates: usize,
    pub completed_cycles: u64,
    pub failed_cycles: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub shutting_down: bool,
}

/// Liveness report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
    pub discovery: DiscoveryProgress,
}

impl HealthResponse {
    /// Worst status among `components`; an empty set is healthy
    pub fn compute_status(components: &BTreeMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Readiness report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ReadinessResponse {
    fn ready() -> Self {
        Self {
            ready: true,
            reason: None,
        }
    }

    fn not_ready(reason: impl Into<String>) -> Self {
        Self {
            ready: false,
            reason: Some(reason.into()),
        }
    }
}

/// Component names for health tracking
pub mod components {
    pub const CLUSTER_SCRAPER: &str = "cluster_scraper";
    pub const METRICS_SOURCE: &str = "metrics_source";
    pub const SUPPLY_CHAIN: &str = "supply_chain";
    pub const DISCOVERY: &str = "discovery";

    pub const ALL: [&str; 4] = [CLUSTER_SCRAPER, METRICS_SOURCE, SUPPLY_CHAIN, DISCOVERY];
}

#[derive(Debug, Default)]
struct RegistryState {
    components: BTreeMap<String, ComponentHealth>,
    progress: DiscoveryProgress,
}

/// Shared health state of the agent
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a component, starting healthy
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    /// Track every agent component. The supply chain starts degraded until
    /// it is registered.
    pub async fn register_all(&self) {
        for name in components::ALL {
            self.register(name).await;
        }
        self.set_degraded(components::SUPPLY_CHAIN, "not registered")
            .await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.state
            .write()
            .await
            .components
            .insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Record a built supply chain of `templates` entity templates
    pub async fn supply_chain_registered(&self, templates: usize) {
        let mut state = self.state.write().await;
        state.progress.supply_chain_templates = templates;
        let health = if templates == 0 {
            ComponentHealth::unhealthy("supply chain has no templates")
        } else {
            ComponentHealth::healthy()
        };
        state
            .components
            .insert(components::SUPPLY_CHAIN.to_string(), health);
    }

    pub async fn record_cycle_completed(&self) {
        let mut state = self.state.write().await;
        state.progress.completed_cycles += 1;
        state.progress.last_completed_at = Some(Utc::now());
    }

    pub async fn record_cycle_failed(&self) {
        self.state.write().await.progress.failed_cycles += 1;
    }

    /// Stop reporting ready while the agent drains
    pub async fn begin_shutdown(&self) {
        self.state.write().await.progress.shutting_down = true;
    }

    pub async fn progress(&self) -> DiscoveryProgress {
        self.state.read().await.progress.clone()
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        HealthResponse {
            status: HealthResponse::compute_status(&state.components),
            components: state.components.clone(),
            discovery: state.progress.clone(),
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        let progress = &state.progress;

        let supply_chain_ok = progress.supply_chain_templates > 0
            && state
                .components
                .get(components::SUPPLY_CHAIN)
                .map_or(true, |c| c.status == ComponentStatus::Healthy);

        if progress.shutting_down {
            return ReadinessResponse::not_ready("Shutting down");
        }
        if !supply_chain_ok {
            return ReadinessResponse::not_ready("Supply chain not yet registered");
        }
        if progress.completed_cycles == 0 {
            return ReadinessResponse::not_ready("No discovery cycle has completed");
        }
        if let Some((name, _)) = state
            .components
            .iter()
            .find(|(_, c)| c.status == ComponentStatus::Unhealthy)
        {
            return ReadinessResponse::not_ready(format!("{} is unhealthy", name));
        }
        ReadinessResponse::ready()
    }
}
