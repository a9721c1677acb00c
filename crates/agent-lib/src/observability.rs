//! Observability for the discovery core
//!
//! Provides:
//! - Prometheus metrics (cycle duration, ownership cache efficiency, error counts, entity counts)
//! - Structured JSON logging of discovery events with tracing

use crate::models::EntityType;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, register_int_gauge_vec,
    Histogram, IntCounter, IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for discovery cycle duration (in seconds)
const CYCLE_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<DiscoveryMetricsInner> = OnceLock::new();

struct DiscoveryMetricsInner {
    cycle_seconds: Histogram,
    cache_hits: IntCounter,
    cache_misses: IntCounter,
    resolution_errors: IntCounter,
    aggregation_errors: IntCounter,
    entities_discovered: IntGaugeVec,
    cache_entries: IntGauge,
}

impl DiscoveryMetricsInner {
    fn new() -> Self {
        Self {
            cycle_seconds: register_histogram!(
                "mediation_discovery_cycle_seconds",
                "Time spent running one discovery cycle",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register discovery_cycle_seconds"),

            cache_hits: register_int_counter!(
                "mediation_ownership_cache_hits_total",
                "Ownership resolutions answered from the cache"
            )
            .expect("Failed to register ownership_cache_hits_total"),

            cache_misses: register_int_counter!(
                "mediation_ownership_cache_misses_total",
                "Ownership resolutions that walked the owner chain"
            )
            .expect("Failed to register ownership_cache_misses_total"),

            resolution_errors: register_int_counter!(
                "mediation_resolution_errors_total",
                "Workload instances omitted because their controller could not be resolved"
            )
            .expect("Failed to register resolution_errors_total"),

            aggregation_errors: register_int_counter!(
                "mediation_aggregation_errors_total",
                "Container specs omitted because their samples could not be aggregated"
            )
            .expect("Failed to register aggregation_errors_total"),

            entities_discovered: register_int_gauge_vec!(
                "mediation_entities_discovered",
                "Entities discovered in the last cycle by entity kind",
                &["entity_type"]
            )
            .expect("Failed to register entities_discovered"),

            cache_entries: register_int_gauge!(
                "mediation_ownership_cache_entries",
                "Ownership records currently cached"
            )
            .expect("Failed to register ownership_cache_entries"),
        }
    }
}

/// Discovery metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct DiscoveryMetrics {
    _private: (),
}

impl Default for DiscoveryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DiscoveryMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &DiscoveryMetricsInner {
        GLOBAL_METRICS.get_or_init(DiscoveryMetricsInner::new)
    }

    pub fn observe_cycle_duration(&self, duration_secs: f64) {
        self.inner().cycle_seconds.observe(duration_secs);
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        if hit {
            self.inner().cache_hits.inc();
        } else {
            self.inner().cache_misses.inc();
        }
    }

    pub fn inc_resolution_errors(&self) {
        self.inner().resolution_errors.inc();
    }

    pub fn inc_aggregation_errors(&self) {
        self.inner().aggregation_errors.inc();
    }

    pub fn set_entities_discovered(&self, entity_type: EntityType, count: usize) {
        self.inner()
            .entities_discovered
            .with_label_values(&[&entity_type.to_string()])
            .set(count as i64);
    }

    pub fn set_cache_entries(&self, count: usize) {
        self.inner().cache_entries.set(count as i64);
    }
}

/// Structured logger for discovery events
///
/// Emits event-tagged records so cycles and failures can be followed in
/// JSON logs.
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, stitching_property: &str) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            stitching_property = %stitching_property,
            "Mediation agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Mediation agent shutting down"
        );
    }

    /// Log the supply chain built for this configuration
    pub fn log_supply_chain_registered(&self, templates: usize, stitching_property: &str) {
        info!(
            event = "supply_chain_registered",
            node = %self.node_name,
            templates = templates,
            stitching_property = %stitching_property,
            "Supply chain registered"
        );
    }

    /// Log the summary of one discovery cycle
    pub fn log_cycle_summary(
        &self,
        cycle: u64,
        pods: usize,
        container_specs: usize,
        resolution_errors: usize,
        aggregation_errors: usize,
        elapsed_ms: u128,
    ) {
        info!(
            event = "discovery_cycle",
            node = %self.node_name,
            cycle = cycle,
            pods = pods,
            container_specs = container_specs,
            resolution_errors = resolution_errors,
            aggregation_errors = aggregation_errors,
            elapsed_ms = elapsed_ms,
            "Discovery cycle complete"
        );
    }

    /// Log a discovery cycle that could not complete
    pub fn log_cycle_failed(&self, cycle: u64, error: &str) {
        warn!(
            event = "discovery_cycle_failed",
            node = %self.node_name,
            cycle = cycle,
            error = %error,
            "Discovery cycle failed"
        );
    }

    /// Log an instance omitted because its controller was not resolved
    pub fn log_resolution_failure(&self, namespace: &str, pod_name: &str, error: &str) {
        warn!(
            event = "resolution_failed",
            node = %self.node_name,
            namespace = %namespace,
            pod_name = %pod_name,
            error = %error,
            "Omitting pod with unresolved controller"
        );
    }

    /// Log a container spec omitted because aggregation failed
    pub fn log_aggregation_failure(&self, container_spec_id: &str, error: &str) {
        warn!(
            event = "aggregation_failed",
            node = %self.node_name,
            container_spec_id = %container_spec_id,
            error = %error,
            "Omitting container spec with unaggregatable samples"
        );
    }
}
