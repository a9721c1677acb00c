//! Discovery configuration

use crate::aggregation::{AggregationEngine, UsageStrategy, UtilizationStrategy};
use crate::cache::{DEFAULT_CACHE_TTL, MAX_CACHE_TTL};
use crate::error::{DiscoveryError, Result};
use crate::supply_chain::{StitchingPropertyType, SupplyChainFactory};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings of the discovery core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Node property used to stitch with external VMs: "UUID" or "IP"
    #[serde(default = "default_stitching_property")]
    pub stitching_property: String,

    /// Utilization data aggregation strategy
    #[serde(default = "default_utilization_strategy")]
    pub utilization_strategy: String,

    /// Usage data aggregation strategy
    #[serde(default = "default_usage_strategy")]
    pub usage_strategy: String,

    /// Lifetime of resolved ownership records
    #[serde(default = "default_ownership_cache_ttl")]
    pub ownership_cache_ttl_secs: u64,

    /// Time between discovery cycles
    #[serde(default = "default_discovery_interval")]
    pub discovery_interval_secs: u64,

    /// Priority of the node template
    #[serde(default = "default_vm_priority")]
    pub vm_priority: i32,

    /// Whether the node template is a base template rather than an extension
    #[serde(default)]
    pub vm_template_base: bool,
}

fn default_stitching_property() -> String {
    StitchingPropertyType::default().as_str().to_string()
}

fn default_utilization_strategy() -> String {
    UtilizationStrategy::default().name().to_string()
}

fn default_usage_strategy() -> String {
    UsageStrategy::default().name().to_string()
}

fn default_ownership_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL.as_secs()
}

fn default_discovery_interval() -> u64 {
    600
}

fn default_vm_priority() -> i32 {
    -1
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            stitching_property: default_stitching_property(),
            utilization_strategy: default_utilization_strategy(),
            usage_strategy: default_usage_strategy(),
            ownership_cache_ttl_secs: default_ownership_cache_ttl(),
            discovery_interval_secs: default_discovery_interval(),
            vm_priority: default_vm_priority(),
            vm_template_base: false,
        }
    }
}

/// Longest supported time between discovery cycles (one week)
pub const MAX_DISCOVERY_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

fn check_range(field: &str, value: u64, max: u64) -> Result<()> {
    if value == 0 || value > max {
        return Err(DiscoveryError::InvalidConfig(format!(
            "{} must be between 1 and {}, got {}",
            field, max, value
        )));
    }
    Ok(())
}

impl DiscoveryConfig {
    /// Check every named setting resolves and durations are within bounds
    pub fn validate(&self) -> Result<()> {
        self.stitching()?;
        self.aggregation_engine()?;
        check_range(
            "ownership_cache_ttl_secs",
            self.ownership_cache_ttl_secs,
            MAX_CACHE_TTL.as_secs(),
        )?;
        check_range(
            "discovery_interval_secs",
            self.discovery_interval_secs,
            MAX_DISCOVERY_INTERVAL_SECS,
        )?;
        Ok(())
    }

    pub fn stitching(&self) -> Result<StitchingPropertyType> {
        self.stitching_property.parse()
    }

    pub fn aggregation_engine(&self) -> Result<AggregationEngine> {
        AggregationEngine::from_names(&self.utilization_strategy, &self.usage_strategy)
    }

    pub fn supply_chain_factory(&self) -> Result<SupplyChainFactory> {
        Ok(SupplyChainFactory::new(
            self.stitching()?,
            self.vm_priority,
            self.vm_template_base,
        ))
    }

    pub fn ownership_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.ownership_cache_ttl_secs)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }
}
