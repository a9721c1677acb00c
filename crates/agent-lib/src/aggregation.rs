//! Aggregation of per-replica samples into controller-level series
//!
//! Two policies are applied to the raw observations of one resource type:
//! a utilization strategy producing the utilization series attached to a
//! commodity, and a usage strategy producing its used and peak values.
//! Both are closed enums resolved from their configured names.

use crate::error::{DiscoveryError, Result};
use crate::models::{AggregatedSeries, CommodityDescriptor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const ALL_UTILIZATION_DATA: &str = "allUtilizationData";
pub const MAX_UTILIZATION_DATA: &str = "maxUtilizationData";
pub const AVG_USAGE_DATA: &str = "avgUsageData";
pub const MAX_USAGE_DATA: &str = "maxUsageData";

const EMPTY_INPUT: &str = "commodities list is empty";
const ZERO_CAPACITY: &str = "capacity is 0";

/// One raw observation of a replica: used value against declared capacity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub used: f64,
    pub capacity: f64,
}

impl Observation {
    pub fn new(used: f64, capacity: f64) -> Self {
        Self { used, capacity }
    }

    /// Utilization as a percentage of capacity
    fn utilization(&self) -> f64 {
        self.used / self.capacity * 100.0
    }
}

impl From<&CommodityDescriptor> for Observation {
    fn from(commodity: &CommodityDescriptor) -> Self {
        Self::new(commodity.used, commodity.capacity)
    }
}

/// How per-replica utilization is reduced into a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UtilizationStrategy {
    /// Keep every observation as a point
    #[default]
    #[serde(rename = "allUtilizationData")]
    All,
    /// Keep only the highest observation
    #[serde(rename = "maxUtilizationData")]
    Max,
}

impl UtilizationStrategy {
    /// Configured name of the strategy
    pub fn name(&self) -> &'static str {
        match self {
            UtilizationStrategy::All => ALL_UTILIZATION_DATA,
            UtilizationStrategy::Max => MAX_UTILIZATION_DATA,
        }
    }

    /// Human readable description used in error messages
    pub fn description(&self) -> &'static str {
        match self {
            UtilizationStrategy::All => "all utilization data strategy",
            UtilizationStrategy::Max => "max utilization data strategy",
        }
    }

    /// Reduce `observations` of `resource` into a utilization series.
    ///
    /// The reference timestamp is passed through untouched and the sampling
    /// interval is always 0. Empty input or any zero capacity is an error.
    pub fn aggregate(
        &self,
        resource: &str,
        observations: &[Observation],
        last_point_timestamp_ms: i64,
    ) -> Result<AggregatedSeries> {
        let utilizations = self.utilizations(resource, observations)?;
        let points = match self {
            UtilizationStrategy::All => utilizations,
            UtilizationStrategy::Max => {
                vec![utilizations.into_iter().fold(0.0, f64::max)]
            }
        };
        Ok(AggregatedSeries {
            points,
            last_point_timestamp_ms,
            sampling_interval_ms: 0,
        })
    }

    fn utilizations(&self, resource: &str, observations: &[Observation]) -> Result<Vec<f64>> {
        if observations.is_empty() {
            return Err(aggregation_error(resource, self.description(), EMPTY_INPUT));
        }
        observations
            .iter()
            .map(|o| {
                if o.capacity == 0.0 {
                    Err(aggregation_error(resource, self.description(), ZERO_CAPACITY))
                } else {
                    Ok(o.utilization())
                }
            })
            .collect()
    }
}

impl fmt::Display for UtilizationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UtilizationStrategy {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            ALL_UTILIZATION_DATA => Ok(UtilizationStrategy::All),
            MAX_UTILIZATION_DATA => Ok(UtilizationStrategy::Max),
            other => Err(DiscoveryError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Used, peak and capacity values of a commodity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageSummary {
    pub used: f64,
    pub peak: f64,
    pub capacity: f64,
}

/// How per-replica raw values are reduced into used and peak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UsageStrategy {
    /// Used is the mean of all observations
    #[default]
    #[serde(rename = "avgUsageData")]
    Avg,
    /// Used is the highest observation
    #[serde(rename = "maxUsageData")]
    Max,
}

impl UsageStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            UsageStrategy::Avg => AVG_USAGE_DATA,
            UsageStrategy::Max => MAX_USAGE_DATA,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            UsageStrategy::Avg => "average usage data strategy",
            UsageStrategy::Max => "max usage data strategy",
        }
    }

    /// Reduce `observations` into used, peak and capacity. Peak is always the
    /// maximum raw value and capacity the largest declared capacity.
    pub fn aggregate(&self, resource: &str, observations: &[Observation]) -> Result<UsageSummary> {
        if observations.is_empty() {
            return Err(aggregation_error(resource, self.description(), EMPTY_INPUT));
        }

        let mut sum = 0.0;
        let mut peak = f64::MIN;
        let mut capacity = 0.0_f64;
        for o in observations {
            if o.capacity == 0.0 {
                return Err(aggregation_error(resource, self.description(), ZERO_CAPACITY));
            }
            sum += o.used;
            peak = peak.max(o.used);
            capacity = capacity.max(o.capacity);
        }

        let used = match self {
            UsageStrategy::Avg => sum / observations.len() as f64,
            UsageStrategy::Max => peak,
        };
        Ok(UsageSummary {
            used,
            peak,
            capacity,
        })
    }
}

impl fmt::Display for UsageStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UsageStrategy {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            AVG_USAGE_DATA => Ok(UsageStrategy::Avg),
            MAX_USAGE_DATA => Ok(UsageStrategy::Max),
            other => Err(DiscoveryError::UnknownStrategy(other.to_string())),
        }
    }
}

fn aggregation_error(resource: &str, strategy: &'static str, reason: &'static str) -> DiscoveryError {
    DiscoveryError::Aggregation {
        resource: resource.to_string(),
        strategy,
        reason,
    }
}

/// Pair of strategies applied to every container spec in a cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationEngine {
    utilization: UtilizationStrategy,
    usage: UsageStrategy,
}

impl AggregationEngine {
    pub fn new(utilization: UtilizationStrategy, usage: UsageStrategy) -> Self {
        Self { utilization, usage }
    }

    /// Build an engine from configured strategy names
    pub fn from_names(utilization: &str, usage: &str) -> Result<Self> {
        Ok(Self::new(utilization.parse()?, usage.parse()?))
    }

    pub fn utilization_strategy(&self) -> UtilizationStrategy {
        self.utilization
    }

    pub fn usage_strategy(&self) -> UsageStrategy {
        self.usage
    }

    pub fn utilization(
        &self,
        resource: &str,
        observations: &[Observation],
        last_point_timestamp_ms: i64,
    ) -> Result<AggregatedSeries> {
        self.utilization
            .aggregate(resource, observations, last_point_timestamp_ms)
    }

    pub fn usage(&self, resource: &str, observations: &[Observation]) -> Result<UsageSummary> {
        self.usage.aggregate(resource, observations)
    }
}
