//! Commodity descriptor assembly
//!
//! Turns the per-replica samples of a container spec into the commodities
//! it sells. Every resource type is reduced through the configured
//! aggregation engine; a failure on any resource fails the whole spec.

use crate::aggregation::{AggregationEngine, Observation};
use crate::error::{DiscoveryError, Result};
use crate::models::{
    CommodityDescriptor, CommodityType, ContainerMetrics, ContainerSpecMetrics, ResourceType,
};
use serde::Serialize;

/// Commodity sold for each sampled resource type
pub fn commodity_type_of(resource_type: ResourceType) -> CommodityType {
    match resource_type {
        ResourceType::Cpu => CommodityType::Vcpu,
        ResourceType::Memory => CommodityType::Vmem,
        ResourceType::CpuRequest => CommodityType::VcpuRequest,
        ResourceType::MemoryRequest => CommodityType::VmemRequest,
    }
}

/// Raw per-replica commodities, one per observed point. These are inputs to
/// aggregation and are never active on their own.
pub fn replica_commodities(
    commodity_type: CommodityType,
    metrics: &ContainerMetrics,
) -> Vec<CommodityDescriptor> {
    metrics
        .used
        .iter()
        .map(|point| CommodityDescriptor {
            commodity_type,
            used: point.value,
            peak: point.value,
            capacity: metrics.capacity,
            resizable: false,
            active: false,
            utilization_data: None,
        })
        .collect()
}

/// Container spec entity as reported for one controller
#[derive(Debug, Clone, Serialize)]
pub struct ContainerSpecEntity {
    pub id: String,
    pub display_name: String,
    pub namespace: String,
    pub controller_uid: String,
    pub replicas: usize,
    pub commodities_sold: Vec<CommodityDescriptor>,
}

/// Builds container spec entities from aggregated metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerSpecDtoBuilder {
    engine: AggregationEngine,
}

impl ContainerSpecDtoBuilder {
    pub fn new(engine: AggregationEngine) -> Self {
        Self { engine }
    }

    pub fn build(&self, spec: &ContainerSpecMetrics) -> Result<ContainerSpecEntity> {
        Ok(ContainerSpecEntity {
            id: spec.container_spec_id.clone(),
            display_name: spec.container_spec_name.clone(),
            namespace: spec.namespace.clone(),
            controller_uid: spec.controller_uid.clone(),
            replicas: spec.container_replicas,
            commodities_sold: self.commodities_sold(spec)?,
        })
    }

    /// Controller-level commodities of `spec`, ordered by resource type
    pub fn commodities_sold(&self, spec: &ContainerSpecMetrics) -> Result<Vec<CommodityDescriptor>> {
        spec.container_metrics
            .iter()
            .map(|(resource_type, metrics)| self.commodity_sold(spec, *resource_type, metrics))
            .collect()
    }

    fn commodity_sold(
        &self,
        spec: &ContainerSpecMetrics,
        resource_type: ResourceType,
        metrics: &ContainerMetrics,
    ) -> Result<CommodityDescriptor> {
        if metrics.used.is_empty() {
            return Err(DiscoveryError::MissingSamples {
                container_spec_id: spec.container_spec_id.clone(),
                resource: resource_type,
            });
        }

        let commodity_type = commodity_type_of(resource_type);
        let name = commodity_type.to_string();
        let observations: Vec<Observation> = replica_commodities(commodity_type, metrics)
            .iter()
            .map(Observation::from)
            .collect();

        let utilization =
            self.engine
                .utilization(&name, &observations, metrics.last_point_timestamp_ms())?;
        let usage = self.engine.usage(&name, &observations)?;

        Ok(CommodityDescriptor {
            commodity_type,
            used: usage.used,
            peak: usage.peak,
            capacity: usage.capacity,
            resizable: true,
            active: true,
            utilization_data: Some(utilization),
        })
    }
}
