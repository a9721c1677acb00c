//! Core data models for the discovery core

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Controller kinds whose owner is worth following one more hop
pub const KIND_REPLICA_SET: &str = "ReplicaSet";
pub const KIND_REPLICATION_CONTROLLER: &str = "ReplicationController";

/// Reference from an object to one of its owners
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub kind: String,
    pub name: String,
    pub uid: String,
    #[serde(default)]
    pub controller: bool,
}

impl OwnerRef {
    /// True when kind, name and uid are all present
    pub fn is_complete(&self) -> bool {
        !self.kind.is_empty() && !self.name.is_empty() && !self.uid.is_empty()
    }
}

/// Pick the owner that manages an object: the managing controller if one is
/// flagged, otherwise the first listed owner.
pub fn controlling_owner(owners: &[OwnerRef]) -> Option<&OwnerRef> {
    owners
        .iter()
        .find(|o| o.controller)
        .or_else(|| owners.first())
}

/// Declared resources of one container in a workload instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub name: String,
    pub cpu_limit_cores: Option<f64>,
    pub memory_limit_bytes: Option<f64>,
    pub cpu_request_cores: Option<f64>,
    pub memory_request_bytes: Option<f64>,
}

/// One running workload unit (a pod) as seen by a single discovery sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadInstance {
    pub namespace: String,
    pub name: String,
    pub uid: String,
    pub node_name: Option<String>,
    pub owner_references: Vec<OwnerRef>,
    pub containers: Vec<ContainerInfo>,
}

impl WorkloadInstance {
    /// Immediate parent of this instance
    pub fn parent(&self) -> Option<&OwnerRef> {
        controlling_owner(&self.owner_references)
    }

    /// Stable identity used to key ownership lookups
    pub fn controller_info_key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Resolved top-level controller of a workload instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipRecord {
    pub kind: String,
    pub name: String,
    pub uid: String,
}

impl OwnershipRecord {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            uid: uid.into(),
        }
    }
}

impl From<&OwnerRef> for OwnershipRecord {
    fn from(owner: &OwnerRef) -> Self {
        Self::new(owner.kind.clone(), owner.name.clone(), owner.uid.clone())
    }
}

/// A replica-set style controller object fetched from the cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentObject {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub uid: String,
    pub replicas: Option<i32>,
    pub owner_references: Vec<OwnerRef>,
}

/// Infrastructure node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    pub uid: String,
    pub system_uuid: Option<String>,
    pub addresses: Vec<String>,
    pub cpu_capacity_cores: Option<f64>,
    pub memory_capacity_bytes: Option<f64>,
}

/// Cluster service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub namespace: String,
    pub name: String,
    pub uid: String,
    pub selector: BTreeMap<String, String>,
}

/// Namespace resource quota
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaInfo {
    pub namespace: String,
    pub name: String,
    pub uid: String,
    pub hard: BTreeMap<String, f64>,
}

/// Resource types sampled per container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Cpu,
    Memory,
    CpuRequest,
    MemoryRequest,
}

impl ResourceType {
    pub const ALL: [ResourceType; 4] = [
        ResourceType::Cpu,
        ResourceType::Memory,
        ResourceType::CpuRequest,
        ResourceType::MemoryRequest,
    ];
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Cpu => write!(f, "cpu"),
            ResourceType::Memory => write!(f, "memory"),
            ResourceType::CpuRequest => write!(f, "cpu_request"),
            ResourceType::MemoryRequest => write!(f, "memory_request"),
        }
    }
}

/// One observation of a raw value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub value: f64,
    pub timestamp_ms: i64,
}

impl MetricPoint {
    pub fn new(value: f64, timestamp_ms: i64) -> Self {
        Self {
            value,
            timestamp_ms,
        }
    }
}

/// Samples of one resource type for one container replica
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSample {
    pub pod_uid: String,
    pub container_name: String,
    pub resource_type: ResourceType,
    pub capacity: f64,
    pub points: Vec<MetricPoint>,
}

/// Samples of one resource type across all replicas of a container spec
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerMetrics {
    pub capacity: f64,
    pub used: Vec<MetricPoint>,
}

impl ContainerMetrics {
    /// Timestamp of the most recent sample, or 0 when there is none
    pub fn last_point_timestamp_ms(&self) -> i64 {
        self.used.iter().map(|p| p.timestamp_ms).max().unwrap_or(0)
    }
}

/// Per-controller aggregate of one container across its replicas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpecMetrics {
    pub namespace: String,
    pub controller_uid: String,
    pub container_spec_name: String,
    pub container_spec_id: String,
    pub container_replicas: usize,
    pub container_metrics: BTreeMap<ResourceType, ContainerMetrics>,
}

impl ContainerSpecMetrics {
    pub fn new(namespace: &str, controller_uid: &str, container_name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            controller_uid: controller_uid.to_string(),
            container_spec_name: container_name.to_string(),
            container_spec_id: container_spec_id(controller_uid, container_name),
            container_replicas: 0,
            container_metrics: BTreeMap::new(),
        }
    }
}

/// Identity of a container spec derived from its controller and container name
pub fn container_spec_id(controller_uid: &str, container_name: &str) -> String {
    format!("{}/{}", controller_uid, container_name)
}

/// Utilization time series attached to a commodity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSeries {
    pub points: Vec<f64>,
    pub last_point_timestamp_ms: i64,
    pub sampling_interval_ms: i32,
}

/// Commodity types bought and sold across the supply chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommodityType {
    Vcpu,
    Vmem,
    VcpuRequest,
    VmemRequest,
    VcpuLimitQuota,
    VmemLimitQuota,
    VcpuRequestQuota,
    VmemRequestQuota,
    Cluster,
    VmpmAccess,
    Application,
    NumberConsumers,
    Vstorage,
}

impl fmt::Display for CommodityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommodityType::Vcpu => "VCPU",
            CommodityType::Vmem => "VMEM",
            CommodityType::VcpuRequest => "VCPU_REQUEST",
            CommodityType::VmemRequest => "VMEM_REQUEST",
            CommodityType::VcpuLimitQuota => "VCPU_LIMIT_QUOTA",
            CommodityType::VmemLimitQuota => "VMEM_LIMIT_QUOTA",
            CommodityType::VcpuRequestQuota => "VCPU_REQUEST_QUOTA",
            CommodityType::VmemRequestQuota => "VMEM_REQUEST_QUOTA",
            CommodityType::Cluster => "CLUSTER",
            CommodityType::VmpmAccess => "VMPM_ACCESS",
            CommodityType::Application => "APPLICATION",
            CommodityType::NumberConsumers => "NUMBER_CONSUMERS",
            CommodityType::Vstorage => "VSTORAGE",
        };
        f.write_str(name)
    }
}

/// Entity kinds in the supply chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    VirtualMachine,
    VirtualDatacenter,
    ContainerPod,
    Container,
    ContainerSpec,
    ApplicationComponent,
    Service,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityType::VirtualMachine => "VIRTUAL_MACHINE",
            EntityType::VirtualDatacenter => "VIRTUAL_DATACENTER",
            EntityType::ContainerPod => "CONTAINER_POD",
            EntityType::Container => "CONTAINER",
            EntityType::ContainerSpec => "CONTAINER_SPEC",
            EntityType::ApplicationComponent => "APPLICATION_COMPONENT",
            EntityType::Service => "SERVICE",
        };
        f.write_str(name)
    }
}

/// Commodity sold or bought by a discovered entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommodityDescriptor {
    pub commodity_type: CommodityType,
    pub used: f64,
    pub peak: f64,
    pub capacity: f64,
    pub resizable: bool,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utilization_data: Option<AggregatedSeries>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(kind: &str, name: &str, uid: &str, controller: bool) -> OwnerRef {
        OwnerRef {
            kind: kind.to_string(),
            name: name.to_string(),
            uid: uid.to_string(),
            controller,
        }
    }

    #[test]
    fn test_controlling_owner_prefers_controller_flag() {
        let owners = vec![
            owner("ConfigMap", "cm", "uid-1", false),
            owner("ReplicaSet", "rs", "uid-2", true),
        ];
        assert_eq!(controlling_owner(&owners).unwrap().kind, "ReplicaSet");
    }

    #[test]
    fn test_controlling_owner_falls_back_to_first() {
        let owners = vec![owner("StatefulSet", "db", "uid-1", false)];
        assert_eq!(controlling_owner(&owners).unwrap().name, "db");
        assert!(controlling_owner(&[]).is_none());
    }

    #[test]
    fn test_owner_ref_completeness() {
        assert!(owner("Deployment", "web", "uid", true).is_complete());
        assert!(!owner("Deployment", "", "uid", true).is_complete());
        assert!(!owner("", "web", "uid", true).is_complete());
    }

    #[test]
    fn test_last_point_timestamp() {
        let metrics = ContainerMetrics {
            capacity: 4.0,
            used: vec![MetricPoint::new(1.0, 7), MetricPoint::new(2.0, 3)],
        };
        assert_eq!(metrics.last_point_timestamp_ms(), 7);
        assert_eq!(ContainerMetrics::default().last_point_timestamp_ms(), 0);
    }

    #[test]
    fn test_commodity_type_serializes_screaming_snake() {
        let json = serde_json::to_string(&CommodityType::VcpuRequestQuota).unwrap();
        assert_eq!(json, "\"VCPU_REQUEST_QUOTA\"");
        assert_eq!(CommodityType::VcpuRequestQuota.to_string(), "VCPU_REQUEST_QUOTA");
    }
}
