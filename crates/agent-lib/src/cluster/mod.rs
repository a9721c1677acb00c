//! Read-only access to cluster state
//!
//! The discovery core talks to the cluster through the `ClusterScraper` and
//! `MetricsSource` traits. `KubeClusterScraper` and `MetricsServerSource`
//! implement them against the Kubernetes API with kube-rs; tests provide
//! their own in-memory implementations.

mod convert;
mod kube_scraper;
mod metrics_server;
mod quantity;

pub use convert::{is_pod_running_and_ready, owner_refs_from_meta};
pub use kube_scraper::KubeClusterScraper;
pub use metrics_server::{container_samples_for, MetricsServerSource, UsageReading};
pub use quantity::parse_quantity;

use crate::models::{
    ContainerSample, NodeInfo, ParentObject, QuotaInfo, ServiceInfo, WorkloadInstance,
};
use anyhow::Result;
use std::collections::{HashMap, HashSet};

pub use async_trait::async_trait;

/// Point-in-time listings of cluster objects
#[async_trait]
pub trait ClusterScraper: Send + Sync {
    /// List all infrastructure nodes
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>>;

    /// List all namespace names
    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// List resource quotas across all namespaces
    async fn list_quotas(&self) -> Result<Vec<QuotaInfo>>;

    /// List pods that are running and ready
    async fn list_running_pods(&self) -> Result<Vec<WorkloadInstance>>;

    /// List all services across all namespaces
    async fn list_services(&self) -> Result<Vec<ServiceInfo>>;

    /// UID of the `default/kubernetes` service, used as the cluster identity
    async fn kubernetes_service_id(&self) -> Result<String>;

    /// Fetch a replica-set style controller by kind, namespace and name
    async fn get_controller(&self, kind: &str, namespace: &str, name: &str)
        -> Result<ParentObject>;

    /// Quotas grouped by the namespace that defines them. A quota listed
    /// more than once is kept once.
    async fn namespace_quotas(&self) -> Result<HashMap<String, Vec<QuotaInfo>>> {
        let mut seen = HashSet::new();
        let mut quota_map: HashMap<String, Vec<QuotaInfo>> = HashMap::new();
        for quota in self.list_quotas().await? {
            if !seen.insert(quota.uid.clone()) {
                continue;
            }
            quota_map
                .entry(quota.namespace.clone())
                .or_default()
                .push(quota);
        }
        Ok(quota_map)
    }
}

/// Per-container resource observations
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Collect samples for the containers of the given pods. Nodes are passed
    /// so containers without limits can fall back to node capacity.
    async fn container_samples(
        &self,
        pods: &[WorkloadInstance],
        nodes: &[NodeInfo],
    ) -> Result<Vec<ContainerSample>>;
}
