//! `MetricsSource` backed by the metrics.k8s.io API
//!
//! Each scrape yields one usage point per container. Capacity is the
//! container limit when set, otherwise the hosting node's capacity.

use super::quantity::parse_quantity;
use super::MetricsSource;
use crate::models::{
    ContainerInfo, ContainerSample, MetricPoint, NodeInfo, ResourceType, WorkloadInstance,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::{Client, ResourceExt};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct ContainerUsage {
    name: String,
    #[serde(default)]
    usage: HashMap<String, String>,
}

/// Observed usage of one container, in cores and bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageReading {
    pub cpu_cores: Option<f64>,
    pub memory_bytes: Option<f64>,
}

/// Metrics source querying the cluster's metrics server
pub struct MetricsServerSource {
    client: Client,
}

impl MetricsServerSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn pod_metrics_api(&self) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "PodMetrics");
        let resource = ApiResource::from_gvk_with_plural(&gvk, "pods");
        Api::all_with(self.client.clone(), &resource)
    }
}

fn sample(
    pod: &WorkloadInstance,
    container: &ContainerInfo,
    resource_type: ResourceType,
    used: Option<f64>,
    capacity: Option<f64>,
    timestamp_ms: i64,
) -> Option<ContainerSample> {
    let (used, capacity) = (used?, capacity?);
    Some(ContainerSample {
        pod_uid: pod.uid.clone(),
        container_name: container.name.clone(),
        resource_type,
        capacity,
        points: vec![MetricPoint::new(used, timestamp_ms)],
    })
}

/// Build the samples of one container from a usage reading. Resources with
/// neither a limit nor a node capacity are skipped.
pub fn container_samples_for(
    pod: &WorkloadInstance,
    container: &ContainerInfo,
    usage: UsageReading,
    node: Option<&NodeInfo>,
    timestamp_ms: i64,
) -> Vec<ContainerSample> {
    let cpu_capacity = container
        .cpu_limit_cores
        .or_else(|| node.and_then(|n| n.cpu_capacity_cores));
    let memory_capacity = container
        .memory_limit_bytes
        .or_else(|| node.and_then(|n| n.memory_capacity_bytes));

    [
        sample(pod, container, ResourceType::Cpu, usage.cpu_cores, cpu_capacity, timestamp_ms),
        sample(
            pod,
            container,
            ResourceType::Memory,
            usage.memory_bytes,
            memory_capacity,
            timestamp_ms,
        ),
        sample(
            pod,
            container,
            ResourceType::CpuRequest,
            container.cpu_request_cores,
            cpu_capacity,
            timestamp_ms,
        ),
        sample(
            pod,
            container,
            ResourceType::MemoryRequest,
            container.memory_request_bytes,
            memory_capacity,
            timestamp_ms,
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn timestamp_ms_of(obj: &DynamicObject) -> i64 {
    obj.data
        .get("timestamp")
        .and_then(|t| t.as_str())
        .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.timestamp_millis())
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis())
}

fn container_usages(obj: &DynamicObject) -> Result<Vec<ContainerUsage>> {
    let containers = obj
        .data
        .get("containers")
        .cloned()
        .unwrap_or(serde_json::Value::Array(Vec::new()));
    serde_json::from_value(containers).context("Failed to parse container usage")
}

#[async_trait]
impl MetricsSource for MetricsServerSource {
    async fn container_samples(
        &self,
        pods: &[WorkloadInstance],
        nodes: &[NodeInfo],
    ) -> Result<Vec<ContainerSample>> {
        let metrics = self
            .pod_metrics_api()
            .list(&ListParams::default())
            .await
            .context("Failed to list pod metrics")?;

        let pods_by_key: HashMap<(String, String), &WorkloadInstance> = pods
            .iter()
            .map(|p| ((p.namespace.clone(), p.name.clone()), p))
            .collect();
        let nodes_by_name: HashMap<&str, &NodeInfo> =
            nodes.iter().map(|n| (n.name.as_str(), n)).collect();

        let mut samples = Vec::new();
        for obj in &metrics.items {
            let key = (obj.namespace().unwrap_or_default(), obj.name_any());
            let Some(pod) = pods_by_key.get(&key) else {
                continue;
            };
            let node = pod
                .node_name
                .as_deref()
                .and_then(|n| nodes_by_name.get(n).copied());
            let timestamp_ms = timestamp_ms_of(obj);

            let usages = match container_usages(obj) {
                Ok(usages) => usages,
                Err(e) => {
                    warn!(namespace = %key.0, pod = %key.1, error = %e, "Skipping pod metrics");
                    continue;
                }
            };

            for usage in usages {
                let Some(container) = pod.containers.iter().find(|c| c.name == usage.name) else {
                    continue;
                };
                let reading = UsageReading {
                    cpu_cores: usage.usage.get("cpu").and_then(|q| parse_quantity(q)),
                    memory_bytes: usage.usage.get("memory").and_then(|q| parse_quantity(q)),
                };
                samples.extend(container_samples_for(
                    pod,
                    container,
                    reading,
                    node,
                    timestamp_ms,
                ));
            }
        }

        debug!(samples = samples.len(), "Collected container samples");
        Ok(samples)
    }
}
