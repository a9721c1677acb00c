//! One discovery cycle
//!
//! Lists cluster state, resolves the controller of every running pod,
//! groups container samples by controller and container name, and builds
//! the container spec entities. Failures of a single pod or container spec
//! are logged and the item is omitted; listing failures fail the cycle.

use crate::cache::OwnershipCache;
use crate::cluster::{ClusterScraper, MetricsSource};
use crate::dtofactory::{ContainerSpecDtoBuilder, ContainerSpecEntity};
use crate::error::{DiscoveryError, ErrorKind};
use crate::models::{
    container_spec_id, ContainerSample, ContainerSpecMetrics, EntityType, OwnershipRecord,
    ResourceType, WorkloadInstance,
};
use crate::observability::{DiscoveryMetrics, StructuredLogger};
use crate::ownership::{ControllerResolution, OwnershipResolver};
use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// A pod together with its resolved controller
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedInstance {
    pub instance: WorkloadInstance,
    pub controller: OwnershipRecord,
}

/// Outcome of one discovery cycle
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryResult {
    pub timestamp_ms: i64,
    pub instances: Vec<ResolvedInstance>,
    pub container_specs: Vec<ContainerSpecEntity>,
    pub entity_counts: BTreeMap<EntityType, usize>,
    /// ResourceQuota objects per namespace, including namespaces without any
    pub quotas_by_namespace: BTreeMap<String, usize>,
    pub resolution_errors: usize,
    pub aggregation_errors: usize,
    /// Set when container samples could not be collected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_error: Option<String>,
}

/// Group samples of resolved pods by (controller uid, container name).
///
/// Capacity of each resource is the largest capacity seen across replicas,
/// except that a replica reporting zero capacity makes it zero so the spec
/// fails aggregation. Points are ordered by timestamp. Samples of unknown
/// pods are dropped.
pub fn group_container_specs(
    instances: &[ResolvedInstance],
    samples: Vec<ContainerSample>,
) -> Vec<ContainerSpecMetrics> {
    let by_pod: HashMap<&str, &ResolvedInstance> = instances
        .iter()
        .map(|r| (r.instance.uid.as_str(), r))
        .collect();

    let mut specs: BTreeMap<String, ContainerSpecMetrics> = BTreeMap::new();
    let mut replicas: HashMap<String, HashSet<String>> = HashMap::new();
    let mut seen_resources: HashSet<(String, ResourceType)> = HashSet::new();

    for sample in samples {
        let Some(resolved) = by_pod.get(sample.pod_uid.as_str()) else {
            continue;
        };
        let id = container_spec_id(&resolved.controller.uid, &sample.container_name);
        let spec = specs.entry(id.clone()).or_insert_with(|| {
            ContainerSpecMetrics::new(
                &resolved.instance.namespace,
                &resolved.controller.uid,
                &sample.container_name,
            )
        });

        let metrics = spec
            .container_metrics
            .entry(sample.resource_type)
            .or_default();
        let first = seen_resources.insert((id.clone(), sample.resource_type));
        metrics.capacity = if first {
            sample.capacity
        } else {
            merge_capacity(metrics.capacity, sample.capacity)
        };
        metrics.used.extend(sample.points);

        replicas.entry(id).or_default().insert(sample.pod_uid);
    }

    specs
        .into_iter()
        .map(|(id, mut spec)| {
            spec.container_replicas = replicas.get(&id).map(HashSet::len).unwrap_or(0);
            for metrics in spec.container_metrics.values_mut() {
                metrics.used.sort_by_key(|p| p.timestamp_ms);
            }
            spec
        })
        .collect()
}

/// Largest of two capacities; zero on either side stays zero
fn merge_capacity(current: f64, sample: f64) -> f64 {
    if current == 0.0 || sample == 0.0 {
        0.0
    } else {
        current.max(sample)
    }
}

/// Keep the first item seen for every unique id
fn dedupe_by_uid<T>(items: Vec<T>, uid: impl Fn(&T) -> &str) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(uid(item).to_string()))
        .collect()
}

/// Runs discovery cycles against a cluster
pub struct DiscoveryWorker {
    scraper: Arc<dyn ClusterScraper>,
    metrics_source: Arc<dyn MetricsSource>,
    resolver: Arc<OwnershipResolver>,
    dto_builder: ContainerSpecDtoBuilder,
    metrics: DiscoveryMetrics,
    logger: StructuredLogger,
}

impl DiscoveryWorker {
    pub fn new(
        scraper: Arc<dyn ClusterScraper>,
        metrics_source: Arc<dyn MetricsSource>,
        cache: OwnershipCache,
        dto_builder: ContainerSpecDtoBuilder,
        logger: StructuredLogger,
    ) -> Self {
        let resolver = Arc::new(OwnershipResolver::new(scraper.clone(), cache));
        Self {
            scraper,
            metrics_source,
            resolver,
            dto_builder,
            metrics: DiscoveryMetrics::new(),
            logger,
        }
    }

    pub fn ownership_cache(&self) -> &OwnershipCache {
        self.resolver.cache()
    }

    /// Run one full discovery cycle
    pub async fn discover(&self) -> Result<DiscoveryResult> {
        let (nodes, namespaces, pods, services, quotas) = tokio::try_join!(
            self.scraper.list_nodes(),
            self.scraper.list_namespaces(),
            self.scraper.list_running_pods(),
            self.scraper.list_services(),
            self.scraper.namespace_quotas(),
        )?;
        let nodes = dedupe_by_uid(nodes, |n| n.uid.as_str());
        let pods = dedupe_by_uid(pods, |p| p.uid.as_str());
        let services = dedupe_by_uid(services, |s| s.uid.as_str());

        let mut quotas_by_namespace: BTreeMap<String, usize> = namespaces
            .into_iter()
            .map(|namespace| (namespace, 0))
            .collect();
        for (namespace, defined) in &quotas {
            *quotas_by_namespace.entry(namespace.clone()).or_default() += defined.len();
        }
        debug!(
            nodes = nodes.len(),
            namespaces = quotas_by_namespace.len(),
            pods = pods.len(),
            services = services.len(),
            quotas = quotas_by_namespace.values().sum::<usize>(),
            "Listed cluster state"
        );

        let mut result = DiscoveryResult {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            quotas_by_namespace,
            ..Default::default()
        };

        result.instances = self.resolve_all(pods, &mut result.resolution_errors).await;

        let resolved_pods: Vec<WorkloadInstance> =
            result.instances.iter().map(|r| r.instance.clone()).collect();
        let samples = match self
            .metrics_source
            .container_samples(&resolved_pods, &nodes)
            .await
        {
            Ok(samples) => samples,
            Err(e) => {
                warn!(error = %e, "Failed to collect container samples");
                result.metrics_error = Some(e.to_string());
                Vec::new()
            }
        };

        for spec in group_container_specs(&result.instances, samples) {
            match self.dto_builder.build(&spec) {
                Ok(entity) => result.container_specs.push(entity),
                Err(e) => {
                    result.aggregation_errors += 1;
                    self.metrics.inc_aggregation_errors();
                    self.logger
                        .log_aggregation_failure(&spec.container_spec_id, &e.to_string());
                }
            }
        }

        let containers: usize = result
            .instances
            .iter()
            .map(|r| r.instance.containers.len())
            .sum();
        result.entity_counts = BTreeMap::from([
            (EntityType::VirtualMachine, nodes.len()),
            // One quota entity per namespace
            (EntityType::VirtualDatacenter, result.quotas_by_namespace.len()),
            (EntityType::ContainerPod, result.instances.len()),
            (EntityType::Container, containers),
            (EntityType::ContainerSpec, result.container_specs.len()),
            (EntityType::ApplicationComponent, containers),
            (EntityType::Service, services.len()),
        ]);
        for (entity_type, count) in &result.entity_counts {
            self.metrics.set_entities_discovered(*entity_type, *count);
        }

        let purged = self.ownership_cache().purge_expired();
        if purged > 0 {
            debug!(purged, "Purged expired ownership records");
        }
        self.metrics.set_cache_entries(self.ownership_cache().len());

        Ok(result)
    }

    /// Resolve every pod concurrently; unresolvable pods are omitted
    async fn resolve_all(
        &self,
        pods: Vec<WorkloadInstance>,
        errors: &mut usize,
    ) -> Vec<ResolvedInstance> {
        let mut tasks = JoinSet::new();
        for pod in pods {
            let resolver = self.resolver.clone();
            tasks.spawn(async move {
                let resolution = resolver.resolve_controller(&pod, false).await;
                (pod, resolution)
            });
        }

        let mut resolved = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (pod, resolution) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(error = %e, "Resolution task failed");
                    *errors += 1;
                    continue;
                }
            };
            match resolution {
                Ok(ControllerResolution {
                    record, from_cache, ..
                }) => {
                    self.metrics.record_cache_lookup(from_cache);
                    resolved.push(ResolvedInstance {
                        instance: pod,
                        controller: record,
                    });
                }
                Err(e) => {
                    *errors += 1;
                    self.metrics.inc_resolution_errors();
                    self.log_resolution_error(&pod, &e);
                }
            }
        }

        // Join order is arbitrary
        resolved.sort_by(|a, b| {
            (&a.instance.namespace, &a.instance.name).cmp(&(&b.instance.namespace, &b.instance.name))
        });
        resolved
    }

    fn log_resolution_error(&self, pod: &WorkloadInstance, error: &DiscoveryError) {
        if error.kind() == ErrorKind::CacheIntegrity {
            error!(
                namespace = %pod.namespace,
                pod = %pod.name,
                error = %error,
                "Ownership cache holds a foreign value"
            );
        }
        self.logger
            .log_resolution_failure(&pod.namespace, &pod.name, &error.to_string());
    }
}
