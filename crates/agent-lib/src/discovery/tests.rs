//! Tests for discovery cycles using in-memory cluster state

use super::*;
use crate::cache::OwnershipCache;
use crate::cluster::{ClusterScraper, MetricsSource};
use crate::config::DiscoveryConfig;
use crate::dtofactory::ContainerSpecDtoBuilder;
use crate::error::ErrorKind;
use crate::health::{components, ComponentStatus, HealthRegistry};
use crate::models::{
    CommodityType, ContainerInfo, ContainerSample, EntityType, MetricPoint, NodeInfo,
    OwnerRef, OwnershipRecord, ParentObject, QuotaInfo, ResourceType, ServiceInfo,
    WorkloadInstance,
};
use crate::observability::StructuredLogger;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Mock cluster holding a fixed set of objects
struct MockScraper {
    nodes: Vec<NodeInfo>,
    namespaces: Vec<String>,
    quotas: Vec<QuotaInfo>,
    services: Vec<ServiceInfo>,
    pods: Vec<WorkloadInstance>,
    controllers: HashMap<String, ParentObject>,
    fetches: AtomicUsize,
    fail_listing: AtomicBool,
}

impl MockScraper {
    fn new(pods: Vec<WorkloadInstance>, controllers: Vec<ParentObject>) -> Self {
        Self {
            nodes: vec![node("node-1", "node-uid")],
            namespaces: vec!["default".to_string()],
            quotas: vec![],
            services: vec![service("web", "svc-uid")],
            pods,
            controllers: controllers
                .into_iter()
                .map(|c| (c.name.clone(), c))
                .collect(),
            fetches: AtomicUsize::new(0),
            fail_listing: AtomicBool::new(false),
        }
    }
}

fn node(name: &str, uid: &str) -> NodeInfo {
    NodeInfo {
        name: name.to_string(),
        uid: uid.to_string(),
        system_uuid: Some("system-uuid".to_string()),
        addresses: vec!["10.0.0.1".to_string()],
        cpu_capacity_cores: Some(8.0),
        memory_capacity_bytes: Some(16.0),
    }
}

fn service(name: &str, uid: &str) -> ServiceInfo {
    ServiceInfo {
        namespace: "default".to_string(),
        name: name.to_string(),
        uid: uid.to_string(),
        selector: Default::default(),
    }
}

fn quota(namespace: &str, name: &str, uid: &str) -> QuotaInfo {
    QuotaInfo {
        namespace: namespace.to_string(),
        name: name.to_string(),
        uid: uid.to_string(),
        hard: Default::default(),
    }
}

#[async_trait]
impl ClusterScraper for MockScraper {
    async fn list_nodes(&self) -> anyhow::Result<Vec<NodeInfo>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        Ok(self.nodes.clone())
    }

    async fn list_namespaces(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.namespaces.clone())
    }

    async fn list_quotas(&self) -> anyhow::Result<Vec<QuotaInfo>> {
        Ok(self.quotas.clone())
    }

    async fn list_running_pods(&self) -> anyhow::Result<Vec<WorkloadInstance>> {
        Ok(self.pods.clone())
    }

    async fn list_services(&self) -> anyhow::Result<Vec<ServiceInfo>> {
        Ok(self.services.clone())
    }

    async fn kubernetes_service_id(&self) -> anyhow::Result<String> {
        Ok("cluster-uid".to_string())
    }

    async fn get_controller(
        &self,
        _kind: &str,
        _namespace: &str,
        name: &str,
    ) -> anyhow::Result<ParentObject> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.controllers
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("replicasets \"{}\" not found", name))
    }
}

/// Mock metrics source returning fixed samples
struct MockMetrics {
    samples: Vec<ContainerSample>,
    fail: bool,
}

#[async_trait]
impl MetricsSource for MockMetrics {
    async fn container_samples(
        &self,
        pods: &[WorkloadInstance],
        _nodes: &[NodeInfo],
    ) -> anyhow::Result<Vec<ContainerSample>> {
        if self.fail {
            anyhow::bail!("metrics server unavailable");
        }
        Ok(self
            .samples
            .iter()
            .filter(|s| pods.iter().any(|p| p.uid == s.pod_uid))
            .cloned()
            .collect())
    }
}

fn owner(kind: &str, name: &str, uid: &str) -> OwnerRef {
    OwnerRef {
        kind: kind.to_string(),
        name: name.to_string(),
        uid: uid.to_string(),
        controller: true,
    }
}

fn pod(name: &str, uid: &str, parent: OwnerRef) -> WorkloadInstance {
    WorkloadInstance {
        namespace: "default".to_string(),
        name: name.to_string(),
        uid: uid.to_string(),
        node_name: Some("node-1".to_string()),
        owner_references: vec![parent],
        containers: vec![ContainerInfo {
            name: "app".to_string(),
            ..Default::default()
        }],
    }
}

fn sample(pod_uid: &str, resource_type: ResourceType, capacity: f64, value: f64, ts: i64) -> ContainerSample {
    ContainerSample {
        pod_uid: pod_uid.to_string(),
        container_name: "app".to_string(),
        resource_type,
        capacity,
        points: vec![MetricPoint::new(value, ts)],
    }
}

fn web_replica_set() -> ParentObject {
    ParentObject {
        kind: "ReplicaSet".to_string(),
        namespace: "default".to_string(),
        name: "web-5d9c".to_string(),
        uid: "rs-uid".to_string(),
        replicas: Some(2),
        owner_references: vec![owner("Deployment", "web", "deploy-uid")],
    }
}

/// Two web replicas, one stateful pod, a duplicate listing and a pod whose
/// replica set no longer exists
fn cluster() -> Vec<WorkloadInstance> {
    let rs = owner("ReplicaSet", "web-5d9c", "rs-uid");
    vec![
        pod("web-5d9c-a", "pod-a", rs.clone()),
        pod("web-5d9c-b", "pod-b", rs.clone()),
        pod("web-5d9c-a", "pod-a", rs),
        pod("db-0", "pod-db", owner("StatefulSet", "db", "sts-uid")),
        pod("gone-x", "pod-gone", owner("ReplicaSet", "gone", "gone-uid")),
    ]
}

fn web_samples() -> Vec<ContainerSample> {
    vec![
        sample("pod-a", ResourceType::Cpu, 4.0, 1.0, 1),
        sample("pod-b", ResourceType::Cpu, 4.0, 3.0, 2),
        sample("pod-a", ResourceType::Memory, 4.0, 1.0, 1),
        sample("pod-b", ResourceType::Memory, 4.0, 3.0, 2),
        sample("pod-gone", ResourceType::Cpu, 4.0, 2.0, 2),
    ]
}

fn worker(scraper: Arc<MockScraper>, metrics: MockMetrics) -> DiscoveryWorker {
    DiscoveryWorker::new(
        scraper,
        Arc::new(metrics),
        OwnershipCache::default(),
        ContainerSpecDtoBuilder::default(),
        StructuredLogger::new("test-node"),
    )
}

#[tokio::test]
async fn test_discovery_cycle() {
    let scraper = Arc::new(MockScraper::new(cluster(), vec![web_replica_set()]));
    let worker = worker(
        scraper.clone(),
        MockMetrics {
            samples: web_samples(),
            fail: false,
        },
    );

    let result = worker.discover().await.unwrap();

    // Duplicate dropped, unresolvable pod omitted
    assert_eq!(result.instances.len(), 3);
    assert_eq!(result.resolution_errors, 1);
    let controllers: Vec<&str> = result
        .instances
        .iter()
        .map(|r| r.controller.name.as_str())
        .collect();
    assert_eq!(controllers, vec!["db", "web", "web"]);

    assert_eq!(result.container_specs.len(), 1);
    let spec = &result.container_specs[0];
    assert_eq!(spec.id, "deploy-uid/app");
    assert_eq!(spec.replicas, 2);
    assert_eq!(spec.commodities_sold.len(), 2);
    let cpu = &spec.commodities_sold[0];
    assert_eq!(cpu.commodity_type, CommodityType::Vcpu);
    assert_eq!(cpu.used, 2.0);
    assert_eq!(cpu.peak, 3.0);
    assert_eq!(cpu.capacity, 4.0);
    assert_eq!(cpu.utilization_data.as_ref().unwrap().points, vec![25.0, 75.0]);

    assert_eq!(result.entity_counts[&EntityType::ContainerPod], 3);
    assert_eq!(result.entity_counts[&EntityType::VirtualMachine], 1);
    assert_eq!(result.entity_counts[&EntityType::Service], 1);
    assert_eq!(result.entity_counts[&EntityType::ContainerSpec], 1);
    assert!(result.metrics_error.is_none());
}

#[tokio::test]
async fn test_second_cycle_uses_ownership_cache() {
    let scraper = Arc::new(MockScraper::new(cluster(), vec![web_replica_set()]));
    let worker = worker(
        scraper.clone(),
        MockMetrics {
            samples: vec![],
            fail: false,
        },
    );

    worker.discover().await.unwrap();
    // One lookup per web pod plus the failed one
    assert_eq!(scraper.fetches.load(Ordering::SeqCst), 3);
    assert_eq!(worker.ownership_cache().len(), 3);

    worker.discover().await.unwrap();
    // Only the uncached failure is retried
    assert_eq!(scraper.fetches.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_aggregation_failure_omits_container_spec() {
    let scraper = Arc::new(MockScraper::new(cluster(), vec![web_replica_set()]));
    let mut samples = web_samples();
    samples.push(sample("pod-db", ResourceType::Cpu, 0.0, 1.0, 1));
    let worker = worker(
        scraper,
        MockMetrics {
            samples,
            fail: false,
        },
    );

    let result = worker.discover().await.unwrap();

    assert_eq!(result.aggregation_errors, 1);
    assert_eq!(result.container_specs.len(), 1);
    assert_eq!(result.container_specs[0].id, "deploy-uid/app");
}

#[tokio::test]
async fn test_metrics_failure_keeps_topology() {
    let scraper = Arc::new(MockScraper::new(cluster(), vec![web_replica_set()]));
    let worker = worker(
        scraper,
        MockMetrics {
            samples: web_samples(),
            fail: true,
        },
    );

    let result = worker.discover().await.unwrap();

    assert_eq!(result.instances.len(), 3);
    assert!(result.container_specs.is_empty());
    assert_eq!(
        result.metrics_error.as_deref(),
        Some("metrics server unavailable")
    );
}

#[tokio::test]
async fn test_listing_failure_fails_cycle() {
    let scraper = Arc::new(MockScraper::new(cluster(), vec![web_replica_set()]));
    scraper.fail_listing.store(true, Ordering::SeqCst);
    let worker = worker(
        scraper,
        MockMetrics {
            samples: vec![],
            fail: false,
        },
    );

    assert!(worker.discover().await.is_err());
}

#[test]
fn test_group_container_specs() {
    let resolved = |name: &str, uid: &str| ResolvedInstance {
        instance: pod(name, uid, owner("ReplicaSet", "web-5d9c", "rs-uid")),
        controller: OwnershipRecord::new("Deployment", "web", "deploy-uid"),
    };
    let instances = vec![resolved("web-a", "pod-a"), resolved("web-b", "pod-b")];
    let samples = vec![
        sample("pod-b", ResourceType::Memory, 8.0, 5.0, 20),
        sample("pod-a", ResourceType::Memory, 4.0, 1.0, 10),
        sample("pod-unknown", ResourceType::Memory, 4.0, 1.0, 10),
    ];

    let specs = group_container_specs(&instances, samples);

    assert_eq!(specs.len(), 1);
    let spec = &specs[0];
    assert_eq!(spec.container_spec_id, "deploy-uid/app");
    assert_eq!(spec.container_replicas, 2);
    let memory = &spec.container_metrics[&ResourceType::Memory];
    assert_eq!(memory.capacity, 8.0);
    let timestamps: Vec<i64> = memory.used.iter().map(|p| p.timestamp_ms).collect();
    assert_eq!(timestamps, vec![10, 20]);
}

#[test]
fn test_zero_capacity_replica_fails_container_spec() {
    let resolved = |name: &str, uid: &str| ResolvedInstance {
        instance: pod(name, uid, owner("ReplicaSet", "web-5d9c", "rs-uid")),
        controller: OwnershipRecord::new("Deployment", "web", "deploy-uid"),
    };
    let instances = vec![resolved("web-a", "pod-a"), resolved("web-b", "pod-b")];

    // Order of replicas must not matter
    for samples in [
        vec![
            sample("pod-a", ResourceType::Cpu, 4.0, 1.0, 1),
            sample("pod-b", ResourceType::Cpu, 0.0, 3.0, 2),
        ],
        vec![
            sample("pod-b", ResourceType::Cpu, 0.0, 3.0, 2),
            sample("pod-a", ResourceType::Cpu, 4.0, 1.0, 1),
        ],
    ] {
        let specs = group_container_specs(&instances, samples);
        assert_eq!(specs[0].container_metrics[&ResourceType::Cpu].capacity, 0.0);

        let err = ContainerSpecDtoBuilder::default()
            .commodities_sold(&specs[0])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Aggregation);
    }
}

#[tokio::test]
async fn test_zero_capacity_replica_omits_container_spec() {
    let scraper = Arc::new(MockScraper::new(cluster(), vec![web_replica_set()]));
    let mut samples = web_samples();
    samples.push(sample("pod-b", ResourceType::Cpu, 0.0, 3.0, 3));
    let worker = worker(
        scraper,
        MockMetrics {
            samples,
            fail: false,
        },
    );

    let result = worker.discover().await.unwrap();

    assert_eq!(result.aggregation_errors, 1);
    assert!(result.container_specs.is_empty());
}

#[tokio::test]
async fn test_repeated_listings_are_counted_once() {
    let mut scraper = MockScraper::new(cluster(), vec![web_replica_set()]);
    scraper.nodes = vec![
        node("node-1", "node-uid"),
        node("node-1", "node-uid"),
        node("node-2", "node-uid-2"),
    ];
    scraper.services = vec![service("web", "svc-uid"), service("web", "svc-uid")];
    scraper.namespaces = vec![
        "default".to_string(),
        "kube-system".to_string(),
        "default".to_string(),
    ];
    scraper.quotas = vec![
        quota("default", "compute", "quota-uid"),
        quota("default", "compute", "quota-uid"),
        quota("default", "storage", "quota-uid-2"),
    ];
    let worker = worker(
        Arc::new(scraper),
        MockMetrics {
            samples: vec![],
            fail: false,
        },
    );

    let result = worker.discover().await.unwrap();

    assert_eq!(result.entity_counts[&EntityType::VirtualMachine], 2);
    assert_eq!(result.entity_counts[&EntityType::Service], 1);
    assert_eq!(result.entity_counts[&EntityType::ContainerPod], 3);
    assert_eq!(result.entity_counts[&EntityType::VirtualDatacenter], 2);
    assert_eq!(result.quotas_by_namespace["default"], 2);
    assert_eq!(result.quotas_by_namespace["kube-system"], 0);
}

#[tokio::test]
async fn test_loop_ready_only_after_completed_cycle() {
    let health = HealthRegistry::new();
    health.register_all().await;
    health.supply_chain_registered(7).await;
    let scraper = Arc::new(MockScraper::new(cluster(), vec![web_replica_set()]));
    scraper.fail_listing.store(true, Ordering::SeqCst);
    let discovery = DiscoveryLoopBuilder::new()
        .scraper(scraper.clone())
        .metrics_source(Arc::new(MockMetrics {
            samples: web_samples(),
            fail: false,
        }))
        .health(health.clone())
        .build()
        .unwrap();

    discovery.run_cycle(1).await;
    assert!(!health.readiness().await.ready);
    assert_eq!(health.progress().await.failed_cycles, 1);

    scraper.fail_listing.store(false, Ordering::SeqCst);
    discovery.run_cycle(2).await;
    assert!(health.readiness().await.ready);
    assert_eq!(health.progress().await.completed_cycles, 1);
}

#[tokio::test]
async fn test_loop_cycle_updates_health_and_latest() {
    let health = HealthRegistry::new();
    health.register_all().await;
    let scraper = Arc::new(MockScraper::new(cluster(), vec![web_replica_set()]));
    let discovery = DiscoveryLoopBuilder::new()
        .scraper(scraper)
        .metrics_source(Arc::new(MockMetrics {
            samples: web_samples(),
            fail: true,
        }))
        .health(health.clone())
        .node_name("test-node")
        .build()
        .unwrap();

    discovery.run_cycle(1).await;

    let latest = discovery.latest();
    let result = latest.read().await.clone().unwrap();
    assert_eq!(result.instances.len(), 3);

    let report = health.health().await;
    assert_eq!(
        report.components[components::CLUSTER_SCRAPER].status,
        ComponentStatus::Healthy
    );
    assert_eq!(
        report.components[components::METRICS_SOURCE].status,
        ComponentStatus::Degraded
    );
    // The unresolvable pod degrades discovery
    assert_eq!(
        report.components[components::DISCOVERY].status,
        ComponentStatus::Degraded
    );
}

#[tokio::test]
async fn test_loop_cycle_failure_marks_scraper_unhealthy() {
    let health = HealthRegistry::new();
    health.register_all().await;
    let scraper = Arc::new(MockScraper::new(vec![], vec![]));
    scraper.fail_listing.store(true, Ordering::SeqCst);
    let discovery = DiscoveryLoopBuilder::new()
        .scraper(scraper)
        .metrics_source(Arc::new(MockMetrics {
            samples: vec![],
            fail: false,
        }))
        .health(health.clone())
        .build()
        .unwrap();

    discovery.run_cycle(1).await;

    assert!(discovery.latest().read().await.is_none());
    assert_eq!(health.health().await.status, ComponentStatus::Unhealthy);
}

#[tokio::test]
async fn test_loop_stops_on_shutdown() {
    let scraper = Arc::new(MockScraper::new(vec![], vec![]));
    let discovery = DiscoveryLoopBuilder::new()
        .scraper(scraper)
        .metrics_source(Arc::new(MockMetrics {
            samples: vec![],
            fail: false,
        }))
        .config(DiscoveryConfig {
            discovery_interval_secs: 1,
            ..Default::default()
        })
        .build()
        .unwrap();
    let latest = discovery.latest();

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let handle = tokio::spawn(discovery.run(shutdown_rx));
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(()).unwrap();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
    // The first tick fires immediately
    assert!(latest.read().await.is_some());
}

#[test]
fn test_builder_requires_sources() {
    assert!(DiscoveryLoopBuilder::new().build().is_err());

    let result = DiscoveryLoopBuilder::new()
        .scraper(Arc::new(MockScraper::new(vec![], vec![])))
        .metrics_source(Arc::new(MockMetrics {
            samples: vec![],
            fail: false,
        }))
        .config(DiscoveryConfig {
            utilization_strategy: "p99".to_string(),
            ..Default::default()
        })
        .build();
    assert!(result.is_err());
}
