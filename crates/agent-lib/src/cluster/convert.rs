//! Conversion from Kubernetes API objects into discovery models

use super::quantity::parse_quantity;
use crate::models::{
    ContainerInfo, NodeInfo, OwnerRef, ParentObject, QuotaInfo, ServiceInfo, WorkloadInstance,
};
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::{
    Container, Node, Pod, ReplicationController, ResourceQuota, Service,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;

const POD_RUNNING: &str = "Running";

/// Owner references of an object in model form
pub fn owner_refs_from_meta(meta: &ObjectMeta) -> Vec<OwnerRef> {
    meta.owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|o| OwnerRef {
            kind: o.kind.clone(),
            name: o.name.clone(),
            uid: o.uid.clone(),
            controller: o.controller.unwrap_or(false),
        })
        .collect()
}

fn quantity_of(map: Option<&BTreeMap<String, Quantity>>, resource: &str) -> Option<f64> {
    map.and_then(|m| m.get(resource))
        .and_then(|q| parse_quantity(&q.0))
}

fn container_info(container: &Container) -> ContainerInfo {
    let limits = container.resources.as_ref().and_then(|r| r.limits.as_ref());
    let requests = container
        .resources
        .as_ref()
        .and_then(|r| r.requests.as_ref());

    ContainerInfo {
        name: container.name.clone(),
        cpu_limit_cores: quantity_of(limits, "cpu"),
        memory_limit_bytes: quantity_of(limits, "memory"),
        cpu_request_cores: quantity_of(requests, "cpu"),
        memory_request_bytes: quantity_of(requests, "memory"),
    }
}

pub(crate) fn workload_instance(pod: &Pod) -> WorkloadInstance {
    let containers = pod
        .spec
        .as_ref()
        .map(|spec| spec.containers.iter().map(container_info).collect())
        .unwrap_or_default();

    WorkloadInstance {
        namespace: pod.namespace().unwrap_or_default(),
        name: pod.name_any(),
        uid: pod.uid().unwrap_or_default(),
        node_name: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
        owner_references: owner_refs_from_meta(&pod.metadata),
        containers,
    }
}

/// A pod is running and ready when its phase is Running and its Ready
/// condition is True
pub fn is_pod_running_and_ready(pod: &Pod) -> bool {
    let Some(status) = pod.status.as_ref() else {
        return false;
    };
    if status.phase.as_deref() != Some(POD_RUNNING) {
        return false;
    }
    status
        .conditions
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|c| c.type_ == "Ready" && c.status == "True")
}

pub(crate) fn node_info(node: &Node) -> NodeInfo {
    let status = node.status.as_ref();
    let addresses = status
        .and_then(|s| s.addresses.as_ref())
        .map(|addrs| addrs.iter().map(|a| a.address.clone()).collect())
        .unwrap_or_default();
    let capacity = status.and_then(|s| s.capacity.as_ref());

    NodeInfo {
        name: node.name_any(),
        uid: node.uid().unwrap_or_default(),
        system_uuid: status
            .and_then(|s| s.node_info.as_ref())
            .map(|info| info.system_uuid.clone()),
        addresses,
        cpu_capacity_cores: quantity_of(capacity, "cpu"),
        memory_capacity_bytes: quantity_of(capacity, "memory"),
    }
}

pub(crate) fn service_info(service: &Service) -> ServiceInfo {
    ServiceInfo {
        namespace: service.namespace().unwrap_or_default(),
        name: service.name_any(),
        uid: service.uid().unwrap_or_default(),
        selector: service
            .spec
            .as_ref()
            .and_then(|s| s.selector.clone())
            .unwrap_or_default(),
    }
}

pub(crate) fn quota_info(quota: &ResourceQuota) -> QuotaInfo {
    let hard = quota
        .spec
        .as_ref()
        .and_then(|s| s.hard.as_ref())
        .map(|hard| {
            hard.iter()
                .filter_map(|(name, q)| parse_quantity(&q.0).map(|v| (name.clone(), v)))
                .collect()
        })
        .unwrap_or_default();

    QuotaInfo {
        namespace: quota.namespace().unwrap_or_default(),
        name: quota.name_any(),
        uid: quota.uid().unwrap_or_default(),
        hard,
    }
}

pub(crate) fn replica_set_parent(rs: &ReplicaSet) -> ParentObject {
    ParentObject {
        kind: crate::models::KIND_REPLICA_SET.to_string(),
        namespace: rs.namespace().unwrap_or_default(),
        name: rs.name_any(),
        uid: rs.uid().unwrap_or_default(),
        replicas: rs.spec.as_ref().and_then(|s| s.replicas),
        owner_references: owner_refs_from_meta(&rs.metadata),
    }
}

pub(crate) fn replication_controller_parent(rc: &ReplicationController) -> ParentObject {
    ParentObject {
        kind: crate::models::KIND_REPLICATION_CONTROLLER.to_string(),
        namespace: rc.namespace().unwrap_or_default(),
        name: rc.name_any(),
        uid: rc.uid().unwrap_or_default(),
        replicas: rc.spec.as_ref().and_then(|s| s.replicas),
        owner_references: owner_refs_from_meta(&rc.metadata),
    }
}
