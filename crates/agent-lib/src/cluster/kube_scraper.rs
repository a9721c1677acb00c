//! `ClusterScraper` backed by the Kubernetes API

use super::convert::{
    is_pod_running_and_ready, node_info, quota_info, replica_set_parent,
    replication_controller_parent, service_info, workload_instance,
};
use super::ClusterScraper;
use crate::models::{
    NodeInfo, ParentObject, QuotaInfo, ServiceInfo, WorkloadInstance, KIND_REPLICATION_CONTROLLER,
    KIND_REPLICA_SET,
};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::{
    Namespace, Node, Pod, ReplicationController, ResourceQuota, Service,
};
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
use tracing::debug;

const K8S_DEFAULT_NAMESPACE: &str = "default";
const KUBERNETES_SERVICE_NAME: &str = "kubernetes";

/// Cluster scraper using a kube-rs client
#[derive(Clone)]
pub struct KubeClusterScraper {
    client: Client,
}

impl KubeClusterScraper {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Create a scraper from the ambient kubeconfig or in-cluster config
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default()
            .await
            .context("Failed to create Kubernetes client")?;
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn pods(&self, params: &ListParams) -> Result<Vec<Pod>> {
        let api: Api<Pod> = Api::all(self.client.clone());
        let pods = api
            .list(params)
            .await
            .context("Failed to list pods in the cluster")?;
        Ok(pods.items)
    }
}

#[async_trait]
impl ClusterScraper for KubeClusterScraper {
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api
            .list(&ListParams::default())
            .await
            .context("Failed to list all nodes in the cluster")?;
        Ok(nodes.items.iter().map(node_info).collect())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespaces = api
            .list(&ListParams::default())
            .await
            .context("Failed to list namespaces")?;
        Ok(namespaces.items.iter().map(|ns| ns.name_any()).collect())
    }

    async fn list_quotas(&self) -> Result<Vec<QuotaInfo>> {
        let api: Api<ResourceQuota> = Api::all(self.client.clone());
        let quotas = api
            .list(&ListParams::default())
            .await
            .context("Failed to list resource quotas")?;
        Ok(quotas.items.iter().map(quota_info).collect())
    }

    async fn list_running_pods(&self) -> Result<Vec<WorkloadInstance>> {
        let params = ListParams::default().fields("status.phase=Running");
        let pods = self
            .pods(&params)
            .await
            .context("Failed to fetch all running and ready pods in cluster")?;
        let ready: Vec<WorkloadInstance> = pods
            .iter()
            .filter(|pod| is_pod_running_and_ready(pod))
            .map(workload_instance)
            .collect();
        debug!(running = pods.len(), ready = ready.len(), "Listed running pods");
        Ok(ready)
    }

    async fn list_services(&self) -> Result<Vec<ServiceInfo>> {
        let api: Api<Service> = Api::all(self.client.clone());
        let services = api
            .list(&ListParams::default())
            .await
            .context("Failed to list services")?;
        Ok(services.items.iter().map(service_info).collect())
    }

    async fn kubernetes_service_id(&self) -> Result<String> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), K8S_DEFAULT_NAMESPACE);
        let svc = api
            .get(KUBERNETES_SERVICE_NAME)
            .await
            .context("Failed to get the kubernetes service")?;
        svc.uid()
            .context("The kubernetes service has no uid")
    }

    async fn get_controller(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<ParentObject> {
        match kind {
            KIND_REPLICA_SET => {
                let api: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
                let rs = api
                    .get(name)
                    .await
                    .with_context(|| format!("Failed to get {}[{}/{}]", kind, namespace, name))?;
                Ok(replica_set_parent(&rs))
            }
            KIND_REPLICATION_CONTROLLER => {
                let api: Api<ReplicationController> =
                    Api::namespaced(self.client.clone(), namespace);
                let rc = api
                    .get(name)
                    .await
                    .with_context(|| format!("Failed to get {}[{}/{}]", kind, namespace, name))?;
                Ok(replication_controller_parent(&rc))
            }
            other => bail!("Unsupported controller kind {}", other),
        }
    }
}
