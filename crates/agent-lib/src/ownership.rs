//! Ownership resolution for workload instances
//!
//! Maps a pod to the controller that ultimately manages it. Pods owned by a
//! `ReplicaSet` or `ReplicationController` are attributed to that object's
//! own owner (a `Deployment` or `DeploymentConfig`) when it has one. The walk
//! stops after two hops. Results are cached per pod so later discovery
//! cycles skip the API round-trip.

use crate::cache::OwnershipCache;
use crate::cluster::ClusterScraper;
use crate::error::{DiscoveryError, Result};
use crate::models::{
    controlling_owner, OwnershipRecord, ParentObject, WorkloadInstance,
    KIND_REPLICATION_CONTROLLER, KIND_REPLICA_SET,
};
use std::sync::Arc;
use tracing::{debug, error};

/// Outcome of resolving one instance
#[derive(Debug, Clone)]
pub struct ControllerResolution {
    pub record: OwnershipRecord,
    /// The replica-set style parent, when one was fetched during this call
    pub parent: Option<ParentObject>,
    pub from_cache: bool,
}

/// True for parents whose own owner is followed
pub fn is_replica_set_kind(kind: &str) -> bool {
    kind == KIND_REPLICA_SET || kind == KIND_REPLICATION_CONTROLLER
}

/// Resolves and caches the top-level controller of workload instances
pub struct OwnershipResolver {
    scraper: Arc<dyn ClusterScraper>,
    cache: OwnershipCache,
}

impl OwnershipResolver {
    pub fn new(scraper: Arc<dyn ClusterScraper>, cache: OwnershipCache) -> Self {
        Self { scraper, cache }
    }

    pub fn cache(&self) -> &OwnershipCache {
        &self.cache
    }

    /// Resolve the controller of `instance`.
    ///
    /// With `bypass_cache` false a live cached record is returned without
    /// touching the cluster. Lookup failures are returned as errors and
    /// nothing is cached for the instance.
    pub async fn resolve_controller(
        &self,
        instance: &WorkloadInstance,
        bypass_cache: bool,
    ) -> Result<ControllerResolution> {
        let key = instance.controller_info_key();
        if !bypass_cache {
            if let Some(record) = self.cache.get(&key)? {
                return Ok(ControllerResolution {
                    record,
                    parent: None,
                    from_cache: true,
                });
            }
        }

        let parent = instance.parent().ok_or_else(|| DiscoveryError::NoParent {
            namespace: instance.namespace.clone(),
            name: instance.name.clone(),
        })?;

        if !is_replica_set_kind(&parent.kind) {
            let record = OwnershipRecord::from(parent);
            self.cache.insert(key, record.clone());
            return Ok(ControllerResolution {
                record,
                parent: None,
                from_cache: false,
            });
        }

        let obj = self
            .scraper
            .get_controller(&parent.kind, &instance.namespace, &parent.name)
            .await
            .map_err(|source| {
                error!(
                    kind = %parent.kind,
                    namespace = %instance.namespace,
                    name = %parent.name,
                    error = %source,
                    "Failed to get parent controller"
                );
                DiscoveryError::ParentLookup {
                    kind: parent.kind.clone(),
                    namespace: instance.namespace.clone(),
                    name: parent.name.clone(),
                    source,
                }
            })?;

        let record = match controlling_owner(&obj.owner_references) {
            Some(grandparent) if grandparent.is_complete() => OwnershipRecord::from(grandparent),
            _ => OwnershipRecord::from(parent),
        };
        debug!(
            pod = %key,
            kind = %record.kind,
            name = %record.name,
            "Resolved pod controller"
        );

        self.cache.insert(key, record.clone());
        Ok(ControllerResolution {
            record,
            parent: Some(obj),
            from_cache: false,
        })
    }
}
