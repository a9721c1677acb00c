//! Discovery core of the cluster topology mediation agent
//!
//! This crate provides:
//! - Ownership resolution of pods to their top-level controllers, with a TTL cache
//! - Aggregation of per-replica samples into controller-level commodities
//! - The supply chain topology with stitching metadata for external VMs
//! - Periodic discovery against the Kubernetes API
//! - Health checks and observability

pub mod aggregation;
pub mod cache;
pub mod cluster;
pub mod config;
pub mod discovery;
pub mod dtofactory;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod ownership;
pub mod supply_chain;

pub use aggregation::{AggregationEngine, UsageStrategy, UtilizationStrategy};
pub use cache::{ExpiringCache, OwnershipCache};
pub use config::DiscoveryConfig;
pub use error::{DiscoveryError, ErrorKind};
pub use health::{
    ComponentHealth, ComponentStatus, DiscoveryProgress, HealthRegistry, HealthResponse,
    ReadinessResponse,
};
pub use models::*;
pub use observability::{DiscoveryMetrics, StructuredLogger};
pub use ownership::{ControllerResolution, OwnershipResolver};
pub use supply_chain::{build_topology, EntityTemplate, StitchingPropertyType, SupplyChainFactory};
