//! Discovery orchestration
//!
//! Each cycle lists nodes, namespaces, running pods, services and quotas
//! concurrently, resolves pod controllers through the ownership cache, and
//! turns container samples into container spec commodities.

mod r#loop;
mod worker;

#[cfg(test)]
mod tests;

pub use r#loop::{DiscoveryLoop, DiscoveryLoopBuilder, LatestDiscovery};
pub use worker::{group_container_specs, DiscoveryResult, DiscoveryWorker, ResolvedInstance};
