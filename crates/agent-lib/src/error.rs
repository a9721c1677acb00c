//! Error types for the discovery core

use crate::models::ResourceType;
use std::fmt;

/// Coarse classification used by the discovery orchestrator to decide
/// whether to skip an instance, skip a controller, or abort startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Resolution,
    Aggregation,
    Configuration,
    CacheIntegrity,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Resolution => write!(f, "resolution"),
            ErrorKind::Aggregation => write!(f, "aggregation"),
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::CacheIntegrity => write!(f, "cache_integrity"),
        }
    }
}

/// Errors surfaced by the discovery core
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("pod {namespace}/{name} has no owner reference")]
    NoParent { namespace: String, name: String },

    #[error("failed to get {kind}[{namespace}/{name}]: {source}")]
    ParentLookup {
        kind: String,
        namespace: String,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("error to aggregate {resource} commodities using {strategy}: {reason}")]
    Aggregation {
        resource: String,
        strategy: &'static str,
        reason: &'static str,
    },

    #[error("container spec {container_spec_id} has no {resource} samples")]
    MissingSamples {
        container_spec_id: String,
        resource: ResourceType,
    },

    #[error("stitching property type {0} is not supported")]
    UnsupportedStitchingProperty(String),

    #[error("aggregation strategy {0} is not supported")]
    UnknownStrategy(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid supply chain: {0}")]
    InvalidSupplyChain(String),

    #[error("cache entry for {key} is not a {expected}")]
    CacheIntegrity { key: String, expected: &'static str },
}

impl DiscoveryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DiscoveryError::NoParent { .. } | DiscoveryError::ParentLookup { .. } => {
                ErrorKind::Resolution
            }
            DiscoveryError::Aggregation { .. } | DiscoveryError::MissingSamples { .. } => {
                ErrorKind::Aggregation
            }
            DiscoveryError::UnsupportedStitchingProperty(_)
            | DiscoveryError::UnknownStrategy(_)
            | DiscoveryError::InvalidConfig(_)
            | DiscoveryError::InvalidSupplyChain(_) => ErrorKind::Configuration,
            DiscoveryError::CacheIntegrity { .. } => ErrorKind::CacheIntegrity,
        }
    }
}

pub type Result<T, E = DiscoveryError> = std::result::Result<T, E>;
