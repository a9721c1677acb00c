//! Agent settings
//!
//! Loaded from an optional configuration file overlaid by `MEDIATION_*`
//! environment variables. Nested keys use `__`, for example
//! `MEDIATION_DISCOVERY__STITCHING_PROPERTY=UUID`.

use anyhow::{Context, Result};
use mediation_lib::config::DiscoveryConfig;
use serde::Deserialize;
use std::path::Path;

const ENV_PREFIX: &str = "MEDIATION";

/// Agent settings
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSettings {
    /// Node name from Kubernetes downward API
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// API server port for health/metrics/supply chain
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            api_port: default_api_port(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

/// Environment source for `MEDIATION_*` variables
pub fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

impl AgentSettings {
    /// Load settings from the process environment and an optional file
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, environment())
    }

    /// Load settings from an explicit environment source and an optional file
    pub fn load_from(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings: AgentSettings = builder
            .add_source(env)
            .build()
            .context("Failed to read agent settings")?
            .try_deserialize()
            .context("Failed to parse agent settings")?;

        settings
            .discovery
            .validate()
            .context("Invalid discovery settings")?;
        Ok(settings)
    }
}
