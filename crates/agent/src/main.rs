//! Mediation Agent - Kubernetes topology discovery
//!
//! Registers the supply chain, then periodically resolves workload
//! ownership and aggregates container specs across replicas.

use anyhow::Result;
use clap::Parser;
use mediation_agent::{api, settings::AgentSettings};
use mediation_lib::{
    cluster::{ClusterScraper, KubeClusterScraper, MetricsServerSource},
    discovery::DiscoveryLoopBuilder,
    health::HealthRegistry,
    observability::{DiscoveryMetrics, StructuredLogger},
};
use std::{path::PathBuf, sync::Arc};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "mediation-agent", version, about = "Kubernetes topology discovery agent")]
struct Args {
    /// Path to a settings file (toml, yaml or json)
    #[arg(short, long, env = "MEDIATION_CONFIG")]
    config: Option<PathBuf>,

    /// Print the supply chain as JSON and exit
    #[arg(long)]
    dump_supply_chain: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    // Load settings
    let settings = AgentSettings::load(args.config.as_deref())?;
    let stitching = settings.discovery.stitching()?;

    // Build the supply chain
    let supply_chain = settings.discovery.supply_chain_factory()?.create_supply_chain()?;
    if args.dump_supply_chain {
        println!("{}", serde_json::to_string_pretty(&supply_chain)?);
        return Ok(());
    }

    let logger = StructuredLogger::new(&settings.node_name);
    logger.log_startup(AGENT_VERSION, stitching.as_str());

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;

    // Register the supply chain
    logger.log_supply_chain_registered(supply_chain.len(), stitching.as_str());
    health_registry
        .supply_chain_registered(supply_chain.len())
        .await;

    // Initialize metrics
    let metrics = DiscoveryMetrics::new();
    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics,
        supply_chain,
    ));

    // Connect to the cluster
    let scraper = KubeClusterScraper::try_default().await?;
    match scraper.kubernetes_service_id().await {
        Ok(cluster_id) => info!(cluster_id = %cluster_id, "Connected to cluster"),
        Err(e) => warn!(error = %e, "Failed to read cluster identifier"),
    }
    let metrics_source = MetricsServerSource::new(scraper.client().clone());

    // Build the discovery loop; readiness follows its first completed cycle
    let discovery_loop = DiscoveryLoopBuilder::new()
        .scraper(Arc::new(scraper))
        .metrics_source(Arc::new(metrics_source))
        .health(health_registry.clone())
        .config(settings.discovery.clone())
        .node_name(settings.node_name.clone())
        .build()?;

    // Start discovery and the health/metrics server
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let loop_handle = tokio::spawn(discovery_loop.run(shutdown_rx));
    let api_handle = tokio::spawn(api::serve(settings.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    health_registry.begin_shutdown().await;
    let _ = shutdown_tx.send(());
    if let Err(e) = loop_handle.await {
        warn!(error = %e, "Discovery loop did not stop cleanly");
    }
    api_handle.abort();

    info!("Shutting down");
    Ok(())
}
