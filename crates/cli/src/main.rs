mod args;
mod ingest;

use std::sync::Arc;

use clap::Parser;
use mesh_node::{NodeConfig, NodeCoordinator, RawNodeConfig};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use args::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let config = build_config(&args)?;
    let coordinator = Arc::new(NodeCoordinator::new(config));
    coordinator.start().await?;

    let (ingest_stop_tx, ingest_stop_rx) = watch::channel(false);
    let ingest_task = {
        let coordinator = coordinator.clone();
        if args.stdin {
            tokio::spawn(async move { ingest::run_stdin(&coordinator, ingest_stop_rx).await })
        } else {
            tokio::spawn(async move { ingest::run_synthetic(&coordinator, ingest_stop_rx).await })
        }
    };

    let mut signals = mesh_node::watch_termination_signals();
    let exit_code = tokio::select! {
        _ = ingest_task => 0,
        Some(code) = signals.recv() => code,
    };

    let _ = ingest_stop_tx.send(true);
    coordinator.stop().await;

    std::process::exit(exit_code);
}

fn init_logging(args: &Args) {
    let filter = EnvFilter::try_new(args.log_level.as_filter_directive()).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_config(args: &Args) -> anyhow::Result<NodeConfig> {
    let raw = RawNodeConfig {
        sketch_file: args.sketch_file.clone(),
        server_enabled: args.server_enabled(),
        client_enabled: args.client_enabled(),
        server_address: args.parse_server_address()?,
        client_addresses: args.parse_client_addresses()?,
        durability: args.durability,
        atomicity: args.atomicity_override(),
    };
    NodeConfig::validate(raw).map_err(anyhow::Error::from)
}
