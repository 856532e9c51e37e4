//! The item-ingestion front end: either a stdin reader or a synthetic
//! random-item generator, each of which absorbs one datum at a time into
//! the node's sketch through [`mesh_node::NodeCoordinator::ingest`].

use std::time::Duration;

use mesh_node::NodeCoordinator;
use mesh_sketch::Datum;
use rand::Rng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

/// Reads newline-delimited items from stdin until EOF or `stop`.
pub async fn run_stdin(coordinator: &NodeCoordinator, mut stop: watch::Receiver<bool>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if let Err(err) = coordinator.ingest(&Datum::from(line)).await {
                            tracing::error!(error = %err, "failed to commit ingested item");
                        }
                    }
                    Ok(None) => return,
                    Err(err) => {
                        tracing::error!(error = %err, "error reading stdin");
                        return;
                    }
                }
            }
            _ = stop.changed() => {
                if *stop.borrow() {
                    return;
                }
            }
        }
    }
}

/// Generates a steady stream of synthetic random items, for demos and load
/// testing without a real input source.
pub async fn run_synthetic(coordinator: &NodeCoordinator, mut stop: watch::Receiver<bool>) {
    loop {
        let item: u64 = rand::rng().random();
        if let Err(err) = coordinator.ingest(&Datum::from(item as i64)).await {
            tracing::error!(error = %err, "failed to commit synthetic item");
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(200)) => {}
            _ = stop.changed() => {
                if *stop.borrow() {
                    return;
                }
            }
        }
    }
}
