//! Lifecycle owner: validates configuration, loads the sketch, starts the
//! server/client/committer tasks, and arranges orderly shutdown with a
//! final flush.

use std::sync::Arc;

use mesh_durability::{Committer, DurabilityLevel};
use mesh_gossip::{AntiEntropyClient, AntiEntropyServer, PeerAddress};
use mesh_sketch::SketchEngine;
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::NodeConfig;

struct Subtask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Subtasks {
    server: Option<Subtask>,
    client: Option<Subtask>,
    committer: Option<Subtask>,
}

pub struct NodeCoordinator {
    config: NodeConfig,
    engine: Arc<SketchEngine>,
    committer: Arc<Committer>,
    subtasks: Mutex<Subtasks>,
}

impl NodeCoordinator {
    pub fn new(config: NodeConfig) -> Self {
        let engine = Arc::new(SketchEngine::new());
        let committer = Arc::new(Committer::new(
            engine.clone(),
            config.sketch_file.clone(),
            config.durability,
            config.atomicity,
        ));
        Self { config, engine, committer, subtasks: Mutex::new(Subtasks::default()) }
    }

    pub fn engine(&self) -> &Arc<SketchEngine> {
        &self.engine
    }

    /// Absorb one item into the local sketch. Under STRICT durability the
    /// commit is synchronous: the item is only considered ingested once
    /// this returns `Ok`.
    pub async fn ingest(&self, datum: &mesh_sketch::Datum) -> Result<(), mesh_durability::DurabilityError> {
        self.engine.update(datum);
        if self.committer.durability() == DurabilityLevel::Strict {
            self.committer.flush_once().await?;
        }
        Ok(())
    }

    /// Runs the full start sequence: load from disk, start whichever
    /// subtasks are enabled.
    pub async fn start(&self) -> Result<(), mesh_durability::DurabilityError> {
        self.committer.load_once().await?;

        if self.config.server_enabled {
            self.start_server().await;
        } else {
            tracing::debug!("anti-entropy server disabled by configuration");
        }

        if self.config.client_enabled {
            self.start_client();
        } else {
            tracing::debug!("anti-entropy client disabled by configuration");
        }

        if self.config.durability == DurabilityLevel::Delayed {
            self.start_committer();
        }

        Ok(())
    }

    async fn start_server(&self) {
        let mut subtasks = self.subtasks.lock();
        if subtasks.server.is_some() {
            tracing::warn!("anti-entropy server already running, ignoring duplicate start");
            return;
        }
        drop(subtasks);

        let (stop_tx, stop_rx) = watch::channel(false);
        let (ready_tx, ready_rx) = oneshot::channel();
        let engine = self.engine.clone();
        let committer = self.committer.clone();
        let addr = self.config.server_address.clone();
        let handle = tokio::spawn(async move {
            let server = AntiEntropyServer::new(engine, committer);
            if let Err(err) = server.run_with_ready(addr, stop_rx, Some(ready_tx)).await {
                tracing::error!(error = %err, "anti-entropy server exited with an error");
            }
        });
        // Waiting on the ready signal (rather than sleep-polling) closes the
        // race where `stop()` could run before the listener has bound.
        let _ = ready_rx.await;

        self.subtasks.lock().server = Some(Subtask { stop: stop_tx, handle });
    }

    fn start_client(&self) {
        let mut subtasks = self.subtasks.lock();
        if subtasks.client.is_some() {
            tracing::warn!("anti-entropy client already running, ignoring duplicate start");
            return;
        }
        drop(subtasks);

        let (stop_tx, stop_rx) = watch::channel(false);
        let engine = self.engine.clone();
        let peers: Vec<PeerAddress> = self
            .config
            .client_addresses
            .iter()
            .map(|(host, port)| PeerAddress::new(host.clone(), *port).expect("validated at config time"))
            .collect();
        let handle = tokio::spawn(async move {
            let client = AntiEntropyClient::new(engine, peers);
            client.run(stop_rx).await;
        });

        self.subtasks.lock().client = Some(Subtask { stop: stop_tx, handle });
    }

    fn start_committer(&self) {
        let mut subtasks = self.subtasks.lock();
        if subtasks.committer.is_some() {
            tracing::warn!("committer already running, ignoring duplicate start");
            return;
        }
        drop(subtasks);

        let (stop_tx, stop_rx) = watch::channel(false);
        let committer = self.committer.clone();
        let handle = tokio::spawn(async move {
            committer.run_periodic(stop_rx).await;
        });

        self.subtasks.lock().committer = Some(Subtask { stop: stop_tx, handle });
    }

    /// Orderly shutdown: stop server, then client, then committer, then
    /// (for DELAYED durability) a final synchronous flush.
    pub async fn stop(&self) {
        let Subtasks { server, client, committer } = std::mem::take(&mut *self.subtasks.lock());

        if let Some(server) = server {
            let _ = server.stop.send(true);
            let _ = server.handle.await;
        }
        if let Some(client) = client {
            let _ = client.stop.send(true);
            let _ = client.handle.await;
        }
        if let Some(committer) = committer {
            let _ = committer.stop.send(true);
            let _ = committer.handle.await;
        }

        if self.config.durability == DurabilityLevel::Delayed {
            if let Err(err) = self.committer.flush_once().await {
                tracing::error!(error = %err, "final shutdown flush failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawNodeConfig;

    fn volatile_config() -> NodeConfig {
        NodeConfig::validate(RawNodeConfig {
            sketch_file: None,
            server_enabled: false,
            client_enabled: false,
            server_address: ("127.0.0.1".into(), 0),
            client_addresses: vec![],
            durability: DurabilityLevel::Volatile,
            atomicity: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn start_and_stop_with_everything_disabled_is_a_clean_no_op() {
        let coordinator = NodeCoordinator::new(volatile_config());
        coordinator.start().await.unwrap();
        coordinator.stop().await;
    }

    #[tokio::test]
    async fn server_start_is_idempotent() {
        let mut cfg = volatile_config();
        cfg.server_enabled = true;
        cfg.server_address = ("127.0.0.1".into(), 0);
        let coordinator = NodeCoordinator::new(cfg);
        coordinator.start_server().await;
        coordinator.start_server().await; // should warn and no-op, not panic or deadlock
        coordinator.stop().await;
    }

    #[tokio::test]
    async fn delayed_durability_flushes_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sketch.bin");
        let cfg = NodeConfig::validate(RawNodeConfig {
            sketch_file: Some(path.clone()),
            server_enabled: false,
            client_enabled: false,
            server_address: ("127.0.0.1".into(), 0),
            client_addresses: vec![],
            durability: DurabilityLevel::Delayed,
            atomicity: None,
        })
        .unwrap();
        let coordinator = NodeCoordinator::new(cfg);
        coordinator.start().await.unwrap();
        coordinator.engine().update(&mesh_sketch::Datum::from("x"));
        coordinator.stop().await;

        assert!(path.exists());
    }
}
