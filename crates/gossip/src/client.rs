//! The anti-entropy gossip client: periodically samples peers and runs a
//! push-then-pull exchange against each, merging whatever it pulls back.

use std::sync::Arc;
use std::time::Duration;

use mesh_sketch::SketchEngine;
use mesh_transport::{PeerClient, TransportError};
use rand::seq::SliceRandom;
use tokio::sync::watch;

use crate::peer::PeerAddress;

/// How often a gossip round runs.
pub const ANTI_ENTROPY_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound on how many peers a single round samples.
pub const ANTI_ENTROPY_MAX_CLIENTS: usize = 3;

pub struct AntiEntropyClient {
    engine: Arc<SketchEngine>,
    peers: Vec<PeerAddress>,
    transport: PeerClient,
}

impl AntiEntropyClient {
    pub fn new(engine: Arc<SketchEngine>, peers: Vec<PeerAddress>) -> Self {
        Self { engine, peers, transport: PeerClient::new() }
    }

    /// Run gossip rounds until `stop` is set to `true`.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        loop {
            self.round().await;
            tokio::select! {
                _ = tokio::time::sleep(ANTI_ENTROPY_INTERVAL) => {}
                _ = stop.changed() => {
                    if *stop.borrow() {
                        return;
                    }
                }
            }
            if *stop.borrow() {
                return;
            }
        }
    }

    /// Run exactly one gossip round: sample up to `ANTI_ENTROPY_MAX_CLIENTS`
    /// peers and push-pull each. Failures against individual peers are
    /// logged and do not abort the round.
    pub async fn round(&self) {
        let sample = self.sample_peers();
        for peer in sample {
            if let Err(err) = self.push_pull(peer).await {
                tracing::debug!(%peer, error = %err, "anti-entropy exchange failed, skipping peer");
            }
        }
    }

    fn sample_peers(&self) -> Vec<&PeerAddress> {
        let mut rng = rand::rng();
        let mut refs: Vec<&PeerAddress> = self.peers.iter().collect();
        refs.shuffle(&mut rng);
        refs.truncate(ANTI_ENTROPY_MAX_CLIENTS);
        refs
    }

    async fn push_pull(&self, peer: &PeerAddress) -> Result<(), TransportError> {
        let local = self.engine.snapshot_bytes();
        self.transport.push(peer.host(), peer.port(), &local).await?;
        let remote = self.transport.pull(peer.host(), peer.port()).await?;
        match mesh_sketch::Sketch::deserialize_compact(&remote) {
            Ok(sketch) => {
                self.engine.merge_in(&sketch);
                Ok(())
            }
            Err(err) => Err(TransportError::Application(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_peers_never_exceeds_max_clients() {
        let engine = Arc::new(SketchEngine::new());
        let peers: Vec<PeerAddress> = (0..10)
            .map(|i| PeerAddress::new("127.0.0.1", 6000 + i).unwrap())
            .collect();
        let client = AntiEntropyClient::new(engine, peers);
        assert_eq!(client.sample_peers().len(), ANTI_ENTROPY_MAX_CLIENTS);
    }

    #[test]
    fn sample_peers_returns_all_when_list_is_smaller() {
        let engine = Arc::new(SketchEngine::new());
        let peers = vec![PeerAddress::new("127.0.0.1", 6000).unwrap()];
        let client = AntiEntropyClient::new(engine, peers);
        assert_eq!(client.sample_peers().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_peer_does_not_abort_the_round() {
        let engine = Arc::new(SketchEngine::new());
        let peers = vec![PeerAddress::new("127.0.0.1", 1).unwrap()];
        let client = AntiEntropyClient::new(engine, peers);
        // must return without panicking or propagating the transport error.
        client.round().await;
    }
}
