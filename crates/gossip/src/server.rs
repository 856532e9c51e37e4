//! The anti-entropy RPC server: accepts connections, decodes `push`/`pull`
//! calls, and dispatches them against a shared [`SketchEngine`].

use std::sync::Arc;

use mesh_durability::{Committer, DurabilityLevel};
use mesh_sketch::SketchEngine;
use mesh_transport::protocol::{self, Body, MessageKind};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch, Semaphore};

/// Caps the number of RPCs handled concurrently; excess connections queue
/// for a permit rather than spawning unboundedly.
const MAX_CONCURRENT_RPCS: usize = 64;

pub struct AntiEntropyServer {
    engine: Arc<SketchEngine>,
    committer: Arc<Committer>,
}

impl AntiEntropyServer {
    pub fn new(engine: Arc<SketchEngine>, committer: Arc<Committer>) -> Self {
        Self { engine, committer }
    }

    /// Bind `addr` and serve until `stop` is set to `true`. Returns once the
    /// listener has been torn down.
    pub async fn run(
        &self,
        addr: (String, u16),
        stop: watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        self.run_with_ready(addr, stop, None).await
    }

    /// Like [`Self::run`], but notifies `ready` once the listener is bound
    /// — the coordinator's stop sequence waits on this instead of polling,
    /// so it never races a `stop()` against a server that hasn't started
    /// accepting connections yet.
    pub async fn run_with_ready(
        &self,
        addr: (String, u16),
        mut stop: watch::Receiver<bool>,
        ready: Option<oneshot::Sender<()>>,
    ) -> std::io::Result<()> {
        let listener = TcpListener::bind((addr.0.as_str(), addr.1)).await?;
        tracing::info!(host = %addr.0, port = addr.1, "anti-entropy server listening");
        if let Some(ready) = ready {
            let _ = ready.send(());
        }
        let permits = Arc::new(Semaphore::new(MAX_CONCURRENT_RPCS));

        loop {
            tokio::select! {
                _ = stop.changed() => {
                    if *stop.borrow() {
                        tracing::info!("anti-entropy server stopping");
                        return Ok(());
                    }
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(err) => {
                            tracing::warn!(error = %err, "accept failed");
                            continue;
                        }
                    };
                    let engine = self.engine.clone();
                    let committer = self.committer.clone();
                    let permits = permits.clone();
                    tokio::spawn(async move {
                        let _permit = permits.acquire_owned().await;
                        if let Err(err) = handle_connection(stream, &engine, &committer).await {
                            tracing::debug!(%peer, error = %err, "connection ended with an error");
                        }
                    });
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    engine: &SketchEngine,
    committer: &Committer,
) -> std::io::Result<()> {
    loop {
        let mut len_buf = [0u8; 4];
        if stream.read_exact(&mut len_buf).await.is_err() {
            return Ok(());
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        stream.read_exact(&mut buf).await?;

        let reply = match protocol::decode_message(&buf) {
            Ok(msg) => dispatch(msg, engine, committer).await,
            Err(err) => protocol::encode_exception("unknown", 0, &err.to_string(), 1),
        };
        stream.write_all(&reply).await?;
    }
}

async fn dispatch(msg: protocol::Message, engine: &SketchEngine, committer: &Committer) -> Vec<u8> {
    if msg.kind != MessageKind::Call {
        return protocol::encode_exception(&msg.method, msg.seqid, "expected a call", 2);
    }
    match msg.method.as_str() {
        protocol::METHOD_PUSH => match msg.body {
            Body::Bytes(payload) => match mesh_sketch::Sketch::deserialize_compact(&payload) {
                Ok(inbound) => {
                    engine.merge_in(&inbound);
                    // an inbound merge is a mutation like any other: under
                    // STRICT durability it must be committed before the
                    // reply goes out.
                    if committer.durability() == DurabilityLevel::Strict {
                        if let Err(err) = committer.flush_once().await {
                            return protocol::encode_exception(&msg.method, msg.seqid, &err.to_string(), 6);
                        }
                    }
                    protocol::encode_push_reply(msg.seqid)
                }
                Err(err) => protocol::encode_exception(&msg.method, msg.seqid, &err.to_string(), 3),
            },
            _ => protocol::encode_exception(&msg.method, msg.seqid, "push requires a payload", 2),
        },
        protocol::METHOD_PULL => {
            let bytes = engine.snapshot_bytes();
            protocol::encode_pull_reply(msg.seqid, &bytes)
        }
        other => protocol::encode_exception(other, msg.seqid, "unknown method", 1),
    }
}
