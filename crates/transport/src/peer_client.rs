//! A client for the anti-entropy RPC service, keyed by `(host, port)` so a
//! gossip client talking to the same peer repeatedly reuses one connection.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::TransportError;
use crate::protocol::{self, Body, MessageKind};

/// Per-call timeout for a push or pull round trip.
pub const CALL_TIMEOUT: Duration = Duration::from_millis(1000);

/// How a connection failure should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Try once; surface the first failure. Used by best-effort gossip
    /// exchanges, where a slow or dead peer must not block the round.
    BestEffort,
    /// Retry forever with a fixed backoff. Used at start-up when a node
    /// must reach a seed peer before it can do anything else.
    Reliable { backoff: Duration },
}

struct Conn {
    stream: TcpStream,
    next_seqid: i32,
}

/// Caches one TCP connection per peer. Connections are established lazily
/// on first use and dropped on any I/O error, so the next call reconnects.
pub struct PeerClient {
    conns: Mutex<HashMap<(String, u16), Conn>>,
}

impl Default for PeerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerClient {
    pub fn new() -> Self {
        Self { conns: Mutex::new(HashMap::new()) }
    }

    /// Push `payload` (a serialized sketch) to `host:port`.
    pub async fn push(&self, host: &str, port: u16, payload: &[u8]) -> Result<(), TransportError> {
        let seqid = self.next_seqid(host, port).await?;
        let frame = protocol::encode_push_call(seqid, payload);
        let reply = self.round_trip(host, port, &frame).await?;
        match reply.kind {
            MessageKind::Reply if reply.body == Body::Empty => Ok(()),
            MessageKind::Exception => Err(exception_to_error(&reply)),
            _ => Err(TransportError::Protocol("unexpected push reply shape".into())),
        }
    }

    /// Pull the peer's current serialized sketch.
    pub async fn pull(&self, host: &str, port: u16) -> Result<Vec<u8>, TransportError> {
        let seqid = self.next_seqid(host, port).await?;
        let frame = protocol::encode_pull_call(seqid);
        let reply = self.round_trip(host, port, &frame).await?;
        match reply.kind {
            MessageKind::Reply => match reply.body {
                Body::Bytes(bytes) => Ok(bytes),
                _ => Err(TransportError::Protocol("pull reply missing payload".into())),
            },
            MessageKind::Exception => Err(exception_to_error(&reply)),
            _ => Err(TransportError::Protocol("unexpected pull reply shape".into())),
        }
    }

    /// Call `f` under `policy`: once for [`RetryPolicy::BestEffort`], or
    /// forever (sleeping `backoff` between attempts) for
    /// [`RetryPolicy::Reliable`].
    pub async fn with_retry<F, Fut, T>(policy: RetryPolicy, mut f: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, TransportError>>,
    {
        match policy {
            RetryPolicy::BestEffort => f().await,
            RetryPolicy::Reliable { backoff } => loop {
                match f().await {
                    Ok(v) => return Ok(v),
                    Err(err) => {
                        tracing::warn!(error = %err, "rpc attempt failed, retrying");
                        tokio::time::sleep(backoff).await;
                    }
                }
            },
        }
    }

    async fn next_seqid(&self, host: &str, port: u16) -> Result<i32, TransportError> {
        let mut conns = self.conns.lock();
        let conn = self.ensure_conn_locked(&mut conns, host, port).await?;
        let seqid = conn.next_seqid;
        conn.next_seqid = conn.next_seqid.wrapping_add(1);
        Ok(seqid)
    }

    async fn ensure_conn_locked<'a>(
        &self,
        conns: &'a mut HashMap<(String, u16), Conn>,
        host: &str,
        port: u16,
    ) -> Result<&'a mut Conn, TransportError> {
        let key = (host.to_string(), port);
        if !conns.contains_key(&key) {
            let stream = connect(host, port).await?;
            conns.insert(key.clone(), Conn { stream, next_seqid: 0 });
        }
        Ok(conns.get_mut(&key).expect("just inserted"))
    }

    async fn round_trip(
        &self,
        host: &str,
        port: u16,
        frame: &[u8],
    ) -> Result<protocol::Message, TransportError> {
        // The stream is removed from the cache for the duration of the call
        // so a slow peer can't be raced by a second caller; it's put back
        // only on success, dropped on failure so the next call reconnects.
        let (mut stream, next_seqid) = self.take_or_connect(host, port).await?;

        let result = timeout(CALL_TIMEOUT, async {
            stream.write_all(frame).await.map_err(|e| io_err(host, port, e))?;
            read_frame(&mut stream, host, port).await
        })
        .await;

        match result {
            Ok(Ok(bytes)) => {
                let msg = protocol::decode_message(&bytes)?;
                self.conns.lock().insert((host.to_string(), port), Conn { stream, next_seqid });
                Ok(msg)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(TransportError::Timeout {
                host: host.to_string(),
                port,
                timeout_ms: CALL_TIMEOUT.as_millis() as u64,
            }),
        }
    }

    async fn take_or_connect(&self, host: &str, port: u16) -> Result<(TcpStream, i32), TransportError> {
        let key = (host.to_string(), port);
        if let Some(conn) = self.conns.lock().remove(&key) {
            return Ok((conn.stream, conn.next_seqid));
        }
        Ok((connect(host, port).await?, 0))
    }
}

async fn connect(host: &str, port: u16) -> Result<TcpStream, TransportError> {
    TcpStream::connect((host, port)).await.map_err(|e| io_err(host, port, e))
}

async fn read_frame(stream: &mut TcpStream, host: &str, port: u16) -> Result<Vec<u8>, TransportError> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await.map_err(|e| io_err(host, port, e))?;
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await.map_err(|e| io_err(host, port, e))?;
    Ok(buf)
}

fn io_err(host: &str, port: u16, source: std::io::Error) -> TransportError {
    TransportError::Io { host: host.to_string(), port, source }
}

fn exception_to_error(msg: &protocol::Message) -> TransportError {
    match &msg.body {
        Body::Exception { message, .. } => TransportError::Application(message.clone()),
        _ => TransportError::Protocol("malformed exception reply".into()),
    }
}
