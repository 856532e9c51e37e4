use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error talking to {host}:{port}: {source}")]
    Io {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("call to {host}:{port} timed out after {timeout_ms}ms")]
    Timeout { host: String, port: u16, timeout_ms: u64 },
    #[error("malformed frame from peer: {0}")]
    Protocol(String),
    #[error("peer raised an application exception: {0}")]
    Application(String),
}
