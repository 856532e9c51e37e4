//! RPC transport for the anti-entropy mesh: a length-framed, Thrift-binary
//! compatible wire codec plus a client that caches one TCP connection per
//! peer.

mod error;
pub mod protocol;

mod peer_client;

pub use error::TransportError;
pub use peer_client::{PeerClient, RetryPolicy, CALL_TIMEOUT};
