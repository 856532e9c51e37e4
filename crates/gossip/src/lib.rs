//! Anti-entropy gossip: the server side (`push`/`pull` RPCs dispatched
//! against a shared sketch engine) and the client side (periodic
//! sample-and-exchange loop).

mod client;
mod peer;
mod server;

pub use client::{AntiEntropyClient, ANTI_ENTROPY_INTERVAL, ANTI_ENTROPY_MAX_CLIENTS};
pub use peer::{PeerAddress, PeerAddressError};
pub use server::AntiEntropyServer;
