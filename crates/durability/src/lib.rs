//! The durability committer: loads the sketch once at start-up, and either
//! flushes it synchronously (STRICT, driven externally) or on a background
//! timer (DELAYED), using an atomic or direct on-disk write protocol.

mod atomic;
mod committer;
mod config;
mod error;

pub use committer::Committer;
pub use config::{DurabilityLevel, COMMITTER_INTERVAL};
pub use error::DurabilityError;
#[doc(hidden)]
pub use atomic::write_atomic_with_fault;
