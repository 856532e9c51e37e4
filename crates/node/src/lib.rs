//! Node lifecycle: configuration validation, start/stop orchestration of
//! the server/client/committer subtasks, and termination-signal handling.

mod config;
mod coordinator;
mod signals;

pub use config::{ConfigError, NodeConfig, RawNodeConfig};
pub use coordinator::NodeCoordinator;
pub use signals::watch_termination_signals;
