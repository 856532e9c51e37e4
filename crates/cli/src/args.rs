use std::path::PathBuf;

use clap::Parser;
use mesh_durability::DurabilityLevel;

/// A log level with a `notset` variant mapping to the filter's "off"
/// default, alongside the usual named levels.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogLevel {
    Notset,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_filter_directive(self) -> &'static str {
        match self {
            LogLevel::Notset => "off",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
            LogLevel::Critical => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Notset => "notset",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Parser)]
#[command(name = "mesh-node", about = "Anti-entropy cardinality-estimation mesh node")]
pub struct Args {
    /// Path to the on-disk sketch file. Required unless --durability=volatile.
    #[arg(long, value_name = "PATH")]
    pub sketch_file: Option<PathBuf>,

    /// Run the anti-entropy RPC server. Enabled by default; pass
    /// --no-server to disable it.
    #[arg(long = "server")]
    _server_flag: bool,
    #[arg(long = "no-server", overrides_with = "_server_flag")]
    no_server: bool,

    /// Run the anti-entropy gossip client. Enabled by default; pass
    /// --no-client to disable it.
    #[arg(long = "client")]
    _client_flag: bool,
    #[arg(long = "no-client", overrides_with = "_client_flag")]
    no_client: bool,

    /// Address the server listens on.
    #[arg(long, default_value = "[::]:6000")]
    pub server_address: String,

    /// Peer addresses the client gossips with.
    #[arg(long = "client-addresses", num_args = 1.., default_value = "[::1]:6000")]
    pub client_addresses: Vec<String>,

    #[arg(long, value_enum, default_value_t = DurabilityLevel::Volatile)]
    pub durability: DurabilityLevel,

    /// Atomic temp-file-and-rename replace versus direct overwrite.
    /// Unspecified derives a default from --durability.
    #[arg(long = "atomicity", action = clap::ArgAction::SetTrue)]
    pub atomicity: bool,
    #[arg(long = "no-atomicity", action = clap::ArgAction::SetTrue, overrides_with = "atomicity")]
    pub no_atomicity: bool,

    #[arg(long, value_enum, default_value_t = LogLevel::Notset)]
    pub log_level: LogLevel,

    /// Read newline-delimited items from stdin instead of generating
    /// synthetic random items.
    #[arg(long)]
    pub stdin: bool,
}

impl Args {
    pub fn server_enabled(&self) -> bool {
        !self.no_server
    }

    pub fn client_enabled(&self) -> bool {
        !self.no_client
    }

    pub fn atomicity_override(&self) -> Option<bool> {
        if self.atomicity {
            Some(true)
        } else if self.no_atomicity {
            Some(false)
        } else {
            None
        }
    }

    pub fn parse_server_address(&self) -> anyhow::Result<(String, u16)> {
        parse_host_port(&self.server_address)
    }

    pub fn parse_client_addresses(&self) -> anyhow::Result<Vec<(String, u16)>> {
        self.client_addresses.iter().map(|s| parse_host_port(s)).collect()
    }
}

fn parse_host_port(s: &str) -> anyhow::Result<(String, u16)> {
    let (host, port) = s
        .rsplit_once(':')
        .ok_or_else(|| anyhow::anyhow!("address {s:?} must be HOST:PORT"))?;
    let port: u16 = port.parse().map_err(|_| anyhow::anyhow!("invalid port in {s:?}"))?;
    Ok((host.to_string(), port))
}
