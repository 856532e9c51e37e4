use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerAddressError {
    #[error("peer address must be HOST:PORT, got {0:?}")]
    Malformed(String),
    #[error("peer host must not be empty")]
    EmptyHost,
    #[error("invalid port: {0}")]
    InvalidPort(String),
}

/// A validated `(host, port)` pair naming a gossip peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerAddress {
    host: String,
    port: u16,
}

impl PeerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, PeerAddressError> {
        let host = host.into();
        if host.is_empty() {
            return Err(PeerAddressError::EmptyHost);
        }
        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for PeerAddress {
    type Err = PeerAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| PeerAddressError::Malformed(s.to_string()))?;
        let port: u16 = port
            .parse()
            .map_err(|_| PeerAddressError::InvalidPort(port.to_string()))?;
        PeerAddress::new(host, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port() {
        let addr: PeerAddress = "127.0.0.1:6000".parse().unwrap();
        assert_eq!(addr.host(), "127.0.0.1");
        assert_eq!(addr.port(), 6000);
    }

    #[test]
    fn parses_bracketed_ipv6() {
        let addr: PeerAddress = "[::1]:6000".parse().unwrap();
        assert_eq!(addr.host(), "[::1]");
        assert_eq!(addr.port(), 6000);
    }

    #[test]
    fn rejects_missing_port() {
        assert!("127.0.0.1".parse::<PeerAddress>().is_err());
    }

    #[test]
    fn rejects_empty_host() {
        assert!(":6000".parse::<PeerAddress>().is_err());
    }
}
