use thiserror::Error;

/// Deserialization of a compact sketch payload failed.
///
/// Surfaced to RPC callers as a protocol-level error and to the durability
/// loader as a fatal start-up error; either way the existing in-memory
/// sketch (if any) is left untouched.
#[derive(Debug, Error)]
pub enum CorruptSketch {
    #[error("sketch payload is too short: got {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },
    #[error("unrecognized sketch magic byte: {0:#x}")]
    BadMagic(u8),
    #[error("unsupported sketch precision: log_k={found}, this node runs log_k={expected}")]
    PrecisionMismatch { expected: u8, found: u8 },
    #[error("sketch payload has {len} register bytes, expected {expected}")]
    BadRegisterLen { len: usize, expected: usize },
}
