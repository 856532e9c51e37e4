use std::fmt;
use std::str::FromStr;

/// How aggressively the sketch is persisted to stable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DurabilityLevel {
    /// Flush synchronously on every mutation.
    Strict,
    /// Periodic background flush, plus a flush on signal/shutdown.
    Delayed,
    /// Never flush; the sketch does not survive a restart.
    Volatile,
}

impl DurabilityLevel {
    pub fn is_volatile(self) -> bool {
        matches!(self, DurabilityLevel::Volatile)
    }
}

impl fmt::Display for DurabilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DurabilityLevel::Strict => "strict",
            DurabilityLevel::Delayed => "delayed",
            DurabilityLevel::Volatile => "volatile",
        };
        f.write_str(s)
    }
}

impl FromStr for DurabilityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(DurabilityLevel::Strict),
            "delayed" => Ok(DurabilityLevel::Delayed),
            "volatile" => Ok(DurabilityLevel::Volatile),
            other => Err(format!("unknown durability level: '{other}'")),
        }
    }
}

/// Background flush interval for [`DurabilityLevel::Delayed`].
pub const COMMITTER_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);
