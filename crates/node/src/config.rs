use std::path::PathBuf;

use mesh_durability::DurabilityLevel;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--atomicity is meaningless under volatile durability; sketch-file must also be absent")]
    AtomicityUnderVolatile,
    #[error("--sketch-file is required unless durability is volatile")]
    SketchFileRequired,
    #[error("--sketch-file must not be set when durability is volatile")]
    SketchFileUnderVolatile,
    #[error("sketch file path {0:?} is a directory, not a file")]
    SketchFileIsDirectory(PathBuf),
    #[error("sketch file's parent directory {0:?} does not exist")]
    ParentDirectoryMissing(PathBuf),
    #[error("sketch file's parent directory {0:?} is not writable")]
    ParentDirectoryNotWritable(PathBuf),
    #[error("sketch file {0:?} exists but is not writable")]
    SketchFileNotWritable(PathBuf),
}

fn is_readonly(path: &std::path::Path) -> bool {
    std::fs::metadata(path).map(|m| m.permissions().readonly()).unwrap_or(false)
}

/// Fully validated configuration for one node, built from whatever
/// front-end (CLI flags, in this repo) gathers raw input.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    pub sketch_file: Option<PathBuf>,
    pub server_enabled: bool,
    pub client_enabled: bool,
    pub server_address: (String, u16),
    pub client_addresses: Vec<(String, u16)>,
    pub durability: DurabilityLevel,
    pub atomicity: bool,
}

/// Raw, unvalidated input. `atomicity: None` means "unspecified, derive
/// the default from durability" per the coordinator's validation rule.
pub struct RawNodeConfig {
    pub sketch_file: Option<PathBuf>,
    pub server_enabled: bool,
    pub client_enabled: bool,
    pub server_address: (String, u16),
    pub client_addresses: Vec<(String, u16)>,
    pub durability: DurabilityLevel,
    pub atomicity: Option<bool>,
}

impl NodeConfig {
    pub fn validate(raw: RawNodeConfig) -> Result<Self, ConfigError> {
        let atomicity = raw.atomicity.unwrap_or(!raw.durability.is_volatile());

        if raw.durability.is_volatile() {
            if atomicity {
                return Err(ConfigError::AtomicityUnderVolatile);
            }
            if raw.sketch_file.is_some() {
                return Err(ConfigError::SketchFileUnderVolatile);
            }
        } else if raw.sketch_file.is_none() {
            return Err(ConfigError::SketchFileRequired);
        }

        if let Some(path) = &raw.sketch_file {
            if path.is_dir() {
                return Err(ConfigError::SketchFileIsDirectory(path.clone()));
            }
            let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
            if let Some(parent) = parent {
                if !parent.exists() {
                    return Err(ConfigError::ParentDirectoryMissing(parent.to_path_buf()));
                }
                if is_readonly(parent) {
                    return Err(ConfigError::ParentDirectoryNotWritable(parent.to_path_buf()));
                }
            }
            if path.exists() && is_readonly(path) {
                return Err(ConfigError::SketchFileNotWritable(path.clone()));
            }
        }

        Ok(NodeConfig {
            sketch_file: raw.sketch_file,
            server_enabled: raw.server_enabled,
            client_enabled: raw.client_enabled,
            server_address: raw.server_address,
            client_addresses: raw.client_addresses,
            durability: raw.durability,
            atomicity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> RawNodeConfig {
        RawNodeConfig {
            sketch_file: None,
            server_enabled: true,
            client_enabled: true,
            server_address: ("[::]".into(), 6000),
            client_addresses: vec![("[::1]".into(), 6000)],
            durability: DurabilityLevel::Volatile,
            atomicity: None,
        }
    }

    #[test]
    fn volatile_defaults_atomicity_off() {
        let cfg = NodeConfig::validate(base()).unwrap();
        assert!(!cfg.atomicity);
    }

    #[test]
    fn volatile_rejects_explicit_atomicity() {
        let mut raw = base();
        raw.atomicity = Some(true);
        assert_eq!(NodeConfig::validate(raw), Err(ConfigError::AtomicityUnderVolatile));
    }

    #[test]
    fn volatile_rejects_sketch_file() {
        let mut raw = base();
        raw.sketch_file = Some(PathBuf::from("/tmp/whatever"));
        assert_eq!(NodeConfig::validate(raw), Err(ConfigError::SketchFileUnderVolatile));
    }

    #[test]
    fn non_volatile_requires_sketch_file() {
        let mut raw = base();
        raw.durability = DurabilityLevel::Delayed;
        assert_eq!(NodeConfig::validate(raw), Err(ConfigError::SketchFileRequired));
    }

    #[test]
    fn non_volatile_defaults_atomicity_on() {
        let dir = tempfile::tempdir().unwrap();
        let mut raw = base();
        raw.durability = DurabilityLevel::Delayed;
        raw.sketch_file = Some(dir.path().join("sketch.bin"));
        let cfg = NodeConfig::validate(raw).unwrap();
        assert!(cfg.atomicity);
    }

    #[test]
    fn rejects_sketch_file_parent_missing() {
        let mut raw = base();
        raw.durability = DurabilityLevel::Strict;
        raw.sketch_file = Some(PathBuf::from("/no/such/directory/sketch.bin"));
        assert!(matches!(NodeConfig::validate(raw), Err(ConfigError::ParentDirectoryMissing(_))));
    }

    #[test]
    fn rejects_readonly_parent_directory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let mut perms = std::fs::metadata(dir.path()).unwrap().permissions();
        perms.set_mode(0o555);
        std::fs::set_permissions(dir.path(), perms.clone()).unwrap();

        let mut raw = base();
        raw.durability = DurabilityLevel::Strict;
        raw.sketch_file = Some(dir.path().join("sketch.bin"));
        let result = NodeConfig::validate(raw);

        perms.set_mode(0o755);
        std::fs::set_permissions(dir.path(), perms).unwrap();

        assert!(matches!(result, Err(ConfigError::ParentDirectoryNotWritable(_))));
    }

    #[test]
    fn rejects_readonly_existing_sketch_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sketch.bin");
        std::fs::write(&path, b"existing").unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o444);
        std::fs::set_permissions(&path, perms).unwrap();

        let mut raw = base();
        raw.durability = DurabilityLevel::Strict;
        raw.sketch_file = Some(path);
        assert!(matches!(NodeConfig::validate(raw), Err(ConfigError::SketchFileNotWritable(_))));
    }
}
