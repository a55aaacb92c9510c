//! Import configuration for docport.
//!
//! Values come from an optional YAML file (with `${VAR}` expansion) and are
//! then overridden by command line flags in the runner.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

mod inference_cfg;

pub use inference_cfg::{ConflictPolicy, DetectorConfig};

use inference_cfg::default_true;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("expanding environment in {path}: {details}")]
    Env { path: PathBuf, details: String },

    #[error("parsing config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {details}")]
    Invalid { details: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for one import session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Documents per insert call.
    pub batch_size: usize,

    /// Documents at the start of each batch inspected for structure.
    /// Zero means the whole batch.
    pub inference_depth: usize,

    /// Format detectors for the value classifier.
    pub detect: DetectorConfig,

    /// Top-level fields forming the primary key, in key order.
    pub primary_key: Vec<String>,

    /// Top-level fields whose values the store generates.
    pub autogenerate: Vec<String>,

    /// Allow importing into a collection that already exists.
    pub append: bool,

    /// Refuse to create the collection when it does not exist.
    pub no_create: bool,

    /// Evolve and push the schema on every batch, even for existing
    /// collections.
    pub update_schema: bool,

    /// Strip null values and empty arrays before retrying an insert.
    pub cleanup_null_values: bool,

    /// Which insert failures trigger an evolve-and-retry.
    pub retry: RetryPolicy,

    /// Fallback for incompatible field types.
    pub on_conflict: ConflictPolicy,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            inference_depth: 0,
            detect: DetectorConfig::default(),
            primary_key: Vec::new(),
            autogenerate: Vec::new(),
            append: false,
            no_create: false,
            update_schema: false,
            cleanup_null_values: true,
            retry: RetryPolicy::default(),
            on_conflict: ConflictPolicy::default(),
        }
    }
}

/// Insert failures that are answered by one schema evolution and one retry.
///
/// Not every "not found" or "invalid argument" failure is caused by a
/// schema mismatch, so each kind can be switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub on_not_found: bool,

    #[serde(default = "default_true")]
    pub on_invalid_argument: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            on_not_found: true,
            on_invalid_argument: true,
        }
    }
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

fn default_batch_size() -> usize {
    100
}

impl ImportConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                details: "batch_size must be greater than zero".into(),
            });
        }
        check_names("primary_key", &self.primary_key)?;
        check_names("autogenerate", &self.autogenerate)?;
        Ok(())
    }
}

fn check_names(list: &str, names: &[String]) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                details: format!("{list} contains an empty field name"),
            });
        }
        if !seen.insert(name.as_str()) {
            return Err(ConfigError::Invalid {
                details: format!("{list} lists '{name}' more than once"),
            });
        }
    }
    Ok(())
}

/// Parse and validate a YAML config string.
pub fn load_from_str(raw: &str, origin: &Path) -> ConfigResult<ImportConfig> {
    let with_env = shellexpand::env(raw).map_err(|e| ConfigError::Env {
        path: origin.to_path_buf(),
        details: e.to_string(),
    })?;
    let cfg: ImportConfig =
        serde_yaml::from_str(&with_env).map_err(|source| {
            ConfigError::Parse {
                path: origin.to_path_buf(),
                source,
            }
        })?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_from_path(
    file_path: impl AsRef<Path>,
) -> ConfigResult<ImportConfig> {
    let path = file_path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg = load_from_str(&raw, path)?;
    debug!(path = %path.display(), config = ?cfg, "import config loaded");
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ImportConfig::default();
        assert_eq!(cfg.batch_size, 100);
        assert_eq!(cfg.inference_depth, 0);
        assert!(cfg.cleanup_null_values);
        assert!(cfg.retry.enabled);
        assert_eq!(cfg.on_conflict, ConflictPolicy::Fail);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_keys() {
        let cfg = ImportConfig {
            primary_key: vec!["id".into(), "id".into()],
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let cfg = ImportConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
