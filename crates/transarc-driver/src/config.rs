//! Batch configuration

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::thread;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use transarc_names::PackagePrefixes;
use transarc_ownership::MemoryModel;

/// Units queued for the worker pool before submission blocks
pub const DEFAULT_MAX_BATCH_SIZE: usize = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// E-CONFIG-001
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// E-CONFIG-002
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    /// E-CONFIG-003
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Io { .. } => "E-CONFIG-001",
            ConfigError::Parse(_) => "E-CONFIG-002",
            ConfigError::Invalid { .. } => "E-CONFIG-003",
        }
    }

    pub fn is_hard_error(&self) -> bool {
        true
    }
}

/// Options for one batch; every field has a default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Directory receiving the emitted files
    pub output_dir: PathBuf,
    /// Roots searched for headers of library types
    pub search_paths: Vec<PathBuf>,
    /// Capacity of the work queue feeding the pool
    pub max_batch_size: usize,
    /// Worker threads
    pub workers: usize,
    /// Reachability map; no filtering when absent
    pub dead_code_map: Option<PathBuf>,
    /// Emit each input's units to a single file pair
    pub combine_inputs: bool,
    pub memory_model: MemoryModel,
    pub package_prefixes: PackagePrefixes,
    /// Stop scheduling work after the first failed unit
    pub fail_fast: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("out"),
            search_paths: Vec::new(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            workers: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            dead_code_map: None,
            combine_inputs: false,
            memory_model: MemoryModel::default(),
            package_prefixes: PackagePrefixes::new(),
            fail_fast: false,
        }
    }
}

impl BatchConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "max_batch_size",
                reason: "must be greater than zero".into(),
            });
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid {
                field: "workers",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BatchConfig::from_json("{}").unwrap();
        assert_eq!(config.max_batch_size, 300);
        assert!(config.workers >= 1);
        assert_eq!(config.memory_model, MemoryModel::ReferenceCounting);
        assert!(!config.fail_fast);
        assert!(config.dead_code_map.is_none());
    }

    #[test]
    fn test_parse_fields() {
        let config = BatchConfig::from_json(
            r#"{
                "output_dir": "gen",
                "workers": 2,
                "memory_model": "Arc",
                "package_prefixes": { "com.example": "CE" },
                "combine_inputs": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("gen"));
        assert_eq!(config.workers, 2);
        assert_eq!(config.memory_model, MemoryModel::Arc);
        assert_eq!(config.package_prefixes.prefix_for("com.example"), "CE");
        assert!(config.combine_inputs);
    }

    #[test]
    fn test_zero_sizes_rejected() {
        let err = BatchConfig::from_json(r#"{ "max_batch_size": 0 }"#).unwrap_err();
        assert_eq!(err.code(), "E-CONFIG-003");
        let err = BatchConfig::from_json(r#"{ "workers": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "workers", .. }));
        let err = BatchConfig::from_json(r#"{ "workers": "many" }"#).unwrap_err();
        assert_eq!(err.code(), "E-CONFIG-002");
    }
}
