//! Errors that abort a whole batch

use std::path::PathBuf;

use thiserror::Error;
use transarc_ast::CacheError;
use transarc_deadcode::DeadCodeMapError;
use transarc_names::NameError;

use crate::ConfigError;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Names(#[from] NameError),

    #[error(transparent)]
    DeadCode(#[from] DeadCodeMapError),

    /// E-DRIVER-001
    #[error("binding table rejected: {0}")]
    Cache(#[from] CacheError),

    /// E-DRIVER-002
    #[error("malformed bundle {path}: {source}")]
    Bundle {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// E-DRIVER-003
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DriverError {
    pub fn code(&self) -> &'static str {
        match self {
            DriverError::Config(e) => e.code(),
            DriverError::Names(e) => e.code(),
            DriverError::DeadCode(e) => e.code(),
            DriverError::Cache(_) => "E-DRIVER-001",
            DriverError::Bundle { .. } => "E-DRIVER-002",
            DriverError::Io { .. } => "E-DRIVER-003",
        }
    }

    pub fn is_hard_error(&self) -> bool {
        match self {
            DriverError::Config(e) => e.is_hard_error(),
            DriverError::Names(e) => e.is_hard_error(),
            DriverError::DeadCode(e) => e.is_hard_error(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_pass_through() {
        let err: DriverError = ConfigError::Invalid {
            field: "workers",
            reason: "zero".into(),
        }
        .into();
        assert_eq!(err.code(), "E-CONFIG-003");

        let err: DriverError = NameError::CollisionUnresolvable {
            origin: "p.A".into(),
            candidate: "PA".into(),
            holder: "q.A".into(),
            scope: "types".into(),
        }
        .into();
        assert_eq!(err.code(), "E-NAME-001");
        assert!(err.is_hard_error());

        let err: DriverError = CacheError::DuplicateOrigin("p.A".into()).into();
        assert_eq!(err.code(), "E-DRIVER-001");
    }
}
