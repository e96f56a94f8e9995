//! Errors loading a dead-code map

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeadCodeMapError {
    /// E-DEADCODE-001
    #[error("cannot read dead-code map {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// E-DEADCODE-002
    #[error("malformed dead-code map: {0}")]
    Parse(#[from] serde_json::Error),

    /// E-DEADCODE-003
    #[error("invalid keep-root '{root}': {reason}")]
    InvalidRoot { root: String, reason: &'static str },
}

impl DeadCodeMapError {
    pub fn code(&self) -> &'static str {
        match self {
            DeadCodeMapError::Io { .. } => "E-DEADCODE-001",
            DeadCodeMapError::Parse(_) => "E-DEADCODE-002",
            DeadCodeMapError::InvalidRoot { .. } => "E-DEADCODE-003",
        }
    }

    /// A map that cannot be loaded stops the run before any unit is translated
    pub fn is_hard_error(&self) -> bool {
        true
    }
}
