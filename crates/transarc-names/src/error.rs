//! Error types for name assignment

use thiserror::Error;
use transarc_ast::BindingId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NameError {
    /// E-NAME-001: the disambiguated identifier is still taken
    #[error("cannot find a free name for {origin}: {candidate} already belongs to {holder} in {scope}")]
    CollisionUnresolvable {
        origin: String,
        candidate: String,
        holder: String,
        scope: String,
    },

    /// E-NAME-002: a binding id that is not in the cache
    #[error("unknown binding {0:?}")]
    UnknownBinding(BindingId),
}

impl NameError {
    /// Error code for machine-readable output
    pub fn code(&self) -> &'static str {
        match self {
            NameError::CollisionUnresolvable { .. } => "E-NAME-001",
            NameError::UnknownBinding(_) => "E-NAME-002",
        }
    }

    /// Name errors abort the whole run, not a single unit
    pub fn is_hard_error(&self) -> bool {
        true
    }
}
