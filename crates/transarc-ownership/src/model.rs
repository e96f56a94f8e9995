//! Target memory models

use serde::{Deserialize, Serialize};

/// How the emitted code manages object lifetimes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MemoryModel {
    /// Explicit retain/release; teardown releases every owned field
    #[default]
    ReferenceCounting,
    /// Compiler-managed counting; owned fields are released implicitly and
    /// teardown only clears cycle breakers
    Arc,
}

impl MemoryModel {
    /// Whether teardown must release owned fields itself
    pub fn releases_explicitly(self) -> bool {
        self == MemoryModel::ReferenceCounting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_model_json_names() {
        let json = serde_json::to_string(&MemoryModel::Arc).unwrap();
        assert_eq!(json, "\"Arc\"");
        let parsed: MemoryModel = serde_json::from_str("\"ReferenceCounting\"").unwrap();
        assert_eq!(parsed, MemoryModel::ReferenceCounting);
        assert!(parsed.releases_explicitly());
    }
}
