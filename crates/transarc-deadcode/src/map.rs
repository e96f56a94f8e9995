//! Reachability map format
//!
//! ```json
//! { "keep_roots": ["com.app.Main", "com.app.Api#*"], "closure": "ReferencesAndOverrides" }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::DeadCodeMapError;

/// What counts as reached from a kept declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClosureRule {
    /// Everything referenced from bodies, signatures and initializers
    References,
    /// As `References`, plus methods of kept types that override a kept
    /// method
    #[default]
    ReferencesAndOverrides,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadCodeMap {
    /// `pkg.Type` keeps a type with all its members, `pkg.Type#member` a
    /// member (every overload of a method); a trailing `*` matches any suffix
    pub keep_roots: Vec<String>,
    #[serde(default)]
    pub closure: ClosureRule,
}

impl DeadCodeMap {
    pub fn new(keep_roots: Vec<String>, closure: ClosureRule) -> Result<Self, DeadCodeMapError> {
        let map = Self {
            keep_roots,
            closure,
        };
        map.validate()?;
        Ok(map)
    }

    pub fn from_json(json: &str) -> Result<Self, DeadCodeMapError> {
        let map: Self = serde_json::from_str(json)?;
        map.validate()?;
        Ok(map)
    }

    pub fn load(path: &Path) -> Result<Self, DeadCodeMapError> {
        let json = fs::read_to_string(path).map_err(|source| DeadCodeMapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<(), DeadCodeMapError> {
        for root in &self.keep_roots {
            let reason = if root.is_empty() {
                Some("empty root")
            } else if root.trim_end_matches('*').contains('*') {
                Some("'*' is only allowed at the end")
            } else if root.matches('#').count() > 1 {
                Some("more than one '#'")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(DeadCodeMapError::InvalidRoot {
                    root: root.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }

    /// Whether any root names the declaration with this qualified origin
    pub fn is_root(&self, qualified: &str) -> bool {
        self.keep_roots.iter().any(|r| root_matches(r, qualified))
    }
}

/// Match a keep-root against a qualified origin
///
/// Method origins carry their parameter list (`pkg.T#run(int)`); a root
/// without one names every overload.
pub fn root_matches(root: &str, qualified: &str) -> bool {
    if let Some(prefix) = root.strip_suffix('*') {
        return qualified.starts_with(prefix);
    }
    match qualified.strip_prefix(root) {
        Some("") => true,
        Some(rest) => rest.starts_with('(') && root.contains('#'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_root_matching() {
        assert!(root_matches("p.Main", "p.Main"));
        assert!(!root_matches("p.Main", "p.MainHelper"));
        assert!(root_matches("p.Main#run", "p.Main#run(int)"));
        assert!(root_matches("p.Main#run", "p.Main#run()"));
        assert!(!root_matches("p.Main#run", "p.Main#runAll()"));
        assert!(root_matches("p.api.*", "p.api.Client#send(p.api.Request)"));
        assert!(!root_matches("p.api.*", "p.impl.Client"));
    }

    #[test]
    fn test_parse_defaults_closure() {
        let map = DeadCodeMap::from_json(r#"{ "keep_roots": ["p.Main"] }"#).unwrap();
        assert_eq!(map.closure, ClosureRule::ReferencesAndOverrides);
        assert!(map.is_root("p.Main"));
    }

    #[test]
    fn test_invalid_roots() {
        let err = DeadCodeMap::from_json(r#"{ "keep_roots": ["p.*.Main"] }"#).unwrap_err();
        assert_eq!(err.code(), "E-DEADCODE-003");
        let err = DeadCodeMap::new(vec!["p.A#b#c".into()], ClosureRule::References).unwrap_err();
        assert!(matches!(err, DeadCodeMapError::InvalidRoot { .. }));
        let err = DeadCodeMap::from_json("{ keep_roots: }").unwrap_err();
        assert_eq!(err.code(), "E-DEADCODE-002");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "keep_roots": ["p.*"], "closure": "References" }}"#).unwrap();
        let map = DeadCodeMap::load(file.path()).unwrap();
        assert_eq!(map.closure, ClosureRule::References);

        let missing = file.path().with_extension("missing");
        let err = DeadCodeMap::load(&missing).unwrap_err();
        assert_eq!(err.code(), "E-DEADCODE-001");
    }
}
