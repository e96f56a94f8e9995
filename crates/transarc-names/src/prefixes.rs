//! Per-package type name prefixes

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Prefix overrides keyed by package; `pkg.*` covers `pkg` and every
/// subpackage, the longest matching key wins. Packages without an override
/// use their camel-cased name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackagePrefixes {
    prefixes: BTreeMap<String, String>,
}

impl PackagePrefixes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, package: impl Into<String>, prefix: impl Into<String>) {
        self.prefixes.insert(package.into(), prefix.into());
    }

    pub fn with(mut self, package: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.insert(package, prefix);
        self
    }

    pub fn prefix_for(&self, package: &str) -> String {
        if let Some(prefix) = self.prefixes.get(package) {
            return prefix.clone();
        }
        let wildcard = self
            .prefixes
            .iter()
            .filter_map(|(key, prefix)| {
                let base = key.strip_suffix(".*")?;
                let matches = package == base
                    || package
                        .strip_prefix(base)
                        .is_some_and(|rest| rest.starts_with('.'));
                matches.then_some((base.len(), prefix))
            })
            .max_by_key(|(len, _)| *len);
        match wildcard {
            Some((_, prefix)) => prefix.clone(),
            None => camel_case_package(package),
        }
    }
}

/// `com.example.util` becomes `ComExampleUtil`
pub fn camel_case_package(package: &str) -> String {
    package.split('.').map(capitalize).collect()
}

pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prefix_is_camel_case() {
        let prefixes = PackagePrefixes::new();
        assert_eq!(prefixes.prefix_for("com.example.util"), "ComExampleUtil");
        assert_eq!(prefixes.prefix_for(""), "");
    }

    #[test]
    fn test_exact_and_wildcard_prefixes() {
        let prefixes = PackagePrefixes::new()
            .with("com.example.*", "EX")
            .with("com.example.net.*", "NET")
            .with("org.demo", "DM");
        assert_eq!(prefixes.prefix_for("com.example"), "EX");
        assert_eq!(prefixes.prefix_for("com.example.io"), "EX");
        assert_eq!(prefixes.prefix_for("com.example.net.http"), "NET");
        assert_eq!(prefixes.prefix_for("org.demo"), "DM");
        assert_eq!(prefixes.prefix_for("org.demo.sub"), "OrgDemoSub");
        assert_eq!(prefixes.prefix_for("com.examples"), "ComExamples");
    }

    #[test]
    fn test_prefixes_read_as_plain_object() {
        let prefixes: PackagePrefixes =
            serde_json::from_str(r#"{ "com.example.*": "EX", "org.demo": "DM" }"#).unwrap();
        assert_eq!(prefixes, PackagePrefixes::new().with("com.example.*", "EX").with("org.demo", "DM"));
    }
}
