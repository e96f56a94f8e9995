//! Front-end bundles: the resolved program handed to the translator

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use transarc_ast::{Binding, CompilationUnit};

use crate::DriverError;

/// Units that were given to the translator together
///
/// With `combine_inputs` all units of an input share one output file pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub name: String,
    pub units: Vec<CompilationUnit>,
}

impl Input {
    pub fn new(name: impl Into<String>, units: Vec<CompilationUnit>) -> Self {
        Self {
            name: name.into(),
            units,
        }
    }
}

/// Binding table and units of one batch, as produced by the front end
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrontendBundle {
    pub bindings: Vec<Binding>,
    pub inputs: Vec<Input>,
}

impl FrontendBundle {
    pub fn from_json(json: &str, origin: &Path) -> Result<Self, DriverError> {
        serde_json::from_str(json).map_err(|source| DriverError::Bundle {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, DriverError> {
        let json = fs::read_to_string(path).map_err(|source| DriverError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json, path)
    }

    /// Units across all inputs
    pub fn unit_count(&self) -> usize {
        self.inputs.iter().map(|i| i.units.len()).sum()
    }

    /// Append another bundle's bindings and inputs
    pub fn merge(&mut self, other: FrontendBundle) {
        self.bindings.extend(other.bindings);
        self.inputs.extend(other.inputs);
    }
}
