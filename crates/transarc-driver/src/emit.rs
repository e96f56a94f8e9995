//! Handing finalized units to the code generator

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use transarc_ast::CompilationUnit;
use transarc_imports::ImportSets;

use crate::DriverError;

/// A generation unit after every stage, ready for code generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedUnit {
    /// Output name without extension (`com/example/Foo`)
    pub name: String,
    pub units: Vec<CompilationUnit>,
    pub imports: ImportSets,
}

/// Consumer of finalized units; called from worker threads
pub trait Emitter: Send + Sync {
    /// Write the unit and return where it went
    fn emit(&self, unit: &FinalizedUnit) -> Result<String, DriverError>;
}

/// Writes each finalized unit as `<output_dir>/<name>.json`
#[derive(Debug, Clone)]
pub struct ManifestEmitter {
    output_dir: PathBuf,
}

impl ManifestEmitter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.json", name))
    }
}

impl Emitter for ManifestEmitter {
    fn emit(&self, unit: &FinalizedUnit) -> Result<String, DriverError> {
        let path = self.path_for(&unit.name);
        let io_error = |source| DriverError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(unit).map_err(|source| DriverError::Bundle {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(io_error)?;
        Ok(path.display().to_string())
    }
}

/// Keeps finalized units in memory
#[derive(Debug, Default)]
pub struct MemoryEmitter {
    units: Mutex<Vec<FinalizedUnit>>,
}

impl MemoryEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emitted units sorted by name
    pub fn into_units(self) -> Vec<FinalizedUnit> {
        let mut units = self
            .units
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        units.sort_by(|a, b| a.name.cmp(&b.name));
        units
    }
}

impl Emitter for MemoryEmitter {
    fn emit(&self, unit: &FinalizedUnit) -> Result<String, DriverError> {
        self.units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(unit.clone());
        Ok(unit.name.clone())
    }
}
