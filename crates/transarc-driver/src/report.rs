//! Per-unit outcome of a batch

use serde::{Deserialize, Serialize};
use transarc_ast::Diagnostic;

/// Batch stage a unit failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Rewrite,
    Ownership,
    DeadCode,
    Names,
    Imports,
    Emit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitStatus {
    /// Written by the emitter
    Emitted,
    Failed(Stage),
    /// Never worked on after a fail-fast abort
    Skipped,
    /// Every declaration removed by the dead-code filter
    Pruned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitReport {
    pub path: String,
    pub status: UnitStatus,
    /// Errors and warnings from every stage the unit went through
    pub diagnostics: Vec<Diagnostic>,
    /// Emitter failure, if any
    pub error: Option<String>,
    /// Output written for the unit
    pub output: Option<String>,
}

impl UnitReport {
    pub(crate) fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: UnitStatus::Skipped,
            diagnostics: Vec::new(),
            error: None,
            output: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, UnitStatus::Failed(_))
    }

    pub fn has_diagnostic(&self, code: &str) -> bool {
        self.diagnostics.iter().any(|d| d.code() == code)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub units: Vec<UnitReport>,
    /// Ownership cycles broken at a designated owner
    pub broken_cycles: usize,
    pub pruned_types: usize,
    pub pruned_members: usize,
}

impl BatchReport {
    pub fn has_failures(&self) -> bool {
        self.units.iter().any(UnitReport::is_failed)
    }

    pub fn unit(&self, path: &str) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.path == path)
    }

    pub fn count(&self, status: UnitStatus) -> usize {
        self.units.iter().filter(|u| u.status == status).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|u| u.is_failed())
    }

    /// One line for logs and the CLI
    pub fn summary(&self) -> String {
        format!(
            "{} unit(s): {} emitted, {} failed, {} skipped, {} pruned",
            self.units.len(),
            self.count(UnitStatus::Emitted),
            self.failed().count(),
            self.count(UnitStatus::Skipped),
            self.count(UnitStatus::Pruned),
        )
    }
}
