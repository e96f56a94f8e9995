//! Diagnostics collected per unit
//!
//! Translation problems are never thrown across unit boundaries. Each stage
//! records `Diagnostic`s against the unit it is working on and the driver
//! decides, per unit, whether it may continue to later stages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Span;

/// Severity level of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

/// What went wrong
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// E-UNSUPPORTED-001: a construct with no defined lowering
    #[error("unsupported construct: {construct}")]
    UnsupportedConstruct { construct: String },

    /// E-OWNERSHIP-001: an ownership cycle with no designated owner
    #[error(
        "reference cycle between {} has no designated owner; annotate one field as retained-with its partner or mark one weak",
        .types.join(", ")
    )]
    UnresolvableCycle { types: Vec<String>, edges: Vec<String> },

    /// W-OWNERSHIP-002: more than one designated owner inside a cycle
    #[error("several designated owners in cycle; keeping {kept}, breaking {}", .demoted.join(", "))]
    MultipleDesignatedOwners { kept: String, demoted: Vec<String> },

    /// E-OWNERSHIP-003: teardown would follow owned edges back into its cycle
    #[error("teardown of {type_name} re-enters its own ownership cycle through {path}")]
    TeardownCycle { type_name: String, path: String },

    /// E-IMPORT-001: declarations that need each other's full layout
    #[error("layout dependency cycle: {}", .participants.join(" -> "))]
    ImportCycle { participants: Vec<String> },
}

impl DiagnosticKind {
    /// Error code for machine-readable output
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::UnsupportedConstruct { .. } => "E-UNSUPPORTED-001",
            DiagnosticKind::UnresolvableCycle { .. } => "E-OWNERSHIP-001",
            DiagnosticKind::MultipleDesignatedOwners { .. } => "W-OWNERSHIP-002",
            DiagnosticKind::TeardownCycle { .. } => "E-OWNERSHIP-003",
            DiagnosticKind::ImportCycle { .. } => "E-IMPORT-001",
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            DiagnosticKind::MultipleDesignatedOwners { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// A diagnostic attached to a unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    /// Source path of the unit the diagnostic belongs to
    pub unit: Option<String>,
    pub span: Span,
    /// Qualified names of the declarations involved
    pub related: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, span: Span) -> Self {
        let severity = kind.default_severity();
        Self {
            kind,
            severity,
            unit: None,
            span,
            related: Vec::new(),
        }
    }

    pub fn unsupported(construct: impl Into<String>, span: Span) -> Self {
        Self::new(
            DiagnosticKind::UnsupportedConstruct {
                construct: construct.into(),
            },
            span,
        )
    }

    pub fn in_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_related(mut self, related: impl IntoIterator<Item = String>) -> Self {
        self.related.extend(related);
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        };
        match &self.unit {
            Some(unit) => write!(f, "{}[{}] {}: {}", level, self.code(), unit, self.kind),
            None => write!(f, "{}[{}]: {}", level, self.code(), self.kind),
        }
    }
}

/// Whether any diagnostic in the list is an error
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}
