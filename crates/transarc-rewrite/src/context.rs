//! Per-unit state shared by the passes of one pipeline run

use std::collections::HashMap;

use transarc_ast::builder::ProgramBuilder;
use transarc_ast::{has_errors, BindingCache, BindingId, Diagnostic};

/// What type extraction decided about a lifted type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub ty: BindingId,
    /// Immediately enclosing type
    pub enclosing: BindingId,
    /// Whether the type reads members of an enclosing instance
    pub needs_outer: bool,
    /// Captured locals of the enclosing scopes, in first-use order
    pub captures: Vec<BindingId>,
}

#[derive(Debug)]
pub struct PassContext<'a> {
    pub cache: &'a BindingCache,
    unit_path: String,
    diagnostics: Vec<Diagnostic>,
    extractions: Vec<Extraction>,
    extraction_index: HashMap<BindingId, usize>,
}

impl<'a> PassContext<'a> {
    pub fn new(cache: &'a BindingCache, unit_path: impl Into<String>) -> Self {
        Self {
            cache,
            unit_path: unit_path.into(),
            diagnostics: Vec::new(),
            extractions: Vec::new(),
            extraction_index: HashMap::new(),
        }
    }

    pub fn builder(&self) -> ProgramBuilder<'a> {
        ProgramBuilder::new(self.cache)
    }

    pub fn unit_path(&self) -> &str {
        &self.unit_path
    }

    /// Record a diagnostic against the unit being rewritten
    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic.in_unit(self.unit_path.clone()));
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        has_errors(&self.diagnostics)
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn record_extraction(&mut self, extraction: Extraction) {
        self.extraction_index
            .insert(extraction.ty, self.extractions.len());
        self.extractions.push(extraction);
    }

    pub fn extraction(&self, ty: BindingId) -> Option<&Extraction> {
        self.extraction_index
            .get(&ty)
            .map(|index| &self.extractions[*index])
    }

    pub fn extractions(&self) -> &[Extraction] {
        &self.extractions
    }
}
