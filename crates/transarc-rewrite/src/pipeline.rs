//! Pass trait and the ordered pipeline

use log::{debug, info};
use transarc_ast::CompilationUnit;

use crate::passes::{
    ArrayOperatorLowering, Autoboxing, EnhancedForDesugaring, InnerTypeExtraction,
    MethodReferenceLowering, NilCheckInsertion, OuterReferenceResolution, SequencingExtraction,
    StaticInitNormalization, SwitchLowering, TypeOrdering, UnsupportedConstructCheck,
};
use crate::PassContext;

/// A semantics-preserving rewrite of one compilation unit
pub trait Pass: Send + Sync {
    /// Name of the pass (for logging and reports)
    fn name(&self) -> &'static str;

    /// Rewrite the unit, reporting problems through the context
    fn run(&self, unit: CompilationUnit, ctx: &mut PassContext<'_>) -> CompilationUnit;
}

/// Result of running a pipeline over one unit
#[derive(Debug)]
pub struct PipelineOutcome {
    pub unit: CompilationUnit,
    /// Passes that ran to completion, in order
    pub completed: Vec<&'static str>,
    /// Pass after which the unit was abandoned
    pub failed_at: Option<&'static str>,
}

impl PipelineOutcome {
    pub fn succeeded(&self) -> bool {
        self.failed_at.is_none()
    }
}

/// Passes applied in a fixed order
///
/// A pass that leaves an error diagnostic in the context fails the unit and
/// the remaining passes are skipped.
pub struct Pipeline {
    passes: Vec<Box<dyn Pass>>,
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// Add a pass to the end of the pipeline
    pub fn add_pass<P: Pass + 'static>(&mut self, pass: P) {
        self.passes.push(Box::new(pass));
    }

    pub fn with_pass<P: Pass + 'static>(mut self, pass: P) -> Self {
        self.add_pass(pass);
        self
    }

    /// The standard translation order
    pub fn standard() -> Self {
        Self::new()
            .with_pass(UnsupportedConstructCheck)
            .with_pass(SwitchLowering)
            .with_pass(MethodReferenceLowering)
            .with_pass(Autoboxing)
            .with_pass(EnhancedForDesugaring)
            .with_pass(InnerTypeExtraction)
            .with_pass(OuterReferenceResolution)
            .with_pass(StaticInitNormalization)
            .with_pass(SequencingExtraction)
            .with_pass(NilCheckInsertion)
            .with_pass(ArrayOperatorLowering)
            .with_pass(TypeOrdering)
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn run(&self, unit: CompilationUnit, ctx: &mut PassContext<'_>) -> PipelineOutcome {
        let mut unit = unit;
        let mut completed = Vec::with_capacity(self.passes.len());
        for pass in &self.passes {
            debug!("{}: running {}", ctx.unit_path(), pass.name());
            unit = pass.run(unit, ctx);
            if ctx.has_errors() {
                info!(
                    "{}: abandoned after {} with {} diagnostic(s)",
                    ctx.unit_path(),
                    pass.name(),
                    ctx.diagnostics().len()
                );
                return PipelineOutcome {
                    unit,
                    completed,
                    failed_at: Some(pass.name()),
                };
            }
            completed.push(pass.name());
        }
        PipelineOutcome {
            unit,
            completed,
            failed_at: None,
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transarc_ast::builder::{self, ProgramBuilder};
    use transarc_ast::{BindingCache, Expr, ExprKind, Stmt, TypeDecl, TypeRef};

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_standard_order() {
        let names = Pipeline::standard().pass_names();
        assert_eq!(names.len(), 12);
        assert_eq!(names[0], "unsupported-construct-check");
        assert_eq!(names[1], "switch-lowering");
        assert_eq!(names[2], "method-reference-lowering");
        assert_eq!(names[5], "inner-type-extraction");
        assert_eq!(names[6], "outer-reference-resolution");
        assert_eq!(names[11], "type-ordering");
    }

    #[test]
    fn test_unsupported_construct_stops_the_unit() {
        init_logging();
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let c = b.class("p", "C");
        let m = b.method(c, "m", vec![], TypeRef::Void);
        let load = Expr::synthetic(
            ExprKind::DynamicLoad {
                name: "p.Plugin".into(),
            },
            TypeRef::Object,
        );
        let decl = TypeDecl::new(c).with_member(builder::method_member(m, vec![], vec![Stmt::expr(load)]));
        let unit = CompilationUnit::new("p/C.src", "p").with_type(decl);

        let mut ctx = PassContext::new(&cache, "p/C.src");
        let outcome = Pipeline::standard().run(unit, &mut ctx);
        assert!(!outcome.succeeded());
        assert_eq!(outcome.failed_at, Some("unsupported-construct-check"));
        assert!(outcome.completed.is_empty());
        assert_eq!(ctx.diagnostics().len(), 1);
    }

    #[test]
    fn test_clean_unit_runs_every_pass() {
        init_logging();
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let c = b.class("p", "C");
        let m = b.method(c, "m", vec![], TypeRef::int());
        let decl = TypeDecl::new(c).with_member(builder::method_member(
            m,
            vec![],
            vec![builder::ret(Some(builder::int(1)))],
        ));
        let unit = CompilationUnit::new("p/C.src", "p").with_type(decl);

        let mut ctx = PassContext::new(&cache, "p/C.src");
        let pipeline = Pipeline::standard();
        let outcome = pipeline.run(unit, &mut ctx);
        assert!(outcome.succeeded());
        assert_eq!(outcome.completed, pipeline.pass_names());
    }
}
