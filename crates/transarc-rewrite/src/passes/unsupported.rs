//! Unsupported-construct check
//!
//! Reflective invocation and dynamic type loading have no bounded
//! translation, and neither has a method reference whose receiver is computed
//! by an arbitrary expression (it is evaluated once, at creation). Every
//! occurrence is reported; the unit fails after this pass.

use transarc_ast::visit::{self, Visitor};
use transarc_ast::{CompilationUnit, Diagnostic, Expr, ExprKind};

use crate::{Pass, PassContext};

pub struct UnsupportedConstructCheck;

impl Pass for UnsupportedConstructCheck {
    fn name(&self) -> &'static str {
        "unsupported-construct-check"
    }

    fn run(&self, unit: CompilationUnit, ctx: &mut PassContext<'_>) -> CompilationUnit {
        let mut finder = Finder::default();
        finder.visit_unit(&unit);
        for diagnostic in finder.found {
            ctx.report(diagnostic);
        }
        unit
    }
}

#[derive(Default)]
struct Finder {
    found: Vec<Diagnostic>,
}

impl Visitor for Finder {
    fn visit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Reflective { description, .. } => self.found.push(Diagnostic::unsupported(
                format!("reflective invocation `{}`", description),
                expr.span,
            )),
            ExprKind::DynamicLoad { name } => self.found.push(Diagnostic::unsupported(
                format!("dynamic loading of `{}`", name),
                expr.span,
            )),
            ExprKind::MethodRef {
                receiver: Some(receiver),
                ..
            } if !is_capturable(receiver) => self.found.push(Diagnostic::unsupported(
                "method reference on a computed receiver",
                expr.span,
            )),
            _ => {}
        }
        visit::walk_expr(self, expr);
    }
}

/// Receivers a method reference can hold on to by capture
pub(crate) fn is_capturable(receiver: &Expr) -> bool {
    matches!(
        receiver.kind,
        ExprKind::This | ExprKind::OuterThis(_) | ExprKind::Local(_)
    )
}
