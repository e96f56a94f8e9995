//! Method-reference lowering
//!
//! `Type::m`, `receiver::m` and `Type::new` become lambdas over the
//! parameters of the implemented interface method, with a body that calls
//! the target. Without a receiver an instance target is invoked on the first
//! parameter. A receiver is read inside the body, so it reaches the lifted
//! type through capture like any other local or enclosing instance.

use log::debug;
use transarc_ast::builder::{self, ProgramBuilder};
use transarc_ast::fold::{self, Folder};
use transarc_ast::{
    BindingId, Block, CompilationUnit, Diagnostic, Expr, ExprKind, Stmt, TypeRef,
};

use crate::{Pass, PassContext};

pub struct MethodReferenceLowering;

impl Pass for MethodReferenceLowering {
    fn name(&self) -> &'static str {
        "method-reference-lowering"
    }

    fn run(&self, unit: CompilationUnit, ctx: &mut PassContext<'_>) -> CompilationUnit {
        let mut lowerer = Lowerer {
            builder: ctx.builder(),
            problems: Vec::new(),
        };
        let unit = lowerer.fold_unit(unit);
        for problem in lowerer.problems {
            ctx.report(problem);
        }
        unit
    }
}

struct Lowerer<'a> {
    builder: ProgramBuilder<'a>,
    problems: Vec<Diagnostic>,
}

impl Lowerer<'_> {
    /// The call a reference stands for, over the lambda parameters
    fn target_call(
        &self,
        receiver: Option<Expr>,
        target: BindingId,
        mut args: Vec<Expr>,
    ) -> Option<Expr> {
        let cache = self.builder.cache();
        let binding = cache.get(target)?;
        if binding.is_constructor() {
            let class = binding.declaring?;
            return Some(builder::new_object(class, Some(target), args));
        }
        let receiver = match receiver {
            Some(receiver) => Some(receiver),
            None if binding.is_static || args.is_empty() => None,
            None => Some(args.remove(0)),
        };
        Some(builder::call(
            receiver,
            target,
            args,
            self.builder.return_type(target),
        ))
    }

    fn lower(
        &self,
        class: BindingId,
        method: BindingId,
        receiver: Option<Expr>,
        target: BindingId,
    ) -> Option<ExprKind> {
        let b = &self.builder;
        let param_types = b
            .cache()
            .get(method)
            .and_then(|m| m.as_method().map(|m| m.params.clone()))
            .unwrap_or_default();
        let params: Vec<BindingId> = param_types
            .iter()
            .enumerate()
            .map(|(i, ty)| b.param(method, &format!("arg${}", i), ty.clone()))
            .collect();
        let args = params
            .iter()
            .zip(&param_types)
            .map(|(p, ty)| Expr::local(*p, ty.clone()))
            .collect();

        let call = self.target_call(receiver, target, args)?;
        let stmt = match b.return_type(method) {
            TypeRef::Void => Stmt::expr(call),
            _ => builder::ret(Some(call)),
        };
        debug!(
            "lowering reference to {} into {}",
            b.cache().qualified_of(target),
            b.cache().qualified_of(class)
        );
        Some(ExprKind::Lambda {
            class,
            method,
            params,
            body: Block::new(vec![stmt]),
        })
    }
}

impl Folder for Lowerer<'_> {
    fn fold_expr(&mut self, expr: Expr) -> Expr {
        let Expr { kind, ty, span } = fold::walk_expr(self, expr);
        let kind = match kind {
            ExprKind::MethodRef {
                class,
                method,
                receiver,
                target,
            } => match self.lower(class, method, receiver.clone().map(|r| *r), target) {
                Some(lambda) => lambda,
                None => {
                    self.problems.push(Diagnostic::unsupported(
                        format!(
                            "reference to unresolved member `{}`",
                            self.builder.cache().qualified_of(target)
                        ),
                        span,
                    ));
                    ExprKind::MethodRef {
                        class,
                        method,
                        receiver,
                        target,
                    }
                }
            },
            other => other,
        };
        Expr { kind, ty, span }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transarc_ast::{BindingCache, StmtKind, TypeDecl};

    struct Fixture<'a> {
        b: ProgramBuilder<'a>,
        host: BindingId,
        run: BindingId,
        sink: BindingId,
    }

    fn fixture(cache: &BindingCache) -> Fixture<'_> {
        let b = ProgramBuilder::new(cache);
        let host = b.class("p", "Host");
        let run = b.method(host, "run", vec![], TypeRef::Void);
        let sink = b.interface("p", "Sink");
        Fixture { b, host, run, sink }
    }

    fn lower_in<'c>(
        f: &Fixture<'_>,
        cache: &'c BindingCache,
        reference: Expr,
    ) -> (Expr, PassContext<'c>) {
        let decl = TypeDecl::new(f.host).with_member(builder::method_member(
            f.run,
            vec![],
            vec![Stmt::expr(reference)],
        ));
        let unit = CompilationUnit::new("p/Host.src", "p").with_type(decl);
        let mut ctx = PassContext::new(cache, "p/Host.src");
        let mut unit = MethodReferenceLowering.run(unit, &mut ctx);
        let decl = unit.types.remove(0);
        let mut stmts = decl.methods().next().unwrap().body.clone().unwrap().stmts;
        let StmtKind::Expr(expr) = stmts.remove(0).kind else {
            panic!("expected expression statement");
        };
        (expr, ctx)
    }

    fn reference(
        class: BindingId,
        method: BindingId,
        receiver: Option<Expr>,
        target: BindingId,
    ) -> Expr {
        Expr::synthetic(
            ExprKind::MethodRef {
                class,
                method,
                receiver: receiver.map(Box::new),
                target,
            },
            TypeRef::Object,
        )
    }

    #[test]
    fn test_unbound_reference_calls_target_on_first_parameter() {
        let cache = BindingCache::new();
        let f = fixture(&cache);
        let item = f.b.class("p", "Item");
        let label = f.b.method(item, "label", vec![TypeRef::int()], TypeRef::String);
        let class = f.b.lambda_type(f.run, f.sink, 1);
        let apply = f.b.method(
            class,
            "apply",
            vec![TypeRef::Declared(item), TypeRef::int()],
            TypeRef::String,
        );

        let (lowered, ctx) = lower_in(&f, &cache, reference(class, apply, None, label));
        assert!(ctx.diagnostics().is_empty());
        let ExprKind::Lambda { params, body, .. } = lowered.kind else {
            panic!("expected lambda");
        };
        assert_eq!(params.len(), 2);
        let StmtKind::Return(Some(call)) = &body.stmts[0].kind else {
            panic!("expected return");
        };
        let ExprKind::Call { target, method, args, .. } = &call.kind else {
            panic!("expected call");
        };
        assert_eq!(*method, label);
        assert_eq!(target.as_deref().map(|t| &t.kind), Some(&ExprKind::Local(params[0])));
        assert_eq!(args, &vec![Expr::local(params[1], TypeRef::int())]);
    }

    #[test]
    fn test_bound_and_constructor_references() {
        let cache = BindingCache::new();
        let f = fixture(&cache);
        let log = f.b.class("p", "Log");
        let write = f.b.method(log, "write", vec![TypeRef::String], TypeRef::Void);
        let make = f.b.constructor(log, vec![TypeRef::String]);
        let given = f.b.local(f.run, "given", TypeRef::Declared(log));

        let bound = f.b.lambda_type(f.run, f.sink, 1);
        let accept = f.b.method(bound, "accept", vec![TypeRef::String], TypeRef::Void);
        let receiver = Expr::local(given, TypeRef::Declared(log));
        let bound_ref = reference(bound, accept, Some(receiver.clone()), write);
        let (lowered, _) = lower_in(&f, &cache, bound_ref);
        let ExprKind::Lambda { body, .. } = lowered.kind else {
            panic!("expected lambda");
        };
        let StmtKind::Expr(call) = &body.stmts[0].kind else {
            panic!("void target is called as a statement");
        };
        let ExprKind::Call { target, args, .. } = &call.kind else {
            panic!("expected call");
        };
        assert_eq!(target.as_deref(), Some(&receiver));
        assert_eq!(args.len(), 1);

        let factory = f.b.lambda_type(f.run, f.sink, 2);
        let create = f.b.method(factory, "create", vec![TypeRef::String], TypeRef::Declared(log));
        let (lowered, _) = lower_in(&f, &cache, reference(factory, create, None, make));
        let ExprKind::Lambda { body, .. } = lowered.kind else {
            panic!("expected lambda");
        };
        let StmtKind::Return(Some(created)) = &body.stmts[0].kind else {
            panic!("expected return");
        };
        assert!(matches!(
            created.kind,
            ExprKind::New { class, ctor: Some(ctor), .. } if class == log && ctor == make
        ));
    }
}
