//! Nil-check insertion
//!
//! Every dereference of a reference value (instance field access, instance
//! method call target, array element access and length, unboxing, iterator
//! acquisition) is wrapped in a `nil_chk` intrinsic unless the value is
//! provably non-null. A local that has been checked once stays checked for
//! the rest of the straight-line code, until it is reassigned.

use std::collections::HashSet;

use transarc_ast::fold::{self, Folder};
use transarc_ast::{
    BinaryOp, BindingCache, BindingId, CompilationUnit, Expr, ExprKind, Intrinsic, Literal,
    MethodDecl, Stmt, StmtKind,
};

use crate::{Pass, PassContext};

pub struct NilCheckInsertion;

impl Pass for NilCheckInsertion {
    fn name(&self) -> &'static str {
        "nil-check-insertion"
    }

    fn run(&self, unit: CompilationUnit, ctx: &mut PassContext<'_>) -> CompilationUnit {
        NilChecker {
            cache: ctx.cache,
            checked: HashSet::new(),
        }
        .fold_unit(unit)
    }
}

/// Values that can never be null
fn is_non_null(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::This
        | ExprKind::OuterThis(_)
        | ExprKind::New { .. }
        | ExprKind::NewArray { .. }
        | ExprKind::Lambda { .. }
        | ExprKind::MethodRef { .. }
        | ExprKind::Box(_)
        | ExprKind::Literal(Literal::Str(_)) => true,
        ExprKind::Binary {
            op: BinaryOp::Add, ..
        } => expr.ty.is_string(),
        ExprKind::Intrinsic { func, .. } => matches!(
            func,
            Intrinsic::NilCheck
                | Intrinsic::ArrayCreate { .. }
                | Intrinsic::ArrayInit { .. }
                | Intrinsic::StringConcat
                | Intrinsic::StringEquals
        ),
        ExprKind::Cast { expr: inner } => is_non_null(inner),
        _ => false,
    }
}

struct NilChecker<'a> {
    cache: &'a BindingCache,
    /// Locals known to be non-null at the current point
    checked: HashSet<BindingId>,
}

impl NilChecker<'_> {
    fn is_static(&self, member: BindingId) -> bool {
        self.cache.get(member).is_some_and(|b| b.is_static)
    }

    /// Fold a dereferenced value and guard it
    fn checked_deref(&mut self, expr: Expr) -> Expr {
        let expr = self.fold_expr(expr);
        if !expr.ty.is_reference() || is_non_null(&expr) {
            return expr;
        }
        if let ExprKind::Local(var) = expr.kind {
            if !self.checked.insert(var) {
                return expr;
            }
        }
        let ty = expr.ty.clone();
        let span = expr.span;
        Expr::new(
            ExprKind::Intrinsic {
                func: Intrinsic::NilCheck,
                args: vec![expr],
            },
            ty,
            span,
        )
    }

    /// Fold an assignment target: the written slot is not dereferenced, the
    /// object or array holding it is
    fn fold_place(&mut self, place: Expr) -> Expr {
        let Expr { kind, ty, span } = place;
        let kind = match kind {
            ExprKind::Field {
                target: Some(target),
                field,
            } if !self.is_static(field) => ExprKind::Field {
                target: Some(Box::new(self.checked_deref(*target))),
                field,
            },
            ExprKind::Index { array, index } => ExprKind::Index {
                array: Box::new(self.checked_deref(*array)),
                index: Box::new(self.fold_expr(*index)),
            },
            other => return self.fold_expr(Expr { kind: other, ty, span }),
        };
        Expr { kind, ty, span }
    }

    /// Record what an assignment to a local means for later dereferences
    fn assigned(&mut self, var: BindingId, value: Option<&Expr>) {
        if value.is_some_and(is_non_null) {
            self.checked.insert(var);
        } else {
            self.checked.remove(&var);
        }
    }

    /// Fold a conditionally evaluated expression without letting its checks
    /// escape
    fn fold_isolated(&mut self, expr: Expr) -> Expr {
        let saved = self.checked.clone();
        let expr = self.fold_expr(expr);
        self.checked = saved;
        expr
    }
}

impl Folder for NilChecker<'_> {
    fn fold_method(&mut self, method: MethodDecl) -> MethodDecl {
        self.checked.clear();
        let method = fold::walk_method(self, method);
        self.checked.clear();
        method
    }

    fn fold_stmt(&mut self, stmt: Stmt) -> Vec<Stmt> {
        let Stmt { kind, span } = stmt;
        match kind {
            StmtKind::Local { var, init } => {
                let init = init.map(|e| self.fold_expr(e));
                self.assigned(var, init.as_ref());
                vec![Stmt::new(StmtKind::Local { var, init }, span)]
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.fold_expr(cond);
                let saved = self.checked.clone();
                let then_branch = Box::new(fold::fold_single(self, *then_branch));
                self.checked = saved;
                let else_branch = else_branch.map(|e| Box::new(fold::fold_single(self, *e)));
                self.checked.clear();
                vec![Stmt::new(
                    StmtKind::If {
                        cond,
                        then_branch,
                        else_branch,
                    },
                    span,
                )]
            }
            kind @ (StmtKind::Expr(_) | StmtKind::Return(_) | StmtKind::Throw(_)) => {
                fold::walk_stmt(self, Stmt { kind, span })
            }
            kind => {
                // Loops, blocks and handlers: nothing is known on entry or exit
                self.checked.clear();
                let folded = fold::walk_stmt(self, Stmt { kind, span });
                self.checked.clear();
                folded
            }
        }
    }

    fn fold_expr(&mut self, expr: Expr) -> Expr {
        let Expr { kind, ty, span } = expr;
        let kind = match kind {
            ExprKind::Field {
                target: Some(target),
                field,
            } if !self.is_static(field) => ExprKind::Field {
                target: Some(Box::new(self.checked_deref(*target))),
                field,
            },
            ExprKind::Call {
                target: Some(target),
                method,
                args,
                is_super: false,
            } if !self.is_static(method) => {
                let target = self.checked_deref(*target);
                ExprKind::Call {
                    target: Some(Box::new(target)),
                    method,
                    args: args.into_iter().map(|a| self.fold_expr(a)).collect(),
                    is_super: false,
                }
            }
            ExprKind::Index { array, index } => {
                let array = self.checked_deref(*array);
                ExprKind::Index {
                    array: Box::new(array),
                    index: Box::new(self.fold_expr(*index)),
                }
            }
            ExprKind::Length(array) => ExprKind::Length(Box::new(self.checked_deref(*array))),
            ExprKind::Unbox(boxed) => ExprKind::Unbox(Box::new(self.checked_deref(*boxed))),
            ExprKind::Intrinsic {
                func: Intrinsic::IteratorAcquire,
                args,
            } => ExprKind::Intrinsic {
                func: Intrinsic::IteratorAcquire,
                args: args.into_iter().map(|a| self.checked_deref(a)).collect(),
            },
            ExprKind::Intrinsic {
                func: func @ (Intrinsic::BoxedStep { .. } | Intrinsic::BoxedCompoundAssign { .. }),
                args,
            } => {
                let args = args
                    .into_iter()
                    .enumerate()
                    .map(|(i, a)| if i == 0 { self.fold_place(a) } else { self.fold_expr(a) })
                    .collect();
                ExprKind::Intrinsic { func, args }
            }
            ExprKind::Assign { op, target, value } => {
                let target = self.fold_place(*target);
                let value = self.fold_expr(*value);
                if let ExprKind::Local(var) = target.kind {
                    let known = op.is_none().then_some(&value);
                    self.assigned(var, known);
                }
                ExprKind::Assign {
                    op,
                    target: Box::new(target),
                    value: Box::new(value),
                }
            }
            ExprKind::Step { op, prefix, target } => ExprKind::Step {
                op,
                prefix,
                target: Box::new(self.fold_place(*target)),
            },
            ExprKind::Binary { op, lhs, rhs } if op.is_short_circuit() => {
                let lhs = self.fold_expr(*lhs);
                let rhs = self.fold_isolated(*rhs);
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                }
            }
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                let cond = self.fold_expr(*cond);
                ExprKind::Conditional {
                    cond: Box::new(cond),
                    then_expr: Box::new(self.fold_isolated(*then_expr)),
                    else_expr: Box::new(self.fold_isolated(*else_expr)),
                }
            }
            kind => return fold::walk_expr(self, Expr { kind, ty, span }),
        };
        Expr { kind, ty, span }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transarc_ast::builder::{self, ProgramBuilder};
    use transarc_ast::{TypeDecl, TypeRef};

    fn is_nil_check(expr: &Expr) -> bool {
        matches!(
            expr.kind,
            ExprKind::Intrinsic {
                func: Intrinsic::NilCheck,
                ..
            }
        )
    }

    fn call_target(stmt: &Stmt) -> &Expr {
        let StmtKind::Expr(expr) = &stmt.kind else {
            panic!("expected expression statement");
        };
        let ExprKind::Call {
            target: Some(target),
            ..
        } = &expr.kind
        else {
            panic!("expected call with target");
        };
        target
    }

    #[test]
    fn test_local_is_checked_once_per_straight_line() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let c = b.class("p", "C");
        let run = b.method(c, "run", vec![], TypeRef::Void);
        let m = b.method(c, "m", vec![TypeRef::Declared(c)], TypeRef::Void);
        let other = b.param(m, "other", TypeRef::Declared(c));
        let read = || Expr::local(other, TypeRef::Declared(c));
        let body = vec![
            Stmt::expr(builder::call(Some(read()), run, vec![], TypeRef::Void)),
            Stmt::expr(builder::call(Some(read()), run, vec![], TypeRef::Void)),
            Stmt::expr(builder::call(Some(builder::this(c)), run, vec![], TypeRef::Void)),
            Stmt::expr(builder::call(
                Some(builder::new_object(c, None, vec![])),
                run,
                vec![],
                TypeRef::Void,
            )),
        ];
        let decl = TypeDecl::new(c).with_member(builder::method_member(m, vec![other], body));
        let unit = CompilationUnit::new("p/C.src", "p").with_type(decl);
        let mut ctx = PassContext::new(&cache, "p/C.src");
        let unit = NilCheckInsertion.run(unit, &mut ctx);
        let stmts = &unit.types[0].method(m).unwrap().body.as_ref().unwrap().stmts;

        assert!(is_nil_check(call_target(&stmts[0])));
        assert!(!is_nil_check(call_target(&stmts[1])));
        assert!(!is_nil_check(call_target(&stmts[2])));
        assert!(!is_nil_check(call_target(&stmts[3])));
    }

    #[test]
    fn test_check_in_short_circuit_rhs_does_not_escape() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let c = b.class("p", "C");
        let ok = b.method(c, "ok", vec![], TypeRef::boolean());
        let m = b.method(c, "m", vec![], TypeRef::Void);
        let other = b.local(m, "other", TypeRef::Declared(c));
        let read = || Expr::local(other, TypeRef::Declared(c));
        let guarded = builder::binary(
            BinaryOp::And,
            builder::binary(BinaryOp::Ne, read(), builder::null(), TypeRef::boolean()),
            builder::call(Some(read()), ok, vec![], TypeRef::boolean()),
            TypeRef::boolean(),
        );
        let body = vec![
            builder::declare_local(other, None),
            Stmt::expr(guarded),
            Stmt::expr(builder::call(Some(read()), ok, vec![], TypeRef::boolean())),
        ];
        let decl = TypeDecl::new(c).with_member(builder::method_member(m, vec![], body));
        let unit = CompilationUnit::new("p/C.src", "p").with_type(decl);
        let mut ctx = PassContext::new(&cache, "p/C.src");
        let unit = NilCheckInsertion.run(unit, &mut ctx);
        let stmts = &unit.types[0].method(m).unwrap().body.as_ref().unwrap().stmts;

        assert!(is_nil_check(call_target(&stmts[2])));
    }
}
