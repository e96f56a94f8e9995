//! Autoboxing normalization
//!
//! Every implicit conversion between a primitive and its boxed wrapper
//! becomes an explicit `Box` or `Unbox` node. Compound assignment and
//! increments whose target is boxed become boxed runtime operations that
//! store the result back.

use transarc_ast::fold::{self, Folder};
use transarc_ast::{
    BinaryOp, BindingCache, CompilationUnit, Expr, ExprKind, FieldDecl, Intrinsic, MethodDecl,
    Stmt, StmtKind, TypeRef,
};

use crate::{Pass, PassContext};

pub struct Autoboxing;

impl Pass for Autoboxing {
    fn name(&self) -> &'static str {
        "autoboxing"
    }

    fn run(&self, unit: CompilationUnit, ctx: &mut PassContext<'_>) -> CompilationUnit {
        Boxer {
            cache: ctx.cache,
            returns: Vec::new(),
        }
        .fold_unit(unit)
    }
}

pub(crate) fn box_value(expr: Expr) -> Expr {
    match expr.ty {
        TypeRef::Primitive(p) => {
            let span = expr.span;
            Expr::new(ExprKind::Box(Box::new(expr)), TypeRef::Boxed(p), span)
        }
        _ => expr,
    }
}

pub(crate) fn unbox_value(expr: Expr) -> Expr {
    match expr.ty {
        TypeRef::Boxed(p) => {
            let span = expr.span;
            Expr::new(ExprKind::Unbox(Box::new(expr)), TypeRef::Primitive(p), span)
        }
        _ => expr,
    }
}

/// Convert `expr` so its value fits a slot of type `target`
pub(crate) fn coerce(expr: Expr, target: &TypeRef) -> Expr {
    match (target, &expr.ty) {
        (TypeRef::Primitive(_), TypeRef::Boxed(_)) => unbox_value(expr),
        (TypeRef::Boxed(boxed), TypeRef::Primitive(_)) => {
            let boxed = *boxed;
            let mut boxed_expr = box_value(expr);
            boxed_expr.ty = TypeRef::Boxed(boxed);
            boxed_expr
        }
        (TypeRef::Object | TypeRef::External(_) | TypeRef::Declared(_), TypeRef::Primitive(_)) => {
            box_value(expr)
        }
        _ => expr,
    }
}

struct Boxer<'a> {
    cache: &'a BindingCache,
    returns: Vec<TypeRef>,
}

impl Boxer<'_> {
    fn param_types(&self, method: transarc_ast::BindingId) -> Vec<TypeRef> {
        self.cache
            .get(method)
            .and_then(|b| b.as_method().map(|m| m.params.clone()))
            .unwrap_or_default()
    }

    fn coerce_args(&self, method: transarc_ast::BindingId, args: Vec<Expr>) -> Vec<Expr> {
        let params = self.param_types(method);
        args.into_iter()
            .enumerate()
            .map(|(i, arg)| match params.get(i) {
                Some(param) => coerce(arg, param),
                None => arg,
            })
            .collect()
    }

    fn declared_type(&self, var: transarc_ast::BindingId) -> Option<TypeRef> {
        self.cache.get(var).and_then(|b| b.value_type().cloned())
    }

    fn return_type(&self, method: transarc_ast::BindingId) -> TypeRef {
        self.cache
            .get(method)
            .and_then(|b| b.as_method().map(|m| m.ret.clone()))
            .unwrap_or(TypeRef::Void)
    }
}

impl Folder for Boxer<'_> {
    fn fold_method(&mut self, method: MethodDecl) -> MethodDecl {
        self.returns.push(self.return_type(method.binding));
        let method = fold::walk_method(self, method);
        self.returns.pop();
        method
    }

    fn fold_field(&mut self, field: FieldDecl) -> FieldDecl {
        let mut field = fold::walk_field(self, field);
        if let Some(ty) = self.declared_type(field.binding) {
            field.init = field.init.map(|e| coerce(e, &ty));
        }
        field
    }

    fn fold_stmt(&mut self, stmt: Stmt) -> Vec<Stmt> {
        fold::walk_stmt(self, stmt)
            .into_iter()
            .map(|stmt| {
                let Stmt { kind, span } = stmt;
                let kind = match kind {
                    StmtKind::Local {
                        var,
                        init: Some(init),
                    } => {
                        let init = match self.declared_type(var) {
                            Some(ty) => coerce(init, &ty),
                            None => init,
                        };
                        StmtKind::Local {
                            var,
                            init: Some(init),
                        }
                    }
                    StmtKind::Return(Some(value)) => {
                        let value = match self.returns.last() {
                            Some(ret) => coerce(value, ret),
                            None => value,
                        };
                        StmtKind::Return(Some(value))
                    }
                    StmtKind::If {
                        cond,
                        then_branch,
                        else_branch,
                    } => StmtKind::If {
                        cond: unbox_value(cond),
                        then_branch,
                        else_branch,
                    },
                    StmtKind::While { cond, body } => StmtKind::While {
                        cond: unbox_value(cond),
                        body,
                    },
                    StmtKind::DoWhile { body, cond } => StmtKind::DoWhile {
                        body,
                        cond: unbox_value(cond),
                    },
                    StmtKind::For {
                        init,
                        cond,
                        update,
                        body,
                    } => StmtKind::For {
                        init,
                        cond: cond.map(unbox_value),
                        update,
                        body,
                    },
                    other => other,
                };
                Stmt { kind, span }
            })
            .collect()
    }

    fn fold_expr(&mut self, expr: Expr) -> Expr {
        if let ExprKind::Lambda { method, .. } = expr.kind {
            // returns inside the body answer to the lambda's method
            self.returns.push(self.return_type(method));
            let expr = fold::walk_expr(self, expr);
            self.returns.pop();
            return expr;
        }
        let Expr { kind, ty, span } = fold::walk_expr(self, expr);
        let kind = match kind {
            ExprKind::Assign {
                op: None,
                target,
                value,
            } => {
                let value = coerce(*value, &target.ty);
                ExprKind::Assign {
                    op: None,
                    target,
                    value: Box::new(value),
                }
            }
            ExprKind::Assign {
                op: Some(op),
                target,
                value,
            } => match target.ty {
                TypeRef::Boxed(boxed) => ExprKind::Intrinsic {
                    func: Intrinsic::BoxedCompoundAssign { op, boxed },
                    args: vec![*target, unbox_value(*value)],
                },
                TypeRef::String => ExprKind::Assign {
                    op: Some(op),
                    target,
                    value,
                },
                _ => ExprKind::Assign {
                    op: Some(op),
                    target,
                    value: Box::new(unbox_value(*value)),
                },
            },
            ExprKind::Step { op, prefix, target } => match target.ty {
                TypeRef::Boxed(boxed) => ExprKind::Intrinsic {
                    func: Intrinsic::BoxedStep { op, prefix, boxed },
                    args: vec![*target],
                },
                _ => ExprKind::Step { op, prefix, target },
            },
            ExprKind::Binary { op, lhs, rhs } => {
                let concat = op == BinaryOp::Add && ty.is_string();
                let identity = matches!(op, BinaryOp::Eq | BinaryOp::Ne)
                    && lhs.ty.is_reference()
                    && rhs.ty.is_reference();
                if concat || identity {
                    ExprKind::Binary { op, lhs, rhs }
                } else {
                    ExprKind::Binary {
                        op,
                        lhs: Box::new(unbox_value(*lhs)),
                        rhs: Box::new(unbox_value(*rhs)),
                    }
                }
            }
            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op,
                operand: Box::new(unbox_value(*operand)),
            },
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => ExprKind::Conditional {
                cond: Box::new(unbox_value(*cond)),
                then_expr: Box::new(coerce(*then_expr, &ty)),
                else_expr: Box::new(coerce(*else_expr, &ty)),
            },
            ExprKind::Call {
                target,
                method,
                args,
                is_super,
            } => ExprKind::Call {
                target,
                method,
                args: self.coerce_args(method, args),
                is_super,
            },
            ExprKind::New {
                class,
                ctor,
                args,
                outer,
                body,
            } => {
                let args = match ctor {
                    Some(ctor) => self.coerce_args(ctor, args),
                    None => args,
                };
                ExprKind::New {
                    class,
                    ctor,
                    args,
                    outer,
                    body,
                }
            }
            ExprKind::Index { array, index } => ExprKind::Index {
                array,
                index: Box::new(unbox_value(*index)),
            },
            ExprKind::NewArray {
                element,
                dims,
                init,
            } => {
                let slot = ty.element_type().cloned().unwrap_or_else(|| element.clone());
                ExprKind::NewArray {
                    element,
                    dims: dims.into_iter().map(unbox_value).collect(),
                    init: init.map(|items| items.into_iter().map(|e| coerce(e, &slot)).collect()),
                }
            }
            ExprKind::Cast { expr: inner } => ExprKind::Cast {
                expr: Box::new(coerce(*inner, &ty)),
            },
            other => other,
        };
        Expr { kind, ty, span }
    }
}
