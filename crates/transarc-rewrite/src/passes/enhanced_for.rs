//! Enhanced-iteration desugaring
//!
//! `for (T x : array)` becomes an index loop over a temporary holding the
//! array; `for (T x : iterable)` becomes an explicit acquire / has-next /
//! advance loop over a temporary iterator. A label on the loop moves to the
//! generated loop so labelled `continue` keeps its target.

use transarc_ast::builder::ProgramBuilder;
use transarc_ast::fold::{self, Folder};
use transarc_ast::{
    BinaryOp, BindingId, Block, CompilationUnit, Expr, ExprKind, Intrinsic, MethodDecl, Span,
    StepOp, Stmt, StmtKind, TypeDecl, TypeRef,
};

use super::autobox::coerce;
use crate::{Pass, PassContext};

pub struct EnhancedForDesugaring;

impl Pass for EnhancedForDesugaring {
    fn name(&self) -> &'static str {
        "enhanced-for-desugaring"
    }

    fn run(&self, unit: CompilationUnit, ctx: &mut PassContext<'_>) -> CompilationUnit {
        Desugarer {
            builder: ctx.builder(),
            owners: Vec::new(),
        }
        .fold_unit(unit)
    }
}

struct Desugarer<'a> {
    builder: ProgramBuilder<'a>,
    /// Method (or type, for initializers) that owns new temporaries
    owners: Vec<BindingId>,
}

impl Desugarer<'_> {
    fn owner(&self) -> BindingId {
        self.owners.last().copied().unwrap_or(BindingId(0))
    }

    /// Desugar one loop; returns the setup statements and the new loop
    fn desugar(
        &mut self,
        var: BindingId,
        iterable: Expr,
        body: Stmt,
        span: Span,
    ) -> (Vec<Stmt>, Stmt) {
        let var_ty = self.builder.type_of(var);
        match iterable.ty.clone() {
            TypeRef::Array(element) => self.array_loop(var, var_ty, *element, iterable, body, span),
            _ => self.iterator_loop(var, var_ty, iterable, body, span),
        }
    }

    fn array_loop(
        &mut self,
        var: BindingId,
        var_ty: TypeRef,
        element: TypeRef,
        iterable: Expr,
        body: Stmt,
        span: Span,
    ) -> (Vec<Stmt>, Stmt) {
        let array_ty = iterable.ty.clone();
        let array = self.builder.temp(self.owner(), "array", array_ty.clone());
        let index = self.builder.temp(self.owner(), "index", TypeRef::int());
        let read_array = || Expr::local(array, array_ty.clone());
        let read_index = || Expr::local(index, TypeRef::int());

        let setup = vec![Stmt::new(
            StmtKind::Local {
                var: array,
                init: Some(iterable),
            },
            span,
        )];

        let element_read = Expr::synthetic(
            ExprKind::Index {
                array: Box::new(read_array()),
                index: Box::new(read_index()),
            },
            element,
        );
        let element_read = coerce(element_read, &var_ty);
        let cond = Expr::synthetic(
            ExprKind::Binary {
                op: BinaryOp::Lt,
                lhs: Box::new(read_index()),
                rhs: Box::new(Expr::synthetic(
                    ExprKind::Length(Box::new(read_array())),
                    TypeRef::int(),
                )),
            },
            TypeRef::boolean(),
        );
        let update = Expr::synthetic(
            ExprKind::Step {
                op: StepOp::Increment,
                prefix: false,
                target: Box::new(read_index()),
            },
            TypeRef::int(),
        );
        let looped = Stmt::new(
            StmtKind::For {
                init: vec![Stmt::synthetic(StmtKind::Local {
                    var: index,
                    init: Some(transarc_ast::builder::int(0)),
                })],
                cond: Some(cond),
                update: vec![update],
                body: Box::new(loop_body(var, element_read, body)),
            },
            span,
        );
        (setup, looped)
    }

    fn iterator_loop(
        &mut self,
        var: BindingId,
        var_ty: TypeRef,
        iterable: Expr,
        body: Stmt,
        span: Span,
    ) -> (Vec<Stmt>, Stmt) {
        let element_ty = match &var_ty {
            TypeRef::Primitive(p) => TypeRef::Boxed(*p),
            other => other.clone(),
        };
        let iter_ty = TypeRef::Iterator(Box::new(element_ty.clone()));
        let iter = self.builder.temp(self.owner(), "iter", iter_ty.clone());
        let read_iter = || Expr::local(iter, iter_ty.clone());

        let setup = vec![Stmt::new(
            StmtKind::Local {
                var: iter,
                init: Some(Expr::intrinsic(
                    Intrinsic::IteratorAcquire,
                    vec![iterable],
                    iter_ty.clone(),
                )),
            },
            span,
        )];
        let next = Expr::intrinsic(Intrinsic::IteratorNext, vec![read_iter()], element_ty);
        let next = coerce(next, &var_ty);
        let looped = Stmt::new(
            StmtKind::While {
                cond: Expr::intrinsic(
                    Intrinsic::IteratorHasNext,
                    vec![read_iter()],
                    TypeRef::boolean(),
                ),
                body: Box::new(loop_body(var, next, body)),
            },
            span,
        );
        (setup, looped)
    }
}

fn loop_body(var: BindingId, value: Expr, body: Stmt) -> Stmt {
    let mut stmts = vec![Stmt::synthetic(StmtKind::Local {
        var,
        init: Some(value),
    })];
    match body.kind {
        StmtKind::Block(block) => stmts.extend(block.stmts),
        _ => stmts.push(body),
    }
    Stmt::synthetic(StmtKind::Block(Block::new(stmts)))
}

impl Folder for Desugarer<'_> {
    fn fold_type_decl(&mut self, decl: TypeDecl) -> TypeDecl {
        self.owners.push(decl.binding);
        let decl = fold::walk_type_decl(self, decl);
        self.owners.pop();
        decl
    }

    fn fold_method(&mut self, method: MethodDecl) -> MethodDecl {
        self.owners.push(method.binding);
        let method = fold::walk_method(self, method);
        self.owners.pop();
        method
    }

    fn fold_expr(&mut self, expr: Expr) -> Expr {
        match expr.kind {
            ExprKind::Lambda { method, .. } => {
                self.owners.push(method);
                let expr = fold::walk_expr(self, expr);
                self.owners.pop();
                expr
            }
            _ => fold::walk_expr(self, expr),
        }
    }

    fn fold_stmt(&mut self, stmt: Stmt) -> Vec<Stmt> {
        let span = stmt.span;
        match stmt.kind {
            StmtKind::ForEach {
                var,
                iterable,
                body,
            } => {
                let iterable = self.fold_expr(iterable);
                let body = fold::fold_single(self, *body);
                let (mut setup, looped) = self.desugar(var, iterable, body, span);
                setup.push(looped);
                vec![Stmt::new(StmtKind::Block(Block { stmts: setup, span }), span)]
            }
            StmtKind::Labeled { label, body } if matches!(body.kind, StmtKind::ForEach { .. }) => {
                let Stmt { kind, span: loop_span } = *body;
                let StmtKind::ForEach {
                    var,
                    iterable,
                    body,
                } = kind
                else {
                    return Vec::new();
                };
                let iterable = self.fold_expr(iterable);
                let body = fold::fold_single(self, *body);
                let (mut setup, looped) = self.desugar(var, iterable, body, loop_span);
                setup.push(Stmt::new(
                    StmtKind::Labeled {
                        label,
                        body: Box::new(looped),
                    },
                    span,
                ));
                vec![Stmt::new(StmtKind::Block(Block { stmts: setup, span }), span)]
            }
            kind => fold::walk_stmt(self, Stmt { kind, span }),
        }
    }
}
