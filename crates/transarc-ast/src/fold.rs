//! Owning tree reconstruction
//!
//! Rewrite passes implement [`Folder`] and override only the hooks they care
//! about; the `walk_*` functions rebuild every other node unchanged. Statement
//! folding returns a `Vec<Stmt>` so a pass can replace one statement with
//! several (temporaries before a use) or with none.

use crate::{
    Block, CatchClause, CompilationUnit, Expr, ExprKind, FieldDecl, InitializerDecl, Member,
    MethodDecl, Stmt, StmtKind, SwitchCase, TypeDecl,
};

pub trait Folder: Sized {
    fn fold_unit(&mut self, unit: CompilationUnit) -> CompilationUnit {
        walk_unit(self, unit)
    }

    fn fold_type_decl(&mut self, decl: TypeDecl) -> TypeDecl {
        walk_type_decl(self, decl)
    }

    /// Fold one member; returning several members (or none) is allowed
    fn fold_member(&mut self, member: Member) -> Vec<Member> {
        walk_member(self, member)
    }

    fn fold_field(&mut self, field: FieldDecl) -> FieldDecl {
        walk_field(self, field)
    }

    fn fold_method(&mut self, method: MethodDecl) -> MethodDecl {
        walk_method(self, method)
    }

    fn fold_initializer(&mut self, init: InitializerDecl) -> InitializerDecl {
        walk_initializer(self, init)
    }

    fn fold_block(&mut self, block: Block) -> Block {
        walk_block(self, block)
    }

    fn fold_stmt(&mut self, stmt: Stmt) -> Vec<Stmt> {
        walk_stmt(self, stmt)
    }

    fn fold_expr(&mut self, expr: Expr) -> Expr {
        walk_expr(self, expr)
    }
}

pub fn walk_unit<F: Folder>(folder: &mut F, unit: CompilationUnit) -> CompilationUnit {
    let CompilationUnit {
        path,
        package,
        imports,
        types,
    } = unit;
    CompilationUnit {
        path,
        package,
        imports,
        types: types.into_iter().map(|t| folder.fold_type_decl(t)).collect(),
    }
}

pub fn walk_type_decl<F: Folder>(folder: &mut F, decl: TypeDecl) -> TypeDecl {
    let TypeDecl {
        binding,
        members,
        meta,
        span,
    } = decl;
    let members = members
        .into_iter()
        .flat_map(|m| folder.fold_member(m))
        .collect();
    TypeDecl {
        binding,
        members,
        meta,
        span,
    }
}

pub fn walk_member<F: Folder>(folder: &mut F, member: Member) -> Vec<Member> {
    let member = match member {
        Member::Field(f) => Member::Field(folder.fold_field(f)),
        Member::Method(m) => Member::Method(folder.fold_method(m)),
        Member::Initializer(i) => Member::Initializer(folder.fold_initializer(i)),
        Member::Type(t) => Member::Type(folder.fold_type_decl(t)),
        Member::Destructor(d) => Member::Destructor(d),
    };
    vec![member]
}

pub fn walk_field<F: Folder>(folder: &mut F, mut field: FieldDecl) -> FieldDecl {
    field.init = field.init.map(|e| folder.fold_expr(e));
    field
}

pub fn walk_method<F: Folder>(folder: &mut F, mut method: MethodDecl) -> MethodDecl {
    method.body = method.body.map(|b| folder.fold_block(b));
    method
}

pub fn walk_initializer<F: Folder>(folder: &mut F, mut init: InitializerDecl) -> InitializerDecl {
    init.body = folder.fold_block(init.body);
    init
}

pub fn walk_block<F: Folder>(folder: &mut F, block: Block) -> Block {
    let Block { stmts, span } = block;
    Block {
        stmts: stmts.into_iter().flat_map(|s| folder.fold_stmt(s)).collect(),
        span,
    }
}

/// Fold a statement that must stay a single statement (a branch or loop body)
pub fn fold_single<F: Folder>(folder: &mut F, stmt: Stmt) -> Stmt {
    let span = stmt.span;
    Stmt::from_stmts(folder.fold_stmt(stmt), span)
}

fn fold_boxed<F: Folder>(folder: &mut F, stmt: Box<Stmt>) -> Box<Stmt> {
    Box::new(fold_single(folder, *stmt))
}

pub fn walk_stmt<F: Folder>(folder: &mut F, stmt: Stmt) -> Vec<Stmt> {
    let Stmt { kind, span } = stmt;
    let kind = match kind {
        StmtKind::Local { var, init } => StmtKind::Local {
            var,
            init: init.map(|e| folder.fold_expr(e)),
        },
        StmtKind::Expr(e) => StmtKind::Expr(folder.fold_expr(e)),
        StmtKind::Block(b) => StmtKind::Block(folder.fold_block(b)),
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => StmtKind::If {
            cond: folder.fold_expr(cond),
            then_branch: fold_boxed(folder, then_branch),
            else_branch: else_branch.map(|s| fold_boxed(folder, s)),
        },
        StmtKind::While { cond, body } => StmtKind::While {
            cond: folder.fold_expr(cond),
            body: fold_boxed(folder, body),
        },
        StmtKind::DoWhile { body, cond } => StmtKind::DoWhile {
            body: fold_boxed(folder, body),
            cond: folder.fold_expr(cond),
        },
        StmtKind::For {
            init,
            cond,
            update,
            body,
        } => StmtKind::For {
            init: init.into_iter().flat_map(|s| folder.fold_stmt(s)).collect(),
            cond: cond.map(|e| folder.fold_expr(e)),
            update: update.into_iter().map(|e| folder.fold_expr(e)).collect(),
            body: fold_boxed(folder, body),
        },
        StmtKind::Switch { selector, cases } => StmtKind::Switch {
            selector: folder.fold_expr(selector),
            cases: cases
                .into_iter()
                .map(|c| SwitchCase {
                    labels: fold_all(folder, c.labels),
                    body: c.body.into_iter().flat_map(|s| folder.fold_stmt(s)).collect(),
                    span: c.span,
                })
                .collect(),
        },
        StmtKind::ForEach {
            var,
            iterable,
            body,
        } => StmtKind::ForEach {
            var,
            iterable: folder.fold_expr(iterable),
            body: fold_boxed(folder, body),
        },
        StmtKind::Return(value) => StmtKind::Return(value.map(|e| folder.fold_expr(e))),
        StmtKind::Break(label) => StmtKind::Break(label),
        StmtKind::Continue(label) => StmtKind::Continue(label),
        StmtKind::Labeled { label, body } => StmtKind::Labeled {
            label,
            body: fold_boxed(folder, body),
        },
        StmtKind::Throw(e) => StmtKind::Throw(folder.fold_expr(e)),
        StmtKind::Try {
            body,
            catches,
            finally,
        } => StmtKind::Try {
            body: folder.fold_block(body),
            catches: catches
                .into_iter()
                .map(|c| CatchClause {
                    var: c.var,
                    body: folder.fold_block(c.body),
                    span: c.span,
                })
                .collect(),
            finally: finally.map(|b| folder.fold_block(b)),
        },
        StmtKind::Synchronized { lock, body } => StmtKind::Synchronized {
            lock: folder.fold_expr(lock),
            body: folder.fold_block(body),
        },
        StmtKind::LocalType(decl) => StmtKind::LocalType(Box::new(folder.fold_type_decl(*decl))),
        StmtKind::Empty => StmtKind::Empty,
    };
    vec![Stmt { kind, span }]
}

fn fold_box<F: Folder>(folder: &mut F, expr: Box<Expr>) -> Box<Expr> {
    Box::new(folder.fold_expr(*expr))
}

fn fold_all<F: Folder>(folder: &mut F, exprs: Vec<Expr>) -> Vec<Expr> {
    exprs.into_iter().map(|e| folder.fold_expr(e)).collect()
}

pub fn walk_expr<F: Folder>(folder: &mut F, expr: Expr) -> Expr {
    let Expr { kind, ty, span } = expr;
    let kind = match kind {
        ExprKind::Literal(_)
        | ExprKind::This
        | ExprKind::OuterThis(_)
        | ExprKind::Local(_)
        | ExprKind::DynamicLoad { .. } => kind,
        ExprKind::Field { target, field } => ExprKind::Field {
            target: target.map(|t| fold_box(folder, t)),
            field,
        },
        ExprKind::Call {
            target,
            method,
            args,
            is_super,
        } => ExprKind::Call {
            target: target.map(|t| fold_box(folder, t)),
            method,
            args: fold_all(folder, args),
            is_super,
        },
        ExprKind::New {
            class,
            ctor,
            args,
            outer,
            body,
        } => ExprKind::New {
            class,
            ctor,
            args: fold_all(folder, args),
            outer: outer.map(|o| fold_box(folder, o)),
            body: body.map(|b| Box::new(folder.fold_type_decl(*b))),
        },
        ExprKind::Lambda {
            class,
            method,
            params,
            body,
        } => ExprKind::Lambda {
            class,
            method,
            params,
            body: folder.fold_block(body),
        },
        ExprKind::MethodRef {
            class,
            method,
            receiver,
            target,
        } => ExprKind::MethodRef {
            class,
            method,
            receiver: receiver.map(|r| fold_box(folder, r)),
            target,
        },
        ExprKind::NewArray {
            element,
            dims,
            init,
        } => ExprKind::NewArray {
            element,
            dims: fold_all(folder, dims),
            init: init.map(|i| fold_all(folder, i)),
        },
        ExprKind::Index { array, index } => ExprKind::Index {
            array: fold_box(folder, array),
            index: fold_box(folder, index),
        },
        ExprKind::Length(inner) => ExprKind::Length(fold_box(folder, inner)),
        ExprKind::Unary { op, operand } => ExprKind::Unary {
            op,
            operand: fold_box(folder, operand),
        },
        ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
            op,
            lhs: fold_box(folder, lhs),
            rhs: fold_box(folder, rhs),
        },
        ExprKind::Assign { op, target, value } => ExprKind::Assign {
            op,
            target: fold_box(folder, target),
            value: fold_box(folder, value),
        },
        ExprKind::Step { op, prefix, target } => ExprKind::Step {
            op,
            prefix,
            target: fold_box(folder, target),
        },
        ExprKind::Conditional {
            cond,
            then_expr,
            else_expr,
        } => ExprKind::Conditional {
            cond: fold_box(folder, cond),
            then_expr: fold_box(folder, then_expr),
            else_expr: fold_box(folder, else_expr),
        },
        ExprKind::Cast { expr } => ExprKind::Cast {
            expr: fold_box(folder, expr),
        },
        ExprKind::InstanceOf { expr, class } => ExprKind::InstanceOf {
            expr: fold_box(folder, expr),
            class,
        },
        ExprKind::Box(inner) => ExprKind::Box(fold_box(folder, inner)),
        ExprKind::Unbox(inner) => ExprKind::Unbox(fold_box(folder, inner)),
        ExprKind::Intrinsic { func, args } => ExprKind::Intrinsic {
            func,
            args: fold_all(folder, args),
        },
        ExprKind::Reflective { description, args } => ExprKind::Reflective {
            description,
            args: fold_all(folder, args),
        },
    };
    Expr { kind, ty, span }
}
