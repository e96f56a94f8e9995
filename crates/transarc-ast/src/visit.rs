//! Read-only traversal
//!
//! Analyses (capture analysis, reference collection, dead-code closure,
//! import discovery) implement [`Visitor`]. Each `visit_*` method defaults to
//! the matching `walk_*` function, so overriding a hook and calling the walk
//! function keeps descending.

use crate::{
    Block, CompilationUnit, Expr, ExprKind, FieldDecl, InitializerDecl, Member, MethodDecl, Stmt,
    StmtKind, TypeDecl,
};

pub trait Visitor: Sized {
    fn visit_unit(&mut self, unit: &CompilationUnit) {
        walk_unit(self, unit);
    }

    fn visit_type_decl(&mut self, decl: &TypeDecl) {
        walk_type_decl(self, decl);
    }

    fn visit_member(&mut self, member: &Member) {
        walk_member(self, member);
    }

    fn visit_field(&mut self, field: &FieldDecl) {
        walk_field(self, field);
    }

    fn visit_method(&mut self, method: &MethodDecl) {
        walk_method(self, method);
    }

    fn visit_initializer(&mut self, init: &InitializerDecl) {
        walk_block(self, &init.body);
    }

    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block);
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

pub fn walk_unit<V: Visitor>(visitor: &mut V, unit: &CompilationUnit) {
    for decl in &unit.types {
        visitor.visit_type_decl(decl);
    }
}

pub fn walk_type_decl<V: Visitor>(visitor: &mut V, decl: &TypeDecl) {
    for member in &decl.members {
        visitor.visit_member(member);
    }
}

pub fn walk_member<V: Visitor>(visitor: &mut V, member: &Member) {
    match member {
        Member::Field(f) => visitor.visit_field(f),
        Member::Method(m) => visitor.visit_method(m),
        Member::Initializer(i) => visitor.visit_initializer(i),
        Member::Type(t) => visitor.visit_type_decl(t),
        Member::Destructor(_) => {}
    }
}

pub fn walk_field<V: Visitor>(visitor: &mut V, field: &FieldDecl) {
    if let Some(init) = &field.init {
        visitor.visit_expr(init);
    }
}

pub fn walk_method<V: Visitor>(visitor: &mut V, method: &MethodDecl) {
    if let Some(body) = &method.body {
        visitor.visit_block(body);
    }
}

pub fn walk_block<V: Visitor>(visitor: &mut V, block: &Block) {
    for stmt in &block.stmts {
        visitor.visit_stmt(stmt);
    }
}

pub fn walk_stmt<V: Visitor>(visitor: &mut V, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::Local { init, .. } => {
            if let Some(init) = init {
                visitor.visit_expr(init);
            }
        }
        StmtKind::Expr(e) | StmtKind::Throw(e) => visitor.visit_expr(e),
        StmtKind::Block(b) => visitor.visit_block(b),
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            visitor.visit_expr(cond);
            visitor.visit_stmt(then_branch);
            if let Some(else_branch) = else_branch {
                visitor.visit_stmt(else_branch);
            }
        }
        StmtKind::While { cond, body } => {
            visitor.visit_expr(cond);
            visitor.visit_stmt(body);
        }
        StmtKind::DoWhile { body, cond } => {
            visitor.visit_stmt(body);
            visitor.visit_expr(cond);
        }
        StmtKind::For {
            init,
            cond,
            update,
            body,
        } => {
            for s in init {
                visitor.visit_stmt(s);
            }
            if let Some(cond) = cond {
                visitor.visit_expr(cond);
            }
            for e in update {
                visitor.visit_expr(e);
            }
            visitor.visit_stmt(body);
        }
        StmtKind::Switch { selector, cases } => {
            visitor.visit_expr(selector);
            for case in cases {
                for label in &case.labels {
                    visitor.visit_expr(label);
                }
                for s in &case.body {
                    visitor.visit_stmt(s);
                }
            }
        }
        StmtKind::ForEach { iterable, body, .. } => {
            visitor.visit_expr(iterable);
            visitor.visit_stmt(body);
        }
        StmtKind::Return(value) => {
            if let Some(value) = value {
                visitor.visit_expr(value);
            }
        }
        StmtKind::Labeled { body, .. } => visitor.visit_stmt(body),
        StmtKind::Try {
            body,
            catches,
            finally,
        } => {
            visitor.visit_block(body);
            for catch in catches {
                visitor.visit_block(&catch.body);
            }
            if let Some(finally) = finally {
                visitor.visit_block(finally);
            }
        }
        StmtKind::Synchronized { lock, body } => {
            visitor.visit_expr(lock);
            visitor.visit_block(body);
        }
        StmtKind::LocalType(decl) => visitor.visit_type_decl(decl),
        StmtKind::Break(_) | StmtKind::Continue(_) | StmtKind::Empty => {}
    }
}

pub fn walk_expr<V: Visitor>(visitor: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Literal(_)
        | ExprKind::This
        | ExprKind::OuterThis(_)
        | ExprKind::Local(_)
        | ExprKind::DynamicLoad { .. } => {}
        ExprKind::Field { target, .. } => {
            if let Some(target) = target {
                visitor.visit_expr(target);
            }
        }
        ExprKind::Call { target, args, .. } => {
            if let Some(target) = target {
                visitor.visit_expr(target);
            }
            for arg in args {
                visitor.visit_expr(arg);
            }
        }
        ExprKind::New {
            args, outer, body, ..
        } => {
            if let Some(outer) = outer {
                visitor.visit_expr(outer);
            }
            for arg in args {
                visitor.visit_expr(arg);
            }
            if let Some(body) = body {
                visitor.visit_type_decl(body);
            }
        }
        ExprKind::Lambda { body, .. } => visitor.visit_block(body),
        ExprKind::MethodRef { receiver, .. } => {
            if let Some(receiver) = receiver {
                visitor.visit_expr(receiver);
            }
        }
        ExprKind::NewArray { dims, init, .. } => {
            for dim in dims {
                visitor.visit_expr(dim);
            }
            for e in init.iter().flatten() {
                visitor.visit_expr(e);
            }
        }
        ExprKind::Index { array, index } => {
            visitor.visit_expr(array);
            visitor.visit_expr(index);
        }
        ExprKind::Length(inner)
        | ExprKind::Unary { operand: inner, .. }
        | ExprKind::Cast { expr: inner }
        | ExprKind::InstanceOf { expr: inner, .. }
        | ExprKind::Box(inner)
        | ExprKind::Unbox(inner) => visitor.visit_expr(inner),
        ExprKind::Binary { lhs, rhs, .. } => {
            visitor.visit_expr(lhs);
            visitor.visit_expr(rhs);
        }
        ExprKind::Assign { target, value, .. } => {
            visitor.visit_expr(target);
            visitor.visit_expr(value);
        }
        ExprKind::Step { target, .. } => visitor.visit_expr(target),
        ExprKind::Conditional {
            cond,
            then_expr,
            else_expr,
        } => {
            visitor.visit_expr(cond);
            visitor.visit_expr(then_expr);
            visitor.visit_expr(else_expr);
        }
        ExprKind::Intrinsic { args, .. } | ExprKind::Reflective { args, .. } => {
            for arg in args {
                visitor.visit_expr(arg);
            }
        }
    }
}
