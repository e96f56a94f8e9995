//! Free-variable and enclosing-instance analysis for nested types
//!
//! Both analyses look at a nested type before its own nested types are
//! lifted out, so a use buried in a deeper type counts for every type on the
//! way out. A local declared outside the analysed type but read inside it is
//! captured; an implicit access to an instance member of an enclosing type
//! means the type needs a reference to that enclosing instance.

use std::collections::HashSet;

use transarc_ast::visit::{self, Visitor};
use transarc_ast::{
    BindingCache, BindingId, Expr, ExprKind, MethodDecl, Stmt, StmtKind, TypeDecl,
};

/// Locals read inside `decl` but declared outside it, in first-use order
pub fn captured_locals(decl: &TypeDecl, cache: &BindingCache) -> Vec<BindingId> {
    let mut scan = LocalScan::default();
    scan.visit_type_decl(decl);
    scan.referenced
        .into_iter()
        .filter(|id| !scan.declared.contains(id))
        .filter(|id| cache.get(*id).is_some_and(|b| b.as_local().is_some()))
        .collect()
}

#[derive(Default)]
struct LocalScan {
    declared: HashSet<BindingId>,
    referenced: Vec<BindingId>,
    seen: HashSet<BindingId>,
}

impl Visitor for LocalScan {
    fn visit_method(&mut self, method: &MethodDecl) {
        self.declared.extend(method.params.iter().copied());
        visit::walk_method(self, method);
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Local { var, .. } | StmtKind::ForEach { var, .. } => {
                self.declared.insert(*var);
            }
            StmtKind::Try { catches, .. } => {
                self.declared.extend(catches.iter().map(|c| c.var));
            }
            _ => {}
        }
        visit::walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Local(id) => {
                if self.seen.insert(*id) {
                    self.referenced.push(*id);
                }
            }
            ExprKind::Lambda { params, .. } => self.declared.extend(params.iter().copied()),
            _ => {}
        }
        visit::walk_expr(self, expr);
    }
}

/// Lexically enclosing types of `ty`, innermost first
pub fn enclosing_chain(ty: BindingId, cache: &BindingCache) -> Vec<BindingId> {
    let mut chain = Vec::new();
    let mut current = cache.type_binding(ty).and_then(|t| t.enclosing);
    while let Some(enclosing) = current {
        chain.push(enclosing);
        current = cache.type_binding(enclosing).and_then(|t| t.enclosing);
    }
    chain
}

/// Whether code inside `decl` uses an instance of one of its enclosing types
pub fn uses_enclosing_instance(decl: &TypeDecl, cache: &BindingCache) -> bool {
    let chain = enclosing_chain(decl.binding, cache);
    if chain.is_empty() {
        return false;
    }
    let mut scan = OuterScan {
        cache,
        this_type: decl.binding,
        chain: &chain,
        found: false,
    };

    // A superclass that is itself an inner type of an enclosing type needs
    // that instance when the super constructor runs
    if let Some(sup) = cache.type_binding(decl.binding).and_then(|t| t.superclass) {
        if scan.needs_instance_for_inner(sup) {
            return true;
        }
    }

    scan.visit_type_decl(decl);
    scan.found
}

struct OuterScan<'a> {
    cache: &'a BindingCache,
    this_type: BindingId,
    chain: &'a [BindingId],
    found: bool,
}

impl OuterScan<'_> {
    /// Whether a member declared in `declaring` resolves to an enclosing
    /// instance rather than to `this`
    fn is_enclosing_member(&self, declaring: BindingId) -> bool {
        !self.cache.is_subtype(self.this_type, declaring)
            && self
                .chain
                .iter()
                .any(|e| self.cache.is_subtype(*e, declaring))
    }

    fn needs_instance_for_inner(&self, class: BindingId) -> bool {
        let Some(binding) = self.cache.get(class) else {
            return false;
        };
        if !binding.is_inner_type() {
            return false;
        }
        match binding.as_type().and_then(|t| t.enclosing) {
            Some(enclosing) => self.is_enclosing_member(enclosing),
            None => false,
        }
    }

    fn instance_member(&self, member: BindingId) -> Option<BindingId> {
        let binding = self.cache.get(member)?;
        if binding.is_static || binding.is_constructor() {
            return None;
        }
        binding.declaring
    }
}

impl Visitor for OuterScan<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        if self.found {
            return;
        }
        match &expr.kind {
            ExprKind::OuterThis(ty) => {
                if *ty != self.this_type && self.chain.contains(ty) {
                    self.found = true;
                }
            }
            ExprKind::Field {
                target: None,
                field,
            } => {
                if let Some(declaring) = self.instance_member(*field) {
                    self.found |= self.is_enclosing_member(declaring);
                }
            }
            ExprKind::Call {
                target: None,
                method,
                is_super: false,
                ..
            } => {
                if let Some(declaring) = self.instance_member(*method) {
                    self.found |= self.is_enclosing_member(declaring);
                }
            }
            ExprKind::New {
                class, outer: None, ..
            } => {
                self.found |= self.needs_instance_for_inner(*class);
            }
            _ => {}
        }
        visit::walk_expr(self, expr);
    }
}
