//! Anonymous, local and member type extraction
//!
//! Anonymous class bodies become named types with a synthesized constructor
//! forwarding to the super constructor. A lambda becomes a type of its own
//! implementing the functional interface with the lambda body as its single
//! method; `this` inside that body still means the enclosing instance. Every
//! nested type (member, local, anonymous or lambda) is lifted to the top
//! level of the unit, right after the top-level type it came from, in
//! discovery order. For each lifted type the pass records which locals it
//! captures and whether it needs a reference to its enclosing instance;
//! outer-reference resolution acts on that record.

use log::{debug, warn};
use transarc_ast::builder::CONSTRUCTOR_NAME;
use transarc_ast::fold::{self, Folder};
use transarc_ast::{
    BindingId, Block, CompilationUnit, Expr, ExprKind, Member, MethodDecl, Stmt, StmtKind,
    TypeDecl, TypeRef,
};

use crate::analysis::{captured_locals, uses_enclosing_instance};
use crate::{Extraction, Pass, PassContext};

pub struct InnerTypeExtraction;

impl Pass for InnerTypeExtraction {
    fn name(&self) -> &'static str {
        "inner-type-extraction"
    }

    fn run(&self, mut unit: CompilationUnit, ctx: &mut PassContext<'_>) -> CompilationUnit {
        let mut extractor = Extractor {
            ctx,
            lifted: Vec::new(),
        };
        let mut types = Vec::with_capacity(unit.types.len());
        for decl in std::mem::take(&mut unit.types) {
            let decl = extractor.fold_type_decl(decl);
            types.push(decl);
            types.extend(extractor.lifted.drain(..).flatten());
        }
        unit.types = types;
        unit
    }
}

struct Extractor<'c, 'a> {
    ctx: &'c mut PassContext<'a>,
    /// Lifted types of the current top-level type; slots are reserved on
    /// discovery so outer types precede the types nested in them
    lifted: Vec<Option<TypeDecl>>,
}

impl Extractor<'_, '_> {
    /// Whether instances of `ty` can have an enclosing instance at all
    fn can_have_outer(&self, ty: BindingId) -> bool {
        let cache = self.ctx.cache;
        let Some(binding) = cache.get(ty) else {
            return false;
        };
        if !binding.is_inner_type() {
            return false;
        }
        match binding.as_type().and_then(|t| t.enclosing_method) {
            Some(method) => cache.get(method).is_some_and(|m| !m.is_static),
            None => true,
        }
    }

    fn extract(&mut self, decl: TypeDecl) {
        let cache = self.ctx.cache;
        let ty = decl.binding;
        let Some(enclosing) = cache.type_binding(ty).and_then(|t| t.enclosing) else {
            // Not nested after all; keep it as a plain top-level type
            self.lifted.push(Some(decl));
            return;
        };

        let mut captures = captured_locals(&decl, cache);
        if let Some(sup) = cache.type_binding(ty).and_then(|t| t.superclass) {
            if let Some(parent) = self.ctx.extraction(sup) {
                for capture in &parent.captures {
                    if !captures.contains(capture) {
                        captures.push(*capture);
                    }
                }
            }
        }
        let needs_outer = self.can_have_outer(ty) && uses_enclosing_instance(&decl, cache);
        debug!(
            "extracting {} (outer: {}, captures: {})",
            cache.qualified_of(ty),
            needs_outer,
            captures.len()
        );
        self.ctx.record_extraction(Extraction {
            ty,
            enclosing,
            needs_outer,
            captures,
        });

        let slot = self.lifted.len();
        self.lifted.push(None);
        let folded = self.fold_type_decl(decl);
        self.lifted[slot] = Some(folded);
    }

    /// Constructor of an anonymous type forwarding its arguments to the
    /// super constructor
    fn anonymous_constructor(
        &mut self,
        anon: BindingId,
        super_ctor: Option<BindingId>,
        args: &[Expr],
    ) -> (BindingId, MethodDecl) {
        let cache = self.ctx.cache;
        let b = self.ctx.builder();
        let param_types: Vec<TypeRef> = super_ctor
            .and_then(|c| cache.get(c))
            .and_then(|c| c.as_method().map(|m| m.params.clone()))
            .unwrap_or_else(|| args.iter().map(|a| a.ty.clone()).collect());

        let ctor = b.register(
            b.method_binding(anon, CONSTRUCTOR_NAME, param_types.clone(), TypeRef::Void)
                .synthetic(),
        );
        let params: Vec<BindingId> = param_types
            .iter()
            .enumerate()
            .map(|(i, ty)| b.param(ctor, &format!("arg${}", i), ty.clone()))
            .collect();

        let mut stmts = Vec::new();
        if let Some(super_ctor) = super_ctor {
            let forwarded = params
                .iter()
                .zip(&param_types)
                .map(|(p, ty)| Expr::local(*p, ty.clone()))
                .collect();
            stmts.push(Stmt::expr(Expr::synthetic(
                ExprKind::Call {
                    target: None,
                    method: super_ctor,
                    args: forwarded,
                    is_super: true,
                },
                TypeRef::Void,
            )));
        }
        (ctor, MethodDecl::new(ctor, params, Some(Block::new(stmts))))
    }
}

impl Folder for Extractor<'_, '_> {
    fn fold_member(&mut self, member: Member) -> Vec<Member> {
        match member {
            Member::Type(nested) => {
                self.extract(nested);
                Vec::new()
            }
            other => fold::walk_member(self, other),
        }
    }

    fn fold_stmt(&mut self, stmt: Stmt) -> Vec<Stmt> {
        match stmt.kind {
            StmtKind::LocalType(decl) => {
                self.extract(*decl);
                Vec::new()
            }
            kind => fold::walk_stmt(
                self,
                Stmt {
                    kind,
                    span: stmt.span,
                },
            ),
        }
    }

    fn fold_expr(&mut self, expr: Expr) -> Expr {
        let Expr { kind, ty, span } = expr;
        match kind {
            ExprKind::New {
                class,
                ctor,
                args,
                outer,
                body: Some(body),
            } => {
                let args: Vec<Expr> = args.into_iter().map(|a| self.fold_expr(a)).collect();
                if outer.is_some() {
                    warn!(
                        "{}: dropping explicit enclosing instance of anonymous subclass of {}",
                        self.ctx.unit_path(),
                        self.ctx.cache.qualified_of(class)
                    );
                }
                let anon = body.binding;
                let (new_ctor, ctor_decl) = self.anonymous_constructor(anon, ctor, &args);
                let mut body = *body;
                body.members.insert(0, Member::Method(ctor_decl));
                self.extract(body);
                Expr {
                    kind: ExprKind::New {
                        class: anon,
                        ctor: Some(new_ctor),
                        args,
                        outer: None,
                        body: None,
                    },
                    ty,
                    span,
                }
            }
            ExprKind::Lambda {
                class,
                method,
                params,
                body,
            } => {
                let body = EnclosingThis.fold_block(body);
                let (ctor, ctor_decl) = self.anonymous_constructor(class, None, &[]);
                let mut decl = TypeDecl::new(class)
                    .with_member(Member::Method(ctor_decl))
                    .with_member(Member::Method(MethodDecl::new(method, params, Some(body))));
                decl.span = span;
                self.extract(decl);
                Expr {
                    kind: ExprKind::New {
                        class,
                        ctor: Some(ctor),
                        args: Vec::new(),
                        outer: None,
                        body: None,
                    },
                    ty,
                    span,
                }
            }
            kind => fold::walk_expr(self, Expr { kind, ty, span }),
        }
    }
}

/// Rewrites `this` in a lambda body to name the enclosing instance. Nested
/// lambdas share that instance; nested type bodies have their own `this`.
struct EnclosingThis;

impl Folder for EnclosingThis {
    fn fold_type_decl(&mut self, decl: TypeDecl) -> TypeDecl {
        decl
    }

    fn fold_expr(&mut self, expr: Expr) -> Expr {
        let enclosing = match expr.kind {
            ExprKind::This => expr.ty.as_declared(),
            _ => None,
        };
        match enclosing {
            Some(enclosing) => Expr {
                kind: ExprKind::OuterThis(enclosing),
                ..expr
            },
            None => fold::walk_expr(self, expr),
        }
    }
}
