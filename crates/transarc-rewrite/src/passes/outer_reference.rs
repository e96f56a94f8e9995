//! Outer-reference resolution
//!
//! Acts on the record left by type extraction. Each lifted type that needs
//! its enclosing instance gets a private `this$0` field; each captured local
//! gets a `val$<name>` field. Both are threaded through every constructor as
//! leading parameters and assigned before anything else runs. Inside the
//! lifted type, `Outer.this`, implicit enclosing member access and captured
//! local reads are rewritten to go through those fields; creation sites and
//! `super(..)` calls anywhere in the unit pass the extra arguments.

use std::collections::{HashMap, HashSet};

use log::debug;
use transarc_ast::builder::{self, ProgramBuilder, CONSTRUCTOR_NAME};
use transarc_ast::fold::{self, Folder};
use transarc_ast::{
    BindingCache, BindingId, Block, CompilationUnit, Expr, ExprKind, FieldDecl, Member,
    MethodDecl, NodeMeta, Stmt, StmtKind, SyntheticOrigin, TypeDecl, TypeRef, Visibility,
};

use crate::{Extraction, Pass, PassContext};

/// Name of the synthetic enclosing-instance field
pub const OUTER_FIELD_NAME: &str = "this$0";

pub struct OuterReferenceResolution;

impl Pass for OuterReferenceResolution {
    fn name(&self) -> &'static str {
        "outer-reference-resolution"
    }

    fn run(&self, mut unit: CompilationUnit, ctx: &mut PassContext<'_>) -> CompilationUnit {
        let b = ctx.builder();
        let mut plans = HashMap::new();
        for extraction in ctx.extractions() {
            if !extraction.needs_outer && extraction.captures.is_empty() {
                continue;
            }
            let Some(decl) = unit.types.iter().find(|t| t.binding == extraction.ty) else {
                continue;
            };
            plans.insert(extraction.ty, OuterPlan::build(&b, extraction, decl));
        }
        if plans.is_empty() {
            return unit;
        }

        let mut resolver = Resolver {
            cache: ctx.cache,
            plans,
            current: None,
        };
        unit.types = std::mem::take(&mut unit.types)
            .into_iter()
            .map(|decl| resolver.resolve_type(decl))
            .collect();
        unit
    }
}

#[derive(Debug, Clone)]
struct Capture {
    local: BindingId,
    field: BindingId,
    ty: TypeRef,
}

/// Replacement for one constructor (or the implicit default constructor)
#[derive(Debug, Clone)]
struct Remapped {
    binding: BindingId,
    /// Leading parameters: outer instance first, then captures
    leading: Vec<BindingId>,
}

#[derive(Debug, Clone)]
struct OuterPlan {
    enclosing: BindingId,
    outer_field: Option<BindingId>,
    captures: Vec<Capture>,
    /// Keyed by original constructor; `None` is the implicit default
    ctors: HashMap<Option<BindingId>, Remapped>,
    remapped: HashSet<BindingId>,
}

impl OuterPlan {
    fn build(b: &ProgramBuilder<'_>, extraction: &Extraction, decl: &TypeDecl) -> Self {
        let cache = b.cache();
        let ty = extraction.ty;
        let enclosing_ty = TypeRef::Declared(extraction.enclosing);

        let mut lead_types = Vec::new();
        let outer_field = extraction.needs_outer.then(|| {
            lead_types.push(("outer$".to_string(), enclosing_ty.clone()));
            b.register(
                b.field_binding(ty, OUTER_FIELD_NAME, enclosing_ty.clone())
                    .with_visibility(Visibility::Private)
                    .synthetic(),
            )
        });

        let captures: Vec<Capture> = extraction
            .captures
            .iter()
            .map(|local| {
                let name = cache.name_of(*local);
                let local_ty = b.type_of(*local);
                lead_types.push((format!("capture${}", name), local_ty.clone()));
                let field = b.register(
                    b.field_binding(ty, &format!("val${}", name), local_ty.clone())
                        .with_visibility(Visibility::Private)
                        .synthetic(),
                );
                Capture {
                    local: *local,
                    field,
                    ty: local_ty,
                }
            })
            .collect();

        let mut originals: Vec<Option<BindingId>> = decl
            .methods()
            .filter(|m| cache.get(m.binding).is_some_and(|b| b.is_constructor()))
            .map(|m| Some(m.binding))
            .collect();
        if originals.is_empty() {
            originals.push(None);
        }

        let mut ctors = HashMap::new();
        let mut remapped = HashSet::new();
        for original in originals {
            let remap = remap_constructor(b, ty, original, &lead_types);
            remapped.insert(remap.binding);
            ctors.insert(original, remap);
        }

        Self {
            enclosing: extraction.enclosing,
            outer_field,
            captures,
            ctors,
            remapped,
        }
    }

    fn remap_for(&self, ctor: Option<BindingId>) -> Option<&Remapped> {
        self.ctors.get(&ctor).or_else(|| self.ctors.get(&None))
    }

    /// Arguments a creation site passes ahead of the declared ones
    fn lead_args(&self, outer: Option<Expr>) -> Vec<Expr> {
        let mut lead = Vec::with_capacity(self.captures.len() + 1);
        if self.outer_field.is_some() {
            lead.push(outer.unwrap_or_else(|| {
                Expr::synthetic(
                    ExprKind::OuterThis(self.enclosing),
                    TypeRef::Declared(self.enclosing),
                )
            }));
        }
        lead.extend(
            self.captures
                .iter()
                .map(|c| Expr::local(c.local, c.ty.clone())),
        );
        lead
    }

    /// `this.f = param` for every synthetic field
    fn field_assignments(&self, ty: BindingId, remap: &Remapped) -> Vec<Stmt> {
        let fields = self
            .outer_field
            .map(|f| (f, TypeRef::Declared(self.enclosing)))
            .into_iter()
            .chain(self.captures.iter().map(|c| (c.field, c.ty.clone())));
        fields
            .zip(&remap.leading)
            .map(|((field, field_ty), param)| {
                Stmt::expr(builder::assign(
                    builder::field_of(Some(builder::this(ty)), field, field_ty.clone()),
                    Expr::local(*param, field_ty),
                ))
            })
            .collect()
    }

    fn field_decls(&self) -> Vec<Member> {
        let outer = self.outer_field.map(|f| {
            let mut decl = FieldDecl::new(f);
            decl.meta = NodeMeta::synthetic(SyntheticOrigin::OuterReference);
            decl
        });
        outer
            .into_iter()
            .chain(self.captures.iter().map(|c| {
                let mut decl = FieldDecl::new(c.field);
                decl.meta = NodeMeta::synthetic(SyntheticOrigin::CapturedValue(c.local));
                decl
            }))
            .map(Member::Field)
            .collect()
    }
}

fn remap_constructor(
    b: &ProgramBuilder<'_>,
    ty: BindingId,
    original: Option<BindingId>,
    lead_types: &[(String, TypeRef)],
) -> Remapped {
    let cache = b.cache();
    let original_binding = original.and_then(|c| cache.get(c));
    let declared = original_binding
        .as_ref()
        .and_then(|c| c.as_method().map(|m| m.params.clone()))
        .unwrap_or_default();
    let params: Vec<TypeRef> = lead_types
        .iter()
        .map(|(_, t)| t.clone())
        .chain(declared)
        .collect();

    let mut binding = b
        .method_binding(ty, CONSTRUCTOR_NAME, params, TypeRef::Void)
        .synthetic();
    // Keeps the new constructor distinct from a declared one with the same
    // parameter list
    binding.qualified.push_str("$outer");
    if let Some(original) = &original_binding {
        binding.visibility = original.visibility;
    }
    let id = b.register(binding);
    let leading = lead_types
        .iter()
        .map(|(name, t)| b.param(id, name, t.clone()))
        .collect();
    Remapped {
        binding: id,
        leading,
    }
}

struct Resolver<'a> {
    cache: &'a BindingCache,
    plans: HashMap<BindingId, OuterPlan>,
    current: Option<BindingId>,
}

impl Resolver<'_> {
    fn resolve_type(&mut self, decl: TypeDecl) -> TypeDecl {
        self.current = Some(decl.binding);
        let decl = match self.plans.get(&decl.binding).cloned() {
            Some(plan) => self.thread_constructors(decl, &plan),
            None => decl,
        };
        let decl = self.fold_type_decl(decl);
        self.current = None;
        decl
    }

    fn thread_constructors(&self, decl: TypeDecl, plan: &OuterPlan) -> TypeDecl {
        let ty = decl.binding;
        let TypeDecl {
            binding,
            members,
            meta,
            span,
        } = decl;

        let mut rewritten = plan.field_decls();
        let mut saw_ctor = false;
        for member in members {
            match member {
                Member::Method(method) if plan.ctors.contains_key(&Some(method.binding)) => {
                    saw_ctor = true;
                    rewritten.push(Member::Method(self.thread_constructor(ty, method, plan)));
                }
                other => rewritten.push(other),
            }
        }
        if !saw_ctor {
            if let Some(remap) = plan.ctors.get(&None) {
                rewritten.push(Member::Method(self.default_constructor(ty, remap, plan)));
            }
        }

        TypeDecl {
            binding,
            members: rewritten,
            meta,
            span,
        }
    }

    fn thread_constructor(&self, ty: BindingId, method: MethodDecl, plan: &OuterPlan) -> MethodDecl {
        let Some(remap) = plan.ctors.get(&Some(method.binding)) else {
            return method;
        };
        let MethodDecl {
            params,
            body,
            meta,
            span,
            ..
        } = method;
        let mut all_params = remap.leading.clone();
        all_params.extend(params);

        let mut stmts = body.map(|b| b.stmts).unwrap_or_default();
        let delegated = stmts.first_mut().is_some_and(|first| {
            self.forward_to_sibling(first, plan, remap)
        });
        if !delegated {
            let mut body = plan.field_assignments(ty, remap);
            body.append(&mut stmts);
            stmts = body;
        }

        MethodDecl {
            binding: remap.binding,
            params: all_params,
            body: Some(Block::new(stmts)),
            meta,
            span,
        }
    }

    /// Rewrite a leading `this(..)` so it forwards the synthetic parameters;
    /// the delegate assigns the fields
    fn forward_to_sibling(&self, stmt: &mut Stmt, plan: &OuterPlan, remap: &Remapped) -> bool {
        let StmtKind::Expr(Expr {
            kind:
                ExprKind::Call {
                    target: None,
                    method,
                    args,
                    is_super: false,
                },
            ..
        }) = &mut stmt.kind
        else {
            return false;
        };
        let Some(sibling) = plan.ctors.get(&Some(*method)) else {
            return false;
        };
        *method = sibling.binding;
        let params = self
            .cache
            .get(remap.binding)
            .and_then(|b| b.as_method().map(|m| m.params.clone()))
            .unwrap_or_default();
        let mut forwarded: Vec<Expr> = remap
            .leading
            .iter()
            .zip(params)
            .map(|(p, t)| Expr::local(*p, t))
            .collect();
        forwarded.append(args);
        *args = forwarded;
        true
    }

    fn default_constructor(&self, ty: BindingId, remap: &Remapped, plan: &OuterPlan) -> MethodDecl {
        let mut stmts = plan.field_assignments(ty, remap);
        let superclass = self.cache.type_binding(ty).and_then(|t| t.superclass);
        if let Some(sup_plan) = superclass.and_then(|s| self.plans.get(&s)) {
            if let Some(sup_remap) = sup_plan.remap_for(None) {
                stmts.push(Stmt::expr(Expr::synthetic(
                    ExprKind::Call {
                        target: None,
                        method: sup_remap.binding,
                        args: sup_plan.lead_args(None),
                        is_super: true,
                    },
                    TypeRef::Void,
                )));
            }
        }
        let mut decl = MethodDecl::new(remap.binding, remap.leading.clone(), Some(Block::new(stmts)));
        decl.meta = NodeMeta::synthetic(SyntheticOrigin::DefaultConstructor);
        decl
    }

    fn current_plan(&self) -> Option<&OuterPlan> {
        self.current.and_then(|c| self.plans.get(&c))
    }

    /// Path from `this` to the nearest enclosing instance accepted by
    /// `reaches`, following `this$0` links
    fn outer_path(&self, reaches: impl Fn(BindingId) -> bool) -> Option<Expr> {
        let mut ty = self.current?;
        let mut expr = builder::this(ty);
        loop {
            if reaches(ty) {
                return Some(expr);
            }
            let plan = self.plans.get(&ty)?;
            let field = plan.outer_field?;
            expr = builder::field_of(Some(expr), field, TypeRef::Declared(plan.enclosing));
            ty = plan.enclosing;
        }
    }

    /// Enclosing instance that an implicit instance-member access in a
    /// lifted type resolves against
    fn implicit_receiver(&self, member: BindingId) -> Option<Expr> {
        let current = self.current?;
        self.current_plan()?;
        let binding = self.cache.get(member)?;
        if binding.is_static || binding.is_constructor() {
            return None;
        }
        let declaring = binding.declaring?;
        if self.cache.is_subtype(current, declaring) {
            return None;
        }
        self.outer_path(|ty| self.cache.is_subtype(ty, declaring))
    }

    fn constructor_plan(&self, ctor: BindingId) -> Option<&OuterPlan> {
        let binding = self.cache.get(ctor)?;
        if !binding.is_constructor() {
            return None;
        }
        self.plans.get(&binding.declaring?)
    }
}

impl Folder for Resolver<'_> {
    fn fold_expr(&mut self, expr: Expr) -> Expr {
        let Expr { kind, ty, span } = expr;
        let kind = match kind {
            ExprKind::New {
                class,
                ctor,
                args,
                outer,
                body,
            } => {
                let plan = self
                    .plans
                    .get(&class)
                    .filter(|plan| !ctor.is_some_and(|c| plan.remapped.contains(&c)));
                match plan.and_then(|plan| Some((plan, plan.remap_for(ctor)?))) {
                    Some((plan, remap)) => {
                        let mut lead = plan.lead_args(outer.map(|o| *o));
                        lead.extend(args);
                        ExprKind::New {
                            class,
                            ctor: Some(remap.binding),
                            args: lead,
                            outer: None,
                            body,
                        }
                    }
                    None => ExprKind::New {
                        class,
                        ctor,
                        args,
                        outer,
                        body,
                    },
                }
            }
            ExprKind::Call {
                target: None,
                method,
                args,
                is_super: true,
            } => match self.constructor_plan(method) {
                Some(plan) if !plan.remapped.contains(&method) => {
                    let remapped = plan.remap_for(Some(method)).map(|r| r.binding);
                    let mut lead = plan.lead_args(None);
                    lead.extend(args);
                    ExprKind::Call {
                        target: None,
                        method: remapped.unwrap_or(method),
                        args: lead,
                        is_super: true,
                    }
                }
                _ => ExprKind::Call {
                    target: None,
                    method,
                    args,
                    is_super: true,
                },
            },
            ExprKind::Call {
                target: None,
                method,
                args,
                is_super: false,
            } => ExprKind::Call {
                target: self.implicit_receiver(method).map(Box::new),
                method,
                args,
                is_super: false,
            },
            ExprKind::Field {
                target: None,
                field,
            } => ExprKind::Field {
                target: self.implicit_receiver(field).map(Box::new),
                field,
            },
            ExprKind::OuterThis(target) => match self.outer_path(|t| t == target) {
                Some(path) => return path,
                None => {
                    debug!(
                        "no enclosing-instance path to {}",
                        self.cache.qualified_of(target)
                    );
                    ExprKind::OuterThis(target)
                }
            },
            ExprKind::Local(var) => {
                let captured = self.current.zip(self.current_plan()).and_then(|(current, plan)| {
                    plan.captures
                        .iter()
                        .find(|c| c.local == var)
                        .map(|c| (current, c.field))
                });
                match captured {
                    Some((current, field)) => {
                        return builder::field_of(Some(builder::this(current)), field, ty);
                    }
                    None => ExprKind::Local(var),
                }
            }
            other => other,
        };
        fold::walk_expr(self, Expr { kind, ty, span })
    }
}
