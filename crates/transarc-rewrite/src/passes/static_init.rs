//! Static and instance initialization normalization
//!
//! Static field initializers and static initializer blocks of a type are
//! merged, in declaration order, into one synthetic static method guarded by
//! an initialized flag. Literal initializers stay inline. Static methods and
//! constructors of such a type start by ensuring it is initialized, and every
//! access to another type's static field, read or write, goes through an
//! ensure-initialized access. A wrapped place stays assignable, so a store
//! or an update never runs ahead of the declaring type's initializer.
//!
//! Instance field initializers and instance initializer blocks move into
//! every constructor that does not delegate to a sibling, right after the
//! super call and the synthetic field assignments.

use log::debug;
use transarc_ast::builder::{self, ProgramBuilder};
use transarc_ast::fold::{self, Folder};
use transarc_ast::{
    BindingCache, BindingId, Block, CompilationUnit, Expr, ExprKind, FieldDecl, Intrinsic,
    Member, MethodDecl, NodeMeta, Stmt, StmtKind, SyntheticOrigin, TypeDecl, TypeRef,
    Visibility,
};

use crate::{Pass, PassContext};

/// Name of the synthetic static initializer method
pub const STATIC_INIT_NAME: &str = "staticInitialize";
/// Name of the flag field guarding it
pub const STATIC_INIT_FLAG_NAME: &str = "initialized$";

pub struct StaticInitNormalization;

impl Pass for StaticInitNormalization {
    fn name(&self) -> &'static str {
        "static-init-normalization"
    }

    fn run(&self, mut unit: CompilationUnit, ctx: &mut PassContext<'_>) -> CompilationUnit {
        let b = ctx.builder();
        unit.types = std::mem::take(&mut unit.types)
            .into_iter()
            .map(|decl| normalize_type(&b, decl))
            .collect();
        StaticReads {
            cache: ctx.cache,
            current: None,
        }
        .fold_unit(unit)
    }
}

fn normalize_type(b: &ProgramBuilder<'_>, decl: TypeDecl) -> TypeDecl {
    let cache = b.cache();
    let ty = decl.binding;
    let is_interface = cache.type_binding(ty).is_some_and(|t| t.is_interface());
    let TypeDecl {
        binding,
        members,
        meta,
        span,
    } = decl;

    let mut static_stmts = Vec::new();
    let mut instance_stmts = Vec::new();
    let mut kept = Vec::with_capacity(members.len());
    for member in members {
        match member {
            Member::Field(mut field) => {
                let is_static = cache.get(field.binding).is_some_and(|f| f.is_static);
                let moves = match &field.init {
                    Some(init) if is_static => !init.is_literal(),
                    Some(_) => !is_interface,
                    None => false,
                };
                if moves {
                    if let Some(init) = field.init.take() {
                        let target = builder::field_of(None, field.binding, b.type_of(field.binding));
                        let assignment = Stmt::new(
                            StmtKind::Expr(builder::assign(target, init)),
                            field.span,
                        );
                        if is_static {
                            static_stmts.push(assignment);
                        } else {
                            instance_stmts.push(assignment);
                        }
                    }
                }
                kept.push(Member::Field(field));
            }
            Member::Initializer(init) if init.is_static => static_stmts.extend(init.body.stmts),
            Member::Initializer(init) if !is_interface => instance_stmts.extend(init.body.stmts),
            other => kept.push(other),
        }
    }

    if !instance_stmts.is_empty() {
        kept = insert_instance_init(b, ty, kept, instance_stmts);
    }

    if !static_stmts.is_empty() {
        debug!(
            "{}: merging {} static initialization statement(s)",
            cache.qualified_of(ty),
            static_stmts.len()
        );
        let (flag, init_method) = static_initializer(b, ty, static_stmts);
        for member in kept.iter_mut() {
            if let Member::Method(method) = member {
                let needs_guard = cache
                    .get(method.binding)
                    .is_some_and(|m| m.is_static || m.is_constructor());
                if needs_guard {
                    if let Some(body) = &mut method.body {
                        body.stmts.insert(0, ensure_initialized_stmt(ty));
                    }
                }
            }
        }
        kept.insert(0, Member::Field(flag));
        kept.push(Member::Method(init_method));
    }

    TypeDecl {
        binding,
        members: kept,
        meta,
        span,
    }
}

fn ensure_initialized_stmt(ty: BindingId) -> Stmt {
    Stmt::expr(Expr::intrinsic(
        Intrinsic::EnsureInitialized(ty),
        Vec::new(),
        TypeRef::Void,
    ))
}

/// Flag field and the guarded initializer method
fn static_initializer(
    b: &ProgramBuilder<'_>,
    ty: BindingId,
    stmts: Vec<Stmt>,
) -> (FieldDecl, MethodDecl) {
    let flag = b.register(
        b.field_binding(ty, STATIC_INIT_FLAG_NAME, TypeRef::boolean())
            .with_visibility(Visibility::Private)
            .with_static(true)
            .synthetic(),
    );
    let mut flag_decl = FieldDecl::new(flag);
    flag_decl.init = Some(builder::boolean(false));
    flag_decl.meta = NodeMeta::synthetic(SyntheticOrigin::StaticInitFlag);

    let method = b.register(
        b.method_binding(ty, STATIC_INIT_NAME, Vec::new(), TypeRef::Void)
            .with_static(true)
            .synthetic(),
    );
    let read_flag = || builder::field_of(None, flag, TypeRef::boolean());
    let mut body = vec![
        Stmt::synthetic(StmtKind::If {
            cond: read_flag(),
            then_branch: Box::new(builder::ret(None)),
            else_branch: None,
        }),
        Stmt::expr(builder::assign(read_flag(), builder::boolean(true))),
    ];
    body.extend(stmts);
    let mut method_decl = MethodDecl::new(method, Vec::new(), Some(Block::new(body)));
    method_decl.meta = NodeMeta::synthetic(SyntheticOrigin::StaticInitializer);
    (flag_decl, method_decl)
}

fn insert_instance_init(
    b: &ProgramBuilder<'_>,
    ty: BindingId,
    members: Vec<Member>,
    init: Vec<Stmt>,
) -> Vec<Member> {
    let cache = b.cache();
    let is_ctor = |m: &MethodDecl| cache.get(m.binding).is_some_and(|b| b.is_constructor());

    if !members
        .iter()
        .any(|m| matches!(m, Member::Method(method) if is_ctor(method)))
    {
        let ctor = b.register(
            b.method_binding(ty, builder::CONSTRUCTOR_NAME, Vec::new(), TypeRef::Void)
                .synthetic(),
        );
        let mut decl = MethodDecl::new(ctor, Vec::new(), Some(Block::new(init)));
        decl.meta = NodeMeta::synthetic(SyntheticOrigin::DefaultConstructor);
        let mut members = members;
        members.push(Member::Method(decl));
        return members;
    }

    members
        .into_iter()
        .map(|member| match member {
            Member::Method(mut method) if is_ctor(&method) => {
                if let Some(body) = &mut method.body {
                    if let Some(at) = instance_init_point(cache, ty, &body.stmts) {
                        body.stmts.splice(at..at, init.iter().cloned());
                    }
                }
                Member::Method(method)
            }
            other => other,
        })
        .collect()
}

/// Where instance initialization goes in a constructor body; `None` when
/// the constructor delegates to a sibling that already runs it
fn instance_init_point(cache: &BindingCache, ty: BindingId, stmts: &[Stmt]) -> Option<usize> {
    let mut at = 0;
    let mut saw_super = false;
    for stmt in stmts {
        let StmtKind::Expr(expr) = &stmt.kind else {
            break;
        };
        match &expr.kind {
            ExprKind::Assign { target, .. } if is_synthetic_field(cache, target) => {}
            ExprKind::Call {
                target: None,
                is_super: true,
                method,
                ..
            } if !saw_super && is_constructor(cache, *method) => saw_super = true,
            ExprKind::Call {
                target: None,
                is_super: false,
                method,
                ..
            } if is_constructor(cache, *method)
                && cache.get(*method).and_then(|m| m.declaring) == Some(ty) =>
            {
                return None;
            }
            _ => break,
        }
        at += 1;
    }
    Some(at)
}

fn is_constructor(cache: &BindingCache, method: BindingId) -> bool {
    cache.get(method).is_some_and(|m| m.is_constructor())
}

fn is_synthetic_field(cache: &BindingCache, target: &Expr) -> bool {
    match &target.kind {
        ExprKind::Field { field, .. } => cache.get(*field).is_some_and(|f| f.synthetic),
        _ => false,
    }
}

/// Wraps accesses to other types' static fields
struct StaticReads<'a> {
    cache: &'a BindingCache,
    current: Option<BindingId>,
}

impl StaticReads<'_> {
    /// Declaring type of a static field owned by another type
    fn foreign_static(&self, field: BindingId) -> Option<BindingId> {
        let binding = self.cache.get(field)?;
        if !binding.is_static || binding.as_field().is_none() {
            return None;
        }
        let declaring = binding.declaring?;
        (Some(declaring) != self.current).then_some(declaring)
    }

    /// Fold an expression that is written to. The place itself is kept
    /// assignable; a foreign static place is wrapped as a whole
    fn fold_place(&mut self, place: Expr) -> Expr {
        let Expr { kind, ty, span } = place;
        match kind {
            ExprKind::Field { target, field } => {
                let place = Expr {
                    kind: ExprKind::Field {
                        target: target.map(|t| Box::new(self.fold_expr(*t))),
                        field,
                    },
                    ty,
                    span,
                };
                match self.foreign_static(field) {
                    Some(declaring) => ensure_initialized(declaring, place),
                    None => place,
                }
            }
            kind => self.fold_expr(Expr { kind, ty, span }),
        }
    }
}

fn ensure_initialized(declaring: BindingId, access: Expr) -> Expr {
    let ty = access.ty.clone();
    let span = access.span;
    Expr::new(
        ExprKind::Intrinsic {
            func: Intrinsic::EnsureInitialized(declaring),
            args: vec![access],
        },
        ty,
        span,
    )
}

impl Folder for StaticReads<'_> {
    fn fold_type_decl(&mut self, decl: TypeDecl) -> TypeDecl {
        let saved = self.current.replace(decl.binding);
        let decl = fold::walk_type_decl(self, decl);
        self.current = saved;
        decl
    }

    fn fold_expr(&mut self, expr: Expr) -> Expr {
        let Expr { kind, ty, span } = expr;
        match kind {
            ExprKind::Assign { op, target, value } => Expr {
                kind: ExprKind::Assign {
                    op,
                    target: Box::new(self.fold_place(*target)),
                    value: Box::new(self.fold_expr(*value)),
                },
                ty,
                span,
            },
            ExprKind::Step { op, prefix, target } => Expr {
                kind: ExprKind::Step {
                    op,
                    prefix,
                    target: Box::new(self.fold_place(*target)),
                },
                ty,
                span,
            },
            ExprKind::Intrinsic {
                func: func @ (Intrinsic::BoxedStep { .. } | Intrinsic::BoxedCompoundAssign { .. }),
                args,
            } => {
                let args = args
                    .into_iter()
                    .enumerate()
                    .map(|(i, arg)| if i == 0 { self.fold_place(arg) } else { self.fold_expr(arg) })
                    .collect();
                Expr {
                    kind: ExprKind::Intrinsic { func, args },
                    ty,
                    span,
                }
            }
            ExprKind::Field { target, field } => {
                let read = fold::walk_expr(
                    self,
                    Expr {
                        kind: ExprKind::Field { target, field },
                        ty,
                        span,
                    },
                );
                match self.foreign_static(field) {
                    Some(declaring) => ensure_initialized(declaring, read),
                    None => read,
                }
            }
            kind => fold::walk_expr(self, Expr { kind, ty, span }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transarc_ast::InitializerDecl;

    fn run(cache: &BindingCache, decls: Vec<TypeDecl>) -> CompilationUnit {
        let mut unit = CompilationUnit::new("p/C.src", "p");
        unit.types = decls;
        let mut ctx = PassContext::new(cache, "p/C.src");
        StaticInitNormalization.run(unit, &mut ctx)
    }

    #[test]
    fn test_static_initializers_merge_in_declaration_order() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let c = b.class("p", "C");
        let limit = b.static_field(c, "LIMIT", TypeRef::int());
        let table = b.static_field(c, "TABLE", TypeRef::array_of(TypeRef::int()));
        let compute = b.static_method(c, "compute", vec![], TypeRef::int());
        let new_table = Expr::synthetic(
            ExprKind::NewArray {
                element: TypeRef::int(),
                dims: vec![builder::int(4)],
                init: None,
            },
            TypeRef::array_of(TypeRef::int()),
        );
        let block = InitializerDecl {
            is_static: true,
            body: Block::new(vec![Stmt::expr(builder::call(None, compute, vec![], TypeRef::int()))]),
            span: Default::default(),
        };
        let decl = TypeDecl::new(c)
            .with_member(builder::field_member(limit, Some(builder::int(10))))
            .with_member(builder::field_member(table, Some(new_table)))
            .with_member(Member::Initializer(block))
            .with_member(builder::method_member(compute, vec![], vec![builder::ret(Some(builder::int(1)))]));
        let unit = run(&cache, vec![decl]);
        let decl = &unit.types[0];

        // literal stays inline, the array creation moves
        assert!(decl.field(limit).unwrap().init.is_some());
        assert!(decl.field(table).unwrap().init.is_none());
        assert!(!decl.members.iter().any(|m| matches!(m, Member::Initializer(_))));

        let init = decl
            .methods()
            .find(|m| m.meta.origin == Some(SyntheticOrigin::StaticInitializer))
            .unwrap();
        let stmts = &init.body.as_ref().unwrap().stmts;
        // guard, flag set, TABLE assignment, static block call
        assert_eq!(stmts.len(), 4);
        assert!(matches!(stmts[0].kind, StmtKind::If { .. }));
        assert!(matches!(&stmts[2].kind, StmtKind::Expr(e) if matches!(e.kind, ExprKind::Assign { .. })));

        let flag = decl
            .fields()
            .find(|f| f.meta.origin == Some(SyntheticOrigin::StaticInitFlag))
            .unwrap();
        assert_eq!(cache.name_of(flag.binding), STATIC_INIT_FLAG_NAME);

        let compute = decl.method(compute).unwrap();
        let first = &compute.body.as_ref().unwrap().stmts[0];
        assert!(matches!(
            &first.kind,
            StmtKind::Expr(e) if matches!(e.kind, ExprKind::Intrinsic { func: Intrinsic::EnsureInitialized(t), .. } if t == c)
        ));
    }

    fn is_ensure_of(expr: &Expr, ty: BindingId) -> bool {
        matches!(
            &expr.kind,
            ExprKind::Intrinsic { func: Intrinsic::EnsureInitialized(t), args }
                if *t == ty && matches!(args[0].kind, ExprKind::Field { .. })
        )
    }

    #[test]
    fn test_foreign_static_reads_and_writes_are_wrapped() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let config = b.class("p", "Config");
        let level = b.static_field(config, "level", TypeRef::int());
        let compute = b.static_method(config, "compute", vec![], TypeRef::int());
        let config_decl = TypeDecl::new(config)
            .with_member(builder::field_member(
                level,
                Some(builder::call(None, compute, vec![], TypeRef::int())),
            ))
            .with_member(builder::method_member(compute, vec![], vec![builder::ret(Some(builder::int(1)))]));

        let user = b.class("p", "User");
        let m = b.method(user, "m", vec![], TypeRef::int());
        let read = builder::field_of(None, level, TypeRef::int());
        let write = Stmt::expr(builder::assign(read.clone(), builder::int(2)));
        let bump = Stmt::expr(Expr::synthetic(
            ExprKind::Step {
                op: transarc_ast::StepOp::Increment,
                prefix: false,
                target: Box::new(read.clone()),
            },
            TypeRef::int(),
        ));
        let user_decl = TypeDecl::new(user).with_member(builder::method_member(
            m,
            vec![],
            vec![write, bump, builder::ret(Some(read))],
        ));
        let unit = run(&cache, vec![config_decl, user_decl]);
        let stmts = &unit.types[1].method(m).unwrap().body.as_ref().unwrap().stmts;

        // the store cannot be overwritten by a later first initialization
        let StmtKind::Expr(write) = &stmts[0].kind else {
            panic!("expected write");
        };
        let ExprKind::Assign { target, value, .. } = &write.kind else {
            panic!("expected assignment");
        };
        assert!(is_ensure_of(target, config));
        assert!(value.is_literal());

        let StmtKind::Expr(bump) = &stmts[1].kind else {
            panic!("expected step");
        };
        let ExprKind::Step { target, .. } = &bump.kind else {
            panic!("expected step");
        };
        assert!(is_ensure_of(target, config));

        let StmtKind::Return(Some(value)) = &stmts[2].kind else {
            panic!("expected return");
        };
        assert!(is_ensure_of(value, config));
    }

    #[test]
    fn test_own_static_writes_are_not_wrapped() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let c = b.class("p", "C");
        let count = b.static_field(c, "count", TypeRef::int());
        let m = b.method(c, "m", vec![], TypeRef::Void);
        let write = Stmt::expr(builder::assign(
            builder::field_of(None, count, TypeRef::int()),
            builder::int(3),
        ));
        let decl = TypeDecl::new(c).with_member(builder::method_member(m, vec![], vec![write]));
        let unit = run(&cache, vec![decl]);
        let stmts = &unit.types[0].method(m).unwrap().body.as_ref().unwrap().stmts;
        let StmtKind::Expr(write) = &stmts[0].kind else {
            panic!("expected write");
        };
        assert!(matches!(
            &write.kind,
            ExprKind::Assign { target, .. } if matches!(target.kind, ExprKind::Field { .. })
        ));
    }

    #[test]
    fn test_instance_initializers_follow_super_call() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let base = b.class("p", "Base");
        let base_ctor = b.constructor(base, vec![]);
        let c = b.subclass("p", "C", base);
        let items = b.field(c, "items", TypeRef::int());
        let primary = b.constructor(c, vec![]);
        let secondary = b.constructor(c, vec![TypeRef::int()]);
        let n = b.param(secondary, "n", TypeRef::int());

        let super_call = Stmt::expr(Expr::synthetic(
            ExprKind::Call {
                target: None,
                method: base_ctor,
                args: vec![],
                is_super: true,
            },
            TypeRef::Void,
        ));
        let delegate = Stmt::expr(builder::call(None, primary, vec![], TypeRef::Void));
        let decl = TypeDecl::new(c)
            .with_member(builder::field_member(items, Some(builder::int(5))))
            .with_member(builder::method_member(primary, vec![], vec![super_call]))
            .with_member(builder::method_member(secondary, vec![n], vec![delegate]));
        let unit = run(&cache, vec![decl]);
        let decl = &unit.types[0];

        let primary = decl.method(primary).unwrap().body.as_ref().unwrap();
        assert_eq!(primary.stmts.len(), 2);
        assert!(matches!(&primary.stmts[1].kind, StmtKind::Expr(e) if matches!(e.kind, ExprKind::Assign { .. })));

        let secondary = decl.method(secondary).unwrap().body.as_ref().unwrap();
        assert_eq!(secondary.stmts.len(), 1);
        assert!(decl.field(items).unwrap().init.is_none());
    }
}
