//! Programmatic construction of resolved programs
//!
//! The front end normally hands over a finished bundle. `ProgramBuilder`
//! declares bindings directly into a [`BindingCache`] using the same
//! qualified-name conventions, which is what rewrite passes use to register
//! synthetic declarations and what tests use to build fixtures.
//!
//! Qualified names:
//! - types: `pkg.Outer.Inner`, local types `pkg.Outer#m()$Local`
//! - fields: `pkg.Type#name`
//! - methods: `pkg.Type#name(int,pkg.Other)`, constructors `pkg.Type#<init>(..)`
//! - locals: `<method>/name@n` where `n` is the declaration index in the method

use std::sync::Arc;

use crate::{
    BinaryOp, Binding, BindingCache, BindingId, BindingKind, Block, Expr, ExprKind,
    FieldAnnotation, FieldBinding, FieldDecl, Literal, LocalBinding, Member, MethodBinding,
    MethodDecl, PrimitiveType, Stmt, StmtKind, TypeBinding, TypeCategory, TypeRef, Visibility,
};

/// Name used for constructor bindings
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// Declares bindings into a shared cache
#[derive(Debug, Clone, Copy)]
pub struct ProgramBuilder<'a> {
    cache: &'a BindingCache,
}

impl<'a> ProgramBuilder<'a> {
    pub fn new(cache: &'a BindingCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &'a BindingCache {
        self.cache
    }

    pub fn register(&self, binding: Binding) -> BindingId {
        self.cache.intern(binding)
    }

    fn get(&self, id: BindingId) -> Option<Arc<Binding>> {
        self.cache.get(id)
    }

    // ===== Types =====

    pub fn declare_type(&self, package: &str, name: &str, ty: TypeBinding) -> BindingId {
        let qualified = if package.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", package, name)
        };
        self.register(Binding::new(name, qualified, BindingKind::Type(ty)))
    }

    pub fn class(&self, package: &str, name: &str) -> BindingId {
        self.declare_type(package, name, TypeBinding::class(package))
    }

    pub fn subclass(&self, package: &str, name: &str, superclass: BindingId) -> BindingId {
        let mut ty = TypeBinding::class(package);
        ty.superclass = Some(superclass);
        self.declare_type(package, name, ty)
    }

    pub fn implementing(&self, package: &str, name: &str, interfaces: &[BindingId]) -> BindingId {
        let mut ty = TypeBinding::class(package);
        ty.interfaces = interfaces.to_vec();
        self.declare_type(package, name, ty)
    }

    pub fn interface(&self, package: &str, name: &str) -> BindingId {
        let mut ty = TypeBinding::class(package);
        ty.category = TypeCategory::Interface;
        ty.is_abstract = true;
        self.declare_type(package, name, ty)
    }

    pub fn value_type(&self, package: &str, name: &str) -> BindingId {
        let mut ty = TypeBinding::class(package);
        ty.category = TypeCategory::Value;
        self.declare_type(package, name, ty)
    }

    /// Member type declared directly inside `outer`
    pub fn member_type(&self, outer: BindingId, name: &str, is_static: bool) -> BindingId {
        let package = self.package_of(outer);
        let mut ty = TypeBinding::class(package);
        ty.enclosing = Some(outer);
        self.register(
            Binding::new(
                name,
                format!("{}.{}", self.cache.qualified_of(outer), name),
                BindingKind::Type(ty),
            )
            .with_static(is_static)
            .with_declaring(outer),
        )
    }

    /// Local type declared inside the body of `method`
    pub fn local_type(&self, method: BindingId, name: &str) -> BindingId {
        let owner = self.cache.declaring_type_of(method);
        let package = owner.map(|o| self.package_of(o)).unwrap_or_default();
        let mut ty = TypeBinding::class(package);
        ty.enclosing = owner;
        ty.enclosing_method = Some(method);
        self.register(
            Binding::new(
                name,
                format!("{}${}", self.cache.qualified_of(method), name),
                BindingKind::Type(ty),
            )
            .with_visibility(Visibility::Private)
            .with_declaring(method),
        )
    }

    /// Anonymous type created inside `method`, numbered in source order
    pub fn anonymous_type(&self, method: BindingId, supertype: BindingId, index: usize) -> BindingId {
        self.nested_in_method(method, supertype, format!("${}", index))
    }

    /// Type a lambda or method reference in `method` is turned into
    pub fn lambda_type(&self, method: BindingId, interface: BindingId, index: usize) -> BindingId {
        self.nested_in_method(method, interface, format!("$Lambda${}", index))
    }

    fn nested_in_method(&self, method: BindingId, supertype: BindingId, name: String) -> BindingId {
        let owner = self.cache.declaring_type_of(method);
        let package = owner.map(|o| self.package_of(o)).unwrap_or_default();
        let mut ty = TypeBinding::class(package);
        if self.cache.type_binding(supertype).is_some_and(|t| t.is_interface()) {
            ty.interfaces.push(supertype);
        } else {
            ty.superclass = Some(supertype);
        }
        ty.enclosing = owner;
        ty.enclosing_method = Some(method);
        ty.is_anonymous = true;
        self.register(
            Binding::new(
                name.clone(),
                format!("{}{}", self.cache.qualified_of(method), name),
                BindingKind::Type(ty),
            )
            .with_visibility(Visibility::Private)
            .with_declaring(method),
        )
    }

    fn package_of(&self, ty: BindingId) -> String {
        self.cache
            .type_binding(ty)
            .map(|t| t.package)
            .unwrap_or_default()
    }

    // ===== Members =====

    pub fn field_binding(&self, owner: BindingId, name: &str, ty: TypeRef) -> Binding {
        Binding::new(
            name,
            format!("{}#{}", self.cache.qualified_of(owner), name),
            BindingKind::Field(FieldBinding {
                ty,
                annotation: None,
            }),
        )
        .with_declaring(owner)
    }

    pub fn field(&self, owner: BindingId, name: &str, ty: TypeRef) -> BindingId {
        self.register(self.field_binding(owner, name, ty))
    }

    pub fn private_field(&self, owner: BindingId, name: &str, ty: TypeRef) -> BindingId {
        self.register(
            self.field_binding(owner, name, ty)
                .with_visibility(Visibility::Private),
        )
    }

    pub fn static_field(&self, owner: BindingId, name: &str, ty: TypeRef) -> BindingId {
        self.register(self.field_binding(owner, name, ty).with_static(true))
    }

    pub fn annotated_field(
        &self,
        owner: BindingId,
        name: &str,
        ty: TypeRef,
        annotation: FieldAnnotation,
    ) -> BindingId {
        let mut binding = self.field_binding(owner, name, ty);
        if let BindingKind::Field(f) = &mut binding.kind {
            f.annotation = Some(annotation);
        }
        self.register(binding)
    }

    /// Qualified signature fragment for a parameter list
    pub fn signature(&self, params: &[TypeRef]) -> String {
        params
            .iter()
            .map(|p| describe_type(self.cache, p))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn method_binding(
        &self,
        owner: BindingId,
        name: &str,
        params: Vec<TypeRef>,
        ret: TypeRef,
    ) -> Binding {
        let qualified = format!(
            "{}#{}({})",
            self.cache.qualified_of(owner),
            name,
            self.signature(&params)
        );
        let is_constructor = name == CONSTRUCTOR_NAME;
        Binding::new(
            name,
            qualified,
            BindingKind::Method(MethodBinding {
                params,
                ret,
                is_constructor,
                is_abstract: false,
            }),
        )
        .with_declaring(owner)
    }

    pub fn method(
        &self,
        owner: BindingId,
        name: &str,
        params: Vec<TypeRef>,
        ret: TypeRef,
    ) -> BindingId {
        self.register(self.method_binding(owner, name, params, ret))
    }

    pub fn static_method(
        &self,
        owner: BindingId,
        name: &str,
        params: Vec<TypeRef>,
        ret: TypeRef,
    ) -> BindingId {
        self.register(self.method_binding(owner, name, params, ret).with_static(true))
    }

    pub fn constructor(&self, owner: BindingId, params: Vec<TypeRef>) -> BindingId {
        self.method(owner, CONSTRUCTOR_NAME, params, TypeRef::Void)
    }

    // ===== Variables =====

    fn variable(&self, method: BindingId, name: &str, ty: TypeRef, is_parameter: bool) -> Binding {
        let index = self.cache.members_of(method).len();
        Binding::new(
            name,
            format!("{}/{}@{}", self.cache.qualified_of(method), name, index),
            BindingKind::Local(LocalBinding {
                ty,
                is_parameter,
                weak: false,
            }),
        )
        .with_visibility(Visibility::Private)
        .with_declaring(method)
    }

    pub fn local(&self, method: BindingId, name: &str, ty: TypeRef) -> BindingId {
        self.register(self.variable(method, name, ty, false))
    }

    pub fn weak_local(&self, method: BindingId, name: &str, ty: TypeRef) -> BindingId {
        let mut binding = self.variable(method, name, ty, false);
        if let BindingKind::Local(l) = &mut binding.kind {
            l.weak = true;
        }
        self.register(binding)
    }

    pub fn param(&self, method: BindingId, name: &str, ty: TypeRef) -> BindingId {
        self.register(self.variable(method, name, ty, true))
    }

    /// Synthetic temporary local; the name is unique within the method
    pub fn temp(&self, method: BindingId, prefix: &str, ty: TypeRef) -> BindingId {
        let index = self.cache.members_of(method).len();
        let name = format!("{}${}", prefix, index);
        self.register(self.variable(method, &name, ty, false).synthetic())
    }

    // ===== Lookups =====

    /// Declared type of a field or variable binding
    pub fn type_of(&self, id: BindingId) -> TypeRef {
        self.get(id)
            .and_then(|b| b.value_type().cloned())
            .unwrap_or(TypeRef::Object)
    }

    /// Return type of a method binding
    pub fn return_type(&self, method: BindingId) -> TypeRef {
        self.get(method)
            .and_then(|b| b.as_method().map(|m| m.ret.clone()))
            .unwrap_or(TypeRef::Void)
    }
}

/// Source-level description of a type, used in qualified method names
pub fn describe_type(cache: &BindingCache, ty: &TypeRef) -> String {
    match ty {
        TypeRef::Void => "void".into(),
        TypeRef::Null => "null".into(),
        TypeRef::Primitive(p) => p.name().into(),
        TypeRef::Boxed(p) => p.boxed_name().into(),
        TypeRef::String => "String".into(),
        TypeRef::Object => "Object".into(),
        TypeRef::Iterator(element) => format!("Iterator<{}>", describe_type(cache, element)),
        TypeRef::Declared(id) => cache.qualified_of(*id),
        TypeRef::External(name) => name.clone(),
        TypeRef::Array(element) => format!("{}[]", describe_type(cache, element)),
    }
}

// ===== Expression helpers =====

pub fn int(value: i64) -> Expr {
    Expr::literal(Literal::Int(value), TypeRef::int())
}

pub fn long(value: i64) -> Expr {
    Expr::literal(Literal::Int(value), TypeRef::Primitive(PrimitiveType::Long))
}

pub fn boolean(value: bool) -> Expr {
    Expr::literal(Literal::Bool(value), TypeRef::boolean())
}

pub fn string(value: &str) -> Expr {
    Expr::literal(Literal::Str(value.to_string()), TypeRef::String)
}

pub fn null() -> Expr {
    Expr::literal(Literal::Null, TypeRef::Null)
}

pub fn this(ty: BindingId) -> Expr {
    Expr::synthetic(ExprKind::This, TypeRef::Declared(ty))
}

pub fn field_of(target: Option<Expr>, field: BindingId, ty: TypeRef) -> Expr {
    Expr::synthetic(
        ExprKind::Field {
            target: target.map(Box::new),
            field,
        },
        ty,
    )
}

pub fn call(target: Option<Expr>, method: BindingId, args: Vec<Expr>, ret: TypeRef) -> Expr {
    Expr::synthetic(
        ExprKind::Call {
            target: target.map(Box::new),
            method,
            args,
            is_super: false,
        },
        ret,
    )
}

pub fn new_object(class: BindingId, ctor: Option<BindingId>, args: Vec<Expr>) -> Expr {
    Expr::synthetic(
        ExprKind::New {
            class,
            ctor,
            args,
            outer: None,
            body: None,
        },
        TypeRef::Declared(class),
    )
}

pub fn assign(target: Expr, value: Expr) -> Expr {
    let ty = target.ty.clone();
    Expr::synthetic(
        ExprKind::Assign {
            op: None,
            target: Box::new(target),
            value: Box::new(value),
        },
        ty,
    )
}

pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, ty: TypeRef) -> Expr {
    Expr::synthetic(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        ty,
    )
}

// ===== Declaration helpers =====

pub fn declare_local(var: BindingId, init: Option<Expr>) -> Stmt {
    Stmt::synthetic(StmtKind::Local { var, init })
}

pub fn ret(value: Option<Expr>) -> Stmt {
    Stmt::synthetic(StmtKind::Return(value))
}

pub fn field_member(field: BindingId, init: Option<Expr>) -> Member {
    let mut decl = FieldDecl::new(field);
    decl.init = init;
    Member::Field(decl)
}

pub fn method_member(method: BindingId, params: Vec<BindingId>, stmts: Vec<Stmt>) -> Member {
    Member::Method(MethodDecl::new(method, params, Some(Block::new(stmts))))
}
