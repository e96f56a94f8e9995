//! Declarations mentioned by code
//!
//! Collects the types and members a declaration depends on: every type that
//! appears as an expression type, a variable type, a signature type, an
//! instantiation or a type test, and every field, method and constructor it
//! uses. Nested type declarations are separate declarations and are not
//! descended into.

use std::collections::BTreeSet;

use crate::visit::{self, Visitor};
use crate::{
    BindingCache, BindingId, Block, Expr, ExprKind, FieldDecl, Intrinsic, MethodDecl, Stmt,
    StmtKind, TypeDecl, TypeRef,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct References {
    /// Batch types, with array and iterator element types stripped
    pub types: BTreeSet<BindingId>,
    /// Library types outside the batch, by qualified name
    pub external: BTreeSet<String>,
    /// Fields, methods and constructors used
    pub members: BTreeSet<BindingId>,
    /// Types created with `new` without a resolved constructor
    pub instantiated: BTreeSet<BindingId>,
}

impl References {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, ty: &TypeRef) {
        match ty {
            TypeRef::Declared(id) => {
                self.types.insert(*id);
            }
            TypeRef::External(name) => {
                self.external.insert(name.clone());
            }
            TypeRef::Array(element) | TypeRef::Iterator(element) => self.add_type(element),
            TypeRef::Void
            | TypeRef::Null
            | TypeRef::Primitive(_)
            | TypeRef::Boxed(_)
            | TypeRef::String
            | TypeRef::Object => {}
        }
    }

    pub fn extend(&mut self, other: References) {
        self.types.extend(other.types);
        self.external.extend(other.external);
        self.members.extend(other.members);
        self.instantiated.extend(other.instantiated);
    }

    /// Declared type and initializer of a field
    pub fn of_field(cache: &BindingCache, field: &FieldDecl) -> Self {
        let mut collector = ReferenceCollector::new(cache);
        collector.add_binding_type(field.binding);
        collector.visit_field(field);
        collector.refs
    }

    /// Signature types of a method, without its body
    pub fn of_signature(cache: &BindingCache, method: BindingId) -> Self {
        let mut refs = Self::new();
        if let Some(sig) = cache.get(method).and_then(|b| b.as_method().cloned()) {
            refs.add_type(&sig.ret);
            for param in &sig.params {
                refs.add_type(param);
            }
        }
        refs
    }

    /// Signature and body of a method
    pub fn of_method(cache: &BindingCache, method: &MethodDecl) -> Self {
        let mut refs = Self::of_signature(cache, method.binding);
        refs.extend(Self::of_body(cache, method.body.as_ref()));
        refs
    }

    pub fn of_body(cache: &BindingCache, body: Option<&Block>) -> Self {
        let mut collector = ReferenceCollector::new(cache);
        if let Some(body) = body {
            collector.visit_block(body);
        }
        collector.refs
    }

    pub fn of_expr(cache: &BindingCache, expr: &Expr) -> Self {
        let mut collector = ReferenceCollector::new(cache);
        collector.visit_expr(expr);
        collector.refs
    }
}

struct ReferenceCollector<'a> {
    cache: &'a BindingCache,
    refs: References,
}

impl<'a> ReferenceCollector<'a> {
    fn new(cache: &'a BindingCache) -> Self {
        Self {
            cache,
            refs: References::new(),
        }
    }

    fn add_binding_type(&mut self, id: BindingId) {
        if let Some(ty) = self.cache.get(id).and_then(|b| b.value_type().cloned()) {
            self.refs.add_type(&ty);
        }
    }
}

impl Visitor for ReferenceCollector<'_> {
    fn visit_type_decl(&mut self, _decl: &TypeDecl) {}

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Local { var, .. } | StmtKind::ForEach { var, .. } => {
                self.add_binding_type(*var)
            }
            StmtKind::Try { catches, .. } => {
                for catch in catches {
                    self.add_binding_type(catch.var);
                }
            }
            _ => {}
        }
        visit::walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        self.refs.add_type(&expr.ty);
        match &expr.kind {
            ExprKind::OuterThis(ty) => {
                self.refs.types.insert(*ty);
            }
            ExprKind::Field { field, .. } => {
                self.refs.members.insert(*field);
            }
            ExprKind::Call { method, .. } => {
                self.refs.members.insert(*method);
            }
            ExprKind::New { class, ctor, .. } => {
                self.refs.types.insert(*class);
                match ctor {
                    Some(ctor) => {
                        self.refs.members.insert(*ctor);
                    }
                    None => {
                        self.refs.instantiated.insert(*class);
                    }
                }
            }
            ExprKind::Lambda {
                class,
                method,
                params,
                ..
            } => {
                self.refs.types.insert(*class);
                self.refs.members.insert(*method);
                for param in params {
                    self.add_binding_type(*param);
                }
            }
            ExprKind::MethodRef {
                class,
                method,
                target,
                ..
            } => {
                self.refs.types.insert(*class);
                self.refs.members.insert(*method);
                self.refs.members.insert(*target);
            }
            ExprKind::NewArray { element, .. } => self.refs.add_type(element),
            ExprKind::InstanceOf { class, .. } => self.refs.add_type(class),
            ExprKind::Intrinsic { func, .. } => match func {
                Intrinsic::EnsureInitialized(ty) => {
                    self.refs.types.insert(*ty);
                }
                Intrinsic::ArrayCreate { element, .. } | Intrinsic::ArrayInit { element } => {
                    self.refs.add_type(element)
                }
                _ => {}
            },
            _ => {}
        }
        visit::walk_expr(self, expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{self, ProgramBuilder};

    #[test]
    fn test_method_references() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let shop = b.class("p", "Shop");
        let item = b.class("p", "Item");
        let error = b.class("p", "Failure");
        let price = b.field(item, "price", TypeRef::int());
        let make = b.constructor(item, vec![]);
        let total = b.method(
            shop,
            "total",
            vec![TypeRef::array_of(TypeRef::Declared(item))],
            TypeRef::External("java.math.BigDecimal".into()),
        );
        let it = b.local(total, "it", TypeRef::Declared(item));
        let caught = b.local(total, "e", TypeRef::Declared(error));

        let new_item = builder::new_object(item, Some(make), vec![]);
        let read = builder::field_of(
            Some(Expr::local(it, TypeRef::Declared(item))),
            price,
            TypeRef::int(),
        );
        let body = vec![
            builder::declare_local(it, Some(new_item)),
            Stmt::synthetic(StmtKind::Try {
                body: Block::new(vec![Stmt::expr(read)]),
                catches: vec![crate::CatchClause {
                    var: caught,
                    body: Block::new(vec![]),
                    span: crate::Span::dummy(),
                }],
                finally: None,
            }),
        ];
        let method = MethodDecl::new(total, vec![], Some(Block::new(body)));

        let refs = References::of_method(&cache, &method);
        assert!(refs.types.contains(&item));
        assert!(refs.types.contains(&error));
        assert!(!refs.types.contains(&shop));
        assert!(refs.members.contains(&price));
        assert!(refs.members.contains(&make));
        assert!(refs.instantiated.is_empty());
        assert!(refs.external.contains("java.math.BigDecimal"));
    }
}
