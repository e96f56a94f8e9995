//! Bindings: stable identities for declared entities
//!
//! A binding identifies a type, member or variable independently of how many
//! AST nodes mention it. Bindings are produced by the front end and are never
//! re-resolved by the rewrite passes; passes that synthesize new declarations
//! register new bindings in the shared [`BindingCache`](crate::BindingCache).

use serde::{Deserialize, Serialize};

use crate::TypeRef;

/// Unique identifier for a binding in the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BindingId(pub u32);

/// Declared visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Protected,
    Package,
    Private,
}

/// Category of a declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeCategory {
    Class,
    Interface,
    Enum,
    /// A type whose instances are laid out inline wherever they are stored
    Value,
}

/// Ownership annotations declared on a field in source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldAnnotation {
    /// Observer reference with no influence on the referent's lifetime
    Weak,
    /// Designated owning side of a mutual ownership pair
    RetainedWith,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeBinding {
    pub category: TypeCategory,
    pub package: String,
    pub superclass: Option<BindingId>,
    pub interfaces: Vec<BindingId>,
    /// Lexically enclosing type, for nested, local and anonymous types
    pub enclosing: Option<BindingId>,
    /// Enclosing method, for local and anonymous types
    pub enclosing_method: Option<BindingId>,
    pub is_anonymous: bool,
    pub is_abstract: bool,
}

impl TypeBinding {
    pub fn class(package: impl Into<String>) -> Self {
        Self {
            category: TypeCategory::Class,
            package: package.into(),
            superclass: None,
            interfaces: Vec::new(),
            enclosing: None,
            enclosing_method: None,
            is_anonymous: false,
            is_abstract: false,
        }
    }

    pub fn is_interface(&self) -> bool {
        self.category == TypeCategory::Interface
    }

    pub fn is_local(&self) -> bool {
        self.enclosing_method.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldBinding {
    pub ty: TypeRef,
    pub annotation: Option<FieldAnnotation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodBinding {
    pub params: Vec<TypeRef>,
    pub ret: TypeRef,
    pub is_constructor: bool,
    pub is_abstract: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalBinding {
    pub ty: TypeRef,
    pub is_parameter: bool,
    /// Declared as a weak (non-owning) local
    pub weak: bool,
}

/// Kind-specific payload of a binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BindingKind {
    Type(TypeBinding),
    Field(FieldBinding),
    Method(MethodBinding),
    Local(LocalBinding),
}

/// A declared entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    /// Assigned when the binding enters the cache
    pub id: BindingId,
    /// Simple source name
    pub name: String,
    /// Fully qualified origin, unique across the batch
    /// (e.g. `com.example.Outer.Inner`, `com.example.Foo#bar(int)`)
    pub qualified: String,
    pub visibility: Visibility,
    pub is_static: bool,
    /// Declaring type for members, declaring method for locals
    pub declaring: Option<BindingId>,
    /// Introduced by a rewrite pass rather than the front end
    pub synthetic: bool,
    pub kind: BindingKind,
}

impl Binding {
    pub fn new(name: impl Into<String>, qualified: impl Into<String>, kind: BindingKind) -> Self {
        Self {
            id: BindingId(0),
            name: name.into(),
            qualified: qualified.into(),
            visibility: Visibility::Public,
            is_static: false,
            declaring: None,
            synthetic: false,
            kind,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub fn with_declaring(mut self, declaring: BindingId) -> Self {
        self.declaring = Some(declaring);
        self
    }

    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }

    pub fn as_type(&self) -> Option<&TypeBinding> {
        match &self.kind {
            BindingKind::Type(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&FieldBinding> {
        match &self.kind {
            BindingKind::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&MethodBinding> {
        match &self.kind {
            BindingKind::Method(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_local(&self) -> Option<&LocalBinding> {
        match &self.kind {
            BindingKind::Local(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_type(&self) -> bool {
        self.as_type().is_some()
    }

    pub fn is_constructor(&self) -> bool {
        self.as_method().is_some_and(|m| m.is_constructor)
    }

    /// Declared type of a field or local; `None` for types and methods
    pub fn value_type(&self) -> Option<&TypeRef> {
        match &self.kind {
            BindingKind::Field(f) => Some(&f.ty),
            BindingKind::Local(l) => Some(&l.ty),
            _ => None,
        }
    }

    /// Instance type declared inside another type that therefore holds an
    /// implicit reference to an enclosing instance
    pub fn is_inner_type(&self) -> bool {
        match &self.kind {
            BindingKind::Type(t) => {
                t.enclosing.is_some() && !self.is_static && !t.is_interface()
            }
            _ => false,
        }
    }
}
