//! Declaration AST nodes

use serde::{Deserialize, Serialize};

use crate::{BindingId, Block, Expr, NodeMeta, Span};

/// One source file of the resolved program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationUnit {
    /// Source path, used to name outputs and report diagnostics
    pub path: String,
    pub package: String,
    /// File-scope dependencies declared in source
    pub imports: Vec<BindingId>,
    pub types: Vec<TypeDecl>,
}

impl CompilationUnit {
    pub fn new(path: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            package: package.into(),
            imports: Vec::new(),
            types: Vec::new(),
        }
    }

    pub fn with_type(mut self, decl: TypeDecl) -> Self {
        self.types.push(decl);
        self
    }

    /// Find a type declaration anywhere in the unit (including nested ones)
    pub fn find_type(&self, binding: BindingId) -> Option<&TypeDecl> {
        self.types.iter().find_map(|t| t.find_type(binding))
    }
}

/// A type declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub binding: BindingId,
    pub members: Vec<Member>,
    pub meta: NodeMeta,
    pub span: Span,
}

impl TypeDecl {
    pub fn new(binding: BindingId) -> Self {
        Self {
            binding,
            members: Vec::new(),
            meta: NodeMeta::new(),
            span: Span::dummy(),
        }
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn find_type(&self, binding: BindingId) -> Option<&TypeDecl> {
        if self.binding == binding {
            return Some(self);
        }
        self.members.iter().find_map(|m| match m {
            Member::Type(t) => t.find_type(binding),
            _ => None,
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Field(f) => Some(f),
            _ => None,
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Method(m) => Some(m),
            _ => None,
        })
    }

    pub fn field(&self, binding: BindingId) -> Option<&FieldDecl> {
        self.fields().find(|f| f.binding == binding)
    }

    pub fn method(&self, binding: BindingId) -> Option<&MethodDecl> {
        self.methods().find(|m| m.binding == binding)
    }

    pub fn destructor(&self) -> Option<&DestructorDecl> {
        self.members.iter().find_map(|m| match m {
            Member::Destructor(d) => Some(d),
            _ => None,
        })
    }
}

/// A member of a type declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Member {
    Field(FieldDecl),
    Method(MethodDecl),
    Initializer(InitializerDecl),
    /// Nested member type
    Type(TypeDecl),
    /// Synthesized teardown logic
    Destructor(DestructorDecl),
}

impl Member {
    /// Binding declared by the member; initializers and destructors have none
    pub fn binding(&self) -> Option<BindingId> {
        match self {
            Member::Field(f) => Some(f.binding),
            Member::Method(m) => Some(m.binding),
            Member::Type(t) => Some(t.binding),
            Member::Initializer(_) | Member::Destructor(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub binding: BindingId,
    pub init: Option<Expr>,
    pub meta: NodeMeta,
    pub span: Span,
}

impl FieldDecl {
    pub fn new(binding: BindingId) -> Self {
        Self {
            binding,
            init: None,
            meta: NodeMeta::new(),
            span: Span::dummy(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub binding: BindingId,
    pub params: Vec<BindingId>,
    /// `None` for abstract and interface methods
    pub body: Option<Block>,
    pub meta: NodeMeta,
    pub span: Span,
}

impl MethodDecl {
    pub fn new(binding: BindingId, params: Vec<BindingId>, body: Option<Block>) -> Self {
        Self {
            binding,
            params,
            body,
            meta: NodeMeta::new(),
            span: Span::dummy(),
        }
    }
}

/// Initializer block: `static { .. }` or `{ .. }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializerDecl {
    pub is_static: bool,
    pub body: Block,
    pub span: Span,
}

/// Synthesized release sequence for a type
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DestructorDecl {
    pub steps: Vec<TeardownStep>,
    /// Declared finalizer invoked before any field is torn down
    pub finalizer: Option<BindingId>,
}

impl DestructorDecl {
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty() && self.finalizer.is_none()
    }
}

/// One step of a synthesized teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeardownStep {
    /// Release an owned reference
    Release(BindingId),
    /// Clear a cycle-breaking reference without releasing through it
    Clear(BindingId),
}

impl TeardownStep {
    pub fn field(&self) -> BindingId {
        match self {
            TeardownStep::Release(f) | TeardownStep::Clear(f) => *f,
        }
    }
}
