//! Resolved type references
//!
//! Every expression in the resolved program carries a `TypeRef`. Types
//! declared inside the batch are referenced by binding; library types the
//! translator knows about (strings, the root object, boxed primitives and the
//! iteration protocol) have dedicated variants so passes can recognise them
//! without a lookup.

use serde::{Deserialize, Serialize};

use crate::BindingId;

/// Primitive value types of the source object model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveType {
    /// Source-level spelling, used in qualified names
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Char => "char",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
        }
    }

    /// Capitalized keyword used when building method selectors
    pub fn keyword(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "Boolean",
            PrimitiveType::Byte => "Byte",
            PrimitiveType::Char => "Char",
            PrimitiveType::Short => "Short",
            PrimitiveType::Int => "Int",
            PrimitiveType::Long => "Long",
            PrimitiveType::Float => "Float",
            PrimitiveType::Double => "Double",
        }
    }

    /// Name of the boxed wrapper type
    pub fn boxed_name(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "Boolean",
            PrimitiveType::Byte => "Byte",
            PrimitiveType::Char => "Character",
            PrimitiveType::Short => "Short",
            PrimitiveType::Int => "Integer",
            PrimitiveType::Long => "Long",
            PrimitiveType::Float => "Float",
            PrimitiveType::Double => "Double",
        }
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            PrimitiveType::Byte
                | PrimitiveType::Char
                | PrimitiveType::Short
                | PrimitiveType::Int
                | PrimitiveType::Long
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, PrimitiveType::Float | PrimitiveType::Double)
    }

    /// Width in bits of the value after binary numeric promotion
    pub fn promoted_bits(self) -> u8 {
        match self {
            PrimitiveType::Long | PrimitiveType::Double => 64,
            _ => 32,
        }
    }
}

/// A resolved type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeRef {
    Void,
    /// Type of the `null` literal
    Null,
    Primitive(PrimitiveType),
    /// Boxed wrapper of a primitive (a library reference type)
    Boxed(PrimitiveType),
    /// The library string type
    String,
    /// The root object type
    Object,
    /// The runtime iteration protocol, parameterized by element type
    Iterator(Box<TypeRef>),
    /// A type declared in the batch
    Declared(BindingId),
    /// A library type outside the batch, by qualified name
    External(String),
    Array(Box<TypeRef>),
}

impl TypeRef {
    pub fn int() -> Self {
        TypeRef::Primitive(PrimitiveType::Int)
    }

    pub fn boolean() -> Self {
        TypeRef::Primitive(PrimitiveType::Boolean)
    }

    pub fn array_of(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeRef::Primitive(_))
    }

    /// Whether values of this type are object references
    pub fn is_reference(&self) -> bool {
        !matches!(self, TypeRef::Void | TypeRef::Primitive(_))
    }

    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match self {
            TypeRef::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_boxed(&self) -> Option<PrimitiveType> {
        match self {
            TypeRef::Boxed(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_declared(&self) -> Option<BindingId> {
        match self {
            TypeRef::Declared(id) => Some(*id),
            _ => None,
        }
    }

    pub fn element_type(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::Array(element) => Some(element),
            _ => None,
        }
    }

    /// Strip array dimensions and return the innermost batch-declared type
    pub fn innermost_declared(&self) -> Option<BindingId> {
        match self {
            TypeRef::Array(element) => element.innermost_declared(),
            TypeRef::Iterator(element) => element.innermost_declared(),
            TypeRef::Declared(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, TypeRef::String)
    }
}
