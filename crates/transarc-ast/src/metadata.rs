//! Pass-attached metadata
//!
//! Declarations carry a `NodeMeta` slot. It is empty when the front end hands
//! the tree over and is filled in by later stages: the ownership resolver
//! records the ownership kind of reference-typed fields, the driver records
//! target identifiers from the name table.

use serde::{Deserialize, Serialize};

use crate::BindingId;

/// Ownership classification of a reference-typed field or captured value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwnershipKind {
    /// Retained by the holder and released on teardown
    Owned,
    /// Observer; no influence on the referent's lifetime
    Unretained,
    /// One side of a mutual ownership pair, cleared on teardown without
    /// waiting for the partner
    CycleBreaker,
}

/// Why a declaration was synthesized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyntheticOrigin {
    /// Reference from an extracted type to its enclosing instance
    OuterReference,
    /// Copy of a captured local of the enclosing scope
    CapturedValue(BindingId),
    /// Type lifted out of an enclosing declaration
    ExtractedType,
    /// Merged static initializer of a type
    StaticInitializer,
    /// Flag guarding the static initializer
    StaticInitFlag,
    /// Constructor added so instance initializers have a home
    DefaultConstructor,
}

/// Metadata slot attached to declarations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMeta {
    pub ownership: Option<OwnershipKind>,
    pub target_name: Option<String>,
    pub origin: Option<SyntheticOrigin>,
}

impl NodeMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn synthetic(origin: SyntheticOrigin) -> Self {
        Self {
            origin: Some(origin),
            ..Self::default()
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.origin.is_some()
    }
}
