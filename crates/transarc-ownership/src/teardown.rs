//! Destructor synthesis

use transarc_ast::{BindingCache, DestructorDecl, OwnershipKind, TeardownStep, TypeDecl};

use crate::MemoryModel;

/// Zero-argument instance method run before a type's fields are torn down
pub const FINALIZER_NAME: &str = "finalize";

/// Teardown for one type, reading the ownership already recorded on its
/// fields
///
/// Owned fields are released (only under explicit reference counting) and
/// cycle breakers are cleared, in field declaration order. Unretained and
/// primitive fields are left alone.
pub fn synthesize_destructor(
    cache: &BindingCache,
    decl: &TypeDecl,
    model: MemoryModel,
) -> DestructorDecl {
    let steps = decl
        .fields()
        .filter_map(|field| match field.meta.ownership? {
            OwnershipKind::Owned if model.releases_explicitly() => {
                Some(TeardownStep::Release(field.binding))
            }
            OwnershipKind::CycleBreaker => Some(TeardownStep::Clear(field.binding)),
            OwnershipKind::Owned | OwnershipKind::Unretained => None,
        })
        .collect();

    let finalizer = decl
        .methods()
        .find(|m| {
            cache.get(m.binding).is_some_and(|b| {
                b.name == FINALIZER_NAME
                    && !b.is_static
                    && b.as_method().is_some_and(|sig| sig.params.is_empty())
            })
        })
        .map(|m| m.binding);

    DestructorDecl { steps, finalizer }
}
