use transarc::ast::{BindingId, CompilationUnit, FieldDecl, OwnershipKind, TeardownStep, TypeDecl};
use transarc::driver::{BatchReport, FinalizedUnit, UnitStatus};

/// The emitted declaration of a type, searched across all finalized units
pub fn emitted_type(emitted: &[FinalizedUnit], ty: BindingId) -> &TypeDecl {
    emitted
        .iter()
        .flat_map(|f| f.units.iter())
        .flat_map(|u: &CompilationUnit| u.types.iter())
        .find(|t| t.binding == ty)
        .unwrap_or_else(|| panic!("type {:?} was not emitted", ty))
}

pub fn emitted_field(emitted: &[FinalizedUnit], ty: BindingId, field: BindingId) -> &FieldDecl {
    emitted_type(emitted, ty)
        .field(field)
        .unwrap_or_else(|| panic!("field {:?} was not emitted", field))
}

pub fn assert_ownership(
    emitted: &[FinalizedUnit],
    ty: BindingId,
    field: BindingId,
    expected: OwnershipKind,
) {
    assert_eq!(
        emitted_field(emitted, ty, field).meta.ownership,
        Some(expected),
        "ownership of field {:?}",
        field
    );
}

/// Fields the type's teardown releases (not merely clears)
pub fn released_fields(decl: &TypeDecl) -> Vec<BindingId> {
    decl.destructor()
        .map(|d| {
            d.steps
                .iter()
                .filter_map(|s| match s {
                    TeardownStep::Release(f) => Some(*f),
                    TeardownStep::Clear(_) => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn assert_status(report: &BatchReport, path: &str, expected: UnitStatus) {
    let unit = report
        .unit(path)
        .unwrap_or_else(|| panic!("no report for {}", path));
    assert_eq!(unit.status, expected, "status of {}: {:?}", path, unit.diagnostics);
}
