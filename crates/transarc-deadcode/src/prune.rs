//! Removing unreached declarations from a unit

use std::collections::HashSet;

use transarc_ast::references::References;
use transarc_ast::{BindingCache, BindingId, CompilationUnit, Member, TypeDecl};

use crate::Reachability;

/// Counts of removed declarations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub types: usize,
    pub members: usize,
    pub imports: usize,
}

impl PruneReport {
    pub fn merge(&mut self, other: PruneReport) {
        self.types += other.types;
        self.members += other.members;
        self.imports += other.imports;
    }
}

/// Drop unreached types and members, then the imports no retained
/// declaration uses any more
pub fn prune_unit(
    cache: &BindingCache,
    unit: &mut CompilationUnit,
    reach: &Reachability,
) -> PruneReport {
    let mut report = PruneReport::default();
    let before = unit.types.len();
    unit.types.retain(|t| reach.contains(t.binding));
    report.types += before - unit.types.len();
    for decl in &mut unit.types {
        prune_type(decl, reach, &mut report);
    }

    let used = used_types(cache, unit);
    let before = unit.imports.len();
    unit.imports.retain(|import| used.contains(import));
    report.imports = before - unit.imports.len();
    report
}

fn prune_type(decl: &mut TypeDecl, reach: &Reachability, report: &mut PruneReport) {
    decl.members.retain(|member| match member {
        Member::Field(f) => keep_counted(reach.contains(f.binding), &mut report.members),
        Member::Method(m) => keep_counted(reach.contains(m.binding), &mut report.members),
        Member::Type(t) => keep_counted(reach.contains(t.binding), &mut report.types),
        Member::Initializer(_) | Member::Destructor(_) => true,
    });
    for member in &mut decl.members {
        match member {
            Member::Type(nested) => prune_type(nested, reach, report),
            // teardown only names fields that are still declared
            Member::Destructor(destructor) => {
                destructor.steps.retain(|step| reach.contains(step.field()));
                destructor.finalizer = destructor.finalizer.filter(|f| reach.contains(*f));
            }
            _ => {}
        }
    }
}

fn keep_counted(keep: bool, removed: &mut usize) -> bool {
    if !keep {
        *removed += 1;
    }
    keep
}

/// Every binding a retained declaration of the unit mentions, with the
/// top-level types of mentioned types and members
fn used_types(cache: &BindingCache, unit: &CompilationUnit) -> HashSet<BindingId> {
    let mut refs = References::new();
    for decl in &unit.types {
        collect(cache, decl, &mut refs);
    }
    let mut used = HashSet::new();
    for id in refs.types.iter().chain(refs.members.iter()) {
        used.insert(*id);
        if let Some(ty) = cache.declaring_type_of(*id) {
            used.insert(ty);
            used.insert(cache.top_level_of(ty));
        }
    }
    used
}

fn collect(cache: &BindingCache, decl: &TypeDecl, refs: &mut References) {
    refs.types.extend(cache.supertypes(decl.binding));
    for member in &decl.members {
        match member {
            Member::Field(f) => refs.extend(References::of_field(cache, f)),
            Member::Method(m) => refs.extend(References::of_method(cache, m)),
            Member::Initializer(init) => refs.extend(References::of_body(cache, Some(&init.body))),
            Member::Type(nested) => collect(cache, nested, refs),
            Member::Destructor(_) => {}
        }
    }
}
