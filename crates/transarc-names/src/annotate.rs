//! Recording target identifiers on a unit's declarations

use transarc_ast::visit::{self, Visitor};
use transarc_ast::{
    BindingCache, BindingId, Block, CompilationUnit, Member, Stmt, StmtKind, TypeDecl,
};

use crate::{NameError, NameTable};

/// Register every declaration of the unit in source order and store the
/// assigned identifier in each declaration's metadata
pub fn assign_unit(
    table: &mut NameTable,
    cache: &BindingCache,
    unit: &mut CompilationUnit,
) -> Result<(), NameError> {
    for decl in &mut unit.types {
        assign_type(table, cache, decl)?;
    }
    Ok(())
}

fn assign_type(
    table: &mut NameTable,
    cache: &BindingCache,
    decl: &mut TypeDecl,
) -> Result<(), NameError> {
    decl.meta.target_name = Some(table.register(cache, decl.binding)?);
    for member in &mut decl.members {
        match member {
            Member::Field(field) => {
                field.meta.target_name = Some(table.register(cache, field.binding)?);
            }
            Member::Method(method) => {
                method.meta.target_name = Some(table.register(cache, method.binding)?);
                for param in &method.params {
                    table.register(cache, *param)?;
                }
                if let Some(body) = &method.body {
                    for local in declared_locals(body) {
                        table.register(cache, local)?;
                    }
                }
            }
            Member::Initializer(init) => {
                for local in declared_locals(&init.body) {
                    table.register(cache, local)?;
                }
            }
            Member::Type(nested) => assign_type(table, cache, nested)?,
            Member::Destructor(_) => {}
        }
    }
    Ok(())
}

/// Variables declared in a body, in source order, excluding nested types
fn declared_locals(body: &Block) -> Vec<BindingId> {
    let mut collector = LocalCollector::default();
    collector.visit_block(body);
    collector.locals
}

#[derive(Default)]
struct LocalCollector {
    locals: Vec<BindingId>,
}

impl Visitor for LocalCollector {
    fn visit_type_decl(&mut self, _decl: &TypeDecl) {}

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Local { var, .. } | StmtKind::ForEach { var, .. } => self.locals.push(*var),
            StmtKind::Try { catches, .. } => {
                self.locals.extend(catches.iter().map(|c| c.var));
            }
            _ => {}
        }
        visit::walk_stmt(self, stmt);
    }
}
