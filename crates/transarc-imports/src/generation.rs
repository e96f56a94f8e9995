//! Output groupings

use serde::{Deserialize, Serialize};
use transarc_ast::{BindingId, CompilationUnit, Member, TypeDecl};

/// One or more compilation units emitted to a single declaration and
/// definition file pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationUnit {
    /// Output path without extension
    pub name: String,
    pub units: Vec<CompilationUnit>,
}

impl GenerationUnit {
    pub fn new(name: impl Into<String>, units: Vec<CompilationUnit>) -> Self {
        Self {
            name: name.into(),
            units,
        }
    }

    /// A unit emitted on its own, named after its source path
    pub fn single(unit: CompilationUnit) -> Self {
        let name = output_name(&unit.path);
        Self::new(name, vec![unit])
    }

    /// Every type declared by the member units, nested ones included
    pub fn declared_types(&self) -> Vec<BindingId> {
        fn walk(decl: &TypeDecl, out: &mut Vec<BindingId>) {
            out.push(decl.binding);
            for member in &decl.members {
                if let Member::Type(nested) = member {
                    walk(nested, out);
                }
            }
        }
        let mut out = Vec::new();
        for unit in &self.units {
            for decl in &unit.types {
                walk(decl, &mut out);
            }
        }
        out
    }

    pub fn type_decls(&self) -> impl Iterator<Item = &TypeDecl> {
        self.units.iter().flat_map(|u| u.types.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.units.iter().all(|u| u.types.is_empty())
    }
}

/// Strip the source extension: `com/app/Main.src` becomes `com/app/Main`
pub fn output_name(path: &str) -> String {
    let file_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => path[..file_start + dot].to_string(),
        _ => path.to_string(),
    }
}
