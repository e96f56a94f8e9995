//! Type and file dependency graph of a batch

use std::collections::{BTreeSet, HashMap, HashSet};

use transarc_ast::references::References;
use transarc_ast::{BindingCache, BindingId, Member, TypeCategory, TypeDecl, TypeRef};

use crate::{find_cycles, GenerationUnit};

/// Why one declaration needs another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeKind {
    /// The full layout is needed: superclass, interfaces, inline value fields
    Layout,
    /// Any other mention; a forward declaration suffices
    Reference,
}

/// A cycle of layout dependencies
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutCycle {
    /// Qualified type names or output file names, in cycle order
    pub participants: Vec<String>,
    /// Output files involved (indices into the graph's files)
    pub files: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    types: Vec<BindingId>,
    by_type: HashMap<BindingId, usize>,
    /// Output file of each type
    file_of: Vec<usize>,
    files: Vec<String>,
    by_file: HashMap<String, usize>,
    edges: Vec<BTreeSet<(usize, EdgeKind)>>,
}

impl DependencyGraph {
    pub fn build(cache: &BindingCache, generation_units: &[GenerationUnit]) -> Self {
        let mut graph = Self::default();
        for (file, gen) in generation_units.iter().enumerate() {
            graph.files.push(gen.name.clone());
            graph.by_file.insert(gen.name.clone(), file);
            for ty in gen.declared_types() {
                if !graph.by_type.contains_key(&ty) {
                    graph.by_type.insert(ty, graph.types.len());
                    graph.types.push(ty);
                    graph.file_of.push(file);
                    graph.edges.push(BTreeSet::new());
                }
            }
        }

        for gen in generation_units {
            for decl in gen.type_decls() {
                graph.add_edges(cache, decl);
            }
        }
        graph
    }

    fn add_edges(&mut self, cache: &BindingCache, decl: &TypeDecl) {
        let Some(from) = self.index_of(decl.binding) else { return };
        let layout: HashSet<BindingId> = layout_targets(cache, decl).into_iter().collect();
        let refs = declaration_references(cache, decl);
        for ty in refs.types.iter().chain(layout.iter()) {
            if let Some(to) = self.index_of(*ty) {
                let kind = if layout.contains(ty) {
                    EdgeKind::Layout
                } else {
                    EdgeKind::Reference
                };
                self.edges[from].insert((to, kind));
            }
        }
        for member in &decl.members {
            if let Member::Type(nested) = member {
                self.add_edges(cache, nested);
            }
        }
    }

    pub fn index_of(&self, ty: BindingId) -> Option<usize> {
        self.by_type.get(&ty).copied()
    }

    /// Output file declaring a batch type
    pub fn file_of(&self, ty: BindingId) -> Option<&str> {
        self.index_of(ty).map(|i| self.files[self.file_of[i]].as_str())
    }

    pub fn file_index(&self, name: &str) -> Option<usize> {
        self.by_file.get(name).copied()
    }

    pub fn edges_of(&self, ty: BindingId) -> Vec<(BindingId, EdgeKind)> {
        self.index_of(ty)
            .map(|i| {
                self.edges[i]
                    .iter()
                    .map(|(to, kind)| (self.types[*to], *kind))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Layout cycles between types, then between output files
    ///
    /// A file cycle is only reported when it involves a file that no type
    /// cycle already covers.
    pub fn layout_cycles(&self, cache: &BindingCache) -> Vec<LayoutCycle> {
        let type_layout: Vec<Vec<usize>> = self
            .edges
            .iter()
            .map(|edges| layout_only(edges))
            .collect();
        let mut cycles: Vec<LayoutCycle> = find_cycles(&type_layout, false)
            .into_iter()
            .map(|cycle| {
                let mut files: Vec<usize> = cycle.iter().map(|t| self.file_of[*t]).collect();
                files.sort_unstable();
                files.dedup();
                LayoutCycle {
                    participants: cycle
                        .iter()
                        .map(|t| cache.qualified_of(self.types[*t]))
                        .collect(),
                    files,
                }
            })
            .collect();

        let mut file_layout: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); self.files.len()];
        for (from, edges) in type_layout.iter().enumerate() {
            for to in edges {
                file_layout[self.file_of[from]].insert(self.file_of[*to]);
            }
        }
        let file_layout: Vec<Vec<usize>> = file_layout
            .into_iter()
            .map(|set| set.into_iter().collect())
            .collect();
        let covered: HashSet<usize> = cycles.iter().flat_map(|c| c.files.clone()).collect();
        for cycle in find_cycles(&file_layout, true) {
            if cycle.iter().all(|f| covered.contains(f)) {
                continue;
            }
            cycles.push(LayoutCycle {
                participants: cycle.iter().map(|f| self.files[*f].clone()).collect(),
                files: cycle,
            });
        }
        cycles
    }
}

fn layout_only(edges: &BTreeSet<(usize, EdgeKind)>) -> Vec<usize> {
    edges
        .iter()
        .filter(|(_, kind)| *kind == EdgeKind::Layout)
        .map(|(to, _)| *to)
        .collect()
}

/// Whether values of the type are laid out inline
pub(crate) fn is_value_type(cache: &BindingCache, ty: &TypeRef) -> bool {
    ty.as_declared()
        .and_then(|id| cache.type_binding(id))
        .is_some_and(|t| t.category == TypeCategory::Value)
}

/// Declarations whose layout the type's own layout depends on
pub fn layout_targets(cache: &BindingCache, decl: &TypeDecl) -> Vec<BindingId> {
    let mut targets = cache.supertypes(decl.binding);
    for field in decl.fields() {
        let Some(binding) = cache.get(field.binding) else { continue };
        if binding.is_static {
            continue;
        }
        if let Some(ty) = binding.value_type() {
            if is_value_type(cache, ty) {
                targets.extend(ty.as_declared());
            }
        }
    }
    targets
}

/// Everything the type's members mention, nested types excluded
pub fn declaration_references(cache: &BindingCache, decl: &TypeDecl) -> References {
    let mut refs = References::new();
    for member in &decl.members {
        match member {
            Member::Field(f) => refs.extend(References::of_field(cache, f)),
            Member::Method(m) => refs.extend(References::of_method(cache, m)),
            Member::Initializer(init) => refs.extend(References::of_body(cache, Some(&init.body))),
            Member::Type(_) | Member::Destructor(_) => {}
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use transarc_ast::builder::{self, ProgramBuilder};
    use transarc_ast::CompilationUnit;

    #[test]
    fn test_value_fields_are_layout_edges() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let point = b.value_type("geo", "Point");
        let shape = b.class("geo", "Shape");
        let owner = b.class("geo", "Owner");
        let origin = b.field(shape, "origin", TypeRef::Declared(point));
        let who = b.field(shape, "owner", TypeRef::Declared(owner));

        let gens = vec![
            GenerationUnit::single(
                CompilationUnit::new("geo/Shape.src", "geo").with_type(
                    TypeDecl::new(shape)
                        .with_member(builder::field_member(origin, None))
                        .with_member(builder::field_member(who, None)),
                ),
            ),
            GenerationUnit::single(
                CompilationUnit::new("geo/Point.src", "geo").with_type(TypeDecl::new(point)),
            ),
            GenerationUnit::single(
                CompilationUnit::new("geo/Owner.src", "geo").with_type(TypeDecl::new(owner)),
            ),
        ];
        let graph = DependencyGraph::build(&cache, &gens);
        let edges = graph.edges_of(shape);
        assert!(edges.contains(&(point, EdgeKind::Layout)));
        assert!(edges.contains(&(owner, EdgeKind::Reference)));
        assert_eq!(graph.file_of(point), Some("geo/Point"));
        assert!(graph.layout_cycles(&cache).is_empty());
    }

    #[test]
    fn test_file_level_layout_cycle() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        // a.A extends b.B; b.C holds an inline a.V
        let base = b.class("b", "B");
        let derived = b.subclass("a", "A", base);
        let value = b.value_type("a", "V");
        let holder = b.class("b", "C");
        let inline = b.field(holder, "v", TypeRef::Declared(value));

        let gens = vec![
            GenerationUnit::new(
                "a/All",
                vec![CompilationUnit::new("a/All.src", "a")
                    .with_type(TypeDecl::new(derived))
                    .with_type(TypeDecl::new(value))],
            ),
            GenerationUnit::new(
                "b/All",
                vec![CompilationUnit::new("b/All.src", "b")
                    .with_type(TypeDecl::new(base))
                    .with_type(
                        TypeDecl::new(holder).with_member(builder::field_member(inline, None)),
                    )],
            ),
        ];
        let graph = DependencyGraph::build(&cache, &gens);
        let cycles = graph.layout_cycles(&cache);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].participants, vec!["a/All".to_string(), "b/All".to_string()]);
        assert_eq!(cycles[0].files, vec![0, 1]);
    }

    #[test]
    fn test_type_level_value_cycle() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let left = b.value_type("p", "Left");
        let right = b.value_type("p", "Right");
        let lr = b.field(left, "r", TypeRef::Declared(right));
        let rl = b.field(right, "l", TypeRef::Declared(left));
        let gens = vec![GenerationUnit::single(
            CompilationUnit::new("p/Pair.src", "p")
                .with_type(TypeDecl::new(left).with_member(builder::field_member(lr, None)))
                .with_type(TypeDecl::new(right).with_member(builder::field_member(rl, None))),
        )];
        let graph = DependencyGraph::build(&cache, &gens);
        let cycles = graph.layout_cycles(&cache);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].participants, vec!["p.Left".to_string(), "p.Right".to_string()]);
    }
}
