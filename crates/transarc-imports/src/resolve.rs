//! Per-file import sets

use std::collections::{BTreeSet, HashSet};

use log::debug;
use serde::{Deserialize, Serialize};
use transarc_ast::references::References;
use transarc_ast::{
    BindingCache, BindingId, Diagnostic, DiagnosticKind, Member, Span, TypeDecl, TypeRef,
    Visibility,
};

use crate::graph::{is_value_type, LayoutCycle};
use crate::{layout_targets, DependencyGraph, GenerationUnit, HeaderResolver};

/// A declaration to import: the type and the header declaring it
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ImportEntry {
    pub name: String,
    pub header: String,
}

/// Imports of one emitted file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportSet {
    /// Forward declarations (`@class`-style)
    pub forward: BTreeSet<ImportEntry>,
    /// Full header imports
    pub full: BTreeSet<ImportEntry>,
}

impl ImportSet {
    pub fn add_full(&mut self, entry: ImportEntry) {
        self.forward.remove(&entry);
        self.full.insert(entry);
    }

    pub fn add_forward(&mut self, entry: ImportEntry) {
        if !self.full.contains(&entry) {
            self.forward.insert(entry);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.full.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.forward.iter().chain(&self.full).any(|e| e.name == name)
    }
}

/// Imports of a generation unit's declaration and definition files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportSets {
    pub declaration: ImportSet,
    pub definition: ImportSet,
}

/// Resolves imports for the generation units of one batch
pub struct ImportResolver<'a> {
    cache: &'a BindingCache,
    headers: HeaderResolver,
    graph: DependencyGraph,
    cycles: Vec<LayoutCycle>,
}

impl<'a> ImportResolver<'a> {
    pub fn new(
        cache: &'a BindingCache,
        generation_units: &[GenerationUnit],
        headers: HeaderResolver,
    ) -> Self {
        let graph = DependencyGraph::build(cache, generation_units);
        let cycles = graph.layout_cycles(cache);
        Self {
            cache,
            headers,
            graph,
            cycles,
        }
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Layout cycles the generation unit takes part in
    pub fn cycle_diagnostics(&self, gen: &GenerationUnit) -> Vec<Diagnostic> {
        let Some(file) = self.graph.file_index(&gen.name) else {
            return Vec::new();
        };
        self.cycles
            .iter()
            .filter(|c| c.files.contains(&file))
            .map(|c| {
                Diagnostic::new(
                    DiagnosticKind::ImportCycle {
                        participants: c.participants.clone(),
                    },
                    Span::dummy(),
                )
                .with_related(c.participants.clone())
            })
            .collect()
    }

    /// Import sets of a generation unit, or the layout cycles blocking it
    pub fn resolve(&self, gen: &GenerationUnit) -> Result<ImportSets, Vec<Diagnostic>> {
        let cycles = self.cycle_diagnostics(gen);
        if !cycles.is_empty() {
            return Err(cycles);
        }

        let own: HashSet<BindingId> = gen.declared_types().into_iter().collect();
        let mut builder = SetBuilder {
            resolver: self,
            own: &own,
            sets: ImportSets::default(),
        };
        for decl in gen.type_decls() {
            builder.add_type(decl);
        }
        let sets = builder.sets;
        debug!(
            "{}: declaration {} forward / {} full, definition {} full",
            gen.name,
            sets.declaration.forward.len(),
            sets.declaration.full.len(),
            sets.definition.full.len()
        );
        Ok(sets)
    }

    fn batch_entry(&self, ty: BindingId) -> ImportEntry {
        let top = self.cache.top_level_of(ty);
        let header = match self.graph.file_of(top) {
            Some(file) => HeaderResolver::for_output(file),
            None => HeaderResolver::for_output(&self.cache.qualified_of(top).replace('.', "/")),
        };
        ImportEntry {
            name: self.cache.qualified_of(ty),
            header,
        }
    }

    fn external_entry(&self, name: &str) -> ImportEntry {
        ImportEntry {
            name: name.to_string(),
            header: self.headers.for_external(name),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Target {
    Declaration,
    Definition,
}

struct SetBuilder<'r, 'a> {
    resolver: &'r ImportResolver<'a>,
    own: &'r HashSet<BindingId>,
    sets: ImportSets,
}

impl SetBuilder<'_, '_> {
    fn set(&mut self, target: Target) -> &mut ImportSet {
        match target {
            Target::Declaration => &mut self.sets.declaration,
            Target::Definition => &mut self.sets.definition,
        }
    }

    fn full(&mut self, target: Target, ty: BindingId) {
        if !self.own.contains(&ty) {
            let entry = self.resolver.batch_entry(ty);
            self.set(target).add_full(entry);
        }
    }

    /// Forward-declare references, except inline values which need layout
    fn forward(&mut self, target: Target, ty: BindingId) {
        if self.own.contains(&ty) {
            return;
        }
        let entry = self.resolver.batch_entry(ty);
        if is_value_type(self.resolver.cache, &TypeRef::Declared(ty)) {
            self.set(target).add_full(entry);
        } else {
            self.set(target).add_forward(entry);
        }
    }

    fn refs(&mut self, target: Target, refs: &References, full: bool) {
        for ty in &refs.types {
            if full {
                self.full(target, *ty);
            } else {
                self.forward(target, *ty);
            }
        }
        for name in &refs.external {
            let entry = self.resolver.external_entry(name);
            if full {
                self.set(target).add_full(entry);
            } else {
                self.set(target).add_forward(entry);
            }
        }
    }

    fn add_type(&mut self, decl: &TypeDecl) {
        let cache = self.resolver.cache;
        for ty in layout_targets(cache, decl) {
            self.full(Target::Declaration, ty);
        }

        for member in &decl.members {
            match member {
                Member::Field(field) => {
                    let mut declared = References::new();
                    if let Some(ty) = cache.get(field.binding).and_then(|b| b.value_type().cloned())
                    {
                        declared.add_type(&ty);
                    }
                    if is_private(cache, field.binding) {
                        self.refs(Target::Definition, &declared, true);
                    } else {
                        self.refs(Target::Declaration, &declared, false);
                    }
                    if let Some(init) = &field.init {
                        self.refs(Target::Definition, &References::of_expr(cache, init), true);
                    }
                }
                Member::Method(method) => {
                    let signature = References::of_signature(cache, method.binding);
                    if is_private(cache, method.binding) {
                        self.refs(Target::Definition, &signature, true);
                    } else {
                        self.refs(Target::Declaration, &signature, false);
                    }
                    let body = References::of_body(cache, method.body.as_ref());
                    self.refs(Target::Definition, &body, true);
                }
                Member::Initializer(init) => {
                    let body = References::of_body(cache, Some(&init.body));
                    self.refs(Target::Definition, &body, true);
                }
                Member::Type(nested) => self.add_type(nested),
                Member::Destructor(_) => {}
            }
        }
    }
}

fn is_private(cache: &BindingCache, id: BindingId) -> bool {
    cache
        .get(id)
        .is_some_and(|b| b.visibility == Visibility::Private)
}

#[cfg(test)]
mod tests {
    use super::*;
    use transarc_ast::builder::{self, ProgramBuilder};
    use transarc_ast::{CompilationUnit, Expr, Stmt};

    fn names(set: &BTreeSet<ImportEntry>) -> Vec<&str> {
        set.iter().map(|e| e.name.as_str()).collect()
    }

    /// Shape points at an Owner, holds a Point inline and extends Base;
    /// its draw() body creates a Canvas
    #[test]
    fn test_pointer_versus_inline() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let base = b.class("geo", "Base");
        let shape = b.subclass("geo", "Shape", base);
        let point = b.value_type("geo", "Point");
        let owner = b.class("geo", "Owner");
        let canvas = b.class("gfx", "Canvas");
        let origin = b.field(shape, "origin", TypeRef::Declared(point));
        let who = b.field(shape, "owner", TypeRef::Declared(owner));
        let draw = b.method(shape, "draw", vec![], TypeRef::External("java.util.List".into()));
        let canvas_ctor = b.constructor(canvas, vec![]);
        let c = b.local(draw, "c", TypeRef::Declared(canvas));

        let shape_decl = TypeDecl::new(shape)
            .with_member(builder::field_member(origin, None))
            .with_member(builder::field_member(who, None))
            .with_member(builder::method_member(
                draw,
                vec![],
                vec![builder::declare_local(
                    c,
                    Some(builder::new_object(canvas, Some(canvas_ctor), vec![])),
                )],
            ));
        let gens = vec![
            GenerationUnit::single(
                CompilationUnit::new("geo/Shape.src", "geo").with_type(shape_decl),
            ),
            GenerationUnit::single(
                CompilationUnit::new("geo/Base.src", "geo")
                    .with_type(TypeDecl::new(base))
                    .with_type(TypeDecl::new(point))
                    .with_type(TypeDecl::new(owner)),
            ),
            GenerationUnit::single(
                CompilationUnit::new("gfx/Canvas.src", "gfx").with_type(TypeDecl::new(canvas)),
            ),
        ];

        let resolver = ImportResolver::new(&cache, &gens, HeaderResolver::default());
        let sets = resolver.resolve(&gens[0]).unwrap();

        assert_eq!(names(&sets.declaration.full), vec!["geo.Base", "geo.Point"]);
        assert_eq!(names(&sets.declaration.forward), vec!["geo.Owner", "java.util.List"]);
        assert_eq!(names(&sets.definition.full), vec!["gfx.Canvas"]);
        assert!(sets.definition.forward.is_empty());
        assert!(!sets.declaration.contains("geo.Shape"));

        let base_entry = sets.declaration.full.iter().next().unwrap();
        assert_eq!(base_entry.header, "geo/Base.h");
        let list = sets.declaration.forward.iter().find(|e| e.name == "java.util.List").unwrap();
        assert_eq!(list.header, "java/util/List.h");
    }

    #[test]
    fn test_full_import_wins_over_forward() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let node = b.class("p", "Node");
        let list = b.class("p", "List");
        let head = b.field(list, "head", TypeRef::Declared(node));
        let peek = b.method(list, "peek", vec![], TypeRef::Declared(node));
        let size = b.field(node, "size", TypeRef::int());
        let read = builder::field_of(
            Some(Expr::local(b.local(peek, "n", TypeRef::Declared(node)), TypeRef::Declared(node))),
            size,
            TypeRef::int(),
        );
        let gens = vec![
            GenerationUnit::single(
                CompilationUnit::new("p/List.src", "p").with_type(
                    TypeDecl::new(list)
                        .with_member(builder::field_member(head, None))
                        .with_member(builder::method_member(peek, vec![], vec![Stmt::expr(read)])),
                ),
            ),
            GenerationUnit::single(
                CompilationUnit::new("p/Node.src", "p").with_type(TypeDecl::new(node)),
            ),
        ];
        let resolver = ImportResolver::new(&cache, &gens, HeaderResolver::default());
        let sets = resolver.resolve(&gens[0]).unwrap();
        assert_eq!(names(&sets.declaration.forward), vec!["p.Node"]);
        assert!(sets.declaration.full.is_empty());
        assert_eq!(names(&sets.definition.full), vec!["p.Node"]);
    }

    #[test]
    fn test_layout_cycle_blocks_resolution() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let left = b.value_type("p", "Left");
        let right = b.value_type("q", "Right");
        let lr = b.field(left, "r", TypeRef::Declared(right));
        let rl = b.field(right, "l", TypeRef::Declared(left));
        let gens = vec![
            GenerationUnit::single(
                CompilationUnit::new("p/Left.src", "p")
                    .with_type(TypeDecl::new(left).with_member(builder::field_member(lr, None))),
            ),
            GenerationUnit::single(
                CompilationUnit::new("q/Right.src", "q")
                    .with_type(TypeDecl::new(right).with_member(builder::field_member(rl, None))),
            ),
        ];
        let resolver = ImportResolver::new(&cache, &gens, HeaderResolver::default());
        let errors = resolver.resolve(&gens[1]).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), "E-IMPORT-001");
        assert_eq!(
            errors[0].related,
            vec!["p.Left".to_string(), "q.Right".to_string()]
        );
    }
}
