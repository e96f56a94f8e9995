//! Static field-ownership graph of a batch
//!
//! Nodes are the types declared by the batch's units. Every reference-typed
//! instance field is recorded with the ownership kind it has before any
//! cycle analysis. An owning field produces edges from its declaring type
//! and from every batch subclass that inherits it, to its declared type (or
//! array element type) and every batch type that extends or implements it.

use std::collections::{HashMap, HashSet};

use transarc_ast::{
    BindingCache, BindingId, CompilationUnit, FieldAnnotation, FieldDecl, Member, OwnershipKind,
    Span, SyntheticOrigin, TypeCategory, TypeDecl, TypeRef,
};

/// A reference-typed instance field
#[derive(Debug, Clone)]
pub struct FieldEdge {
    pub field: BindingId,
    /// Qualified name of the field
    pub name: String,
    /// Declaring type (node index)
    pub from: usize,
    /// Declared batch type (node index), if any
    pub to: Option<usize>,
    /// Batch types an instance stored in the field can have
    pub targets: Vec<usize>,
    /// Kind before cycle analysis: `Owned` or `Unretained`
    pub base_kind: OwnershipKind,
    /// Declared `RetainedWith`
    pub designated: bool,
    /// Position among the declaring type's fields
    pub position: usize,
    pub span: Span,
}

impl FieldEdge {
    /// Whether the field takes part in the ownership graph
    pub fn is_owning_edge(&self) -> bool {
        !self.targets.is_empty() && self.base_kind == OwnershipKind::Owned
    }
}

/// An owning reference from an instance of one type to an instance of another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwningEdge {
    /// Index into [`OwnershipGraph::fields`]
    pub field: usize,
    pub from: usize,
    pub to: usize,
}

impl OwningEdge {
    pub fn is_self_reference(&self) -> bool {
        self.from == self.to
    }
}

#[derive(Debug, Default)]
pub struct OwnershipGraph {
    types: Vec<BindingId>,
    qualified: Vec<String>,
    by_type: HashMap<BindingId, usize>,
    fields: Vec<FieldEdge>,
    edges: Vec<OwningEdge>,
    /// Edges leaving each node, as indices into `edges`
    outgoing: Vec<Vec<usize>>,
}

impl OwnershipGraph {
    pub fn build<'u>(
        cache: &BindingCache,
        units: impl IntoIterator<Item = &'u CompilationUnit>,
    ) -> Self {
        let mut decls = Vec::new();
        for unit in units {
            for decl in &unit.types {
                collect_decls(decl, &mut decls);
            }
        }

        let mut graph = Self::default();
        for decl in &decls {
            graph.add_type(cache, decl.binding);
        }
        let subtypes = graph.subtypes(cache);

        // Owning fields declared by each node
        let mut declared: Vec<Vec<usize>> = vec![Vec::new(); graph.len()];
        for decl in &decls {
            let from = graph.by_type[&decl.binding];
            let mut position = 0;
            for field in decl.fields() {
                if let Some(edge) = graph.classify(cache, &subtypes, from, position, field) {
                    if edge.is_owning_edge() {
                        declared[from].push(graph.fields.len());
                    }
                    graph.fields.push(edge);
                    position += 1;
                }
            }
        }

        for node in 0..graph.len() {
            for owner in graph.superclass_chain(cache, node) {
                for field in declared[owner].clone() {
                    for to in graph.fields[field].targets.clone() {
                        graph.outgoing[node].push(graph.edges.len());
                        graph.edges.push(OwningEdge {
                            field,
                            from: node,
                            to,
                        });
                    }
                }
            }
        }
        graph
    }

    fn add_type(&mut self, cache: &BindingCache, ty: BindingId) {
        if self.by_type.contains_key(&ty) {
            return;
        }
        self.by_type.insert(ty, self.types.len());
        self.types.push(ty);
        self.qualified.push(cache.qualified_of(ty));
        self.outgoing.push(Vec::new());
    }

    /// Batch nodes that are, extend or implement each type
    fn subtypes(&self, cache: &BindingCache) -> HashMap<BindingId, Vec<usize>> {
        let mut subtypes: HashMap<BindingId, Vec<usize>> = HashMap::new();
        for (node, ty) in self.types.iter().enumerate() {
            let mut seen = HashSet::new();
            let mut work = vec![*ty];
            while let Some(current) = work.pop() {
                if !seen.insert(current) {
                    continue;
                }
                subtypes.entry(current).or_default().push(node);
                if let Some(binding) = cache.type_binding(current) {
                    work.extend(binding.superclass);
                    work.extend(binding.interfaces.iter().copied());
                }
            }
        }
        subtypes
    }

    /// The node itself, then its batch superclasses nearest first
    fn superclass_chain(&self, cache: &BindingCache, node: usize) -> Vec<usize> {
        let mut chain = vec![node];
        let mut current = cache.type_binding(self.types[node]).and_then(|t| t.superclass);
        while let Some(ty) = current {
            if let Some(ix) = self.by_type.get(&ty) {
                if chain.contains(ix) {
                    break;
                }
                chain.push(*ix);
            }
            current = cache.type_binding(ty).and_then(|t| t.superclass);
        }
        chain
    }

    fn classify(
        &self,
        cache: &BindingCache,
        subtypes: &HashMap<BindingId, Vec<usize>>,
        from: usize,
        position: usize,
        field: &FieldDecl,
    ) -> Option<FieldEdge> {
        let binding = cache.get(field.binding)?;
        if binding.is_static {
            return None;
        }
        let info = binding.as_field()?;
        if !info.ty.is_reference() || is_inline_value(cache, &info.ty) {
            return None;
        }

        let unretained = match field.meta.origin {
            Some(SyntheticOrigin::OuterReference) => true,
            Some(SyntheticOrigin::CapturedValue(local)) => cache
                .get(local)
                .and_then(|l| l.as_local().map(|l| l.weak))
                .unwrap_or(false),
            _ => info.annotation == Some(FieldAnnotation::Weak),
        };
        let declared = info.ty.innermost_declared();
        let targets = declared
            .and_then(|t| subtypes.get(&t))
            .cloned()
            .unwrap_or_default();
        Some(FieldEdge {
            field: field.binding,
            name: binding.qualified.clone(),
            from,
            to: declared.and_then(|t| self.by_type.get(&t).copied()),
            targets,
            base_kind: if unretained {
                OwnershipKind::Unretained
            } else {
                OwnershipKind::Owned
            },
            designated: info.annotation == Some(FieldAnnotation::RetainedWith),
            position,
            span: field.span,
        })
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn type_at(&self, node: usize) -> BindingId {
        self.types[node]
    }

    pub fn qualified_at(&self, node: usize) -> &str {
        &self.qualified[node]
    }

    pub fn index_of(&self, ty: BindingId) -> Option<usize> {
        self.by_type.get(&ty).copied()
    }

    pub fn fields(&self) -> &[FieldEdge] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> &FieldEdge {
        &self.fields[index]
    }

    pub fn edge(&self, index: usize) -> &OwningEdge {
        &self.edges[index]
    }

    /// Owning edges leaving a node, inherited fields included
    pub fn outgoing(&self, node: usize) -> &[usize] {
        &self.outgoing[node]
    }

    /// Nodes reachable from `node` through one owning edge
    pub fn successors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.outgoing[node].iter().map(move |e| self.edges[*e].to)
    }
}

/// Value types are laid out inline and carry no reference count
fn is_inline_value(cache: &BindingCache, ty: &TypeRef) -> bool {
    ty.as_declared()
        .and_then(|id| cache.type_binding(id))
        .map(|t| t.category == TypeCategory::Value)
        .unwrap_or(false)
}

fn collect_decls<'a>(decl: &'a TypeDecl, out: &mut Vec<&'a TypeDecl>) {
    out.push(decl);
    for member in &decl.members {
        if let Member::Type(nested) = member {
            collect_decls(nested, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transarc_ast::builder::{self, ProgramBuilder};

    #[test]
    fn test_edges_follow_owning_fields() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let node = b.class("p", "Node");
        let list = b.class("p", "List");
        let head = b.field(list, "head", TypeRef::Declared(node));
        let size = b.field(list, "size", TypeRef::int());
        let prev = b.annotated_field(node, "prev", TypeRef::Declared(node), FieldAnnotation::Weak);
        let names = b.field(list, "names", TypeRef::array_of(TypeRef::String));

        let unit = CompilationUnit::new("p/List.src", "p")
            .with_type(
                TypeDecl::new(list)
                    .with_member(builder::field_member(head, None))
                    .with_member(builder::field_member(size, None))
                    .with_member(builder::field_member(names, None)),
            )
            .with_type(TypeDecl::new(node).with_member(builder::field_member(prev, None)));

        let graph = OwnershipGraph::build(&cache, [&unit]);
        assert_eq!(graph.len(), 2);
        // size is primitive and not recorded
        assert_eq!(graph.fields().len(), 3);

        let list_ix = graph.index_of(list).unwrap();
        let node_ix = graph.index_of(node).unwrap();
        assert_eq!(graph.successors(list_ix).collect::<Vec<_>>(), vec![node_ix]);
        assert_eq!(graph.successors(node_ix).count(), 0);

        let prev_edge = graph.fields().iter().find(|f| f.field == prev).unwrap();
        assert_eq!(prev_edge.base_kind, OwnershipKind::Unretained);
        let names_edge = graph.fields().iter().find(|f| f.field == names).unwrap();
        assert_eq!(names_edge.to, None);
        assert_eq!(names_edge.base_kind, OwnershipKind::Owned);
    }

    #[test]
    fn test_value_type_fields_are_inline() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let point = b.value_type("p", "Point");
        let shape = b.class("p", "Shape");
        let origin = b.field(shape, "origin", TypeRef::Declared(point));

        let unit = CompilationUnit::new("p/Shape.src", "p")
            .with_type(TypeDecl::new(point))
            .with_type(TypeDecl::new(shape).with_member(builder::field_member(origin, None)));
        let graph = OwnershipGraph::build(&cache, [&unit]);
        assert!(graph.fields().is_empty());
    }

    #[test]
    fn test_inherited_fields_and_subtype_targets_become_edges() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let base = b.class("p", "Base");
        let derived = b.subclass("p", "Derived", base);
        let child = b.class("p", "Child");
        let base_child = b.field(base, "child", TypeRef::Declared(child));
        let child_owner = b.field(child, "owner", TypeRef::Declared(base));

        let unit = CompilationUnit::new("p/Tree.src", "p")
            .with_type(TypeDecl::new(base).with_member(builder::field_member(base_child, None)))
            .with_type(TypeDecl::new(derived))
            .with_type(TypeDecl::new(child).with_member(builder::field_member(child_owner, None)));
        let graph = OwnershipGraph::build(&cache, [&unit]);
        let (base_ix, derived_ix, child_ix) = (
            graph.index_of(base).unwrap(),
            graph.index_of(derived).unwrap(),
            graph.index_of(child).unwrap(),
        );

        // fields are recorded once, on their declaring type
        assert_eq!(graph.fields().len(), 2);
        assert_eq!(graph.successors(derived_ix).collect::<Vec<_>>(), vec![child_ix]);
        let mut owners: Vec<_> = graph.successors(child_ix).collect();
        owners.sort();
        assert_eq!(owners, vec![base_ix, derived_ix]);

        let inherited = graph.edge(graph.outgoing(derived_ix)[0]);
        assert_eq!(graph.field(inherited.field).field, base_child);
        assert_eq!(graph.field(inherited.field).from, base_ix);
    }
}
