//! Reachability closure over a batch

use std::collections::{HashMap, HashSet};

use log::debug;
use transarc_ast::references::References;
use transarc_ast::{BindingCache, BindingId, CompilationUnit, Member, TypeDecl, TypeRef};

use crate::{ClosureRule, DeadCodeMap};

/// What keeping a type drags along
#[derive(Debug, Default)]
struct TypeEntry {
    members: Vec<BindingId>,
    /// Synthesized members (static initializer, flags, outer references)
    always: Vec<BindingId>,
    constructors: Vec<BindingId>,
    methods: Vec<BindingId>,
    /// Initializer blocks run whenever the type is used
    initializers: References,
}

/// Declarations reached from the keep-roots
#[derive(Debug, Default)]
pub struct Reachability {
    kept: HashSet<BindingId>,
}

impl Reachability {
    pub fn compute<'u>(
        cache: &BindingCache,
        units: impl IntoIterator<Item = &'u CompilationUnit>,
        map: &DeadCodeMap,
    ) -> Self {
        let mut index = Index::default();
        for unit in units {
            for decl in &unit.types {
                index.add_type(cache, decl);
            }
        }

        let mut walk = Walk {
            cache,
            index: &index,
            kept: HashSet::new(),
            queue: Vec::new(),
        };
        let mut roots: Vec<BindingId> = index
            .types
            .keys()
            .chain(index.members.keys())
            .copied()
            .filter(|id| map.is_root(&cache.qualified_of(*id)))
            .collect();
        roots.sort();
        for root in roots {
            walk.keep(root);
            if let Some(entry) = index.types.get(&root) {
                for member in &entry.members {
                    walk.keep(*member);
                }
            }
        }

        walk.drain();
        if map.closure == ClosureRule::ReferencesAndOverrides {
            while walk.keep_overrides() {
                walk.drain();
            }
        }
        debug!("reachability closure holds {} binding(s)", walk.kept.len());
        Self { kept: walk.kept }
    }

    pub fn contains(&self, id: BindingId) -> bool {
        self.kept.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.kept.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}

#[derive(Debug, Default)]
struct Index {
    types: HashMap<BindingId, TypeEntry>,
    /// Dependencies of each field and method
    members: HashMap<BindingId, References>,
}

impl Index {
    fn add_type(&mut self, cache: &BindingCache, decl: &TypeDecl) {
        let mut entry = TypeEntry::default();
        for member in &decl.members {
            match member {
                Member::Field(field) => {
                    entry.members.push(field.binding);
                    if field.meta.is_synthetic() {
                        entry.always.push(field.binding);
                    }
                    self.members
                        .insert(field.binding, References::of_field(cache, field));
                }
                Member::Method(method) => {
                    entry.members.push(method.binding);
                    entry.methods.push(method.binding);
                    if method.meta.is_synthetic() {
                        entry.always.push(method.binding);
                    }
                    if cache.get(method.binding).is_some_and(|b| b.is_constructor()) {
                        entry.constructors.push(method.binding);
                    }
                    self.members
                        .insert(method.binding, References::of_method(cache, method));
                }
                Member::Initializer(init) => entry
                    .initializers
                    .extend(References::of_body(cache, Some(&init.body))),
                Member::Type(nested) => {
                    entry.members.push(nested.binding);
                    self.add_type(cache, nested);
                }
                // the runtime calls the finalizer of every torn-down instance
                Member::Destructor(destructor) => entry.always.extend(destructor.finalizer),
            }
        }
        self.types.insert(decl.binding, entry);
    }
}

struct Walk<'a> {
    cache: &'a BindingCache,
    index: &'a Index,
    kept: HashSet<BindingId>,
    queue: Vec<BindingId>,
}

impl Walk<'_> {
    fn keep(&mut self, id: BindingId) {
        if self.kept.insert(id) {
            self.queue.push(id);
        }
    }

    fn keep_refs(&mut self, refs: &References) {
        for ty in &refs.types {
            self.keep(*ty);
        }
        for member in &refs.members {
            self.keep(*member);
        }
        let index = self.index;
        for ty in &refs.instantiated {
            self.keep(*ty);
            if let Some(entry) = index.types.get(ty) {
                for ctor in &entry.constructors {
                    self.keep(*ctor);
                }
            }
        }
    }

    fn drain(&mut self) {
        let index = self.index;
        while let Some(id) = self.queue.pop() {
            if let Some(entry) = index.types.get(&id) {
                if let Some(enclosing) = self.cache.type_binding(id).and_then(|t| t.enclosing) {
                    self.keep(enclosing);
                }
                for sup in self.cache.supertypes(id) {
                    self.keep(sup);
                }
                for member in &entry.always {
                    self.keep(*member);
                }
                self.keep_refs(&entry.initializers);
            } else if let Some(refs) = index.members.get(&id) {
                if let Some(declaring) = self.cache.get(id).and_then(|b| b.declaring) {
                    self.keep(declaring);
                }
                self.keep_refs(refs);
            }
        }
    }

    /// Keep the methods of kept types that override a kept method; returns
    /// whether anything was added
    fn keep_overrides(&mut self) -> bool {
        let mut kept_methods: HashMap<(String, Vec<TypeRef>), Vec<BindingId>> = HashMap::new();
        for entry in self.index.types.values() {
            for method in entry.methods.iter().filter(|m| self.kept.contains(m)) {
                if let Some(key) = self.signature_key(*method) {
                    kept_methods.entry(key).or_default().push(*method);
                }
            }
        }

        let mut overriding = Vec::new();
        for (ty, entry) in &self.index.types {
            if !self.kept.contains(ty) {
                continue;
            }
            for method in entry.methods.iter().filter(|m| !self.kept.contains(m)) {
                let Some(key) = self.signature_key(*method) else { continue };
                let overrides = kept_methods.get(&key).is_some_and(|candidates| {
                    candidates.iter().any(|kept| {
                        self.cache
                            .get(*kept)
                            .and_then(|b| b.declaring)
                            .is_some_and(|sup| sup != *ty && self.cache.is_subtype(*ty, sup))
                    })
                });
                if overrides {
                    overriding.push(*method);
                }
            }
        }

        let added = !overriding.is_empty();
        for method in overriding {
            self.keep(method);
        }
        added
    }

    fn signature_key(&self, method: BindingId) -> Option<(String, Vec<TypeRef>)> {
        let binding = self.cache.get(method)?;
        if binding.is_static || binding.is_constructor() {
            return None;
        }
        let sig = binding.as_method()?;
        Some((binding.name.clone(), sig.params.clone()))
    }
}
