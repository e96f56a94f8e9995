//! Batch-wide binding cache
//!
//! The cache is shared by every worker translating units of the same batch.
//! It is append-only: bindings are never mutated once inserted, and inserting
//! the same qualified origin twice returns the existing id. A single coarse
//! lock guards it; lookups hand out `Arc<Binding>` so no guard escapes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::{Binding, BindingId, BindingKind, TypeBinding};

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("binding {qualified} declared with id {found:?}, expected {expected:?}")]
    IdMismatch {
        qualified: String,
        expected: BindingId,
        found: BindingId,
    },

    #[error("duplicate binding origin: {0}")]
    DuplicateOrigin(String),
}

#[derive(Debug, Default)]
struct CacheInner {
    bindings: Vec<Arc<Binding>>,
    by_qualified: HashMap<String, BindingId>,
    /// Members per declaring binding, in insertion order
    members: HashMap<BindingId, Vec<BindingId>>,
}

/// Shared, append-only registry of every binding in the batch
#[derive(Debug, Default)]
pub struct BindingCache {
    inner: Mutex<CacheInner>,
}

impl BindingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load front-end bindings; ids must be dense and match their position
    pub fn from_bindings(bindings: Vec<Binding>) -> Result<Self, CacheError> {
        let cache = Self::new();
        {
            let mut inner = cache.lock();
            for (index, binding) in bindings.into_iter().enumerate() {
                let expected = BindingId(index as u32);
                if binding.id != expected {
                    return Err(CacheError::IdMismatch {
                        qualified: binding.qualified,
                        expected,
                        found: binding.id,
                    });
                }
                if inner.by_qualified.contains_key(&binding.qualified) {
                    return Err(CacheError::DuplicateOrigin(binding.qualified));
                }
                Self::push(&mut inner, binding);
            }
        }
        Ok(cache)
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        // Bindings are immutable once pushed, so a poisoned lock still
        // guards consistent data.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(inner: &mut CacheInner, mut binding: Binding) -> BindingId {
        let id = BindingId(inner.bindings.len() as u32);
        binding.id = id;
        inner.by_qualified.insert(binding.qualified.clone(), id);
        if let Some(declaring) = binding.declaring {
            inner.members.entry(declaring).or_default().push(id);
        }
        inner.bindings.push(Arc::new(binding));
        id
    }

    /// Insert a binding, or return the id already registered for its
    /// qualified origin
    pub fn intern(&self, binding: Binding) -> BindingId {
        let mut inner = self.lock();
        if let Some(id) = inner.by_qualified.get(&binding.qualified) {
            return *id;
        }
        Self::push(&mut inner, binding)
    }

    pub fn get(&self, id: BindingId) -> Option<Arc<Binding>> {
        self.lock().bindings.get(id.0 as usize).cloned()
    }

    pub fn lookup(&self, qualified: &str) -> Option<BindingId> {
        self.lock().by_qualified.get(qualified).copied()
    }

    pub fn contains(&self, id: BindingId) -> bool {
        (id.0 as usize) < self.lock().bindings.len()
    }

    /// Members (or locals) declared by the given binding, in insertion order
    pub fn members_of(&self, declaring: BindingId) -> Vec<Arc<Binding>> {
        let inner = self.lock();
        inner
            .members
            .get(&declaring)
            .map(|ids| {
                ids.iter()
                    .map(|id| Arc::clone(&inner.bindings[id.0 as usize]))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn type_binding(&self, id: BindingId) -> Option<TypeBinding> {
        self.get(id).and_then(|b| b.as_type().cloned())
    }

    /// Name of a binding, or `?` for unknown ids
    pub fn name_of(&self, id: BindingId) -> String {
        self.get(id).map(|b| b.name.clone()).unwrap_or_else(|| "?".into())
    }

    pub fn qualified_of(&self, id: BindingId) -> String {
        self.get(id)
            .map(|b| b.qualified.clone())
            .unwrap_or_else(|| format!("<binding {}>", id.0))
    }

    /// Direct supertypes: superclass first, then interfaces
    pub fn supertypes(&self, id: BindingId) -> Vec<BindingId> {
        match self.type_binding(id) {
            Some(t) => t.superclass.into_iter().chain(t.interfaces).collect(),
            None => Vec::new(),
        }
    }

    /// Whether `sub` is `sup` or transitively extends/implements it
    pub fn is_subtype(&self, sub: BindingId, sup: BindingId) -> bool {
        let mut stack = vec![sub];
        let mut seen = std::collections::HashSet::new();
        while let Some(current) = stack.pop() {
            if current == sup {
                return true;
            }
            if seen.insert(current) {
                stack.extend(self.supertypes(current));
            }
        }
        false
    }

    /// Outermost enclosing type of a (possibly nested) type
    pub fn top_level_of(&self, id: BindingId) -> BindingId {
        let mut current = id;
        while let Some(enclosing) = self.type_binding(current).and_then(|t| t.enclosing) {
            current = enclosing;
        }
        current
    }

    /// Type that declares a member, walking through locals to their method
    pub fn declaring_type_of(&self, id: BindingId) -> Option<BindingId> {
        let mut current = self.get(id)?;
        loop {
            if let BindingKind::Type(_) = current.kind {
                return Some(current.id);
            }
            current = self.get(current.declaring?)?;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every binding, in id order
    pub fn snapshot(&self) -> Vec<Arc<Binding>> {
        self.lock().bindings.clone()
    }
}
