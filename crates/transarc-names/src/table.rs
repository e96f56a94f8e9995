//! The batch-wide name table
//!
//! Every declared entity gets exactly one target identifier. Identifiers are
//! unique within the namespace in which the target language would let them
//! collide: the global namespace (types and static storage), the member
//! namespace of a type, and the local namespace of a method.

use std::collections::{BTreeMap, HashMap};

use log::debug;
use transarc_ast::{Binding, BindingCache, BindingId, BindingKind, TypeRef};
use xxhash_rust::xxh64::xxh64;

use crate::prefixes::{camel_case_package, capitalize};
use crate::reserved::{is_bad_parameter_name, is_reserved};
use crate::{NameError, PackagePrefixes};

/// Selector used for constructors
pub const INIT_NAME: &str = "init";

/// Namespace in which target identifiers must be distinct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameScope {
    /// Types and static storage
    Global,
    /// Fields and methods of one type
    Members(BindingId),
    /// Locals and parameters of one method
    Locals(BindingId),
}

/// Registry mapping bindings to collision-free target identifiers
#[derive(Debug, Default)]
pub struct NameTable {
    prefixes: PackagePrefixes,
    assigned: HashMap<BindingId, String>,
    taken: HashMap<NameScope, HashMap<String, BindingId>>,
}

impl NameTable {
    pub fn new(prefixes: PackagePrefixes) -> Self {
        Self {
            prefixes,
            ..Self::default()
        }
    }

    pub fn prefixes(&self) -> &PackagePrefixes {
        &self.prefixes
    }

    /// Identifier already assigned to a binding
    pub fn get(&self, id: BindingId) -> Option<&str> {
        self.assigned.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    /// Every assignment, ordered by binding id
    pub fn entries(&self) -> BTreeMap<BindingId, String> {
        self.assigned
            .iter()
            .map(|(id, name)| (*id, name.clone()))
            .collect()
    }

    /// Assign (or return the already assigned) identifier of a binding
    pub fn register(&mut self, cache: &BindingCache, id: BindingId) -> Result<String, NameError> {
        if let Some(name) = self.assigned.get(&id) {
            return Ok(name.clone());
        }
        let binding = cache.get(id).ok_or(NameError::UnknownBinding(id))?;
        let (scope, candidate) = self.candidate(cache, &binding)?;
        let name = self.claim(cache, scope, candidate, &binding)?;
        self.assigned.insert(id, name.clone());
        Ok(name)
    }

    fn claim(
        &mut self,
        cache: &BindingCache,
        scope: NameScope,
        candidate: String,
        binding: &Binding,
    ) -> Result<String, NameError> {
        let taken = self.taken.entry(scope).or_default();
        if !taken.contains_key(&candidate) {
            taken.insert(candidate.clone(), binding.id);
            return Ok(candidate);
        }

        let suffixed = format!("{}_{}", candidate, disambiguator(&binding.qualified));
        if let Some(holder) = taken.get(&suffixed) {
            return Err(NameError::CollisionUnresolvable {
                origin: binding.qualified.clone(),
                candidate: suffixed,
                holder: cache.qualified_of(*holder),
                scope: describe_scope(cache, scope),
            });
        }
        debug!(
            "renaming {} to {} to avoid a collision in {}",
            binding.qualified,
            suffixed,
            describe_scope(cache, scope)
        );
        taken.insert(suffixed.clone(), binding.id);
        Ok(suffixed)
    }

    fn candidate(
        &mut self,
        cache: &BindingCache,
        binding: &Binding,
    ) -> Result<(NameScope, String), NameError> {
        match &binding.kind {
            BindingKind::Type(ty) => {
                let simple = binding.name.trim_start_matches('$');
                let mut name = match ty.enclosing {
                    Some(enclosing) => format!("{}_{}", self.register(cache, enclosing)?, simple),
                    None => format!("{}{}", self.prefixes.prefix_for(&ty.package), simple),
                };
                if is_reserved(&name) {
                    name.push('_');
                }
                Ok((NameScope::Global, name))
            }
            BindingKind::Field(_) => {
                let base = variable_base_name(&binding.name);
                let owner = binding.declaring.unwrap_or(binding.id);
                if binding.is_static {
                    let owner_name = self.register(cache, owner)?;
                    Ok((NameScope::Global, format!("{}_{}", owner_name, base)))
                } else {
                    Ok((NameScope::Members(owner), format!("{}_", base)))
                }
            }
            BindingKind::Method(method) => {
                let mut selector = if method.is_constructor {
                    INIT_NAME.to_string()
                } else if is_reserved(&binding.name) {
                    format!("{}__", binding.name)
                } else {
                    binding.name.clone()
                };
                for (index, param) in method.params.iter().enumerate() {
                    let keyword = self.parameter_keyword(cache, param)?;
                    selector.push_str(if index == 0 { "With" } else { "with" });
                    selector.push_str(&capitalize(&keyword));
                    selector.push(':');
                }
                let owner = binding.declaring.unwrap_or(binding.id);
                Ok((NameScope::Members(owner), selector))
            }
            BindingKind::Local(local) => {
                let mut name = variable_base_name(&binding.name);
                if local.is_parameter && is_bad_parameter_name(&binding.name) {
                    name = format!("{}Arg", binding.name);
                }
                let method = binding.declaring.unwrap_or(binding.id);
                Ok((NameScope::Locals(method), name))
            }
        }
    }

    /// Keyword naming a parameter type inside a selector
    fn parameter_keyword(&mut self, cache: &BindingCache, ty: &TypeRef) -> Result<String, NameError> {
        let mut dimensions = 0;
        let mut element = ty;
        while let TypeRef::Array(inner) = element {
            dimensions += 1;
            element = inner.as_ref();
        }
        let mut name = match element {
            TypeRef::Primitive(p) => p.name().to_string(),
            TypeRef::Boxed(p) => format!("JavaLang{}", p.boxed_name()),
            TypeRef::String => "NSString".to_string(),
            TypeRef::Declared(id) => self.register(cache, *id)?,
            TypeRef::External(qualified) => camel_case_package(qualified),
            TypeRef::Iterator(_) => "JavaUtilIterator".to_string(),
            TypeRef::Object | TypeRef::Null | TypeRef::Void => {
                if dimensions == 0 {
                    return Ok("id".to_string());
                }
                "NSObject".to_string()
            }
            TypeRef::Array(_) => unreachable!("array layers stripped above"),
        };
        if dimensions > 0 {
            name.push_str("Array");
            if dimensions > 1 {
                name.push_str(&dimensions.to_string());
            }
        }
        Ok(name)
    }
}

/// Base name of a field or variable after reserved-word escaping
fn variable_base_name(name: &str) -> String {
    if name == "initialize" {
        return "initialize_".to_string();
    }
    if is_reserved(name) {
        return format!("{}_", name);
    }
    name.to_string()
}

/// First eight hex digits of the xxh64 hash of a qualified origin
pub fn disambiguator(qualified: &str) -> String {
    let hash = format!("{:016x}", xxh64(qualified.as_bytes(), 0));
    hash[..8].to_string()
}

fn describe_scope(cache: &BindingCache, scope: NameScope) -> String {
    match scope {
        NameScope::Global => "the global namespace".to_string(),
        NameScope::Members(owner) => format!("members of {}", cache.qualified_of(owner)),
        NameScope::Locals(method) => format!("locals of {}", cache.qualified_of(method)),
    }
}
