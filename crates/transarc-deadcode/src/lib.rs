//! Transarc Dead-Code Filter
//!
//! Removes declarations that are not in the closure of a reachability map.
//! The map names keep-roots (types or members, with `*` suffix wildcards)
//! and a closure rule; everything the roots transitively reference is kept,
//! the rest is pruned together with imports nothing retained still uses.

mod closure;
mod error;
mod map;
mod prune;

pub use closure::Reachability;
pub use error::DeadCodeMapError;
pub use map::{root_matches, ClosureRule, DeadCodeMap};
pub use prune::{prune_unit, PruneReport};

use log::info;
use transarc_ast::{BindingCache, CompilationUnit};

/// Batch-wide filter built from a loaded map
#[derive(Debug, Clone)]
pub struct DeadCodeFilter {
    map: DeadCodeMap,
}

impl DeadCodeFilter {
    pub fn new(map: DeadCodeMap) -> Self {
        Self { map }
    }

    pub fn map(&self) -> &DeadCodeMap {
        &self.map
    }

    /// Compute the closure over every unit of the batch and prune each unit
    pub fn apply(&self, cache: &BindingCache, units: &mut [CompilationUnit]) -> PruneReport {
        let reach = Reachability::compute(cache, units.iter(), &self.map);
        let mut report = PruneReport::default();
        for unit in units.iter_mut() {
            report.merge(prune_unit(cache, unit, &reach));
        }
        info!(
            "dead-code filter kept {} declaration(s); removed {} type(s), {} member(s), {} import(s)",
            reach.len(),
            report.types,
            report.members,
            report.imports
        );
        report
    }
}
