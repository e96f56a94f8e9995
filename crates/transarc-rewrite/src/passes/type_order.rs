//! Supertype-first ordering of the types in a unit
//!
//! A type whose superclass or interface is declared in the same unit is moved
//! after it. Otherwise declaration order is kept: among the types that are
//! ready, the one that came first is emitted first.

use std::collections::{BTreeSet, HashMap};

use transarc_ast::{BindingId, CompilationUnit};

use crate::{Pass, PassContext};

pub struct TypeOrdering;

impl Pass for TypeOrdering {
    fn name(&self) -> &'static str {
        "type-ordering"
    }

    fn run(&self, mut unit: CompilationUnit, ctx: &mut PassContext<'_>) -> CompilationUnit {
        let position: HashMap<BindingId, usize> = unit
            .types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.binding, i))
            .collect();

        // pending[i]: same-unit supertypes of type i not yet emitted
        let mut pending = vec![0usize; unit.types.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); unit.types.len()];
        for (i, decl) in unit.types.iter().enumerate() {
            let mut supers: Vec<usize> = ctx
                .cache
                .supertypes(decl.binding)
                .iter()
                .filter_map(|s| position.get(s).copied())
                .filter(|s| *s != i)
                .collect();
            supers.sort_unstable();
            supers.dedup();
            pending[i] = supers.len();
            for s in supers {
                dependents[s].push(i);
            }
        }

        let mut ready: BTreeSet<usize> = (0..pending.len()).filter(|i| pending[*i] == 0).collect();
        let mut order = Vec::with_capacity(pending.len());
        while let Some(next) = ready.pop_first() {
            order.push(next);
            for dependent in &dependents[next] {
                pending[*dependent] -= 1;
                if pending[*dependent] == 0 {
                    ready.insert(*dependent);
                }
            }
        }
        // A supertype cycle cannot come from a valid front end; keep the
        // remaining types in declaration order
        let remaining: Vec<usize> = (0..pending.len()).filter(|i| !order.contains(i)).collect();
        order.extend(remaining);

        let mut slots: Vec<_> = std::mem::take(&mut unit.types).into_iter().map(Some).collect();
        unit.types = order.into_iter().filter_map(|i| slots[i].take()).collect();
        unit
    }
}
