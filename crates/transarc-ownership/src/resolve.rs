//! Ownership classification and cycle breaking
//!
//! Within every strongly connected component that spans more than one type,
//! the field declared `RetainedWith` stays owning and every other field with
//! an edge between two different types of the component becomes a cycle
//! breaker. A field pointing back at its own type stays owning. A component without such a
//! field cannot be translated safely and is reported. With several, the first
//! in lexical order (declaring type's qualified name, then field position)
//! wins and the rest are demoted with a warning.

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};
use transarc_ast::{
    BindingCache, BindingId, CompilationUnit, Diagnostic, DiagnosticKind, Member, OwnershipKind,
    Span, TypeDecl,
};

use crate::teardown::synthesize_destructor;
use crate::{strongly_connected, MemoryModel, OwnershipGraph};

/// A diagnostic about a set of types
#[derive(Debug, Clone)]
pub struct Finding {
    pub participants: Vec<BindingId>,
    pub diagnostic: Diagnostic,
}

/// Ownership decisions for every field of a batch
#[derive(Debug, Default)]
pub struct OwnershipPlan {
    kinds: HashMap<BindingId, OwnershipKind>,
    findings: Vec<Finding>,
    broken_cycles: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    NotVisited,
    InProgress,
    Completed,
}

impl OwnershipPlan {
    /// Classify every reference field of the given units
    ///
    /// All units of the batch must be passed together so that cycles
    /// spanning units are seen.
    pub fn resolve<'u>(
        cache: &BindingCache,
        units: impl IntoIterator<Item = &'u CompilationUnit>,
    ) -> Self {
        let graph = OwnershipGraph::build(cache, units);
        let mut plan = Self::default();
        for edge in graph.fields() {
            plan.kinds.insert(edge.field, edge.base_kind);
        }

        for component in strongly_connected(&graph) {
            if component.len() < 2 {
                continue;
            }
            if plan.break_component(&graph, &component) {
                plan.check_termination(&graph, &component);
            }
        }
        debug!(
            "ownership: {} type(s), {} field(s), {} cycle(s) broken, {} finding(s)",
            graph.len(),
            plan.kinds.len(),
            plan.broken_cycles,
            plan.findings.len()
        );
        plan
    }

    /// Returns false when the component has no designated owner
    fn break_component(&mut self, graph: &OwnershipGraph, component: &[usize]) -> bool {
        let members: HashSet<usize> = component.iter().copied().collect();
        // Fields (indices into the graph's fields) with an edge inside the
        // component between two different types
        let mut internal: Vec<usize> = component
            .iter()
            .flat_map(|node| graph.outgoing(*node).iter().map(|e| graph.edge(*e)))
            .filter(|e| !e.is_self_reference() && members.contains(&e.to))
            .map(|e| e.field)
            .collect();
        internal.sort_unstable();
        internal.dedup();
        internal.sort_by(|a, b| {
            let (a, b) = (graph.field(*a), graph.field(*b));
            graph
                .qualified_at(a.from)
                .cmp(graph.qualified_at(b.from))
                .then(a.position.cmp(&b.position))
        });

        let types = component_names(graph, component);
        let designated: Vec<usize> = internal
            .iter()
            .copied()
            .filter(|e| graph.field(*e).designated)
            .collect();

        let Some(&owner) = designated.first() else {
            let edges = internal.iter().map(|e| describe_edge(graph, *e)).collect();
            let span = internal
                .first()
                .map(|e| graph.field(*e).span)
                .unwrap_or_else(Span::dummy);
            self.push_finding(
                graph,
                component,
                Diagnostic::new(
                    DiagnosticKind::UnresolvableCycle {
                        types: types.clone(),
                        edges,
                    },
                    span,
                )
                .with_related(types),
            );
            return false;
        };

        if designated.len() > 1 {
            let demoted: Vec<String> = designated[1..]
                .iter()
                .map(|e| describe_edge(graph, *e))
                .collect();
            warn!(
                "cycle {} has {} designated owners, keeping {}",
                types.join(", "),
                designated.len(),
                describe_edge(graph, owner)
            );
            self.push_finding(
                graph,
                component,
                Diagnostic::new(
                    DiagnosticKind::MultipleDesignatedOwners {
                        kept: describe_edge(graph, owner),
                        demoted,
                    },
                    graph.field(designated[1]).span,
                )
                .with_related(types.clone()),
            );
        }

        for edge in internal {
            if edge != owner {
                self.kinds
                    .insert(graph.field(edge).field, OwnershipKind::CycleBreaker);
            }
        }
        self.broken_cycles += 1;
        info!(
            "broke ownership cycle {} keeping {}",
            types.join(", "),
            describe_edge(graph, owner)
        );
        true
    }

    /// Owned edges inside a component must not lead back into it
    fn check_termination(&mut self, graph: &OwnershipGraph, component: &[usize]) {
        let members: HashSet<usize> = component.iter().copied().collect();
        let mut state: HashMap<usize, VisitState> =
            component.iter().map(|n| (*n, VisitState::NotVisited)).collect();
        let mut path = Vec::new();
        for node in component {
            if state[node] == VisitState::NotVisited {
                if let Some(cycle) = self.owned_cycle(graph, &members, *node, &mut state, &mut path)
                {
                    let related = component_names(graph, component);
                    self.push_finding(
                        graph,
                        component,
                        Diagnostic::new(
                            DiagnosticKind::TeardownCycle {
                                type_name: graph.qualified_at(*node).to_string(),
                                path: cycle,
                            },
                            Span::dummy(),
                        )
                        .with_related(related),
                    );
                    return;
                }
            }
        }
    }

    fn owned_cycle(
        &self,
        graph: &OwnershipGraph,
        members: &HashSet<usize>,
        node: usize,
        state: &mut HashMap<usize, VisitState>,
        path: &mut Vec<usize>,
    ) -> Option<String> {
        state.insert(node, VisitState::InProgress);
        path.push(node);
        for edge in graph.outgoing(node) {
            let edge = graph.edge(*edge);
            let next = edge.to;
            // Self-reference is not a cycle
            if edge.is_self_reference() || !members.contains(&next) {
                continue;
            }
            if self.kind_of(graph.field(edge.field).field) != Some(OwnershipKind::Owned) {
                continue;
            }
            match state.get(&next) {
                Some(VisitState::InProgress) => {
                    let start = path.iter().position(|n| *n == next)?;
                    let names: Vec<&str> = path[start..]
                        .iter()
                        .chain(std::iter::once(&next))
                        .map(|n| graph.qualified_at(*n))
                        .collect();
                    return Some(names.join(" -> "));
                }
                Some(VisitState::NotVisited) => {
                    if let Some(cycle) = self.owned_cycle(graph, members, next, state, path) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }
        path.pop();
        state.insert(node, VisitState::Completed);
        None
    }

    fn push_finding(&mut self, graph: &OwnershipGraph, component: &[usize], diagnostic: Diagnostic) {
        self.findings.push(Finding {
            participants: component.iter().map(|n| graph.type_at(*n)).collect(),
            diagnostic,
        });
    }

    /// Final ownership kind of a field; `None` for primitive, static and
    /// inline fields
    pub fn kind_of(&self, field: BindingId) -> Option<OwnershipKind> {
        self.kinds.get(&field).copied()
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn broken_cycles(&self) -> usize {
        self.broken_cycles
    }

    /// Findings that involve a type declared by the unit
    pub fn diagnostics_for(&self, unit: &CompilationUnit) -> Vec<Diagnostic> {
        let declared = declared_types(unit);
        self.findings
            .iter()
            .filter(|f| f.participants.iter().any(|p| declared.contains(p)))
            .map(|f| f.diagnostic.clone().in_unit(unit.path.clone()))
            .collect()
    }

    /// Record ownership kinds on the unit's fields and install a destructor
    /// in every class; returns the diagnostics concerning the unit
    pub fn annotate_unit(
        &self,
        cache: &BindingCache,
        unit: &mut CompilationUnit,
        model: MemoryModel,
    ) -> Vec<Diagnostic> {
        for decl in &mut unit.types {
            self.annotate_type(cache, decl, model);
        }
        self.diagnostics_for(unit)
    }

    fn annotate_type(&self, cache: &BindingCache, decl: &mut TypeDecl, model: MemoryModel) {
        for member in &mut decl.members {
            match member {
                Member::Field(field) => field.meta.ownership = self.kind_of(field.binding),
                Member::Type(nested) => self.annotate_type(cache, nested, model),
                _ => {}
            }
        }
        let is_interface = cache
            .type_binding(decl.binding)
            .map(|t| t.is_interface())
            .unwrap_or(false);
        if is_interface {
            return;
        }
        let destructor = synthesize_destructor(cache, decl, model);
        decl.members.retain(|m| !matches!(m, Member::Destructor(_)));
        decl.members.push(Member::Destructor(destructor));
    }
}

fn component_names(graph: &OwnershipGraph, component: &[usize]) -> Vec<String> {
    let mut names: Vec<String> = component
        .iter()
        .map(|n| graph.qualified_at(*n).to_string())
        .collect();
    names.sort();
    names
}

fn describe_edge(graph: &OwnershipGraph, field: usize) -> String {
    let edge = graph.field(field);
    let to = edge.to.map(|t| graph.qualified_at(t)).unwrap_or("?");
    format!("{} -> {}", edge.name, to)
}

fn declared_types(unit: &CompilationUnit) -> HashSet<BindingId> {
    fn walk(decl: &TypeDecl, out: &mut HashSet<BindingId>) {
        out.insert(decl.binding);
        for member in &decl.members {
            if let Member::Type(nested) = member {
                walk(nested, out);
            }
        }
    }
    let mut out = HashSet::new();
    for decl in &unit.types {
        walk(decl, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use transarc_ast::builder::{self, ProgramBuilder};
    use transarc_ast::{FieldAnnotation, TeardownStep, TypeRef};

    struct Pair {
        cache: BindingCache,
        unit: CompilationUnit,
        parent_child: BindingId,
        child_parent: BindingId,
    }

    /// Parent owns Child and Child points back at Parent
    fn parent_child(parent_ann: Option<FieldAnnotation>, child_ann: Option<FieldAnnotation>) -> Pair {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let parent = b.class("p", "Parent");
        let child = b.class("p", "Child");
        let field = |owner, name: &str, ty, ann: Option<FieldAnnotation>| match ann {
            Some(a) => b.annotated_field(owner, name, TypeRef::Declared(ty), a),
            None => b.field(owner, name, TypeRef::Declared(ty)),
        };
        let parent_child = field(parent, "child", child, parent_ann);
        let child_parent = field(child, "parent", parent, child_ann);
        let unit = CompilationUnit::new("p/Tree.src", "p")
            .with_type(TypeDecl::new(parent).with_member(builder::field_member(parent_child, None)))
            .with_type(TypeDecl::new(child).with_member(builder::field_member(child_parent, None)));
        Pair {
            cache,
            unit,
            parent_child,
            child_parent,
        }
    }

    #[test]
    fn test_designated_owner_breaks_cycle() {
        let pair = parent_child(Some(FieldAnnotation::RetainedWith), None);
        let plan = OwnershipPlan::resolve(&pair.cache, [&pair.unit]);
        assert!(plan.findings().is_empty());
        assert_eq!(plan.broken_cycles(), 1);
        assert_eq!(plan.kind_of(pair.parent_child), Some(OwnershipKind::Owned));
        assert_eq!(plan.kind_of(pair.child_parent), Some(OwnershipKind::CycleBreaker));
    }

    #[test]
    fn test_cycle_without_owner_is_reported() {
        let pair = parent_child(None, None);
        let plan = OwnershipPlan::resolve(&pair.cache, [&pair.unit]);
        let diagnostics = plan.diagnostics_for(&pair.unit);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code(), "E-OWNERSHIP-001");
        assert!(diagnostics[0].is_error());
        assert_eq!(diagnostics[0].unit.as_deref(), Some("p/Tree.src"));
        assert_eq!(diagnostics[0].related, vec!["p.Child".to_string(), "p.Parent".to_string()]);
    }

    #[test]
    fn test_weak_back_reference_is_not_a_cycle() {
        let pair = parent_child(None, Some(FieldAnnotation::Weak));
        let plan = OwnershipPlan::resolve(&pair.cache, [&pair.unit]);
        assert!(plan.findings().is_empty());
        assert_eq!(plan.broken_cycles(), 0);
        assert_eq!(plan.kind_of(pair.child_parent), Some(OwnershipKind::Unretained));
    }

    #[test]
    fn test_several_owners_keep_the_lexically_first() {
        let pair = parent_child(
            Some(FieldAnnotation::RetainedWith),
            Some(FieldAnnotation::RetainedWith),
        );
        let plan = OwnershipPlan::resolve(&pair.cache, [&pair.unit]);
        // p.Child sorts before p.Parent
        assert_eq!(plan.kind_of(pair.child_parent), Some(OwnershipKind::Owned));
        assert_eq!(plan.kind_of(pair.parent_child), Some(OwnershipKind::CycleBreaker));
        let diagnostics = plan.diagnostics_for(&pair.unit);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code(), "W-OWNERSHIP-002");
        assert!(!diagnostics[0].is_error());
    }

    #[test]
    fn test_self_reference_is_allowed() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let node = b.class("p", "Node");
        let next = b.field(node, "next", TypeRef::Declared(node));
        let mut unit = CompilationUnit::new("p/Node.src", "p")
            .with_type(TypeDecl::new(node).with_member(builder::field_member(next, None)));

        let plan = OwnershipPlan::resolve(&cache, [&unit]);
        assert!(plan.findings().is_empty());
        assert_eq!(plan.kind_of(next), Some(OwnershipKind::Owned));

        let diagnostics = plan.annotate_unit(&cache, &mut unit, MemoryModel::ReferenceCounting);
        assert!(diagnostics.is_empty());
        let decl = &unit.types[0];
        assert_eq!(decl.field(next).unwrap().meta.ownership, Some(OwnershipKind::Owned));
        assert_eq!(decl.destructor().unwrap().steps, vec![TeardownStep::Release(next)]);
    }

    #[test]
    fn test_three_type_cycle_keeps_one_owning_edge() {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let a = b.class("p", "A");
        let bb = b.class("p", "B");
        let c = b.class("p", "C");
        let ab = b.annotated_field(a, "b", TypeRef::Declared(bb), FieldAnnotation::RetainedWith);
        let bc = b.field(bb, "c", TypeRef::Declared(c));
        let ca = b.field(c, "a", TypeRef::Declared(a));
        let unit = CompilationUnit::new("p/Ring.src", "p")
            .with_type(TypeDecl::new(a).with_member(builder::field_member(ab, None)))
            .with_type(TypeDecl::new(bb).with_member(builder::field_member(bc, None)))
            .with_type(TypeDecl::new(c).with_member(builder::field_member(ca, None)));

        let plan = OwnershipPlan::resolve(&cache, [&unit]);
        assert!(plan.findings().is_empty());
        let kinds: Vec<_> = [ab, bc, ca].iter().map(|f| plan.kind_of(*f)).collect();
        assert_eq!(
            kinds,
            vec![
                Some(OwnershipKind::Owned),
                Some(OwnershipKind::CycleBreaker),
                Some(OwnershipKind::CycleBreaker)
            ]
        );
    }

    #[test]
    fn test_self_reference_inside_larger_cycle_stays_owned() {
        // List.head -> Node, Node.next -> Node, Node.owner -> List
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let list = b.class("p", "List");
        let node = b.class("p", "Node");
        let head = b.annotated_field(list, "head", TypeRef::Declared(node), FieldAnnotation::RetainedWith);
        let next = b.field(node, "next", TypeRef::Declared(node));
        let owner = b.field(node, "owner", TypeRef::Declared(list));
        let unit = CompilationUnit::new("p/List.src", "p")
            .with_type(TypeDecl::new(list).with_member(builder::field_member(head, None)))
            .with_type(
                TypeDecl::new(node)
                    .with_member(builder::field_member(next, None))
                    .with_member(builder::field_member(owner, None)),
            );

        let plan = OwnershipPlan::resolve(&cache, [&unit]);
        assert!(plan.findings().is_empty());
        assert_eq!(plan.broken_cycles(), 1);
        assert_eq!(plan.kind_of(head), Some(OwnershipKind::Owned));
        assert_eq!(plan.kind_of(next), Some(OwnershipKind::Owned));
        assert_eq!(plan.kind_of(owner), Some(OwnershipKind::CycleBreaker));
    }

    struct Inherited {
        cache: BindingCache,
        unit: CompilationUnit,
        base_child: BindingId,
        child_parent: BindingId,
    }

    /// Derived inherits Base.child and Child points back at Derived
    fn inherited_cycle(base_ann: Option<FieldAnnotation>) -> Inherited {
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let base = b.class("p", "Base");
        let derived = b.subclass("p", "Derived", base);
        let child = b.class("p", "Child");
        let base_child = match base_ann {
            Some(a) => b.annotated_field(base, "child", TypeRef::Declared(child), a),
            None => b.field(base, "child", TypeRef::Declared(child)),
        };
        let child_parent = b.field(child, "parent", TypeRef::Declared(derived));
        let unit = CompilationUnit::new("p/Tree.src", "p")
            .with_type(TypeDecl::new(base).with_member(builder::field_member(base_child, None)))
            .with_type(TypeDecl::new(derived))
            .with_type(TypeDecl::new(child).with_member(builder::field_member(child_parent, None)));
        Inherited {
            cache,
            unit,
            base_child,
            child_parent,
        }
    }

    #[test]
    fn test_cycle_through_inherited_field_is_reported() {
        let tree = inherited_cycle(None);
        let plan = OwnershipPlan::resolve(&tree.cache, [&tree.unit]);
        let diagnostics = plan.diagnostics_for(&tree.unit);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code(), "E-OWNERSHIP-001");
        assert_eq!(
            diagnostics[0].related,
            vec!["p.Child".to_string(), "p.Derived".to_string()]
        );
    }

    #[test]
    fn test_cycle_through_inherited_field_is_broken() {
        let tree = inherited_cycle(Some(FieldAnnotation::RetainedWith));
        let plan = OwnershipPlan::resolve(&tree.cache, [&tree.unit]);
        assert!(plan.findings().is_empty());
        assert_eq!(plan.broken_cycles(), 1);
        assert_eq!(plan.kind_of(tree.base_child), Some(OwnershipKind::Owned));
        assert_eq!(plan.kind_of(tree.child_parent), Some(OwnershipKind::CycleBreaker));
    }

    #[test]
    fn test_cycle_through_interface_implementor_is_broken() {
        // Button.listener: Listener, Dialog implements Listener, Dialog.button: Button
        let cache = BindingCache::new();
        let b = ProgramBuilder::new(&cache);
        let listener = b.interface("ui", "Listener");
        let button = b.class("ui", "Button");
        let dialog = b.implementing("ui", "Dialog", &[listener]);
        let button_listener = b.field(button, "listener", TypeRef::Declared(listener));
        let dialog_button = b.annotated_field(
            dialog,
            "button",
            TypeRef::Declared(button),
            FieldAnnotation::RetainedWith,
        );
        let unit = CompilationUnit::new("ui/Dialog.src", "ui")
            .with_type(TypeDecl::new(listener))
            .with_type(TypeDecl::new(button).with_member(builder::field_member(button_listener, None)))
            .with_type(TypeDecl::new(dialog).with_member(builder::field_member(dialog_button, None)));

        let plan = OwnershipPlan::resolve(&cache, [&unit]);
        assert!(plan.findings().is_empty());
        assert_eq!(plan.broken_cycles(), 1);
        assert_eq!(plan.kind_of(dialog_button), Some(OwnershipKind::Owned));
        assert_eq!(plan.kind_of(button_listener), Some(OwnershipKind::CycleBreaker));
    }
}
