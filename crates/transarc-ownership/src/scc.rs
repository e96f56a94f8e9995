//! Tarjan's strongly connected components over the ownership graph

use crate::OwnershipGraph;

/// Components of the graph, each listed in discovery order
///
/// Components come out in reverse topological order: a component is emitted
/// before any component that owns into it.
pub fn strongly_connected(graph: &OwnershipGraph) -> Vec<Vec<usize>> {
    let mut tarjan = Tarjan {
        graph,
        index: vec![None; graph.len()],
        lowlink: vec![0; graph.len()],
        on_stack: vec![false; graph.len()],
        stack: Vec::new(),
        next: 0,
        components: Vec::new(),
    };
    for node in 0..graph.len() {
        if tarjan.index[node].is_none() {
            tarjan.visit(node);
        }
    }
    tarjan.components
}

struct Tarjan<'g> {
    graph: &'g OwnershipGraph,
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next: usize,
    components: Vec<Vec<usize>>,
}

impl Tarjan<'_> {
    fn visit(&mut self, node: usize) {
        self.index[node] = Some(self.next);
        self.lowlink[node] = self.next;
        self.next += 1;
        self.stack.push(node);
        self.on_stack[node] = true;

        let successors: Vec<usize> = self.graph.successors(node).collect();
        for succ in successors {
            match self.index[succ] {
                None => {
                    self.visit(succ);
                    self.lowlink[node] = self.lowlink[node].min(self.lowlink[succ]);
                }
                Some(succ_index) if self.on_stack[succ] => {
                    self.lowlink[node] = self.lowlink[node].min(succ_index);
                }
                Some(_) => {}
            }
        }

        if Some(self.lowlink[node]) == self.index[node] {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack[member] = false;
                component.push(member);
                if member == node {
                    break;
                }
            }
            component.reverse();
            self.components.push(component);
        }
    }
}
