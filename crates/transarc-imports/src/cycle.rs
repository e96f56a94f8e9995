//! Cycle detection over an adjacency list

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    NotVisited,
    InProgress,
    Completed,
}

/// Cycles found by depth-first search, each as the list of nodes on it
///
/// Every node lies on at most one reported cycle. With `allow_self`, an edge
/// from a node to itself is ignored.
pub fn find_cycles(adjacency: &[Vec<usize>], allow_self: bool) -> Vec<Vec<usize>> {
    let mut state = vec![VisitState::NotVisited; adjacency.len()];
    let mut path = Vec::new();
    let mut cycles = Vec::new();
    for node in 0..adjacency.len() {
        if state[node] == VisitState::NotVisited {
            visit(adjacency, allow_self, node, &mut state, &mut path, &mut cycles);
        }
    }
    cycles
}

fn visit(
    adjacency: &[Vec<usize>],
    allow_self: bool,
    node: usize,
    state: &mut [VisitState],
    path: &mut Vec<usize>,
    cycles: &mut Vec<Vec<usize>>,
) {
    state[node] = VisitState::InProgress;
    path.push(node);
    for &next in &adjacency[node] {
        if next == node && allow_self {
            continue;
        }
        match state[next] {
            VisitState::InProgress => {
                if let Some(start) = path.iter().position(|n| *n == next) {
                    cycles.push(path[start..].to_vec());
                }
            }
            VisitState::NotVisited => visit(adjacency, allow_self, next, state, path, cycles),
            VisitState::Completed => {}
        }
    }
    path.pop();
    state[node] = VisitState::Completed;
}
