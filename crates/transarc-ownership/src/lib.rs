//! Transarc Ownership - reference-counted ownership for translated fields
//!
//! Every reference-typed field of a translated type gets an ownership kind.
//! The resolver builds the static ownership graph of the whole batch (types
//! as nodes, owning fields as edges), finds its strongly connected components
//! and demotes all but the designated owning edge of every multi-type
//! component to a cycle breaker. Each type then receives a synthesized
//! teardown that releases what it owns and clears what breaks a cycle.

mod graph;
mod model;
mod resolve;
mod scc;
mod teardown;

pub use graph::{FieldEdge, OwnershipGraph, OwningEdge};
pub use model::MemoryModel;
pub use resolve::{Finding, OwnershipPlan};
pub use scc::strongly_connected;
pub use teardown::{synthesize_destructor, FINALIZER_NAME};
