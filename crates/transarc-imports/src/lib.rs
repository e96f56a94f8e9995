//! Transarc Imports - dependency resolution for emitted files
//!
//! Every generation unit is emitted as a declaration file and a definition
//! file. This crate decides, for each of the two, which declarations must be
//! fully imported (their layout is needed) and which only need a forward
//! declaration, and rejects layout dependencies that form a cycle.

mod cycle;
mod generation;
mod graph;
mod headers;
mod resolve;

pub use cycle::find_cycles;
pub use generation::{output_name, GenerationUnit};
pub use graph::{declaration_references, layout_targets, DependencyGraph, EdgeKind, LayoutCycle};
pub use headers::HeaderResolver;
pub use resolve::{ImportEntry, ImportResolver, ImportSet, ImportSets};
