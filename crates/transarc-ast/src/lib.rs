//! Transarc AST - resolved program model
//!
//! This crate defines the typed AST handed over by the front end, the
//! binding table every later stage resolves names through, the metadata
//! slots passes attach to declarations, and the per-unit diagnostics.

mod span;
mod types;
mod binding;
mod cache;
mod metadata;
mod expr;
mod stmt;
mod decl;
mod diagnostic;

pub mod builder;
pub mod fold;
pub mod printer;
pub mod references;
pub mod visit;

pub use span::*;
pub use types::*;
pub use binding::*;
pub use cache::*;
pub use metadata::*;
pub use expr::*;
pub use stmt::*;
pub use decl::*;
pub use diagnostic::*;

pub use fold::Folder;
pub use visit::Visitor;
