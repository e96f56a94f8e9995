//! Transarc - translate garbage-collected object programs to reference counting
//!
//! This is the root workspace crate that provides integration tests.
//! The implementation lives in the workspace member crates.

pub use transarc_ast as ast;
pub use transarc_deadcode as deadcode;
pub use transarc_driver as driver;
pub use transarc_imports as imports;
pub use transarc_names as names;
pub use transarc_ownership as ownership;
pub use transarc_rewrite as rewrite;
