//! Transarc Names - target identifier assignment
//!
//! The name table is shared by every unit of a batch. Registration is
//! idempotent per binding; collisions inside a namespace are resolved by a
//! deterministic hash suffix, and a collision that survives the suffix fails
//! the run.

mod annotate;
mod error;
mod prefixes;
mod reserved;
mod table;

pub use annotate::assign_unit;
pub use error::NameError;
pub use prefixes::{camel_case_package, capitalize, PackagePrefixes};
pub use reserved::is_reserved;
pub use table::{disambiguator, NameScope, NameTable, INIT_NAME};
