//! Analyses shared by the rewrite passes

mod captures;

pub use captures::{captured_locals, enclosing_chain, uses_enclosing_instance};
