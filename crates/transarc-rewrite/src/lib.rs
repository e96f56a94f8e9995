//! Transarc rewrite pipeline
//!
//! Ordered, semantics-preserving rewrites that take a resolved unit from the
//! source object model to a shape the reference-counted target can express
//! directly. Each pass consumes the unit and returns a rebuilt one; problems
//! are reported through the [`PassContext`], and an error stops the pipeline
//! for that unit only.

mod context;
mod pipeline;

pub mod analysis;
pub mod passes;

pub use context::{Extraction, PassContext};
pub use pipeline::{Pass, Pipeline, PipelineOutcome};
