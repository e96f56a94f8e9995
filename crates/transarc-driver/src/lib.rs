//! Transarc Driver - batch translation
//!
//! A [`BatchSession`] owns everything shared by the units of one batch: the
//! binding cache, the name table and the loaded dead-code map. Running it
//! moves the units through the stages in order, with a barrier between
//! stages:
//!
//! 1. rewrite pipeline (parallel per unit)
//! 2. ownership resolution (batch-wide plan, parallel annotation)
//! 3. dead-code filter (batch-wide)
//! 4. name assignment (serial, in plan order)
//! 5. import resolution (per generation unit)
//! 6. emission (parallel per generation unit)
//!
//! Problems are recorded per unit in the [`BatchReport`]; only conditions
//! that invalidate the whole run surface as a [`DriverError`].

mod bundle;
mod config;
mod emit;
mod error;
mod pool;
mod report;
mod session;

pub use bundle::{FrontendBundle, Input};
pub use config::{BatchConfig, ConfigError, DEFAULT_MAX_BATCH_SIZE};
pub use emit::{Emitter, FinalizedUnit, ManifestEmitter, MemoryEmitter};
pub use error::DriverError;
pub use report::{BatchReport, Stage, UnitReport, UnitStatus};
pub use session::BatchSession;

pub use transarc_imports::{GenerationUnit, ImportEntry, ImportSet, ImportSets};
pub use transarc_ownership::MemoryModel;
