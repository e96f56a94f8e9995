//! Batch session: shared state and stage scheduling

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info, warn};
use transarc_ast::{has_errors, BindingCache, BindingId, CompilationUnit, Diagnostic};
use transarc_deadcode::{DeadCodeFilter, DeadCodeMap};
use transarc_imports::{output_name, GenerationUnit, HeaderResolver, ImportResolver, ImportSets};
use transarc_names::{assign_unit, NameTable};
use transarc_ownership::OwnershipPlan;
use transarc_rewrite::{PassContext, Pipeline};

use crate::pool::WorkerPool;
use crate::{
    BatchConfig, BatchReport, DriverError, Emitter, FinalizedUnit, FrontendBundle, Input, Stage,
    UnitReport, UnitStatus,
};

/// A unit on its way through the stages
struct Slot {
    input: usize,
    report: UnitReport,
    /// `None` once the unit failed, was skipped or was pruned
    unit: Option<CompilationUnit>,
}

struct StageResult {
    unit: CompilationUnit,
    diagnostics: Vec<Diagnostic>,
    failed: bool,
}

/// State shared by every unit of a batch
///
/// Created once per batch and dropped when the batch is done. The name
/// table persists across [`run`](Self::run) calls on the same session, so
/// names stay stable for units translated in several runs.
pub struct BatchSession {
    config: BatchConfig,
    cache: Arc<BindingCache>,
    names: Mutex<NameTable>,
    dead_code: Option<DeadCodeFilter>,
    pipeline: Pipeline,
}

impl BatchSession {
    pub fn new(config: BatchConfig, cache: BindingCache) -> Result<Self, DriverError> {
        config.validate()?;
        let dead_code = match &config.dead_code_map {
            Some(path) => Some(DeadCodeFilter::new(DeadCodeMap::load(path)?)),
            None => None,
        };
        info!(
            "batch session: {} binding(s), {} worker(s), {:?}",
            cache.len(),
            config.workers,
            config.memory_model
        );
        Ok(Self {
            names: Mutex::new(NameTable::new(config.package_prefixes.clone())),
            cache: Arc::new(cache),
            dead_code,
            pipeline: Pipeline::standard(),
            config,
        })
    }

    /// Session over a front-end bundle, returning the bundle's inputs
    pub fn from_bundle(
        config: BatchConfig,
        bundle: FrontendBundle,
    ) -> Result<(Self, Vec<Input>), DriverError> {
        let cache = BindingCache::from_bindings(bundle.bindings)?;
        Ok((Self::new(config, cache)?, bundle.inputs))
    }

    /// Replace the reachability map loaded from the config
    pub fn with_dead_code_map(mut self, map: DeadCodeMap) -> Self {
        self.dead_code = Some(DeadCodeFilter::new(map));
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn cache(&self) -> &BindingCache {
        &self.cache
    }

    /// Identifiers assigned so far
    pub fn names(&self) -> BTreeMap<BindingId, String> {
        self.lock_names().entries()
    }

    fn lock_names(&self) -> std::sync::MutexGuard<'_, NameTable> {
        // Registration either completes or returns before touching the map,
        // so the table is consistent even after a panic elsewhere.
        self.names.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pool(&self) -> WorkerPool {
        WorkerPool::new(
            self.config.workers,
            self.config.max_batch_size,
            self.config.fail_fast,
        )
    }

    /// Translate the inputs and hand every finalized unit to the emitter
    ///
    /// Unit-level problems end up in the report. Only a name collision that
    /// cannot be resolved aborts the run.
    pub fn run(&self, inputs: Vec<Input>, emitter: &dyn Emitter) -> Result<BatchReport, DriverError> {
        let mut slots = Vec::new();
        let mut input_names = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.into_iter().enumerate() {
            input_names.push(input.name);
            for unit in input.units {
                slots.push(Slot {
                    input: index,
                    report: UnitReport::new(unit.path.clone()),
                    unit: Some(unit),
                });
            }
        }
        info!("translating {} unit(s) from {} input(s)", slots.len(), input_names.len());
        let mut report = BatchReport::default();

        self.rewrite(&mut slots);
        self.resolve_ownership(&mut slots, &mut report);
        self.filter_dead_code(&mut slots, &mut report);
        self.assign_names(&mut slots)?;
        let generation_units = self.plan_generation_units(&mut slots, &input_names);
        let finalized = self.resolve_imports(&mut slots, generation_units);
        self.emit(&mut slots, finalized, emitter);

        report.units = slots.into_iter().map(|slot| slot.report).collect();
        info!("{}", report.summary());
        Ok(report)
    }

    fn rewrite(&self, slots: &mut [Slot]) {
        let cache: &BindingCache = &self.cache;
        self.parallel_stage(slots, Stage::Rewrite, |unit| {
            let mut ctx = PassContext::new(cache, unit.path.clone());
            let outcome = self.pipeline.run(unit, &mut ctx);
            StageResult {
                failed: !outcome.succeeded(),
                unit: outcome.unit,
                diagnostics: ctx.take_diagnostics(),
            }
        });
    }

    /// One plan over the whole batch, so cycles spanning units are seen,
    /// then per-unit annotation
    fn resolve_ownership(&self, slots: &mut [Slot], report: &mut BatchReport) {
        if self.stop_scheduling(slots) {
            return;
        }
        let cache: &BindingCache = &self.cache;
        let plan = OwnershipPlan::resolve(cache, slots.iter().filter_map(|s| s.unit.as_ref()));
        report.broken_cycles = plan.broken_cycles();
        debug!(
            "ownership plan: {} cycle(s) broken, {} finding(s)",
            plan.broken_cycles(),
            plan.findings().len()
        );
        let model = self.config.memory_model;
        self.parallel_stage(slots, Stage::Ownership, |mut unit| {
            let diagnostics = plan.annotate_unit(cache, &mut unit, model);
            StageResult {
                failed: has_errors(&diagnostics),
                unit,
                diagnostics,
            }
        });
    }

    fn filter_dead_code(&self, slots: &mut [Slot], report: &mut BatchReport) {
        let Some(filter) = &self.dead_code else { return };
        if self.stop_scheduling(slots) {
            return;
        }
        let (owners, mut units) = take_live(slots);
        let pruned = filter.apply(&self.cache, &mut units);
        report.pruned_types = pruned.types;
        report.pruned_members = pruned.members;
        for (index, unit) in owners.into_iter().zip(units) {
            let slot = &mut slots[index];
            if unit.types.is_empty() {
                debug!("{}: every declaration pruned", slot.report.path);
                slot.report.status = UnitStatus::Pruned;
            } else {
                slot.unit = Some(unit);
            }
        }
    }

    /// Serial and in input order, so identifiers do not depend on
    /// scheduling
    fn assign_names(&self, slots: &mut [Slot]) -> Result<(), DriverError> {
        if self.stop_scheduling(slots) {
            return Ok(());
        }
        let mut names = self.lock_names();
        for slot in slots.iter_mut() {
            if let Some(unit) = slot.unit.as_mut() {
                assign_unit(&mut names, &self.cache, unit)?;
            }
        }
        debug!("name table holds {} identifier(s)", names.len());
        Ok(())
    }

    /// Generation units with the slots each one holds
    fn plan_generation_units(
        &self,
        slots: &mut [Slot],
        input_names: &[String],
    ) -> Vec<(GenerationUnit, Vec<usize>)> {
        let (owners, units) = take_live(slots);
        let mut planned: Vec<(GenerationUnit, Vec<usize>)> = Vec::new();
        if self.config.combine_inputs {
            let mut by_input: BTreeMap<usize, (Vec<CompilationUnit>, Vec<usize>)> = BTreeMap::new();
            for (index, unit) in owners.into_iter().zip(units) {
                let entry = by_input.entry(slots[index].input).or_default();
                entry.0.push(unit);
                entry.1.push(index);
            }
            for (input, (units, members)) in by_input {
                let name = output_name(&input_names[input]);
                planned.push((GenerationUnit::new(name, units), members));
            }
        } else {
            for (index, unit) in owners.into_iter().zip(units) {
                planned.push((GenerationUnit::single(unit), vec![index]));
            }
        }
        planned
    }

    fn resolve_imports(
        &self,
        slots: &mut [Slot],
        planned: Vec<(GenerationUnit, Vec<usize>)>,
    ) -> Vec<(FinalizedUnit, Vec<usize>)> {
        let (generation_units, members): (Vec<GenerationUnit>, Vec<Vec<usize>>) =
            planned.into_iter().unzip();
        let resolver = ImportResolver::new(
            &self.cache,
            &generation_units,
            HeaderResolver::new(self.config.search_paths.clone()),
        );
        let results = self.pool().run(
            (0..generation_units.len()).collect(),
            |index: usize| resolver.resolve(&generation_units[index]),
            |result: &Result<ImportSets, Vec<Diagnostic>>| result.is_err(),
        );

        let mut finalized = Vec::new();
        for ((gen, members), result) in generation_units.into_iter().zip(members).zip(results) {
            match result {
                Some(Ok(imports)) => finalized.push((
                    FinalizedUnit {
                        name: gen.name,
                        units: gen.units,
                        imports,
                    },
                    members,
                )),
                Some(Err(diagnostics)) => {
                    for index in members {
                        let slot = &mut slots[index];
                        let path = slot.report.path.clone();
                        slot.report.status = UnitStatus::Failed(Stage::Imports);
                        slot.report
                            .diagnostics
                            .extend(diagnostics.iter().cloned().map(|d| d.in_unit(path.clone())));
                    }
                }
                None => {}
            }
        }
        finalized
    }

    fn emit(
        &self,
        slots: &mut [Slot],
        finalized: Vec<(FinalizedUnit, Vec<usize>)>,
        emitter: &dyn Emitter,
    ) {
        let (units, members): (Vec<FinalizedUnit>, Vec<Vec<usize>>) = finalized.into_iter().unzip();
        let results = self.pool().run(units, |unit| emitter.emit(&unit), Result::is_err);
        for (members, result) in members.into_iter().zip(results) {
            for index in members {
                let report = &mut slots[index].report;
                match &result {
                    Some(Ok(output)) => {
                        report.status = UnitStatus::Emitted;
                        report.output = Some(output.clone());
                    }
                    Some(Err(err)) => {
                        warn!("{}: emission failed: {}", report.path, err);
                        report.status = UnitStatus::Failed(Stage::Emit);
                        report.error = Some(err.to_string());
                    }
                    None => {}
                }
            }
        }
    }

    /// Run `work` over every live unit on the pool
    fn parallel_stage<W>(&self, slots: &mut [Slot], stage: Stage, work: W)
    where
        W: Fn(CompilationUnit) -> StageResult + Sync,
    {
        if self.stop_scheduling(slots) {
            return;
        }
        let (owners, units) = take_live(slots);
        let results = self.pool().run(units, work, |r: &StageResult| r.failed);
        for (index, result) in owners.into_iter().zip(results) {
            let slot = &mut slots[index];
            match result {
                Some(result) => {
                    slot.report.diagnostics.extend(result.diagnostics);
                    if result.failed {
                        slot.report.status = UnitStatus::Failed(stage);
                    } else {
                        slot.unit = Some(result.unit);
                    }
                }
                None => slot.report.status = UnitStatus::Skipped,
            }
        }
    }

    /// With `fail_fast`, drop every remaining unit once one has failed
    fn stop_scheduling(&self, slots: &mut [Slot]) -> bool {
        if !self.config.fail_fast || !slots.iter().any(|s| s.report.is_failed()) {
            return false;
        }
        for slot in slots.iter_mut().filter(|s| s.unit.is_some()) {
            slot.unit = None;
            slot.report.status = UnitStatus::Skipped;
        }
        true
    }
}

impl Drop for BatchSession {
    fn drop(&mut self) {
        debug!(
            "batch session done: {} binding(s), {} name(s)",
            self.cache.len(),
            self.lock_names().len()
        );
    }
}

/// Move the live units out of their slots, keeping their positions
fn take_live(slots: &mut [Slot]) -> (Vec<usize>, Vec<CompilationUnit>) {
    let mut owners = Vec::new();
    let mut units = Vec::new();
    for (index, slot) in slots.iter_mut().enumerate() {
        if let Some(unit) = slot.unit.take() {
            owners.push(index);
            units.push(unit);
        }
    }
    (owners, units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryEmitter;
    use transarc_ast::builder::{self, ProgramBuilder};
    use transarc_ast::{Expr, ExprKind, Stmt, TypeDecl, TypeRef};

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn config() -> BatchConfig {
        BatchConfig::default().with_workers(2)
    }

    /// `p.A` holds a `p.B`; `p.Broken` uses dynamic class loading
    fn program() -> (BindingCache, Vec<Input>) {
        let cache = BindingCache::new();
        let (a, b_ty, broken, field, run) = {
            let b = ProgramBuilder::new(&cache);
            let a = b.class("p", "A");
            let b_ty = b.class("p", "B");
            let broken = b.class("p", "Broken");
            let field = b.field(a, "b", TypeRef::Declared(b_ty));
            let run = b.method(broken, "run", vec![], TypeRef::Void);
            (a, b_ty, broken, field, run)
        };
        let load = Stmt::expr(Expr::synthetic(
            ExprKind::DynamicLoad {
                name: "p.A".into(),
            },
            TypeRef::Object,
        ));
        let inputs = vec![
            Input::new(
                "p/A.src",
                vec![CompilationUnit::new("p/A.src", "p")
                    .with_type(TypeDecl::new(a).with_member(builder::field_member(field, None)))],
            ),
            Input::new(
                "p/B.src",
                vec![CompilationUnit::new("p/B.src", "p").with_type(TypeDecl::new(b_ty))],
            ),
            Input::new(
                "p/Broken.src",
                vec![CompilationUnit::new("p/Broken.src", "p").with_type(
                    TypeDecl::new(broken).with_member(builder::method_member(run, vec![], vec![load])),
                )],
            ),
        ];
        (cache, inputs)
    }

    #[test]
    fn test_failed_unit_does_not_stop_siblings() {
        init_logging();
        let (cache, inputs) = program();
        let session = BatchSession::new(config(), cache).unwrap();
        let emitter = MemoryEmitter::new();
        let report = session.run(inputs, &emitter).unwrap();

        assert!(report.has_failures());
        let broken = report.unit("p/Broken.src").unwrap();
        assert_eq!(broken.status, UnitStatus::Failed(Stage::Rewrite));
        assert_eq!(broken.diagnostics.len(), 1);
        assert_eq!(broken.diagnostics[0].code(), "E-UNSUPPORTED-001");
        assert_eq!(report.unit("p/A.src").unwrap().status, UnitStatus::Emitted);
        assert_eq!(report.unit("p/B.src").unwrap().status, UnitStatus::Emitted);

        let emitted = emitter.into_units();
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].name, "p/A");
        assert!(emitted[0].imports.declaration.forward.iter().any(|e| e.name == "p.B"));
    }

    #[test]
    fn test_names_recorded_on_emitted_units() {
        let (cache, inputs) = program();
        let config = BatchConfig {
            package_prefixes: transarc_names::PackagePrefixes::new().with("p", "PP"),
            ..config()
        };
        let session = BatchSession::new(config, cache).unwrap();
        let emitter = MemoryEmitter::new();
        session.run(inputs, &emitter).unwrap();

        let units = emitter.into_units();
        let a = &units[0].units[0].types[0];
        assert_eq!(a.meta.target_name.as_deref(), Some("PPA"));
        let a_id = session.cache().lookup("p.A").unwrap();
        assert_eq!(session.names().get(&a_id).map(String::as_str), Some("PPA"));
    }

    #[test]
    fn test_combined_inputs_share_one_output() {
        let (cache, mut inputs) = program();
        inputs.pop();
        let combined = Input::new(
            "p/All.src",
            inputs.into_iter().flat_map(|i| i.units).collect(),
        );
        let config = BatchConfig {
            combine_inputs: true,
            ..config()
        };
        let session = BatchSession::new(config, cache).unwrap();
        let emitter = MemoryEmitter::new();
        let report = session.run(vec![combined], &emitter).unwrap();

        assert_eq!(report.count(UnitStatus::Emitted), 2);
        let units = emitter.into_units();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name, "p/All");
        assert_eq!(units[0].units.len(), 2);
        // Both types live in the same file, so nothing is imported
        assert!(units[0].imports.declaration.is_empty());
    }

    #[test]
    fn test_fail_fast_skips_later_stages() {
        let (cache, inputs) = program();
        let config = BatchConfig {
            fail_fast: true,
            ..config()
        };
        let session = BatchSession::new(config, cache).unwrap();
        let emitter = MemoryEmitter::new();
        let report = session.run(inputs, &emitter).unwrap();

        assert_eq!(report.failed().count(), 1);
        assert_eq!(report.count(UnitStatus::Emitted), 0);
        assert!(emitter.into_units().is_empty());
    }
}
