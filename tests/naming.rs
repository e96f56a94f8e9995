//! Name table properties over whole batches

mod common;

use std::collections::BTreeMap;

use common::fixtures::{self, Batch};
use transarc::driver::BatchConfig;
use transarc::names::{NameTable, PackagePrefixes};

fn shared_prefix_config() -> BatchConfig {
    BatchConfig {
        package_prefixes: PackagePrefixes::new().with("x", "P").with("y", "P"),
        ..fixtures::config()
    }
}

/// Qualified origin to assigned identifier after a full run
fn names_after_run(batch: Batch) -> BTreeMap<String, String> {
    let session =
        transarc::driver::BatchSession::new(shared_prefix_config(), batch.cache).unwrap();
    let emitter = transarc::driver::MemoryEmitter::new();
    let report = session.run(batch.inputs, &emitter).unwrap();
    assert!(!report.has_failures(), "{:?}", report);
    session
        .names()
        .into_iter()
        .map(|(id, name)| (session.cache().qualified_of(id), name))
        .collect()
}

#[test]
fn registration_is_idempotent_for_every_binding() {
    common::init_logging();
    let batch = fixtures::colliding_names();
    let mut table = NameTable::new(PackagePrefixes::new().with("x", "P").with("y", "P"));
    let bindings = batch.cache.snapshot();
    let first: Vec<String> = bindings
        .iter()
        .map(|b| table.register(&batch.cache, b.id).unwrap())
        .collect();
    let second: Vec<String> = bindings
        .iter()
        .map(|b| table.register(&batch.cache, b.id).unwrap())
        .collect();
    assert_eq!(first, second);
    assert_eq!(table.len(), bindings.len());
}

#[test]
fn disambiguation_is_deterministic_across_runs() {
    common::init_logging();
    let first = names_after_run(fixtures::colliding_names());
    let second = names_after_run(fixtures::colliding_names());
    assert_eq!(first, second);

    let x = &first["x.Node"];
    let y = &first["y.Node"];
    assert_eq!(x, "PNode");
    assert_ne!(x, y);
    assert!(y.starts_with("PNode_"));
}

#[test]
fn emitted_declarations_carry_their_names() {
    let batch = fixtures::colliding_names();
    let y = batch.id("y.Node");
    let get = batch.id("y.Node#get(int)");
    let (report, emitted) = fixtures::translate(batch, shared_prefix_config());
    assert!(!report.has_failures());
    let decl = common::assertions::emitted_type(&emitted, y);
    let name = decl.meta.target_name.as_deref().unwrap();
    assert!(name.starts_with("PNode_"));
    let get = decl.method(get).unwrap();
    assert_eq!(get.meta.target_name.as_deref(), Some("getWithInt:"));
}
