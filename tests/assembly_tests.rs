mod common;

use common::fixtures::dispatcher;
use wellbatch_core::{
    Assembly, Batch, BatchError, BatchIndex, BatchStatus, ComponentStore, ExecutionMode,
    FailureKind, ItemOutcome,
};

fn abc_batch() -> Batch<String> {
    let index = BatchIndex::new(vec!["A".to_string(), "B".to_string(), "C".to_string()]).unwrap();
    let store = ComponentStore::new()
        .with("depth", vec![100.0_f64, 200.0, 300.0])
        .with("field", vec!["north", "south", "east"]);
    Batch::from_preloaded(index, store, dispatcher(3)).unwrap()
}

#[test]
fn test_filtering_removes_skipped_item_everywhere() {
    let mut batch = abc_batch();
    let status = batch
        .apply_filtered(&["value"], ExecutionMode::Threads, |_, key| match key.as_str() {
            "A" => ItemOutcome::skip("malformed"),
            "B" => ItemOutcome::Success((5,)),
            _ => ItemOutcome::Success((7,)),
        })
        .unwrap();

    assert_eq!(status, BatchStatus::Assembled { kept: 2, dropped: 1 });
    assert_eq!(batch.keys(), &["B", "C"]);
    assert!(!batch.index().contains(&"A".to_string()));
    assert_eq!(batch.component::<i32>("value").unwrap(), &[5, 7]);
    assert_eq!(batch.component::<f64>("depth").unwrap(), &[200.0, 300.0]);
    assert_eq!(batch.component::<&str>("field").unwrap(), &["south", "east"]);
    assert!(batch.components().check_aligned(batch.len()).is_ok());
}

#[test]
fn test_all_skipped_signals_empty_batch() {
    let mut batch = abc_batch();
    let status = batch
        .apply_filtered(&["value"], ExecutionMode::Sequential, |_, _| {
            ItemOutcome::<(i32,)>::skip("nothing usable")
        })
        .unwrap();

    assert_eq!(status, BatchStatus::Empty);
    assert_eq!(batch.len(), 3);
    assert!(!batch.components().contains("value"));
}

#[test]
fn test_hard_failure_leaves_batch_untouched() {
    let mut batch = abc_batch();
    let index_before = batch.keys().to_vec();

    let err = batch
        .apply_filtered(&["depth", "value"], ExecutionMode::Threads, |_, key| match key.as_str() {
            "A" => ItemOutcome::Success((1.0_f64, 1)),
            "B" => panic!("cannot parse {key}"),
            _ => ItemOutcome::skip("dropped"),
        })
        .unwrap_err();

    let BatchError::AssemblyFailed { failures } = &err else {
        panic!("expected an assembly failure, got {err:?}");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind(), FailureKind::Panic);
    assert_eq!(failures[0].origin().unwrap().key, "\"B\"");

    assert_eq!(batch.keys(), index_before.as_slice());
    assert_eq!(batch.component::<f64>("depth").unwrap(), &[100.0, 200.0, 300.0]);
    assert!(!batch.components().contains("value"));
}

#[test]
fn test_tuple_assembly_splits_values() {
    let mut batch = abc_batch();
    batch
        .apply_tuple(&["top", "label"], ExecutionMode::Threads, |b, key| {
            let depth = *b.item::<f64>("depth", key).unwrap();
            ItemOutcome::Success((depth - 50.0, key.to_lowercase()))
        })
        .unwrap();

    assert_eq!(batch.component::<f64>("top").unwrap(), &[50.0, 150.0, 250.0]);
    assert_eq!(batch.component::<String>("label").unwrap(), &["a", "b", "c"]);
}

#[test]
fn test_single_assembly_overwrites_in_place() {
    let mut batch = abc_batch();
    batch
        .apply_single("depth", ExecutionMode::Sequential, |b, key| {
            ItemOutcome::Success(b.item::<f64>("depth", key).unwrap() * 2.0)
        })
        .unwrap();
    assert_eq!(batch.component::<f64>("depth").unwrap(), &[200.0, 400.0, 600.0]);
}

#[test]
fn test_target_count_is_checked_before_dispatch() {
    let mut batch = abc_batch();
    let result = batch.apply_tuple(&["only"], ExecutionMode::Threads, |_, _| {
        ItemOutcome::Success((1, 2))
    });
    assert!(matches!(result, Err(BatchError::ContractViolation(_))));
}

#[test]
fn test_assemble_precomputed_results() {
    let mut batch = abc_batch();
    let results = batch
        .dispatch(ExecutionMode::Threads, |_, key| {
            if key == "C" {
                ItemOutcome::skip("short")
            } else {
                ItemOutcome::Success((key.len(),))
            }
        })
        .unwrap();
    let status = batch.assemble(Assembly::Filtering, results, &["len"]).unwrap();
    assert_eq!(status.dropped(), 1);
    assert_eq!(batch.keys(), &["A", "B"]);

    let results = batch
        .dispatch(ExecutionMode::Sequential, |_, _| ItemOutcome::<(u8,)>::skip("late"))
        .unwrap();
    let err = batch.assemble(Assembly::Single, results, &["late"]).unwrap_err();
    assert_eq!(err.failures().len(), 2);
}
