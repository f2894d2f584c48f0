//! Engine-level tests for `NativeEngine`.

use super::NativeEngine;
use crate::boundary::{EmbeddingBatch, KnnRequest, KnnResponse, LabelBuffer, QueryBuffer};
use crate::distance::Space;
use crate::engine::{Engine, EngineConfig, EngineError};
use std::path::PathBuf;
use tempfile::tempdir;

fn config(space: Space, capacity: usize, location: Option<PathBuf>) -> EngineConfig {
    EngineConfig {
        metric: space.engine_metric(),
        dimension: 0,
        max_elements: capacity,
        min_capacity: 0,
        graph_degree: 16,
        ef_construction: 100,
        num_threads: 2,
        persist_location: location,
    }
}

fn engine(capacity: usize) -> NativeEngine {
    let mut engine = NativeEngine::create(config(Space::L2, capacity, None)).unwrap();
    engine.init().unwrap();
    engine
}

#[allow(clippy::cast_precision_loss)]
fn insert(engine: &mut NativeEngine, labels: &[u64], replace: bool) -> Result<(), EngineError> {
    let vectors: Vec<Vec<f32>> = labels
        .iter()
        .map(|&l| vec![l as f32, (l * 2) as f32, 1.0])
        .collect();
    let batch = EmbeddingBatch::pack(&vectors, labels, 3).unwrap();
    engine.insert_batch(&batch, replace)
}

fn delete(engine: &mut NativeEngine, labels: &[u64]) -> Result<(), EngineError> {
    engine.mark_deleted(&LabelBuffer::pack(labels).unwrap())
}

fn knn(engine: &NativeEngine, query: Vec<f32>, k: usize) -> Vec<u64> {
    let queries = QueryBuffer::pack(&[query], 3).unwrap();
    let request = KnnRequest {
        queries: &queries,
        k,
        ef: 50,
        filter: None,
    };
    let mut response = KnnResponse::allocate(k, 1).unwrap();
    engine.search(&request, &mut response).unwrap();
    response.into_rows()[0].iter().map(|n| n.label).collect()
}

#[test]
fn test_operations_before_init_fail() {
    let mut engine = NativeEngine::create(config(Space::L2, 4, None)).unwrap();
    assert!(matches!(
        insert(&mut engine, &[1], false),
        Err(EngineError::NotInitialized)
    ));
    assert_eq!(engine.counts().capacity, 4);
    assert!(engine.labels(false).is_empty());
}

#[test]
fn test_init_is_idempotent() {
    let mut engine = engine(4);
    insert(&mut engine, &[1, 2], false).unwrap();
    engine.init().unwrap();
    assert_eq!(engine.counts().total, 2);
}

#[test]
fn test_first_insert_fixes_dimension() {
    let mut engine = engine(8);
    insert(&mut engine, &[1], false).unwrap();
    assert_eq!(engine.params().dimension, 3);

    let batch = EmbeddingBatch::pack(&[vec![1.0, 2.0]], &[2], 2).unwrap();
    assert!(matches!(
        engine.insert_batch(&batch, false),
        Err(EngineError::DimensionMismatch {
            expected: 3,
            actual: 2
        })
    ));
}

#[test]
fn test_duplicate_against_stored_label_rejects_whole_batch() {
    let mut engine = engine(8);
    insert(&mut engine, &[1, 2], false).unwrap();

    let err = insert(&mut engine, &[3, 2], false).unwrap_err();
    assert!(matches!(err, EngineError::DuplicateLabel(2)));
    assert_eq!(engine.labels(false), vec![1, 2]);
}

#[test]
fn test_capacity_is_enforced_before_insert() {
    let mut engine = engine(2);
    insert(&mut engine, &[1], false).unwrap();

    let err = insert(&mut engine, &[2, 3], false).unwrap_err();
    assert!(matches!(
        err,
        EngineError::CapacityExhausted {
            capacity: 2,
            required: 3
        }
    ));
    assert_eq!(engine.counts().total, 1);
}

#[test]
fn test_mark_deleted_accounting() {
    let mut engine = engine(8);
    insert(&mut engine, &[1, 2, 3], false).unwrap();
    delete(&mut engine, &[2]).unwrap();

    let counts = engine.counts();
    assert_eq!(counts.total, 3);
    assert_eq!(counts.deleted, 1);
    assert_eq!(counts.active(), 2);
    assert_eq!(engine.labels(true), vec![1, 3]);
    assert_eq!(engine.labels(false), vec![1, 2, 3]);
}

#[test]
fn test_mark_deleted_errors_leave_state() {
    let mut engine = engine(8);
    insert(&mut engine, &[1, 2], false).unwrap();

    assert!(matches!(
        delete(&mut engine, &[1, 9]),
        Err(EngineError::LabelNotFound(9))
    ));
    assert_eq!(engine.counts().deleted, 0);

    delete(&mut engine, &[1]).unwrap();
    assert!(matches!(
        delete(&mut engine, &[1]),
        Err(EngineError::AlreadyDeleted(1))
    ));
}

#[test]
fn test_deleted_labels_not_returned() {
    let mut engine = engine(16);
    insert(&mut engine, &[1, 2, 3, 4, 5], false).unwrap();
    delete(&mut engine, &[3]).unwrap();

    let hits = knn(&engine, vec![3.0, 6.0, 1.0], 5);
    assert_eq!(hits.len(), 4);
    assert!(!hits.contains(&3));
}

#[test]
fn test_readding_deleted_label_without_replace_fails() {
    let mut engine = engine(8);
    insert(&mut engine, &[1, 2], false).unwrap();
    delete(&mut engine, &[1]).unwrap();

    assert!(matches!(
        insert(&mut engine, &[1], false),
        Err(EngineError::DuplicateLabel(1))
    ));
}

#[test]
fn test_replace_deleted_revives_label_in_place() {
    let mut engine = engine(2);
    insert(&mut engine, &[1, 2], true).unwrap();
    delete(&mut engine, &[1]).unwrap();

    insert(&mut engine, &[1], true).unwrap();
    let counts = engine.counts();
    assert_eq!(counts.total, 2);
    assert_eq!(counts.deleted, 0);
}

#[test]
fn test_replace_deleted_reuses_slot_without_growth() {
    let mut engine = engine(2);
    insert(&mut engine, &[1, 2], true).unwrap();
    delete(&mut engine, &[1]).unwrap();

    // Capacity is full; the tombstoned slot takes the new label.
    insert(&mut engine, &[7], true).unwrap();
    assert_eq!(engine.labels(false), vec![7, 2]);
    assert_eq!(engine.counts().total, 2);
    assert_eq!(knn(&engine, vec![7.0, 14.0, 1.0], 1), vec![7]);
}

#[test]
fn test_resize_preserves_state() {
    let mut engine = engine(2);
    insert(&mut engine, &[1, 2], false).unwrap();
    delete(&mut engine, &[2]).unwrap();
    engine.resize(10).unwrap();

    assert_eq!(engine.counts().capacity, 10);
    assert_eq!(engine.labels(true), vec![1]);
    insert(&mut engine, &[3, 4, 5], false).unwrap();
    assert_eq!(engine.counts().total, 5);
}

#[test]
fn test_resize_below_count_fails() {
    let mut engine = engine(4);
    insert(&mut engine, &[1, 2, 3], false).unwrap();
    assert!(matches!(
        engine.resize(2),
        Err(EngineError::CapacityExhausted { .. })
    ));
}

#[test]
fn test_fetch_vectors() {
    let mut engine = engine(4);
    insert(&mut engine, &[1, 2], false).unwrap();
    delete(&mut engine, &[2]).unwrap();

    let fetched = engine.fetch_vectors(&LabelBuffer::pack(&[1, 2, 3]).unwrap());
    assert_eq!(fetched[0], Some(vec![1.0, 2.0, 1.0]));
    assert_eq!(fetched[1], None);
    assert_eq!(fetched[2], None);
}

#[test]
fn test_cosine_stores_normalized_vectors() {
    let mut engine = NativeEngine::create(config(Space::Cosine, 4, None)).unwrap();
    engine.init().unwrap();
    let batch = EmbeddingBatch::pack(&[vec![3.0, 4.0]], &[1], 2).unwrap();
    engine.insert_batch(&batch, false).unwrap();

    let fetched = engine.fetch_vectors(&LabelBuffer::pack(&[1]).unwrap());
    let v = fetched[0].as_ref().unwrap();
    assert!((v[0] - 0.6).abs() < 1e-6);
    assert!((v[1] - 0.8).abs() < 1e-6);
}

#[test]
fn test_filter_is_per_call() {
    let mut engine = engine(16);
    insert(&mut engine, &[1, 2, 3, 4, 5, 6], false).unwrap();

    let queries = QueryBuffer::pack(&[vec![1.0, 2.0, 1.0]], 3).unwrap();
    let odd = |label: u64| label % 2 == 1;
    let request = KnnRequest {
        queries: &queries,
        k: 6,
        ef: 50,
        filter: Some(&odd),
    };
    let mut response = KnnResponse::allocate(6, 1).unwrap();
    engine.search(&request, &mut response).unwrap();
    let rows = response.into_rows();
    assert_eq!(rows[0].len(), 3);
    assert!(rows[0].iter().all(|n| n.label % 2 == 1));

    // Next call without a filter sees everything.
    assert_eq!(knn(&engine, vec![1.0, 2.0, 1.0], 6).len(), 6);
}

#[test]
fn test_persist_and_reload() {
    let dir = tempdir().unwrap();
    let location = dir.path().join("engine");
    {
        let mut engine =
            NativeEngine::create(config(Space::L2, 4, Some(location.clone()))).unwrap();
        engine.init().unwrap();
        insert(&mut engine, &[5, 10, 15], false).unwrap();
        delete(&mut engine, &[10]).unwrap();
        engine.persist().unwrap();
    }

    let mut engine = NativeEngine::create(config(Space::L2, 2, Some(location))).unwrap();
    engine.init().unwrap();
    let counts = engine.counts();
    assert_eq!(counts.total, 3);
    assert_eq!(counts.deleted, 1);
    // Persisted capacity wins over a smaller configured one.
    assert_eq!(counts.capacity, 4);
    assert_eq!(engine.params().dimension, 3);
    assert_eq!(knn(&engine, vec![15.0, 30.0, 1.0], 1), vec![15]);
}

#[test]
fn test_reload_applies_capacity_floor() {
    let dir = tempdir().unwrap();
    let location = dir.path().join("engine");
    {
        let mut engine =
            NativeEngine::create(config(Space::L2, 2, Some(location.clone()))).unwrap();
        engine.init().unwrap();
        insert(&mut engine, &[1], false).unwrap();
        engine.persist().unwrap();
    }

    let mut floored = config(Space::L2, 2, Some(location));
    floored.min_capacity = 50;
    let mut engine = NativeEngine::create(floored).unwrap();
    engine.init().unwrap();
    assert_eq!(engine.counts().capacity, 50);
}

#[test]
fn test_reload_ignores_larger_configured_capacity() {
    let dir = tempdir().unwrap();
    let location = dir.path().join("engine");
    {
        let mut engine =
            NativeEngine::create(config(Space::L2, 3, Some(location.clone()))).unwrap();
        engine.init().unwrap();
        insert(&mut engine, &[1, 2], false).unwrap();
        engine.persist().unwrap();
    }

    let mut engine = NativeEngine::create(config(Space::L2, 500, Some(location))).unwrap();
    engine.init().unwrap();
    assert_eq!(engine.counts().capacity, 3);
    assert_eq!(engine.params().max_elements, 3);
}

#[test]
fn test_fresh_engine_applies_capacity_floor() {
    let mut floored = config(Space::L2, 4, None);
    floored.min_capacity = 10;
    let mut engine = NativeEngine::create(floored).unwrap();
    engine.init().unwrap();
    assert_eq!(engine.counts().capacity, 10);
}

#[test]
fn test_persist_without_location_is_noop() {
    let mut engine = engine(2);
    insert(&mut engine, &[1], false).unwrap();
    engine.persist().unwrap();
}
