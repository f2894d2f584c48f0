//! Lifecycle and persistence tests for `Index`.
//!
//! ```bash
//! cargo test -p vecdex-core --test lifecycle_tests
//! ```

use tempfile::tempdir;
use vecdex_core::config::CONFIG_FILE;
use vecdex_core::{EngineError, Error, Index, IndexConfig, OpenOptions, Space};

fn persisted(path: &std::path::Path, capacity: usize) -> Index {
    Index::create(
        IndexConfig::builder()
            .max_elements(capacity)
            .persist_location(path)
            .build()
            .unwrap(),
    )
    .unwrap()
}

#[test]
fn test_roundtrip_reconstructs_vectors_exactly() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idx");

    let v5 = vec![1.0, 2.0, 3.3, 4.4, 5.0];
    let v10 = vec![5.1, 4.2, 3.3, 2.4, 1.5];
    {
        let index = persisted(&path, 10);
        index.add(&[v5.clone(), v10.clone()], &[5, 10]).unwrap();
        index.persist().unwrap();
        index.close();
    }

    let index: Index = Index::open(&path, &OpenOptions::new()).unwrap();
    let mut ids = index.ids().unwrap();
    ids.sort_unstable();
    assert_eq!(ids, vec![5, 10]);
    assert_eq!(index.get_data(&[5, 10]).unwrap(), vec![v5, v10]);
    assert_eq!(index.dimension(), 5);
}

#[test]
fn test_create_at_existing_path_fails() {
    let dir = tempdir().unwrap();
    let result: Result<Index, _> = Index::create(
        IndexConfig::builder()
            .persist_location(dir.path())
            .build()
            .unwrap(),
    );
    assert!(matches!(result, Err(Error::AlreadyExists(_))));
}

#[test]
fn test_open_missing_path_fails() {
    let dir = tempdir().unwrap();
    let result: Result<Index, _> = Index::open(dir.path().join("nope"), &OpenOptions::new());
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[test]
fn test_open_directory_without_record_fails() {
    let dir = tempdir().unwrap();
    let result: Result<Index, _> = Index::open(dir.path(), &OpenOptions::new());
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[test]
fn test_create_forces_persist_on_write_and_writes_record() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idx");
    let index: Index = Index::create(
        IndexConfig::builder()
            .persist_on_write(false)
            .persist_location(&path)
            .build()
            .unwrap(),
    )
    .unwrap();

    assert!(index.config().persist_on_write);
    let record = std::fs::read_to_string(path.join(CONFIG_FILE)).unwrap();
    assert!(record.contains("\"persistOnWrite\": true"));
    assert!(!record.contains("persistLocation"));
}

#[test]
fn test_persist_on_write_survives_without_explicit_persist() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idx");
    {
        let index = persisted(&path, 4);
        index.add(&[vec![1.0, 0.0], vec![0.0, 1.0]], &[1, 2]).unwrap();
        index.delete(&[2]).unwrap();
        index.close();
    }

    let index: Index = Index::open(&path, &OpenOptions::new()).unwrap();
    assert_eq!(index.element_count().unwrap(), 2);
    assert_eq!(index.active_ids().unwrap(), vec![1]);
    assert_eq!(index.deleted_count().unwrap(), 1);
}

#[test]
fn test_first_add_fixes_dimension_in_record() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idx");
    let index = persisted(&path, 4);
    index.add(&[vec![0.5; 7]], &[1]).unwrap();

    let record = IndexConfig::read_record(&path).unwrap();
    assert_eq!(record.dimension, 7);
}

#[test]
fn test_open_reconciles_stale_record() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idx");
    {
        let index = persisted(&path, 2);
        index
            .add(&[vec![1.0], vec![2.0], vec![3.0]], &[1, 2, 3])
            .unwrap();
        index.close();
    }

    // Simulate drift: an old record that still says capacity 2, no dimension.
    let mut stale = IndexConfig::read_record(&path).unwrap();
    stale.max_elements = 2;
    stale.dimension = 0;
    stale.write_record(&path).unwrap();

    let index: Index = Index::open(&path, &OpenOptions::new()).unwrap();
    assert_eq!(index.max_elements().unwrap(), 3);
    assert_eq!(index.dimension(), 1);

    let rewritten = IndexConfig::read_record(&path).unwrap();
    assert_eq!(rewritten.max_elements, 3);
    assert_eq!(rewritten.dimension, 1);
}

#[test]
fn test_open_ignores_stale_record_larger_than_engine() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idx");
    {
        let index = persisted(&path, 3);
        index.add(&[vec![1.0], vec![2.0]], &[1, 2]).unwrap();
        index.close();
    }

    let mut stale = IndexConfig::read_record(&path).unwrap();
    stale.max_elements = 500;
    stale.write_record(&path).unwrap();

    let index: Index = Index::open(&path, &OpenOptions::new()).unwrap();
    assert_eq!(index.max_elements().unwrap(), 3);
    assert_eq!(index.config().max_elements, 3);
    assert_eq!(IndexConfig::read_record(&path).unwrap().max_elements, 3);
}

#[test]
fn test_persist_leaves_record_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idx");
    let index = persisted(&path, 4);
    index.add(&[vec![1.0, 2.0]], &[1]).unwrap();

    let record = path.join(CONFIG_FILE);
    std::fs::write(&record, "sentinel").unwrap();
    index.persist().unwrap();
    assert_eq!(std::fs::read_to_string(&record).unwrap(), "sentinel");
}

#[test]
fn test_open_with_capacity_floor() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idx");
    {
        let index = persisted(&path, 2);
        index.add(&[vec![1.0]], &[1]).unwrap();
        index.close();
    }

    let index: Index = Index::open(&path, &OpenOptions::new().max_elements(64)).unwrap();
    assert_eq!(index.max_elements().unwrap(), 64);
    assert_eq!(index.config().max_elements, 64);
}

#[test]
fn test_read_only_rejects_mutation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idx");
    {
        let index = persisted(&path, 4);
        index.add(&[vec![1.0, 1.0]], &[1]).unwrap();
        index.close();
    }
    let record_before = std::fs::read_to_string(path.join(CONFIG_FILE)).unwrap();

    let index: Index = Index::open(&path, &OpenOptions::new().read_only(true)).unwrap();
    for err in [
        index.add(&[vec![2.0, 2.0]], &[2]).unwrap_err(),
        index.delete(&[1]).unwrap_err(),
        index.resize(10).unwrap_err(),
        index.persist().unwrap_err(),
    ] {
        assert!(matches!(err, Error::PermissionDenied(_)), "{err}");
    }

    // Reads still work and the record is left alone.
    assert_eq!(index.ids().unwrap(), vec![1]);
    assert_eq!(
        std::fs::read_to_string(path.join(CONFIG_FILE)).unwrap(),
        record_before
    );
}

#[test]
fn test_open_preserves_space() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idx");
    {
        let index: Index = Index::create(
            IndexConfig::builder()
                .space(Space::Cosine)
                .persist_location(&path)
                .build()
                .unwrap(),
        )
        .unwrap();
        index.add(&[vec![3.0, 4.0]], &[1]).unwrap();
        index.close();
    }

    let index: Index = Index::open(&path, &OpenOptions::new()).unwrap();
    assert_eq!(index.config().space, Space::Cosine);
    let stored = &index.get_data(&[1]).unwrap()[0];
    assert!((stored[0] - 0.6).abs() < 1e-6);
}

#[test]
fn test_engine_errors_surface_unchanged() {
    let index: Index = Index::create(IndexConfig::builder().build().unwrap()).unwrap();
    index.add(&[vec![1.0]], &[1]).unwrap();

    assert!(matches!(
        index.add(&[vec![2.0]], &[1]),
        Err(Error::Engine(EngineError::DuplicateLabel(1)))
    ));
    assert!(matches!(
        index.delete(&[9]),
        Err(Error::Engine(EngineError::LabelNotFound(9)))
    ));
}

#[test]
fn test_in_memory_persist_is_noop() {
    let index: Index = Index::create(IndexConfig::builder().build().unwrap()).unwrap();
    index.add(&[vec![1.0]], &[1]).unwrap();
    index.persist().unwrap();
}
