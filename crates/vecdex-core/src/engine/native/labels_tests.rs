//! Tests for `labels` module

use super::labels::LabelTable;

fn table_with(labels: &[u64]) -> LabelTable {
    let mut table = LabelTable::default();
    for (slot, &label) in labels.iter().enumerate() {
        table.push(label, u32::try_from(slot).unwrap());
    }
    table
}

#[test]
fn test_push_maps_both_directions() {
    let table = table_with(&[40, 7, 12]);
    assert_eq!(table.len(), 3);
    assert_eq!(table.slot_of(7), Some(1));
    assert_eq!(table.label_of(2), 12);
    assert_eq!(table.slot_of(99), None);
}

#[test]
fn test_tombstones_are_counted_and_filtered() {
    let mut table = table_with(&[1, 2, 3]);
    table.mark_deleted(1);

    assert_eq!(table.deleted_len(), 1);
    assert!(table.is_deleted(1));
    assert_eq!(table.labels(false), vec![1, 2, 3]);
    assert_eq!(table.labels(true), vec![1, 3]);
    // A tombstoned label stays resolvable.
    assert_eq!(table.slot_of(2), Some(1));
}

#[test]
fn test_revive_keeps_label() {
    let mut table = table_with(&[1, 2]);
    table.mark_deleted(0);
    table.revive(0);
    assert_eq!(table.deleted_len(), 0);
    assert_eq!(table.label_of(0), 1);
}

#[test]
fn test_reassign_forgets_old_label() {
    let mut table = table_with(&[1, 2]);
    table.mark_deleted(0);
    table.reassign(0, 50);

    assert_eq!(table.slot_of(1), None);
    assert_eq!(table.slot_of(50), Some(0));
    assert!(!table.is_deleted(0));
    assert_eq!(table.labels(true), vec![50, 2]);
}

#[test]
fn test_deleted_slots_ascending() {
    let mut table = table_with(&[1, 2, 3, 4]);
    table.mark_deleted(3);
    table.mark_deleted(0);
    assert_eq!(table.deleted_slots().collect::<Vec<_>>(), vec![0, 3]);
}

#[test]
fn test_bincode_roundtrip_preserves_tombstones() {
    let mut table = table_with(&[9, 8, 7]);
    table.mark_deleted(2);

    let bytes = bincode::serialize(&table).unwrap();
    let restored: LabelTable = bincode::deserialize(&bytes).unwrap();

    assert_eq!(restored.labels(false), vec![9, 8, 7]);
    assert_eq!(restored.labels(true), vec![9, 8]);
    assert_eq!(restored.slot_of(8), Some(1));
}
