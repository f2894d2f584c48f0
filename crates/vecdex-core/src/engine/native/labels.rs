//! Label table: external labels to engine slots, plus the tombstone set.

use super::layer::Slot;
use crate::Label;
use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Bidirectional label ↔ slot mapping with tombstones over slots.
///
/// Every occupied slot has exactly one label. A tombstoned slot keeps its
/// label until it is revived or reassigned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct LabelTable {
    label_to_slot: FxHashMap<Label, Slot>,
    slot_to_label: Vec<Label>,
    deleted: RoaringBitmap,
}

impl LabelTable {
    /// Occupied slots, tombstoned included.
    pub(super) fn len(&self) -> usize {
        self.slot_to_label.len()
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(super) fn deleted_len(&self) -> usize {
        self.deleted.len() as usize
    }

    pub(super) fn slot_of(&self, label: Label) -> Option<Slot> {
        self.label_to_slot.get(&label).copied()
    }

    pub(super) fn label_of(&self, slot: Slot) -> Label {
        self.slot_to_label[slot as usize]
    }

    pub(super) fn is_deleted(&self, slot: Slot) -> bool {
        self.deleted.contains(slot)
    }

    /// Tombstoned slots in ascending order.
    pub(super) fn deleted_slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.deleted.iter()
    }

    /// Registers `label` for the next slot, which must be `slot`.
    pub(super) fn push(&mut self, label: Label, slot: Slot) {
        debug_assert_eq!(slot as usize, self.slot_to_label.len());
        self.slot_to_label.push(label);
        self.label_to_slot.insert(label, slot);
    }

    pub(super) fn mark_deleted(&mut self, slot: Slot) {
        self.deleted.insert(slot);
    }

    /// Clears the tombstone on `slot`, keeping its label.
    pub(super) fn revive(&mut self, slot: Slot) {
        self.deleted.remove(slot);
    }

    /// Hands a tombstoned slot to a new label. The old label is forgotten.
    pub(super) fn reassign(&mut self, slot: Slot, label: Label) {
        let old = self.slot_to_label[slot as usize];
        self.label_to_slot.remove(&old);
        self.slot_to_label[slot as usize] = label;
        self.label_to_slot.insert(label, slot);
        self.deleted.remove(slot);
    }

    /// Labels in slot order, optionally skipping tombstones.
    #[allow(clippy::cast_possible_truncation)]
    pub(super) fn labels(&self, active_only: bool) -> Vec<Label> {
        self.slot_to_label
            .iter()
            .enumerate()
            .filter(|&(slot, _)| !active_only || !self.deleted.contains(slot as Slot))
            .map(|(_, &label)| label)
            .collect()
    }
}
