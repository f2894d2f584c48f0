//! Adjacency lists for one level of the graph.

/// Engine-internal slot index.
pub(crate) type Slot = u32;

/// One level of the hierarchy, indexed by slot.
///
/// Slots that never reached this level keep an empty list.
#[derive(Debug, Default, Clone)]
pub(super) struct Layer {
    pub(super) neighbors: Vec<Vec<Slot>>,
}

impl Layer {
    pub(super) fn with_len(len: usize) -> Self {
        Self {
            neighbors: vec![Vec::new(); len],
        }
    }

    /// Grows the layer so that `slot` is addressable.
    pub(super) fn ensure_slot(&mut self, slot: Slot) {
        let needed = slot as usize + 1;
        if self.neighbors.len() < needed {
            self.neighbors.resize_with(needed, Vec::new);
        }
    }

    pub(super) fn neighbors(&self, slot: Slot) -> &[Slot] {
        self.neighbors.get(slot as usize).map_or(&[], Vec::as_slice)
    }

    pub(super) fn set_neighbors(&mut self, slot: Slot, neighbors: Vec<Slot>) {
        if let Some(list) = self.neighbors.get_mut(slot as usize) {
            *list = neighbors;
        }
    }
}
