//! Hierarchical navigable small-world graph.
//!
//! Implements the graph structure of Malkov & Yashunin with a flat vector
//! store and slot-indexed layers. The graph has a single writer: the owning
//! engine holds `&mut` for inserts and shares `&` for searches, so there are no
//! per-node locks.

use super::layer::{Layer, Slot};
use crate::distance::Metric;
use crate::engine::{EngineError, EngineResult};
use rustc_hash::FxHashSet;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Upper bound on the level a node can be assigned.
pub(super) const MAX_LEVEL: usize = 15;

const RNG_SEED: u64 = 0x5DEE_CE66_D1A4_B5B5;

/// Eligibility check applied to result candidates during a search.
pub(super) type Accept<'a> = &'a (dyn Fn(Slot) -> bool + Sync);

/// A visited slot and its distance to the query.
///
/// Ordered by distance with `f32::total_cmp`, then by slot, so NaN distances
/// sort last instead of breaking heap order.
#[derive(Debug, Clone, Copy)]
pub(super) struct Candidate {
    pub(super) distance: f32,
    pub(super) slot: Slot,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.slot.cmp(&other.slot))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

pub(super) struct Graph {
    pub(super) metric: Metric,
    pub(super) dimension: usize,
    /// Row-major vectors, `dimension` floats per slot.
    pub(super) vectors: Vec<f32>,
    /// Top level of each slot.
    pub(super) levels: Vec<u8>,
    /// Layer 0 is the dense bottom layer.
    pub(super) layers: Vec<Layer>,
    pub(super) entry_point: Option<Slot>,
    pub(super) max_layer: usize,
    /// M.
    pub(super) max_connections: usize,
    /// M0 = 2 * M.
    pub(super) max_connections_0: usize,
    pub(super) ef_construction: usize,
    rng_state: u64,
    level_mult: f64,
}

impl Graph {
    #[allow(clippy::cast_precision_loss)]
    pub(super) fn new(
        metric: Metric,
        dimension: usize,
        max_connections: usize,
        ef_construction: usize,
    ) -> Self {
        Self {
            metric,
            dimension,
            vectors: Vec::new(),
            levels: Vec::new(),
            layers: vec![Layer::default()],
            entry_point: None,
            max_layer: 0,
            max_connections,
            max_connections_0: max_connections * 2,
            ef_construction,
            rng_state: RNG_SEED,
            level_mult: 1.0 / (max_connections as f64).ln(),
        }
    }

    /// Number of occupied slots.
    pub(super) fn len(&self) -> usize {
        self.levels.len()
    }

    pub(super) fn vector(&self, slot: Slot) -> &[f32] {
        let start = slot as usize * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    /// Reserves room for `capacity` slots in total.
    pub(super) fn reserve_total(&mut self, capacity: usize) -> EngineResult<()> {
        let additional = capacity.saturating_sub(self.len());
        let floats = additional
            .checked_mul(self.dimension)
            .ok_or_else(|| EngineError::Allocation {
                requested: capacity,
                reason: "vector storage size overflows".to_string(),
            })?;
        let alloc_err = |e: std::collections::TryReserveError| EngineError::Allocation {
            requested: capacity,
            reason: e.to_string(),
        };
        self.vectors.try_reserve_exact(floats).map_err(alloc_err)?;
        self.levels.try_reserve_exact(additional).map_err(alloc_err)?;
        self.layers[0]
            .neighbors
            .try_reserve_exact(additional)
            .map_err(alloc_err)?;
        Ok(())
    }

    /// Inserts a vector into a fresh slot and links it into the graph.
    #[allow(clippy::cast_possible_truncation)]
    pub(super) fn insert(&mut self, vector: &[f32]) -> Slot {
        let slot = self.levels.len() as Slot;
        self.vectors.extend_from_slice(vector);

        let level = self.random_layer();
        self.levels.push(level as u8);
        while self.layers.len() <= level {
            self.layers.push(Layer::default());
        }
        for layer in &mut self.layers[..=level] {
            layer.ensure_slot(slot);
        }

        let Some(entry) = self.entry_point else {
            self.entry_point = Some(slot);
            self.max_layer = level;
            return slot;
        };

        self.link(slot, level, entry);

        if level > self.max_layer {
            self.max_layer = level;
            self.entry_point = Some(slot);
        }
        slot
    }

    /// Overwrites the vector in an existing slot and relinks it.
    ///
    /// The slot keeps its level. Incoming edges from other nodes are kept and
    /// pruned lazily as those nodes gain new neighbours.
    pub(super) fn replace(&mut self, slot: Slot, vector: &[f32]) {
        let start = slot as usize * self.dimension;
        self.vectors[start..start + self.dimension].copy_from_slice(vector);

        let level = usize::from(self.levels[slot as usize]);
        if let Some(entry) = self.entry_point {
            if self.len() > 1 {
                self.link(slot, level, entry);
            }
        }
    }

    /// Finds the `k` nearest accepted slots to `query`.
    ///
    /// Upper layers are descended greedily without the filter; only layer 0
    /// applies it, so rejected nodes still route the traversal.
    pub(super) fn search(
        &self,
        query: &[f32],
        k: usize,
        ef: usize,
        accept: Option<Accept<'_>>,
    ) -> Vec<(Slot, f32)> {
        let Some(entry) = self.entry_point else {
            return Vec::new();
        };

        let mut current = entry;
        for layer in (1..=self.max_layer).rev() {
            current = self.greedy_closest(query, current, layer);
        }

        let mut found = self.search_layer(query, &[current], ef.max(k), 0, accept);
        found.truncate(k);
        found
    }

    fn link(&mut self, slot: Slot, level: usize, entry: Slot) {
        let query = self.vector(slot).to_vec();

        let mut current = entry;
        for layer in (level + 1..=self.max_layer).rev() {
            current = self.greedy_closest(&query, current, layer);
        }

        for layer in (0..=level.min(self.max_layer)).rev() {
            let mut candidates =
                self.search_layer(&query, &[current], self.ef_construction, layer, None);
            candidates.retain(|&(s, _)| s != slot);

            let max_conn = if layer == 0 {
                self.max_connections_0
            } else {
                self.max_connections
            };
            let selected = self.select_neighbors(&candidates, max_conn);

            for &neighbor in &selected {
                self.connect(neighbor, slot, layer, max_conn);
            }
            self.layers[layer].set_neighbors(slot, selected);

            if let Some(&(nearest, _)) = candidates.first() {
                current = nearest;
            }
        }
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn random_layer(&mut self) -> usize {
        // xorshift64
        let mut state = self.rng_state;
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        self.rng_state = state;

        let uniform = (state as f64) / (u64::MAX as f64);
        let level = (-uniform.ln() * self.level_mult).floor() as usize;
        level.min(MAX_LEVEL)
    }

    fn greedy_closest(&self, query: &[f32], entry: Slot, layer: usize) -> Slot {
        let mut best = entry;
        let mut best_dist = self.metric.distance(query, self.vector(entry));

        loop {
            let mut improved = false;
            for &neighbor in self.layers[layer].neighbors(best) {
                let dist = self.metric.distance(query, self.vector(neighbor));
                if dist < best_dist {
                    best = neighbor;
                    best_dist = dist;
                    improved = true;
                }
            }
            if !improved {
                break;
            }
        }

        best
    }

    /// Beam search over one layer.
    ///
    /// Every visited node may become a candidate for expansion, but only
    /// accepted nodes enter the result set. The search stops once the nearest
    /// open candidate is further than the worst of `ef` results.
    fn search_layer(
        &self,
        query: &[f32],
        entries: &[Slot],
        ef: usize,
        layer: usize,
        accept: Option<Accept<'_>>,
    ) -> Vec<(Slot, f32)> {
        let accepts = |slot: Slot| accept.map_or(true, |f| f(slot));

        let mut visited: FxHashSet<Slot> = FxHashSet::default();
        let mut frontier: BinaryHeap<Reverse<Candidate>> = BinaryHeap::new();
        let mut results: BinaryHeap<Candidate> = BinaryHeap::new();

        for &entry in entries {
            if !visited.insert(entry) {
                continue;
            }
            let found = Candidate {
                distance: self.metric.distance(query, self.vector(entry)),
                slot: entry,
            };
            frontier.push(Reverse(found));
            if accepts(entry) {
                results.push(found);
            }
        }

        while let Some(Reverse(nearest)) = frontier.pop() {
            let worst = results.peek().map_or(f32::MAX, |c| c.distance);
            if nearest.distance > worst && results.len() >= ef {
                break;
            }

            for &neighbor in self.layers[layer].neighbors(nearest.slot) {
                if !visited.insert(neighbor) {
                    continue;
                }
                let found = Candidate {
                    distance: self.metric.distance(query, self.vector(neighbor)),
                    slot: neighbor,
                };
                let worst = results.peek().map_or(f32::MAX, |c| c.distance);

                if results.len() < ef || found.distance < worst {
                    frontier.push(Reverse(found));
                    if accepts(neighbor) {
                        results.push(found);
                        if results.len() > ef {
                            results.pop();
                        }
                    }
                }
            }
        }

        results
            .into_sorted_vec()
            .into_iter()
            .map(|c| (c.slot, c.distance))
            .collect()
    }

    /// Heuristic neighbour selection.
    ///
    /// A candidate is kept if it is closer to the new node than to every
    /// neighbour already kept. Remaining room is filled with the closest
    /// leftovers.
    pub(super) fn select_neighbors(
        &self,
        candidates: &[(Slot, f32)],
        max_neighbors: usize,
    ) -> Vec<Slot> {
        if candidates.len() <= max_neighbors {
            return candidates.iter().map(|&(s, _)| s).collect();
        }

        let mut selected: Vec<Slot> = Vec::with_capacity(max_neighbors);
        for &(candidate, candidate_dist) in candidates {
            if selected.len() >= max_neighbors {
                break;
            }
            let candidate_vec = self.vector(candidate);
            let diverse = selected.iter().all(|&kept| {
                candidate_dist <= self.metric.distance(candidate_vec, self.vector(kept))
            });
            if diverse || selected.is_empty() {
                selected.push(candidate);
            }
        }

        if selected.len() < max_neighbors {
            for &(candidate, _) in candidates {
                if selected.len() >= max_neighbors {
                    break;
                }
                if !selected.contains(&candidate) {
                    selected.push(candidate);
                }
            }
        }

        selected
    }

    /// Adds `new` to the adjacency list of `node`, pruning to the closest
    /// `max_conn` when full.
    fn connect(&mut self, node: Slot, new: Slot, layer: usize, max_conn: usize) {
        let mut updated = self.layers[layer].neighbors(node).to_vec();
        if updated.contains(&new) {
            return;
        }
        updated.push(new);

        if updated.len() > max_conn {
            let base = self.vector(node);
            let mut with_dist: Vec<(Slot, f32)> = updated
                .iter()
                .map(|&n| (n, self.metric.distance(base, self.vector(n))))
                .collect();
            with_dist.sort_by(|a, b| a.1.total_cmp(&b.1));
            updated = with_dist
                .into_iter()
                .take(max_conn)
                .map(|(n, _)| n)
                .collect();
        }

        self.layers[layer].set_neighbors(node, updated);
    }
}
