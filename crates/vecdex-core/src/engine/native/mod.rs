//! Bundled hierarchical navigable small-world engine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ NativeEngine                             │
//! │  config: EngineConfig                    │
//! │  state (after init):                     │
//! │    graph:  Graph   (vectors + layers)    │
//! │    labels: LabelTable (label ↔ slot,     │
//! │            roaring tombstones)           │
//! │    pool:   rayon::ThreadPool             │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Tombstoned slots stay in the graph and keep routing traversals; they are
//! only excluded from results.
//!
//! # References
//!
//! - Paper: "Efficient and robust approximate nearest neighbor search
//!   using Hierarchical Navigable Small World graphs" (Malkov & Yashunin, 2016)

mod graph;
mod labels;
mod layer;
mod persistence;

#[cfg(test)]
mod labels_tests;
#[cfg(test)]
mod tests;

use super::{Engine, EngineConfig, EngineCounts, EngineError, EngineParams, EngineResult};
use crate::boundary::{EmbeddingBatch, KnnRequest, KnnResponse, LabelBuffer, Neighbor};
use crate::distance::normalize_in_place;
use crate::Label;
use graph::Graph;
use labels::LabelTable;
use layer::Slot;
use persistence::EngineMeta;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::borrow::Cow;
use tracing::debug;

/// Where a vector of an insert batch lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// A new slot at the end.
    Append,
    /// The tombstoned slot already holding this label.
    Revive(Slot),
    /// A tombstoned slot of another label.
    Reuse(Slot),
}

struct NativeState {
    graph: Graph,
    labels: LabelTable,
    capacity: usize,
    pool: rayon::ThreadPool,
    dirty: bool,
}

/// HNSW engine with explicit capacity and slot reclamation.
pub struct NativeEngine {
    config: EngineConfig,
    state: Option<NativeState>,
}

impl std::fmt::Debug for NativeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeEngine")
            .field("config", &self.config)
            .field("initialized", &self.state.is_some())
            .finish()
    }
}

impl NativeEngine {
    fn state(&self) -> EngineResult<&NativeState> {
        self.state.as_ref().ok_or(EngineError::NotInitialized)
    }

    fn state_mut(&mut self) -> EngineResult<&mut NativeState> {
        self.state.as_mut().ok_or(EngineError::NotInitialized)
    }

    fn fresh_state(&self, pool: rayon::ThreadPool) -> EngineResult<NativeState> {
        let mut graph = Graph::new(
            self.config.metric.metric,
            self.config.dimension,
            self.config.graph_degree,
            self.config.ef_construction,
        );
        let capacity = self.config.max_elements.max(self.config.min_capacity);
        graph.reserve_total(capacity)?;
        Ok(NativeState {
            graph,
            labels: LabelTable::default(),
            capacity,
            pool,
            dirty: true,
        })
    }

    /// Loads persisted artifacts.
    ///
    /// The persisted metric and capacity win over the configured ones; only
    /// `min_capacity` can raise the capacity.
    fn loaded_state(
        &mut self,
        dir: &std::path::Path,
        pool: rayon::ThreadPool,
    ) -> EngineResult<NativeState> {
        let (mut graph, labels, meta) = persistence::load(dir)?;
        self.config.metric = meta.metric;
        let capacity = meta.capacity.max(self.config.min_capacity);
        graph.reserve_total(capacity)?;
        debug!(
            path = %dir.display(),
            elements = graph.len(),
            capacity,
            "Loaded engine artifacts"
        );
        Ok(NativeState {
            graph,
            labels,
            capacity,
            pool,
            dirty: capacity != meta.capacity,
        })
    }

    fn meta(&self, state: &NativeState) -> EngineMeta {
        EngineMeta {
            version: persistence::FORMAT_VERSION,
            metric: self.config.metric,
            dimension: state.graph.dimension,
            capacity: state.capacity,
            graph_degree: state.graph.max_connections,
            ef_construction: state.graph.ef_construction,
        }
    }
}

impl NativeState {
    /// Decides where each vector goes without touching the graph.
    fn plan(&self, batch: &EmbeddingBatch, replace_deleted: bool) -> EngineResult<Vec<Placement>> {
        if self.graph.dimension > 0 && batch.dims() != self.graph.dimension {
            return Err(EngineError::DimensionMismatch {
                expected: self.graph.dimension,
                actual: batch.dims(),
            });
        }

        let mut plan = Vec::with_capacity(batch.len());
        let mut claimed: FxHashSet<Slot> = FxHashSet::default();
        for &label in batch.labels() {
            let placement = match self.labels.slot_of(label) {
                Some(slot) if replace_deleted && self.labels.is_deleted(slot) => {
                    claimed.insert(slot);
                    Placement::Revive(slot)
                }
                Some(_) => return Err(EngineError::DuplicateLabel(label)),
                None => Placement::Append,
            };
            plan.push(placement);
        }

        if replace_deleted {
            let mut free = self
                .labels
                .deleted_slots()
                .filter(|slot| !claimed.contains(slot));
            for placement in plan.iter_mut().filter(|p| **p == Placement::Append) {
                match free.next() {
                    Some(slot) => *placement = Placement::Reuse(slot),
                    None => break,
                }
            }
        }

        let appends = plan.iter().filter(|p| **p == Placement::Append).count();
        let required = self.graph.len() + appends;
        if required > self.capacity {
            return Err(EngineError::CapacityExhausted {
                capacity: self.capacity,
                required,
            });
        }

        Ok(plan)
    }
}

impl Engine for NativeEngine {
    fn create(config: EngineConfig) -> EngineResult<Self> {
        Ok(Self {
            config,
            state: None,
        })
    }

    fn init(&mut self) -> EngineResult<()> {
        if self.state.is_some() {
            return Ok(());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.num_threads)
            .build()
            .map_err(|e| EngineError::ThreadPool(e.to_string()))?;

        let state = match self.config.persist_location.clone() {
            Some(dir) if persistence::has_artifacts(&dir) => self.loaded_state(&dir, pool)?,
            _ => self.fresh_state(pool)?,
        };
        self.state = Some(state);
        Ok(())
    }

    fn insert_batch(&mut self, batch: &EmbeddingBatch, replace_deleted: bool) -> EngineResult<()> {
        let normalize = self.config.metric.normalize;
        let state = self.state_mut()?;
        let plan = state.plan(batch, replace_deleted)?;

        if state.graph.dimension == 0 {
            state.graph.dimension = batch.dims();
            state.graph.reserve_total(state.capacity)?;
        }

        for ((label, row), placement) in batch.iter().zip(plan) {
            let vector: Cow<'_, [f32]> = if normalize {
                let mut owned = row.to_vec();
                normalize_in_place(&mut owned);
                Cow::Owned(owned)
            } else {
                Cow::Borrowed(row)
            };

            match placement {
                Placement::Append => {
                    let slot = state.graph.insert(&vector);
                    state.labels.push(label, slot);
                }
                Placement::Revive(slot) => {
                    state.graph.replace(slot, &vector);
                    state.labels.revive(slot);
                }
                Placement::Reuse(slot) => {
                    state.graph.replace(slot, &vector);
                    state.labels.reassign(slot, label);
                }
            }
        }

        state.dirty = true;
        Ok(())
    }

    fn mark_deleted(&mut self, labels: &LabelBuffer) -> EngineResult<()> {
        let state = self.state_mut()?;

        let mut slots = Vec::with_capacity(labels.as_slice().len());
        for &label in labels.as_slice() {
            let slot = state
                .labels
                .slot_of(label)
                .ok_or(EngineError::LabelNotFound(label))?;
            if state.labels.is_deleted(slot) {
                return Err(EngineError::AlreadyDeleted(label));
            }
            slots.push(slot);
        }

        for slot in slots {
            state.labels.mark_deleted(slot);
        }
        state.dirty = true;
        Ok(())
    }

    fn search(&self, request: &KnnRequest<'_>, response: &mut KnnResponse) -> EngineResult<()> {
        let state = self.state()?;
        let graph = &state.graph;
        if graph.len() == 0 {
            return Ok(());
        }
        if request.queries.dims() != graph.dimension {
            return Err(EngineError::DimensionMismatch {
                expected: graph.dimension,
                actual: request.queries.dims(),
            });
        }

        let table = &state.labels;
        let accept = |slot: Slot| {
            !table.is_deleted(slot) && request.filter.map_or(true, |f| f(table.label_of(slot)))
        };
        let normalize = self.config.metric.normalize;

        let rows: Vec<Vec<Neighbor>> = state.pool.install(|| {
            (0..request.queries.count())
                .into_par_iter()
                .map(|i| {
                    let mut query = Cow::Borrowed(request.queries.row(i));
                    if normalize {
                        normalize_in_place(query.to_mut());
                    }
                    graph
                        .search(&query, request.k, request.ef, Some(&accept))
                        .into_iter()
                        .map(|(slot, distance)| Neighbor {
                            label: table.label_of(slot),
                            distance,
                        })
                        .collect::<Vec<_>>()
                })
                .collect()
        });

        for (i, hits) in rows.iter().enumerate() {
            response.fill(i, hits);
        }
        Ok(())
    }

    fn resize(&mut self, new_capacity: usize) -> EngineResult<()> {
        let state = self.state_mut()?;
        let elements = state.graph.len();
        if new_capacity < elements {
            return Err(EngineError::CapacityExhausted {
                capacity: new_capacity,
                required: elements,
            });
        }
        if u32::try_from(new_capacity).is_err() {
            return Err(EngineError::Allocation {
                requested: new_capacity,
                reason: "capacity exceeds the slot range".to_string(),
            });
        }

        state.graph.reserve_total(new_capacity)?;
        state.capacity = new_capacity;
        state.dirty = true;
        Ok(())
    }

    fn persist(&mut self) -> EngineResult<()> {
        let Some(dir) = self.config.persist_location.clone() else {
            return Ok(());
        };
        let state = self.state()?;
        if !state.dirty {
            return Ok(());
        }

        let meta = self.meta(state);
        persistence::save(&dir, &state.graph, &state.labels, &meta)?;
        debug!(
            path = %dir.display(),
            elements = state.graph.len(),
            "Persisted engine artifacts"
        );

        self.state_mut()?.dirty = false;
        Ok(())
    }

    fn counts(&self) -> EngineCounts {
        self.state.as_ref().map_or(
            EngineCounts {
                capacity: self.config.max_elements,
                ..EngineCounts::default()
            },
            |state| EngineCounts {
                total: state.labels.len(),
                deleted: state.labels.deleted_len(),
                capacity: state.capacity,
            },
        )
    }

    fn params(&self) -> EngineParams {
        match &self.state {
            Some(state) => EngineParams {
                metric: self.config.metric,
                dimension: state.graph.dimension,
                max_elements: state.capacity,
                graph_degree: state.graph.max_connections,
                ef_construction: state.graph.ef_construction,
            },
            None => EngineParams {
                metric: self.config.metric,
                dimension: self.config.dimension,
                max_elements: self.config.max_elements,
                graph_degree: self.config.graph_degree,
                ef_construction: self.config.ef_construction,
            },
        }
    }

    fn labels(&self, active_only: bool) -> Vec<Label> {
        self.state
            .as_ref()
            .map_or_else(Vec::new, |state| state.labels.labels(active_only))
    }

    fn fetch_vectors(&self, labels: &LabelBuffer) -> Vec<Option<Vec<f32>>> {
        let Some(state) = self.state.as_ref() else {
            return vec![None; labels.as_slice().len()];
        };
        labels
            .as_slice()
            .iter()
            .map(|&label| {
                state
                    .labels
                    .slot_of(label)
                    .filter(|&slot| !state.labels.is_deleted(slot))
                    .map(|slot| state.graph.vector(slot).to_vec())
            })
            .collect()
    }
}
