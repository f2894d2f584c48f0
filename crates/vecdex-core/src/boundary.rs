//! Buffers that carry data across the engine boundary.
//!
//! Each buffer is allocated for exactly one call, sized from the known element
//! count and width, filled by index, lent to the engine by reference and
//! dropped when the call returns, on the error path as well. Allocation goes
//! through `try_reserve_exact` so an oversized request becomes an error
//! instead of an abort.

use crate::error::{Error, Result};
use crate::Label;

/// Allocates an empty vector with room for exactly `len` elements.
fn alloc_exact<T>(len: usize) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|e| Error::CapacityExceeded {
            requested: len,
            reason: format!("boundary buffer allocation failed: {e}"),
        })?;
    Ok(buf)
}

/// Row-major vectors plus their labels, ready for a batch insert.
#[derive(Debug)]
pub struct EmbeddingBatch {
    dims: usize,
    labels: Vec<Label>,
    data: Vec<f32>,
}

impl EmbeddingBatch {
    /// Copies `vectors` and `labels` into boundary-owned buffers of exactly
    /// `count * dims` floats and `count` labels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] on a length mismatch,
    /// [`Error::DimensionMismatch`] if a row is not `dims` long, or
    /// [`Error::CapacityExceeded`] if the buffers cannot be allocated.
    pub fn pack(vectors: &[Vec<f32>], labels: &[Label], dims: usize) -> Result<Self> {
        if vectors.len() != labels.len() {
            return Err(Error::InvalidArgument(format!(
                "{} vectors but {} labels",
                vectors.len(),
                labels.len()
            )));
        }
        let total = vectors
            .len()
            .checked_mul(dims)
            .ok_or_else(|| Error::CapacityExceeded {
                requested: usize::MAX,
                reason: "batch size overflows".to_string(),
            })?;

        let mut data = alloc_exact(total)?;
        for row in vectors {
            if row.len() != dims {
                return Err(Error::DimensionMismatch {
                    expected: dims,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }

        let mut label_buf = alloc_exact(labels.len())?;
        label_buf.extend_from_slice(labels);

        Ok(Self {
            dims,
            labels: label_buf,
            data,
        })
    }

    /// Number of vectors in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true if the batch holds no vectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Width of every row.
    #[must_use]
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Labels in batch order.
    #[must_use]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Row `i` of the batch.
    #[must_use]
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dims..(i + 1) * self.dims]
    }

    /// Iterates `(label, vector)` pairs in batch order.
    pub fn iter(&self) -> impl Iterator<Item = (Label, &[f32])> {
        self.labels
            .iter()
            .copied()
            .zip(self.data.chunks_exact(self.dims.max(1)))
    }
}

/// A label array for delete and fetch calls.
#[derive(Debug)]
pub struct LabelBuffer {
    labels: Vec<Label>,
}

impl LabelBuffer {
    /// Copies `labels` into a buffer of exactly `labels.len()` entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityExceeded`] if the buffer cannot be allocated.
    pub fn pack(labels: &[Label]) -> Result<Self> {
        let mut buf = alloc_exact(labels.len())?;
        buf.extend_from_slice(labels);
        Ok(Self { labels: buf })
    }

    /// The labels.
    #[must_use]
    pub fn as_slice(&self) -> &[Label] {
        &self.labels
    }
}

/// Row-major query vectors.
#[derive(Debug)]
pub struct QueryBuffer {
    dims: usize,
    count: usize,
    data: Vec<f32>,
}

impl QueryBuffer {
    /// Copies `queries` into a buffer of exactly `count * dims` floats.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if a row is not `dims` long, or
    /// [`Error::CapacityExceeded`] if the buffer cannot be allocated.
    pub fn pack(queries: &[Vec<f32>], dims: usize) -> Result<Self> {
        let total = queries
            .len()
            .checked_mul(dims)
            .ok_or_else(|| Error::CapacityExceeded {
                requested: usize::MAX,
                reason: "query batch size overflows".to_string(),
            })?;
        let mut data = alloc_exact(total)?;
        for row in queries {
            if row.len() != dims {
                return Err(Error::DimensionMismatch {
                    expected: dims,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            dims,
            count: queries.len(),
            data,
        })
    }

    /// Number of query vectors.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Width of every row.
    #[must_use]
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Query row `i`.
    #[must_use]
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dims..(i + 1) * self.dims]
    }
}

/// Per-call eligibility predicate. Returns true to keep a label eligible.
pub type LabelFilter = dyn Fn(Label) -> bool + Sync;

/// One k-NN call: the queries, `k`, the search breadth and an optional filter.
///
/// The filter lives only as long as the request; nothing about it is stored
/// in the engine.
#[derive(Clone, Copy)]
pub struct KnnRequest<'a> {
    /// Query vectors.
    pub queries: &'a QueryBuffer,
    /// Neighbours wanted per query.
    pub k: usize,
    /// Search breadth.
    pub ef: usize,
    /// Eligibility predicate, `None` = every active label.
    pub filter: Option<&'a LabelFilter>,
}

impl std::fmt::Debug for KnnRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnnRequest")
            .field("count", &self.queries.count())
            .field("k", &self.k)
            .field("ef", &self.ef)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

/// A single search hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Label of the hit.
    pub label: Label,
    /// Distance to the query; lower is closer.
    pub distance: f32,
}

/// Flat result buffer of `k * count` slots plus the number of hits actually
/// found for each query.
#[derive(Debug)]
pub struct KnnResponse {
    k: usize,
    found: Vec<usize>,
    pairs: Vec<Neighbor>,
}

impl KnnResponse {
    /// Allocates a response for `count` queries of `k` neighbours each.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityExceeded`] if the buffer cannot be allocated.
    pub fn allocate(k: usize, count: usize) -> Result<Self> {
        let total = k.checked_mul(count).ok_or_else(|| Error::CapacityExceeded {
            requested: usize::MAX,
            reason: "result buffer size overflows".to_string(),
        })?;
        let mut pairs = alloc_exact(total)?;
        pairs.resize(
            total,
            Neighbor {
                label: 0,
                distance: f32::INFINITY,
            },
        );
        let mut found = alloc_exact(count)?;
        found.resize(count, 0);
        Ok(Self { k, found, pairs })
    }

    /// Neighbours per query.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of queries.
    #[must_use]
    pub fn count(&self) -> usize {
        self.found.len()
    }

    /// Writes the hits for query `row`, nearest first. Extra hits beyond `k`
    /// are ignored.
    pub fn fill(&mut self, row: usize, hits: &[Neighbor]) {
        let n = hits.len().min(self.k);
        let start = row * self.k;
        self.pairs[start..start + n].copy_from_slice(&hits[..n]);
        self.found[row] = n;
    }

    /// Reshapes the flat buffer into one sequence per query, trimmed to the
    /// hits actually found.
    #[must_use]
    pub fn into_rows(self) -> Vec<Vec<Neighbor>> {
        let k = self.k;
        self.found
            .iter()
            .enumerate()
            .map(|(row, &n)| self.pairs[row * k..row * k + n].to_vec())
            .collect()
    }
}
