//! k-NN queries.

use super::Index;
use crate::boundary::{KnnRequest, KnnResponse, LabelFilter, Neighbor, QueryBuffer};
use crate::engine::Engine;
use crate::error::{Error, Result};

/// Per-call query options.
///
/// Both fields apply to one call only; nothing is stored on the index.
#[derive(Clone, Copy, Default)]
pub struct QueryOptions<'a> {
    /// Search breadth, `None` = the index default.
    pub ef_search: Option<usize>,
    /// Eligibility predicate; a label is kept if it returns true.
    /// `None` = every active label.
    pub filter: Option<&'a LabelFilter>,
}

impl<'a> QueryOptions<'a> {
    /// Overrides the search breadth for this call.
    #[must_use]
    pub fn with_ef_search(mut self, ef: usize) -> Self {
        self.ef_search = Some(ef);
        self
    }

    /// Restricts results to labels accepted by `filter`.
    #[must_use]
    pub fn with_filter(mut self, filter: &'a LabelFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

impl std::fmt::Debug for QueryOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOptions")
            .field("ef_search", &self.ef_search)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl<E: Engine> Index<E> {
    /// Finds up to `k` nearest active labels for each query vector.
    ///
    /// Each row is ordered by non-decreasing distance. The order among equal
    /// distances depends on graph traversal and is not stable across engine
    /// versions. Raising `ef_search` widens the search and improves recall; it
    /// never lets a tombstoned label through.
    ///
    /// An index that has not fixed its dimension yet returns empty rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `k` or `ef_search` is 0 or there
    /// are no queries, or [`Error::DimensionMismatch`] if a query has the wrong
    /// length.
    pub fn query(
        &self,
        queries: &[Vec<f32>],
        k: usize,
        options: &QueryOptions<'_>,
    ) -> Result<Vec<Vec<Neighbor>>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be at least 1".to_string()));
        }
        if queries.is_empty() {
            return Err(Error::InvalidArgument("no query vectors".to_string()));
        }
        if options.ef_search == Some(0) {
            return Err(Error::InvalidArgument(
                "ef_search must be at least 1".to_string(),
            ));
        }

        let inner = self.read_initialized()?;
        let engine = inner.handle.engine()?;
        let dims = inner.config.dimension;
        if dims == 0 {
            return Ok(vec![Vec::new(); queries.len()]);
        }

        let buffer = QueryBuffer::pack(queries, dims)?;
        let request = KnnRequest {
            queries: &buffer,
            k,
            ef: options.ef_search.unwrap_or(inner.config.ef_search),
            filter: options.filter,
        };
        let mut response = KnnResponse::allocate(k, buffer.count())?;
        engine.search(&request, &mut response)?;

        Ok(response.into_rows())
    }
}
