//! HNSW vector index for passage embeddings
//!
//! In-memory approximate nearest-neighbor structure keyed by the passage's
//! internal record id. The durable copy of every embedding lives in the
//! record store; this index is rebuilt from it at open.

use crate::error::{PassimError, Result};
use hnsw_rs::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Cosine-similarity HNSW index.
pub struct VectorIndex {
    index: RwLock<Hnsw<'static, f32, DistCosine>>,
    dimension: usize,
    count: AtomicU64,
}

impl VectorIndex {
    /// `capacity` is the expected upper bound on indexed vectors, used for
    /// layer sizing; it is not a hard limit.
    pub fn new(dimension: usize, m: usize, ef_construction: usize, capacity: usize) -> Self {
        let index = Hnsw::<f32, DistCosine>::new(m, capacity, 16, ef_construction, DistCosine);
        Self {
            index: RwLock::new(index),
            dimension,
            count: AtomicU64::new(0),
        }
    }

    /// Insert a vector under an internal record id.
    pub fn insert(&self, id: u64, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(PassimError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let data = vector.to_vec();
        let index = self.index.write().unwrap();
        index.insert((&data, id as usize));
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// k-nearest-neighbor search; returns `(id, cosine similarity)` pairs
    /// ordered most-similar first.
    pub fn search(&self, query: &[f32], k: usize, ef_search: usize) -> Result<Vec<(u64, f32)>> {
        if query.len() != self.dimension {
            return Err(PassimError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let index = self.index.read().unwrap();
        let neighbors = index.search(query, k, ef_search);

        Ok(neighbors
            .into_iter()
            .map(|neighbor| (neighbor.d_id as u64, 1.0 - neighbor.distance))
            .collect())
    }

    pub fn len(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}
