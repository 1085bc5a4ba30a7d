//! Exact (flat) inner-product search.
//!
//! Vectors are stored unit-normalized, so the inner product is the cosine
//! similarity. Every query scans all rows; corpora here are a handful of
//! documents, far below the size where an approximate structure pays off.
use std::cmp::Ordering;

use pcodex_core::types::dot;
use pcodex_core::{Error, Result, SearchHit};

#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// `data` is row-major, `data.len() / dim` rows.
    pub fn new(dim: usize, data: Vec<f32>) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidInput("vector dimension must be > 0".into()));
        }
        if data.len() % dim != 0 {
            return Err(Error::InvalidInput(format!("{} values are not a whole number of {dim}-d rows", data.len())));
        }
        Ok(Self { dim, data })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn row(&self, pos: usize) -> Option<&[f32]> {
        let start = pos.checked_mul(self.dim)?;
        self.data.get(start..start.checked_add(self.dim)?)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Up to `k` rows by descending inner product with `query`. Equal scores
    /// keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dim {
            return Err(Error::InvalidInput(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dim
            )));
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let mut hits: Vec<SearchHit> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(position, row)| SearchHit { position, score: dot(row, query) })
            .collect();
        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, rank);
            hits.truncate(k);
        }
        hits.sort_by(rank);
        Ok(hits)
    }
}

fn rank(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score.total_cmp(&a.score).then(a.position.cmp(&b.position))
}
