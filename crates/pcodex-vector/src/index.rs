//! The in-memory index: chunk records paired with their vectors by position.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use pcodex_core::{Chunk, DocumentSummary, Error, Result, SearchHit};

use crate::schema::{IndexMeta, FORMAT_VERSION};
use crate::search::FlatIndex;

#[derive(Debug, Clone)]
pub struct Index {
    generation: Option<String>,
    meta: IndexMeta,
    vectors: FlatIndex,
}

impl Index {
    /// Pair metadata with vectors, rejecting any disagreement in count or
    /// dimension as a missing index.
    pub fn from_parts(generation: Option<String>, meta: IndexMeta, vectors: FlatIndex) -> Result<Self> {
        if meta.format_version != FORMAT_VERSION {
            return Err(Error::index_missing(format!("unsupported metadata format version {}", meta.format_version)));
        }
        if meta.dim != vectors.dim() {
            return Err(Error::index_missing(format!(
                "metadata dimension {} does not match vectors ({})",
                meta.dim,
                vectors.dim()
            )));
        }
        if meta.count != meta.records.len() || meta.records.len() != vectors.len() {
            return Err(Error::index_missing(format!(
                "{} vectors but {} metadata records (count field {})",
                vectors.len(),
                meta.records.len(),
                meta.count
            )));
        }
        Ok(Self { generation, meta, vectors })
    }

    pub fn len(&self) -> usize {
        self.meta.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meta.records.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.vectors.dim()
    }

    pub fn embedder_id(&self) -> &str {
        &self.meta.embedder_id
    }

    /// Generation directory this index was loaded from or written to.
    pub fn generation(&self) -> Option<&str> {
        self.generation.as_deref()
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.meta.built_at
    }

    pub fn documents(&self) -> &[DocumentSummary] {
        &self.meta.documents
    }

    pub fn records(&self) -> &[Chunk] {
        &self.meta.records
    }

    pub fn record(&self, pos: usize) -> Option<&Chunk> {
        self.meta.records.get(pos)
    }

    pub fn vector(&self, pos: usize) -> Option<&[f32]> {
        self.vectors.row(pos)
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    /// Chunks per document name, including documents that produced none.
    pub fn chunk_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts: BTreeMap<&str, usize> = self.meta.documents.iter().map(|d| (d.name.as_str(), 0)).collect();
        for r in &self.meta.records {
            *counts.entry(r.source.as_str()).or_default() += 1;
        }
        counts
    }

    /// Top `k` positions by inner product, descending, ties in insertion order.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.vectors.search(vector, k)
    }
}
