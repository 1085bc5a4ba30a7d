//! Domain types shared by the chunker, index store and retriever.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub type ChunkId = String;

/// A named text source, re-read on every rebuild.
///
/// `name` is the path relative to the data directory (e.g. `cv.md`) and is
/// what citations and suggestions refer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub path: PathBuf,
    pub text: String,
}

impl Document {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let name = name.into();
        Self { path: PathBuf::from(&name), name, text: text.into() }
    }
}

/// A contiguous span of a document, the unit of embedding and retrieval.
///
/// - `id`: `"{source}#{chunk_index}"`, stable across rebuilds of unchanged text
/// - `heading`: nearest preceding heading, empty when the span precedes any
/// - `heading_path`: enclosing headings joined as `H1 > H2 > H3`
/// - `start`/`end`: UTF-8 byte offsets into the document; `text == doc[start..end]`
/// - `content_hash`: blake3 hex of `text`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub source: String,
    pub heading: String,
    pub heading_path: String,
    pub start: usize,
    pub end: usize,
    pub chunk_index: usize,
    pub content_hash: String,
    pub text: String,
}

impl Chunk {
    /// `file#heading`, the citation label used in prompts.
    pub fn label(&self) -> String {
        if self.heading.is_empty() {
            self.source.clone()
        } else {
            format!("{}#{}", self.source, self.heading)
        }
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Per-document chunk total recorded alongside an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub name: String,
    pub chunks: usize,
}

/// Position/score pair returned by an index query. Higher is better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub position: usize,
    pub score: f32,
}

/// Scale `v` to unit L2 norm in place. Returns the original norm; a zero
/// vector is left untouched.
pub fn l2_normalize(v: &mut [f32]) -> f32 {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    norm
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
