//! On-disk names and the metadata record persisted next to the vectors.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pcodex_core::{Chunk, DocumentSummary};

pub const FORMAT_VERSION: u32 = 1;
pub const VECTORS_MAGIC: &[u8; 4] = b"PCXV";

pub const CURRENT_FILE: &str = "CURRENT";
pub const GENERATIONS_DIR: &str = "generations";
pub const VECTORS_FILE: &str = "vectors.bin";
pub const META_FILE: &str = "meta.json";
pub const STAGING_PREFIX: &str = ".staging-";

/// Contents of `meta.json`. `records[i]` describes vector `i` of `vectors.bin`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub format_version: u32,
    pub embedder_id: String,
    pub dim: usize,
    pub count: usize,
    pub built_at: DateTime<Utc>,
    /// Every document seen by the build, including ones that produced no chunks.
    pub documents: Vec<DocumentSummary>,
    pub records: Vec<Chunk>,
}
