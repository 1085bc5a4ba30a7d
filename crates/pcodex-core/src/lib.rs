#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Core types, configuration and document preparation for the personal codex
//! retrieval pipeline.
//!
//! ```text
//! data/*.md -> Corpus -> MarkdownChunker -> Vec<Chunk> -> (pcodex-vector)
//! ```

pub mod chunker;
pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use chunker::MarkdownChunker;
pub use config::Settings;
pub use corpus::Corpus;
pub use error::{Error, Result};
pub use traits::Embedder;
pub use types::{Chunk, Document, DocumentSummary, SearchHit};
