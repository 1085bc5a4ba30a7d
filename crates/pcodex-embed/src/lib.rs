//! Embedders behind the [`pcodex_core::Embedder`] capability.
//!
//! [`BertEmbedder`] runs a local sentence-transformer checkpoint through
//! candle; [`HashEmbedder`] is a deterministic stand-in that needs no model
//! files. [`embedder_from_config`] picks one from `embedding.backend`.

pub mod bert;
pub mod device;
pub mod hash;
pub mod pool;
pub mod tokenize;

pub use bert::BertEmbedder;
pub use hash::HashEmbedder;
pub use pool::masked_mean_l2;

use pcodex_core::config::{EmbeddingBackend, EmbeddingConfig};
use pcodex_core::{Embedder, Result};
use tracing::info;

pub fn embedder_from_config(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.backend {
        EmbeddingBackend::Hash => {
            info!(dim = config.dim, "using hash embedder");
            Ok(Box::new(HashEmbedder::new(config.dim)?))
        }
        EmbeddingBackend::Bert => Ok(Box::new(BertEmbedder::load(config)?)),
    }
}
